//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod user;

pub use product::{NewProduct, Product, ProductError, ProductUpdate};
pub use order::{Order, OrderError, OrderItem, OrderParts};
pub use cart::{Cart, CartError, CartItem};
pub use user::{normalize_email, User, UserSummary};
