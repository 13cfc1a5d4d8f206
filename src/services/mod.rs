//! Application services. Handlers call these; they own the business rules
//! and talk to the stores, the payment gateway and the event publisher.

pub mod accounts;
pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod locks;
pub mod orders;

pub use accounts::{AccountError, AccountService, AuthSession, ProfileUpdate, Registration};
pub use carts::{CartLine, CartService, CartView, CartsError};
pub use catalog::{CatalogError, CatalogService};
pub use checkout::{CheckoutError, CheckoutService, PaymentIntentCreated, PaymentOutcome};
pub use locks::{CartGuard, CartLocks};
pub use orders::{OrderService, OrderView, OrdersError};
