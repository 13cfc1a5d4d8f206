//! Order queries and delivery administration.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderError, User, UserSummary};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::publisher::EventPublisher;
use crate::store::{OrderStore, StoreError, UserStore};

#[derive(Debug, Error)]
pub enum OrdersError {
    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// An order with its owner resolved. `user` is `None` once the account is gone.
#[derive(Clone, Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub user: Option<UserSummary>,
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    users: Arc<dyn UserStore>,
    events: EventPublisher,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>, users: Arc<dyn UserStore>, events: EventPublisher) -> Self {
        Self { orders, users, events }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderView>, OrdersError> {
        let orders = self.orders.list_for_user(user_id).await?;
        self.with_owners(orders).await
    }

    pub async fn list_all(&self) -> Result<Vec<OrderView>, OrdersError> {
        let orders = self.orders.list_all().await?;
        self.with_owners(orders).await
    }

    /// Other users' orders are reported as missing.
    pub async fn get(&self, caller: &User, id: Uuid) -> Result<OrderView, OrdersError> {
        let order = self.orders.find(id).await?.ok_or(OrdersError::NotFound(id))?;
        if order.user_id() != caller.id && !caller.is_admin {
            tracing::warn!(order_id = %id, caller = %caller.id, "order requested by non-owner");
            return Err(OrdersError::NotFound(id));
        }
        self.with_owner(order).await
    }

    pub async fn set_delivered(&self, id: Uuid, delivered: bool) -> Result<OrderView, OrdersError> {
        let mut order = self.orders.find(id).await?.ok_or(OrdersError::NotFound(id))?;
        order.set_delivered(delivered, Utc::now())?;
        if delivered {
            if !self.orders.update(&order).await? {
                return Err(OrdersError::NotFound(id));
            }
            tracing::info!(order_id = %id, delivered_at = ?order.delivered_at(), "order marked delivered");
            self.events.publish(DomainEvent::Order(OrderEvent::Delivered { order_id: id })).await;
        }
        self.with_owner(order).await
    }

    async fn with_owner(&self, order: Order) -> Result<OrderView, OrdersError> {
        let user = self.users.find(order.user_id()).await?.map(|u| u.summary());
        Ok(OrderView { order, user })
    }

    async fn with_owners(&self, orders: Vec<Order>) -> Result<Vec<OrderView>, OrdersError> {
        let mut ids: Vec<Uuid> = orders.iter().map(Order::user_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let owners: HashMap<Uuid, UserSummary> =
            self.users.find_many(&ids).await?.into_iter().map(|u| (u.id, u.summary())).collect();
        Ok(orders
            .into_iter()
            .map(|order| {
                let user = owners.get(&order.user_id()).cloned();
                OrderView { order, user }
            })
            .collect())
    }
}
