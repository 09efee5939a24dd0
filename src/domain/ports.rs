use super::listing::{Listing, ListingId};
use super::order::{Order, OrderId};
use super::payment::{
    AccessToken, CheckoutRequestId, PaymentAttempt, PaymentInitiated, PaymentRequest,
    StkCallback,
};
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>>;
    async fn listings(&self) -> Result<Vec<Listing>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;
    async fn orders(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn payment(&self, id: &CheckoutRequestId) -> Result<Option<PaymentAttempt>>;
    /// A callback that arrived before its attempt was recorded.
    async fn parked_callback(&self, id: &CheckoutRequestId) -> Result<Option<StkCallback>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sequence {
    Listing,
    Order,
}

impl Sequence {
    pub fn key(self) -> &'static str {
        match self {
            Sequence::Listing => "seq:listing",
            Sequence::Order => "seq:order",
        }
    }
}

/// A set of writes that must land together or not at all.
///
/// Orders carry their line items, so writing an order writes its lines and
/// deleting an order removes them.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    pub listings: Vec<Listing>,
    pub orders: Vec<Order>,
    pub payments: Vec<PaymentAttempt>,
    pub parked_callbacks: Vec<StkCallback>,
    pub released_callbacks: Vec<CheckoutRequestId>,
    pub deleted_orders: Vec<OrderId>,
    pub deleted_listings: Vec<ListingId>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_listing(mut self, listing: Listing) -> Self {
        self.listings.push(listing);
        self
    }

    pub fn put_order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn put_payment(mut self, payment: PaymentAttempt) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn park_callback(mut self, callback: StkCallback) -> Self {
        self.parked_callbacks.push(callback);
        self
    }

    /// Drops a parked callback; a no-op when none is parked under `id`.
    pub fn release_callback(mut self, id: CheckoutRequestId) -> Self {
        self.released_callbacks.push(id);
        self
    }

    pub fn delete_order(mut self, id: OrderId) -> Self {
        self.deleted_orders.push(id);
        self
    }

    pub fn delete_listing(mut self, id: ListingId) -> Self {
        self.deleted_listings.push(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
            && self.orders.is_empty()
            && self.payments.is_empty()
            && self.parked_callbacks.is_empty()
            && self.released_callbacks.is_empty()
            && self.deleted_orders.is_empty()
            && self.deleted_listings.is_empty()
    }

    /// Row-level constraints every backend enforces before committing:
    /// an order lists each listing at most once and holds at least one line.
    pub fn check_row_constraints(&self) -> Result<()> {
        for order in &self.orders {
            if order.lines.is_empty() {
                return Err(MarketError::ValidationError(format!(
                    "Order {} has no line items",
                    order.id
                )));
            }
            let mut seen = HashSet::with_capacity(order.lines.len());
            if !order.lines.iter().all(|line| seen.insert(line.listing)) {
                return Err(MarketError::ValidationError(format!(
                    "Order {} references the same listing twice",
                    order.id
                )));
            }
        }
        Ok(())
    }
}

/// Relational-style persistence for the marketplace.
#[async_trait]
pub trait MarketStore: ListingStore + OrderStore + PaymentStore {
    /// Hands out the next identifier of a sequence.
    async fn next_id(&self, sequence: Sequence) -> Result<u64>;

    /// Commits a changeset atomically.
    ///
    /// Fails without writing anything if a deleted listing is still referenced
    /// by a surviving order.
    async fn apply(&self, changes: Changeset) -> Result<()>;
}

pub type MarketStoreRef = Arc<dyn MarketStore>;

/// Exchanges client credentials for an access token at the provider.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self) -> Result<AccessToken>;
}

/// Pushes a payment prompt to a subscriber through the provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn request_payment(
        &self,
        token: &AccessToken,
        request: &PaymentRequest,
    ) -> Result<PaymentInitiated>;
}
