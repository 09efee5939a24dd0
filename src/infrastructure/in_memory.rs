use crate::domain::listing::{Listing, ListingId};
use crate::domain::order::{Order, OrderId};
use crate::domain::payment::{CheckoutRequestId, PaymentAttempt, StkCallback};
use crate::domain::ports::{
    Changeset, ListingStore, MarketStore, OrderStore, PaymentStore, Sequence,
};
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    listings: HashMap<ListingId, Listing>,
    orders: HashMap<OrderId, Order>,
    payments: HashMap<CheckoutRequestId, PaymentAttempt>,
    parked_callbacks: HashMap<CheckoutRequestId, StkCallback>,
    sequences: HashMap<Sequence, u64>,
}

/// A thread-safe in-memory marketplace store.
///
/// All tables sit behind a single `RwLock`, so a changeset is applied under
/// one write guard and readers never observe half of it.
#[derive(Default, Clone)]
pub struct InMemoryMarketStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryMarketStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListingStore for InMemoryMarketStore {
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>> {
        let tables = self.tables.read().await;
        Ok(tables.listings.get(&id).cloned())
    }

    async fn listings(&self) -> Result<Vec<Listing>> {
        let tables = self.tables.read().await;
        let mut listings: Vec<Listing> = tables.listings.values().cloned().collect();
        listings.sort_by_key(|l| l.id);
        Ok(listings)
    }
}

#[async_trait]
impl OrderStore for InMemoryMarketStore {
    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.get(&id).cloned())
    }

    async fn orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<Order> = tables.orders.values().cloned().collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }
}

#[async_trait]
impl PaymentStore for InMemoryMarketStore {
    async fn payment(&self, id: &CheckoutRequestId) -> Result<Option<PaymentAttempt>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(id).cloned())
    }

    async fn parked_callback(&self, id: &CheckoutRequestId) -> Result<Option<StkCallback>> {
        let tables = self.tables.read().await;
        Ok(tables.parked_callbacks.get(id).cloned())
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let counter = tables.sequences.entry(sequence).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn apply(&self, changes: Changeset) -> Result<()> {
        changes.check_row_constraints()?;
        let mut tables = self.tables.write().await;

        for listing_id in &changes.deleted_listings {
            let referenced = tables
                .orders
                .values()
                .chain(changes.orders.iter())
                .filter(|order| !changes.deleted_orders.contains(&order.id))
                .any(|order| order.references(*listing_id));
            if referenced {
                return Err(MarketError::ValidationError(format!(
                    "Listing {} has order history and cannot be deleted; disable it instead",
                    listing_id
                )));
            }
        }

        for id in changes.deleted_orders {
            tables.orders.remove(&id);
        }
        for id in changes.deleted_listings {
            tables.listings.remove(&id);
        }
        for listing in changes.listings {
            tables.listings.insert(listing.id, listing);
        }
        for order in changes.orders {
            tables.orders.insert(order.id, order);
        }
        for payment in changes.payments {
            tables
                .payments
                .insert(payment.checkout_request_id.clone(), payment);
        }
        for id in changes.released_callbacks {
            tables.parked_callbacks.remove(&id);
        }
        for callback in changes.parked_callbacks {
            tables
                .parked_callbacks
                .insert(callback.correlation_id(), callback);
        }
        Ok(())
    }
}
