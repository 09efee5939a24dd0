use crate::domain::listing::{Listing, ListingId};
use crate::domain::order::{Order, OrderId};
use crate::domain::payment::{CheckoutRequestId, PaymentAttempt, StkCallback};
use crate::domain::ports::{
    Changeset, ListingStore, MarketStore, OrderStore, PaymentStore, Sequence,
};
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for listings.
pub const CF_LISTINGS: &str = "listings";
/// Column Family for orders, line items included.
pub const CF_ORDERS: &str = "orders";
/// Column Family for payment attempts keyed by correlation id.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for callbacks that arrived before their payment attempt.
pub const CF_PARKED: &str = "parked_callbacks";
/// Column Family for id sequences.
pub const CF_META: &str = "meta";

/// A persistent store implementation using RocksDB.
///
/// Every entity kind has its own Column Family. Changesets are committed as a
/// single `WriteBatch`, which RocksDB applies atomically.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_LISTINGS, CF_ORDERS, CF_PAYMENTS, CF_PARKED, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            MarketError::InternalError(Box::new(std::io::Error::other(format!(
                "{} column family not found",
                name
            ))))
        })
    }

    fn read<T: DeserializeOwned>(&self, family: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(family)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, family: &str) -> Result<Vec<T>> {
        let cf = self.cf(family)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn put<T: Serialize>(&self, batch: &mut WriteBatch, family: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(family)?;
        batch.put_cf(cf, key, serde_json::to_vec(value)?);
        Ok(())
    }
}

#[async_trait]
impl ListingStore for RocksDBStore {
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>> {
        self.read(CF_LISTINGS, &id.0.to_be_bytes())
    }

    async fn listings(&self) -> Result<Vec<Listing>> {
        self.scan(CF_LISTINGS)
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        self.read(CF_ORDERS, &id.0.to_be_bytes())
    }

    async fn orders(&self) -> Result<Vec<Order>> {
        self.scan(CF_ORDERS)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn payment(&self, id: &CheckoutRequestId) -> Result<Option<PaymentAttempt>> {
        self.read(CF_PAYMENTS, id.0.as_bytes())
    }

    async fn parked_callback(&self, id: &CheckoutRequestId) -> Result<Option<StkCallback>> {
        self.read(CF_PARKED, id.0.as_bytes())
    }
}

#[async_trait]
impl MarketStore for RocksDBStore {
    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let _guard = self.write_gate.lock().await;
        let key = sequence.key().as_bytes();
        let current: u64 = self.read(CF_META, key)?.unwrap_or(0);
        let next = current + 1;

        let mut batch = WriteBatch::default();
        self.put(&mut batch, CF_META, key, &next)?;
        self.db.write(batch)?;
        Ok(next)
    }

    async fn apply(&self, changes: Changeset) -> Result<()> {
        changes.check_row_constraints()?;
        let _guard = self.write_gate.lock().await;

        if !changes.deleted_listings.is_empty() {
            let stored: Vec<Order> = self.scan(CF_ORDERS)?;
            let survivors = stored
                .iter()
                .filter(|order| !changes.orders.iter().any(|o| o.id == order.id))
                .chain(changes.orders.iter())
                .filter(|order| !changes.deleted_orders.contains(&order.id));
            let survivors: Vec<&Order> = survivors.collect();
            for listing_id in &changes.deleted_listings {
                if survivors.iter().any(|order| order.references(*listing_id)) {
                    return Err(MarketError::ValidationError(format!(
                        "Listing {} has order history and cannot be deleted; disable it instead",
                        listing_id
                    )));
                }
            }
        }

        let mut batch = WriteBatch::default();
        for id in &changes.deleted_orders {
            batch.delete_cf(self.cf(CF_ORDERS)?, id.0.to_be_bytes());
        }
        for id in &changes.deleted_listings {
            batch.delete_cf(self.cf(CF_LISTINGS)?, id.0.to_be_bytes());
        }
        for listing in &changes.listings {
            self.put(&mut batch, CF_LISTINGS, &listing.id.0.to_be_bytes(), listing)?;
        }
        for order in &changes.orders {
            self.put(&mut batch, CF_ORDERS, &order.id.0.to_be_bytes(), order)?;
        }
        for payment in &changes.payments {
            self.put(
                &mut batch,
                CF_PAYMENTS,
                payment.checkout_request_id.0.as_bytes(),
                payment,
            )?;
        }
        for id in &changes.released_callbacks {
            batch.delete_cf(self.cf(CF_PARKED)?, id.0.as_bytes());
        }
        for callback in &changes.parked_callbacks {
            self.put(
                &mut batch,
                CF_PARKED,
                callback.checkout_request_id.as_bytes(),
                callback,
            )?;
        }

        self.db.write(batch)?;
        Ok(())
    }
}
