use crate::application::access::{
    Resource, ResourceKind, can_access_object, can_request_transition, can_write,
};
use crate::config::{CallbackFailurePolicy, EngineConfig, PricingPolicy, StockPolicy};
use crate::domain::actor::{Actor, ActorId, PhoneNumber, Role};
use crate::domain::listing::{AnimalKind, Listing, ListingId};
use crate::domain::money::{Money, UnitPrice};
use crate::domain::order::{CartItem, Order, OrderId, OrderLine, OrderStatus, validate_cart};
use crate::domain::payment::{
    CallbackOutcome, PaymentAttempt, PaymentInitiated, PaymentState, StkCallback,
};
use crate::domain::ports::{Changeset, MarketStoreRef, Sequence};
use crate::error::{MarketError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// A listing as submitted by a farmer, before it has an id.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub name: String,
    pub kind: AnimalKind,
    pub breed: String,
    pub age_months: u32,
    pub description: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl NewListing {
    pub fn new(name: impl Into<String>, kind: AnimalKind, price: Decimal, quantity: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            breed: String::new(),
            age_months: 0,
            description: String::new(),
            price,
            quantity,
        }
    }
}

/// Dashboard figures for one farmer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub farmer: ActorId,
    /// Orders holding at least one of the farmer's listings, in any status.
    pub orders: usize,
    /// Units and revenue counted from PAID and DELIVERED orders only.
    pub units_sold: u64,
    pub revenue: Money,
    pub active_listings: usize,
    pub sold_listings: usize,
}

/// What a payment callback did to the marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Paid(OrderId),
    /// Repeated success for an order that is already settled.
    AlreadyPaid(OrderId),
    /// Success recorded on the attempt, but the order was in no state to be paid.
    Anomaly(OrderId),
    PaymentFailed { order: OrderId, rejected: bool },
    AlreadySettled(OrderId),
    /// No attempt, or no order, carries this correlation id.
    Unmatched,
}

/// The order fulfillment engine.
///
/// `OrderEngine` owns the marketplace store and serialises every
/// check-then-write sequence (checkout, status changes, settlement, catalog
/// edits) behind one async write lock. Each operation commits its writes as a
/// single [`Changeset`], so a failure part-way leaves nothing behind.
pub struct OrderEngine {
    store: MarketStoreRef,
    config: EngineConfig,
    write_lock: Mutex<()>,
}

impl OrderEngine {
    /// Creates a new `OrderEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence for listings, orders and payment attempts.
    /// * `config` - Stock, pricing and callback failure policies.
    pub fn new(store: MarketStoreRef, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- catalog ----

    #[instrument(skip(self, actor, listing), fields(actor = %actor.id, name = %listing.name))]
    pub async fn publish_listing(&self, actor: &Actor, listing: NewListing) -> Result<Listing> {
        if actor.role != Role::Farmer {
            return Err(MarketError::AuthorizationError);
        }
        if listing.name.trim().is_empty() {
            return Err(MarketError::ValidationError(
                "Listing name must not be empty".to_string(),
            ));
        }
        let price = UnitPrice::new(listing.price)?;

        let _guard = self.write_lock.lock().await;
        let id = ListingId(self.store.next_id(Sequence::Listing).await?);
        let mut created = Listing::new(
            id,
            actor.id,
            listing.name,
            listing.kind,
            price,
            listing.quantity,
        );
        created.breed = listing.breed;
        created.age_months = listing.age_months;
        created.description = listing.description;

        self.store
            .apply(Changeset::new().put_listing(created.clone()))
            .await?;
        info!(listing = %id, "Listing published");
        Ok(created)
    }

    /// All listings, in id order. Listings are publicly readable.
    pub async fn catalog(&self) -> Result<Vec<Listing>> {
        self.store.listings().await
    }

    pub async fn update_listing_price(
        &self,
        actor: &Actor,
        id: ListingId,
        price: Decimal,
    ) -> Result<Listing> {
        let price = UnitPrice::new(price)?;
        self.edit_listing(actor, id, |listing| {
            listing.price = price;
            Ok(())
        })
        .await
    }

    /// Hides a listing from buyers without losing its order history.
    pub async fn disable_listing(&self, actor: &Actor, id: ListingId) -> Result<Listing> {
        self.edit_listing(actor, id, |listing| {
            listing.disable();
            Ok(())
        })
        .await
    }

    pub async fn mark_listing_sold(&self, actor: &Actor, id: ListingId) -> Result<Listing> {
        self.edit_listing(actor, id, |listing| {
            listing.mark_sold();
            Ok(())
        })
        .await
    }

    /// Deletes a listing no order refers to. Listings with order history must
    /// be disabled instead.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_listing(&self, actor: &Actor, id: ListingId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let listing = self.owned_listing(actor, id).await?;

        let referenced = self
            .store
            .orders()
            .await?
            .iter()
            .any(|order| order.references(listing.id));
        if referenced {
            return Err(MarketError::ValidationError(format!(
                "Listing {} is referenced by existing orders; disable it instead",
                id
            )));
        }

        self.store
            .apply(Changeset::new().delete_listing(id))
            .await?;
        info!(listing = %id, "Listing deleted");
        Ok(())
    }

    async fn edit_listing<F>(&self, actor: &Actor, id: ListingId, edit: F) -> Result<Listing>
    where
        F: FnOnce(&mut Listing) -> Result<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut listing = self.owned_listing(actor, id).await?;
        edit(&mut listing)?;
        self.store
            .apply(Changeset::new().put_listing(listing.clone()))
            .await?;
        Ok(listing)
    }

    async fn owned_listing(&self, actor: &Actor, id: ListingId) -> Result<Listing> {
        let listing = self
            .store
            .listing(id)
            .await?
            .ok_or_else(|| MarketError::NotFoundError(format!("Listing {}", id)))?;
        if !can_write(actor, ResourceKind::Listing)
            || !can_access_object(actor, Resource::Listing(&listing))
        {
            return Err(MarketError::AuthorizationError);
        }
        Ok(listing)
    }

    // ---- orders ----

    /// Places an order for every entry of `items`.
    ///
    /// Items are checked in the order given and the first failure aborts the
    /// whole checkout. On success the order is `CONFIRMED` and, under
    /// [`StockPolicy::Reserve`], its quantities are taken out of stock in the
    /// same commit.
    #[instrument(skip(self, actor, items), fields(buyer = %actor.id, items = items.len()))]
    pub async fn create_order(&self, actor: &Actor, items: &[CartItem]) -> Result<Order> {
        if actor.role != Role::Buyer {
            return Err(MarketError::AuthorizationError);
        }
        validate_cart(items)?;
        let reserve = self.config.stock_policy == StockPolicy::Reserve;

        let _guard = self.write_lock.lock().await;
        let mut changes = Changeset::new();
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let mut listing = self
                .store
                .listing(item.listing)
                .await?
                .ok_or_else(|| MarketError::NotFoundError(format!("Listing {}", item.listing)))?;
            listing.check_stock(item.quantity)?;
            if listing.farmer == actor.id {
                return Err(MarketError::ValidationError(format!(
                    "You cannot order your own listing {}",
                    listing.id
                )));
            }

            lines.push(OrderLine {
                listing: listing.id,
                seller: listing.farmer,
                quantity: item.quantity,
                unit_price_at_order: listing.price,
            });
            if reserve {
                listing.reserve(item.quantity)?;
                changes = changes.put_listing(listing);
            }
        }

        let id = OrderId(self.store.next_id(Sequence::Order).await?);
        let mut order = Order::new(id, actor.id, OrderStatus::Confirmed, lines)?;
        order.stock_reserved = reserve;
        self.store.apply(changes.put_order(order.clone())).await?;

        info!(order = %id, lines = order.lines.len(), "Order created");
        Ok(order)
    }

    /// Sum of price times quantity over the order's lines.
    pub async fn compute_total(&self, order: &Order) -> Result<Money> {
        match self.config.pricing_policy {
            PricingPolicy::Snapshot => Ok(order.lines.iter().map(OrderLine::snapshot_amount).sum()),
            PricingPolicy::Live => {
                let mut total = Money::ZERO;
                for line in &order.lines {
                    let listing = self.store.listing(line.listing).await?.ok_or_else(|| {
                        MarketError::NotFoundError(format!("Listing {}", line.listing))
                    })?;
                    total += listing.price * line.quantity;
                }
                Ok(total)
            }
        }
    }

    /// Moves an order to `target` on behalf of `actor`.
    ///
    /// `PAID` is refused here for everyone; it is reached only by settling a
    /// payment callback.
    #[instrument(skip(self, actor), fields(actor = %actor.id, role = %actor.role))]
    pub async fn transition_status(
        &self,
        actor: &Actor,
        id: OrderId,
        target: OrderStatus,
    ) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let mut order = self.visible_order(actor, id).await?;

        if target == OrderStatus::Paid {
            return Err(MarketError::AuthorizationError);
        }
        if !order.status.can_transition_to(target) {
            return Err(MarketError::InvalidTransitionError {
                from: order.status,
                to: target,
            });
        }
        if !can_request_transition(actor, &order, target) {
            return Err(MarketError::AuthorizationError);
        }

        let from = order.status;
        order.advance(target)?;
        let mut changes = Changeset::new();
        if target == OrderStatus::Rejected {
            changes = self.release_reservation(&mut order, changes).await?;
        }
        self.store.apply(changes.put_order(order.clone())).await?;

        info!(order = %id, %from, to = %target, "Order status changed");
        Ok(order)
    }

    /// Orders the actor may see, newest first.
    pub async fn list_orders_for_actor(&self, actor: &Actor) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .store
            .orders()
            .await?
            .into_iter()
            .filter(|order| can_access_object(actor, Resource::Order(order)))
            .collect();
        orders.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(orders)
    }

    pub async fn get_order(&self, actor: &Actor, id: OrderId) -> Result<Order> {
        self.visible_order(actor, id).await
    }

    /// Removes an order and its lines. Admin only.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_order(&self, actor: &Actor, id: OrderId) -> Result<()> {
        if actor.role != Role::Admin {
            return Err(MarketError::AuthorizationError);
        }
        let _guard = self.write_lock.lock().await;
        let mut order = self.visible_order(actor, id).await?;

        let changes = self
            .release_reservation(&mut order, Changeset::new())
            .await?;
        self.store.apply(changes.delete_order(id)).await?;
        info!(order = %id, "Order deleted");
        Ok(())
    }

    pub async fn farmer_sales_summary(&self, actor: &Actor, farmer: ActorId) -> Result<SalesSummary> {
        let allowed = match actor.role {
            Role::Admin => true,
            Role::Farmer => actor.id == farmer,
            Role::Buyer => false,
        };
        if !allowed {
            return Err(MarketError::AuthorizationError);
        }

        let mut summary = SalesSummary {
            farmer,
            orders: 0,
            units_sold: 0,
            revenue: Money::ZERO,
            active_listings: 0,
            sold_listings: 0,
        };
        for order in self.store.orders().await? {
            if !order.has_seller(farmer) {
                continue;
            }
            summary.orders += 1;
            if matches!(order.status, OrderStatus::Paid | OrderStatus::Delivered) {
                for line in order.lines.iter().filter(|line| line.seller == farmer) {
                    summary.units_sold += u64::from(line.quantity);
                    summary.revenue += line.snapshot_amount();
                }
            }
        }
        for listing in self.store.listings().await? {
            if listing.farmer != farmer {
                continue;
            }
            if listing.is_sold {
                summary.sold_listings += 1;
            } else if listing.active {
                summary.active_listings += 1;
            }
        }
        Ok(summary)
    }

    // ---- payments ----

    /// Loads an order the actor may pay for and prices it.
    ///
    /// Only the order's buyer or an admin may pay, and only while the order is
    /// `CONFIRMED`.
    pub async fn payable_order(&self, actor: &Actor, id: OrderId) -> Result<(Order, Money)> {
        let order = self.visible_order(actor, id).await?;
        if actor.role == Role::Farmer {
            return Err(MarketError::AuthorizationError);
        }
        if order.status != OrderStatus::Confirmed {
            return Err(MarketError::InvalidTransitionError {
                from: order.status,
                to: OrderStatus::Paid,
            });
        }
        let total = self.compute_total(&order).await?;
        Ok((order, total))
    }

    /// Stores a pending attempt for a prompt the provider accepted.
    pub async fn record_payment_attempt(
        &self,
        order_id: OrderId,
        initiated: &PaymentInitiated,
        amount: Money,
        phone: PhoneNumber,
    ) -> Result<PaymentAttempt> {
        let _guard = self.write_lock.lock().await;
        let attempt = PaymentAttempt {
            checkout_request_id: initiated.checkout_request_id.clone(),
            merchant_request_id: initiated.merchant_request_id.clone(),
            order: order_id,
            amount,
            phone,
            state: PaymentState::Pending,
            receipt_number: None,
            result_code: None,
            result_description: None,
            created_at: Utc::now(),
            settled_at: None,
        };

        let mut changes = Changeset::new().put_payment(attempt.clone());
        match self.store.order(order_id).await? {
            Some(mut order) if order.status == OrderStatus::Confirmed => {
                order.payment_reference = Some(attempt.checkout_request_id.clone());
                order.updated_at = Utc::now();
                changes = changes.put_order(order);
            }
            // the order moved on while the prompt was in flight; the callback
            // will still find the attempt
            Some(order) => {
                warn!(order = %order_id, status = %order.status, "Order left CONFIRMED during payment initiation");
            }
            None => {
                return Err(MarketError::NotFoundError(format!("Order {}", order_id)));
            }
        }
        self.store.apply(changes).await?;

        let id = attempt.checkout_request_id.clone();
        if let Some(early) = self.store.parked_callback(&id).await? {
            info!(checkout_request_id = %id, "Replaying callback that arrived before its attempt");
            self.settle_locked(&early).await?;
            if let Some(settled) = self.store.payment(&id).await? {
                return Ok(settled);
            }
        }
        Ok(attempt)
    }

    /// Applies a provider callback. Safe to call repeatedly with the same
    /// callback; only the first delivery changes anything.
    ///
    /// A callback for an attempt that is not recorded yet is parked and
    /// replayed once `record_payment_attempt` stores it.
    #[instrument(skip(self, callback), fields(checkout_request_id = %callback.checkout_request_id, result_code = callback.result_code))]
    pub async fn settle_payment(&self, callback: &StkCallback) -> Result<Settlement> {
        let _guard = self.write_lock.lock().await;
        self.settle_locked(callback).await
    }

    async fn settle_locked(&self, callback: &StkCallback) -> Result<Settlement> {
        let correlation_id = callback.correlation_id();

        let Some(mut attempt) = self.store.payment(&correlation_id).await? else {
            warn!("Callback for an unknown payment, parking it");
            self.store
                .apply(Changeset::new().park_callback(callback.clone()))
                .await?;
            return Ok(Settlement::Unmatched);
        };
        let Some(mut order) = self.store.order(attempt.order).await? else {
            warn!(order = %attempt.order, "Callback for a payment whose order no longer exists");
            return Ok(Settlement::Unmatched);
        };
        let order_id = order.id;

        if attempt.is_settled() {
            info!(order = %order_id, state = ?attempt.state, "Duplicate callback ignored");
            return Ok(match order.status {
                OrderStatus::Paid | OrderStatus::Delivered => Settlement::AlreadyPaid(order_id),
                _ => Settlement::AlreadySettled(order_id),
            });
        }

        attempt.result_code = Some(callback.result_code);
        attempt.result_description = Some(callback.result_desc.clone());
        attempt.settled_at = Some(Utc::now());

        let mut changes = Changeset::new().release_callback(correlation_id.clone());
        let settlement = match callback.outcome() {
            CallbackOutcome::Succeeded { receipt_number } => {
                attempt.state = PaymentState::Succeeded;
                attempt.receipt_number = receipt_number;

                if order.status.can_transition_to(OrderStatus::Paid) {
                    order.advance(OrderStatus::Paid)?;
                    order.payment_reference = Some(correlation_id);
                    changes = changes.put_order(order);
                    info!(order = %order_id, receipt = ?attempt.receipt_number, "Order paid");
                    Settlement::Paid(order_id)
                } else {
                    // a second prompt paid for an already paid order, or the
                    // order was rejected meanwhile; the receipt is kept
                    warn!(order = %order_id, status = %order.status, receipt = ?attempt.receipt_number, "Payment succeeded for an order that cannot be paid");
                    Settlement::Anomaly(order_id)
                }
            }
            outcome @ (CallbackOutcome::Cancelled | CallbackOutcome::Failed { .. }) => {
                attempt.state = PaymentState::Failed;

                let reject = self.config.callback_failure_policy == CallbackFailurePolicy::Reject
                    && order.status.can_transition_to(OrderStatus::Rejected);
                if reject {
                    order.advance(OrderStatus::Rejected)?;
                    changes = self.release_reservation(&mut order, changes).await?;
                    changes = changes.put_order(order);
                }
                warn!(order = %order_id, ?outcome, rejected = reject, "Payment failed");
                Settlement::PaymentFailed {
                    order: order_id,
                    rejected: reject,
                }
            }
        };

        self.store.apply(changes.put_payment(attempt)).await?;
        Ok(settlement)
    }

    // ---- helpers ----

    /// Loads an order the actor may see. Non-admins cannot tell a missing
    /// order from a forbidden one.
    async fn visible_order(&self, actor: &Actor, id: OrderId) -> Result<Order> {
        match self.store.order(id).await? {
            Some(order) if can_access_object(actor, Resource::Order(&order)) => Ok(order),
            Some(_) => Err(MarketError::AuthorizationError),
            None if actor.role == Role::Admin => {
                Err(MarketError::NotFoundError(format!("Order {}", id)))
            }
            None => Err(MarketError::AuthorizationError),
        }
    }

    /// Gives reserved stock back to the order's listings. Only orders still
    /// awaiting payment, or just rejected, hold a releasable reservation.
    async fn release_reservation(&self, order: &mut Order, mut changes: Changeset) -> Result<Changeset> {
        let releasable = matches!(
            order.status,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Rejected
        );
        if !order.stock_reserved || !releasable {
            return Ok(changes);
        }
        for line in &order.lines {
            if let Some(mut listing) = self.store.listing(line.listing).await? {
                listing.release(line.quantity);
                changes = changes.put_listing(listing);
            }
        }
        order.stock_reserved = false;
        Ok(changes)
    }
}
