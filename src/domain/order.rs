use super::actor::ActorId;
use super::listing::ListingId;
use super::money::{Money, UnitPrice};
use super::payment::CheckoutRequestId;
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order lifecycle: `Pending -> Confirmed -> Paid -> Delivered`, with
/// `Rejected` as a terminal branch from `Pending` or `Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Paid,
    Delivered,
    Rejected,
}

impl OrderStatus {
    /// The whitelist of forward transitions out of this status.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Rejected],
            Confirmed => &[Paid, Rejected],
            Paid => &[Delivered],
            Delivered | Rejected => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

impl FromStr for OrderStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "PAID" => Ok(OrderStatus::Paid),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "REJECTED" | "CANCELLED" => Ok(OrderStatus::Rejected),
            other => Err(MarketError::ValidationError(format!(
                "Unknown order status '{}'",
                other
            ))),
        }
    }
}

/// One requested entry of a checkout cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub listing: ListingId,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(listing: u64, quantity: u32) -> Self {
        Self {
            listing: ListingId(listing),
            quantity,
        }
    }
}

/// Checks the shape of a cart before any listing is looked up.
pub fn validate_cart(items: &[CartItem]) -> Result<(), MarketError> {
    if items.is_empty() {
        return Err(MarketError::ValidationError(
            "An order needs at least one item".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(MarketError::ValidationError(format!(
                "Quantity for listing {} must be positive",
                item.listing
            )));
        }
        if !seen.insert(item.listing) {
            return Err(MarketError::ValidationError(format!(
                "Listing {} appears more than once in the order",
                item.listing
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub listing: ListingId,
    /// Owner of the listing when the order was placed.
    pub seller: ActorId,
    pub quantity: u32,
    pub unit_price_at_order: UnitPrice,
}

impl OrderLine {
    pub fn snapshot_amount(&self) -> Money {
        self.unit_price_at_order * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer: ActorId,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub payment_reference: Option<CheckoutRequestId>,
    /// Set while the order holds stock taken out of its listings.
    #[serde(default)]
    pub stock_reserved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new order. Line items are stored inside the order record, so
    /// deleting the order removes them with it.
    pub fn new(
        id: OrderId,
        buyer: ActorId,
        status: OrderStatus,
        lines: Vec<OrderLine>,
    ) -> Result<Self, MarketError> {
        if lines.is_empty() {
            return Err(MarketError::ValidationError(
                "An order needs at least one item".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id,
            buyer,
            status,
            lines,
            payment_reference: None,
            stock_reserved: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves the order along the lifecycle whitelist.
    pub fn advance(&mut self, target: OrderStatus) -> Result<(), MarketError> {
        if !self.status.can_transition_to(target) {
            return Err(MarketError::InvalidTransitionError {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn has_seller(&self, farmer: ActorId) -> bool {
        self.lines.iter().any(|line| line.seller == farmer)
    }

    pub fn references(&self, listing: ListingId) -> bool {
        self.lines.iter().any(|line| line.listing == listing)
    }
}
