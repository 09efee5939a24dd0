use super::actor::ActorId;
use super::money::UnitPrice;
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub u64);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimalKind {
    Cow,
    Goat,
    Sheep,
    Chicken,
    Pig,
}

/// An animal offered for sale by a farmer.
///
/// `quantity` is the authoritative stock figure. `is_sold` mirrors it (set
/// when quantity reaches zero) but may also be set explicitly by the owner,
/// in which case `marked_sold` pins it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub farmer: ActorId,
    pub name: String,
    pub kind: AnimalKind,
    pub breed: String,
    pub age_months: u32,
    pub description: String,
    pub price: UnitPrice,
    pub quantity: u32,
    pub is_sold: bool,
    #[serde(default)]
    pub marked_sold: bool,
    /// Cleared instead of deleting a listing that has order history.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(
        id: ListingId,
        farmer: ActorId,
        name: impl Into<String>,
        kind: AnimalKind,
        price: UnitPrice,
        quantity: u32,
    ) -> Self {
        Self {
            id,
            farmer,
            name: name.into(),
            kind,
            breed: String::new(),
            age_months: 0,
            description: String::new(),
            price,
            quantity,
            is_sold: quantity == 0,
            marked_sold: false,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Quantity a buyer can order right now. Sold-out or disabled listings
    /// offer nothing regardless of the stored quantity.
    pub fn available(&self) -> u32 {
        if self.is_sold || !self.active {
            0
        } else {
            self.quantity
        }
    }

    /// Checks that `requested` units can be taken from this listing.
    pub fn check_stock(&self, requested: u32) -> Result<(), MarketError> {
        let available = self.available();
        if available == 0 || requested > available {
            return Err(MarketError::StockError {
                listing: self.id,
                requested,
                available,
            });
        }
        Ok(())
    }

    /// Takes `quantity` units out of stock, marking the listing sold at zero.
    pub fn reserve(&mut self, quantity: u32) -> Result<(), MarketError> {
        self.check_stock(quantity)?;
        self.quantity -= quantity;
        if self.quantity == 0 {
            self.is_sold = true;
        }
        Ok(())
    }

    /// Returns previously reserved units to stock. Only the sold-out flag
    /// set by `reserve` is cleared; an owner's explicit mark stays.
    pub fn release(&mut self, quantity: u32) {
        self.quantity = self.quantity.saturating_add(quantity);
        if self.quantity > 0 && !self.marked_sold {
            self.is_sold = false;
        }
    }

    pub fn mark_sold(&mut self) {
        self.is_sold = true;
        self.marked_sold = true;
    }

    pub fn disable(&mut self) {
        self.active = false;
    }
}
