//! Marketplace entities, value objects and the ports the application layer
//! depends on.

pub mod actor;
pub mod listing;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
