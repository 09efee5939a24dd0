//! Application layer containing the marketplace orchestration.
//!
//! `OrderEngine` is the entry point for catalog and order operations and
//! serialises writes behind a single lock. `PaymentService` drives the
//! mobile-money flow on top of it, using `PaymentGatewayClient` and its
//! `TokenCache` for provider credentials. `access` holds the role predicates.

pub mod access;
pub mod engine;
pub mod gateway;
pub mod payments;
pub mod token_cache;
