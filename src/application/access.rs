//! Role and ownership predicates.
//!
//! Pure functions with exhaustive matches on [`Role`]; nothing here caches a
//! decision, callers evaluate them before every gated operation.

use crate::domain::actor::{Actor, Role};
use crate::domain::listing::Listing;
use crate::domain::order::{Order, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Listing,
    Order,
}

#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Listing(&'a Listing),
    Order(&'a Order),
}

/// Anyone may read; writes depend on the kind of resource.
pub fn can_write(actor: &Actor, kind: ResourceKind) -> bool {
    match (actor.role, kind) {
        (Role::Admin, _) => true,
        (Role::Farmer, ResourceKind::Listing) => true,
        (Role::Farmer, ResourceKind::Order) => false,
        (Role::Buyer, ResourceKind::Listing) => false,
        (Role::Buyer, ResourceKind::Order) => true,
    }
}

pub fn can_access_object(actor: &Actor, resource: Resource<'_>) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Farmer => match resource {
            Resource::Listing(listing) => listing.farmer == actor.id,
            Resource::Order(order) => order.has_seller(actor.id),
        },
        Role::Buyer => match resource {
            Resource::Listing(_) => false,
            Resource::Order(order) => order.buyer == actor.id,
        },
    }
}

/// Whether `actor` may ask for `order` to move to `target`.
///
/// Only the capability is checked here; the lifecycle whitelist is enforced
/// by the order itself. `Paid` is never requestable: payment settlement is the
/// only path there.
pub fn can_request_transition(actor: &Actor, order: &Order, target: OrderStatus) -> bool {
    if target == OrderStatus::Paid || !can_access_object(actor, Resource::Order(order)) {
        return false;
    }
    match actor.role {
        Role::Admin => true,
        Role::Buyer => {
            target == OrderStatus::Rejected
                && matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed)
        }
        Role::Farmer => matches!(
            target,
            OrderStatus::Confirmed | OrderStatus::Rejected | OrderStatus::Delivered
        ),
    }
}
