use crate::domain::listing::Listing;
use crate::domain::money::Money;
use crate::domain::order::Order;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ListingRow<'a> {
    id: u64,
    farmer: u64,
    name: &'a str,
    kind: String,
    price: String,
    quantity: u32,
    available: u32,
    sold: bool,
    active: bool,
}

#[derive(Serialize)]
struct OrderRow {
    order: u64,
    buyer: u64,
    status: String,
    lines: usize,
    total: String,
}

/// Writes catalog and order reports as CSV.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_listings(&mut self, listings: &[Listing]) -> Result<()> {
        for listing in listings {
            self.writer.serialize(ListingRow {
                id: listing.id.0,
                farmer: listing.farmer.0,
                name: &listing.name,
                kind: format!("{:?}", listing.kind).to_lowercase(),
                price: listing.price.to_string(),
                quantity: listing.quantity,
                available: listing.available(),
                sold: listing.is_sold,
                active: listing.active,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Writes one row per order with its precomputed total.
    pub fn write_orders(&mut self, orders: &[(Order, Money)]) -> Result<()> {
        for (order, total) in orders {
            self.writer.serialize(OrderRow {
                order: order.id.0,
                buyer: order.buyer.0,
                status: order.status.to_string(),
                lines: order.lines.len(),
                total: total.to_string(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
