use crate::domain::order::CartItem;
use crate::error::{MarketError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct CartRow {
    listing: u64,
    quantity: u32,
}

/// Reads a checkout cart (`listing, quantity` rows) from a CSV source.
pub struct CartReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CartReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Reads the whole cart. A cart is all-or-nothing, so one bad row fails it.
    pub fn items(self) -> Result<Vec<CartItem>> {
        self.reader
            .into_deserialize::<CartRow>()
            .map(|row| {
                row.map(|row| CartItem::new(row.listing, row.quantity))
                    .map_err(MarketError::from)
            })
            .collect()
    }
}
