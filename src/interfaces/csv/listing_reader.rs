use crate::application::engine::NewListing;
use crate::domain::actor::ActorId;
use crate::domain::listing::AnimalKind;
use crate::error::{MarketError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a catalog seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRow {
    pub farmer: u64,
    pub name: String,
    pub kind: AnimalKind,
    #[serde(default)]
    pub breed: String,
    pub age_months: Option<u32>,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub description: String,
}

impl CatalogRow {
    /// Splits the row into the publishing farmer and the listing to publish.
    pub fn into_listing(self) -> (ActorId, NewListing) {
        let mut listing = NewListing::new(self.name, self.kind, self.price, self.quantity);
        listing.breed = self.breed;
        listing.age_months = self.age_months.unwrap_or_default();
        listing.description = self.description;
        (ActorId(self.farmer), listing)
    }
}

/// Reads catalog seed rows from a CSV source.
///
/// Expected header: `farmer, name, kind, breed, age_months, price, quantity,
/// description`. `breed`, `age_months` and `description` may be left empty.
pub struct ListingReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ListingReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn rows(self) -> impl Iterator<Item = Result<CatalogRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(MarketError::from))
    }
}
