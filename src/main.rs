use clap::{Parser, Subcommand};
use farmart::application::engine::OrderEngine;
use farmart::application::gateway::PaymentGatewayClient;
use farmart::application::payments::{PaymentService, acknowledge_callback};
use farmart::application::token_cache::TokenCache;
use farmart::config::{MarketConfig, MpesaConfig};
use farmart::domain::actor::{Actor, ActorId, Role};
use farmart::domain::money::Money;
use farmart::domain::order::{Order, OrderId, OrderStatus};
use farmart::domain::ports::MarketStoreRef;
use farmart::error::MarketError;
use farmart::infrastructure::in_memory::InMemoryMarketStore;
use farmart::infrastructure::mpesa::MpesaClient;
#[cfg(feature = "storage-rocksdb")]
use farmart::infrastructure::rocksdb::RocksDBStore;
use farmart::interfaces::csv::cart_reader::CartReader;
use farmart::interfaces::csv::listing_reader::ListingReader;
use farmart::interfaces::csv::report_writer::ReportWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::{self, File};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Catalog CSV used to seed an empty store.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the catalog as CSV
    Listings,
    /// Place an order for the cart in a CSV file (`listing, quantity`)
    Checkout {
        #[arg(long)]
        buyer: u64,
        cart: PathBuf,
    },
    /// Print the orders an actor can see, newest first
    Orders {
        #[arg(long)]
        actor: u64,
        #[arg(long)]
        role: Role,
    },
    /// Move an order to another status
    Transition {
        #[arg(long)]
        actor: u64,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        order: u64,
        #[arg(long)]
        status: OrderStatus,
    },
    /// Send a mobile-money payment prompt for a confirmed order
    Pay {
        #[arg(long)]
        actor: u64,
        #[arg(long, default_value = "buyer")]
        role: Role,
        #[arg(long)]
        order: u64,
        #[arg(long)]
        phone: String,
    },
    /// Apply a provider callback JSON file and print the acknowledgement
    Callback { payload: PathBuf },
    /// Print a farmer's sales figures as JSON
    Summary {
        #[arg(long)]
        farmer: u64,
    },
    /// Check that provider credentials yield an access token
    Token,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    let config = MarketConfig::from_env()?;

    let store = open_store(cli.db_path.as_deref())?;
    let engine = Arc::new(OrderEngine::new(store, config.engine));
    if let Some(catalog) = &cli.catalog {
        seed_catalog(&engine, catalog).await?;
    }

    let stdout = io::stdout();
    match cli.command {
        Command::Listings => {
            let listings = engine.catalog().await?;
            ReportWriter::new(stdout.lock()).write_listings(&listings)?;
        }
        Command::Checkout { buyer, cart } => {
            let file = File::open(cart).into_diagnostic()?;
            let items = CartReader::new(file).items()?;
            let order = engine.create_order(&Actor::buyer(buyer), &items).await?;
            let rows = with_totals(&engine, vec![order]).await?;
            ReportWriter::new(stdout.lock()).write_orders(&rows)?;
        }
        Command::Orders { actor, role } => {
            let orders = engine
                .list_orders_for_actor(&Actor::new(actor, role))
                .await?;
            let rows = with_totals(&engine, orders).await?;
            ReportWriter::new(stdout.lock()).write_orders(&rows)?;
        }
        Command::Transition {
            actor,
            role,
            order,
            status,
        } => {
            let order = engine
                .transition_status(&Actor::new(actor, role), OrderId(order), status)
                .await?;
            let rows = with_totals(&engine, vec![order]).await?;
            ReportWriter::new(stdout.lock()).write_orders(&rows)?;
        }
        Command::Pay {
            actor,
            role,
            order,
            phone,
        } => {
            let payments = PaymentService::new(engine.clone(), payment_gateway(&config.mpesa)?);
            let attempt = payments
                .initiate_payment(&Actor::new(actor, role), OrderId(order), &phone)
                .await?;
            println!("{}", serde_json::to_string_pretty(&attempt).into_diagnostic()?);
        }
        Command::Callback { payload } => {
            let raw = fs::read(payload).into_diagnostic()?;
            let ack = acknowledge_callback(&engine, &raw).await;
            println!("{}", serde_json::to_string(&ack).into_diagnostic()?);
        }
        Command::Summary { farmer } => {
            let summary = engine
                .farmer_sales_summary(&Actor::farmer(farmer), ActorId(farmer))
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        }
        Command::Token => {
            let gateway = payment_gateway(&config.mpesa)?;
            if gateway.access_token().await.is_none() {
                return Err(MarketError::PaymentGatewayError(
                    "Could not obtain an access token".to_string(),
                )
                .into());
            }
            println!("access token acquired");
        }
    }

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&Path>) -> farmart::error::Result<MarketStoreRef> {
    match db_path {
        Some(path) => Ok(Arc::new(RocksDBStore::open(path)?)),
        None => Ok(Arc::new(InMemoryMarketStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&Path>) -> farmart::error::Result<MarketStoreRef> {
    if db_path.is_some() {
        warn!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryMarketStore::new()))
}

/// Publishes every row of the seed file, unless the store already has a
/// catalog (a persistent store seeded on an earlier run).
async fn seed_catalog(engine: &OrderEngine, path: &Path) -> Result<()> {
    if !engine.catalog().await?.is_empty() {
        info!(path = %path.display(), "Catalog already present, seed file ignored");
        return Ok(());
    }
    let file = File::open(path).into_diagnostic()?;
    let mut published = 0usize;
    for row in ListingReader::new(file).rows() {
        match row {
            Ok(row) => {
                let (farmer, listing) = row.into_listing();
                engine
                    .publish_listing(&Actor::new(farmer.0, Role::Farmer), listing)
                    .await?;
                published += 1;
            }
            Err(e) => {
                warn!(error = %e, "Skipping unreadable catalog row");
            }
        }
    }
    info!(published, "Catalog seeded");
    Ok(())
}

async fn with_totals(engine: &OrderEngine, orders: Vec<Order>) -> Result<Vec<(Order, Money)>> {
    let mut rows = Vec::with_capacity(orders.len());
    for order in orders {
        let total = engine.compute_total(&order).await?;
        rows.push((order, total));
    }
    Ok(rows)
}

fn payment_gateway(config: &MpesaConfig) -> farmart::error::Result<PaymentGatewayClient> {
    let client = Arc::new(MpesaClient::new(config)?);
    Ok(PaymentGatewayClient::new(
        Arc::new(TokenCache::new(config.token_ttl)),
        client.clone(),
        client,
    ))
}
