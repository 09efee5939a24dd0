#![allow(dead_code)]

use async_trait::async_trait;
use farmart::application::engine::{NewListing, OrderEngine};
use farmart::application::gateway::PaymentGatewayClient;
use farmart::application::payments::PaymentService;
use farmart::application::token_cache::TokenCache;
use farmart::config::EngineConfig;
use farmart::domain::actor::Actor;
use farmart::domain::listing::{AnimalKind, Listing};
use farmart::domain::payment::{
    AccessToken, CheckoutRequestId, PaymentInitiated, PaymentRequest,
};
use farmart::domain::ports::{CredentialExchange, PaymentProvider};
use farmart::error::{MarketError, Result};
use farmart::infrastructure::in_memory::InMemoryMarketStore;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const FARMER: u64 = 10;
pub const BUYER: u64 = 20;

pub fn engine(config: EngineConfig) -> Arc<OrderEngine> {
    Arc::new(OrderEngine::new(Arc::new(InMemoryMarketStore::new()), config))
}

/// Publishes Goat-X (15000.00, 3 in stock) and Goat-Y (5000.00, 1 in stock).
pub async fn seed_goats(engine: &OrderEngine) -> (Listing, Listing) {
    let farmer = Actor::farmer(FARMER);
    let x = engine
        .publish_listing(
            &farmer,
            NewListing::new("Goat-X", AnimalKind::Goat, dec!(15000.00), 3),
        )
        .await
        .unwrap();
    let y = engine
        .publish_listing(
            &farmer,
            NewListing::new("Goat-Y", AnimalKind::Goat, dec!(5000.00), 1),
        )
        .await
        .unwrap();
    (x, y)
}

/// Credential exchange that counts its calls and can be told to fail.
#[derive(Default)]
pub struct CountingExchange {
    pub calls: AtomicUsize,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl CountingExchange {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialExchange for CountingExchange {
    async fn exchange(&self) -> Result<AccessToken> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(MarketError::PaymentGatewayError("connection refused".into()));
        }
        Ok(AccessToken::new(format!("token-{}", n)))
    }
}

/// Provider that accepts every prompt and derives the correlation id from the
/// order id.
pub struct AcceptingProvider;

#[async_trait]
impl PaymentProvider for AcceptingProvider {
    async fn request_payment(
        &self,
        _token: &AccessToken,
        request: &PaymentRequest,
    ) -> Result<PaymentInitiated> {
        Ok(PaymentInitiated {
            checkout_request_id: checkout_id(request.order.0),
            merchant_request_id: format!("m-{}", request.order),
            customer_message: "Success. Request accepted for processing".to_string(),
        })
    }
}

pub fn checkout_id(order: u64) -> CheckoutRequestId {
    CheckoutRequestId(format!("ws_CO_{}", order))
}

pub fn gateway(exchange: Arc<CountingExchange>) -> PaymentGatewayClient {
    PaymentGatewayClient::new(
        Arc::new(TokenCache::new(Duration::from_secs(3500))),
        exchange,
        Arc::new(AcceptingProvider),
    )
}

pub fn payment_service(engine: Arc<OrderEngine>) -> PaymentService {
    PaymentService::new(engine, gateway(Arc::new(CountingExchange::default())))
}

pub fn callback_json(checkout_request_id: &CheckoutRequestId, result_code: i64) -> String {
    let metadata = if result_code == 0 {
        r#","CallbackMetadata":{"Item":[{"Name":"Amount","Value":35000},{"Name":"MpesaReceiptNumber","Value":"NLJ7RT61SV"}]}"#
    } else {
        ""
    };
    format!(
        r#"{{"Body":{{"stkCallback":{{"MerchantRequestID":"m-1","CheckoutRequestID":"{}","ResultCode":{},"ResultDesc":"done"{}}}}}}}"#,
        checkout_request_id, result_code, metadata
    )
}
