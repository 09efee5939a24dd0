use crate::application::token_cache::{ACCESS_TOKEN_CACHE_KEY, TokenCache};
use crate::domain::payment::{AccessToken, PaymentInitiated, PaymentRequest};
use crate::domain::ports::{CredentialExchange, PaymentProvider};
use crate::error::{MarketError, Result};
use std::sync::Arc;
use tracing::{info, instrument};

/// Front door to the mobile-money provider.
///
/// Owns no HTTP state itself: credentials come through the injected
/// [`TokenCache`] and [`CredentialExchange`], payment prompts through the
/// [`PaymentProvider`]. Tests swap both ports for fakes.
#[derive(Clone)]
pub struct PaymentGatewayClient {
    cache: Arc<TokenCache>,
    exchange: Arc<dyn CredentialExchange>,
    provider: Arc<dyn PaymentProvider>,
}

impl PaymentGatewayClient {
    pub fn new(
        cache: Arc<TokenCache>,
        exchange: Arc<dyn CredentialExchange>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            cache,
            exchange,
            provider,
        }
    }

    /// Returns a usable access token, or `None` when the provider could not
    /// issue one. Never fails hard; the caller decides whether to retry.
    pub async fn access_token(&self) -> Option<AccessToken> {
        let exchange = self.exchange.clone();
        self.cache
            .get_or_refresh(ACCESS_TOKEN_CACHE_KEY, || async move { exchange.exchange().await })
            .await
    }

    /// Sends a payment prompt for `request`.
    #[instrument(skip(self), fields(order = %request.order, amount = request.amount))]
    pub async fn initiate(&self, request: &PaymentRequest) -> Result<PaymentInitiated> {
        let token = self.access_token().await.ok_or_else(|| {
            MarketError::PaymentGatewayError("Could not obtain an access token".to_string())
        })?;
        let initiated = self.provider.request_payment(&token, request).await?;
        info!(
            checkout_request_id = %initiated.checkout_request_id,
            "Payment prompt sent"
        );
        Ok(initiated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::PhoneNumber;
    use crate::domain::order::OrderId;
    use crate::domain::payment::CheckoutRequestId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingExchange {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CredentialExchange for CountingExchange {
        async fn exchange(&self) -> Result<AccessToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MarketError::PaymentGatewayError("503".into()))
            } else {
                Ok(AccessToken::new("token"))
            }
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl PaymentProvider for EchoProvider {
        async fn request_payment(
            &self,
            token: &AccessToken,
            request: &PaymentRequest,
        ) -> Result<PaymentInitiated> {
            assert_eq!(token.secret(), "token");
            Ok(PaymentInitiated {
                checkout_request_id: CheckoutRequestId(format!("ws_CO_{}", request.order)),
                merchant_request_id: "m-1".to_string(),
                customer_message: String::new(),
            })
        }
    }

    fn client(fail: bool) -> (PaymentGatewayClient, Arc<CountingExchange>) {
        let exchange = Arc::new(CountingExchange {
            calls: AtomicUsize::new(0),
            fail,
        });
        let client = PaymentGatewayClient::new(
            Arc::new(TokenCache::new(Duration::from_secs(3500))),
            exchange.clone(),
            Arc::new(EchoProvider),
        );
        (client, exchange)
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            order: OrderId(7),
            amount: 100,
            phone: PhoneNumber::parse("0712345678").unwrap(),
            account_reference: "Order 7".to_string(),
            description: "Payment for order 7".to_string(),
        }
    }

    #[tokio::test]
    async fn test_token_fetched_once_then_cached() {
        let (client, exchange) = client(false);
        assert!(client.access_token().await.is_some());
        assert!(client.access_token().await.is_some());
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initiate_without_token_is_retryable() {
        let (client, _) = client(true);
        let err = client.initiate(&request()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_initiate_returns_correlation_id() {
        let (client, _) = client(false);
        let initiated = client.initiate(&request()).await.unwrap();
        assert_eq!(initiated.checkout_request_id.0, "ws_CO_7");
    }
}
