use crate::config::MpesaConfig;
use crate::domain::payment::{AccessToken, CheckoutRequestId, PaymentInitiated, PaymentRequest};
use crate::domain::ports::{CredentialExchange, PaymentProvider};
use crate::error::{MarketError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const TOKEN_PATH: &str = "/oauth/v1/generate?grant_type=client_credentials";
const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";
/// The provider expects timestamps in East Africa Time.
const EAT_OFFSET_SECS: i32 = 3 * 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: u64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    account_reference: &'a str,
    transaction_desc: &'a str,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
    #[serde(rename = "CustomerMessage")]
    customer_message: Option<String>,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// HTTP client for the M-Pesa Daraja API.
///
/// One `reqwest::Client` is shared by all requests; it pools connections
/// without a lock, and every request is bounded by the configured timeout.
#[derive(Clone)]
pub struct MpesaClient {
    http: reqwest::Client,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
    shortcode: Option<String>,
    passkey: Option<String>,
    callback_url: Option<String>,
}

impl MpesaClient {
    /// Builds a client for the configured environment. Consumer credentials
    /// are required; the STK push settings are only checked when a payment is
    /// requested.
    pub fn new(config: &MpesaConfig) -> Result<Self> {
        Self::with_base_url(config, config.environment.base_url())
    }

    pub fn with_base_url(config: &MpesaConfig, base_url: impl Into<String>) -> Result<Self> {
        let missing = |name: &str| MarketError::ConfigError(format!("{} is not set", name));
        let consumer_key = config
            .consumer_key
            .clone()
            .ok_or_else(|| missing("MPESA_CONSUMER_KEY"))?;
        let consumer_secret = config
            .consumer_secret
            .clone()
            .ok_or_else(|| missing("MPESA_CONSUMER_SECRET"))?;

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| MarketError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            consumer_key,
            consumer_secret,
            shortcode: config.shortcode.clone(),
            passkey: config.passkey.clone(),
            callback_url: config.callback_url.clone(),
        })
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.base_url, TOKEN_PATH)
    }

    pub fn stk_push_url(&self) -> String {
        format!("{}{}", self.base_url, STK_PUSH_PATH)
    }

    fn stk_settings(&self) -> Result<(&str, &str, &str)> {
        let missing = |name: &str| MarketError::ConfigError(format!("{} is not set", name));
        Ok((
            self.shortcode
                .as_deref()
                .ok_or_else(|| missing("MPESA_SHORTCODE"))?,
            self.passkey.as_deref().ok_or_else(|| missing("MPESA_PASSKEY"))?,
            self.callback_url
                .as_deref()
                .ok_or_else(|| missing("MPESA_CALLBACK_URL"))?,
        ))
    }
}

/// Formats `now` the way the provider expects (`YYYYMMDDHHmmss`, EAT).
pub fn provider_timestamp(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECS) {
        Some(eat) => now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string(),
        None => now.format("%Y%m%d%H%M%S").to_string(),
    }
}

/// `base64(shortcode + passkey + timestamp)`, the STK push password.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

fn parse_token_response(body: &str) -> Result<AccessToken> {
    let parsed: TokenResponse = serde_json::from_str(body).map_err(|e| {
        MarketError::PaymentGatewayError(format!("Malformed token response: {}", e))
    })?;
    parsed
        .access_token
        .filter(|token| !token.is_empty())
        .map(AccessToken::new)
        .ok_or_else(|| {
            MarketError::PaymentGatewayError(
                "Could not find 'access_token' in the response".to_string(),
            )
        })
}

fn parse_stk_push_response(body: &str) -> Result<PaymentInitiated> {
    let parsed: StkPushResponse = serde_json::from_str(body).map_err(|e| {
        MarketError::PaymentGatewayError(format!("Malformed payment response: {}", e))
    })?;

    if parsed.response_code.as_deref() != Some("0") {
        let reason = parsed
            .error_message
            .or(parsed.response_description)
            .unwrap_or_else(|| "payment request refused".to_string());
        return Err(MarketError::PaymentGatewayError(reason));
    }

    let checkout_request_id = parsed.checkout_request_id.ok_or_else(|| {
        MarketError::PaymentGatewayError("Response carried no CheckoutRequestID".to_string())
    })?;
    Ok(PaymentInitiated {
        checkout_request_id: CheckoutRequestId(checkout_request_id),
        merchant_request_id: parsed.merchant_request_id.unwrap_or_default(),
        customer_message: parsed.customer_message.unwrap_or_default(),
    })
}

#[async_trait]
impl CredentialExchange for MpesaClient {
    #[instrument(name = "mpesa::exchange", skip(self))]
    async fn exchange(&self) -> Result<AccessToken> {
        let response = self
            .http
            .get(self.token_url())
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        debug!("Received token response");
        parse_token_response(&body)
    }
}

#[async_trait]
impl PaymentProvider for MpesaClient {
    #[instrument(name = "mpesa::request_payment", skip(self, token), fields(order = %request.order, amount = request.amount))]
    async fn request_payment(
        &self,
        token: &AccessToken,
        request: &PaymentRequest,
    ) -> Result<PaymentInitiated> {
        let (shortcode, passkey, callback_url) = self.stk_settings()?;
        let timestamp = provider_timestamp(Utc::now());
        let body = StkPushBody {
            business_short_code: shortcode,
            password: stk_password(shortcode, passkey, &timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount: request.amount,
            party_a: request.phone.as_str(),
            party_b: shortcode,
            phone_number: request.phone.as_str(),
            callback_url,
            account_reference: &request.account_reference,
            transaction_desc: &request.description,
        };

        // the provider reports refusals in a JSON body, often with a 4xx
        let response = self
            .http
            .post(self.stk_push_url())
            .bearer_auth(token.secret())
            .json(&body)
            .send()
            .await?;
        let text = response.text().await?;
        parse_stk_push_response(&text)
    }
}
