use super::actor::PhoneNumber;
use super::money::Money;
use super::order::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-issued identifier tying an initiated payment to its callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckoutRequestId(pub String);

impl fmt::Display for CheckoutRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CheckoutRequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Pending,
    Succeeded,
    Failed,
}

/// Short-lived bearer credential issued by the provider's OAuth endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// A payment request sent to the provider for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub checkout_request_id: CheckoutRequestId,
    pub merchant_request_id: String,
    pub order: OrderId,
    pub amount: Money,
    pub phone: PhoneNumber,
    pub state: PaymentState,
    pub receipt_number: Option<String>,
    pub result_code: Option<i64>,
    pub result_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl PaymentAttempt {
    pub fn is_settled(&self) -> bool {
        self.state != PaymentState::Pending
    }
}

/// What the gateway needs to push a payment prompt to the buyer's phone.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub order: OrderId,
    /// Whole currency units.
    pub amount: u64,
    pub phone: PhoneNumber,
    pub account_reference: String,
    pub description: String,
}

/// The provider's synchronous answer to a payment request.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInitiated {
    pub checkout_request_id: CheckoutRequestId,
    pub merchant_request_id: String,
    pub customer_message: String,
}

/// Inbound settlement notification, in the provider's envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    pub result_code: i64,
    pub result_desc: String,
    #[serde(default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

/// Result code the provider uses when the customer dismisses the prompt.
pub const RESULT_CANCELLED_BY_USER: i64 = 1032;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Succeeded { receipt_number: Option<String> },
    Cancelled,
    Failed { code: i64 },
}

impl StkCallback {
    pub fn correlation_id(&self) -> CheckoutRequestId {
        CheckoutRequestId(self.checkout_request_id.clone())
    }

    pub fn outcome(&self) -> CallbackOutcome {
        match self.result_code {
            0 => CallbackOutcome::Succeeded {
                receipt_number: self.metadata_string("MpesaReceiptNumber"),
            },
            RESULT_CANCELLED_BY_USER => CallbackOutcome::Cancelled,
            code => CallbackOutcome::Failed { code },
        }
    }

    fn metadata_string(&self, name: &str) -> Option<String> {
        let item = self
            .callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?;
        match item.value.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Body returned to the provider for every callback it delivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCESS: &str = r#"{
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "Amount", "Value": 35000.00},
                        {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                        {"Name": "Balance"},
                        {"Name": "TransactionDate", "Value": 20191219102115},
                        {"Name": "PhoneNumber", "Value": 254708374149}
                    ]
                }
            }
        }
    }"#;

    #[test]
    fn test_success_callback_parses() {
        let envelope: CallbackEnvelope = serde_json::from_str(SUCCESS).unwrap();
        let callback = envelope.body.stk_callback;
        assert_eq!(
            callback.correlation_id(),
            CheckoutRequestId::from("ws_CO_191220191020363925")
        );
        assert_eq!(
            callback.outcome(),
            CallbackOutcome::Succeeded {
                receipt_number: Some("NLJ7RT61SV".to_string())
            }
        );
    }

    #[test]
    fn test_cancelled_callback_has_no_metadata() {
        let raw = r#"{"Body":{"stkCallback":{"MerchantRequestID":"m-1","CheckoutRequestID":"ws_CO_1","ResultCode":1032,"ResultDesc":"Request cancelled by user"}}}"#;
        let envelope: CallbackEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.body.stk_callback.outcome(), CallbackOutcome::Cancelled);
    }

    #[test]
    fn test_ack_wire_format() {
        let json = serde_json::to_string(&CallbackAck::accepted()).unwrap();
        assert_eq!(json, r#"{"ResultCode":0,"ResultDesc":"Accepted"}"#);
    }
}
