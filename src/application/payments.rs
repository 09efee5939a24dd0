use crate::application::engine::{OrderEngine, Settlement};
use crate::application::gateway::PaymentGatewayClient;
use crate::domain::actor::{Actor, PhoneNumber};
use crate::domain::order::OrderId;
use crate::domain::payment::{CallbackAck, CallbackEnvelope, PaymentAttempt, PaymentRequest};
use crate::error::Result;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Mobile-money checkout and settlement for orders.
///
/// The provider round trip happens outside the engine lock; only the
/// resulting attempt is written under it.
#[derive(Clone)]
pub struct PaymentService {
    engine: Arc<OrderEngine>,
    gateway: PaymentGatewayClient,
}

impl PaymentService {
    pub fn new(engine: Arc<OrderEngine>, gateway: PaymentGatewayClient) -> Self {
        Self { engine, gateway }
    }

    /// Sends a payment prompt for a confirmed order to `phone`.
    #[instrument(skip(self, actor, phone), fields(actor = %actor.id))]
    pub async fn initiate_payment(
        &self,
        actor: &Actor,
        order_id: OrderId,
        phone: &str,
    ) -> Result<PaymentAttempt> {
        let phone = PhoneNumber::parse(phone)?;
        let (order, total) = self.engine.payable_order(actor, order_id).await?;

        let request = PaymentRequest {
            order: order.id,
            amount: total.whole_units_ceil()?,
            phone: phone.clone(),
            account_reference: format!("Order {}", order.id),
            description: format!("Payment for order {}", order.id),
        };
        let initiated = self.gateway.initiate(&request).await?;

        // the provider may call back before this lands; such a callback is
        // parked by the engine and replayed when the attempt is recorded

        let attempt = self
            .engine
            .record_payment_attempt(order.id, &initiated, total, phone)
            .await?;
        info!(order = %order.id, amount = %total, "Payment initiated");
        Ok(attempt)
    }

    /// Processes a raw provider callback. See [`acknowledge_callback`].
    pub async fn handle_callback(&self, payload: &[u8]) -> CallbackAck {
        acknowledge_callback(&self.engine, payload).await
    }
}

/// Applies a raw provider callback and returns the body to answer with.
///
/// The provider always gets an acceptance, whatever happened here; failures
/// are only logged. Needs no provider credentials, so it also runs on nodes
/// that never initiate payments.
pub async fn acknowledge_callback(engine: &OrderEngine, payload: &[u8]) -> CallbackAck {
    let envelope: CallbackEnvelope = match serde_json::from_slice(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!(error = %e, "Malformed payment callback");
            return CallbackAck::accepted();
        }
    };

    let callback = envelope.body.stk_callback;
    match engine.settle_payment(&callback).await {
        Ok(Settlement::Unmatched) => {
            warn!(checkout_request_id = %callback.checkout_request_id, "Unmatched payment callback acknowledged");
        }
        Ok(settlement) => {
            info!(?settlement, "Payment callback processed");
        }
        Err(e) => {
            error!(error = %e, checkout_request_id = %callback.checkout_request_id, "Payment callback could not be applied");
        }
    }
    CallbackAck::accepted()
}
