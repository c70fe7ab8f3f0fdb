//! Server-side gateway session API contract.
//!
//! The controller only consumes the `url` of a [`CreatedSession`]; creating
//! and verifying sessions happens on the merchant's server through an
//! implementation of [`GatewaySessionApi`].

use std::sync::LazyLock;

use async_trait::async_trait;
use payframe_protocol::{CreatedSession, OrderFields, Verification};
use regex::Regex;

use crate::error::{Error, Result};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("EMAIL_RE should compile"));

/// Gateway operations backing a hosted payment page.
#[async_trait]
pub trait GatewaySessionApi: Send + Sync {
	/// Creates a hosted payment session for a validated order.
	async fn create_session(&self, order: &OrderFields) -> Result<CreatedSession>;

	/// Asks the gateway whether a session completed with a valid payment.
	async fn verify_session(&self, session_id: &str) -> Result<Verification>;
}

/// Checks the fields every gateway requires before a session is created.
pub fn validate_order(order: &OrderFields) -> Result<()> {
	let required = [
		("order_id", &order.order_id),
		("customer_name", &order.customer_name),
		("customer_email", &order.customer_email),
		("customer_phone", &order.customer_phone),
	];
	if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
		return Err(Error::InvalidOrder(format!("missing required field: {field}")));
	}
	if !EMAIL_RE.is_match(order.customer_email.trim()) {
		return Err(Error::InvalidOrder("invalid email address".to_string()));
	}
	if !order.amount.is_finite() || order.amount <= 0.0 {
		return Err(Error::InvalidOrder("invalid amount".to_string()));
	}
	Ok(())
}

/// Validates `order` and creates a session, returning the URL to open.
pub async fn start_session<G>(gateway: &G, order: &OrderFields) -> Result<CreatedSession>
where
	G: GatewaySessionApi + ?Sized,
{
	validate_order(order)?;
	let session = gateway.create_session(order).await?;
	if session.url.trim().is_empty() {
		return Err(Error::Gateway(format!("gateway returned no payment URL for order {}", order.order_id)));
	}
	tracing::debug!(target = "payframe.gateway", order_id = %order.order_id, session_id = %session.id, "gateway session created");
	Ok(session)
}
