//! Request/response shapes for the server-side gateway session API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Order details forwarded to the gateway when creating a payment session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrderFields {
	pub order_id: String,
	pub customer_name: String,
	pub customer_email: String,
	pub customer_phone: String,
	pub amount: f64,
	#[serde(default = "default_currency")]
	pub currency: String,
	#[serde(default = "default_product_name")]
	pub product_name: String,
}

fn default_currency() -> String {
	"BDT".to_string()
}

fn default_product_name() -> String {
	"Product".to_string()
}

/// Gateway response for a newly created hosted payment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSession {
	/// Hosted payment page address; opaque to the controller.
	pub url: String,
	/// Gateway session identifier used for verification.
	pub id: String,
}

/// Gateway-reported validation status for a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
	Valid,
	Validated,
	Invalid,
	Failed,
	Pending,
	#[serde(other)]
	Unknown,
}

/// Result of verifying a session with the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
	pub status: VerificationStatus,
	#[serde(default)]
	pub amount: Option<f64>,
	/// Full gateway response.
	#[serde(default)]
	pub raw: Value,
}

impl Verification {
	/// Returns `true` when the gateway confirmed the payment.
	pub fn is_verified(&self) -> bool {
		matches!(self.status, VerificationStatus::Valid | VerificationStatus::Validated)
	}
}
