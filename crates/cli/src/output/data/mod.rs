//! Payload models for each command's `data` field.

use payframe::{DeviceClass, Outcome, Strategy};
use serde::Serialize;
use serde_json::Value;

use crate::scripted::CallRecord;

/// One step of a strategy walk-through.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyStep {
	pub strategy: Strategy,
	/// Strategies ruled out before this one was picked.
	pub excluded: Vec<Strategy>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyData {
	pub url: String,
	pub host: String,
	pub device: DeviceClass,
	pub framing_denied: bool,
	pub gateway: String,
	/// First choice given the requested exclusions.
	pub strategy: Option<Strategy>,
	/// Order the fallback would walk if every attempt were blocked.
	pub chain: Vec<StrategyStep>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyData {
	/// `message` or `location`.
	pub input: &'static str,
	pub kind: String,
	pub terminal: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub height: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub html_length: Option<usize>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigData {
	/// `default` or the file path the configuration came from.
	pub source: String,
	pub config: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayData {
	pub outcome: Outcome,
	pub kind: String,
	pub elapsed_ms: u64,
	pub steps_applied: usize,
	pub steps_skipped: usize,
	pub calls: Vec<CallRecord>,
}
