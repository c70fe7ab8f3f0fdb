use payframe::{Config, DeviceClass, PresentationPolicy, Strategy};
use tracing::debug;
use url::Url;

use crate::error::{CliError, Result};
use crate::output::{StrategyData, StrategyStep};

/// Resolves the first strategy for `url` and the fallback chain behind it.
pub fn execute(url: &str, device: DeviceClass, exclude: &[Strategy], deny: &[String], config: &Config) -> Result<StrategyData> {
	let target = Url::parse(url.trim()).map_err(|source| CliError::InvalidUrl {
		url: url.to_string(),
		source,
	})?;
	let host = target
		.host_str()
		.ok_or_else(|| CliError::InvalidInput(format!("URL '{url}' has no host")))?
		.to_string();

	let mut policy = PresentationPolicy::from_config(config)?;
	policy.extend_denied(deny)?;
	let device = config.device_class.unwrap_or(device);

	let mut excluded = exclude.to_vec();
	let mut chain = Vec::new();
	while let Some(strategy) = policy.choose_strategy(&target, device, &excluded) {
		chain.push(StrategyStep {
			strategy,
			excluded: excluded.clone(),
		});
		excluded.push(strategy);
	}
	debug!(target = "payframe.cli", %host, %device, steps = chain.len(), "strategy chain resolved");

	Ok(StrategyData {
		url: target.to_string(),
		framing_denied: policy.denies_framing(&target),
		gateway: policy.gateway_label(&target).to_string(),
		strategy: chain.first().map(|step| step.strategy),
		host,
		device,
		chain,
	})
}
