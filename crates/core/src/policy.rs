//! Pure strategy selection for presenting a hosted payment page.
//!
//! Nothing here touches the host: given a target URL, a device class and the
//! strategies already ruled out, [`PresentationPolicy::choose_strategy`]
//! always returns the same answer.

use glob::Pattern;
use payframe_protocol::{DeviceClass, Strategy};
use tracing::trace;
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};

const DEFAULT_GATEWAY_LABEL: &str = "Payment Gateway";

/// Host-name pattern with glob syntax.
///
/// A pattern without glob metacharacters is a domain: it matches the host
/// itself and every subdomain of it.
#[derive(Debug, Clone)]
pub struct HostPattern {
	source: String,
	glob: Pattern,
	is_domain: bool,
}

impl HostPattern {
	pub fn new(pattern: &str) -> Result<Self> {
		let source = pattern.trim().trim_end_matches('.').to_ascii_lowercase();
		let glob = Pattern::new(&source).map_err(|source_err| Error::HostPattern {
			pattern: pattern.to_string(),
			source: source_err,
		})?;
		let is_domain = !source.contains(['*', '?', '[']);
		Ok(Self { source, glob, is_domain })
	}

	pub fn as_str(&self) -> &str {
		&self.source
	}

	pub fn matches(&self, host: &str) -> bool {
		let host = host.trim_end_matches('.').to_ascii_lowercase();
		if self.glob.matches(&host) {
			return true;
		}
		self.is_domain && host.strip_suffix(self.source.as_str()).is_some_and(|prefix| prefix.ends_with('.'))
	}
}

/// Compiled presentation policy.
#[derive(Debug, Clone)]
pub struct PresentationPolicy {
	prefer_embedded: bool,
	denied: Vec<HostPattern>,
	labels: Vec<(HostPattern, String)>,
	desktop_fallbacks: Vec<Strategy>,
	mobile_fallbacks: Vec<Strategy>,
}

impl PresentationPolicy {
	/// Compiles host patterns and fallback orders from configuration.
	pub fn from_config(config: &Config) -> Result<Self> {
		let denied = config.framing_denied_hosts.iter().map(|p| HostPattern::new(p)).collect::<Result<Vec<_>>>()?;
		let labels = config
			.gateway_labels
			.iter()
			.map(|entry| Ok((HostPattern::new(&entry.pattern)?, entry.label.clone())))
			.collect::<Result<Vec<_>>>()?;

		Ok(Self {
			prefer_embedded: config.prefer_embedded,
			denied,
			labels,
			desktop_fallbacks: config.desktop_fallbacks.clone(),
			mobile_fallbacks: config.mobile_fallbacks.clone(),
		})
	}

	/// Adds framing-denied host patterns on top of the configured ones.
	pub fn extend_denied<I, S>(&mut self, patterns: I) -> Result<()>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		for pattern in patterns {
			self.denied.push(HostPattern::new(pattern.as_ref())?);
		}
		Ok(())
	}

	/// Returns `true` when the target host is known to refuse framing.
	pub fn denies_framing(&self, target: &Url) -> bool {
		target.host_str().is_some_and(|host| self.denied.iter().any(|pattern| pattern.matches(host)))
	}

	/// Picks the next strategy to try, or `None` once every strategy is excluded.
	pub fn choose_strategy(&self, target: &Url, device: DeviceClass, excluded: &[Strategy]) -> Option<Strategy> {
		let framing_denied = self.denies_framing(target);
		if self.prefer_embedded && !framing_denied && !excluded.contains(&Strategy::Embedded) {
			return Some(Strategy::Embedded);
		}

		let order = match device {
			DeviceClass::Desktop => &self.desktop_fallbacks,
			DeviceClass::Mobile => &self.mobile_fallbacks,
		};
		let choice = order
			.iter()
			.copied()
			.chain(std::iter::once(Strategy::FullNavigation))
			.find(|strategy| *strategy != Strategy::Embedded && !excluded.contains(strategy));

		trace!(
			target = "payframe.policy",
			host = target.host_str().unwrap_or_default(),
			%device,
			framing_denied,
			excluded = ?excluded,
			choice = ?choice,
			"strategy resolved"
		);
		choice
	}

	/// Display name for the gateway serving `target`.
	pub fn gateway_label(&self, target: &Url) -> &str {
		let Some(host) = target.host_str() else {
			return DEFAULT_GATEWAY_LABEL;
		};
		self.labels
			.iter()
			.find(|(pattern, _)| pattern.matches(host))
			.map(|(_, label)| label.as_str())
			.unwrap_or(DEFAULT_GATEWAY_LABEL)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::GatewayLabel;

	fn url(s: &str) -> Url {
		Url::parse(s).unwrap()
	}

	fn policy_with_denied(patterns: &[&str]) -> PresentationPolicy {
		let config = Config {
			framing_denied_hosts: patterns.iter().map(|p| p.to_string()).collect(),
			..Config::default()
		};
		PresentationPolicy::from_config(&config).unwrap()
	}

	#[test]
	fn default_policy_embeds() {
		let policy = PresentationPolicy::from_config(&Config::default()).unwrap();
		let choice = policy.choose_strategy(&url("https://pay.example/s/abc"), DeviceClass::Desktop, &[]);
		assert_eq!(choice, Some(Strategy::Embedded));
	}

	#[test]
	fn denied_host_goes_straight_to_popup() {
		let policy = policy_with_denied(&["pay.example"]);
		let choice = policy.choose_strategy(&url("https://pay.example/s/abc"), DeviceClass::Desktop, &[]);
		assert_eq!(choice, Some(Strategy::Popup));
	}

	#[test]
	fn denied_host_never_embeds_for_any_exclusion_set() {
		let policy = policy_with_denied(&["*.bkash.com", "nagad.com.bd"]);
		let targets = ["https://sandbox.payment.bkash.com/x", "https://nagad.com.bd/pay", "https://api.nagad.com.bd/"];
		let exclusions: [&[Strategy]; 4] = [&[], &[Strategy::Popup], &[Strategy::Popup, Strategy::NewTab], &Strategy::ALL];
		for target in targets {
			for device in [DeviceClass::Desktop, DeviceClass::Mobile] {
				for excluded in exclusions {
					let choice = policy.choose_strategy(&url(target), device, excluded);
					assert_ne!(choice, Some(Strategy::Embedded), "{target} {device} {excluded:?}");
				}
			}
		}
	}

	#[test]
	fn excluded_embedded_falls_back_in_order() {
		let policy = PresentationPolicy::from_config(&Config::default()).unwrap();
		let target = url("https://pay.example/s/abc");
		assert_eq!(policy.choose_strategy(&target, DeviceClass::Desktop, &[Strategy::Embedded]), Some(Strategy::Popup));
		assert_eq!(
			policy.choose_strategy(&target, DeviceClass::Desktop, &[Strategy::Embedded, Strategy::Popup]),
			Some(Strategy::NewTab)
		);
		assert_eq!(
			policy.choose_strategy(&target, DeviceClass::Desktop, &[Strategy::Embedded, Strategy::Popup, Strategy::NewTab]),
			Some(Strategy::FullNavigation)
		);
		assert_eq!(policy.choose_strategy(&target, DeviceClass::Desktop, &Strategy::ALL), None);
	}

	#[test]
	fn mobile_defaults_to_full_navigation() {
		let policy = policy_with_denied(&["pay.example"]);
		let choice = policy.choose_strategy(&url("https://pay.example/s/abc"), DeviceClass::Mobile, &[]);
		assert_eq!(choice, Some(Strategy::FullNavigation));
	}

	#[test]
	fn full_navigation_is_implicit_last_resort() {
		let config = Config {
			desktop_fallbacks: vec![Strategy::NewTab],
			prefer_embedded: false,
			..Config::default()
		};
		let policy = PresentationPolicy::from_config(&config).unwrap();
		let target = url("https://pay.example/");
		assert_eq!(policy.choose_strategy(&target, DeviceClass::Desktop, &[]), Some(Strategy::NewTab));
		assert_eq!(policy.choose_strategy(&target, DeviceClass::Desktop, &[Strategy::NewTab]), Some(Strategy::FullNavigation));
	}

	#[test]
	fn callers_can_extend_denied_patterns() {
		let mut policy = PresentationPolicy::from_config(&Config::default()).unwrap();
		let target = url("https://checkout.upay.com.bd/");
		assert!(!policy.denies_framing(&target));
		policy.extend_denied(["upay.com.bd"]).unwrap();
		assert!(policy.denies_framing(&target));
	}

	#[test]
	fn domain_pattern_does_not_match_lookalike_suffix() {
		let pattern = HostPattern::new("bkash.com").unwrap();
		assert!(pattern.matches("bkash.com"));
		assert!(pattern.matches("payment.bkash.com"));
		assert!(!pattern.matches("notbkash.com"));
		assert!(pattern.matches("PAYMENT.BKASH.COM."));
	}

	#[test]
	fn invalid_pattern_is_reported() {
		let err = HostPattern::new("[unclosed").unwrap_err();
		assert!(matches!(err, Error::HostPattern { .. }));
	}

	#[test]
	fn gateway_label_lookup() {
		let config = Config {
			gateway_labels: vec![GatewayLabel {
				pattern: "bkash.com".to_string(),
				label: "bKash".to_string(),
			}],
			..Config::default()
		};
		let policy = PresentationPolicy::from_config(&config).unwrap();
		assert_eq!(policy.gateway_label(&url("https://payment.bkash.com/x")), "bKash");
		assert_eq!(policy.gateway_label(&url("https://pay.example/")), "Payment Gateway");
	}
}
