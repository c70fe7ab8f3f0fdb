use std::path::Path;

use payframe::Config;

use crate::error::Result;
use crate::output::ConfigData;

/// Loads the configuration named by `--config`, or the defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
	match path {
		Some(path) => Ok(Config::from_file(path)?),
		None => Ok(Config::default()),
	}
}

pub fn execute(path: Option<&Path>, config: &Config) -> Result<ConfigData> {
	Ok(ConfigData {
		source: path.map_or_else(|| "default".to_string(), |path| path.display().to_string()),
		config: serde_json::to_value(config)?,
	})
}
