//! Runtime settings.
//!
//! Settings are layered: built-in defaults, then `config/feed_sync.toml` when it exists, then
//! `FEED_SYNC_*` environment variables. A `.env` file in the working directory is loaded into
//! the environment first.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix of the environment variables read by `Settings::load`.
pub const ENV_PREFIX: &str = "FEED_SYNC";
/// Optional settings file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/feed_sync.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Failed to load settings: {0}")]
	Load(#[from] ::config::ConfigError),
	#[error("token_key must be set (FEED_SYNC_TOKEN_KEY)")]
	MissingTokenKey,
	#[error("Invalid setting {key}: {reason}")]
	Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	Pretty,
	Json,
}

#[derive(Clone, Deserialize)]
pub struct Settings {
	pub database_path: PathBuf,
	/// Secret the token vault derives its key from.
	pub token_key: String,
	/// Provider API root. When unset the CLI runs against the in-process mock provider.
	#[serde(default)]
	pub provider_base_url: Option<String>,
	pub provider_client_id: String,
	pub provider_client_secret: String,
	pub rate_limit_max_retries: u32,
	pub http_timeout_seconds: u64,
	pub log_level: String,
	pub log_format: LogFormat,
}

impl std::fmt::Debug for Settings {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Settings")
			.field("database_path", &self.database_path)
			.field("token_key", &"<redacted>")
			.field("provider_base_url", &self.provider_base_url)
			.field("provider_client_id", &self.provider_client_id)
			.field("provider_client_secret", &"<redacted>")
			.field("rate_limit_max_retries", &self.rate_limit_max_retries)
			.field("http_timeout_seconds", &self.http_timeout_seconds)
			.field("log_level", &self.log_level)
			.field("log_format", &self.log_format)
			.finish()
	}
}

impl Settings {
	/// Load settings from `.env`, the default settings file and the process environment.
	pub fn load() -> Result<Self, ConfigError> {
		dotenvy::dotenv().ok();
		Self::build(
			Path::new(DEFAULT_CONFIG_FILE),
			::config::Environment::with_prefix(ENV_PREFIX),
		)
	}

	fn build(file: &Path, env: ::config::Environment) -> Result<Self, ConfigError> {
		let mut builder = ::config::Config::builder()
			.set_default("database_path", "feed_sync.db")?
			.set_default("token_key", "")?
			.set_default("provider_client_id", "demo-client")?
			.set_default("provider_client_secret", "demo-secret")?
			.set_default("rate_limit_max_retries", 5_i64)?
			.set_default("http_timeout_seconds", 10_i64)?
			.set_default("log_level", "info")?
			.set_default("log_format", "pretty")?;
		if file.exists() {
			builder = builder.add_source(::config::File::from(file));
		}

		let settings: Settings = builder
			.add_source(env.try_parsing(true))
			.build()?
			.try_deserialize()?;
		settings.validate()?;
		Ok(settings)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.token_key.is_empty() {
			return Err(ConfigError::MissingTokenKey);
		}
		if self.http_timeout_seconds == 0 {
			return Err(ConfigError::Invalid {
				key: "http_timeout_seconds",
				reason: "must be greater than zero".to_string(),
			});
		}
		if let Some(url) = &self.provider_base_url {
			if !(url.starts_with("http://") || url.starts_with("https://")) {
				return Err(ConfigError::Invalid {
					key: "provider_base_url",
					reason: format!("{} is not an http(s) URL", url),
				});
			}
		}
		Ok(())
	}

	pub fn http_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.http_timeout_seconds)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	fn env(vars: &[(&str, &str)]) -> ::config::Environment {
		let map: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		::config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
	}

	#[test]
	fn test_defaults() {
		let settings = Settings::build(
			Path::new("does/not/exist.toml"),
			env(&[("FEED_SYNC_TOKEN_KEY", "secret")]),
		)
		.unwrap();

		assert_eq!(settings.database_path, PathBuf::from("feed_sync.db"));
		assert_eq!(settings.provider_base_url, None);
		assert_eq!(settings.provider_client_id, "demo-client");
		assert_eq!(settings.rate_limit_max_retries, 5);
		assert_eq!(settings.http_timeout_seconds, 10);
		assert_eq!(settings.log_format, LogFormat::Pretty);
	}

	#[test]
	fn test_missing_token_key() {
		let result = Settings::build(Path::new("does/not/exist.toml"), env(&[]));
		assert!(matches!(result, Err(ConfigError::MissingTokenKey)));
	}

	#[test]
	fn test_environment_overrides_file() {
		let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
		writeln!(
			file,
			"token_key = \"from-file\"\nrate_limit_max_retries = 2\nlog_format = \"json\"\nprovider_base_url = \"https://bank.example\""
		)
		.unwrap();

		let settings = Settings::build(
			file.path(),
			env(&[("FEED_SYNC_RATE_LIMIT_MAX_RETRIES", "7")]),
		)
		.unwrap();

		assert_eq!(settings.token_key, "from-file");
		assert_eq!(settings.rate_limit_max_retries, 7);
		assert_eq!(settings.log_format, LogFormat::Json);
		assert_eq!(settings.provider_base_url.as_deref(), Some("https://bank.example"));
	}

	#[test]
	fn test_rejects_non_http_base_url() {
		let result = Settings::build(
			Path::new("does/not/exist.toml"),
			env(&[
				("FEED_SYNC_TOKEN_KEY", "secret"),
				("FEED_SYNC_PROVIDER_BASE_URL", "ftp://bank.example"),
			]),
		);
		assert!(matches!(
			result,
			Err(ConfigError::Invalid { key: "provider_base_url", .. })
		));
	}

	#[test]
	fn test_debug_redacts_secrets() {
		let settings = Settings::build(
			Path::new("does/not/exist.toml"),
			env(&[("FEED_SYNC_TOKEN_KEY", "super-secret-key")]),
		)
		.unwrap();
		let printed = format!("{:?}", settings);
		assert!(!printed.contains("super-secret-key"));
		assert!(!printed.contains("demo-secret"));
	}
}
