use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::storage::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0} must be set")]
	Missing(&'static str),
	#[error("{name} is invalid: {value:?}")]
	Invalid { name: &'static str, value: String },
}

/// Where uploaded images are stored.
#[derive(Debug, Clone)]
pub struct GcsConfig {
	pub bucket: String,
	/// Path to the service account JSON key.
	pub credentials_path: PathBuf,
	pub host: String,
}

/// Runtime configuration, read from the environment (and a `.env` file, if present).
#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub database_max_connections: u32,
	pub port: u16,
	pub gcs: GcsConfig,
	pub request_timeout: Duration,
	pub retry: RetryPolicy,
	/// Export traces and metrics over OTLP in addition to logging them.
	pub otel: bool,
}

impl Config {
	pub fn from_env() -> Result<Self, Error> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
		let required = |name: &'static str| lookup(name).ok_or(Error::Missing(name));

		Ok(Self {
			database_url: required("DATABASE_URL")?,
			database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
			port: parse(&lookup, "PORT", 3000)?,
			gcs: GcsConfig {
				bucket: required("GCS_BUCKET")?,
				credentials_path: required("GOOGLE_APPLICATION_CREDENTIALS")?.into(),
				host: lookup("GCS_HOST").unwrap_or_else(|| "storage.googleapis.com".into()),
			},
			request_timeout: Duration::from_secs(parse(&lookup, "REQUEST_TIMEOUT_SECS", 30)?),
			retry: RetryPolicy {
				max_attempts: parse(&lookup, "UPLOAD_MAX_ATTEMPTS", 3)?,
				..RetryPolicy::default()
			},
			otel: parse(&lookup, "OTEL_ENABLED", false)?,
		})
	}
}

fn parse<T: FromStr>(
	lookup: &impl Fn(&str) -> Option<String>,
	name: &'static str,
	default: T,
) -> Result<T, Error> {
	match lookup(name) {
		Some(value) => value.parse().map_err(|_| Error::Invalid { name, value }),
		None => Ok(default),
	}
}
