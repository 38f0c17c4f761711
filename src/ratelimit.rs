use std::{sync::Arc, time::Duration};

use axum::{
	body::Body,
	response::{IntoResponse, Response},
};
use governor::{
	clock::QuantaInstant,
	middleware::{RateLimitingMiddleware, StateInformationMiddleware},
};
use tower_governor::{
	governor::{GovernorConfig, GovernorConfigBuilder},
	key_extractor::{KeyExtractor, PeerIpKeyExtractor},
	GovernorError,
};

use crate::error::AppError;

pub type Limiter = Arc<GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>>;

/// Per-peer request limits. Keys are peer addresses, so the server must be
/// served with connect info.
#[derive(Clone)]
pub struct Limits {
	/// Applied to every route.
	pub default: Limiter,
	/// Applied to authentication routes on top of the default.
	pub secure: Limiter,
}

impl Default for Limits {
	fn default() -> Self {
		Self {
			default: default(),
			secure: secure(),
		}
	}
}

impl Limits {
	/// Starts evicting stale entries from both limiters in the background.
	pub fn spawn_cleanup(&self) {
		cleanup_old_limits(&[&self.default, &self.secure]);
	}
}

fn default() -> Limiter {
	Arc::new(
		GovernorConfigBuilder::default()
			.per_second(10)
			.burst_size(50)
			.use_headers()
			.error_handler(error_handler)
			.finish()
			.expect("default rate limit is valid"),
	)
}

fn secure() -> Limiter {
	Arc::new(
		GovernorConfigBuilder::default()
			.per_second(1)
			.burst_size(5)
			.use_headers()
			.error_handler(error_handler)
			.finish()
			.expect("secure rate limit is valid"),
	)
}

fn error_handler(error: GovernorError) -> Response<Body> {
	AppError::from(error).into_response()
}

fn cleanup_old_limits<T, M>(configs: &[&Arc<GovernorConfig<T, M>>])
where
	T: KeyExtractor,
	<T as KeyExtractor>::Key: Send + Sync + 'static,
	M: RateLimitingMiddleware<QuantaInstant> + Send + Sync + 'static,
{
	let limiters = configs
		.iter()
		.map(|config| config.limiter().clone())
		.collect::<Vec<_>>();
	let interval = Duration::from_secs(60);

	std::thread::spawn(move || loop {
		std::thread::sleep(interval);

		for limiter in &limiters {
			tracing::debug!("rate limiting storage size: {}", limiter.len());

			limiter.retain_recent();
		}
	});
}

#[cfg(test)]
mod test {
	use axum::http::StatusCode;

	use super::*;

	#[test]
	fn test_rejection_is_enveloped() {
		let response = error_handler(GovernorError::TooManyRequests {
			wait_time: 1,
			headers: None,
		});

		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
	}
}
