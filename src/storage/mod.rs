//! Object storage for uploaded images.

pub mod gcs;
mod rollback;

use std::{fmt, future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use uuid::Uuid;

pub use gcs::GcsStore;
pub use rollback::Rollback;

pub type Blobs = Arc<dyn BlobStore>;

/// Logical name shared by every image object. The key prefix keeps objects unique.
const OBJECT_NAME: &str = "image";
const MAX_EXTENSION_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// The store may succeed if the same request is sent again.
	#[error("transient storage failure: {0}")]
	Transient(String),
	#[error("storage failure: {0}")]
	Permanent(String),
}

impl Error {
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(..))
	}
}

/// The name of an object inside the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
	/// Generates a key of the form `<unix-seconds>_<random>_image<.ext>`.
	///
	/// The random component makes keys unique even when many images are
	/// uploaded within the same second.
	pub fn generate(original_name: &str) -> Self {
		let timestamp = chrono::Utc::now().timestamp();
		let token = Uuid::new_v4().simple();

		Self(format!(
			"{timestamp}_{token}_{OBJECT_NAME}{}",
			extension(original_name)
		))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ObjectKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl ObjectKey {
	/// Recovers the key from a URL built by [`public_url`].
	pub fn from_url(url: &str) -> Option<Self> {
		let (_, key) = url.rsplit_once('/')?;

		(!key.is_empty()).then(|| Self(key.to_owned()))
	}
}

impl From<&str> for ObjectKey {
	fn from(key: &str) -> Self {
		Self(key.to_owned())
	}
}

/// Returns the lower-cased extension of `name` including the dot, or an empty
/// string if it has none or it contains anything but ASCII alphanumerics.
fn extension(name: &str) -> String {
	let Some((stem, ext)) = name.rsplit_once('.') else {
		return String::new();
	};

	if stem.is_empty()
		|| ext.is_empty()
		|| ext.len() > MAX_EXTENSION_LEN
		|| !ext.chars().all(|c| c.is_ascii_alphanumeric())
	{
		return String::new();
	}

	format!(".{}", ext.to_ascii_lowercase())
}

/// An object that was written to the store.
#[derive(Debug, Clone)]
pub struct StoredObject {
	pub key: ObjectKey,
	pub url: String,
}

/// A remote object store holding image binaries.
#[axum::async_trait]
pub trait BlobStore: Send + Sync {
	/// Writes `content` under `key` and returns the object's public URL.
	/// Writing the same key twice overwrites the object.
	async fn put(&self, key: &ObjectKey, content: Bytes, content_type: &str)
		-> Result<String, Error>;

	/// Removes an object. Removing a missing object succeeds.
	async fn delete(&self, key: &ObjectKey) -> Result<(), Error>;
}

/// Bounded exponential backoff for transient storage failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	/// Total attempts, including the first one.
	pub max_attempts: u32,
	pub initial_backoff: Duration,
	pub max_backoff: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			initial_backoff: Duration::from_millis(100),
			max_backoff: Duration::from_secs(2),
		}
	}
}

/// Runs `operation` until it succeeds, fails permanently, or runs out of attempts.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, Error>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, Error>>,
{
	let mut attempt = 1;
	let mut backoff = policy.initial_backoff;

	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(error) if error.is_transient() && attempt < policy.max_attempts => {
				tracing::warn!(
					%error,
					attempt,
					max_attempts = policy.max_attempts,
					"retrying storage operation in {backoff:?}"
				);

				tokio::time::sleep(backoff).await;

				attempt += 1;
				backoff = (backoff * 2).min(policy.max_backoff);
			}
			Err(error) => return Err(error),
		}
	}
}

/// Uploads one image under a freshly generated key.
pub async fn upload(
	store: &dyn BlobStore,
	content: Bytes,
	content_type: &str,
	original_name: &str,
	policy: &RetryPolicy,
) -> Result<StoredObject, Error> {
	let key = ObjectKey::generate(original_name);
	let size = content.len();
	let url = {
		let key = &key;
		with_retry(policy, move || store.put(key, content.clone(), content_type)).await?
	};

	tracing::debug!(%key, size, "stored image");

	Ok(StoredObject { key, url })
}

/// Deletes `keys` one by one. Failures are logged and skipped.
pub async fn delete_all(store: &dyn BlobStore, keys: Vec<ObjectKey>) {
	for key in keys {
		match store.delete(&key).await {
			Ok(()) => tracing::info!(%key, "deleted object"),
			Err(error) => tracing::warn!(%key, %error, "failed to delete object"),
		}
	}
}

/// Builds the public URL of an object: `https://<host>/<bucket>/<key>`.
pub fn public_url(host: &str, bucket: &str, key: &ObjectKey) -> String {
	format!("https://{host}/{bucket}/{key}")
}
