//! Google Cloud Storage backend.
//!
//! Requests are authorised with V4 signed URLs produced from a service account
//! key, so no OAuth token exchange is needed.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{header, Client, Method, StatusCode};
use rsa::{
	pkcs1v15::SigningKey,
	pkcs8::DecodePrivateKey,
	signature::{SignatureEncoding, Signer},
	RsaPrivateKey,
};
use sha2::{Digest, Sha256};

use super::{public_url, BlobStore, Error, ObjectKey};
use crate::config::GcsConfig;

/// Characters that must be percent-encoded in the path component.
const PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'/')
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'~');

const SIGNATURE_TTL: Duration = Duration::from_secs(300);
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum InitError {
	#[error("failed to read service account key at {path}: {source}")]
	Read {
		path: String,
		source: std::io::Error,
	},
	#[error("invalid service account key: {0}")]
	Json(#[from] serde_json::Error),
	#[error("invalid service account private key: {0}")]
	Key(#[from] rsa::pkcs8::Error),
	#[error("failed to build http client: {0}")]
	Http(#[from] reqwest::Error),
}

#[derive(serde::Deserialize)]
struct ServiceAccount {
	client_email: String,
	private_key: String,
}

/// A bucket in Google Cloud Storage.
pub struct GcsStore {
	client_email: String,
	signing_key: SigningKey<Sha256>,
	bucket: String,
	host: String,
	http: Client,
}

impl GcsStore {
	/// Creates a store from the contents of a service account JSON key.
	pub fn new(service_account_json: &str, bucket: &str, host: &str) -> Result<Self, InitError> {
		let account: ServiceAccount = serde_json::from_str(service_account_json)?;
		let private_key = RsaPrivateKey::from_pkcs8_pem(&account.private_key)?;

		let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;

		tracing::info!(%bucket, %host, "GCS client initialized");

		Ok(Self {
			client_email: account.client_email,
			signing_key: SigningKey::<Sha256>::new(private_key),
			bucket: bucket.to_owned(),
			host: host.to_owned(),
			http,
		})
	}

	/// Creates a store from the service account key file named in the configuration.
	pub fn from_config(config: &GcsConfig) -> Result<Self, InitError> {
		let json = std::fs::read_to_string(&config.credentials_path).map_err(|source| {
			InitError::Read {
				path: config.credentials_path.display().to_string(),
				source,
			}
		})?;

		Self::new(&json, &config.bucket, &config.host)
	}

	fn sign_url(&self, method: &Method, key: &ObjectKey, now: DateTime<Utc>) -> String {
		let request = SignedRequest {
			method: method.as_str(),
			host: &self.host,
			bucket: &self.bucket,
			key: key.as_str(),
			client_email: &self.client_email,
			now,
			expires_in: SIGNATURE_TTL,
		};

		let signature = self.signing_key.sign(request.string_to_sign().as_bytes());

		format!(
			"https://{}{}?{}&X-Goog-Signature={}",
			self.host,
			request.canonical_uri(),
			request.canonical_query(),
			hex::encode(signature.to_bytes())
		)
	}
}

/// The parts of a V4 signed request that go into the signature.
struct SignedRequest<'a> {
	method: &'a str,
	host: &'a str,
	bucket: &'a str,
	key: &'a str,
	client_email: &'a str,
	now: DateTime<Utc>,
	expires_in: Duration,
}

impl SignedRequest<'_> {
	fn credential_scope(&self) -> String {
		format!("{}/auto/storage/goog4_request", self.now.format("%Y%m%d"))
	}

	fn timestamp(&self) -> String {
		self.now.format("%Y%m%dT%H%M%SZ").to_string()
	}

	fn canonical_uri(&self) -> String {
		format!(
			"/{}/{}",
			self.bucket,
			utf8_percent_encode(self.key.trim_start_matches('/'), PATH_SET)
		)
	}

	/// Query parameters sorted by name, as the signature requires.
	fn canonical_query(&self) -> String {
		let credential = format!("{}/{}", self.client_email, self.credential_scope());

		[
			("X-Goog-Algorithm", "GOOG4-RSA-SHA256".to_owned()),
			(
				"X-Goog-Credential",
				urlencoding::encode(&credential).into_owned(),
			),
			("X-Goog-Date", self.timestamp()),
			("X-Goog-Expires", self.expires_in.as_secs().to_string()),
			("X-Goog-SignedHeaders", "host".to_owned()),
		]
		.iter()
		.map(|(name, value)| format!("{name}={value}"))
		.collect::<Vec<_>>()
		.join("&")
	}

	fn canonical_request(&self) -> String {
		format!(
			"{}\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
			self.method,
			self.canonical_uri(),
			self.canonical_query(),
			self.host
		)
	}

	fn string_to_sign(&self) -> String {
		format!(
			"GOOG4-RSA-SHA256\n{}\n{}\n{}",
			self.timestamp(),
			self.credential_scope(),
			hex::encode(Sha256::digest(self.canonical_request().as_bytes()))
		)
	}
}

/// Splits failed responses into ones worth retrying and ones that are not.
fn classify(status: StatusCode, body: &str) -> Error {
	let message = format!("status {status}: {body}");

	if status.is_server_error()
		|| status == StatusCode::TOO_MANY_REQUESTS
		|| status == StatusCode::REQUEST_TIMEOUT
	{
		Error::Transient(message)
	} else {
		Error::Permanent(message)
	}
}

fn transport(error: &reqwest::Error) -> Error {
	if error.is_builder() {
		Error::Permanent(error.to_string())
	} else {
		Error::Transient(error.to_string())
	}
}

#[axum::async_trait]
impl BlobStore for GcsStore {
	async fn put(&self, key: &ObjectKey, content: Bytes, content_type: &str) -> Result<String, Error> {
		let url = self.sign_url(&Method::PUT, key, Utc::now());
		let size = content.len();

		let response = self
			.http
			.put(url)
			.header(header::CONTENT_TYPE, content_type)
			.body(content)
			.send()
			.await
			.map_err(|e| transport(&e))?;

		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(classify(status, &body));
		}

		tracing::info!(%key, size, "uploaded object to GCS");

		Ok(public_url(&self.host, &self.bucket, key))
	}

	async fn delete(&self, key: &ObjectKey) -> Result<(), Error> {
		let url = self.sign_url(&Method::DELETE, key, Utc::now());

		let response = self
			.http
			.delete(url)
			.send()
			.await
			.map_err(|e| transport(&e))?;

		let status = response.status();

		if status.is_success() || status == StatusCode::NOT_FOUND {
			tracing::info!(%key, "deleted object from GCS");
			return Ok(());
		}

		let body = response.text().await.unwrap_or_default();
		Err(classify(status, &body))
	}
}
