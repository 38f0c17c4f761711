//! Shared fixtures for router tests: in-memory repositories, a spy blob store
//! and a multipart body builder.

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::Duration,
};

use argon2::Argon2;
use bytes::Bytes;
use uuid::Uuid;

pub use axum::http::{
	header::{AUTHORIZATION, COOKIE},
	HeaderValue,
};
pub use axum_test::TestServer;
pub use serde_json::{json, Value};

use crate::{
	repository::{self, PostRepository, UserRepository},
	route::{
		auth::{model as auth, route::hash_password},
		model::Paginate,
		post::model as post,
	},
	storage::{self, BlobStore, ObjectKey, RetryPolicy},
	State,
};

pub const STORE_HOST: &str = "storage.test";
pub const BUCKET: &str = "listings";

/// Image content that makes [`SpyStore`] fail permanently.
pub const FAIL: &[u8] = b"fail";
/// Image content that makes [`SpyStore`] fail transiently on the first attempt.
pub const FLAKY: &[u8] = b"flaky";
/// Image content that makes [`SpyStore`] never answer.
pub const HANG: &[u8] = b"hang";

#[derive(Default)]
pub struct MemoryUsers {
	users: Mutex<Vec<auth::User>>,
	sessions: Mutex<HashMap<Uuid, auth::Session>>,
}

#[axum::async_trait]
impl UserRepository for MemoryUsers {
	async fn register(
		&self,
		user: auth::NewUser,
	) -> Result<(auth::User, auth::Session), repository::Error> {
		let user = {
			let mut users = self.users.lock().unwrap();

			if users.iter().any(|u| u.email == user.email) {
				return Err(repository::Error::Conflict("email"));
			}

			if users.iter().any(|u| u.username == user.username) {
				return Err(repository::Error::Conflict("username"));
			}

			let user = auth::User {
				id: user.id,
				email: user.email,
				password: user.password,
				username: user.username,
				created_at: chrono::Utc::now(),
			};

			users.push(user.clone());
			user
		};

		let session = self.create_session(user.id).await?;

		Ok((user, session))
	}

	async fn find_by_username(&self, username: &str) -> Result<Option<auth::User>, repository::Error> {
		let users = self.users.lock().unwrap();

		Ok(users.iter().find(|u| u.username == username).cloned())
	}

	async fn create_session(&self, user_id: Uuid) -> Result<auth::Session, repository::Error> {
		let session = auth::Session {
			id: Uuid::new_v4(),
			user_id,
			created_at: chrono::Utc::now(),
		};

		self.sessions
			.lock()
			.unwrap()
			.insert(session.id, session.clone());

		Ok(session)
	}

	async fn find_by_session(&self, session_id: Uuid) -> Result<Option<auth::User>, repository::Error> {
		let Some(user_id) = self
			.sessions
			.lock()
			.unwrap()
			.get(&session_id)
			.map(|s| s.user_id)
		else {
			return Ok(None);
		};

		let users = self.users.lock().unwrap();

		Ok(users.iter().find(|u| u.id == user_id).cloned())
	}

	async fn delete_session(&self, session_id: Uuid) -> Result<(), repository::Error> {
		self.sessions.lock().unwrap().remove(&session_id);

		Ok(())
	}
}

#[derive(Default)]
pub struct MemoryPosts {
	pub posts: Mutex<Vec<post::Post>>,
	/// Number of times any method was called.
	pub calls: AtomicUsize,
	/// Makes [`PostRepository::create`] fail.
	pub fail: AtomicBool,
	/// Makes [`PostRepository::create`] store the post and then never answer.
	pub hang: AtomicBool,
}

impl MemoryPosts {
	pub fn count(&self) -> usize {
		self.posts.lock().unwrap().len()
	}
}

#[axum::async_trait]
impl PostRepository for MemoryPosts {
	async fn create(&self, input: post::NewPost) -> Result<post::Post, repository::Error> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		if self.fail.load(Ordering::SeqCst) {
			return Err(sqlx::Error::PoolTimedOut.into());
		}

		let post = post::Post {
			id: Uuid::new_v4(),
			user_id: input.user_id,
			title: input.title,
			description: input.description,
			price: input.price,
			contact_info: input.contact_info,
			zip_code: input.zip_code,
			negotiable: input.negotiable,
			image_urls: input.image_urls,
			created_at: chrono::Utc::now(),
		};

		self.posts.lock().unwrap().push(post.clone());

		if self.hang.load(Ordering::SeqCst) {
			std::future::pending::<()>().await;
		}

		Ok(post)
	}

	async fn find(&self, id: Uuid) -> Result<Option<post::Post>, repository::Error> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let posts = self.posts.lock().unwrap();

		Ok(posts.iter().find(|p| p.id == id).cloned())
	}

	async fn list_by_owner(
		&self,
		user_id: Uuid,
		page: &Paginate,
	) -> Result<Vec<post::Post>, repository::Error> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let posts = self.posts.lock().unwrap();
		let mut owned = posts
			.iter()
			.filter(|p| p.user_id == user_id)
			.cloned()
			.collect::<Vec<_>>();

		owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

		Ok(owned
			.into_iter()
			.skip(usize::try_from(page.offset()).unwrap())
			.take(usize::try_from(page.limit()).unwrap())
			.collect())
	}

	async fn count_by_owner(&self, user_id: Uuid) -> Result<i64, repository::Error> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let posts = self.posts.lock().unwrap();

		Ok(i64::try_from(posts.iter().filter(|p| p.user_id == user_id).count()).unwrap())
	}

	async fn update(
		&self,
		user_id: Uuid,
		id: Uuid,
		update: post::PostUpdate,
	) -> Result<Option<post::Post>, repository::Error> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let mut posts = self.posts.lock().unwrap();
		let Some(post) = posts.iter_mut().find(|p| p.id == id && p.user_id == user_id) else {
			return Ok(None);
		};

		if let Some(title) = update.title {
			post.title = title;
		}

		if let Some(price) = update.price {
			post.price = price;
		}

		if let Some(description) = update.description {
			post.description = description;
		}

		Ok(Some(post.clone()))
	}

	async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<post::Post>, repository::Error> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let mut posts = self.posts.lock().unwrap();
		let index = posts.iter().position(|p| p.id == id && p.user_id == user_id);

		Ok(index.map(|index| posts.remove(index)))
	}
}

/// A blob store that records every call. Its behaviour per object is chosen
/// by the content: see [`FAIL`], [`FLAKY`] and [`HANG`].
#[derive(Default)]
pub struct SpyStore {
	/// Every `put` attempt, including failed ones.
	pub attempts: AtomicUsize,
	/// Keys that were stored, in order.
	pub puts: Mutex<Vec<ObjectKey>>,
	pub deletes: Mutex<Vec<ObjectKey>>,
	flaky: Mutex<HashMap<ObjectKey, u32>>,
}

impl SpyStore {
	pub fn attempts(&self) -> usize {
		self.attempts.load(Ordering::SeqCst)
	}

	pub fn puts(&self) -> Vec<ObjectKey> {
		self.puts.lock().unwrap().clone()
	}

	pub fn deletes(&self) -> Vec<ObjectKey> {
		self.deletes.lock().unwrap().clone()
	}
}

#[axum::async_trait]
impl BlobStore for SpyStore {
	async fn put(
		&self,
		key: &ObjectKey,
		content: Bytes,
		_content_type: &str,
	) -> Result<String, storage::Error> {
		self.attempts.fetch_add(1, Ordering::SeqCst);

		match &content[..] {
			FAIL => return Err(storage::Error::Permanent("403 Forbidden".into())),
			HANG => std::future::pending::<()>().await,
			FLAKY => {
				let mut flaky = self.flaky.lock().unwrap();
				let seen = flaky.entry(key.clone()).or_default();
				*seen += 1;

				if *seen == 1 {
					return Err(storage::Error::Transient("503 Service Unavailable".into()));
				}
			}
			_ => {}
		}

		self.puts.lock().unwrap().push(key.clone());

		Ok(storage::public_url(STORE_HOST, BUCKET, key))
	}

	async fn delete(&self, key: &ObjectKey) -> Result<(), storage::Error> {
		self.deletes.lock().unwrap().push(key.clone());

		Ok(())
	}
}

/// The dependencies of a test server, kept around for inspection.
pub struct Harness {
	pub posts: Arc<MemoryPosts>,
	pub users: Arc<MemoryUsers>,
	pub blobs: Arc<SpyStore>,
	pub request_timeout: Duration,
}

impl Harness {
	pub fn new() -> Self {
		Self {
			posts: Arc::default(),
			users: Arc::default(),
			blobs: Arc::default(),
			request_timeout: Duration::from_secs(10),
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn state(&self) -> State {
		State {
			posts: self.posts.clone(),
			users: self.users.clone(),
			blobs: self.blobs.clone(),
			hasher: Argon2::default(),
			retry: RetryPolicy {
				max_attempts: 3,
				initial_backoff: Duration::from_millis(1),
				max_backoff: Duration::from_millis(5),
			},
			request_timeout: self.request_timeout,
		}
	}

	pub fn server(&self) -> TestServer {
		TestServer::new(crate::app(self.state(), None)).unwrap()
	}

	/// Registers a user directly in the repository and returns a session token.
	pub async fn user(&self, username: &str, password: &str) -> String {
		let id = Uuid::new_v4();
		let hashed = hash_password(&Argon2::default(), password, &id).unwrap();

		let (_, session) = self
			.users
			.register(auth::NewUser {
				id,
				email: format!("{username}@example.com"),
				username: username.into(),
				password: hashed.to_vec(),
			})
			.await
			.unwrap();

		session.id.to_string()
	}
}

pub fn bearer(token: &str) -> HeaderValue {
	HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

const BOUNDARY: &str = "----market-test-boundary";

/// Builds a `multipart/form-data` body.
#[derive(Default)]
pub struct Form {
	body: Vec<u8>,
}

impl Form {
	/// A form with every required field set to a valid value.
	pub fn listing() -> Self {
		Self::default()
			.text("title", "Road bike")
			.text("description", "Barely used")
			.text("price", "19.99")
			.text("contact_info", "jane@example.com")
			.text("zip_code", "10115")
	}

	pub fn text(mut self, name: &str, value: &str) -> Self {
		self.body.extend_from_slice(
			format!(
				"--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
			)
			.as_bytes(),
		);
		self
	}

	pub fn file(mut self, name: &str, file_name: &str, content_type: &str, content: &[u8]) -> Self {
		self.body.extend_from_slice(
			format!(
				"--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
			)
			.as_bytes(),
		);
		self.body.extend_from_slice(content);
		self.body.extend_from_slice(b"\r\n");
		self
	}

	pub fn image(self, file_name: &str, content: &[u8]) -> Self {
		self.file("images", file_name, "image/png", content)
	}

	pub fn content_type() -> String {
		format!("multipart/form-data; boundary={BOUNDARY}")
	}

	pub fn finish(mut self) -> Bytes {
		self.body
			.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
		self.body.into()
	}
}
