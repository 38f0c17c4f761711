//! Persistence for users, sessions and posts.
//!
//! Routes only ever see the [`PostRepository`] and [`UserRepository`] traits,
//! so the Postgres implementation can be swapped for an in-memory one in tests.

mod postgres;

use std::sync::Arc;

use uuid::Uuid;

pub use postgres::PgRepository;

use crate::route::{auth::model as auth, model::Paginate, post::model as post};

pub type Posts = Arc<dyn PostRepository>;
pub type Users = Arc<dyn UserRepository>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// A uniqueness constraint was violated. Holds the offending field.
	#[error("{0} already taken")]
	Conflict(&'static str),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
}

#[axum::async_trait]
pub trait PostRepository: Send + Sync {
	/// Persists a validated post. No validation happens here.
	async fn create(&self, post: post::NewPost) -> Result<post::Post, Error>;

	async fn find(&self, id: Uuid) -> Result<Option<post::Post>, Error>;

	/// Lists the posts owned by `user_id`, newest first.
	async fn list_by_owner(&self, user_id: Uuid, page: &Paginate)
		-> Result<Vec<post::Post>, Error>;

	async fn count_by_owner(&self, user_id: Uuid) -> Result<i64, Error>;

	/// Applies `update` to the post `id` if it is owned by `user_id`.
	/// Returns `None` if there is no such post.
	async fn update(
		&self,
		user_id: Uuid,
		id: Uuid,
		update: post::PostUpdate,
	) -> Result<Option<post::Post>, Error>;

	/// Deletes the post `id` if it is owned by `user_id`, returning it.
	async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<post::Post>, Error>;
}

#[axum::async_trait]
pub trait UserRepository: Send + Sync {
	/// Creates a user together with their first session.
	async fn register(&self, user: auth::NewUser) -> Result<(auth::User, auth::Session), Error>;

	async fn find_by_username(&self, username: &str) -> Result<Option<auth::User>, Error>;

	async fn create_session(&self, user_id: Uuid) -> Result<auth::Session, Error>;

	/// Resolves the user that owns a session, if the session exists.
	async fn find_by_session(&self, session_id: Uuid) -> Result<Option<auth::User>, Error>;

	async fn delete_session(&self, session_id: Uuid) -> Result<(), Error>;
}
