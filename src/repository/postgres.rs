use sqlx::PgPool;
use uuid::Uuid;

use super::{Error, PostRepository, UserRepository};
use crate::route::{auth::model as auth, model::Paginate, post::model as post};

/// Postgres-backed repository for every table in the schema.
#[derive(Clone)]
pub struct PgRepository {
	pool: PgPool,
}

impl PgRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}

/// Maps unique constraint violations on the `user` table to the field at fault.
fn user_conflict(error: sqlx::Error) -> Error {
	if let sqlx::Error::Database(ref database) = error {
		match database.constraint() {
			Some("user_email_key") => return Error::Conflict("email"),
			Some("user_username_key") => return Error::Conflict("username"),
			_ => {}
		}
	}

	Error::Database(error)
}

#[axum::async_trait]
impl PostRepository for PgRepository {
	async fn create(&self, input: post::NewPost) -> Result<post::Post, Error> {
		let post = sqlx::query_as::<_, post::Post>(
			r#"
				INSERT INTO post (user_id, title, description, price, contact_info, zip_code, negotiable, image_urls)
				VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
				RETURNING *
			"#,
		)
		.bind(input.user_id)
		.bind(input.title)
		.bind(input.description)
		.bind(input.price)
		.bind(input.contact_info)
		.bind(input.zip_code)
		.bind(input.negotiable)
		.bind(input.image_urls)
		.fetch_one(&self.pool)
		.await?;

		Ok(post)
	}

	async fn find(&self, id: Uuid) -> Result<Option<post::Post>, Error> {
		let post = sqlx::query_as::<_, post::Post>("SELECT * FROM post WHERE id = $1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;

		Ok(post)
	}

	async fn list_by_owner(
		&self,
		user_id: Uuid,
		page: &Paginate,
	) -> Result<Vec<post::Post>, Error> {
		let posts = sqlx::query_as::<_, post::Post>(
			r#"
				SELECT * FROM post
				WHERE user_id = $1
				ORDER BY created_at DESC
				LIMIT $2 OFFSET $3
			"#,
		)
		.bind(user_id)
		.bind(page.limit())
		.bind(page.offset())
		.fetch_all(&self.pool)
		.await?;

		Ok(posts)
	}

	async fn count_by_owner(&self, user_id: Uuid) -> Result<i64, Error> {
		let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM post WHERE user_id = $1")
			.bind(user_id)
			.fetch_one(&self.pool)
			.await?;

		Ok(count)
	}

	async fn update(
		&self,
		user_id: Uuid,
		id: Uuid,
		update: post::PostUpdate,
	) -> Result<Option<post::Post>, Error> {
		let post = sqlx::query_as::<_, post::Post>(
			r#"
				UPDATE post SET
					title = COALESCE($3, title),
					price = COALESCE($4, price),
					description = CASE WHEN $5 THEN $6 ELSE description END
				WHERE id = $1 AND user_id = $2
				RETURNING *
			"#,
		)
		.bind(id)
		.bind(user_id)
		.bind(update.title)
		.bind(update.price)
		.bind(update.description.is_some())
		.bind(update.description.flatten())
		.fetch_optional(&self.pool)
		.await?;

		Ok(post)
	}

	async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<post::Post>, Error> {
		let post = sqlx::query_as::<_, post::Post>(
			"DELETE FROM post WHERE id = $1 AND user_id = $2 RETURNING *",
		)
		.bind(id)
		.bind(user_id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(post)
	}
}

#[axum::async_trait]
impl UserRepository for PgRepository {
	async fn register(&self, input: auth::NewUser) -> Result<(auth::User, auth::Session), Error> {
		let mut tx = self.pool.begin().await?;

		let user = sqlx::query_as::<_, auth::User>(
			r#"
				INSERT INTO "user" (id, email, username, password) VALUES ($1, $2, $3, $4)
				RETURNING *
			"#,
		)
		.bind(input.id)
		.bind(input.email)
		.bind(input.username)
		.bind(input.password)
		.fetch_one(&mut *tx)
		.await
		.map_err(user_conflict)?;

		let session = sqlx::query_as::<_, auth::Session>(
			"INSERT INTO session (user_id) VALUES ($1) RETURNING *",
		)
		.bind(user.id)
		.fetch_one(&mut *tx)
		.await?;

		tx.commit().await?;

		Ok((user, session))
	}

	async fn find_by_username(&self, username: &str) -> Result<Option<auth::User>, Error> {
		let user = sqlx::query_as::<_, auth::User>(r#"SELECT * FROM "user" WHERE username = $1"#)
			.bind(username)
			.fetch_optional(&self.pool)
			.await?;

		Ok(user)
	}

	async fn create_session(&self, user_id: Uuid) -> Result<auth::Session, Error> {
		let session = sqlx::query_as::<_, auth::Session>(
			"INSERT INTO session (user_id) VALUES ($1) RETURNING *",
		)
		.bind(user_id)
		.fetch_one(&self.pool)
		.await?;

		Ok(session)
	}

	async fn find_by_session(&self, session_id: Uuid) -> Result<Option<auth::User>, Error> {
		let user = sqlx::query_as::<_, auth::User>(
			r#"
				SELECT * FROM "user" WHERE id = (
					SELECT user_id FROM session WHERE id = $1
				)
			"#,
		)
		.bind(session_id)
		.fetch_optional(&self.pool)
		.await?;

		Ok(user)
	}

	async fn delete_session(&self, session_id: Uuid) -> Result<(), Error> {
		sqlx::query("DELETE FROM session WHERE id = $1")
			.bind(session_id)
			.execute(&self.pool)
			.await?;

		Ok(())
	}
}
