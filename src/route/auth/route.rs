use aide::axum::IntoApiResponse;
use argon2::Argon2;
use axum::{extract::State, http::header};
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Identity, Json},
	openapi::tag,
	repository::{self, Users},
	response::Envelope,
	session, AppState,
};

use super::{model, Error, RouteError};

pub const KEY_LENGTH: usize = 32;

/// Hashes a password with Argon2, using the user's id as a salt.
pub fn hash_password(
	hasher: &Argon2,
	password: &str,
	id: &Uuid,
) -> Result<[u8; KEY_LENGTH], argon2::Error> {
	let mut hash = [0; KEY_LENGTH];

	hasher.hash_password_into(password.as_bytes(), id.as_bytes(), &mut hash)?;
	Ok(hash)
}

/// Log in
/// Logs in to an account, returning a session token and an associated session cookie.
#[route(tag = tag::AUTH, response(status = 200, description = "Logged in successfully.", shape = "Json<model::SessionResponse>"))]
pub async fn login(
	State(state): State<AppState>,
	Json(auth): Json<model::LoginInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user = state
		.users
		.find_by_username(&auth.username)
		.await?
		.ok_or(Error::InvalidUsernameOrPassword)?;

	let hashed = hash_password(&state.hasher, &auth.password, &user.id).map_err(Error::Argon)?;

	if user.password != hashed {
		return Err(Error::InvalidUsernameOrPassword.into());
	}

	let session = state.users.create_session(user.id).await?;
	let cookie = session::create_cookie(session.id);

	tracing::info!(user = %user.id, "logged in");

	Ok((
		[(header::SET_COOKIE, cookie.to_string())],
		Json(model::SessionResponse::from(session)),
	))
}

/// Log out
/// Logs out of the authenticated account, invalidating its session.
#[route(tag = tag::AUTH, response(status = 200, description = "Logged out successfully.", shape = "Json<Envelope<()>>"))]
pub async fn logout(
	State(users): State<Users>,
	identity: Identity,
) -> Result<impl IntoApiResponse, RouteError> {
	users.delete_session(identity.session).await?;

	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		Json(Envelope::message("logged out")),
	))
}

/// Register account
/// Registers a new account, returning a session token and an associated session cookie.
#[route(tag = tag::AUTH, response(status = 200, description = "Registered successfully.", shape = "Json<model::SessionResponse>"))]
pub async fn register(
	State(state): State<AppState>,
	Json(auth): Json<model::RegisterInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let id = Uuid::new_v4();
	let hashed = hash_password(&state.hasher, &auth.password, &id).map_err(Error::Argon)?;

	let (user, session) = state
		.users
		.register(model::NewUser {
			id,
			email: auth.email,
			username: auth.username,
			password: hashed.to_vec(),
		})
		.await
		.map_err(|error| match error {
			repository::Error::Conflict("email") => Error::EmailTaken.into(),
			repository::Error::Conflict("username") => Error::UsernameTaken.into(),
			error => RouteError::from(error),
		})?;

	let cookie = session::create_cookie(session.id);

	tracing::info!(user = %user.id, "registered");

	Ok((
		[(header::SET_COOKIE, cookie.to_string())],
		Json(model::SessionResponse::from(session)),
	))
}

/// Get user
/// Returns the authenticated user.
#[route(tag = tag::AUTH)]
pub async fn get_me(identity: Identity) -> Json<Envelope<model::User>> {
	Json(Envelope::data(identity.user))
}
