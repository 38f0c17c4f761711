use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request},
};
use uuid::Uuid;

use crate::{
	error::RouteError,
	openapi::{SECURITY_SCHEME_BEARER, SECURITY_SCHEME_SESSION},
	repository::Users,
	route::auth,
	session,
};

pub const AUTHORIZATION_PREFIX: &str = "Bearer ";

/// The authenticated caller.
///
/// The session token is read from an `Authorization: Bearer <token>` header,
/// falling back to the session cookie. A missing token is rejected with
/// [`auth::Error::NotAuthenticated`], an unknown or malformed one with
/// [`auth::Error::InvalidSession`]. Either way nothing else about the request
/// is looked at.
///
/// ```rust
/// async fn route(identity: Identity) {
///   println!("{:?}", identity.user);
/// }
/// ```
#[derive(Debug)]
pub struct Identity {
	pub session: Uuid,
	pub user: auth::model::User,
}

/// Returns the raw session token of the request, if any.
fn token(parts: &request::Parts) -> Option<Result<&str, auth::Error>> {
	if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
		return Some(
			value
				.to_str()
				.ok()
				.and_then(|value| value.strip_prefix(AUTHORIZATION_PREFIX))
				.map(str::trim)
				.ok_or(auth::Error::InvalidSession),
		);
	}

	parts
		.headers
		.get_all(header::COOKIE)
		.into_iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(cookie::Cookie::split_parse)
		.filter_map(Result::ok)
		.find(|cookie| cookie.name() == session::COOKIE_NAME)
		.map(|cookie| match cookie.value_raw() {
			Some(value) => Ok(value),
			None => Err(auth::Error::InvalidSession),
		})
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
	Users: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let token = token(parts).ok_or(auth::Error::NotAuthenticated)??;
		let session = Uuid::parse_str(token).map_err(|_| auth::Error::InvalidSession)?;

		let users = Users::from_ref(state);
		let user = users
			.find_by_session(session)
			.await?
			.ok_or(auth::Error::InvalidSession)?;

		tracing::debug!(user = %user.id, "resolved caller identity");

		Ok(Self { session, user })
	}
}

impl OperationInput for Identity {
	/// Adds the bearer token and session cookie requirements to the `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.extend([
			[(SECURITY_SCHEME_BEARER.to_string(), Vec::new())]
				.into_iter()
				.collect(),
			[(SECURITY_SCHEME_SESSION.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		]);
	}
}
