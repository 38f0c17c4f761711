use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;
use tower_governor::GovernorLayer;

use crate::{error, ratelimit, AppState};

pub mod model;
pub mod route;

/// An error that can occur during authentication.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid username or password")]
	InvalidUsernameOrPassword,
	#[error("password hashing error: {0}")]
	Argon(#[from] argon2::Error),
	#[error("not authenticated")]
	NotAuthenticated,
	#[error("invalid session")]
	InvalidSession,
	#[error("username already taken")]
	UsernameTaken,
	#[error("email already taken")]
	EmailTaken,
}

pub type RouteError = error::RouteError<Error>;

impl From<Error> for RouteError {
	fn from(error: Error) -> Self {
		Self::Route(error)
	}
}

/// The authentication routes. Given a limiter, every route is additionally
/// limited by it.
pub fn routes(limiter: Option<ratelimit::Limiter>) -> ApiRouter<AppState> {
	use route::*;

	let router = ApiRouter::new()
		.api_route("/login", post_with(login, login_docs))
		.api_route("/logout", get_with(logout, logout_docs))
		.api_route("/register", post_with(register, register_docs))
		.api_route("/me", get_with(get_me, get_me_docs));

	match limiter {
		Some(config) => router.route_layer(GovernorLayer { config }),
		None => router,
	}
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::InvalidUsernameOrPassword | Self::NotAuthenticated | Self::InvalidSession => {
				StatusCode::UNAUTHORIZED
			}
			Self::Argon(..) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::UsernameTaken | Self::EmailTaken => StatusCode::CONFLICT,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		match self {
			Self::Argon(..) => Vec::new(),
			Self::UsernameTaken => vec![error::Message::new(self.to_string()).field("username")],
			Self::EmailTaken => vec![error::Message::new(self.to_string()).field("email")],
			_ => vec![error::Message::new(self.to_string())],
		}
	}
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[tokio::test]
	async fn test_signup_flow() {
		let server = Harness::new().server();

		let response = server
			.post("/register")
			.json(&json!({
				"email": "john@smith.com",
				"username": "john",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 200);

		assert!(response
			.header("set-cookie")
			.to_str()
			.unwrap()
			.contains("session="));

		let response = server
			.post("/login")
			.json(&json!({
				"userName": "john",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();
		let token = body["token"].as_str().unwrap().to_owned();

		assert_eq!(body["success"], true);
		assert_eq!(body["data"]["token"], token.as_str());

		let response = server
			.get("/me")
			.add_header(AUTHORIZATION, bearer(&token))
			.await;

		assert_eq!(response.status_code(), 200);
		assert_eq!(response.json::<Value>()["data"]["username"], "john");
		assert!(response.json::<Value>()["data"].get("email").is_none());
	}

	#[tokio::test]
	async fn test_register_returns_token() {
		let response = Harness::new()
			.server()
			.post("/register")
			.json(&json!({
				"email": "jane@example.com",
				"username": "jane",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 200);

		let body = response.json::<Value>();

		assert!(body["token"].is_string());
		assert_eq!(body["token"], body["data"]["token"]);
	}

	#[tokio::test]
	async fn test_wrong_password() {
		let harness = Harness::new();
		harness.user("jane", "hunter2hunter").await;

		let response = harness
			.server()
			.post("/login")
			.json(&json!({ "userName": "jane", "password": "wrongpassword" }))
			.await;

		assert_eq!(response.status_code(), 401);
		assert_eq!(response.json::<Value>()["kind"], "unauthenticated");
	}

	#[tokio::test]
	async fn test_username_taken() {
		let harness = Harness::new();
		harness.user("jane", "hunter2hunter").await;

		let response = harness
			.server()
			.post("/register")
			.json(&json!({
				"email": "other@example.com",
				"username": "jane",
				"password": "hunter2hunter",
			}))
			.await;

		assert_eq!(response.status_code(), 409);
		assert_eq!(response.json::<Value>()["errors"][0]["field"], "username");
	}

	#[tokio::test]
	async fn test_logout_invalidates_session() {
		let harness = Harness::new();
		let token = harness.user("jane", "hunter2hunter").await;
		let server = harness.server();

		let response = server
			.get("/logout")
			.add_header(AUTHORIZATION, bearer(&token))
			.await;

		assert_eq!(response.status_code(), 200);

		let response = server
			.get("/me")
			.add_header(AUTHORIZATION, bearer(&token))
			.await;

		assert_eq!(response.status_code(), 401);
		assert_eq!(response.json::<Value>()["message"], "invalid session");
	}

	#[tokio::test]
	async fn test_me_requires_identity() {
		let response = Harness::new().server().get("/me").await;

		assert_eq!(response.status_code(), 401);
		assert_eq!(response.json::<Value>()["message"], "not authenticated");
	}

	#[tokio::test]
	async fn test_session_cookie() {
		let harness = Harness::new();
		let token = harness.user("jane", "hunter2hunter").await;

		let response = harness
			.server()
			.get("/me")
			.add_header(COOKIE, HeaderValue::from_str(&format!("session={token}")).unwrap())
			.await;

		assert_eq!(response.status_code(), 200);
	}
}
