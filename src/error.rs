use std::{borrow::Cow, fmt};

use aide::OperationOutput;
use axum::{
	body::Body,
	extract::rejection,
	http::{Response, StatusCode},
	response::IntoResponse,
	BoxError, Json,
};
use schemars::JsonSchema;
use serde::Serialize;
use tower_governor::GovernorError;

use crate::repository;

pub type Map = serde_json::Map<String, serde_json::Value>;

/// A machine-readable classification of an error, derived from its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
	Unauthenticated,
	BadRequest,
	NotFound,
	Conflict,
	TooManyRequests,
	Internal,
}

impl Kind {
	pub fn from_status(status: StatusCode) -> Self {
		match status {
			StatusCode::UNAUTHORIZED => Self::Unauthenticated,
			StatusCode::NOT_FOUND => Self::NotFound,
			StatusCode::CONFLICT => Self::Conflict,
			StatusCode::TOO_MANY_REQUESTS => Self::TooManyRequests,
			status if status.is_client_error() => Self::BadRequest,
			_ => Self::Internal,
		}
	}
}

/// A single error entry, optionally tied to a request field.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Message<'a> {
	pub content: Cow<'a, str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'a, str>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Cow<'a, Map>>,
}

impl<'a> Message<'a> {
	pub fn new(content: impl Into<Cow<'a, str>>) -> Self {
		Self {
			content: content.into(),
			field: None,
			details: None,
		}
	}

	#[must_use]
	pub fn field(mut self, field: impl Into<Cow<'a, str>>) -> Self {
		self.field = Some(field.into());
		self
	}

	#[must_use]
	pub fn detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
		self.details
			.get_or_insert_with(|| Cow::Owned(Map::new()))
			.to_mut()
			.insert(key.into(), value.into());
		self
	}
}

/// The body of every failed response.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorResponse<'a> {
	pub success: bool,
	pub message: Cow<'a, str>,
	pub kind: Kind,
	pub errors: Vec<Message<'a>>,
}

/// Describes how an error is presented to the client.
///
/// Server errors only ever expose a generic message. Their [`Display`](fmt::Display)
/// output is logged instead, so it may contain sensitive information.
pub trait ErrorShape: std::error::Error {
	fn status(&self) -> StatusCode;

	fn errors(&self) -> Vec<Message<'_>> {
		Vec::new()
	}

	fn message(&self) -> Cow<'_, str> {
		if self.status().is_server_error() {
			Cow::Borrowed("internal server error")
		} else {
			Cow::Owned(self.to_string())
		}
	}
}

fn respond<E: ErrorShape + ?Sized>(error: &E) -> Response<Body> {
	let status = error.status();

	if status.is_server_error() {
		tracing::error!(%error, "request failed");
	} else {
		tracing::debug!(%error, "request rejected");
	}

	(
		status,
		Json(ErrorResponse {
			success: false,
			message: error.message(),
			kind: Kind::from_status(status),
			errors: error.errors(),
		}),
	)
		.into_response()
}

/// Errors shared by every route.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("invalid json body")]
	Json(axum_jsonschema::JsonSchemaRejection),
	#[error("invalid query string: {0}")]
	Query(#[from] rejection::QueryRejection),
	#[error("invalid path: {0}")]
	Path(#[from] rejection::PathRejection),
	#[error("repository error: {0}")]
	Repository(#[from] repository::Error),
	#[error("rate limited")]
	RateLimit(GovernorError),
	#[error("request timed out")]
	Timeout,
	#[error("middleware error: {0}")]
	Middleware(BoxError),
}

/// Turns errors of fallible middleware into enveloped responses.
pub async fn handle_middleware_error(error: BoxError) -> AppError {
	if error.is::<tower::timeout::error::Elapsed>() {
		AppError::Timeout
	} else {
		AppError::Middleware(error)
	}
}

impl From<axum_jsonschema::JsonSchemaRejection> for AppError {
	fn from(rejection: axum_jsonschema::JsonSchemaRejection) -> Self {
		Self::Json(rejection)
	}
}

impl From<GovernorError> for AppError {
	fn from(error: GovernorError) -> Self {
		Self::RateLimit(error)
	}
}

impl ErrorShape for AppError {
	fn status(&self) -> StatusCode {
		match self {
			Self::Validation(..) | Self::Json(..) | Self::Query(..) | Self::Path(..) => {
				StatusCode::BAD_REQUEST
			}
			Self::Repository(repository::Error::Conflict(..)) => StatusCode::CONFLICT,
			Self::Repository(..) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::RateLimit(GovernorError::TooManyRequests { .. }) => StatusCode::TOO_MANY_REQUESTS,
			Self::RateLimit(..) | Self::Middleware(..) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::Timeout => StatusCode::REQUEST_TIMEOUT,
		}
	}

	fn errors(&self) -> Vec<Message<'_>> {
		match self {
			Self::Validation(errors) => validation_messages(errors),
			_ => Vec::new(),
		}
	}
}

/// Flattens validator output into one message per failed rule.
pub fn validation_messages(errors: &validator::ValidationErrors) -> Vec<Message<'_>> {
	errors
		.field_errors()
		.into_iter()
		.flat_map(|(field, errors)| {
			let field = field.to_string();

			errors.iter().map(move |error| {
				let content = error.message.as_ref().unwrap_or(&error.code);

				Message::new(content.to_string()).field(field.clone())
			})
		})
		.collect()
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response<Body> {
		respond(&self)
	}
}

/// An error returned from a route, either shared or specific to the route module.
///
/// Route modules define `type RouteError = error::RouteError<Error>` and
/// implement `From<Error>` for it so that `?` works on their own errors.
#[derive(Debug)]
pub enum RouteError<T> {
	App(AppError),
	Route(T),
}

impl<T: fmt::Display> fmt::Display for RouteError<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::App(error) => error.fmt(f),
			Self::Route(error) => error.fmt(f),
		}
	}
}

impl<T: std::error::Error + 'static> std::error::Error for RouteError<T> {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::App(error) => Some(error),
			Self::Route(error) => Some(error),
		}
	}
}

impl<T> From<AppError> for RouteError<T> {
	fn from(error: AppError) -> Self {
		Self::App(error)
	}
}

impl<T> From<repository::Error> for RouteError<T> {
	fn from(error: repository::Error) -> Self {
		Self::App(error.into())
	}
}

impl<T> From<validator::ValidationErrors> for RouteError<T> {
	fn from(errors: validator::ValidationErrors) -> Self {
		Self::App(errors.into())
	}
}

impl<T: ErrorShape> IntoResponse for RouteError<T> {
	fn into_response(self) -> Response<Body> {
		match self {
			Self::App(error) => respond(&error),
			Self::Route(error) => respond(&error),
		}
	}
}

impl<T> OperationOutput for RouteError<T> {
	type Inner = Self;
}
