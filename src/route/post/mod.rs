use aide::axum::{
	routing::{get_with, post_with, put_with},
	ApiRouter,
};
use axum::{extract::DefaultBodyLimit, http::StatusCode};
use uuid::Uuid;

use crate::{error, extract::MAX_UPLOAD_BYTES, repository, storage, AppState};

pub mod model;
mod pipeline;
pub mod route;
mod validate;

pub use pipeline::Pipeline;

/// An error that can occur while creating, reading or changing listings.
///
/// Note that the messages of client errors are presented to the client,
/// so they should not contain sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid form: {0}")]
	Form(String),
	#[error("missing required fields: {}", .0.join(", "))]
	MissingFields(Vec<&'static str>),
	#[error("invalid price")]
	InvalidPrice,
	#[error("at least one image required")]
	NoImages,
	#[error("maximum {} images", validate::MAX_IMAGES)]
	TooManyImages,
	#[error("only image files are allowed")]
	NotAnImage {
		file_name: String,
		content_type: String,
	},
	#[error("image upload failed: {0}")]
	Storage(#[from] storage::Error),
	#[error("could not save post: {0}")]
	Persistence(#[from] repository::Error),
	#[error("unknown post {0}")]
	UnknownPost(Uuid),
}

pub type RouteError = error::RouteError<Error>;

impl From<Error> for RouteError {
	fn from(error: Error) -> Self {
		Self::Route(error)
	}
}

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/upload", post_with(upload, upload_docs))
		.api_route("/mylistings", get_with(my_listings, my_listings_docs))
		.api_route("/posts/:id", get_with(get_post, get_post_docs))
		.api_route(
			"/item/:id",
			put_with(update_post, update_post_docs).delete_with(delete_post, delete_post_docs),
		)
		.layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::Form(..)
			| Self::MissingFields(..)
			| Self::InvalidPrice
			| Self::NoImages
			| Self::TooManyImages
			| Self::NotAnImage { .. } => StatusCode::BAD_REQUEST,
			Self::Storage(..) | Self::Persistence(..) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::UnknownPost(..) => StatusCode::NOT_FOUND,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		match self {
			Self::MissingFields(fields) => fields
				.iter()
				.map(|field| error::Message::new("required").field(*field))
				.collect(),
			Self::InvalidPrice => vec![error::Message::new("must be a positive number").field("price")],
			Self::NoImages | Self::TooManyImages => {
				vec![error::Message::new(self.to_string()).field(crate::extract::IMAGES_FIELD)]
			}
			Self::NotAnImage {
				file_name,
				content_type,
			} => vec![error::Message::new("not_an_image")
				.field(crate::extract::IMAGES_FIELD)
				.detail("file_name", file_name.as_str())
				.detail("content_type", content_type.as_str())],
			Self::UnknownPost(post) => {
				vec![error::Message::new("unknown_post").detail("post", post.to_string())]
			}
			Self::Form(..) => vec![error::Message::new(self.to_string())],
			Self::Storage(..) | Self::Persistence(..) => Vec::new(),
		}
	}
}
