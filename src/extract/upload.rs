use std::collections::HashMap;

use aide::OperationInput;
use axum::extract::{FromRequest, Multipart, Request};
use bytes::Bytes;

use crate::{error::RouteError, route::post};

/// The largest upload body accepted, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 10 << 20;

/// The multipart field that carries images.
pub const IMAGES_FIELD: &str = "images";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A file part of an upload form.
#[derive(Debug, Clone)]
pub struct Image {
	pub file_name: String,
	pub content_type: String,
	pub content: Bytes,
}

/// A parsed `multipart/form-data` listing upload.
///
/// A part is a file if it has a filename. Files named [`IMAGES_FIELD`] are
/// kept as images in submission order and other files are ignored. Text parts
/// become fields, where the first value of a repeated name wins.
///
/// The body limit itself is enforced by a [`axum::extract::DefaultBodyLimit`]
/// of [`MAX_UPLOAD_BYTES`] on the route.
#[derive(Debug, Default)]
pub struct UploadForm {
	pub fields: HashMap<String, String>,
	pub images: Vec<Image>,
}

impl UploadForm {
	/// Returns the trimmed value of a text field, or an empty string if it is absent.
	pub fn field(&self, name: &str) -> &str {
		self.fields.get(name).map_or("", |value| value.trim())
	}

	async fn read(mut multipart: Multipart) -> Result<Self, post::Error> {
		let mut form = Self::default();

		while let Some(field) = multipart.next_field().await.map_err(form_error)? {
			let name = field.name().unwrap_or_default().to_owned();

			match field.file_name().map(str::to_owned) {
				Some(file_name) => {
					let content_type = field
						.content_type()
						.unwrap_or(DEFAULT_CONTENT_TYPE)
						.to_owned();
					let content = field.bytes().await.map_err(form_error)?;

					if name == IMAGES_FIELD {
						form.images.push(Image {
							file_name,
							content_type,
							content,
						});
					} else {
						tracing::debug!(field = %name, "ignoring unexpected file part");
					}
				}
				None => {
					let value = field.text().await.map_err(form_error)?;

					form.fields.entry(name).or_insert(value);
				}
			}
		}

		Ok(form)
	}
}

fn form_error(error: impl std::fmt::Display) -> post::Error {
	post::Error::Form(error.to_string())
}

#[axum::async_trait]
impl<S> FromRequest<S> for UploadForm
where
	S: Send + Sync,
{
	type Rejection = RouteError<post::Error>;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let multipart = Multipart::from_request(req, state)
			.await
			.map_err(form_error)?;

		Ok(Self::read(multipart).await?)
	}
}

impl OperationInput for UploadForm {}
