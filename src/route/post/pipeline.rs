use std::time::Instant;

use axum::extract::FromRef;

use crate::{
	extract::UploadForm,
	repository::Posts,
	route::auth::model::User,
	storage::{self, Blobs, RetryPolicy, Rollback},
	AppState,
};

use super::{model::Post, validate, Error};

/// Turns an upload form into a stored post.
///
/// Either the post is created with every image stored, or no post is created
/// and the images uploaded so far are deleted again. The blob store and the
/// database share no transaction, so the deletion is a compensating action
/// driven by a [`Rollback`] guard while uploading, and done directly if the
/// repository rejects the post.
pub struct Pipeline {
	blobs: Blobs,
	posts: Posts,
	retry: RetryPolicy,
}

impl FromRef<AppState> for Pipeline {
	fn from_ref(state: &AppState) -> Self {
		Self {
			blobs: state.blobs.clone(),
			posts: state.posts.clone(),
			retry: state.retry.clone(),
		}
	}
}

impl Pipeline {
	#[tracing::instrument(skip_all, fields(user = %owner.id, images = form.images.len()))]
	pub async fn run(&self, owner: &User, form: UploadForm) -> Result<Post, Error> {
		let started = Instant::now();

		let listing = validate::listing(&form)?;
		validate::images(&form.images)?;

		let mut rollback = Rollback::new(self.blobs.clone());
		let mut urls = Vec::with_capacity(form.images.len());

		// Sequential, so a failure stops further writes right away.
		for image in form.images {
			let stored = storage::upload(
				&*self.blobs,
				image.content,
				&image.content_type,
				&image.file_name,
				&self.retry,
			)
			.await;

			match stored {
				Ok(object) => {
					rollback.push(object.key);
					urls.push(object.url);
				}
				Err(error) => {
					tracing::warn!(%error, file = %image.file_name, "image upload failed, rolling back");
					rollback.run().await;

					return Err(error.into());
				}
			}
		}

		let count = urls.len() as u64;

		// A cancelled insert may still commit, so from here on only an
		// error returned by the repository removes the images.
		let keys = rollback.disarm();

		match self.posts.create(listing.into_post(owner.id, urls)).await {
			Ok(post) => {
				tracing::info!(
					monotonic_counter.images_uploaded = count,
					histogram.upload_latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
					post = %post.id,
					"created post"
				);

				Ok(post)
			}
			Err(error) => {
				tracing::warn!(%error, "could not save post, rolling back");
				storage::delete_all(&*self.blobs, keys).await;

				Err(error.into())
			}
		}
	}
}
