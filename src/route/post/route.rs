use axum::extract::State;
use macros::route;

use crate::{
	extract::{Identity, Json, Path, Query, UploadForm},
	openapi::tag,
	repository::Posts,
	response::Envelope,
	storage::{self, Blobs, ObjectKey},
};

use super::{model, validate, Error, Pipeline, RouteError};

/// Create listing
/// Creates a listing from a `multipart/form-data` body of at most 10 MiB.
///
/// Text fields: `title`, `price`, `contact_info` and `zip_code` are required,
/// `description` and `negotiable` (`true` or `1`) are optional. Between 1 and 5
/// files named `images`, each with an `image/*` content type, are stored in
/// submission order. If the listing cannot be created, no images are kept.
#[route(tag = tag::POST)]
pub async fn upload(
	State(pipeline): State<Pipeline>,
	identity: Identity,
	form: UploadForm,
) -> Result<Json<Envelope<model::Post>>, RouteError> {
	let post = pipeline.run(&identity.user, form).await?;

	Ok(Json(Envelope::with_message("post created successfully", post)))
}

/// Get own listings
/// Returns a page of your listings, newest first, along with the total number
/// of listings and pages. `size` is accepted in place of `page_size`.
#[route(tag = tag::POST)]
pub async fn my_listings(
	State(posts): State<Posts>,
	identity: Identity,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Envelope<model::ListingPage>>, RouteError> {
	let total_count = posts.count_by_owner(identity.user.id).await?;
	let page = posts.list_by_owner(identity.user.id, &paginate).await?;

	Ok(Json(Envelope::data(model::ListingPage {
		posts: page,
		total_count,
		page: paginate.page,
		page_size: paginate.page_size,
		total_pages: paginate.pages(total_count),
	})))
}

/// Update listing
/// Changes the title, price or description of one of your listings. Fields
/// that are left out keep their value.
#[route(tag = tag::POST)]
pub async fn update_post(
	State(posts): State<Posts>,
	identity: Identity,
	Path(model::IdInput { id }): Path<model::IdInput>,
	Json(input): Json<model::UpdatePostInput>,
) -> Result<Json<Envelope<model::Post>>, RouteError> {
	let update = validate::update(input)?;
	let post = posts
		.update(identity.user.id, id, update)
		.await?
		.ok_or(Error::UnknownPost(id))?;

	tracing::info!(post = %post.id, "updated post");

	Ok(Json(Envelope::with_message("post updated successfully", post)))
}

/// Delete listing
/// Deletes one of your listings together with its images.
#[route(tag = tag::POST)]
pub async fn delete_post(
	State(posts): State<Posts>,
	State(blobs): State<Blobs>,
	identity: Identity,
	Path(model::IdInput { id }): Path<model::IdInput>,
) -> Result<Json<Envelope<()>>, RouteError> {
	let post = posts
		.delete(identity.user.id, id)
		.await?
		.ok_or(Error::UnknownPost(id))?;

	let keys = post
		.image_urls
		.iter()
		.filter_map(|url| ObjectKey::from_url(url))
		.collect();

	storage::delete_all(&*blobs, keys).await;

	tracing::info!(post = %post.id, "deleted post");

	Ok(Json(Envelope::message("post deleted successfully")))
}

/// Get single listing
/// Returns a single listing by its unique id.
#[route(tag = tag::POST)]
pub async fn get_post(
	State(posts): State<Posts>,
	Path(model::IdInput { id }): Path<model::IdInput>,
) -> Result<Json<Envelope<model::Post>>, RouteError> {
	let post = posts.find(id).await?.ok_or(Error::UnknownPost(id))?;

	Ok(Json(Envelope::data(post)))
}
