pub use crate::route::model::{IdInput, Paginate};

use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A marketplace listing, created by a user.
#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Post {
	/// The unique identifier of the post.
	pub id: Uuid,
	/// The user that created the post.
	pub user_id: Uuid,
	/// The title of the listing.
	pub title: String,
	/// An optional free-form description.
	pub description: Option<String>,
	/// The asking price.
	pub price: Decimal,
	/// How buyers can reach the seller.
	pub contact_info: String,
	/// The postal code the item is located in.
	pub zip_code: String,
	/// Whether the seller is open to offers.
	pub negotiable: bool,
	/// Public URLs of the listing's images, in upload order.
	pub image_urls: Vec<String>,
	/// The creation time of the post.
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The validated text fields of an upload form.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
	pub title: String,
	pub description: Option<String>,
	pub price: Decimal,
	pub contact_info: String,
	pub zip_code: String,
	pub negotiable: bool,
}

impl Listing {
	pub fn into_post(self, user_id: Uuid, image_urls: Vec<String>) -> NewPost {
		NewPost {
			user_id,
			title: self.title,
			description: self.description,
			price: self.price,
			contact_info: self.contact_info,
			zip_code: self.zip_code,
			negotiable: self.negotiable,
			image_urls,
		}
	}
}

/// A post that is ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewPost {
	pub user_id: Uuid,
	pub title: String,
	pub description: Option<String>,
	pub price: Decimal,
	pub contact_info: String,
	pub zip_code: String,
	pub negotiable: bool,
	pub image_urls: Vec<String>,
}

/// One page of a user's listings.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ListingPage {
	pub posts: Vec<Post>,
	/// The number of listings across all pages.
	pub total_count: i64,
	pub page: i64,
	pub page_size: i64,
	pub total_pages: i64,
}

/// Changes to an existing listing. Absent fields are left as they are.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct UpdatePostInput {
	/// The new title. Must not be blank.
	pub title: Option<String>,
	/// The new asking price. Must be positive.
	pub price: Option<f64>,
	/// The new description. An empty string removes it.
	pub description: Option<String>,
}

/// A checked [`UpdatePostInput`], ready to be persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostUpdate {
	pub title: Option<String>,
	pub price: Option<Decimal>,
	/// `Some(None)` removes the description.
	pub description: Option<Option<String>>,
}
