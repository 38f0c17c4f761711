use aide::axum::ApiRouter;

use crate::{ratelimit, AppState};

pub mod auth;
pub mod docs;
pub mod model;
pub mod post;

/// Every API route. The limits are left out when serving without peer
/// addresses, such as in tests.
pub fn routes(limits: Option<&ratelimit::Limits>) -> ApiRouter<AppState> {
	ApiRouter::new()
		.merge(auth::routes(limits.map(|limits| limits.secure.clone())))
		.merge(post::routes())
}
