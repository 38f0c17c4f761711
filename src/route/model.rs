use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// These can be removed when [`serde`] supports
/// literal defaults: <https://github.com/serde-rs/serde/issues/368>
#[inline]
fn one() -> i64 {
	1
}

#[inline]
fn ten() -> i64 {
	10
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct Paginate {
	/// The page number to return (1-indexed).
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "one")]
	pub page: i64,
	/// The number of items to return per page.
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "ten", alias = "size")]
	pub page_size: i64,
}

impl Paginate {
	pub fn offset(&self) -> i64 {
		(self.page - 1) * self.page_size
	}

	pub fn limit(&self) -> i64 {
		self.page_size
	}

	/// The number of pages needed to show `total` items.
	pub fn pages(&self, total: i64) -> i64 {
		(total + self.page_size - 1) / self.page_size
	}
}

impl Default for Paginate {
	fn default() -> Self {
		Self {
			page: one(),
			page_size: ten(),
		}
	}
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct IdInput {
	pub id: Uuid,
}

#[cfg(test)]
mod test {
	#[test]
	fn test_paginate_offset() {
		let mut paginate = super::Paginate {
			page: 1,
			page_size: 10,
		};

		assert_eq!(paginate.offset(), 0);

		paginate.page = 2;

		assert_eq!(paginate.offset(), 10);

		paginate.page_size = 5;

		assert_eq!(paginate.offset(), 5);

		paginate.page = 3;

		assert_eq!(paginate.offset(), 10);
	}

	#[test]
	fn test_paginate_pages() {
		let paginate = super::Paginate {
			page: 1,
			page_size: 6,
		};

		assert_eq!(paginate.pages(0), 0);
		assert_eq!(paginate.pages(6), 1);
		assert_eq!(paginate.pages(7), 2);
	}

	#[test]
	fn test_paginate_size_alias() {
		let paginate: super::Paginate = serde_json::from_str(r#"{"size": 6}"#).unwrap();

		assert_eq!(paginate.limit(), 6);
	}

	#[test]
	fn test_paginate_defaults() {
		let paginate: super::Paginate = serde_json::from_str("{}").unwrap();

		assert_eq!(paginate.limit(), 10);
		assert_eq!(paginate.offset(), 0);
	}
}
