//! Checks run on an upload form before anything is written anywhere.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::extract::{Image, UploadForm};

use super::{
	model::{Listing, PostUpdate, UpdatePostInput},
	Error,
};

/// Text fields that must be present and non-blank.
pub const REQUIRED: [&str; 4] = ["title", "price", "contact_info", "zip_code"];

pub const MAX_IMAGES: usize = 5;

/// Values of `negotiable` that mean yes. Everything else, including an absent
/// field, means [`NEGOTIABLE_DEFAULT`].
const TRUTHY: [&str; 2] = ["true", "1"];
const NEGOTIABLE_DEFAULT: bool = false;

const IMAGE_PREFIX: &str = "image/";

/// Builds the listing described by the text fields of `form`.
pub fn listing(form: &UploadForm) -> Result<Listing, Error> {
	let missing = REQUIRED
		.into_iter()
		.filter(|name| form.field(name).is_empty())
		.collect::<Vec<_>>();

	if !missing.is_empty() {
		return Err(Error::MissingFields(missing));
	}

	let description = form.field("description");

	Ok(Listing {
		title: form.field("title").to_owned(),
		description: (!description.is_empty()).then(|| description.to_owned()),
		price: parse_price(form.field("price"))?,
		contact_info: form.field("contact_info").to_owned(),
		zip_code: form.field("zip_code").to_owned(),
		negotiable: parse_negotiable(form.fields.get("negotiable").map(String::as_str)),
	})
}

/// Parses a strictly positive price, in plain or scientific notation.
/// Digit separators are not accepted.
pub fn parse_price(value: &str) -> Result<Decimal, Error> {
	if value.contains('_') {
		return Err(Error::InvalidPrice);
	}

	let price = Decimal::from_str(value)
		.or_else(|_| Decimal::from_scientific(value))
		.map_err(|_| Error::InvalidPrice)?;

	if price <= Decimal::ZERO {
		return Err(Error::InvalidPrice);
	}

	Ok(price)
}

/// Checks the changes requested for an existing listing.
pub fn update(input: UpdatePostInput) -> Result<PostUpdate, Error> {
	if input.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
		return Err(Error::MissingFields(vec!["title"]));
	}

	let price = input
		.price
		.map(|price| {
			Decimal::try_from(price)
				.ok()
				.filter(|price| *price > Decimal::ZERO)
				.ok_or(Error::InvalidPrice)
		})
		.transpose()?;

	Ok(PostUpdate {
		title: input.title,
		price,
		description: input
			.description
			.map(|description| (!description.trim().is_empty()).then_some(description)),
	})
}

/// Permissive flag parsing: only the values in [`TRUTHY`] are true.
pub fn parse_negotiable(value: Option<&str>) -> bool {
	match value.map(str::trim) {
		Some(value) => TRUTHY.contains(&value),
		None => NEGOTIABLE_DEFAULT,
	}
}

/// Checks the image count and that every file declares an image content type.
///
/// The first offending file rejects the whole form.
pub fn images(images: &[Image]) -> Result<(), Error> {
	if images.is_empty() {
		return Err(Error::NoImages);
	}

	if images.len() > MAX_IMAGES {
		return Err(Error::TooManyImages);
	}

	if let Some(image) = images.iter().find(|image| !is_image(&image.content_type)) {
		return Err(Error::NotAnImage {
			file_name: image.file_name.clone(),
			content_type: image.content_type.clone(),
		});
	}

	Ok(())
}

fn is_image(content_type: &str) -> bool {
	content_type
		.get(..IMAGE_PREFIX.len())
		.is_some_and(|prefix| prefix.eq_ignore_ascii_case(IMAGE_PREFIX))
}

#[cfg(test)]
mod test {
	use bytes::Bytes;

	use super::*;

	fn form(fields: &[(&str, &str)]) -> UploadForm {
		UploadForm {
			fields: fields
				.iter()
				.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
				.collect(),
			images: Vec::new(),
		}
	}

	fn image(content_type: &str) -> Image {
		Image {
			file_name: "photo.png".into(),
			content_type: content_type.into(),
			content: Bytes::from_static(b"\x89PNG"),
		}
	}

	const VALID: [(&str, &str); 4] = [
		("title", "Bike"),
		("price", "19.99"),
		("contact_info", "jane@example.com"),
		("zip_code", "10115"),
	];

	#[test]
	fn test_price() {
		assert_eq!(parse_price("19.99").unwrap(), Decimal::new(1999, 2));
		assert_eq!(parse_price("2e1").unwrap(), Decimal::new(20, 0));

		for price in ["0", "-5", "abc", "0.00", "", "1_000", "1e_2"] {
			assert!(matches!(parse_price(price), Err(Error::InvalidPrice)), "{price}");
		}
	}

	#[test]
	fn test_negotiable() {
		assert!(parse_negotiable(Some("true")));
		assert!(parse_negotiable(Some("1")));

		for value in [Some("false"), Some(""), None, Some("yes"), Some("TRUE")] {
			assert!(!parse_negotiable(value), "{value:?}");
		}
	}

	#[test]
	fn test_missing_fields_are_all_named() {
		match listing(&form(&[("title", "Bike"), ("price", "  ")])) {
			Err(Error::MissingFields(fields)) => {
				assert_eq!(fields, ["price", "contact_info", "zip_code"]);
			}
			other => panic!("unexpected result: {other:?}"),
		}
	}

	#[test]
	fn test_listing() {
		let mut fields = VALID.to_vec();
		fields.push(("negotiable", "1"));

		let listing = listing(&form(&fields)).unwrap();

		assert_eq!(listing.title, "Bike");
		assert_eq!(listing.description, None);
		assert_eq!(listing.price, Decimal::new(1999, 2));
		assert!(listing.negotiable);
	}

	#[test]
	fn test_long_text_is_kept() {
		let title = "a".repeat(200);
		let description = "b".repeat(10_000);
		let mut fields: Vec<(&str, &str)> = VALID.to_vec();
		fields[0] = ("title", &title);
		fields.push(("description", &description));

		let listing = listing(&form(&fields)).unwrap();

		assert_eq!(listing.title.len(), 200);
		assert_eq!(listing.description.as_deref(), Some(description.as_str()));
	}

	#[test]
	fn test_update() {
		let input = UpdatePostInput {
			title: None,
			price: Some(25.5),
			description: Some(String::new()),
		};

		assert_eq!(
			update(input).unwrap(),
			PostUpdate {
				title: None,
				price: Some(Decimal::new(255, 1)),
				description: Some(None),
			}
		);

		for price in [0.0, -1.0] {
			let input = UpdatePostInput {
				title: None,
				price: Some(price),
				description: None,
			};

			assert!(matches!(update(input), Err(Error::InvalidPrice)), "{price}");
		}

		let input = UpdatePostInput {
			title: Some("  ".into()),
			price: None,
			description: None,
		};

		assert!(matches!(update(input), Err(Error::MissingFields(..))));
	}

	#[test]
	fn test_image_count() {
		assert!(matches!(images(&[]), Err(Error::NoImages)));
		assert!(images(&vec![image("image/png"); MAX_IMAGES]).is_ok());
		assert!(matches!(
			images(&vec![image("image/png"); MAX_IMAGES + 1]),
			Err(Error::TooManyImages)
		));
	}

	#[test]
	fn test_first_non_image_rejects() {
		let result = images(&[image("image/jpeg"), image("text/plain"), image("application/pdf")]);

		let Err(Error::NotAnImage { content_type, .. }) = result else {
			panic!("expected a content type error");
		};

		assert_eq!(content_type, "text/plain");
		assert!(images(&[image("IMAGE/PNG")]).is_ok());
	}
}
