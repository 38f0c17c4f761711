use std::borrow::Cow;

use schemars::JsonSchema;
use serde::Serialize;

/// The body of every successful response.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Envelope<T> {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<Cow<'static, str>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
}

impl<T> Envelope<T> {
	pub fn data(data: T) -> Self {
		Self {
			success: true,
			message: None,
			data: Some(data),
		}
	}

	pub fn with_message(message: impl Into<Cow<'static, str>>, data: T) -> Self {
		Self {
			success: true,
			message: Some(message.into()),
			data: Some(data),
		}
	}
}

impl Envelope<()> {
	pub fn message(message: impl Into<Cow<'static, str>>) -> Self {
		Self {
			success: true,
			message: Some(message.into()),
			data: None,
		}
	}
}
