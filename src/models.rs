use crate::utils::strip_data_url;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Largest accepted base64 payload for one image, in characters.
pub const MAX_ENCODED_IMAGE_CHARS: usize = 12_000_000;

/// Upper bound on [`ImagePolicy::max_images`].
pub const MAX_IMAGES_PER_REQUEST: usize = 4;

/// The validated report returned to the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingReport {
    pub vehicle_title: String,
    pub lens_score: u8,
    pub summary: String,
    pub market_value_estimate: String,
    pub red_flags: Vec<String>,
    pub questions_to_ask: Vec<String>,
}

/// How many screenshots a single request may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePolicy {
    pub max_images: usize,
}

impl ImagePolicy {
    pub const fn single() -> Self {
        Self { max_images: 1 }
    }

    pub const fn multi() -> Self {
        Self {
            max_images: MAX_IMAGES_PER_REQUEST,
        }
    }

    /// Request body size needed to carry `max_images` full-size payloads.
    pub fn body_limit(&self) -> usize {
        self.max_images * MAX_ENCODED_IMAGE_CHARS + 64 * 1024
    }
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self::multi()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("at least one image is required")]
    MissingImages,
    #[error("images must be an array of base64 strings")]
    ImagesNotArray,
    #[error("too many images: {count} provided, at most {max} allowed")]
    TooManyImages { count: usize, max: usize },
    #[error("image {index} is not a string")]
    NotAString { index: usize },
    #[error("image {index} is empty")]
    EmptyImage { index: usize },
    #[error("image {index} is too large: {len} characters, limit is {max}")]
    ImageTooLarge {
        index: usize,
        len: usize,
        max: usize,
    },
}

/// Inbound body of `POST /analyze`. Either `image` or `images` carries the
/// screenshots; `images` wins when both are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub image: Option<Value>,

    #[serde(default)]
    pub images: Option<Value>,

    #[serde(default, rename = "mimeType", alias = "mime_type")]
    pub mime_type: Option<String>,
}

/// A request that passed validation and is ready for the model gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRequest {
    pub images: Vec<String>,
    pub mime_type: String,
}

impl AnalyzeRequest {
    pub fn decode(
        self,
        policy: &ImagePolicy,
        default_mime_type: &str,
    ) -> Result<DecodedRequest, InvalidInput> {
        let images = self.images.filter(|v| !v.is_null());
        let image = self.image.filter(|v| !v.is_null());

        let items = match (images, image) {
            (Some(Value::Array(items)), _) => items,
            (Some(_), _) => return Err(InvalidInput::ImagesNotArray),
            (None, Some(single)) => vec![single],
            (None, None) => return Err(InvalidInput::MissingImages),
        };

        if items.is_empty() {
            return Err(InvalidInput::MissingImages);
        }
        if items.len() > policy.max_images {
            return Err(InvalidInput::TooManyImages {
                count: items.len(),
                max: policy.max_images,
            });
        }

        let mut declared_mime = None;
        let mut decoded = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let Value::String(encoded) = item else {
                return Err(InvalidInput::NotAString { index });
            };

            let len = encoded.chars().count();
            if len > MAX_ENCODED_IMAGE_CHARS {
                return Err(InvalidInput::ImageTooLarge {
                    index,
                    len,
                    max: MAX_ENCODED_IMAGE_CHARS,
                });
            }

            let (payload, mime) = strip_data_url(&encoded);
            if payload.trim().is_empty() {
                return Err(InvalidInput::EmptyImage { index });
            }
            if declared_mime.is_none() {
                declared_mime = mime.map(str::to_string);
            }
            decoded.push(payload.to_string());
        }

        let mime_type = self
            .mime_type
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .or(declared_mime)
            .unwrap_or_else(|| default_mime_type.to_string());

        Ok(DecodedRequest {
            images: decoded,
            mime_type,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            raw: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}
