//! Generic submission envelope shared by every provider.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::CoreError;
use crate::types::JsonMap;

/// URL schemes accepted for reference images.
const REFERENCE_URL_PREFIXES: &[&str] = &["https://", "http://", "data:"];

/// Body sent to `POST /api/{media_type}/{provider}`.
///
/// `options` carries provider-specific knobs (aspect ratio, duration,
/// seed ...) and is flattened into the envelope as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,

    #[validate(length(min = 1, message = "model must not be empty"))]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[validate(custom(function = "validate_reference_urls"))]
    pub reference_image_urls: Vec<String>,

    #[serde(flatten)]
    pub options: JsonMap,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_avatar(mut self, avatar_id: impl Into<String>) -> Self {
        self.avatar_id = Some(avatar_id.into());
        self
    }

    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }

    pub fn with_style(mut self, style_id: impl Into<String>) -> Self {
        self.style_id = Some(style_id.into());
        self
    }

    pub fn with_reference_image(mut self, url: impl Into<String>) -> Self {
        self.reference_image_urls.push(url.into());
        self
    }

    /// Set a provider-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Same request against a different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    /// Validate and render the JSON envelope.
    pub fn to_envelope(&self) -> Result<JsonMap, CoreError> {
        self.validate()?;
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(_) => Err(CoreError::Validation(
                "request did not serialize to an object".to_string(),
            )),
            Err(e) => Err(CoreError::Validation(e.to_string())),
        }
    }
}

fn validate_reference_urls(urls: &[String]) -> Result<(), ValidationError> {
    match urls
        .iter()
        .find(|u| !REFERENCE_URL_PREFIXES.iter().any(|p| u.starts_with(p)))
    {
        Some(bad) => {
            let mut err = ValidationError::new("reference_url");
            err.message = Some(format!("unsupported reference image URL '{bad}'").into());
            Err(err)
        }
        None => Ok(()),
    }
}
