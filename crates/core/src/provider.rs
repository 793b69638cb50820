//! Provider and media-type tags.
//!
//! The endpoint for a submission is keyed by `(media_type, provider)`:
//! `POST /api/{media_type}/{provider}`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::extract::{self, FieldStrategy};

/// Kind of artifact a generation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    /// Path segment used in the submission endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl FromStr for MediaType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            other => Err(CoreError::UnknownMediaType(other.to_string())),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Third-party generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Flux,
    Seedream,
    Kling,
    Veo,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::Gemini,
        Provider::Flux,
        Provider::Seedream,
        Provider::Kling,
        Provider::Veo,
    ];

    /// Path segment used in the submission endpoint.
    pub fn slug(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Flux => "flux",
            Provider::Seedream => "seedream",
            Provider::Kling => "kling",
            Provider::Veo => "veo",
        }
    }

    pub fn media_type(self) -> MediaType {
        match self {
            Provider::Gemini | Provider::Flux | Provider::Seedream => MediaType::Image,
            Provider::Kling | Provider::Veo => MediaType::Video,
        }
    }

    /// Where a completed job of this provider carries its result URL.
    pub fn job_result_strategies(self) -> &'static [FieldStrategy] {
        extract::job_result_strategies(self.media_type())
    }

    /// Where a synchronous response of this provider carries its result.
    /// Empty for providers that always create a job.
    pub fn immediate_result_strategies(self) -> &'static [FieldStrategy] {
        match self {
            Provider::Gemini | Provider::Flux | Provider::Seedream => {
                extract::IMMEDIATE_RESULT_STRATEGIES
            }
            Provider::Kling | Provider::Veo => &[],
        }
    }

    /// Reject a request for a medium this provider does not produce.
    pub fn ensure_supports(self, media_type: MediaType) -> Result<(), CoreError> {
        if self.media_type() == media_type {
            Ok(())
        } else {
            Err(CoreError::UnsupportedMedia {
                provider: self.slug(),
                media_type: media_type.as_str(),
            })
        }
    }
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.slug() == wanted)
            .ok_or(CoreError::UnknownProvider(wanted))
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}
