//! Argument parsing for `genjob-cli <provider> <prompt> [model]`.
//!
//! The provider may be qualified with its medium (`video/kling`), which
//! is checked against what the provider produces.

use genjob_core::error::CoreError;
use genjob_core::{MediaType, Provider};

pub const USAGE: &str = "usage: genjob-cli [<media>/]<provider> <prompt> [model]";

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
    #[error("{}", USAGE)]
    Usage,

    #[error(transparent)]
    Provider(#[from] CoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub provider: Provider,
    pub prompt: String,
    pub model: String,
}

impl CliArgs {
    /// Parse positional arguments, program name excluded.
    pub fn parse<I>(args: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let provider = parse_provider(&args.next().ok_or(ArgsError::Usage)?)?;
        let prompt = args
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or(ArgsError::Usage)?;
        let model = args
            .next()
            .unwrap_or_else(|| default_model(provider).to_string());
        if args.next().is_some() {
            return Err(ArgsError::Usage);
        }
        Ok(Self {
            provider,
            prompt,
            model,
        })
    }
}

fn parse_provider(raw: &str) -> Result<Provider, CoreError> {
    match raw.split_once('/') {
        Some((media, provider)) => {
            let media: MediaType = media.parse()?;
            let provider: Provider = provider.parse()?;
            provider.ensure_supports(media)?;
            Ok(provider)
        }
        None => raw.parse(),
    }
}

/// Model used when none is given on the command line.
pub fn default_model(provider: Provider) -> &'static str {
    match provider {
        Provider::Gemini => "gemini-2.5-flash-image",
        Provider::Flux => "flux-pro",
        Provider::Seedream => "seedream-4",
        Provider::Kling => "kling-v2",
        Provider::Veo => "veo-3",
    }
}
