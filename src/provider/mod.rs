//! Vision backends
//!
//! One trait, three vendor implementations selected by name at startup. A
//! backend only knows how to turn a base64 PNG plus a prompt into the vendor's
//! first text segment; encoding, trimming and the billing classification are
//! shared in [`VisionBackend::answer`].

mod anthropic;
mod billing;
mod error;
mod gemini;
mod openai;

pub use billing::BillingRules;
pub use error::{BackendError, VendorError};

use base64::{Engine as _, engine::general_purpose};
use clap::ValueEnum;
use image::{DynamicImage, ImageFormat};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use tracing::{error, warn};

use crate::constants::backend as defaults;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Provider {
    #[value(name = "openai")]
    OpenAi,
    #[value(name = "gemini")]
    Gemini,
    #[value(name = "anthropic")]
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::Gemini, Provider::Anthropic];

    /// Lower-case identifier used on the command line and in settings
    pub fn id(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Anthropic => "anthropic",
        }
    }

    /// Vendor name shown to the user
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Gemini => "Gemini",
            Provider::Anthropic => "Anthropic",
        }
    }

    /// Environment variable holding this backend's credential
    pub fn api_key_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    /// Environment variable overriding this backend's model
    pub fn model_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_MODEL",
            Provider::Gemini => "GEMINI_MODEL",
            Provider::Anthropic => "ANTHROPIC_MODEL",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::OpenAi => defaults::OPENAI_DEFAULT_MODEL,
            Provider::Gemini => defaults::GEMINI_DEFAULT_MODEL,
            Provider::Anthropic => defaults::ANTHROPIC_DEFAULT_MODEL,
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => defaults::OPENAI_BASE_URL,
            Provider::Gemini => defaults::GEMINI_BASE_URL,
            Provider::Anthropic => defaults::ANTHROPIC_BASE_URL,
        }
    }

    /// Text shown in the overlay when a billing condition is detected
    pub fn billing_warning(self) -> String {
        format!(
            "Low credits/billing issue detected.\nPlease check your {} API billing.",
            self.display_name()
        )
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.id() == name)
            .ok_or_else(|| s.to_string())
    }
}

/// Resolved, immutable settings for the active backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub billing: BillingRules,
}

/// Outcome of one screenshot sent to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Trimmed, non-empty answer text
    Text(String),
    /// A quota/billing condition, with the message to show the user
    BillingWarning(String),
    /// Anything else; already logged, nothing to show
    Failed(String),
}

pub trait VisionBackend: Send {
    fn provider(&self) -> Provider;

    fn billing_rules(&self) -> &BillingRules;

    /// Issue one blocking vendor call and return its first text segment
    fn request(&self, png_base64: &str, prompt: &str) -> Result<String, VendorError>;

    /// Encode, send and classify
    fn answer(&self, image: &DynamicImage, prompt: &str) -> Answer {
        let provider = self.provider();
        let encoded = match encode_png_base64(image) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(provider = %provider, error = %e, "Failed to encode screenshot as PNG");
                return Answer::Failed(e.to_string());
            }
        };

        match self.request(&encoded, prompt) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    Answer::Failed("empty response".to_string())
                } else {
                    Answer::Text(text.to_string())
                }
            }
            Err(e) => {
                error!(provider = %provider, status = ?e.status, error = %e, "API error");
                if self.billing_rules().is_billing_error(&e) {
                    Answer::BillingWarning(provider.billing_warning())
                } else {
                    Answer::Failed(e.message)
                }
            }
        }
    }
}

/// Build the backend named in the configuration
pub fn create_backend(config: &BackendConfig) -> Result<Box<dyn VisionBackend>, BackendError> {
    if config.api_key.trim().is_empty() {
        return Err(BackendError::EmptyCredential(config.provider));
    }
    let client = Client::builder()
        .build()
        .map_err(|source| BackendError::Client {
            provider: config.provider,
            source,
        })?;

    Ok(match config.provider {
        Provider::OpenAi => Box::new(openai::OpenAiBackend::new(client, config.clone())),
        Provider::Gemini => Box::new(gemini::GeminiBackend::new(client, config.clone())),
        Provider::Anthropic => Box::new(anthropic::AnthropicBackend::new(client, config.clone())),
    })
}

pub fn encode_png_base64(image: &DynamicImage) -> Result<String, image::ImageError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// Send a JSON request, turning non-2xx responses into a [`VendorError`]
/// whose message carries the body (vendor error codes live there)
fn send_json(request: RequestBuilder, provider: Provider) -> Result<Value, VendorError> {
    let response = request.send()?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_else(|e| {
            warn!(provider = %provider, error = %e, "Failed to read error body");
            String::new()
        });
        return Err(VendorError::with_status(
            status.as_u16(),
            format!("{} API error {}: {}", provider.display_name(), status, body),
        ));
    }
    Ok(response.json()?)
}

fn missing_text(provider: Provider, json: &Value) -> VendorError {
    VendorError::new(format!(
        "No text in {} response: {}",
        provider.display_name(),
        json
    ))
}
