use reqwest::blocking::Client;
use serde_json::{Value, json};

use super::{BackendConfig, BillingRules, Provider, VendorError, VisionBackend, missing_text, send_json};

/// Google Gemini `generateContent` with inline image data
pub struct GeminiBackend {
    client: Client,
    config: BackendConfig,
}

impl GeminiBackend {
    pub fn new(client: Client, config: BackendConfig) -> Self {
        Self { client, config }
    }
}

impl VisionBackend for GeminiBackend {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn billing_rules(&self) -> &BillingRules {
        &self.config.billing
    }

    fn request(&self, png_base64: &str, prompt: &str) -> Result<String, VendorError> {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let body = request_body(self.config.max_tokens, png_base64, prompt);

        let request = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body);
        let json = send_json(request, Provider::Gemini)?;

        extract_text(&json).ok_or_else(|| missing_text(Provider::Gemini, &json))
    }
}

fn request_body(max_tokens: u32, png_base64: &str, prompt: &str) -> Value {
    json!({
        "contents": [
            {
                "parts": [
                    { "text": prompt },
                    { "inline_data": { "mime_type": "image/png", "data": png_base64 } }
                ]
            }
        ],
        "generationConfig": { "maxOutputTokens": max_tokens }
    })
}

/// First text part of the first candidate (parts may also carry non-text data)
fn extract_text(json: &Value) -> Option<String> {
    json.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::to_string)
}
