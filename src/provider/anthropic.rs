use reqwest::blocking::Client;
use serde_json::{Value, json};

use super::{BackendConfig, BillingRules, Provider, VendorError, VisionBackend, missing_text, send_json};
use crate::constants::backend::ANTHROPIC_API_VERSION;

/// Anthropic Messages API with a base64 image block
pub struct AnthropicBackend {
    client: Client,
    config: BackendConfig,
}

impl AnthropicBackend {
    pub fn new(client: Client, config: BackendConfig) -> Self {
        Self { client, config }
    }
}

impl VisionBackend for AnthropicBackend {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn billing_rules(&self) -> &BillingRules {
        &self.config.billing
    }

    fn request(&self, png_base64: &str, prompt: &str) -> Result<String, VendorError> {
        let endpoint = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let body = request_body(&self.config.model, self.config.max_tokens, png_base64, prompt);

        let request = self
            .client
            .post(&endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&body);
        let json = send_json(request, Provider::Anthropic)?;

        extract_text(&json).ok_or_else(|| missing_text(Provider::Anthropic, &json))
    }
}

fn request_body(model: &str, max_tokens: u32, png_base64: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [
            {
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": png_base64
                        }
                    },
                    { "type": "text", "text": prompt }
                ]
            }
        ]
    })
}

fn extract_text(json: &Value) -> Option<String> {
    json.get("content")?
        .as_array()?
        .iter()
        .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))?
        .get("text")?
        .as_str()
        .map(str::to_string)
}
