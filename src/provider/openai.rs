use reqwest::blocking::Client;
use serde_json::{Value, json};

use super::{BackendConfig, BillingRules, Provider, VendorError, VisionBackend, missing_text, send_json};

/// OpenAI chat completions with an inline data-URL image
pub struct OpenAiBackend {
    client: Client,
    config: BackendConfig,
}

impl OpenAiBackend {
    pub fn new(client: Client, config: BackendConfig) -> Self {
        Self { client, config }
    }
}

impl VisionBackend for OpenAiBackend {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn billing_rules(&self) -> &BillingRules {
        &self.config.billing
    }

    fn request(&self, png_base64: &str, prompt: &str) -> Result<String, VendorError> {
        let endpoint = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = request_body(&self.config.model, self.config.max_tokens, png_base64, prompt);

        let request = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body);
        let json = send_json(request, Provider::OpenAi)?;

        extract_text(&json).ok_or_else(|| missing_text(Provider::OpenAi, &json))
    }
}

fn request_body(model: &str, max_tokens: u32, png_base64: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/png;base64,{}", png_base64) }
                    }
                ]
            }
        ],
        "max_tokens": max_tokens
    })
}

fn extract_text(json: &Value) -> Option<String> {
    json.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = request_body("gpt-4o", 300, "QUJD", "what?");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 300);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["text"], "what?");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,QUJD");
    }

    #[test]
    fn test_extract_first_choice() {
        let json = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Question 1: 42" } },
                { "message": { "role": "assistant", "content": "ignored" } }
            ]
        });
        assert_eq!(extract_text(&json).as_deref(), Some("Question 1: 42"));
    }

    #[test]
    fn test_extract_missing_content() {
        assert!(extract_text(&json!({ "choices": [] })).is_none());
        assert!(extract_text(&json!({ "choices": [{ "message": { "content": null } }] })).is_none());
    }
}
