//! Billing/quota classification of vendor errors
//!
//! Vendors don't publish a stable taxonomy for "out of credits", so this is a
//! keyword heuristic over the lower-cased error text plus, for backends that
//! expose it, the HTTP status. The keyword set is data, not a contract: each
//! backend starts from the shared list and the settings file can extend it.

use super::{Provider, VendorError};
use crate::constants::backend::BILLING_KEYWORDS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingRules {
    /// Lower-cased substrings that mark a billing error
    pub keywords: Vec<String>,
    /// HTTP statuses that mark a billing error regardless of the message
    pub status_codes: Vec<u16>,
}

impl BillingRules {
    /// Default rules for a backend, extended with user-configured keywords
    pub fn for_provider(provider: Provider, extra_keywords: &[String]) -> Self {
        let mut keywords: Vec<String> = BILLING_KEYWORDS.iter().map(|k| k.to_string()).collect();
        let mut status_codes = Vec::new();

        match provider {
            Provider::OpenAi => {
                keywords.extend(
                    ["insufficient_quota", "rate_limit", "402", "429"]
                        .iter()
                        .map(|k| k.to_string()),
                );
                status_codes.extend([402, 429]);
            }
            Provider::Anthropic => keywords.push("rate_limit".to_string()),
            Provider::Gemini => {}
        }

        for extra in extra_keywords {
            let extra = extra.trim().to_lowercase();
            if !extra.is_empty() && !keywords.contains(&extra) {
                keywords.push(extra);
            }
        }

        Self {
            keywords,
            status_codes,
        }
    }

    /// True if the error looks like a quota/billing condition
    pub fn is_billing_error(&self, error: &VendorError) -> bool {
        if let Some(status) = error.status
            && self.status_codes.contains(&status)
        {
            return true;
        }
        let message = error.message.to_lowercase();
        self.keywords.iter().any(|k| message.contains(k.as_str()))
    }
}
