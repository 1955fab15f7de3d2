//! # Request Builder
//!
//! Merges the configured extra body fields with the per-call `stream` flag
//! and message list. The overlay order is fixed: extra fields, then
//! `stream`, then `messages`, each later write replacing a same-named key.

use crate::provider::ProviderConfig;
use crate::schemas::Message;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Model used when the configuration carries no extra fields at all.
pub const DEFAULT_MODEL: &str = "nalang-xl-10";

/// JSON body of one chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPayload {
    pub fields: Map<String, Value>,
}

impl RequestPayload {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.fields)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.fields)
    }
}

/// Builds request bodies for one provider configuration.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    config: Arc<ProviderConfig>,
}

impl RequestBuilder {
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        Self { config }
    }

    /// Body shape used by deployments without configured fields.
    fn default_fields() -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("model".to_string(), json!(DEFAULT_MODEL));
        fields.insert("temperature".to_string(), json!(0.7));
        fields.insert("max_tokens".to_string(), json!(800));
        fields.insert("top_p".to_string(), json!(0.35));
        fields.insert("repetition_penalty".to_string(), json!(1.05));
        fields
    }

    pub fn build(&self, messages: &[Message], stream: bool) -> RequestPayload {
        let mut fields = if self.config.extra_fields.is_empty() {
            Self::default_fields()
        } else {
            self.config
                .extra_fields
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect()
        };

        fields.insert("stream".to_string(), Value::Bool(stream));
        fields.insert(
            "messages".to_string(),
            Value::Array(
                messages
                    .iter()
                    .map(|m| json!({"role": m.role, "content": m.content}))
                    .collect(),
            ),
        );

        RequestPayload { fields }
    }
}
