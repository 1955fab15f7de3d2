//! # Provider Configuration
//!
//! Resolves which chat-completion platform is active from a `key=value`
//! property file and exposes its endpoint, bearer credential and any extra
//! request-body fields.
//!
//! ```text
//! # comments start with '#' or '//'
//! use_ai=1
//! use_platform=nalang
//! url_nalang=https://api.example.com/v1/chat/completions
//! token_nalang=sk-...
//! model_nalang=nalang-xl-10
//! max_tokens_nalang=800
//! temperature_nalang=0.7
//! ```
//!
//! Keys of the form `url_<plat>` and `token_<plat>` introduce a platform.
//! Any other key ending in `_<plat>` for a known platform becomes an extra
//! body field; its value is typed with [`classify`].

use crate::error::ConfigError;
use serde_json::{Number, Value};
use std::path::Path;
use tracing::{debug, warn};

const USE_AI_KEY: &str = "use_ai";
const USE_PLATFORM_KEY: &str = "use_platform";
const URL_PREFIX: &str = "url_";
const TOKEN_PREFIX: &str = "token_";

/// Numeric shape inferred for a free-form configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    None,
    Integer,
    Float32,
    Float64,
}

/// A configuration value after type inference.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Int(i64),
    Float32(f32),
    Float64(f64),
}

impl TypedValue {
    /// Type a raw property value. Values that are not numeric stay strings.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        match classify(trimmed) {
            NumberKind::Integer => trimmed
                .parse::<i64>()
                .map(TypedValue::Int)
                .unwrap_or_else(|_| TypedValue::String(raw.to_string())),
            NumberKind::Float32 => trimmed
                .parse::<f32>()
                .map(TypedValue::Float32)
                .unwrap_or_else(|_| TypedValue::String(raw.to_string())),
            NumberKind::Float64 => trimmed
                .parse::<f64>()
                .map(TypedValue::Float64)
                .unwrap_or_else(|_| TypedValue::String(raw.to_string())),
            NumberKind::None => TypedValue::String(raw.to_string()),
        }
    }

    /// JSON form used in request bodies.
    ///
    /// `f32` values go through their shortest decimal form so that `0.7`
    /// serializes as `0.7` rather than `0.699999988079071`. Non-finite
    /// floats have no JSON representation and become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::String(s) => Value::String(s.clone()),
            TypedValue::Int(i) => Value::Number(Number::from(*i)),
            TypedValue::Float32(f) => f
                .to_string()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            TypedValue::Float64(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        }
    }
}

impl From<&TypedValue> for Value {
    fn from(value: &TypedValue) -> Self {
        value.to_json()
    }
}

/// Infer the numeric kind of a raw configuration value.
///
/// Order matters: an integer literal is never reported as a float, and the
/// magnitude check of each float width runs before the decimal/exponent
/// marker check.
pub fn classify(raw: &str) -> NumberKind {
    let value = raw.trim();
    if value.is_empty() {
        return NumberKind::None;
    }
    // Rust float parsing accepts "inf" and "NaN"; those are not numbers here.
    if !value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return NumberKind::None;
    }

    if value.parse::<i64>().is_ok() {
        return NumberKind::Integer;
    }

    let has_marker = value.contains('.') || value.contains('e') || value.contains('E');

    if let Ok(single) = value.parse::<f32>() {
        if single.is_finite() {
            if single.abs() > i32::MAX as f32 {
                return NumberKind::Float32;
            }
            if has_marker {
                return NumberKind::Float32;
            }
        }
    }

    if let Ok(double) = value.parse::<f64>() {
        if double.abs() > f32::MAX as f64 {
            return NumberKind::Float64;
        }
        if has_marker {
            return NumberKind::Float64;
        }
    }

    NumberKind::None
}

/// Parse `key=value` lines, keeping first-seen order.
///
/// Blank lines and lines starting with `#` or `//` are skipped, as are lines
/// without a key before the first `=`. A repeated key overwrites the earlier
/// value in place.
pub fn parse_properties(text: &str) -> Vec<(String, String)> {
    let mut properties: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        let Some(eq) = line.find('=') else {
            continue;
        };
        if eq == 0 {
            continue;
        }

        let key = line[..eq].trim().to_string();
        let value = line[eq + 1..].trim().to_string();

        match properties.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => properties.push((key, value)),
        }
    }

    properties
}

/// Resolved settings for the single active platform.
///
/// Built once at startup and shared read-only (usually behind an `Arc`) by
/// every client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub credential: String,
    /// Extra body fields in file order.
    pub extra_fields: Vec<(String, TypedValue)>,
}

#[derive(Debug, Default)]
struct PlatformProps {
    name: String,
    url: Option<String>,
    token: Option<String>,
    fields: Vec<(String, String)>,
}

impl ProviderConfig {
    /// A configuration that cannot back a client.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build an enabled configuration directly, bypassing the property file.
    pub fn new(endpoint: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            enabled: true,
            endpoint: endpoint.into(),
            credential: credential.into(),
            extra_fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: TypedValue) -> Self {
        let key = key.into();
        match self.extra_fields.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.extra_fields.push((key, value)),
        }
        self
    }

    /// Load the property file at `path`.
    ///
    /// A missing file is not an error: it yields a disabled configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!(path = %path.display(), "Loaded AI config file");
                Ok(Self::from_properties(&text))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No AI config file, service disabled");
                Ok(Self::disabled())
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Resolve the active platform from property file text.
    pub fn from_properties(text: &str) -> Self {
        let properties = parse_properties(text);

        let mut use_ai = false;
        let mut use_platform = String::new();
        let mut platforms: Vec<PlatformProps> = Vec::new();
        let mut others: Vec<(String, String)> = Vec::new();

        for (key, value) in properties {
            if key == USE_AI_KEY {
                use_ai = value == "1";
            } else if key == USE_PLATFORM_KEY {
                use_platform = value;
            } else if let Some(plat) = key.strip_prefix(URL_PREFIX) {
                platform_entry(&mut platforms, plat).url = Some(value);
            } else if let Some(plat) = key.strip_prefix(TOKEN_PREFIX) {
                platform_entry(&mut platforms, plat).token = Some(value);
            } else {
                others.push((key, value));
            }
        }

        // Field keys are matched after every platform is known, so their
        // position in the file relative to url_/token_ does not matter.
        for (key, value) in others {
            let owner = platforms
                .iter()
                .enumerate()
                .filter(|(_, p)| {
                    key.len() > p.name.len() + 1
                        && key.ends_with(&p.name)
                        && key.as_bytes()[key.len() - p.name.len() - 1] == b'_'
                })
                .max_by_key(|(_, p)| p.name.len())
                .map(|(i, _)| i);

            match owner {
                Some(i) => {
                    let field = key[..key.len() - platforms[i].name.len() - 1].to_string();
                    platforms[i].fields.push((field, value));
                }
                None => debug!(key = %key, "Ignoring config key without a known platform"),
            }
        }

        if !use_ai {
            return Self::disabled();
        }
        if use_platform.is_empty() {
            warn!("use_ai=1 but use_platform is not set");
            return Self::disabled();
        }
        let Some(active) = platforms.into_iter().find(|p| p.name == use_platform) else {
            warn!(platform = %use_platform, "use_platform names an unknown platform");
            return Self::disabled();
        };

        let endpoint = active.url.unwrap_or_default();
        let credential = active.token.unwrap_or_default();
        if endpoint.is_empty() || credential.is_empty() {
            warn!(
                platform = %use_platform,
                has_url = !endpoint.is_empty(),
                has_token = !credential.is_empty(),
                "Active platform is missing url_ or token_"
            );
            return Self::disabled();
        }

        let extra_fields = active
            .fields
            .into_iter()
            .map(|(k, v)| {
                let typed = TypedValue::infer(&v);
                (k, typed)
            })
            .collect();

        Self {
            enabled: true,
            endpoint,
            credential,
            extra_fields,
        }
    }

    /// Whether the configuration can back a client.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.endpoint.is_empty() && !self.credential.is_empty()
    }

    pub fn field(&self, key: &str) -> Option<&TypedValue> {
        self.extra_fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

fn platform_entry<'a>(platforms: &'a mut Vec<PlatformProps>, name: &str) -> &'a mut PlatformProps {
    if let Some(i) = platforms.iter().position(|p| p.name == name) {
        return &mut platforms[i];
    }
    platforms.push(PlatformProps {
        name: name.to_string(),
        ..Default::default()
    });
    let last = platforms.len() - 1;
    &mut platforms[last]
}
