//! # Configuration Validation Edge Cases
//!
//! Property file loading, platform resolution, numeric inference, and the
//! client's refusal to start on unusable configuration.

use nexus_chat_stream::{
    classify, ChatClient, ChatError, ClientOptions, ConfigError, NumberKind, ProviderConfig, TransportKind,
    TypedValue,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

fn build(config: ProviderConfig) -> Result<ChatClient, ChatError> {
    ChatClient::new(Arc::new(config), ClientOptions::default())
}

#[test]
fn test_load_resolves_active_platform() {
    let file = write_config(
        "# production settings\n\
         // legacy comment style\n\
         use_ai=1\n\
         use_platform=openai\n\
         url_openai=https://api.example.com/v1/chat/completions\n\
         token_openai=sk-live\n\
         model_openai=gpt-small\n\
         max_tokens_openai=512\n\
         temperature_openai=0.5\n\
         url_local=http://localhost:8000/v1/chat/completions\n\
         token_local=local\n\
         model_local=llama\n",
    );

    let config = ProviderConfig::load(file.path()).unwrap();
    assert!(config.enabled);
    assert_eq!(config.endpoint, "https://api.example.com/v1/chat/completions");
    assert_eq!(config.credential, "sk-live");
    assert_eq!(config.field("model"), Some(&TypedValue::String("gpt-small".to_string())));
    assert_eq!(config.field("max_tokens"), Some(&TypedValue::Int(512)));
    assert_eq!(config.field("temperature"), Some(&TypedValue::Float32(0.5)));
    assert_eq!(config.extra_fields.len(), 3);
}

#[test]
fn test_missing_file_is_disabled_not_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = ProviderConfig::load(dir.path().join("absent.txt")).unwrap();
    assert!(!config.enabled);
    assert!(!config.is_usable());
}

#[test]
fn test_directory_path_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ProviderConfig::load(dir.path());
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_use_ai_must_be_exactly_one() {
    for flag in ["0", "true", "yes", ""] {
        let text = format!("use_ai={}\nuse_platform=p\nurl_p=http://h/x\ntoken_p=t\n", flag);
        assert!(!ProviderConfig::from_properties(&text).enabled, "use_ai={}", flag);
    }
}

#[test]
fn test_unknown_platform_is_disabled() {
    let config = ProviderConfig::from_properties("use_ai=1\nuse_platform=ghost\nurl_p=http://h/x\ntoken_p=t\n");
    assert!(!config.enabled);
}

#[test]
fn test_longest_platform_suffix_wins() {
    let config = ProviderConfig::from_properties(
        "use_ai=1\nuse_platform=ai_b\nurl_b=http://b/x\ntoken_b=tb\nurl_ai_b=http://aib/x\ntoken_ai_b=tab\nmodel_ai_b=m\n",
    );
    assert_eq!(config.endpoint, "http://aib/x");
    assert_eq!(config.field("model"), Some(&TypedValue::String("m".to_string())));

    // Same key owned by the shorter platform name when that one is active.
    let other = ProviderConfig::from_properties(
        "use_ai=1\nuse_platform=b\nurl_b=http://b/x\ntoken_b=tb\nurl_ai_b=http://aib/x\ntoken_ai_b=tab\nmodel_ai_b=m\n",
    );
    assert_eq!(other.endpoint, "http://b/x");
    assert!(other.field("model").is_none());
}

#[test]
fn test_duplicate_keys_keep_first_position_last_value() {
    let config = ProviderConfig::from_properties(
        "use_ai=1\nuse_platform=p\nurl_p=http://h/x\ntoken_p=t\nmodel_p=first\ntop_p_p=0.9\nmodel_p=second\n",
    );
    let keys: Vec<&str> = config.extra_fields.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["model", "top_p"]);
    assert_eq!(config.field("model"), Some(&TypedValue::String("second".to_string())));
}

#[test]
fn test_values_may_contain_equals_sign() {
    let config = ProviderConfig::from_properties(
        "use_ai=1\nuse_platform=p\nurl_p=http://h/x?a=b\ntoken_p=abc==\n",
    );
    assert_eq!(config.endpoint, "http://h/x?a=b");
    assert_eq!(config.credential, "abc==");
}

#[test]
fn test_classify_examples() {
    assert_eq!(classify("42"), NumberKind::Integer);
    assert_eq!(classify("-7"), NumberKind::Integer);
    assert_eq!(classify("0.7"), NumberKind::Float32);
    assert_eq!(classify("1e3"), NumberKind::Float32);
    assert_eq!(classify("3000000000.0"), NumberKind::Float32);
    assert_eq!(classify("1e39"), NumberKind::Float64);
    assert_eq!(classify("gpt-4"), NumberKind::None);
    assert_eq!(classify(""), NumberKind::None);
    assert_eq!(classify("inf"), NumberKind::None);
    assert_eq!(classify("NaN"), NumberKind::None);
    assert_eq!(classify("1.2.3"), NumberKind::None);
}

#[test]
fn test_client_rejects_disabled_config() {
    let err = build(ProviderConfig::disabled()).err().unwrap();
    assert!(matches!(err, ChatError::Config(ConfigError::Disabled)));
}

#[test]
fn test_client_rejects_missing_endpoint() {
    let err = build(ProviderConfig::new("", "sk")).err().unwrap();
    assert!(matches!(err, ChatError::Config(ConfigError::MissingEndpoint)));
}

#[test]
fn test_client_rejects_bad_endpoints() {
    for endpoint in ["not a url", "ftp://host/path", "file:///etc/passwd"] {
        let err = build(ProviderConfig::new(endpoint, "sk")).err().unwrap();
        assert!(
            matches!(err, ChatError::Config(ConfigError::InvalidEndpoint { .. })),
            "{} -> {:?}",
            endpoint,
            err
        );
    }
}

#[test]
fn test_client_rejects_missing_credential() {
    let err = build(ProviderConfig::new("http://localhost:8000/v1/chat/completions", "")).err().unwrap();
    assert!(matches!(err, ChatError::Config(ConfigError::MissingCredential)));
}

#[test]
fn test_credential_with_newline_fails_construction() {
    for kind in [TransportKind::AsyncRead, TransportKind::Callback] {
        let config = ProviderConfig::new("http://localhost:8000/v1/chat/completions", "bad\ntoken");
        let result = ChatClient::new(Arc::new(config), ClientOptions::default().with_transport(kind));
        assert!(matches!(result, Err(ChatError::Transport(_))), "transport {}", kind);
    }
}

#[test]
fn test_transport_names_parse() {
    assert_eq!("async".parse::<TransportKind>().unwrap(), TransportKind::AsyncRead);
    assert_eq!("async-read".parse::<TransportKind>().unwrap(), TransportKind::AsyncRead);
    assert_eq!("callback".parse::<TransportKind>().unwrap(), TransportKind::Callback);
    assert!("carrier-pigeon".parse::<TransportKind>().is_err());
}
