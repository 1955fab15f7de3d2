#[cfg(feature = "cli")]
use clap::Parser;
use crate::client::ClientOptions;
use crate::transport::TransportKind;
use std::path::PathBuf;
use std::time::Duration;

/// # Runtime Configuration
///
/// Options that are not part of the provider property file: which
/// transport to use, timeouts, logging, and (for the `nnchat` binary) the
/// prompt. Supports command-line arguments, environment variables, and
/// `.env` loading.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "nnchat"))]
#[cfg_attr(feature = "cli", command(about = "Send a prompt to an OpenAI-style streaming chat endpoint and print the reply"))]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    // =============================================================================
    // PROVIDER
    // =============================================================================

    /// Property file with use_ai, use_platform, url_<plat>, token_<plat>, <field>_<plat>
    #[cfg_attr(feature = "cli", arg(short, long, env = "AI_CONFIG", default_value = "ai_config.txt"))]
    pub config_file: PathBuf,

    // =============================================================================
    // TRANSPORT
    // =============================================================================

    /// Transport realization (async, callback)
    #[cfg_attr(feature = "cli", arg(long, env = "nnCHAT_TRANSPORT", default_value = "async"))]
    pub transport: String,

    /// Overall request timeout in seconds
    #[cfg_attr(feature = "cli", arg(long, env = "nnCHAT_TIMEOUT", default_value = "600"))]
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    #[cfg_attr(feature = "cli", arg(long, env = "nnCHAT_CONNECT_TIMEOUT", default_value = "10"))]
    pub connect_timeout_secs: u64,

    // =============================================================================
    // OUTPUT
    // =============================================================================

    /// Wait for the whole reply instead of printing deltas as they arrive
    #[cfg_attr(feature = "cli", arg(long))]
    pub whole: bool,

    /// Optional system message sent before the prompt
    #[cfg_attr(feature = "cli", arg(long))]
    pub system: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[cfg_attr(feature = "cli", arg(long, env = "RUST_LOG", default_value = "warn"))]
    pub log_level: String,

    /// Prompt text; words are joined with spaces
    #[cfg_attr(feature = "cli", arg(required = true))]
    pub prompt: Vec<String>,
}

impl Config {
    /// Parse configuration from command line arguments and environment
    /// variables, set up logging, and validate.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        // Load .env file if it exists (ignore errors if file doesn't exist)
        let _ = dotenv::dotenv();

        let config = Self::parse();

        config.setup_logging();

        if let Err(err) = config.validate() {
            eprintln!("Configuration validation failed: {}", err);
            std::process::exit(1);
        }

        config
    }

    /// Create a test configuration with minimal required fields.
    pub fn for_test() -> Self {
        Self {
            config_file: PathBuf::from("ai_config.txt"),
            transport: "async".to_string(),
            timeout_secs: 600,
            connect_timeout_secs: 10,
            whole: false,
            system: None,
            log_level: "warn".to_string(),
            prompt: vec!["hello".to_string()],
        }
    }

    #[cfg(feature = "cli")]
    fn setup_logging(&self) {
        // Logs go to stderr so they never interleave with the reply on stdout.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(&self.log_level)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    pub fn transport_kind(&self) -> Result<TransportKind, String> {
        self.transport.parse()
    }

    /// Validate configuration values and provide helpful error messages.
    pub fn validate(&self) -> Result<(), String> {
        self.transport_kind()?;

        if self.timeout_secs == 0 {
            return Err("Request timeout must be greater than 0 seconds.".to_string());
        }
        if self.connect_timeout_secs == 0 {
            return Err("Connect timeout must be greater than 0 seconds.".to_string());
        }
        if self.connect_timeout_secs > self.timeout_secs {
            eprintln!(
                "⚠️  Warning: Connect timeout ({}s) exceeds the overall request timeout ({}s); \
                the request timeout will fire first.",
                self.connect_timeout_secs, self.timeout_secs
            );
        }

        if self.prompt_text().trim().is_empty() {
            return Err("Prompt cannot be empty.".to_string());
        }

        // Accept full EnvFilter directives (e.g. "nexus_chat_stream=debug"),
        // but check bare levels for typos.
        let valid_log_levels = ["error", "warn", "info", "debug", "trace", "off"];
        if !self.log_level.contains('=') && !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log level '{}'. Valid options are: {}",
                self.log_level,
                valid_log_levels.join(", ")
            ));
        }

        Ok(())
    }

    pub fn prompt_text(&self) -> String {
        self.prompt.join(" ")
    }

    pub fn client_options(&self) -> Result<ClientOptions, String> {
        Ok(ClientOptions {
            transport: self.transport_kind()?,
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        })
    }
}
