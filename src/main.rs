//! # nnchat - command-line chat client
//!
//! Sends one prompt to the platform selected in the AI config file and prints
//! the reply. Ctrl+C cancels the request in flight.

use nexus_chat_stream::{CancellationToken, ChatClient, Config, Message, ProviderConfig};
use std::io::Write;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from CLI args and .env file
    let config = Config::parse_args();

    let provider = Arc::new(ProviderConfig::load(&config.config_file)?);
    let mut client = ChatClient::new(provider, config.client_options()?)?;
    info!(transport = ?client.transport_name(), "Sending prompt");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("📡 Received SIGINT (Ctrl+C), cancelling request");
            on_signal.cancel();
        }
    });

    let mut messages = Vec::new();
    if let Some(system) = &config.system {
        messages.push(Message::system(system.clone()));
    }
    messages.push(Message::user(config.prompt_text()));

    let result = if config.whole {
        client
            .get_all(&messages, Some(&cancel))
            .await
            .map(|reply| println!("{}", reply))
    } else {
        let mut stdout = std::io::stdout();
        let streamed = client
            .start_streaming(
                &messages,
                |delta| {
                    let _ = stdout.write_all(delta.as_bytes());
                    let _ = stdout.flush();
                },
                Some(&cancel),
            )
            .await;
        println!();
        streamed
    };

    signal_task.abort();
    client.close();

    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_cancelled() => {
            eprintln!("cancelled");
            std::process::exit(130);
        }
        Err(err) => Err(err.into()),
    }
}
