use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use chatmem::config::AppConfig;
use chatmem::llm::APIKeyStorage;
use chatmem::memory::ConversationId;

/// Chat with the bot from the terminal, one line per message.
#[derive(Debug, Parser)]
#[command(name = "chatmem", version)]
struct Cli {
    /// Conversation subject id (user or group number)
    #[arg(long, default_value_t = 0)]
    id: i64,

    /// Treat the conversation as a group chat
    #[arg(long)]
    group: bool,

    /// Store an API key for the configured provider in the OS keychain and exit
    #[arg(long, value_name = "KEY", conflicts_with = "delete_api_key")]
    set_api_key: Option<String>,

    /// Remove the configured provider's API key from the OS keychain and exit
    #[arg(long)]
    delete_api_key: bool,
}

const CLEAR_COMMAND: &str = "..clear";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatmem=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let conversation = if cli.group {
        ConversationId::group(cli.id)
    } else {
        ConversationId::individual(cli.id)
    };

    let config = AppConfig::load()?;

    if let Some(api_key) = &cli.set_api_key {
        APIKeyStorage::save(&config.provider, api_key.trim())?;
        println!("API key saved for {}", config.provider);
        return Ok(());
    }
    if cli.delete_api_key {
        APIKeyStorage::delete(&config.provider)?;
        println!("API key removed for {}", config.provider);
        return Ok(());
    }

    let agent = chatmem::build_agent(&config).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        if message == CLEAR_COMMAND {
            match agent.clear(&conversation).await {
                Ok(()) => println!("Done! Our chat history is wiped clean. What shall we talk about?"),
                Err(e) => tracing::error!("Failed to clear memory: {}", e),
            }
            continue;
        }

        let reply = agent.chat(&conversation, message).await;
        println!("{}", reply);
    }

    agent.registry().shutdown().await;

    Ok(())
}
