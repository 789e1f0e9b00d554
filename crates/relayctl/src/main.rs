//! Relay Control - CLI client for the relay routing daemon.

mod client;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

use client::RelaydClient;
use relay_common::rpc::{Method, ResponseData};
use relay_common::types::StageOutcome;

#[derive(Parser)]
#[command(name = "relayctl")]
#[command(about = "Relay - deterministic voice-command router", long_about = None)]
#[command(version = relay_common::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route one utterance through the daemon
    Ask {
        /// The utterance text
        text: Vec<String>,

        /// Conversation id to continue an existing turn sequence
        #[arg(long)]
        conversation: Option<String>,

        /// Language hint passed to the agents
        #[arg(long)]
        language: Option<String>,
    },

    /// Show daemon status and catalog freshness
    Status,

    /// Rebuild the entity catalog snapshot now
    Refresh,

    /// Re-read the config file and swap it in
    Reload,

    /// Check that the daemon is responding
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut client = RelaydClient::connect().await?;

    match cli.command {
        Commands::Ask {
            text,
            conversation,
            language,
        } => {
            let text = text.join(" ");
            if text.trim().is_empty() {
                return Err(anyhow!("empty utterance"));
            }
            let data = client
                .call(Method::Process {
                    text,
                    conversation_id: conversation,
                    language,
                })
                .await?;
            print_answer(data);
        }

        Commands::Status => {
            if let ResponseData::Status(status) = client.call(Method::Status).await? {
                println!("relayd {} (up {}s)", status.version, status.uptime_seconds);
                println!("debug level:      {}", status.debug_level.label());
                println!("catalog entities: {}", status.catalog_entities);
                match status.catalog_built_at {
                    Some(at) => println!("catalog built:    {}", at.to_rfc3339()),
                    None => println!("catalog built:    never"),
                }
            }
        }

        Commands::Refresh => {
            if let ResponseData::Refreshed { entities } = client.call(Method::RefreshCatalog).await? {
                println!("catalog rebuilt: {} entities", entities);
            }
        }

        Commands::Reload => {
            client.call(Method::ReloadConfig).await?;
            println!("configuration reloaded");
        }

        Commands::Ping => {
            client.call(Method::Ping).await?;
            println!("pong");
        }
    }

    Ok(())
}

fn print_answer(data: ResponseData) {
    let ResponseData::Answer(answer) = data else {
        return;
    };

    let stage = match answer.outcome {
        StageOutcome::Success => format!("{}", answer.stage.label().green()),
        StageOutcome::Miss => format!("{}", answer.stage.label().yellow()),
        StageOutcome::Error => format!("{}", answer.stage.label().red()),
    };

    println!("[{}] {}", stage, answer.response);

    if let Some(trace) = answer.trace {
        if !trace.is_empty() {
            for line in trace.lines() {
                println!("  {}", line.dimmed());
            }
        }
    }
}
