mod demo;

use std::time::Duration;

use clap::{Parser, Subcommand};

use animenow_api::enime::EnimeClient;
use animenow_core::config::AppConfig;

#[derive(Parser)]
#[command(name = "animenow")]
#[command(about = "Browse recent releases and drive playback sessions")]
struct Cli {
    /// Log filter; takes precedence over RUST_LOG and the config file.
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List recently released episodes from Enime.
    Recent {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// Play a fixture episode through a simulated player.
    Demo {
        #[arg(long, default_value_t = 1)]
        episode: u32,
        /// Make provider discovery come back empty.
        #[arg(long)]
        no_providers: bool,
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    let filter = cli
        .log
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| config.logging.filter.clone());
    tracing_subscriber::fmt()
        .with_env_filter(filter.as_str())
        .init();

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "using default config");
    }

    match cli.command {
        Command::Recent { page, per_page } => {
            let client = EnimeClient::with_base_url(config.enime.base_url.as_str());
            let per_page = per_page.unwrap_or(config.enime.per_page);
            let recent = client.recent_episodes(page, per_page).await?;
            if recent.is_empty() {
                println!("No recent episodes.");
            }
            for item in recent {
                println!(
                    "{} [{} · {}] Episode {}: {}",
                    item.anime.title,
                    item.anime.format,
                    item.anime.status,
                    item.episode.number,
                    item.episode.title
                );
            }
        }
        Command::Demo {
            episode,
            no_providers,
            seconds,
        } => {
            demo::run(episode, no_providers, Duration::from_secs(seconds)).await?;
        }
    }

    Ok(())
}
