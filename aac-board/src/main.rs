//! aac-board - command-line front end for the picture board
//!
//! Loads configuration, reconciles the board and runs one action against it.

use aac_board::services::media_pipeline::{sniff_image_mime, ImageSource};
use aac_board::services::media_sync::MediaSync;
use aac_board::{build_manager, BoardManager, NewCard, SelectionStore};
use aac_common::config::{resolve_config_path, user_config_path, write_toml_config, BoardConfig};
use aac_common::events::EventBus;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "aac-board")]
#[command(about = "Picture board card and category manager")]
#[command(version)]
struct Args {
    /// Configuration file (overrides AAC_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the reconciled board
    Show {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Speak the given cards as one phrase
    Speak {
        #[arg(required = true)]
        card_ids: Vec<String>,
    },
    AddCategory {
        name: String,
        #[arg(long, default_value = "📁")]
        icon: String,
        #[arg(long, default_value = "#6b7280")]
        color: String,
    },
    DeleteCategory {
        id: String,
    },
    AddCard {
        #[arg(long)]
        category: String,
        #[arg(long)]
        label: String,
        #[arg(long)]
        voice_label: Option<String>,
        /// Image file to ingest
        #[arg(long)]
        image: PathBuf,
    },
    DeleteCard {
        id: String,
    },
    /// Move a card between (or within) categories
    Reorder {
        source: String,
        target: String,
        source_index: usize,
        target_index: usize,
    },
    /// Upload inline images; with --watch keep sweeping until Ctrl-C
    Sync {
        #[arg(long)]
        watch: bool,
    },
    /// Write a default config file to --config or the per-user location
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = resolve_config_path(args.config.as_deref());
    let config = BoardConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting aac-board v{}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Configuration: {}", path.display());
    }

    if let Command::InitConfig { force } = args.command {
        let target = args
            .config
            .map(PathBuf::from)
            .or_else(user_config_path)
            .context("No config directory available, pass --config")?;
        if target.exists() && !force {
            bail!("{} already exists, pass --force to replace it", target.display());
        }
        write_toml_config(&BoardConfig::default(), &target)?;
        info!("Wrote default configuration to {}", target.display());
        println!("{}", target.display());
        return Ok(());
    }

    let events = EventBus::default();
    let manager = Arc::new(build_manager(&config, events).await?);
    manager.initialize().await;

    if let Some(error) = manager.error().await {
        eprintln!("warning: {}", error);
    }

    match args.command {
        Command::Show { json } => show(&manager, json).await?,
        Command::Speak { card_ids } => {
            let cards = manager.cards().await;
            let mut selection = SelectionStore::new(&config.speech);
            for id in &card_ids {
                let card = cards
                    .iter()
                    .find(|c| &c.id == id)
                    .with_context(|| format!("Unknown card {}", id))?;
                selection.add_entry(card.clone());
            }
            if let Some(utterance) = selection.speak_phrase(&aac_board::selection::LogSpeaker) {
                println!("{}", utterance.text);
            }
        }
        Command::AddCategory { name, icon, color } => {
            let category = manager.add_category(&name, &icon, &color).await?;
            println!("{} ({})", category.id, category.group);
        }
        Command::DeleteCategory { id } => {
            let removed = manager.delete_category(&id).await?;
            println!("deleted {} with {} card(s)", id, removed);
        }
        Command::AddCard {
            category,
            label,
            voice_label,
            image,
        } => {
            let data = tokio::fs::read(&image)
                .await
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let Some(mime) = sniff_image_mime(&data) else {
                bail!("{} is not a recognised image", image.display());
            };
            let card = manager
                .add_card(NewCard {
                    category_id: category,
                    label,
                    voice_label,
                    image: ImageSource::Bytes {
                        data,
                        mime: mime.to_string(),
                    },
                })
                .await?;
            println!("{} (order {})", card.id, card.order);
        }
        Command::DeleteCard { id } => {
            manager.delete_card(&id).await?;
            println!("deleted {}", id);
        }
        Command::Reorder {
            source,
            target,
            source_index,
            target_index,
        } => {
            let report = manager
                .reorder_card(&source, &target, source_index, target_index)
                .await?;
            if !report.is_clean() {
                eprintln!(
                    "warning: {} sibling order(s) not saved",
                    report.failed_siblings.len()
                );
            }
            for card in manager.cards_in(&target).await {
                println!("{:>3}  {}", card.order, card.label);
            }
        }
        Command::Sync { watch } => {
            if !config.sync.enabled {
                bail!("Media sync is disabled in configuration");
            }
            let sync = MediaSync::new(Arc::clone(&manager));
            if watch {
                let cancel = CancellationToken::new();
                let stopper = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        stopper.cancel();
                    }
                });
                sync.run(Duration::from_secs(config.sync.interval_secs), cancel)
                    .await;
            } else {
                let report = sync.sweep().await;
                println!("uploaded {}, failed {}", report.uploaded, report.failed);
            }
        }
        // Handled before the manager is built
        Command::InitConfig { .. } => {}
    }

    Ok(())
}

async fn show(manager: &BoardManager, json: bool) -> Result<()> {
    let categories = manager.display_categories().await;

    if json {
        let mut board = Vec::with_capacity(categories.len());
        for category in categories {
            let cards = manager.cards_in(&category.id).await;
            board.push(serde_json::json!({ "category": category, "cards": cards }));
        }
        println!("{}", serde_json::to_string_pretty(&board)?);
        return Ok(());
    }

    for category in categories {
        let cards = manager.cards_in(&category.id).await;
        println!(
            "{} {} [{}] - {} card(s)",
            category.icon,
            category.name,
            category.group,
            cards.len()
        );
        for card in cards {
            println!("    {:>3}  {}", card.order, card.label);
        }
    }
    Ok(())
}
