//! # px-runner
//!
//! Terminal price board for six crypto assets quoted in USD.
//!
//! Snapshots are pulled over REST at start-up and on `refresh`; `connect`
//! (or `toggle`) opens the live ticker feed, after which streamed prices
//! replace snapshot prices on the board until the feed is closed.
//!
//! # Usage
//!
//! ```bash
//! px-runner config/pricefeed.json --log-level info --connect
//! ```

mod board;
mod command;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use px_core::config::AppConfig;
use px_core::error::PxError;
use px_core::logging::LogFormat;
use px_core::ws::WsConnector;
use px_core::{Asset, Channel, CurrencyPair, Snapshot};
use px_feed::RatesSource;
use px_feed::manager::{FeedManager, FeedState};
use px_feed::snapshot::SnapshotFetcher;
use px_feed::store::FeedStore;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::board::Board;
use crate::command::{Command, RefreshTarget};

/// USD price board with a live exchange feed.
#[derive(Parser)]
#[command(name = "px-runner", about = "USD price board with a live exchange feed")]
struct Cli {
    /// Configuration file path (JSON). Built-in defaults apply when omitted.
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output (overrides `app.log_path`).
    #[arg(long)]
    log_dir: Option<String>,

    /// Emit JSON log lines on stderr.
    #[arg(long)]
    json_logs: bool,

    /// Open the live feed right after start-up.
    #[arg(long)]
    connect: bool,
}

type FetchResult = (Asset, Result<Snapshot, PxError>);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration (before logging so `app.log_path` can apply)
    let config = match &cli.config {
        Some(path) => px_core::config::load_config(path)?,
        None => AppConfig::default(),
    };

    // 2. Initialize logging
    let module_name = config.app.module_name.clone().unwrap_or_else(|| "px-runner".to_string());
    let log_dir = cli.log_dir.clone().or_else(|| config.app.log_path.clone());
    let format = if cli.json_logs { LogFormat::Json } else { LogFormat::Pretty };
    px_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &module_name, format);

    match &cli.config {
        Some(path) => info!("px-runner starting, config={}, log_level={}", path.display(), cli.log_level),
        None => info!("px-runner starting with default config, log_level={}", cli.log_level),
    }

    // 3. Build components
    let assets = config.effective_assets();
    let pairs = CurrencyPair::for_assets(&assets);
    let channels: Vec<Channel> = config.feed.effective_channels().into_iter().map(Channel::from).collect();
    let precision = config.display.effective_precision();

    let store = FeedStore::new(pairs.iter().copied()).shared();
    let connector = WsConnector::from_config(&config.feed);
    let mut manager = FeedManager::new(config.feed.effective_ws_url(), Box::new(connector), store.clone());
    let source: Arc<dyn RatesSource> = Arc::new(SnapshotFetcher::from_config(&config.rest)?);
    let mut board = Board::new(assets.clone(), precision);

    info!("tracking {} pair(s), channels={:?}, precision={precision}", pairs.len(), config.feed.effective_channels());

    // 4. Initial snapshots for every asset
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel::<FetchResult>();
    for asset in &assets {
        spawn_fetch(&source, *asset, &fetch_tx);
    }

    if cli.connect {
        connect(&mut manager, &pairs, &channels);
    }

    println!("{}", command::HELP);
    println!("{}", board.render(&store.read(), manager.state()));

    // 5. Event loop: the only writer of board and store
    let mut lines = spawn_stdin_reader();
    let mut render_tick = tokio::time::interval(config.display.render_interval());
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        let live = manager.is_connected();
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else {
                    info!("stdin closed");
                    break;
                };
                match command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(Command::Help) => println!("{}", command::HELP),
                    Ok(Command::Show) => println!("{}", board.render(&store.read(), manager.state())),
                    Ok(Command::Connect) => connect(&mut manager, &pairs, &channels),
                    Ok(Command::Disconnect) => manager.deactivate().await,
                    Ok(Command::Toggle) => {
                        if let Err(e) = manager.toggle(&pairs, channels.clone()).await {
                            error!("[feed] toggle failed: {e}");
                        }
                        println!("{}", board.render(&store.read(), manager.state()));
                    }
                    Ok(Command::Refresh(target)) => {
                        let targets = match target {
                            RefreshTarget::All => board.assets().to_vec(),
                            RefreshTarget::One(asset) if board.assets().contains(&asset) => vec![asset],
                            RefreshTarget::One(asset) => {
                                println!("{asset} is not tracked");
                                continue;
                            }
                        };
                        for asset in targets {
                            board.mark_loading(asset);
                            spawn_fetch(&source, asset, &fetch_tx);
                        }
                        println!("{}", board.render(&store.read(), manager.state()));
                    }
                    Ok(Command::Unsubscribe(names)) => {
                        if let Err(e) = manager.unsubscribe(names).await {
                            warn!("[feed] unsubscribe failed: {e}");
                        }
                    }
                    Err(msg) => println!("{msg}"),
                }
            }
            event = manager.next_event() => {
                let before = manager.state();
                manager.handle_event(event).await;
                let after = manager.state();
                if before != after {
                    info!("[feed] {before} -> {after}");
                    println!("{}", board.render(&store.read(), manager.state()));
                }
            }
            Some((asset, result)) = fetch_rx.recv() => {
                if let Err(e) = &result {
                    warn!("[rest] {asset}: {e}");
                }
                board.apply_fetch(asset, result);
                println!("{}", board.render(&store.read(), manager.state()));
            }
            _ = render_tick.tick(), if live => {
                println!("{}", board.render(&store.read(), manager.state()));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // 6. Close the feed if it is still up
    if manager.state() != FeedState::Disconnected {
        manager.deactivate().await;
    }

    info!("px-runner stopped");
    Ok(())
}

fn connect(manager: &mut FeedManager, pairs: &[CurrencyPair], channels: &[Channel]) {
    match manager.activate(pairs, channels.to_vec()) {
        Ok(true) => {}
        Ok(false) => println!("feed already {}", manager.state()),
        Err(e) => error!("[feed] connect failed: {e}"),
    }
}

fn spawn_fetch(source: &Arc<dyn RatesSource>, asset: Asset, tx: &mpsc::UnboundedSender<FetchResult>) {
    let source = Arc::clone(source);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = source.fetch(asset).await;
        let _ = tx.send((asset, result));
    });
}

/// Stdin lines from a plain thread, so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });
    rx
}
