use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tubegate_core::{
    ChannelPageSink, Coordinator, CycleOutcome, HttpFilterClient, JsonSettingsStore,
    MemoryTabStore,
};

mod config;
mod protocol;
mod state;

use protocol::{FilterStatus, Incoming, Outgoing};
use state::ActiveTab;

#[derive(Parser)]
#[command(name = "tubegate-host")]
#[command(about = "Native-messaging host that classifies detected videos against the filter service")]
struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Filter service base URL, overrides the config file
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Debounce window in milliseconds, overrides the config file
    #[arg(long)]
    debounce_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries protocol frames, so logs must go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        cfg.endpoint = endpoint;
    }
    if let Some(debounce_ms) = cli.debounce_ms {
        cfg.debounce_ms = debounce_ms;
    }

    let settings_path = cfg
        .settings_path
        .clone()
        .unwrap_or_else(JsonSettingsStore::default_path);
    let settings = Arc::new(JsonSettingsStore::open(settings_path).await?);
    let tab_store = Arc::new(MemoryTabStore::new());
    let (sink, mut page_updates) = ChannelPageSink::new();

    let coordinator = Arc::new(Coordinator::new(
        settings,
        tab_store,
        Arc::new(HttpFilterClient::new(cfg.endpoint.clone())),
        Arc::new(sink),
        Duration::from_millis(cfg.debounce_ms),
    ));

    // Single writer task owns stdout; everything else funnels through it.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outgoing>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(msg) = out_rx.recv().await {
            if let Err(err) = protocol::write_message(&mut stdout, &msg).await {
                tracing::error!(error = %err, "failed to write frame, stopping writer");
                break;
            }
        }
    });

    // Coordinator page-context updates become filterVideosResponse frames.
    let forward_tx = out_tx.clone();
    tokio::spawn(async move {
        while let Some((tab_id, update)) = page_updates.recv().await {
            let _ = forward_tx.send(Outgoing::FilterVideosResponse {
                tab_id,
                data: update.data,
                error: update.error,
            });
        }
    });

    let active_tab = Arc::new(ActiveTab::new());
    tracing::info!(endpoint = %cfg.endpoint, debounce_ms = cfg.debounce_ms, "tubegate host ready");

    let mut stdin = tokio::io::stdin();
    loop {
        let value = match protocol::read_message(&mut stdin).await {
            Ok(value) => value,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::info!("stdin closed, shutting down");
                break;
            }
            Err(err) => {
                tracing::error!(error = %err, "stdin read failed");
                break;
            }
        };

        let message: Incoming = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unrecognized frame");
                continue;
            }
        };

        dispatch(message, &coordinator, &active_tab, &out_tx);
    }

    drop(out_tx);
    let _ = writer.await;
    Ok(())
}

fn dispatch(
    message: Incoming,
    coordinator: &Arc<Coordinator>,
    active_tab: &Arc<ActiveTab>,
    out_tx: &mpsc::UnboundedSender<Outgoing>,
) {
    match message {
        Incoming::GetCurrentTabId => {
            let _ = out_tx.send(Outgoing::CurrentTabId {
                tab_id: active_tab.current(),
            });
        }
        Incoming::TabActivated { tab_id } => active_tab.activate(tab_id),
        Incoming::TabClosed { tab_id } => {
            active_tab.deactivate(tab_id);
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move {
                if let Err(err) = coordinator.close_tab(tab_id).await {
                    tracing::warn!(tab_id, error = %err, "tab cleanup failed");
                }
            });
        }
        Incoming::FilterVideosForTab {
            tab_id,
            detected_videos,
        } => match coordinator.submit(tab_id, detected_videos) {
            Ok(ticket) => {
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    match ticket.outcome().await {
                        Ok(CycleOutcome::Completed) => {
                            let _ = out_tx.send(Outgoing::FilterVideosResult {
                                tab_id,
                                status: FilterStatus::Success,
                                error: None,
                            });
                        }
                        // superseded cycles stay silent; the successor answers
                        Ok(CycleOutcome::Superseded) => {}
                        Err(err) => {
                            let _ = out_tx.send(Outgoing::FilterVideosResult {
                                tab_id,
                                status: FilterStatus::Error,
                                error: Some(err.to_string()),
                            });
                        }
                    }
                });
            }
            Err(err) => {
                let _ = out_tx.send(Outgoing::FilterVideosResult {
                    tab_id,
                    status: FilterStatus::Error,
                    error: Some(err.to_string()),
                });
            }
        },
    }
}
