// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line front end over [`OfflineStore`].

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use evsync_core::{ChannelMessage, Event, EventFilter, MessageKind, PageRequest, SystemClock};

use crate::auth::{AuthProvider, StaticAuth};
use crate::config::{self, Config};
use crate::error::Result;
use crate::realtime::WebSocketTransport;
use crate::remote::HttpRemote;
use crate::storage::FileStore;
use crate::store::{OfflineStore, StoreDeps};
use crate::sync::SyncReport;

const QUICKSTART_HELP: &str = "\
Get started:
  evsync status              Show connectivity and pending changes
  evsync list --category Music
  evsync sync                Push pending changes now
  evsync watch               Follow live changes until Ctrl-C";

#[derive(Parser)]
#[command(name = "evsync")]
#[command(about = "Offline-first client for the event catalog")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Config file (default: $EVSYNC_CONFIG or ~/.config/evsync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show connection status, pending operations and last sync time
    Status,

    /// List operations waiting to sync, in send order
    Pending,

    /// Run a sync pass now
    Sync,

    /// List events
    List {
        /// Only events in this category
        #[arg(long)]
        category: Option<String>,

        /// Case-insensitive text search
        #[arg(long, short)]
        search: Option<String>,

        /// Only online (virtual) events
        #[arg(long)]
        online: bool,

        /// Page number (1-based). Lists everything when omitted.
        #[arg(long)]
        page: Option<usize>,

        #[arg(long, default_value_t = evsync_core::query::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Follow pushed changes until Ctrl-C
    Watch,
}

/// Runs a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(config::default_path);
    let config = Config::load(&config_path)?;
    let store = open_store(&config)?;
    store.monitor().check_service().await;

    match cli.command {
        Command::Status => status(&store),
        Command::Pending => pending(&store),
        Command::Sync => {
            let report = store.sync().await;
            print_report(&report);
        }
        Command::List {
            category,
            search,
            online,
            page,
            page_size,
        } => {
            let filter = EventFilter {
                category,
                search,
                is_online: online.then_some(true),
                ..Default::default()
            };
            list(&store, &filter, page.map(|p| PageRequest::new(p, page_size))).await?;
        }
        Command::Watch => watch(&store, &config).await?,
    }
    store.shutdown().await;
    Ok(())
}

/// Builds a store from the configuration.
pub fn open_store(config: &Config) -> Result<OfflineStore> {
    let dir = config.storage_dir();
    let storage = Arc::new(FileStore::open(&dir)?);
    let auth: Arc<dyn AuthProvider> = Arc::new(StaticAuth::new(
        config.auth.user_id.clone(),
        config.auth.token.clone(),
    ));
    let remote = Arc::new(HttpRemote::new(
        &config.remote.base_url,
        Arc::clone(&auth),
        config.request_timeout(),
        config.probe_timeout(),
    )?);
    info!(dir = %storage.dir().display(), base_url = %config.remote.base_url, "opening store");
    OfflineStore::open(StoreDeps {
        storage,
        remote,
        auth,
        clock: Arc::new(SystemClock),
        device_online: true,
    })
}

fn status(store: &OfflineStore) {
    println!("status:   {}", store.connection_status());
    println!("pending:  {}", store.pending_operation_count());
    match store.last_sync_time() {
        Some(at) => println!("synced:   {}", at.to_rfc3339()),
        None => println!("synced:   never"),
    }
}

fn pending(store: &OfflineStore) {
    let ops = store.pending_operations();
    if ops.is_empty() {
        println!("nothing pending");
        return;
    }
    for op in ops {
        let target = op.target_id().unwrap_or("-");
        print!(
            "{} {:<6} {:<8} {:<12} retries={}",
            op.id,
            op.kind(),
            op.resource(),
            target,
            op.retry_count
        );
        match &op.last_error {
            Some(err) => println!(" error={}", err),
            None => println!(),
        }
    }
}

fn print_report(report: &SyncReport) {
    if let Some(reason) = report.skipped {
        println!("sync skipped: {:?}", reason);
        return;
    }
    println!(
        "attempted {}, synced {}, failed {}, deferred {}",
        report.attempted, report.synced, report.failed, report.deferred
    );
    for (provisional, confirmed) in &report.confirmed_ids {
        println!("  {} -> {}", provisional, confirmed);
    }
}

async fn list(store: &OfflineStore, filter: &EventFilter, page: Option<PageRequest>) -> Result<()> {
    let cancel = CancellationToken::new();
    match page {
        Some(req) => {
            let page = store.get_paginated_events(filter, req, &cancel).await?;
            for event in &page.items {
                print_event(event);
            }
            println!(
                "page {}/{} ({} events)",
                page.info.current_page, page.info.total_pages, page.info.total_items
            );
        }
        None => {
            for event in &store.filter_events(filter, &cancel).await? {
                print_event(event);
            }
        }
    }
    Ok(())
}

fn print_event(event: &Event) {
    let time = event
        .start_time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    println!(
        "{} {} {:<12} {:<12} {}",
        event.date, time, event.id, event.category, event.title
    );
}

async fn watch(store: &OfflineStore, config: &Config) -> Result<()> {
    store.start(config.probe_interval());
    for kind in [
        MessageKind::EventCreated,
        MessageKind::EventUpdated,
        MessageKind::EventDeleted,
    ] {
        store.on(
            kind,
            Arc::new(|msg: &ChannelMessage| match msg {
                ChannelMessage::EventCreated { event } | ChannelMessage::EventUpdated { event } => {
                    println!(
                        "{} {} {}",
                        msg.kind(),
                        event.id.as_deref().unwrap_or("-"),
                        event.title
                    );
                }
                ChannelMessage::EventDeleted { id } => println!("{} {}", msg.kind(), id),
                _ => {}
            }),
        );
    }
    let mut state = store.start_realtime(config.channel_config(), Box::new(WebSocketTransport::new()));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                eprintln!("channel: {}", current);
            }
        }
    }
    Ok(())
}
