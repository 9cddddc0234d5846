//! `maplink` - Bluetooth MAP server
//!
//! Serves the SMS/MMS store and every shared email account as a Message
//! Access Server instance. Event reports for registered peers are queued
//! on the notification hub.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod settings;

use std::sync::Arc;

use maplink_core::mas::Notification;
use maplink_core::{AccountKey, MasRegistry, MemoryProvider, MemoryStore, NotificationHub};
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Capacity of the event report queue.
const REPORT_QUEUE: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maplink=info,maplink_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting maplink");

    let config = settings::load_config().await?;
    let snapshot = settings::load_snapshot().await?;

    let (hub, reports) = NotificationHub::new(REPORT_QUEUE);
    let builder = MasRegistry::builder(config.clone()).notifier(Arc::new(hub));
    let events = builder.event_sender();

    let sms_store =
        MemoryStore::with_messages(AccountKey::SmsMms, snapshot.sms_mms.clone(), Vec::new())
            .with_events(events.clone());
    let mut builder = builder.sms_mms(Arc::new(MemoryProvider::new(Arc::new(sms_store))));

    for account in &config.email_accounts {
        let data = snapshot.email_account(account.account_id);
        let store = MemoryStore::with_messages(
            AccountKey::Email(account.account_id),
            data.messages,
            data.folders,
        )
        .with_events(events.clone());
        builder = builder.email_account(
            account.clone(),
            Arc::new(MemoryProvider::new(Arc::new(store))),
        );
    }
    let registry = builder.build()?;

    for instance in registry.instances() {
        let record = instance.sdp_record(instance.port());
        info!(
            mas_id = record.mas_instance_id,
            service = %record.service_name,
            message_types = record.supported_message_types,
            features = record.supported_features,
            "MAS instance configured"
        );
    }
    info!(
        email_accounts = registry.enabled_account_count(),
        "serving {} instance(s)",
        registry.instances().len()
    );

    tokio::spawn(log_reports(reports));

    let (stop, shutdown) = watch::channel(false);
    let mut server = tokio::spawn(registry.run(shutdown));

    tokio::select! {
        finished = &mut server => {
            finished??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }
    info!("Shutting down");
    stop.send(true)?;
    server.await??;
    Ok(())
}

/// Logs event reports until the hub goes away.
async fn log_reports(mut reports: mpsc::Receiver<Notification>) {
    while let Some(notification) = reports.recv().await {
        info!(
            mas_id = notification.mas_id,
            kind = notification.event.kind.as_str(),
            handle = %notification.event.handle,
            folder = %notification.event.folder,
            bytes = notification.report.len(),
            "event report queued"
        );
    }
}
