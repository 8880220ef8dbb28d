use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use bridge::{BridgeServices, TimestampWriter};
use media_cache::{FsBlobStore, MediaCache};
use storage::{KeyValueStore, Storage};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod api;
mod config;
mod downloader;
mod files;
mod irc_session;
mod sessions;

use api::AppState;
use config::load_settings;
use downloader::HttpMediaDownloader;
use irc_session::SessionContext;
use sessions::SessionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let storage = Storage::new(&settings.database_url)
        .await
        .map_err(|error| {
            error!(
                database_url = %settings.database_url,
                %error,
                "failed to open SQLite database; verify parent directory exists and permissions are correct"
            );
            error
        })?;
    let store: Arc<dyn KeyValueStore> = Arc::new(storage.clone());

    let public_url = settings.public_url();
    let blobs = FsBlobStore::open(&settings.files_dir, &public_url)
        .await
        .with_context(|| format!("failed to prepare files directory '{}'", settings.files_dir))?;
    let (timestamps, persist_task) =
        TimestampWriter::spawn(store.clone(), settings.persist_queue_capacity);
    let services = BridgeServices {
        media: Arc::new(MediaCache::new(Arc::new(blobs))),
        downloader: Arc::new(HttpMediaDownloader::new()),
        timestamps,
    };
    let registry = SessionRegistry::new();

    let file_addr: SocketAddr = settings.file_server_bind().parse()?;
    let file_listener = TcpListener::bind(file_addr).await?;
    info!(%file_addr, %public_url, "file server listening");
    let files_app = files::router(&settings.files_dir);
    let file_server = tokio::spawn(async move {
        if let Err(error) = axum::serve(file_listener, files_app).await {
            error!(%error, "file server stopped");
        }
    });

    let api_addr: SocketAddr = settings.api_bind.parse()?;
    let api_listener = TcpListener::bind(api_addr).await?;
    info!(%api_addr, "ingest api listening");
    let app = api::router(AppState {
        registry: registry.clone(),
        store,
    });
    let api_server = tokio::spawn(async move {
        if let Err(error) = axum::serve(api_listener, app).await {
            error!(%error, "ingest api stopped");
        }
    });

    let irc_addr: SocketAddr = settings.irc_bind().parse()?;
    let irc_listener = TcpListener::bind(irc_addr).await?;
    info!(%irc_addr, "irc listening");
    let ctx = SessionContext {
        registry,
        services,
        queue_capacity: settings.event_queue_capacity,
    };

    tokio::select! {
        _ = accept_loop(irc_listener, ctx) => {}
        _ = signal::ctrl_c() => info!("shutting down"),
    }

    file_server.abort();
    api_server.abort();
    persist_task.abort();
    storage.close().await;
    Ok(())
}

/// Never waits on a session; each socket gets its own task.
async fn accept_loop(listener: TcpListener, ctx: SessionContext) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "irc: failed to accept connection");
                continue;
            }
        };

        let span = info_span!(
            "session",
            connection_id = %Uuid::new_v4(),
            %peer,
            nick = tracing::field::Empty,
        );
        let ctx = ctx.clone();
        tokio::spawn(
            async move {
                info!("irc: connection accepted");
                if let Err(error) = irc_session::run(socket, ctx).await {
                    warn!(error = %format!("{error:#}"), "irc: session ended with error");
                }
            }
            .instrument(span),
        );
    }
}
