use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use scratchpad_client::config::{Command, Config};
use scratchpad_client::{
    ControllerState, HttpTransport, LockController, PollGroup, SaveOutcome, Transport,
};
use scratchpad_core::ResourceKey;
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new(config.server.clone(), config.token.clone()));

    match &config.command {
        Command::Show { key } => show(transport, key).await,
        Command::Watch { keys } => watch(transport, keys.clone(), &config).await,
        Command::Save { key, file } => save(transport, key, file.as_deref()).await,
    }
}

async fn show(transport: Arc<dyn Transport>, key: &ResourceKey) -> anyhow::Result<()> {
    let document = transport.load(key).await?;
    if let (Some(at), Some(by)) = (&document.modified_at, &document.modified_by) {
        eprintln!("# {} (last saved {} by {})", key, at, by);
    }
    println!("{}", document.content);
    Ok(())
}

async fn watch(
    transport: Arc<dyn Transport>,
    keys: Vec<ResourceKey>,
    config: &Config,
) -> anyhow::Result<()> {
    let group = Arc::new(PollGroup::new(transport, keys));
    for controller in group.controllers() {
        let key = controller.key().clone();
        let mut view = controller.subscribe();
        tokio::spawn(async move {
            while view.changed().await.is_ok() {
                let state = view.borrow_and_update().state.clone();
                match state {
                    ControllerState::Unlocked => println!("{}: unlocked", key),
                    ControllerState::LockedOut { owner } => {
                        println!("{}: locked by {}", key, owner)
                    }
                }
            }
        });
    }

    group.start(config.poll_interval());
    info!("Watching, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    group.stop();
    Ok(())
}

async fn save(
    transport: Arc<dyn Transport>,
    key: &ResourceKey,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let content = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let controller = LockController::new(key.clone(), transport);
    controller.on_input(content);
    // Announce the edit first so the lock is ours before saving
    controller.poll_once().await?;
    if let ControllerState::LockedOut { owner } = controller.state() {
        anyhow::bail!("{} is being edited by {}", key, owner);
    }

    match controller.save().await {
        SaveOutcome::Saved => {
            println!("Saved {}", key);
            Ok(())
        }
        SaveOutcome::Rejected(msg) => anyhow::bail!("Save rejected: {}", msg),
        SaveOutcome::Failed(msg) => anyhow::bail!("Save failed: {}", msg),
    }
}
