use anyhow::{Context, Result};
use filefolio::app::events::UserEvent;
use filefolio::app::helpers::lock_state;
use filefolio::app::state::AppState;
use filefolio::app::view_model::generate_ui_state;
use filefolio::app::{commands, SharedGateway};
use filefolio::config::ClientConfig;
use filefolio::gateway::HttpGateway;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::load().context("Failed to load configuration")?;
    let gateway: SharedGateway =
        Arc::new(HttpGateway::new(&config).context("Failed to build the HTTP gateway")?);
    let last_folder = config.last_folder.clone();
    let state = Arc::new(Mutex::new(AppState::with_config(config)));

    let (proxy, mut events) = mpsc::unbounded_channel::<UserEvent>();
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                UserEvent::ShowError(message) => eprintln!("error: {}", message),
                UserEvent::Notice(message) => eprintln!("{}", message),
                UserEvent::MergeComplete(report) => eprintln!("{}", report.message()),
                UserEvent::StateUpdate(_) | UserEvent::ConfigExported(_) => {}
            }
        }
    });

    commands::initialize(gateway.as_ref(), proxy.clone(), state.clone()).await;

    if let Some(folder) = last_folder {
        let exists = lock_state(&state).snapshot.find_group(&folder).is_some();
        if exists {
            commands::enter_folder(&folder, proxy.clone(), state.clone());
        } else {
            tracing::info!("Last folder '{}' is gone, staying at home", folder);
        }
    }

    let ui_state = generate_ui_state(&lock_state(&state));
    println!("{}", serde_json::to_string_pretty(&ui_state)?);

    drop(proxy);
    reporter.await?;
    Ok(())
}
