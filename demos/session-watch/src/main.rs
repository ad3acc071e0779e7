//! Watches one Archipelago room and logs the session as it changes.
//!
//! ```text
//! APTRACK_HOST=localhost APTRACK_PORT=38281 APTRACK_SLOT=Alice cargo run -p session-watch
//! ```
//!
//! A positional `host:port` argument overrides `APTRACK_HOST` and
//! `APTRACK_PORT`; a second argument overrides `APTRACK_SLOT`.

mod logging;

use std::env;
use std::process::ExitCode;

use aptrack::prelude::*;

fn settings_from_args() -> Result<ConnectionSettings, AptrackError> {
    let mut settings = ConnectionSettings::from_env()?;
    let mut args = env::args().skip(1);

    if let Some(address) = args.next() {
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (address.as_str(), None),
        };
        settings.host = host.to_string();
        if let Some(port) = port {
            settings.port = Some(port.parse().map_err(|e| {
                AptrackError::InvalidSettings(format!("port {port:?}: {e}"))
            })?);
        }
    }
    if let Some(slot) = args.next() {
        settings.slot_name = slot;
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let settings = match settings_from_args() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!(error = %err, "bad settings");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(?settings, "starting session watch");

    let mut tracker = Coordinator::new(WebSocketConnector, settings);
    let mut snapshots = tracker.watch_session();

    if let Err(err) = tracker.connect().await {
        tracing::error!(error = %err, "could not connect");
        return ExitCode::FAILURE;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            open = tracker.step() => {
                if snapshots.has_changed().unwrap_or(false) {
                    let session = snapshots.borrow_and_update().clone();
                    tracing::info!(
                        status = %tracker.status(),
                        summary = %session.summary(),
                        "session updated"
                    );
                }
                if !open {
                    break;
                }
            }
        }
    }

    let failed = tracker.status() == ConnectionStatus::Error;
    if let Some(message) = tracker.error_message() {
        tracing::warn!(%message, "connection ended with an error");
    }
    tracker.disconnect().await;

    for game in &tracker.session().games {
        tracing::info!(
            slot = %game.slot,
            player = %game.player,
            game = %game.game,
            found = game.found_count(),
            total = game.locations.len(),
            items = game.items.len(),
            hints = game.hints.len(),
            "final"
        );
    }

    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}
