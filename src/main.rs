mod config;
mod error;
mod geo;
mod monitor;
mod notify;
mod portal;

use anyhow::Context;
use clap::Parser;
use monitor::PollOutcome;
use portal::PortalSession;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _tracing = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .try_init();

    let args = config::Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: config::Args) -> anyhow::Result<ExitCode> {
    let credentials = args.credentials()?;
    let settings = args.poll_settings()?;
    let notifier = args.notifier();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            on_interrupt.cancel();
        }
    });

    let acquire = PortalSession::acquire(&args.portal_url, &credentials, args.request_timeout());
    let Some(session) = monitor::until_cancelled(&cancel, acquire).await else {
        tracing::info!("Watch cancelled before the portal session was ready");
        return Ok(ExitCode::SUCCESS);
    };
    let mut session = session.context("Failed to open portal session")?;

    let outcome = monitor::watch(&mut session, &settings, &cancel)
        .await
        .context("Failed to read bus position")?;
    drop(session);

    match outcome {
        PollOutcome::Arrived {
            snapshot,
            check,
            attempts,
        } => {
            tracing::info!(
                attempts,
                distance_m = check.distance_meters.round(),
                speed = ?snapshot.bus.speed,
                heading = ?snapshot.bus.heading,
                fix_time = ?snapshot.bus.time,
                "Bus arrived"
            );
            notifier
                .send(notify::TITLE, &notify::arrival_message(check.threshold_meters))
                .await
                .context("Failed to send notification")?;
            Ok(ExitCode::SUCCESS)
        }
        PollOutcome::Cancelled { attempts } => {
            tracing::info!(attempts, "Watch cancelled");
            Ok(ExitCode::SUCCESS)
        }
        PollOutcome::Exhausted { attempts } => {
            tracing::warn!(attempts, "Bus did not arrive within the attempt limit");
            Ok(ExitCode::FAILURE)
        }
        PollOutcome::DeadlineReached { attempts } => {
            tracing::warn!(attempts, "Bus did not arrive before the deadline");
            Ok(ExitCode::FAILURE)
        }
    }
}
