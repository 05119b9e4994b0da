use crate::error::NotifyError;
use tokio::process::Command;

pub const TITLE: &str = "BusPlanner";

pub fn arrival_message(threshold_meters: f64) -> String {
    format!("Bus is within {threshold_meters}m of your stop!")
}

/// How the one-shot arrival alert is delivered.
#[derive(Debug, Clone)]
pub enum Notifier {
    /// Run `program <title> <body>`, e.g. `toastify`.
    Command { program: String },
    LogOnly,
}

impl Notifier {
    pub async fn send(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        match self {
            Notifier::LogOnly => {
                tracing::info!(title, "{body}");
                Ok(())
            }
            Notifier::Command { program } => {
                let status = Command::new(program)
                    .arg(title)
                    .arg(body)
                    .status()
                    .await
                    .map_err(|source| NotifyError::Spawn {
                        program: program.clone(),
                        source,
                    })?;

                if !status.success() {
                    return Err(NotifyError::Failed {
                        program: program.clone(),
                        status,
                    });
                }
                tracing::debug!(program = %program, "Notification sent");
                Ok(())
            }
        }
    }
}
