use crate::error::ConfigError;
use crate::geo::DEFAULT_THRESHOLD_METERS;
use crate::monitor::PollSettings;
use crate::notify::Notifier;
use crate::portal::Credentials;
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bus-proximity")]
#[command(about = "Notify when your bus is close to your stop", long_about = None)]
pub struct Args {
    /// Portal subscriber username
    #[arg(long, env = "BUS_USERNAME")]
    pub username: Option<String>,

    /// Portal subscriber password
    #[arg(long, env = "BUS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Cookie header from a signed-in browser; skips the login form
    #[arg(long, env = "BUS_SESSION_COOKIE", hide_env_values = true)]
    pub session_cookie: Option<String>,

    #[arg(long, env = "BUS_PORTAL_URL", default_value = "https://tstg.mybusplanner.ca")]
    pub portal_url: String,

    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 1000)]
    pub interval_ms: u64,

    /// Stop after this many polls (default: poll forever)
    #[arg(long, env = "POLL_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Stop after this many seconds (default: poll forever)
    #[arg(long, env = "POLL_DEADLINE_SECS")]
    pub deadline_secs: Option<u64>,

    /// Distance in meters at which the bus counts as arrived
    #[arg(long, env = "PROXIMITY_THRESHOLD_M", default_value_t = DEFAULT_THRESHOLD_METERS)]
    pub threshold_m: f64,

    /// Program invoked as `<program> <title> <body>`
    #[arg(long, env = "NOTIFY_COMMAND", default_value = "toastify")]
    pub notify_command: String,

    /// Log the arrival instead of running the notify command
    #[arg(long, default_value_t = false)]
    pub no_notify: bool,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl Args {
    /// A session cookie wins over username/password when both are set.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        if let Some(cookie) = self.session_cookie.as_deref().filter(|c| !c.trim().is_empty()) {
            return Ok(Credentials::Cookie(cookie.trim().to_string()));
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Ok(Credentials::Login {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            _ => Err(ConfigError::MissingCredentials),
        }
    }

    pub fn poll_settings(&self) -> Result<PollSettings, ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.threshold_m.is_nan() || self.threshold_m < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.threshold_m));
        }
        Ok(PollSettings {
            interval: Duration::from_millis(self.interval_ms),
            max_attempts: self.max_attempts,
            deadline: self.deadline_secs.map(Duration::from_secs),
            threshold_meters: self.threshold_m,
        })
    }

    pub fn notifier(&self) -> Notifier {
        if self.no_notify {
            Notifier::LogOnly
        } else {
            Notifier::Command {
                program: self.notify_command.clone(),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
