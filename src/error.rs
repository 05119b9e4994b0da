use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("tracker page has no `{0}` value")]
    MissingField(&'static str),
    #[error("could not decode `{field}`: {source}")]
    InvalidJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("tracker page lists no stops")]
    NoStops,
}

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },
    #[error("login was not accepted (status {0}, expected 302)")]
    LoginRejected(StatusCode),
    #[error("session expired, portal redirected to {location}")]
    SessionExpired { location: String },
    #[error("invalid portal url `{0}`")]
    InvalidUrl(String),
    #[error("invalid session cookie header")]
    InvalidCookie,
    #[error(transparent)]
    Page(#[from] PageError),
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("could not run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no credentials: set BUS_SESSION_COOKIE or both BUS_USERNAME and BUS_PASSWORD")]
    MissingCredentials,
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
    #[error("proximity threshold must be a non-negative number, got {0}")]
    InvalidThreshold(f64),
}
