/// Core error type for the publishing pipeline.
///
/// Adapter crates map their transport errors into this type so the orchestrator
/// and scheduler can tell configuration problems from destination rejections.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("no destination configured: {hint}")]
    NoDestination { hint: String },

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A destination rejected the request. Carries the destination's own description.
    #[error("{0}")]
    Delivery(String),

    #[error("busy: {0}")]
    Busy(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn no_destination() -> Self {
        Self::NoDestination {
            hint: "add an active destination in settings or set TELEGRAM_BOT_TOKEN and TELEGRAM_CHANNEL_ID"
                .to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
