use crate::environment::Environment;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The (app, environment) pair has not been provisioned.
    #[error("app `{name}` is not provisioned for `{environment}`")]
    UnknownApp {
        name: String,
        environment: Environment,
    },

    /// The device token is not 32 bytes of hex.
    #[error("invalid device token `{0}`")]
    InvalidToken(String),

    #[error("invalid environment `{0}`, expected `production` or `sandbox`")]
    InvalidEnvironment(String),

    #[error("payload too large: {size} exceeds {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// The gateway could not be reached before the app's timeout elapsed.
    #[error("notification timed out after {0} seconds")]
    NotificationTimeout(u64),

    #[error("feedback fetch timed out after {0} seconds")]
    FeedbackTimeout(u64),

    /// Inbound bytes that are not a 6-byte error response.
    #[error("malformed error frame ({0} bytes)")]
    MalformedErrorFrame(usize),

    /// A feedback stream with a trailing partial record or a bad token length.
    #[error("malformed feedback stream")]
    MalformedFeedback,

    /// Certificate material that could not be parsed into a chain and key.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// The session was closed while the operation was outstanding.
    #[error("session shut down")]
    Shutdown,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}
