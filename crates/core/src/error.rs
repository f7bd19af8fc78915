use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    /// The browser process could not be started. The only construction-time
    /// fault; everything after launch is handled best-effort in the session.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("page already registered with id \"{0}\"")]
    DuplicatePage(String),

    /// A CDP command failed against a live handle.
    #[error("browser command failed: {0}")]
    Cdp(String),

    /// An in-page evaluation failed or returned an undecodable payload.
    #[error("page evaluation failed: {0}")]
    Evaluate(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
