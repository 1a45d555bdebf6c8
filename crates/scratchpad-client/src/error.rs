use thiserror::Error;

/// Errors from talking to the scratchpad server.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Authentication and nonce failures need a fresh session; retrying the
    /// same request will not help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Status { status, .. } if *status == 401 || *status == 403)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
