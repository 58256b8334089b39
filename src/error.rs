use thiserror::Error;

/// Plain tag for each failure a session operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    UnknownOption,
    ResourceLimitExceeded,
    BindFailed,
    SocketCreateFailed,
    SocketOptionFailed,
    ClockFailure,
    SendFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PingError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unknown option: {0}")]
    UnknownOption(i32),
    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),
    #[error("Bind failed: {0}")]
    BindFailed(String),
    #[error("Socket creation failed: {0}")]
    SocketCreateFailed(String),
    #[error("Setting socket option failed: {0}")]
    SocketOptionFailed(String),
    #[error("Clock failure: {0}")]
    ClockFailure(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl PingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PingError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PingError::UnknownOption(_) => ErrorKind::UnknownOption,
            PingError::ResourceLimitExceeded(_) => ErrorKind::ResourceLimitExceeded,
            PingError::BindFailed(_) => ErrorKind::BindFailed,
            PingError::SocketCreateFailed(_) => ErrorKind::SocketCreateFailed,
            PingError::SocketOptionFailed(_) => ErrorKind::SocketOptionFailed,
            PingError::ClockFailure(_) => ErrorKind::ClockFailure,
            PingError::SendFailed(_) => ErrorKind::SendFailed,
        }
    }

    /// Detail text without the kind prefix, as stored in the error reporter.
    pub fn detail(&self) -> String {
        match self {
            PingError::UnknownOption(tag) => format!("unknown option tag {tag}"),
            PingError::InvalidArgument(s)
            | PingError::ResourceLimitExceeded(s)
            | PingError::BindFailed(s)
            | PingError::SocketCreateFailed(s)
            | PingError::SocketOptionFailed(s)
            | PingError::ClockFailure(s)
            | PingError::SendFailed(s) => s.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PingError>;

/// Holds the most recent error message of a session.
///
/// Last write wins; a successful operation leaves the message untouched.
#[derive(Debug, Clone, Default)]
pub struct ErrorReporter {
    message: String,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the stored message with `"<function>: <msg>"`.
    pub fn set_error_msg(&mut self, function: &str, msg: &str) {
        debug_assert!(!function.is_empty(), "function name must not be empty");
        debug_assert!(!msg.is_empty(), "error message must not be empty");

        self.message = format!("{function}: {msg}");
        log::debug!("{}", self.message);
    }

    /// Records `err` under `function` and hands it back for propagation.
    pub fn record(&mut self, function: &str, err: PingError) -> PingError {
        self.set_error_msg(function, &err.detail());
        err
    }

    pub fn get_error(&self) -> &str {
        &self.message
    }

    pub fn clear(&mut self) {
        self.message.clear();
    }
}
