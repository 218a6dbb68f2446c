#[derive(Debug)]
pub enum EngineError {
    /// A capacity attribute was zero; slots need at least one seat and one reservation.
    InvalidCapacity(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidCapacity(field) => write!(f, "invalid capacity: {field} must be at least one"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
