use thiserror::Error;

#[derive(Debug, Error)]
pub enum JotError {
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("EMPTY_INPUT: {0}")]
    EmptyInput(String),
    #[error("TYPE_MISMATCH: {0}")]
    TypeMismatch(String),
    #[error("NO_TARGET: {0}")]
    NoTarget(String),
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl JotError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 2,
            Self::EmptyInput(_) => 3,
            Self::TypeMismatch(_) => 4,
            Self::NoTarget(_) => 5,
            Self::InvalidInput(_) => 64,
            Self::Io(_) => 74,
            Self::Internal(_) => 70,
        }
    }
}

impl From<std::io::Error> for JotError {
    fn from(value: std::io::Error) -> Self {
        match value.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(value.to_string()),
            _ => Self::Io(value.to_string()),
        }
    }
}

impl From<serde_json::Error> for JotError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type JotResult<T> = Result<T, JotError>;

pub fn parse_timestamp(raw: &str) -> JotResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| JotError::TypeMismatch(format!("Invalid timestamp '{}': expected integer seconds", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let error: JotError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(error, JotError::NotFound(_)));
        assert!(error.to_string().starts_with("NOT_FOUND"));

        let error: JotError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(error, JotError::Io(_)));
    }

    #[test]
    fn timestamp_parsing_reports_type_mismatch() {
        assert_eq!(parse_timestamp(" 1694747662 ").expect("integer"), 1694747662);
        let error = parse_timestamp("yesterday").expect_err("not an integer");
        assert!(matches!(error, JotError::TypeMismatch(_)));
        assert_ne!(error.exit_code(), JotError::NotFound(String::new()).exit_code());
        assert_ne!(error.exit_code(), 0);
    }
}
