//! Application error type.
//!
//! Every failure that reaches `main` carries a process exit code:
//!
//! - `2`: usage, configuration or input problems
//! - `3`: no usable data (after ingest/filtering or model guardrails)
//! - `4`: numerical failures

use crate::models::CircuitError;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<CircuitError> for AppError {
    fn from(err: CircuitError) -> Self {
        AppError::new(2, format!("Invalid circuit: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_errors_map_to_usage_exit_code() {
        let err: AppError = CircuitError::Empty.into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().starts_with("Invalid circuit"));
    }
}
