//! Error types.
//!
//! - `PsfError` is the typed error of the numeric core (images, estimators,
//!   fitters). Callers match on it to decide whether to skip a bead, retry or
//!   abort a batch.
//! - `AppError` is the CLI-facing error: a message plus the process exit code.

use crate::domain::Bead;
use crate::fit::FitterKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PsfError {
    /// Malformed image data or parameters (wrong rank, empty, non-finite).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The least-squares solver did not converge for a crop.
    #[error("{fitter} fit did not converge{}: {reason}", at_bead(.bead))]
    ConvergenceFailure {
        fitter: FitterKind,
        bead: Option<Bead>,
        reason: String,
        /// Initial parameters handed to the solver.
        seeds: Vec<f64>,
    },

    /// The solver exceeded its wall-clock budget.
    #[error("{fitter} fit timed out after {elapsed_ms} ms{}", at_bead(.bead))]
    Timeout {
        fitter: FitterKind,
        bead: Option<Bead>,
        elapsed_ms: u128,
    },
}

impl PsfError {
    pub fn invalid(message: impl Into<String>) -> Self {
        PsfError::InvalidInput(message.into())
    }

    /// Attach a bead coordinate to fitter errors that do not carry one yet.
    pub fn with_bead(self, at: Bead) -> Self {
        match self {
            PsfError::ConvergenceFailure {
                fitter,
                bead: None,
                reason,
                seeds,
            } => PsfError::ConvergenceFailure {
                fitter,
                bead: Some(at),
                reason,
                seeds,
            },
            PsfError::Timeout {
                fitter,
                bead: None,
                elapsed_ms,
            } => PsfError::Timeout {
                fitter,
                bead: Some(at),
                elapsed_ms,
            },
            other => other,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            PsfError::InvalidInput(_) => 2,
            PsfError::ConvergenceFailure { .. } => 4,
            PsfError::Timeout { .. } => 5,
        }
    }
}

fn at_bead(bead: &Option<Bead>) -> String {
    match bead {
        Some(b) => format!(" at bead {b}"),
        None => String::new(),
    }
}

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

impl From<PsfError> for AppError {
    fn from(err: PsfError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convergence_message_names_fitter_and_bead() {
        let err = PsfError::ConvergenceFailure {
            fitter: FitterKind::Zyx,
            bead: None,
            reason: "iteration limit".to_string(),
            seeds: vec![1.0, 2.0],
        }
        .with_bead(Bead::new(3, 4, 5));
        let msg = err.to_string();
        assert!(msg.contains("ZYX"), "{msg}");
        assert!(msg.contains("(3, 4, 5)"), "{msg}");
        assert!(msg.contains("iteration limit"), "{msg}");
    }

    #[test]
    fn psf_errors_map_to_exit_codes() {
        let app: AppError = PsfError::invalid("empty volume").into();
        assert_eq!(app.exit_code(), 2);
        assert!(app.to_string().contains("empty volume"));

        let app: AppError = PsfError::Timeout {
            fitter: FitterKind::Z,
            bead: None,
            elapsed_ms: 10,
        }
        .into();
        assert_eq!(app.exit_code(), 5);
    }
}
