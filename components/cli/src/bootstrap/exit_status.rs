use std::process::ExitCode;

/// Binary outcome of a process run.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exit code 0
    Success,
    /// Exit code 1, for any failure
    Failure,
}

impl ExitStatus {
    /// Collapse an executor outcome, ignoring the error value.
    pub fn from_outcome<T, E>(outcome: &Result<T, E>) -> Self {
        match outcome {
            Ok(_) => Self::Success,
            Err(_) => Self::Failure,
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}
