use loadview_core::LoadviewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The snapshot violates one or more data-model invariants.
    ValidationFailed = 10,

    /// Invalid CLI input or snapshot (bad flags, unknown slug, malformed file).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors and anything unexpected).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map a command error to an exit code by its root cause.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<LoadviewError>() {
            Some(LoadviewError::Io(_)) | None => Self::RuntimeError,
            Some(_) => Self::InvalidInput,
        }
    }
}
