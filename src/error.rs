use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use thiserror::Error;

/// Exit status when the foreground process could not be created, a shell's "command not found"
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

#[derive(Error, Debug)]
pub enum ErrorKind {
    /// The OS could not create the child process
    #[error("failed to spawn `{command}`: {source}")]
    SpawnFailure {
        command: String,
        #[source]
        source: io::Error,
    },
    /// The child ran and terminated unsuccessfully
    #[error("`{command}` exited unsuccessfully: {status}")]
    NonZeroExit { command: String, status: ExitStatus },
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("an error occured: {0}")]
    ErrorMsg(String),
}

#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(ErrorKind);

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    pub fn is_spawn_failure(&self) -> bool {
        matches!(self.0, ErrorKind::SpawnFailure { .. })
    }

    pub fn is_non_zero_exit(&self) -> bool {
        matches!(self.0, ErrorKind::NonZeroExit { .. })
    }

    /// The status the launcher itself should exit with when this error ends the run
    ///
    /// A child killed by a signal maps to `128 + signal`, as shells report it.
    pub fn exit_code(&self) -> i32 {
        match &self.0 {
            ErrorKind::NonZeroExit { status, .. } => {
                if let Some(code) = status.code() {
                    code
                } else if let Some(signal) = status.signal() {
                    128 + signal
                } else {
                    1
                }
            }
            ErrorKind::SpawnFailure { .. } => SPAWN_FAILURE_EXIT_CODE,
            _ => 1,
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<ErrorKind>,
{
    fn from(err: E) -> Self {
        Self::from_kind(err.into())
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::from_kind(ErrorKind::ErrorMsg(err))
    }
}
