//! Runs external programs on behalf of handlers.

use std::ffi::OsStr;
use std::io;
use std::process::{Command, Stdio};

use thiserror::Error;

/// Failures running a helper program.
#[derive(Debug, Error)]
pub enum SubprocessError {
    /// The program could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        /// Program name or path.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The program exited unsuccessfully.
    #[error("'{program}' exited with {}: {stderr}", describe_code(.code))]
    Exit {
        /// Program name or path.
        program: String,
        /// Exit code, absent when killed by a signal.
        code: Option<i32>,
        /// Captured standard error, lossily decoded.
        stderr: String,
    },
}

impl SubprocessError {
    /// Exit code suitable for a reply status.
    #[must_use]
    pub fn status(&self) -> i32 {
        match self {
            Self::Spawn { .. } => 127,
            Self::Exit { code, .. } => code.unwrap_or(-1),
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_owned(), |value| format!("status {value}"))
}

/// Runs `program` with `args` and returns everything it wrote to standard
/// output. Standard input is closed.
///
/// # Errors
///
/// Returns [`SubprocessError::Spawn`] when the program cannot be started and
/// [`SubprocessError::Exit`] when it exits unsuccessfully.
pub fn capture<I, S>(program: &str, args: I) -> Result<Vec<u8>, SubprocessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| SubprocessError::Spawn {
            program: program.to_owned(),
            source,
        })?;
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(SubprocessError::Exit {
            program: program.to_owned(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_owned(),
        })
    }
}
