//! Entry point for the `customshd` daemon.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match customshd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "daemon terminated");
            let _ = writeln!(io::stderr().lock(), "customshd: {error}");
            ExitCode::FAILURE
        }
    }
}
