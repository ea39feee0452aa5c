//! Entry point for `customsh-put`.
//!
//! All behaviour lives in [`customsh_cli::run`]; the binary only wires in the
//! process streams.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    customsh_cli::run(std::env::args_os(), &mut stdin, &mut stdout, &mut stderr)
}
