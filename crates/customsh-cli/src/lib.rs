//! Command-line client for the customsh daemon.
//!
//! `customsh-put SOCKET [COMMAND]` sends a single command and exits with the
//! reply status. Without `COMMAND` it reads one command per line of standard
//! input and prints each reply in turn. Every reply is rendered as
//! `ret(STATUS)>` followed by the payload on its own line.

mod errors;
mod transport;

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::os::unix::ffi::OsStrExt;
use std::process::ExitCode;

use clap::Parser;
use customsh_config::UnixAddress;
use customsh_protocol::Reply;

pub use errors::{AppError, EXIT_CLOSED, EXIT_CONNECT, EXIT_LOCAL, EXIT_RECEIVE, EXIT_SEND};
pub use transport::exchange;

/// Command-line interface for `customsh-put`.
#[derive(Parser, Debug)]
#[command(name = "customsh-put", version, about)]
struct Cli {
    /// Daemon socket: a filesystem path, or `@name` for an abstract socket.
    #[arg(value_name = "SOCKET")]
    socket: UnixAddress,
    /// Command to send; read from stdin line by line when omitted.
    #[arg(value_name = "COMMAND")]
    command: Option<OsString>,
}

/// Runs the client with explicit argument and IO handles.
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: &mut R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let rendered = error.render();
            let _ = if error.use_stderr() {
                write!(stderr, "{rendered}")
            } else {
                write!(stdout, "{rendered}")
            };
            return ExitCode::from(exit_code_from_clap(error.exit_code()));
        }
    };

    let result = match cli.command {
        Some(command) => send_one(&cli.socket, command.as_bytes(), stdout),
        None => send_lines(&cli.socket, stdin, stdout, stderr),
    };
    match result {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            let _ = writeln!(stderr, "customsh-put: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

fn exit_code_from_clap(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(EXIT_LOCAL)
}

/// Exit code for a reply status: its low byte, as the shell would see it.
#[must_use]
pub fn exit_code_from_status(status: i32) -> u8 {
    u8::try_from(status & 0xff).unwrap_or(EXIT_LOCAL)
}

fn send_one<W: Write>(
    address: &UnixAddress,
    command: &[u8],
    stdout: &mut W,
) -> Result<u8, AppError> {
    let reply = exchange(address, command)?;
    print_reply(&reply, stdout)?;
    Ok(exit_code_from_status(reply.status))
}

/// Sends each stdin line as its own request. A line whose exchange fails is
/// reported on `stderr` and skipped; only local stdin and stdout failures
/// end the loop.
fn send_lines<R, W, E>(
    address: &UnixAddress,
    stdin: &mut R,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<u8, AppError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = stdin
            .read_until(b'\n', &mut line)
            .map_err(|source| AppError::Stdin { source })?;
        if read == 0 {
            return Ok(0);
        }
        let command = line.strip_suffix(b"\n").unwrap_or(&line);
        match exchange(address, command) {
            Ok(reply) => print_reply(&reply, stdout)?,
            Err(error) => {
                let _ = writeln!(stderr, "customsh-put: {error}");
            }
        }
    }
}

/// Writes `ret(STATUS)>` and the payload, each on its own line.
///
/// # Errors
///
/// Returns [`AppError::Output`] when `stdout` rejects the write.
pub fn print_reply<W: Write>(reply: &Reply, stdout: &mut W) -> Result<(), AppError> {
    let write = |stdout: &mut W| -> std::io::Result<()> {
        writeln!(stdout, "ret({})>", reply.status)?;
        stdout.write_all(&reply.payload)?;
        stdout.write_all(b"\n")?;
        stdout.flush()
    };
    write(stdout).map_err(|source| AppError::Output { source })
}

#[cfg(test)]
mod tests;
