//! Unit tests for the client against an in-process fake daemon.

use std::io::{Cursor, Read};
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::thread::{self, JoinHandle};

use camino::Utf8PathBuf;
use rstest::rstest;
use tempfile::TempDir;

use customsh_config::UnixAddress;
use customsh_protocol::{LENGTH_PREFIX_BYTES, Reply, read_request_length};

use super::*;

/// Serves `replies.len()` connections, answering each with the next entry
/// or hanging up when the entry is `None`. Returns the commands received.
fn fake_daemon(socket: &Path, replies: Vec<Option<Reply>>) -> JoinHandle<Vec<Vec<u8>>> {
    let listener = UnixListener::bind(socket).expect("bind fake daemon");
    thread::spawn(move || {
        let mut received = Vec::new();
        for reply in replies {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut header = [0_u8; LENGTH_PREFIX_BYTES];
            stream.read_exact(&mut header).expect("length prefix");
            let len = usize::try_from(read_request_length(header)).expect("length fits");
            let mut command = vec![0_u8; len];
            stream.read_exact(&mut command).expect("command body");
            received.push(command);
            if let Some(reply) = reply {
                reply.write_to(&mut stream).expect("write reply");
            }
        }
        received
    })
}

fn address(socket: &Path) -> UnixAddress {
    UnixAddress::Path(Utf8PathBuf::from_path_buf(socket.to_path_buf()).expect("utf8 path"))
}

#[test]
fn single_command_prints_reply_and_returns_status() {
    let dir = TempDir::new().expect("temp dir");
    let socket = dir.path().join("one.sock");
    let server = fake_daemon(&socket, vec![Some(Reply::failure(2, b"nope".to_vec()))]);

    let mut stdout = Vec::new();
    let code = send_one(&address(&socket), b"ls /missing", &mut stdout).expect("exchange");

    assert_eq!(code, 2);
    assert_eq!(stdout, b"ret(2)>\nnope\n");
    assert_eq!(server.join().expect("server"), vec![b"ls /missing".to_vec()]);
}

#[test]
fn stdin_lines_are_sent_one_per_connection() {
    let dir = TempDir::new().expect("temp dir");
    let socket = dir.path().join("lines.sock");
    let server = fake_daemon(
        &socket,
        vec![
            Some(Reply::success(b"a".to_vec())),
            Some(Reply::failure(7, b"b".to_vec())),
        ],
    );

    let mut stdin = Cursor::new(b"echo a\necho b".to_vec());
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = send_lines(&address(&socket), &mut stdin, &mut stdout, &mut stderr)
        .expect("exchange");

    assert_eq!(code, 0, "line mode always exits cleanly");
    assert_eq!(stdout, b"ret(0)>\na\nret(7)>\nb\n");
    assert_eq!(
        server.join().expect("server"),
        vec![b"echo a".to_vec(), b"echo b".to_vec()]
    );
}

#[test]
fn failed_line_is_reported_and_later_lines_still_sent() {
    let dir = TempDir::new().expect("temp dir");
    let socket = dir.path().join("skip.sock");
    let server = fake_daemon(&socket, vec![None, Some(Reply::success(b"b".to_vec()))]);

    let mut stdin = Cursor::new(b"nothing matches\necho b\n".to_vec());
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = send_lines(&address(&socket), &mut stdin, &mut stdout, &mut stderr)
        .expect("line mode continues past failures");

    assert_eq!(code, 0);
    assert_eq!(stdout, b"ret(0)>\nb\n");
    assert!(
        String::from_utf8_lossy(&stderr).contains("without replying"),
        "per-line failure reported on stderr"
    );
    assert_eq!(
        server.join().expect("server"),
        vec![b"nothing matches".to_vec(), b"echo b".to_vec()]
    );
}

#[test]
fn unreachable_socket_in_line_mode_still_exits_cleanly() {
    let dir = TempDir::new().expect("temp dir");
    let mut stdin = Cursor::new(b"echo a\necho b\n".to_vec());
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = send_lines(
        &address(&dir.path().join("absent.sock")),
        &mut stdin,
        &mut stdout,
        &mut stderr,
    )
    .expect("connect failures are per line");

    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert_eq!(
        String::from_utf8_lossy(&stderr).matches("failed to connect").count(),
        2
    );
}

#[test]
fn hang_up_without_reply_is_reported_as_closed() {
    let dir = TempDir::new().expect("temp dir");
    let socket = dir.path().join("closed.sock");
    let server = fake_daemon(&socket, vec![None]);

    let error = exchange(&address(&socket), b"unknown").expect_err("no reply");

    assert!(matches!(error, AppError::Closed));
    assert_eq!(error.exit_code(), EXIT_CLOSED);
    server.join().expect("server");
}

#[test]
fn missing_socket_is_a_connect_failure() {
    let dir = TempDir::new().expect("temp dir");
    let error = exchange(&address(&dir.path().join("absent.sock")), b"echo x")
        .expect_err("nothing listening");
    assert!(matches!(error, AppError::Connect { .. }));
    assert_eq!(error.exit_code(), EXIT_CONNECT);
}

#[rstest]
#[case(0, 0)]
#[case(1, 1)]
#[case(255, 255)]
#[case(256, 0)]
#[case(257, 1)]
#[case(-1, 255)]
fn status_is_truncated_to_its_low_byte(#[case] status: i32, #[case] expected: u8) {
    assert_eq!(exit_code_from_status(status), expected);
}

#[test]
fn empty_payload_still_ends_with_newline() {
    let mut stdout = Vec::new();
    print_reply(&Reply::success(Vec::new()), &mut stdout).expect("write");
    assert_eq!(stdout, b"ret(0)>\n\n");
}
