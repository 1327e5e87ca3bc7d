//! Store client adapter.
//!
//! Every operation is one synchronous invocation of the external `kvdb_cli`
//! binary. The adapter owns the query grammar, the payload escaping, and the
//! deterministic mapping from process outcome to a typed result. The argv is
//! handed straight to the OS (no shell), so shell metacharacters in payloads
//! are inert; quotes and backslashes are escaped for the client's own parser.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// How often the adapter polls a running child against its deadline.
const REAP_INTERVAL: Duration = Duration::from_millis(5);

/// Why an invocation never produced a store answer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client binary could not be launched at all.
    #[error("failed to launch client: {0}")]
    Spawn(#[source] io::Error),

    /// The client did not exit within the per-operation deadline.
    #[error("client did not exit within {0:?}")]
    TimedOut(Duration),

    /// The client was killed by a signal.
    #[error("client terminated by signal")]
    Signalled,

    /// The client's output could not be captured.
    #[error("failed to capture client output: {0}")]
    Capture(#[source] io::Error),

    /// The client exited with a code outside the protocol's vocabulary.
    #[error("unexpected client exit code {0}")]
    ExitCode(i32),
}

/// Outcome of an insert/update/delete.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The store confirmed the write.
    Applied,
    /// The store answered and said no (duplicate insert, missing key, ...).
    Rejected,
    /// No answer from the store at all.
    Transport(TransportError),
}

impl WriteOutcome {
    /// True iff the store confirmed the write.
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied)
    }
}

/// Outcome of a get. Store-side absence, transport failure, and capture
/// failure are three distinct things; only the first two are store answers.
#[derive(Debug)]
pub enum GetOutcome {
    /// The store returned these exact bytes.
    Found(Vec<u8>),
    /// The store answered: no such key.
    NotFound,
    /// No answer from the store at all.
    Transport(TransportError),
}

/// The four store operations, as seen by the scenario runner. `CliStore` is
/// the production implementation; tests substitute in-memory fakes.
pub trait Store {
    /// Insert a fresh key.
    fn insert(&mut self, key: &[u8], value: &[u8]) -> WriteOutcome;
    /// Upsert an existing key.
    fn update(&mut self, key: &[u8], value: &[u8]) -> WriteOutcome;
    /// Fetch the value stored under `key`.
    fn get(&mut self, key: &[u8]) -> GetOutcome;
    /// Remove `key`.
    fn delete(&mut self, key: &[u8]) -> WriteOutcome;
}

/// Adapter that drives the store through its command-line client.
pub struct CliStore {
    config: ClientConfig,
}

impl CliStore {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    fn run_write(&self, op: &str, query: Vec<u8>) -> WriteOutcome {
        match self.invoke(&query) {
            Ok(capture) => match exit_code(&capture.status) {
                Ok(0) => WriteOutcome::Applied,
                Ok(1) => {
                    debug!(target: "kvcheck::client", op, "store rejected write");
                    WriteOutcome::Rejected
                }
                Ok(code) => WriteOutcome::Transport(TransportError::ExitCode(code)),
                Err(e) => WriteOutcome::Transport(e),
            },
            Err(e) => {
                warn!(target: "kvcheck::client", op, error = %e, "transport failure");
                WriteOutcome::Transport(e)
            }
        }
    }

    /// Spawn one client invocation and block until it exits or the deadline
    /// passes. Stdout and stderr are drained on their own threads so a large
    /// value cannot deadlock on a full pipe.
    fn invoke(&self, query: &[u8]) -> Result<Capture, TransportError> {
        let mut child = Command::new(&self.config.program)
            .arg(format!("--host={}", self.config.host))
            .arg(format!("--port={}", self.config.port))
            .arg(OsStr::from_bytes(query))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(TransportError::Spawn)?;

        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        // On a deadline kill the readers are left detached: a grandchild may
        // still hold the pipe open, and the harness must not wait for it.
        let status = self.reap(&mut child)?;
        let stdout = join_reader(stdout_reader)?;
        let stderr = join_reader(stderr_reader)?;
        if !stderr.is_empty() {
            debug!(
                target: "kvcheck::client",
                stderr = %String::from_utf8_lossy(&stderr),
                "client stderr"
            );
        }
        Ok(Capture { status, stdout })
    }

    /// Wait for the child, killing it if it overruns the deadline.
    fn reap(&self, child: &mut Child) -> Result<ExitStatus, TransportError> {
        let deadline = Instant::now() + self.config.op_timeout;
        loop {
            match child.try_wait().map_err(TransportError::Capture)? {
                Some(status) => return Ok(status),
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(TransportError::TimedOut(self.config.op_timeout));
                }
                None => thread::sleep(REAP_INTERVAL),
            }
        }
    }
}

impl Store for CliStore {
    fn insert(&mut self, key: &[u8], value: &[u8]) -> WriteOutcome {
        self.run_write("INSERT", build_query("INSERT", key, Some(value)))
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> WriteOutcome {
        self.run_write("UPDATE", build_query("UPDATE", key, Some(value)))
    }

    fn get(&mut self, key: &[u8]) -> GetOutcome {
        match self.invoke(&build_query("GET", key, None)) {
            Ok(capture) => match exit_code(&capture.status) {
                Ok(0) => GetOutcome::Found(capture.stdout),
                Ok(1) => GetOutcome::NotFound,
                Ok(code) => GetOutcome::Transport(TransportError::ExitCode(code)),
                Err(e) => GetOutcome::Transport(e),
            },
            Err(e) => {
                warn!(target: "kvcheck::client", op = "GET", error = %e, "transport failure");
                GetOutcome::Transport(e)
            }
        }
    }

    fn delete(&mut self, key: &[u8]) -> WriteOutcome {
        self.run_write("DELETE", build_query("DELETE", key, None))
    }
}

struct Capture {
    status: ExitStatus,
    stdout: Vec<u8>,
}

fn exit_code(status: &ExitStatus) -> Result<i32, TransportError> {
    status.code().ok_or(TransportError::Signalled)
}

/// Read a captured pipe to the end on a dedicated thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join_reader(
    handle: thread::JoinHandle<io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, TransportError> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "pipe reader panicked")))
        .map_err(TransportError::Capture)
}

/// Build `OP "<key>"` or `OP "<key>" "<value>"` with quote and backslash
/// escaping. Escaping never depends on the generator's alphabet.
pub(crate) fn build_query(op: &str, key: &[u8], value: Option<&[u8]>) -> Vec<u8> {
    let mut query = Vec::with_capacity(
        op.len() + key.len() + value.map_or(0, <[u8]>::len) + 8,
    );
    query.extend_from_slice(op.as_bytes());
    query.push(b' ');
    push_quoted(&mut query, key);
    if let Some(value) = value {
        query.push(b' ');
        push_quoted(&mut query, value);
    }
    query
}

fn push_quoted(query: &mut Vec<u8>, payload: &[u8]) {
    query.push(b'"');
    for &byte in payload {
        if byte == b'"' || byte == b'\\' {
            query.push(b'\\');
        }
        query.push(byte);
    }
    query.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fake_cli(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake_kvdb_cli");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn store_for(program: PathBuf) -> CliStore {
        CliStore::new(ClientConfig {
            program,
            host: "localhost".to_string(),
            port: 5001,
            op_timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn query_wraps_key_and_value_in_quotes() {
        let q = build_query("INSERT", b"k1", Some(b"v1"));
        assert_eq!(q, b"INSERT \"k1\" \"v1\"".to_vec());
    }

    #[test]
    fn query_without_value_has_single_argument() {
        let q = build_query("GET", b"some key", None);
        assert_eq!(q, b"GET \"some key\"".to_vec());
    }

    #[test]
    fn query_escapes_quotes_and_backslashes() {
        let q = build_query("INSERT", b"a\"b", Some(b"c\\d"));
        assert_eq!(q, b"INSERT \"a\\\"b\" \"c\\\\d\"".to_vec());
    }

    #[test]
    fn exit_zero_maps_to_applied() {
        let dir = TempDir::new().unwrap();
        let mut store = store_for(fake_cli(&dir, "exit 0"));
        assert!(store.insert(b"k", b"v").is_applied());
        assert!(store.delete(b"k").is_applied());
    }

    #[test]
    fn exit_one_maps_to_rejected_and_not_found() {
        let dir = TempDir::new().unwrap();
        let mut store = store_for(fake_cli(&dir, "exit 1"));
        assert!(matches!(store.insert(b"k", b"v"), WriteOutcome::Rejected));
        assert!(matches!(store.get(b"k"), GetOutcome::NotFound));
    }

    #[test]
    fn unexpected_exit_code_is_a_transport_failure() {
        let dir = TempDir::new().unwrap();
        let mut store = store_for(fake_cli(&dir, "exit 3"));
        assert!(matches!(
            store.update(b"k", b"v"),
            WriteOutcome::Transport(TransportError::ExitCode(3))
        ));
    }

    #[test]
    fn get_returns_exact_stdout_bytes() {
        let dir = TempDir::new().unwrap();
        let mut store = store_for(fake_cli(&dir, "printf 'hello\\nworld'"));
        match store.get(b"k") {
            GetOutcome::Found(bytes) => assert_eq!(bytes, b"hello\nworld".to_vec()),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn megabyte_payload_is_captured_without_deadlock() {
        // Well past the ~64 KiB pipe buffer: without the concurrent drain
        // the child would block on a full pipe until the deadline killed it.
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("payload");
        fs::write(&payload, vec![b'x'; 1024 * 1024]).unwrap();
        let mut store = store_for(fake_cli(&dir, &format!("cat {}", payload.display())));

        let started = Instant::now();
        match store.get(b"k") {
            GetOutcome::Found(bytes) => {
                assert_eq!(bytes.len(), 1024 * 1024);
                assert!(bytes.iter().all(|&b| b == b'x'));
            }
            other => panic!("expected Found, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn client_receives_host_port_and_query() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("argv");
        let body = format!("printf '%s\\n%s\\n%s' \"$1\" \"$2\" \"$3\" > {}", log.display());
        let mut store = store_for(fake_cli(&dir, &body));
        assert!(store.insert(b"the key", b"the value").is_applied());
        let argv = fs::read_to_string(&log).unwrap();
        assert_eq!(
            argv,
            "--host=localhost\n--port=5001\nINSERT \"the key\" \"the value\""
        );
    }

    #[test]
    fn hung_client_is_killed_and_reported_as_timeout() {
        let dir = TempDir::new().unwrap();
        let path = fake_cli(&dir, "sleep 30");
        let mut store = CliStore::new(ClientConfig {
            program: path,
            host: "localhost".to_string(),
            port: 5001,
            op_timeout: Duration::from_millis(100),
        });
        let started = Instant::now();
        assert!(matches!(
            store.get(b"k"),
            GetOutcome::Transport(TransportError::TimedOut(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_binary_is_a_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let mut store = store_for(dir.path().join("no_such_binary"));
        assert!(matches!(
            store.insert(b"k", b"v"),
            WriteOutcome::Transport(TransportError::Spawn(_))
        ));
    }
}
