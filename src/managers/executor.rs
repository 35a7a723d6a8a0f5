use std::cmp;
use std::fmt;
use std::io::{BufReader, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::thread;
use std::time::Duration;

use ssh2::{Channel, DisconnectCode, ErrorCode, Session};

use crate::constants::{buffers, network};
use crate::errors::{ExecuteError, GenevaError, StepError};
use crate::managers::classifier;
use crate::services::command::Command;
use crate::services::logger::Logger;
use crate::utils::redact::PASSWORD_MASK;

const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_PERMISSION_DENIED: i32 = 3;

/// The fields that decide whether an existing SSH connection can serve a
/// call. Two identities are equivalent iff every field compares equal.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionIdentity {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<String>,
    pub private_key_passphrase: Option<String>,
}

impl ConnectionIdentity {
    pub fn describe(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

impl fmt::Debug for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionIdentity")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| PASSWORD_MASK))
            .field("private_key_path", &self.private_key_path)
            .field(
                "private_key_passphrase",
                &self.private_key_passphrase.as_ref().map(|_| PASSWORD_MASK),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAdvice {
    /// No connection yet; dial one.
    Connect,
    /// The live connection targets the same identity; keep it.
    Reuse,
    /// The identity changed; close the live connection and dial again.
    Reconnect,
}

/// Single-entry cache of the identity the live connection was dialed with.
#[derive(Debug, Default)]
pub struct IdentityCache {
    active: Option<ConnectionIdentity>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advise(&self, next: &ConnectionIdentity) -> CacheAdvice {
        match &self.active {
            None => CacheAdvice::Connect,
            Some(active) if active == next => CacheAdvice::Reuse,
            Some(_) => CacheAdvice::Reconnect,
        }
    }

    pub fn store(&mut self, identity: ConnectionIdentity) {
        self.active = Some(identity);
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&ConnectionIdentity> {
        self.active.as_ref()
    }
}

/// Timeouts and the post-execute settle interval. Defaults come from
/// `constants::network` with `GENEVA_RUNNER_*` environment overrides.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub connect_timeout_ms: u64,
    pub data_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
    /// Pause after a clean execute so the remote tool can finish flushing its
    /// output file. Zero disables the pause (test environments).
    pub settle_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: resolve_env_ms(
                "GENEVA_RUNNER_CONNECT_TIMEOUT_MS",
                network::TIMEOUT_SSH_CONNECT_MS,
            ),
            data_timeout_ms: resolve_env_ms(
                "GENEVA_RUNNER_DATA_TIMEOUT_MS",
                network::TIMEOUT_SSH_DATA_MS,
            ),
            keepalive_interval_ms: network::KEEPALIVE_INTERVAL_MS,
            settle_ms: resolve_env_ms(
                "GENEVA_RUNNER_SETTLE_MS",
                network::SETTLE_AFTER_EXECUTE_MS,
            ),
        }
    }
}

fn resolve_env_ms(name: &str, fallback: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(fallback)
}

/// Runs runrep scripts over a single cached SSH connection and moves their
/// output files over SFTP.
///
/// The executor owns at most one live session. Each of `execute`, `fetch` and
/// `delete_output` re-checks the caller's connection identity first and
/// reconnects when it changed. Callers must run `execute` to completion
/// before `fetch` is meaningful, and must serialize calls on one executor;
/// the remote side handles only one command channel cleanly at a time.
pub struct SshCommandExecutor {
    settings: ExecutorSettings,
    logger: Logger,
    session: Option<Session>,
    cache: IdentityCache,
    closed: bool,
}

impl SshCommandExecutor {
    pub fn new(settings: ExecutorSettings, logger: Logger) -> Self {
        Self {
            settings,
            logger,
            session: None,
            cache: IdentityCache::new(),
            closed: false,
        }
    }

    /// Runs the command's script and classifies the remote stderr. Raises
    /// `ExecuteError::Geneva` when a stderr line matches an error keyword,
    /// `ExecuteError::Transport` for connection or channel failures.
    pub fn execute(
        &mut self,
        command: &Command,
        identity: &ConnectionIdentity,
    ) -> Result<(), ExecuteError> {
        self.ensure_session(identity)?;
        let session = self.session.as_ref().ok_or_else(not_connected)?;
        self.logger.debug(
            "executing runrep script",
            Some(&serde_json::json!({ "command": command.obfuscated_text() })),
        );

        let mut channel = session
            .channel_session()
            .map_err(map_ssh_error)?;
        channel.exec(command.text()).map_err(map_ssh_error)?;

        let scanned = scan_channel_stderr(&mut channel, command.obfuscated_text());

        if scanned.is_ok() && self.settings.settle_ms > 0 {
            // Let the remote tool finish materialising the output file.
            thread::sleep(Duration::from_millis(self.settings.settle_ms));
        }

        let _ = channel.close();
        let _ = channel.wait_close();
        scanned
    }

    /// Opens the command's output file over SFTP and hands a buffered reader
    /// to the consumer, returning whatever it returns. A missing file maps to
    /// `NotFound`, a permission failure to `Denied`.
    pub fn fetch<T, F>(
        &mut self,
        command: &Command,
        identity: &ConnectionIdentity,
        consumer: F,
    ) -> Result<T, StepError>
    where
        F: FnOnce(&mut dyn Read) -> Result<T, StepError>,
    {
        self.ensure_session(identity)?;
        let session = self.session.as_ref().ok_or_else(not_connected)?;
        self.logger.debug(
            "fetching remote report",
            Some(&serde_json::json!({ "resource": command.output_resource() })),
        );

        let sftp = session.sftp().map_err(map_ssh_error)?;
        let file = sftp
            .open(Path::new(command.output_resource()))
            .map_err(|err| map_sftp_error(err, command.output_resource()))?;
        let mut reader = BufReader::with_capacity(buffers::SFTP_READ_BUFFER_BYTES, file);
        consumer(&mut reader)
    }

    /// Removes the command's output file from the server. An already-missing
    /// file counts as success, so repeated deletes never raise.
    pub fn delete_output(
        &mut self,
        command: &Command,
        identity: &ConnectionIdentity,
    ) -> Result<(), StepError> {
        self.ensure_session(identity)?;
        let session = self.session.as_ref().ok_or_else(not_connected)?;

        let sftp = session.sftp().map_err(map_ssh_error)?;
        match sftp.unlink(Path::new(command.output_resource())) {
            Ok(()) => Ok(()),
            Err(err) => match err.code() {
                ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => {
                    self.logger.debug(
                        "remote report already absent",
                        Some(&serde_json::json!({ "resource": command.output_resource() })),
                    );
                    Ok(())
                }
                ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => Err(StepError::denied(format!(
                    "Insufficient permissions to delete the file `{}` from the server.",
                    command.output_resource()
                ))),
                _ => Err(StepError::internal(format!(
                    "Could not delete the file `{}` from the server: {}",
                    command.output_resource(),
                    err
                ))),
            },
        }
    }

    /// Tears the connection down. Idempotent and terminal: every later
    /// operation fails with a transport error.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.drop_session();
        self.closed = true;
    }

    /// Reports only the terminal closed state, not transient disconnects.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_session(&mut self, identity: &ConnectionIdentity) -> Result<(), StepError> {
        if self.closed {
            return Err(StepError::internal(
                "SSH executor is closed; no further operations are possible",
            ));
        }
        let advice = if self.session.is_none() {
            CacheAdvice::Connect
        } else {
            self.cache.advise(identity)
        };
        match advice {
            CacheAdvice::Reuse => Ok(()),
            CacheAdvice::Connect | CacheAdvice::Reconnect => {
                if advice == CacheAdvice::Reconnect {
                    self.logger.info(
                        "connection target changed, reconnecting",
                        Some(&serde_json::json!({ "target": identity.describe() })),
                    );
                }
                self.drop_session();
                let session = connect_session(identity, &self.settings)?;
                self.session = Some(session);
                self.cache.store(identity.clone());
                Ok(())
            }
        }
    }

    fn drop_session(&mut self) {
        self.cache.clear();
        if let Some(session) = self.session.take() {
            if let Err(err) =
                session.disconnect(Some(DisconnectCode::ByApplication), "closing", None)
            {
                self.logger.warn(
                    "failed to close SSH session cleanly",
                    Some(&serde_json::json!({ "error": err.to_string() })),
                );
            }
        }
    }
}

impl Drop for SshCommandExecutor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Drains the channel's stderr through the scanner, stopping at the first
/// blank line, at stream end, or once the channel reports EOF (the exit
/// status is observable from that point).
fn scan_channel_stderr(
    channel: &mut Channel,
    obfuscated_command: &str,
) -> Result<(), ExecuteError> {
    let mut scanner = StderrScanner::new(obfuscated_command);
    let mut buf = [0u8; 8192];
    loop {
        let read = channel
            .stderr()
            .read(&mut buf)
            .map_err(|err| StepError::internal(format!("SSH stderr read failed: {}", err)))?;
        if read == 0 {
            break;
        }
        if scanner.push(&buf[..read])? {
            return Ok(());
        }
        if channel.eof() {
            break;
        }
    }
    scanner.finish()?;
    Ok(())
}

/// Incremental line splitter over stderr chunks, feeding each complete line
/// to the error classifier. The channel yields bytes, not lines, so partial
/// lines are carried across reads.
struct StderrScanner<'a> {
    pending: Vec<u8>,
    obfuscated_command: &'a str,
}

impl<'a> StderrScanner<'a> {
    fn new(obfuscated_command: &'a str) -> Self {
        Self {
            pending: Vec::new(),
            obfuscated_command,
        }
    }

    /// Consumes a chunk. Returns `Ok(true)` when a blank line ended the scan;
    /// raises when a line matches an error keyword.
    fn push(&mut self, chunk: &[u8]) -> Result<bool, GenevaError> {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if self.classify(&line)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Classifies a trailing line that never got its newline.
    fn finish(&mut self) -> Result<(), GenevaError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let line = std::mem::take(&mut self.pending);
        self.classify(&line)?;
        Ok(())
    }

    fn classify(&self, raw: &[u8]) -> Result<bool, GenevaError> {
        let line = String::from_utf8_lossy(raw);
        let stripped = line.trim_end_matches(|c| c == '\r' || c == '\n');
        if stripped.trim().is_empty() {
            return Ok(true);
        }
        if classifier::is_error_line(stripped) {
            return Err(GenevaError::new(
                "Failed to run command in runrep",
                stripped,
                self.obfuscated_command,
            ));
        }
        Ok(false)
    }
}

fn connect_session(
    identity: &ConnectionIdentity,
    settings: &ExecutorSettings,
) -> Result<Session, StepError> {
    let addr = format!("{}:{}", identity.host, identity.port);
    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|err| StepError::invalid_params(format!("Invalid SSH host/port `{}`: {}", addr, err)))?
        .next()
        .ok_or_else(|| {
            StepError::invalid_params(format!("SSH host `{}` did not resolve to an address", addr))
        })?;

    let tcp = TcpStream::connect_timeout(
        &socket_addr,
        Duration::from_millis(settings.connect_timeout_ms),
    )
    .map_err(|err| StepError::internal(format!("Failed to connect SSH: {}", err)))?;
    tcp.set_read_timeout(Some(Duration::from_millis(settings.data_timeout_ms)))
        .ok();
    tcp.set_write_timeout(Some(Duration::from_millis(settings.data_timeout_ms)))
        .ok();

    let mut session =
        Session::new().map_err(|_| StepError::internal("Failed to create SSH session"))?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(map_ssh_error)?;

    if let Some(key_path) = identity
        .private_key_path
        .as_deref()
        .filter(|path| !path.trim().is_empty())
    {
        session
            .userauth_pubkey_file(
                &identity.username,
                None,
                Path::new(key_path),
                identity.private_key_passphrase.as_deref(),
            )
            .map_err(map_ssh_error)?;
    } else if let Some(password) = identity.password.as_deref() {
        session
            .userauth_password(&identity.username, password)
            .map_err(map_ssh_error)?;
    }

    if !session.authenticated() {
        return Err(StepError::denied("SSH authentication failed"));
    }

    let interval = cmp::max(1, (settings.keepalive_interval_ms / 1000) as u32);
    session.set_keepalive(true, interval);

    Ok(session)
}

fn not_connected() -> StepError {
    StepError::internal("SSH session is not connected")
}

fn map_ssh_error(err: ssh2::Error) -> StepError {
    let io_err: std::io::Error = err.into();
    match io_err.kind() {
        std::io::ErrorKind::TimedOut => StepError::timeout("SSH operation timed out"),
        std::io::ErrorKind::WouldBlock => StepError::retryable("SSH operation would block"),
        _ => StepError::internal(format!("SSH error: {}", io_err)),
    }
}

fn map_sftp_error(err: ssh2::Error, resource: &str) -> StepError {
    match err.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => StepError::not_found(format!(
            "Could not find the file `{}` on the server.",
            resource
        )),
        ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => StepError::denied(format!(
            "Insufficient permissions to read the file `{}` from the server.",
            resource
        )),
        _ => map_ssh_error(err),
    }
}
