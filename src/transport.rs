// Request/response channels the service loop can run over

use crate::protocol::{EMPTY_ENVELOPE, Response};
use eyre::{Context, Result, eyre};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What a transport had waiting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Nothing pending
    Empty,
    /// Raw, not yet decoded envelope. Not necessarily valid UTF-8.
    Message(Vec<u8>),
    /// The peer is gone and nothing more will arrive
    Closed,
}

/// Carrier for command and response envelopes
pub trait Transport {
    /// Non-blocking look at the pending command
    fn receive(&mut self) -> Result<Inbound>;

    /// Deliver a rendered response
    fn respond(&mut self, body: &str) -> Result<()>;

    /// Mark the pending command as consumed
    fn acknowledge(&mut self) -> Result<()>;

    /// Block until a new command may be available or `timeout` elapses
    fn wait_for_message(&mut self, timeout: Duration);
}

fn classify(bytes: Vec<u8>) -> Inbound {
    let trimmed = bytes.trim_ascii();
    if trimmed.is_empty() || trimmed == EMPTY_ENVELOPE.as_bytes() {
        Inbound::Empty
    } else {
        Inbound::Message(bytes)
    }
}

/// Watch events for the command file are ignored this long after our own write to it
const SELF_WRITE_WINDOW: Duration = Duration::from_millis(50);

// ============================================================================
// File transport
// ============================================================================

/// The two-file contract: the peer writes the command file, we write the
/// result file and reset the command file to `{}` once consumed.
///
/// Neither file is locked, so a reader can see a half-written envelope.
#[derive(Debug)]
pub struct FileTransport {
    command_path: PathBuf,
    result_path: PathBuf,
    watcher: Option<CommandWatcher>,
    last_write: Option<Instant>,
}

impl FileTransport {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(command_path: P, result_path: Q) -> Self {
        Self {
            command_path: command_path.as_ref().to_path_buf(),
            result_path: result_path.as_ref().to_path_buf(),
            watcher: None,
            last_write: None,
        }
    }

    /// Wake idle waits on command file changes instead of sleeping them out.
    /// If the watcher cannot start, waits fall back to plain sleeps.
    pub fn with_watcher(mut self) -> Self {
        match CommandWatcher::start(&self.command_path) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => warn!(path = ?self.command_path, error = ?e, "File watcher unavailable, polling instead"),
        }
        self
    }

    pub fn command_path(&self) -> &Path {
        &self.command_path
    }

    pub fn result_path(&self) -> &Path {
        &self.result_path
    }

    /// Reset both files to the empty envelope
    pub fn initialize(&mut self) -> Result<()> {
        write_file(&self.command_path, EMPTY_ENVELOPE)?;
        self.last_write = Some(Instant::now());
        write_file(&self.result_path, EMPTY_ENVELOPE)?;
        info!(command = ?self.command_path, result = ?self.result_path, "Protocol files initialized");
        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

impl Transport for FileTransport {
    fn receive(&mut self) -> Result<Inbound> {
        match fs::read(&self.command_path) {
            Ok(bytes) => Ok(classify(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Inbound::Empty),
            Err(e) => Err(e).context("Failed to read command file"),
        }
    }

    fn respond(&mut self, body: &str) -> Result<()> {
        write_file(&self.result_path, body)
    }

    fn acknowledge(&mut self) -> Result<()> {
        write_file(&self.command_path, EMPTY_ENVELOPE)?;
        self.last_write = Some(Instant::now());
        Ok(())
    }

    fn wait_for_message(&mut self, timeout: Duration) {
        match &self.watcher {
            Some(watcher) => watcher.wait(timeout, self.last_write.map(|at| at + SELF_WRITE_WINDOW)),
            None => thread::sleep(timeout),
        }
    }
}

/// Filesystem notifications for the command file's directory
struct CommandWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    file_name: OsString,
}

impl std::fmt::Debug for CommandWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandWatcher").field("file_name", &self.file_name).finish()
    }
}

impl CommandWatcher {
    fn start(command_path: &Path) -> Result<Self> {
        let file_name = command_path
            .file_name()
            .ok_or_else(|| eyre!("Command path has no file name: {:?}", command_path))?
            .to_os_string();
        let dir = match command_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, events) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        debug!(dir = ?dir, "Watching for command file changes");
        Ok(Self {
            _watcher: watcher,
            events,
            file_name,
        })
    }

    /// Returns on the first event touching the command file, or at timeout.
    /// Events arriving before `ignore_until` are echoes of our own writes.
    fn wait(&self, timeout: Duration, ignore_until: Option<Instant>) {
        let deadline = Instant::now() + timeout;

        // Anything already queued predates the receive that led to this wait
        while self.events.try_recv().is_ok() {}

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }

            match self.events.recv_timeout(remaining) {
                Ok(Ok(event)) => {
                    let own_write = ignore_until.is_some_and(|until| Instant::now() < until);
                    if !own_write && event.paths.iter().any(|p| p.file_name() == Some(self.file_name.as_os_str())) {
                        return;
                    }
                }
                Ok(Err(e)) => warn!(error = ?e, "File watcher error"),
                Err(RecvTimeoutError::Timeout) => return,
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(remaining);
                    return;
                }
            }
        }
    }
}

// ============================================================================
// In-process channel transport
// ============================================================================

/// Create a connected service-side transport and client.
///
/// Envelopes travel as whole JSON strings, so there is no partial-read window.
pub fn channel() -> (ChannelTransport, ChannelClient) {
    let (request_tx, request_rx) = mpsc::channel();
    let (response_tx, response_rx) = mpsc::channel();

    let transport = ChannelTransport {
        requests: request_rx,
        responses: response_tx,
        pending: None,
    };
    let client = ChannelClient {
        requests: request_tx,
        responses: response_rx,
        timeout: Duration::from_secs(5),
    };
    (transport, client)
}

/// Service side of [`channel`]
#[derive(Debug)]
pub struct ChannelTransport {
    requests: Receiver<String>,
    responses: Sender<String>,
    pending: Option<String>,
}

impl Transport for ChannelTransport {
    fn receive(&mut self) -> Result<Inbound> {
        if let Some(text) = self.pending.take() {
            return Ok(classify(text.into_bytes()));
        }
        match self.requests.try_recv() {
            Ok(text) => Ok(classify(text.into_bytes())),
            Err(TryRecvError::Empty) => Ok(Inbound::Empty),
            Err(TryRecvError::Disconnected) => Ok(Inbound::Closed),
        }
    }

    fn respond(&mut self, body: &str) -> Result<()> {
        self.responses
            .send(body.to_string())
            .map_err(|_| eyre!("Channel client disconnected"))
    }

    fn acknowledge(&mut self) -> Result<()> {
        Ok(())
    }

    fn wait_for_message(&mut self, timeout: Duration) {
        if self.pending.is_some() {
            return;
        }
        if let Ok(text) = self.requests.recv_timeout(timeout) {
            self.pending = Some(text);
        }
    }
}

/// Client side of [`channel`]. Dropping it ends the service loop.
#[derive(Debug)]
pub struct ChannelClient {
    requests: Sender<String>,
    responses: Receiver<String>,
    timeout: Duration,
}

impl ChannelClient {
    /// How long [`request`](Self::request) waits for its response
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send an envelope exactly as given
    pub fn send_raw(&self, text: impl Into<String>) -> Result<()> {
        self.requests
            .send(text.into())
            .map_err(|_| eyre!("Service side of the channel is gone"))
    }

    /// Send `action` with the given extra fields under a fresh id and wait
    /// for the matching response
    pub fn request(&self, action: &str, fields: Value) -> Result<Response> {
        let id = uuid::Uuid::now_v7().to_string();

        let mut body = match fields {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => return Err(eyre!("Command fields must be a JSON object, got {}", other)),
        };
        body.insert("id".into(), Value::String(id.clone()));
        body.insert("action".into(), Value::String(action.to_string()));

        self.send_raw(serde_json::to_string(&body)?)?;
        self.wait_for(&id)
    }

    /// Wait for the response carrying `id`, discarding any others
    pub fn wait_for(&self, id: &str) -> Result<Response> {
        let deadline = Instant::now() + self.timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let text = match self.responses.recv_timeout(remaining) {
                Ok(text) => text,
                Err(RecvTimeoutError::Timeout) => return Err(eyre!("Timed out waiting for response {}", id)),
                Err(RecvTimeoutError::Disconnected) => return Err(eyre!("Service closed the channel")),
            };

            let response: Response = serde_json::from_str(&text).context("Failed to decode response")?;
            if response.id == id {
                return Ok(response);
            }
            debug!(expected = id, got = %response.id, "Discarding unrelated response");
        }
    }
}
