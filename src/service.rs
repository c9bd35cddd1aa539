// Command loop: receive, decode, dedupe, dispatch, respond, acknowledge

use crate::protocol::{self, Command};
use crate::store::Inventory;
use crate::transport::{Inbound, Transport};
use eyre::Result;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pauses between loop iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Nothing new to do; ends early when the transport sees a change
    pub idle: Duration,
    /// After a malformed envelope
    pub error: Duration,
    /// After a response has been written
    pub processed: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            idle: Duration::from_millis(500),
            error: Duration::from_millis(1000),
            processed: Duration::from_millis(100),
        }
    }
}

/// Id of the last command that was answered.
///
/// Lives only as long as the loop that owns it: a fresh guard will answer a
/// resubmitted id again.
#[derive(Debug, Clone, Default)]
pub struct DedupGuard {
    last_processed: Option<String>,
}

impl DedupGuard {
    pub fn is_duplicate(&self, id: &str) -> bool {
        self.last_processed.as_deref() == Some(id)
    }

    pub fn record(&mut self, id: impl Into<String>) {
        self.last_processed = Some(id.into());
    }

    pub fn last_processed(&self) -> Option<&str> {
        self.last_processed.as_deref()
    }
}

/// Outcome of one loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// No command pending
    Idle,
    /// Envelope was not valid JSON and has been discarded
    Rejected,
    /// Envelope had no usable id
    Ignored,
    /// Id matches the last answered command
    Duplicate,
    /// Command with this id was answered
    Processed(String),
    /// Transport closed
    Closed,
}

/// Single-threaded service binding an inventory to a transport
#[derive(Debug)]
pub struct Service<T: Transport> {
    inventory: Inventory,
    transport: T,
    backoff: Backoff,
}

impl<T: Transport> Service<T> {
    pub fn new(inventory: Inventory, transport: T, backoff: Backoff) -> Self {
        Self {
            inventory,
            transport,
            backoff,
        }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one iteration without sleeping
    pub fn step(&mut self, guard: &mut DedupGuard) -> Result<Step> {
        let bytes = match self.transport.receive()? {
            Inbound::Empty => return Ok(Step::Idle),
            Inbound::Closed => return Ok(Step::Closed),
            Inbound::Message(bytes) => bytes,
        };

        // Invalid UTF-8 is as malformed as a syntax error
        let value: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                error!(error = %e, "Malformed command envelope, discarding");
                self.transport.acknowledge()?;
                return Ok(Step::Rejected);
            }
        };

        let Some(command) = Command::from_value(value) else {
            debug!("Command envelope has no id, ignoring");
            return Ok(Step::Ignored);
        };

        if guard.is_duplicate(&command.id) {
            debug!(id = %command.id, "Command already processed, ignoring");
            return Ok(Step::Duplicate);
        }

        let response = protocol::dispatch(&mut self.inventory, &command);
        match response.to_pretty_json() {
            Ok(body) => {
                if let Err(e) = self.transport.respond(&body) {
                    error!(id = %command.id, error = ?e, "Failed to deliver response");
                }
            }
            Err(e) => error!(id = %command.id, error = ?e, "Failed to render response"),
        }

        info!(id = %command.id, action = %command.action, status = ?response.status, "Processed command");
        guard.record(command.id.clone());

        if let Err(e) = self.transport.acknowledge() {
            warn!(id = %command.id, error = ?e, "Failed to acknowledge command");
        }

        Ok(Step::Processed(command.id))
    }

    /// Loop until the transport closes. A file transport never closes, so
    /// this only returns for in-process channels.
    pub fn run(&mut self) -> Result<()> {
        let mut guard = DedupGuard::default();
        info!(backoff = ?self.backoff, "Service running");

        loop {
            match self.step(&mut guard) {
                Ok(Step::Closed) => {
                    info!("Transport closed, stopping service");
                    return Ok(());
                }
                Ok(Step::Idle | Step::Ignored | Step::Duplicate) => self.transport.wait_for_message(self.backoff.idle),
                Ok(Step::Rejected) => thread::sleep(self.backoff.error),
                Ok(Step::Processed(_)) => thread::sleep(self.backoff.processed),
                Err(e) => {
                    error!(error = ?e, "Service iteration failed");
                    thread::sleep(self.backoff.error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Response, Status};
    use crate::transport::{FileTransport, channel};
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        command: PathBuf,
        result: PathBuf,
        service: Service<FileTransport>,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let command = temp.path().join("command.json");
        let result = temp.path().join("result.json");
        let inventory = Inventory::new(temp.path().join("cars_data.txt"));
        let mut transport = FileTransport::new(&command, &result);
        transport.initialize().unwrap();

        Fixture {
            service: Service::new(inventory, transport, Backoff::default()),
            command,
            result,
            _temp: temp,
        }
    }

    impl Fixture {
        fn submit(&self, body: serde_json::Value) {
            fs::write(&self.command, body.to_string()).unwrap();
        }

        fn response(&self) -> Response {
            serde_json::from_str(&fs::read_to_string(&self.result).unwrap()).unwrap()
        }
    }

    #[test]
    fn test_idle_when_nothing_pending() {
        let mut fx = fixture();
        let mut guard = DedupGuard::default();
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Idle);

        fs::remove_file(&fx.command).unwrap();
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Idle);
    }

    #[test]
    fn test_add_then_get_all_end_to_end() {
        let mut fx = fixture();
        let mut guard = DedupGuard::default();

        fx.submit(json!({"id": "1", "action": "ADD_CAR", "car": {"name": "X", "price": 10.0, "type": "SUV"}}));
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Processed("1".to_string()));
        assert_eq!(fx.response().status, Status::Success);
        assert_eq!(fs::read_to_string(&fx.command).unwrap(), "{}");

        fx.submit(json!({"id": "2", "action": "GET_ALL_CARS"}));
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Processed("2".to_string()));

        let response = fx.response();
        assert_eq!(response.id, "2");
        let data = response.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].name, "X");
        assert_eq!(data[0].price, 10.0);
        assert_eq!(guard.last_processed(), Some("2"));
    }

    #[test]
    fn test_result_file_is_pretty_printed() {
        let mut fx = fixture();
        fx.submit(json!({"id": "7", "action": "NOPE"}));
        fx.service.step(&mut DedupGuard::default()).unwrap();

        let text = fs::read_to_string(&fx.result).unwrap();
        assert!(text.starts_with("{\n    \"id\": \"7\""));
        assert_eq!(fx.response().status, Status::Error);
    }

    #[test]
    fn test_duplicate_id_not_reprocessed() {
        let mut fx = fixture();
        let mut guard = DedupGuard::default();
        fx.submit(json!({"id": "1", "action": "ADD_CAR", "car": {"name": "X"}}));
        fx.service.step(&mut guard).unwrap();
        fs::remove_file(&fx.result).unwrap();

        // Same id again, even with a different payload
        fx.submit(json!({"id": "1", "action": "ADD_CAR", "car": {"name": "Y"}}));
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Duplicate);
        assert!(!fx.result.exists());
        assert_eq!(fx.service.inventory().len(), 1);

        // The command stays in place until the peer replaces it
        assert_ne!(fs::read_to_string(&fx.command).unwrap(), "{}");
    }

    #[test]
    fn test_fresh_guard_forgets_processed_ids() {
        let mut fx = fixture();
        let add = json!({"id": "1", "action": "ADD_CAR", "car": {"name": "X"}});

        fx.submit(add.clone());
        fx.service.step(&mut DedupGuard::default()).unwrap();

        // Like a process restart: the id is answered again, here as a duplicate name
        fx.submit(add);
        assert_eq!(
            fx.service.step(&mut DedupGuard::default()).unwrap(),
            Step::Processed("1".to_string())
        );
        assert_eq!(fx.response().message.as_deref(), Some("Car with this name already exists."));
    }

    #[test]
    fn test_malformed_json_resets_command_file() {
        let mut fx = fixture();
        let mut guard = DedupGuard::default();

        fs::write(&fx.command, "{not json").unwrap();
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Rejected);
        assert_eq!(fs::read_to_string(&fx.command).unwrap(), "{}");
        assert_eq!(fs::read_to_string(&fx.result).unwrap(), "{}");

        // Loop carries on normally afterwards
        fx.submit(json!({"id": "1", "action": "GET_ALL_CARS"}));
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Processed("1".to_string()));
    }

    #[test]
    fn test_invalid_utf8_command_resets_command_file() {
        let mut fx = fixture();
        let mut guard = DedupGuard::default();

        fs::write(&fx.command, b"{\"id\":\"7\",\"action\":\"GET_ALL_CARS\",\"x\":\"\xff\"}").unwrap();
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Rejected);
        assert_eq!(fs::read_to_string(&fx.command).unwrap(), "{}");

        // Not stuck: the next step is idle, then a valid command goes through
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Idle);
        fx.submit(json!({"id": "8", "action": "GET_ALL_CARS"}));
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Processed("8".to_string()));
    }

    #[test]
    fn test_partially_written_command_is_lost() {
        // The files are unlocked: reading while the peer is mid-write yields a
        // truncated envelope, which is discarded like any malformed command.
        let mut fx = fixture();
        let full = json!({"id": "1", "action": "DELETE_CAR", "carName": "X"}).to_string();
        fs::write(&fx.command, &full[..full.len() / 2]).unwrap();

        assert_eq!(fx.service.step(&mut DedupGuard::default()).unwrap(), Step::Rejected);
        assert_eq!(fs::read_to_string(&fx.command).unwrap(), "{}");
    }

    #[test]
    fn test_missing_id_ignored() {
        let mut fx = fixture();
        let mut guard = DedupGuard::default();

        fx.submit(json!({"action": "GET_ALL_CARS"}));
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Ignored);
        assert_eq!(fs::read_to_string(&fx.result).unwrap(), "{}");
        assert!(guard.last_processed().is_none());

        fx.submit(json!([1, 2, 3]));
        assert_eq!(fx.service.step(&mut guard).unwrap(), Step::Ignored);
    }

    #[test]
    fn test_run_over_channel() {
        let temp = TempDir::new().unwrap();
        let inventory = Inventory::new(temp.path().join("cars_data.txt"));
        let (transport, client) = channel();
        let backoff = Backoff {
            idle: Duration::from_millis(10),
            error: Duration::from_millis(1),
            processed: Duration::from_millis(1),
        };

        let handle = thread::spawn(move || {
            let mut service = Service::new(inventory, transport, backoff);
            service.run().unwrap();
            service.inventory().get_all()
        });

        let added = client
            .request("ADD_CAR", json!({"car": {"name": "X", "price": 10.0}}))
            .unwrap();
        assert!(added.is_success());

        client.send_raw("garbage").unwrap();

        let all = client.request("GET_ALL_CARS", serde_json::Value::Null).unwrap();
        assert_eq!(all.data.unwrap()[0].price, 10.0);

        let sorted = client.request("SORT_CARS", json!({"sortBy": "colour"})).unwrap();
        assert_eq!(sorted.status, Status::Error);

        drop(client);
        let vehicles = handle.join().unwrap();
        assert_eq!(vehicles.len(), 1);
        assert!(temp.path().join("cars_data.txt").exists());
    }
}
