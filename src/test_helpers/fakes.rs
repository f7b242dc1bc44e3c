use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::device::Device;
use crate::dfu::collaborators::Discovery;
use crate::error::{UpdateError, UpdateResult};
use crate::transport::link::{Inbox, Link};

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct LinkState {
    connected: bool,
    refuse_connections: bool,
    fail_writes: bool,
    stall: bool,
    inbox: Option<Inbox>,
    writes: Vec<Vec<u8>>,
    connect_calls: usize,
    disconnect_calls: usize,
    subscribe_count: usize,
    unsubscribe_count: usize,
}

/// In-memory link that answers each write with a scripted reply.
pub struct FakeLink {
    state: Mutex<LinkState>,
    responder: Mutex<Responder>,
}

impl FakeLink {
    /// A disconnected link that never replies.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LinkState::default()),
            responder: Mutex::new(Box::new(|_: &[u8]| -> Option<Vec<u8>> { None })),
        }
    }

    pub fn connected() -> Self {
        let link = Self::new();
        link.state.lock().unwrap().connected = true;
        link
    }

    /// Reply to each written frame with whatever `responder` returns.
    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        *self.responder.lock().unwrap() = Box::new(responder);
        self
    }

    pub fn refusing_connections(self) -> Self {
        self.state.lock().unwrap().refuse_connections = true;
        self
    }

    /// Connect and disconnect calls never complete.
    pub fn stalling(self) -> Self {
        self.state.lock().unwrap().stall = true;
        self
    }

    pub fn failing_writes(self) -> Self {
        self.state.lock().unwrap().fail_writes = true;
        self
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Written frames decoded as text.
    pub fn written_text(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    pub fn has_subscriber(&self) -> bool {
        self.state.lock().unwrap().inbox.is_some()
    }

    pub fn subscribe_count(&self) -> usize {
        self.state.lock().unwrap().subscribe_count
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.state.lock().unwrap().unsubscribe_count
    }

    pub fn connect_calls(&self) -> usize {
        self.state.lock().unwrap().connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().unwrap().disconnect_calls
    }
}

impl Default for FakeLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Link for FakeLink {
    async fn connect(&self, _device: &Device, _timeout: Duration) -> bool {
        let (stall, connected) = {
            let mut state = self.state.lock().unwrap();
            state.connect_calls += 1;
            if !state.stall {
                state.connected = !state.refuse_connections;
            }
            (state.stall, state.connected)
        };
        if stall {
            std::future::pending::<()>().await;
        }
        connected
    }

    async fn disconnect(&self, _timeout: Duration) -> bool {
        let stall = {
            let mut state = self.state.lock().unwrap();
            state.disconnect_calls += 1;
            if !state.stall {
                state.connected = false;
                state.inbox = None;
            }
            state.stall
        };
        if stall {
            std::future::pending::<()>().await;
        }
        true
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn write(&self, frame: &[u8]) -> UpdateResult<()> {
        let inbox = {
            let mut state = self.state.lock().unwrap();
            if state.fail_writes {
                return Err(UpdateError::transport("write rejected by fake link"));
            }
            state.writes.push(frame.to_vec());
            state.inbox.clone()
        };

        let reply = {
            let mut responder = self.responder.lock().unwrap();
            (*responder)(frame)
        };
        if let (Some(reply), Some(inbox)) = (reply, inbox) {
            let _ = inbox.try_send(reply);
        }
        Ok(())
    }

    fn subscribe(&self, inbox: Inbox) {
        let mut state = self.state.lock().unwrap();
        state.subscribe_count += 1;
        state.inbox = Some(inbox);
    }

    fn unsubscribe(&self) {
        let mut state = self.state.lock().unwrap();
        state.unsubscribe_count += 1;
        state.inbox = None;
    }
}

/// Discovery that reports a fixed set of devices and then stays silent.
pub struct FakeDiscovery {
    devices: Vec<Device>,
    // Held so the scan channel stays open until stop_scan()
    sender: Mutex<Option<mpsc::Sender<Device>>>,
    stall_scan: bool,
    scan_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl FakeDiscovery {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            sender: Mutex::new(None),
            stall_scan: false,
            scan_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    /// `start_scan` never completes.
    pub fn stalling(mut self) -> Self {
        self.stall_scan = true;
        self
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Discovery for FakeDiscovery {
    async fn start_scan(&self) -> UpdateResult<mpsc::Receiver<Device>> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_scan {
            return std::future::pending().await;
        }
        let (sender, receiver) = mpsc::channel(self.devices.len().max(1));
        for device in &self.devices {
            let _ = sender.try_send(device.clone());
        }
        *self.sender.lock().unwrap() = Some(sender);
        Ok(receiver)
    }

    async fn stop_scan(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().unwrap().take();
    }
}
