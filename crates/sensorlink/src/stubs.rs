// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Scripted connection stub and sample payload for tests.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::{
    config::SessionConfig,
    data::Payload,
    error::{Condition, ErrorType, WireError},
    messages::{CommandRequest, CommandResponse},
    transport::{Connection, InboundMessage, SessionEvent},
};

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A scripted [`Connection`] for driving lifecycle and command tests.
///
/// Each `open` call pops one entry from the open script and emits it as a
/// session event (`None` = stay silent). An exhausted script emits
/// [`SessionEvent::Started`]. Command responses are scripted FIFO; requests
/// are recorded for inspection.
pub(crate) struct StubConnection {
    events_tx: broadcast::Sender<SessionEvent>,
    open_script: Mutex<VecDeque<Option<SessionEvent>>>,
    open_calls: AtomicUsize,
    presence_calls: AtomicUsize,
    close_calls: AtomicUsize,
    responses: Mutex<VecDeque<Result<CommandResponse, WireError>>>,
    requests: Mutex<Vec<CommandRequest>>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<InboundMessage>>>,
}

impl StubConnection {
    pub fn new() -> Arc<Self> {
        Self::with_open_script(Vec::new())
    }

    pub fn with_open_script(script: Vec<Option<SessionEvent>>) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(16);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            events_tx,
            open_script: Mutex::new(script.into()),
            open_calls: AtomicUsize::new(0),
            presence_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
        })
    }

    /// Emits a session event as the transport would.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Queues the response for the next request.
    pub fn push_response(&self, response: Result<CommandResponse, WireError>) {
        locked(&self.responses).push_back(response);
    }

    /// Delivers an unsolicited inbound message.
    pub fn push_inbound(&self, message: InboundMessage) {
        let _ = self.inbound_tx.send(message);
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn presence_calls(&self) -> usize {
        self.presence_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Returns the recorded requests, in send order.
    pub fn requests(&self) -> Vec<CommandRequest> {
        locked(&self.requests).clone()
    }
}

#[async_trait]
impl Connection for StubConnection {
    fn open(&self, _config: &SessionConfig) {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = locked(&self.open_script)
            .pop_front()
            .unwrap_or(Some(SessionEvent::Started));
        if let Some(event) = scripted {
            let _ = self.events_tx.send(event);
        }
    }

    fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    fn send_presence(&self, _priority: i8) {
        self.presence_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn request(&self, request: CommandRequest) -> Result<CommandResponse, WireError> {
        locked(&self.requests).push(request);
        locked(&self.responses).pop_front().unwrap_or_else(|| {
            Err(WireError::new(Condition::ServiceUnavailable, ErrorType::Wait)
                .with_text("no scripted response"))
        })
    }

    fn take_inbound(&self) -> Option<mpsc::UnboundedReceiver<InboundMessage>> {
        locked(&self.inbound_rx).take()
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Minimal payload for tests: UTF-8 text carried verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Reading(pub String);

impl Payload for Reading {
    fn from_wire(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(Self(std::str::from_utf8(bytes)?.to_string()))
    }

    fn to_wire(&self) -> Vec<u8> {
        self.0.clone().into_bytes()
    }
}
