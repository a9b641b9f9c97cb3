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

//! The connection boundary.
//!
//! The underlying session protocol (framing, authentication handshake,
//! keepalive pinging) is provided by a connection library behind the
//! [`Connection`] trait. This crate only drives the lifecycle: it opens the
//! connection, observes [`SessionEvent`]s, exchanges correlated
//! request/response pairs, and drains unsolicited inbound messages.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::{
    config::SessionConfig,
    error::WireError,
    messages::{CommandRequest, CommandResponse},
};

/// An opaque endpoint identity, e.g. `user@host/resource`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Creates an identity from its string form.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle signals emitted by the connection.
///
/// The first four are the startup race: after an `open`, the transport
/// delivers each at most once. `Disconnected` may arrive at any later time
/// and means the transport-level session was lost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session started and is usable.
    Started,
    /// The server ended the session during startup.
    Ended,
    /// The server could not be reached.
    ConnectionFailed(String),
    /// The authentication handshake was rejected.
    AuthFailed,
    /// An established session was lost.
    Disconnected,
}

/// An unsolicited inbound message, not correlated to any request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender identity.
    pub from: Identity,
    /// Element path of the message body.
    pub path: String,
    /// Raw payload bytes at that path.
    pub payload: Vec<u8>,
}

/// Handle to the underlying connection library.
///
/// Implementations own the socket, the authentication handshake, and the
/// keepalive probing. `open` is fire-and-forget: its outcome arrives as a
/// [`SessionEvent`] on the subscription returned by `events`. Request
/// correlation (at most one response per request) is the implementation's
/// responsibility; closing the connection fails any in-flight request.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Begins connecting with the given configuration. Never blocks.
    fn open(&self, config: &SessionConfig);

    /// Subscribes to session lifecycle events. Dropping the receiver
    /// deregisters the subscription.
    fn events(&self) -> broadcast::Receiver<SessionEvent>;

    /// Registers presence with the given priority on the live session.
    fn send_presence(&self, priority: i8);

    /// Sends a command request and awaits its correlated response.
    ///
    /// # Errors
    ///
    /// Returns the wire error condition carried by an error response, or a
    /// synthesized condition when the connection drops mid-flight.
    async fn request(&self, request: CommandRequest) -> Result<CommandResponse, WireError>;

    /// Hands over the unsolicited inbound message stream.
    ///
    /// Returns `None` after the first call; there is exactly one consumer.
    fn take_inbound(&self) -> Option<mpsc::UnboundedReceiver<InboundMessage>>;

    /// Tears the connection down. Idempotent.
    async fn close(&self);
}
