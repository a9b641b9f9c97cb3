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

//! Historical and live sensor readings over a persistent command session.
//!
//! The crate drives the protocol on both sides of the wire:
//!
//! - [`SensorlinkClient`] retrieves historical readings (`get_history`),
//!   manages live delivery (`subscribe`/`unsubscribe`), and drains
//!   unsolicited data pushes into an unbounded FIFO queue.
//! - [`SensorlinkServer`] answers the same commands through a shared
//!   two-phase (form then submit) state machine, dispatching into pluggable
//!   [`HistoryProvider`](server::handlers::HistoryProvider) and
//!   [`SubscriptionManager`](server::handlers::SubscriptionManager)
//!   backends.
//! - [`SessionHandle`] owns the session lifecycle: the four-way startup
//!   signal race under a timeout, and indefinite fixed-interval reconnection
//!   on transport-level session loss.
//!
//! The underlying connection protocol and the sensor payload encoding are
//! external collaborators behind the [`Connection`](transport::Connection)
//! and [`Payload`](data::Payload) traits.

pub mod client;
pub mod common;
pub mod config;
pub mod data;
pub mod error;
pub mod messages;
pub mod server;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod stubs;

pub use client::SensorlinkClient;
pub use config::SessionConfig;
pub use data::Payload;
pub use error::{HandlerError, SensorlinkError, SensorlinkResult, WireError};
pub use server::SensorlinkServer;
pub use session::SessionHandle;
pub use transport::{Connection, Identity, SessionEvent};
