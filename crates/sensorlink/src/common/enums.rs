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

//! Common enumerations for the sensorlink protocol.

use std::sync::{Arc, atomic::AtomicU8};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumIter, EnumString};

/// Remote-invocable command node.
///
/// Node names are wire-stable strings.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    StrumDisplay,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommandNode {
    /// Retrieve historical readings for one series.
    GetHistory,
    /// Start live delivery for one series.
    Subscribe,
    /// Stop live delivery for one series.
    Unsubscribe,
}

/// Status carried by a command response.
///
/// Clients treat anything other than [`CommandStatus::Completed`] on a final
/// response as a protocol error.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    StrumDisplay,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommandStatus {
    /// Another round trip is expected (a form was rendered).
    Executing,
    /// Terminal success, payload present per command.
    Completed,
    /// Terminal cancellation.
    Canceled,
}

/// Session lifecycle state.
///
/// Stored in an atomic so the lifecycle watch task, the reconnect loop, and
/// the request path can observe transitions without locking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, StrumDisplay)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// No connection, none being attempted.
    Disconnected = 0,
    /// A connection attempt is in flight.
    Connecting = 1,
    /// The session is live and usable for command traffic.
    Established = 2,
    /// The last connection attempt failed; another will follow.
    Failed = 3,
}

impl SessionState {
    /// Returns the state as a `u8` for atomic storage.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a raw `u8` back into a state.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Established,
            3 => Self::Failed,
            _ => Self::Disconnected,
        }
    }

    /// Loads the state from a shared atomic.
    #[must_use]
    pub fn from_atomic(value: &Arc<AtomicU8>) -> Self {
        Self::from_u8(value.load(std::sync::atomic::Ordering::SeqCst))
    }

    /// Whether the session is usable for command traffic.
    #[must_use]
    pub const fn is_established(self) -> bool {
        matches!(self, Self::Established)
    }

    /// Whether the session was torn down by the caller.
    #[must_use]
    pub const fn is_disconnected(self) -> bool {
        matches!(self, Self::Disconnected)
    }
}
