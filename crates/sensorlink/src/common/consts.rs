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

//! Wire-stable names and timing constants shared across the crate.

/// Namespace for sensorlink payload elements.
pub const SENSORLINK_NS: &str = "urn:sensorlink:0";

/// Namespace for rendered data forms.
pub const FORM_NS: &str = "urn:sensorlink:form";

/// Element path carried by unsolicited data messages.
///
/// The push-delivery selector matches inbound messages against this path
/// and ignores everything else.
pub const DATA_PATH: &str = "{urn:sensorlink:0}sensorlink/data";

/// Field carrying the sensor series identifier (all commands).
pub const FIELD_IDENTIFIER: &str = "identifier";

/// Field carrying the inclusive lower history bound (`get_history` only).
pub const FIELD_START_TIME: &str = "start_time";

/// Field carrying the exclusive upper history bound (`get_history` only).
pub const FIELD_END_TIME: &str = "end_time";

/// Fixed field summarizing the outcome on result forms.
pub const FIELD_RESULT: &str = "result";

/// Bound on the four-way session-start signal race.
pub const SESSION_START_TIMEOUT_SECS: u64 = 10;

/// Fixed interval between reconnection attempts. No backoff growth.
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Interval between session state checks while waiting to send.
pub const ESTABLISHED_CHECK_INTERVAL_MS: u64 = 10;

/// Keepalive ping frequency handed to the transport.
pub const DEFAULT_KEEPALIVE_SECS: u64 = 15;

/// Default presence priority.
///
/// Negative prevents receiving messages that are not explicitly addressed
/// to this resource. Use a positive value when waiting for subscription
/// records, a negative value when polling.
pub const DEFAULT_PRESENCE_PRIORITY: i8 = -1;

/// In-flight command sessions older than this are considered abandoned.
pub const COMMAND_SESSION_TTL_SECS: u64 = 300;
