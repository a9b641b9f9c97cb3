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

//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::common::consts::{
    DEFAULT_KEEPALIVE_SECS, DEFAULT_PRESENCE_PRIORITY, RECONNECT_DELAY_SECS,
    SESSION_START_TIMEOUT_SECS,
};

/// Configuration for establishing and maintaining a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Endpoint identity, e.g. `user@host/resource`.
    pub identity: String,
    /// Credential for the authentication handshake.
    pub credential: String,
    /// Explicit `host:port` override. When absent the transport resolves
    /// the address from the identity.
    #[serde(default)]
    pub address: Option<String>,
    /// Presence priority registered after session start. Negative keeps
    /// broadcast traffic away from this resource.
    #[serde(default = "default_priority")]
    pub priority: i8,
    /// Bound on the session-start signal race, in seconds.
    #[serde(default = "default_start_timeout_secs")]
    pub start_timeout_secs: u64,
    /// Fixed interval between reconnection attempts, in seconds.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Keepalive ping frequency handed to the transport, in seconds.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl SessionConfig {
    /// Creates a config with default timing values.
    #[must_use]
    pub fn new(identity: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            credential: credential.into(),
            address: None,
            priority: default_priority(),
            start_timeout_secs: default_start_timeout_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            keepalive_secs: default_keepalive_secs(),
        }
    }

    /// Sets an explicit network address override.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the presence priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i8) -> Self {
        self.priority = priority;
        self
    }
}

const fn default_priority() -> i8 {
    DEFAULT_PRESENCE_PRIORITY
}

const fn default_start_timeout_secs() -> u64 {
    SESSION_START_TIMEOUT_SECS
}

const fn default_reconnect_delay_secs() -> u64 {
    RECONNECT_DELAY_SECS
}

const fn default_keepalive_secs() -> u64 {
    DEFAULT_KEEPALIVE_SECS
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_config_defaults() {
        let config = SessionConfig::new("meter@data.example.net/poller", "secret");
        assert_eq!(config.priority, -1);
        assert_eq!(config.start_timeout_secs, 10);
        assert_eq!(config.reconnect_delay_secs, 5);
        assert_eq!(config.keepalive_secs, 15);
        assert!(config.address.is_none());
    }

    #[rstest]
    fn test_config_overrides() {
        let config = SessionConfig::new("meter@data.example.net/recv", "secret")
            .with_address("10.0.0.7:5222")
            .with_priority(1);
        assert_eq!(config.address.as_deref(), Some("10.0.0.7:5222"));
        assert_eq!(config.priority, 1);
    }

    #[rstest]
    fn test_config_deserializes_with_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"identity": "a@b/c", "credential": "pw"}"#).unwrap();
        assert_eq!(config.start_timeout_secs, 10);
    }
}
