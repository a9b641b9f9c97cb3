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

//! Session lifecycle management.
//!
//! [`SessionHandle::connect`] opens the connection and races four startup
//! signals under a timeout. Once established, a watch task observes
//! transport-level session loss and drives a reconnect loop at a fixed
//! interval, indefinitely, until the loss is repaired or the caller
//! disconnects. At most one reconnect loop is ever in flight.

use std::{
    fmt::Debug,
    sync::{
        Arc, Mutex as StdMutex, PoisonError,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    time::Duration,
};

use tokio::{sync::broadcast, task::JoinHandle};

use crate::{
    common::{consts::ESTABLISHED_CHECK_INTERVAL_MS, enums::SessionState},
    config::SessionConfig,
    error::{SensorlinkError, SensorlinkResult},
    transport::{Connection, SessionEvent},
};

/// An established session over a [`Connection`].
///
/// The handle owns the lifecycle exclusively; the command client borrows it.
/// Dropping the handle aborts the background tasks but does not close the
/// connection gracefully; call [`SessionHandle::disconnect`] for that.
pub struct SessionHandle<C: Connection> {
    conn: Arc<C>,
    config: SessionConfig,
    state: Arc<AtomicU8>,
    watch_task: JoinHandle<()>,
    reconnect_task: Arc<StdMutex<Option<JoinHandle<()>>>>,
}

impl<C: Connection> Debug for SessionHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(SessionHandle))
            .field("identity", &self.config.identity)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<C: Connection> SessionHandle<C> {
    /// Opens the connection and waits for the session to start.
    ///
    /// # Errors
    ///
    /// Returns [`SensorlinkError::ConnectionFailed`] naming the startup
    /// signal that fired, or the timeout, when the session does not start.
    pub async fn connect(conn: Arc<C>, config: SessionConfig) -> SensorlinkResult<Self> {
        log::debug!("Connecting as {}", config.identity);
        start_session(conn.as_ref(), &config).await?;
        conn.send_presence(config.priority);

        let state = Arc::new(AtomicU8::new(SessionState::Established.as_u8()));
        let reconnect_task = Arc::new(StdMutex::new(None));
        let watch_task = spawn_watch_task(
            conn.clone(),
            config.clone(),
            state.clone(),
            reconnect_task.clone(),
        );

        log::info!("Session established as {}", config.identity);
        Ok(Self {
            conn,
            config,
            state,
            watch_task,
            reconnect_task,
        })
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_atomic(&self.state)
    }

    /// Whether the session is usable for command traffic right now.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.state().is_established()
    }

    /// Returns the underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<C> {
        &self.conn
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Waits for the session to become established before sending.
    ///
    /// Gives a reconnect in flight one full attempt's worth of time to
    /// finish before giving up.
    ///
    /// # Errors
    ///
    /// Returns [`SensorlinkError::ConnectionFailed`] when the session was
    /// disconnected by the caller or does not recover in time.
    pub async fn wait_until_established(&self) -> SensorlinkResult<()> {
        match self.state() {
            SessionState::Established => return Ok(()),
            SessionState::Disconnected => {
                return Err(SensorlinkError::ConnectionFailed(
                    "session is disconnected".to_string(),
                ));
            }
            _ => {}
        }

        log::debug!("Waiting for session to become ESTABLISHED before sending");
        let deadline = Duration::from_secs(
            self.config.start_timeout_secs + self.config.reconnect_delay_secs,
        );
        let check_interval = Duration::from_millis(ESTABLISHED_CHECK_INTERVAL_MS);

        tokio::time::timeout(deadline, async {
            loop {
                match self.state() {
                    SessionState::Established => return Ok(()),
                    SessionState::Disconnected => {
                        return Err(SensorlinkError::ConnectionFailed(
                            "session is disconnected".to_string(),
                        ));
                    }
                    _ => tokio::time::sleep(check_interval).await,
                }
            }
        })
        .await
        .map_err(|_| {
            SensorlinkError::ConnectionFailed("session not re-established in time".to_string())
        })?
    }

    /// Tears the session down. Idempotent.
    ///
    /// New operations fail fast afterwards; in-flight requests are canceled
    /// when the connection closes.
    pub async fn disconnect(&self) {
        let previous = self.state.swap(SessionState::Disconnected.as_u8(), Ordering::SeqCst);
        if SessionState::from_u8(previous).is_disconnected() {
            log::debug!("Already disconnected");
            return;
        }

        self.watch_task.abort();
        let pending = self
            .reconnect_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = pending {
            task.abort();
        }

        self.conn.close().await;
        log::info!("Disconnected {}", self.config.identity);
    }
}

impl<C: Connection> Drop for SessionHandle<C> {
    fn drop(&mut self) {
        self.watch_task.abort();
        let pending = self
            .reconnect_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = pending {
            task.abort();
        }
    }
}

/// Opens the connection and races the four startup signals under the
/// configured timeout.
///
/// Exactly one signal decides the outcome. The event subscription is a
/// scoped receiver dropped on every exit path (success, failure, timeout),
/// so no listener leaks across repeated attempts.
async fn start_session<C: Connection>(conn: &C, config: &SessionConfig) -> SensorlinkResult<()> {
    let mut events = conn.events();
    conn.open(config);

    let race = async {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Started) => return Ok(()),
                Ok(SessionEvent::Ended) => {
                    return Err(SensorlinkError::ConnectionFailed(
                        "server ended the session".to_string(),
                    ));
                }
                Ok(SessionEvent::ConnectionFailed(reason)) => {
                    return Err(SensorlinkError::ConnectionFailed(format!(
                        "server is not reachable: {reason}"
                    )));
                }
                Ok(SessionEvent::AuthFailed) => {
                    return Err(SensorlinkError::ConnectionFailed(
                        "invalid identity or credential".to_string(),
                    ));
                }
                Ok(SessionEvent::Disconnected) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(SensorlinkError::ConnectionFailed(
                        "event subscription closed".to_string(),
                    ));
                }
            }
        }
    };

    tokio::time::timeout(Duration::from_secs(config.start_timeout_secs), race)
        .await
        .map_err(|_| {
            SensorlinkError::ConnectionFailed(format!(
                "no session start within {}s",
                config.start_timeout_secs
            ))
        })?
}

fn spawn_watch_task<C: Connection>(
    conn: Arc<C>,
    config: SessionConfig,
    state: Arc<AtomicU8>,
    reconnect_task: Arc<StdMutex<Option<JoinHandle<()>>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reconnecting = Arc::new(AtomicBool::new(false));
        let mut events = conn.events();
        loop {
            match events.recv().await {
                Ok(SessionEvent::Disconnected) => {
                    if SessionState::from_atomic(&state).is_disconnected() {
                        break;
                    }
                    // Only one reconnect loop may be in flight.
                    if reconnecting
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        log::warn!("Session lost, reconnecting");
                        state.store(SessionState::Connecting.as_u8(), Ordering::SeqCst);
                        let handle = tokio::spawn(reconnect_loop(
                            conn.clone(),
                            config.clone(),
                            state.clone(),
                            reconnecting.clone(),
                        ));
                        *reconnect_task
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
                    } else {
                        log::debug!("Session loss signal ignored, reconnect already in flight");
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Lagged behind {skipped} session events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Retries until the session starts or the caller disconnects.
///
/// Fixed interval, no backoff growth, no attempt cap: failures are logged
/// and never surfaced to callers, who only observe a delay.
async fn reconnect_loop<C: Connection>(
    conn: Arc<C>,
    config: SessionConfig,
    state: Arc<AtomicU8>,
    reconnecting: Arc<AtomicBool>,
) {
    let delay = Duration::from_secs(config.reconnect_delay_secs);
    loop {
        if SessionState::from_atomic(&state).is_disconnected() {
            break;
        }
        log::info!("Reconnecting in {}s", config.reconnect_delay_secs);
        tokio::time::sleep(delay).await;
        if SessionState::from_atomic(&state).is_disconnected() {
            break;
        }
        state.store(SessionState::Connecting.as_u8(), Ordering::SeqCst);
        match start_session(conn.as_ref(), &config).await {
            Ok(()) => {
                conn.send_presence(config.priority);
                reconnecting.store(false, Ordering::SeqCst);
                state.store(SessionState::Established.as_u8(), Ordering::SeqCst);
                log::info!("Session re-established as {}", config.identity);
                return;
            }
            Err(e) => {
                state.store(SessionState::Failed.as_u8(), Ordering::SeqCst);
                log::error!("Reconnection failed: {e}");
            }
        }
    }
    reconnecting.store(false, Ordering::SeqCst);
}
