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

//! Command protocol client.
//!
//! [`SensorlinkClient`] issues remote commands over an established session
//! and drains unsolicited data pushes into an unbounded FIFO queue. Command
//! failures surface as [`SensorlinkError`] kinds; callers are expected to
//! treat them distinctly (retry on `ServiceUnavailable`, not on
//! `BadRequest`).

use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, FixedOffset};
use futures_util::Stream;
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};

use crate::{
    common::{
        consts::{DATA_PATH, FIELD_END_TIME, FIELD_IDENTIFIER, FIELD_START_TIME},
        enums::{CommandNode, CommandStatus},
    },
    config::SessionConfig,
    data::Payload,
    error::{SensorlinkError, SensorlinkResult},
    messages::{CommandRequest, FormField},
    session::SessionHandle,
    transport::{Connection, InboundMessage},
};

/// Client for history queries, subscription management, and live data.
///
/// The client borrows the session lifecycle from its [`SessionHandle`];
/// reconnection happens underneath it without surfacing to callers.
pub struct SensorlinkClient<C: Connection, D: Payload> {
    session: SessionHandle<C>,
    incoming: Mutex<mpsc::UnboundedReceiver<D>>,
    push_task: JoinHandle<()>,
}

impl<C: Connection, D: Payload> Debug for SensorlinkClient<C, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(SensorlinkClient))
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<C: Connection, D: Payload> SensorlinkClient<C, D> {
    /// Connects the session and starts draining data pushes.
    ///
    /// # Errors
    ///
    /// Returns [`SensorlinkError::ConnectionFailed`] when the session does
    /// not start, and [`SensorlinkError::Protocol`] when the connection's
    /// inbound stream was already claimed.
    pub async fn connect(conn: Arc<C>, config: SessionConfig) -> SensorlinkResult<Self> {
        let inbound = conn.take_inbound().ok_or_else(|| {
            SensorlinkError::Protocol("inbound message stream already taken".to_string())
        })?;
        let session = SessionHandle::connect(conn, config).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let push_task = spawn_push_task::<D>(inbound, tx);

        Ok(Self {
            session,
            incoming: Mutex::new(rx),
            push_task,
        })
    }

    /// Returns the session handle.
    #[must_use]
    pub const fn session(&self) -> &SessionHandle<C> {
        &self.session
    }

    /// Invokes `node` at `destination` with the given fields and waits for
    /// the correlated response.
    ///
    /// Returns the decoded data artifact for [`CommandNode::GetHistory`],
    /// `None` for the subscription commands.
    ///
    /// # Errors
    ///
    /// Wire error responses are converted through the error taxonomy;
    /// unmapped conditions pass through as [`SensorlinkError::Wire`]. A
    /// response in any state other than `completed` raises
    /// [`SensorlinkError::Protocol`].
    pub async fn invoke(
        &self,
        destination: &str,
        node: CommandNode,
        fields: Vec<FormField>,
    ) -> SensorlinkResult<Option<D>> {
        self.session.wait_until_established().await?;

        let request = CommandRequest::new(destination, node, fields);
        log::debug!("Invoking {node} at {destination}");
        let response = self
            .session
            .connection()
            .request(request)
            .await
            .map_err(SensorlinkError::from)?;

        if response.status != CommandStatus::Completed {
            return Err(SensorlinkError::Protocol(format!(
                "unexpected response status: {}",
                response.status
            )));
        }

        match node {
            CommandNode::GetHistory => {
                let bytes = response.data.ok_or_else(|| {
                    SensorlinkError::Protocol(
                        "completed response carried no data payload".to_string(),
                    )
                })?;
                let data = D::from_wire(&bytes).map_err(|e| {
                    SensorlinkError::Protocol(format!("undecodable data payload: {e}"))
                })?;
                Ok(Some(data))
            }
            CommandNode::Subscribe | CommandNode::Unsubscribe => Ok(None),
        }
    }

    /// Retrieves historical readings for `identifier`.
    ///
    /// Bounds are optional; an absent bound is omitted from the request
    /// entirely. Timestamps carry an explicit UTC offset by construction.
    ///
    /// # Errors
    ///
    /// See [`SensorlinkClient::invoke`].
    pub async fn get_history(
        &self,
        destination: &str,
        identifier: &str,
        start_time: Option<DateTime<FixedOffset>>,
        end_time: Option<DateTime<FixedOffset>>,
    ) -> SensorlinkResult<D> {
        let mut fields = vec![FormField::text(FIELD_IDENTIFIER, identifier)];
        if let Some(start_time) = start_time {
            fields.push(FormField::text(FIELD_START_TIME, start_time.to_rfc3339()));
        }
        if let Some(end_time) = end_time {
            fields.push(FormField::text(FIELD_END_TIME, end_time.to_rfc3339()));
        }

        self.invoke(destination, CommandNode::GetHistory, fields)
            .await?
            .ok_or_else(|| {
                SensorlinkError::Protocol("history response carried no data".to_string())
            })
    }

    /// Starts live delivery of readings for `identifier`.
    ///
    /// # Errors
    ///
    /// See [`SensorlinkClient::invoke`].
    pub async fn subscribe(&self, destination: &str, identifier: &str) -> SensorlinkResult<()> {
        self.invoke(
            destination,
            CommandNode::Subscribe,
            vec![FormField::text(FIELD_IDENTIFIER, identifier)],
        )
        .await
        .map(|_| ())
    }

    /// Stops live delivery of readings for `identifier`.
    ///
    /// # Errors
    ///
    /// See [`SensorlinkClient::invoke`].
    pub async fn unsubscribe(&self, destination: &str, identifier: &str) -> SensorlinkResult<()> {
        self.invoke(
            destination,
            CommandNode::Unsubscribe,
            vec![FormField::text(FIELD_IDENTIFIER, identifier)],
        )
        .await
        .map(|_| ())
    }

    /// Dequeues the next pushed data artifact, waiting for one to arrive.
    ///
    /// FIFO across concurrent production and consumption.
    ///
    /// # Errors
    ///
    /// Returns [`SensorlinkError::ConnectionFailed`] once the client is
    /// disconnected and the queue is drained.
    pub async fn wait_for_data(&self) -> SensorlinkResult<D> {
        self.incoming.lock().await.recv().await.ok_or_else(|| {
            SensorlinkError::ConnectionFailed("push delivery queue closed".to_string())
        })
    }

    /// Yields pushed data artifacts forever, one blocking dequeue per step.
    ///
    /// The stream never terminates on its own while the session lives;
    /// there is no end-of-stream notion in the protocol.
    pub fn listen(&self) -> impl Stream<Item = D> + '_ {
        futures_util::stream::unfold(self, |client| async move {
            client.wait_for_data().await.ok().map(|data| (data, client))
        })
    }

    /// Tears down the session and stops push delivery. Idempotent.
    pub async fn disconnect(&self) {
        self.session.disconnect().await;
        self.push_task.abort();
    }
}

impl<C: Connection, D: Payload> Drop for SensorlinkClient<C, D> {
    fn drop(&mut self) {
        self.push_task.abort();
    }
}

/// Moves matching data pushes from the transport into the delivery queue.
///
/// The selector is fixed: only messages at the well-known data path are
/// considered. Decoding happens here so consumers dequeue ready payloads;
/// undecodable payloads are logged and dropped.
fn spawn_push_task<D: Payload>(
    mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
    tx: mpsc::UnboundedSender<D>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            if message.path != DATA_PATH {
                log::trace!("Ignoring inbound message at {}", message.path);
                continue;
            }
            match D::from_wire(&message.payload) {
                Ok(data) => {
                    if tx.send(data).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("Dropping undecodable data push from {}: {e}", message.from);
                }
            }
        }
        log::debug!("Inbound message stream closed, push delivery stopped");
    })
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::{
        error::{Condition, ErrorType, WireError},
        messages::{CommandResponse, DataForm, FormType},
        stubs::{Reading, StubConnection},
        transport::Identity,
    };

    const PROXY: &str = "provider@data.example.net/proxy";

    fn test_config() -> SessionConfig {
        let mut config = SessionConfig::new("meter@data.example.net/test", "secret");
        config.start_timeout_secs = 1;
        config.reconnect_delay_secs = 0;
        config
    }

    async fn connected_client(
        conn: &Arc<StubConnection>,
    ) -> SensorlinkClient<StubConnection, Reading> {
        SensorlinkClient::connect(conn.clone(), test_config())
            .await
            .unwrap()
    }

    fn data_push(payload: &str) -> InboundMessage {
        InboundMessage {
            from: Identity::from(PROXY),
            path: DATA_PATH.to_string(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_subscribe_sends_identifier_field() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;
        conn.push_response(Ok(CommandResponse::completed(None, None)));

        client.subscribe(PROXY, "prm:123").await.unwrap();

        let requests = conn.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].node, CommandNode::Subscribe);
        assert_eq!(requests[0].destination, PROXY);
        let form = requests[0].form().unwrap();
        assert_eq!(form.form_type, FormType::Submit);
        assert_eq!(form.value(FIELD_IDENTIFIER), Some("prm:123"));
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_get_history_with_bounds_sends_rfc3339_fields() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;
        conn.push_response(Ok(CommandResponse::completed(None, Some(b"42.0".to_vec()))));

        let start = DateTime::parse_from_rfc3339("2024-05-01T00:00:00+02:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2024-05-02T00:00:00+02:00").unwrap();
        let data = client
            .get_history(PROXY, "prm:123", Some(start), Some(end))
            .await
            .unwrap();
        assert_eq!(data, Reading("42.0".to_string()));

        let form = conn.requests()[0].form().unwrap();
        assert_eq!(form.value(FIELD_START_TIME), Some("2024-05-01T00:00:00+02:00"));
        assert_eq!(form.value(FIELD_END_TIME), Some("2024-05-02T00:00:00+02:00"));
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_get_history_without_bounds_omits_time_fields() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;
        conn.push_response(Ok(CommandResponse::completed(None, Some(b"1".to_vec()))));

        client.get_history(PROXY, "prm:123", None, None).await.unwrap();

        let form = conn.requests()[0].form().unwrap();
        assert!(form.has_field(FIELD_IDENTIFIER));
        assert!(!form.has_field(FIELD_START_TIME));
        assert!(!form.has_field(FIELD_END_TIME));
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_completed_history_response_without_data_is_protocol_error() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;
        conn.push_response(Ok(CommandResponse::completed(None, None)));

        let err = client.get_history(PROXY, "prm:123", None, None).await.unwrap_err();
        assert!(matches!(err, SensorlinkError::Protocol(msg) if msg.contains("no data payload")));
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_non_completed_response_is_protocol_error() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;
        let form = DataForm::new(FormType::Form);
        conn.push_response(Ok(CommandResponse::executing(&form)));

        let err = client.subscribe(PROXY, "prm:123").await.unwrap_err();
        assert!(matches!(
            err,
            SensorlinkError::Protocol(msg) if msg.contains("unexpected response status: executing")
        ));
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_wire_error_converts_to_domain_error() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;
        conn.push_response(Err(
            WireError::new(Condition::NotAuthorized, ErrorType::Auth).with_text("no grant")
        ));

        let err = client.subscribe(PROXY, "prm:123").await.unwrap_err();
        assert!(matches!(err, SensorlinkError::NotAuthorized(msg) if msg == "no grant"));
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_unmapped_wire_error_passes_through() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;
        let wire = WireError::new(Condition::ItemNotFound, ErrorType::Cancel).with_text("gone");
        conn.push_response(Err(wire.clone()));

        let err = client.subscribe(PROXY, "prm:123").await.unwrap_err();
        assert!(matches!(err, SensorlinkError::Wire(inner) if inner == wire));
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_push_queue_preserves_fifo_order() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;

        conn.push_inbound(data_push("one"));
        conn.push_inbound(InboundMessage {
            from: Identity::from(PROXY),
            path: "{urn:sensorlink:0}sensorlink/unrelated".to_string(),
            payload: b"ignored".to_vec(),
        });
        conn.push_inbound(data_push("two"));
        conn.push_inbound(data_push("three"));

        assert_eq!(client.wait_for_data().await.unwrap().0, "one");
        assert_eq!(client.wait_for_data().await.unwrap().0, "two");
        assert_eq!(client.wait_for_data().await.unwrap().0, "three");
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_listen_yields_pushes_in_order() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;

        conn.push_inbound(data_push("a"));
        conn.push_inbound(data_push("b"));

        let collected: Vec<Reading> = client.listen().take(2).collect().await;
        assert_eq!(collected, vec![Reading("a".into()), Reading("b".into())]);
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_concurrent_production_and_consumption_stay_ordered() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;

        let producer = conn.clone();
        let producer_task = tokio::spawn(async move {
            for i in 0..100 {
                producer.push_inbound(data_push(&i.to_string()));
                tokio::task::yield_now().await;
            }
        });

        for i in 0..100 {
            assert_eq!(client.wait_for_data().await.unwrap().0, i.to_string());
        }
        producer_task.await.unwrap();
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_undecodable_push_is_dropped_not_fatal() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;

        conn.push_inbound(InboundMessage {
            from: Identity::from(PROXY),
            path: DATA_PATH.to_string(),
            payload: vec![0xff, 0xfe],
        });
        conn.push_inbound(data_push("after"));

        assert_eq!(client.wait_for_data().await.unwrap().0, "after");
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_invoke_after_disconnect_fails_fast() {
        let conn = StubConnection::new();
        let client = connected_client(&conn).await;
        client.disconnect().await;

        let err = client.subscribe(PROXY, "prm:123").await.unwrap_err();
        assert!(matches!(err, SensorlinkError::ConnectionFailed(_)));
        assert!(conn.requests().is_empty());
    }
}
