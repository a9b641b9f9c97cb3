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

//! Command protocol server.
//!
//! The server dispatches inbound invocations through a shared two-phase
//! state machine: a payload-less request renders the command's form and
//! expects a submit next; a payload-carrying request is the submit phase,
//! which validates the fields, runs the handler, and replies with a terminal
//! result. Handlers receive the requesting identity explicitly on every
//! invocation.

pub mod handlers;

use std::{
    collections::HashMap,
    fmt::Debug,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};

use crate::{
    common::{consts::COMMAND_SESSION_TTL_SECS, enums::CommandNode},
    data::Payload,
    error::{Condition, ErrorType, HandlerError, WireError},
    messages::{CommandResponse, DataForm, FormType},
    server::handlers::CommandHandler,
    transport::Identity,
};

/// State of one in-flight command invocation, keyed by the transport's
/// per-session correlation id.
#[derive(Debug)]
struct CommandSessionState {
    requester: Identity,
    node: CommandNode,
    created_at: Instant,
}

/// One inbound command invocation with its reply channel.
#[derive(Debug)]
pub struct CommandInvocation {
    /// Who is invoking the command.
    pub requester: Identity,
    /// Command node name as it arrived on the wire.
    pub node: String,
    /// Transport correlation id scoping the two-phase exchange.
    pub session_id: String,
    /// Rendered submit form, absent on a plain request.
    pub payload: Option<String>,
    /// Where the response (or wire error) goes.
    pub reply_tx: oneshot::Sender<Result<CommandResponse, WireError>>,
}

/// Dispatches command invocations to registered handlers.
pub struct SensorlinkServer<D: Payload> {
    handlers: HashMap<String, Box<dyn CommandHandler<D>>>,
    sessions: DashMap<String, CommandSessionState>,
    session_ttl: Duration,
}

impl<D: Payload> Debug for SensorlinkServer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(SensorlinkServer))
            .field("nodes", &self.handlers.keys().collect::<Vec<_>>())
            .field("open_sessions", &self.sessions.len())
            .finish()
    }
}

impl<D: Payload> Default for SensorlinkServer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Payload> SensorlinkServer<D> {
    /// Creates a server with no registered commands.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            sessions: DashMap::new(),
            session_ttl: Duration::from_secs(COMMAND_SESSION_TTL_SECS),
        }
    }

    /// Overrides the abandonment TTL for in-flight command sessions.
    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Registers a command handler under its node name.
    pub fn add_handler(&mut self, handler: Box<dyn CommandHandler<D>>) {
        let node = handler.node().to_string();
        log::debug!("Registered command node {node}");
        self.handlers.insert(node, handler);
    }

    /// Number of in-flight command sessions.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the given correlation id has an in-flight session.
    #[must_use]
    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Runs one invocation through the two-phase state machine.
    ///
    /// A payload-carrying invocation goes straight to the submit phase, even
    /// without a preceding request phase.
    ///
    /// # Errors
    ///
    /// Handler errors are converted to wire conditions where a mapping
    /// exists; unrecognized errors surface as `internal-server-error`.
    pub async fn handle(
        &self,
        requester: &Identity,
        node: &str,
        session_id: &str,
        payload: Option<&str>,
    ) -> Result<CommandResponse, WireError> {
        self.prune_abandoned();

        let handler = self.handlers.get(node).ok_or_else(|| {
            WireError::new(Condition::ItemNotFound, ErrorType::Cancel)
                .with_text(format!("unknown command node: {node}"))
        })?;

        match payload {
            None => self.handle_request(requester, handler.as_ref(), session_id),
            Some(xml) => self.handle_submit(requester, handler.as_ref(), session_id, xml).await,
        }
    }

    /// Answers invocations from the channel until it closes.
    pub async fn serve(&self, mut invocations: mpsc::UnboundedReceiver<CommandInvocation>) {
        while let Some(invocation) = invocations.recv().await {
            let result = self
                .handle(
                    &invocation.requester,
                    &invocation.node,
                    &invocation.session_id,
                    invocation.payload.as_deref(),
                )
                .await;
            if invocation.reply_tx.send(result).is_err() {
                log::warn!(
                    "Requester {} went away before the {} reply",
                    invocation.requester,
                    invocation.node
                );
            }
        }
        log::debug!("Invocation channel closed, server stopped");
    }

    /// Request phase: render the form and expect a submit next.
    fn handle_request(
        &self,
        requester: &Identity,
        handler: &dyn CommandHandler<D>,
        session_id: &str,
    ) -> Result<CommandResponse, WireError> {
        let mut form = DataForm::new(FormType::Form).with_title(handler.name());
        handler.fill_form(&mut form).map_err(surface)?;

        self.sessions.insert(
            session_id.to_string(),
            CommandSessionState {
                requester: requester.clone(),
                node: handler.node(),
                created_at: Instant::now(),
            },
        );

        log::debug!("Rendered {} form for {requester}", handler.node());
        Ok(CommandResponse::executing(&form))
    }

    /// Submit phase: validate, execute, reply terminally.
    async fn handle_submit(
        &self,
        requester: &Identity,
        handler: &dyn CommandHandler<D>,
        session_id: &str,
        payload: &str,
    ) -> Result<CommandResponse, WireError> {
        let submission = DataForm::from_xml(payload).map_err(|e| {
            WireError::new(Condition::BadRequest, ErrorType::Modify).with_text(e.to_string())
        })?;

        let mut result_form = DataForm::new(FormType::Result).with_title(handler.name());
        let data = handler
            .execute(requester, &submission, &mut result_form)
            .await
            .map_err(surface)?;

        // Terminal: no further round trip expected on this correlation id.
        self.sessions.remove(session_id);

        log::debug!("Completed {} for {requester}", handler.node());
        Ok(CommandResponse::completed(
            Some(&result_form),
            data.map(|d| d.to_wire()),
        ))
    }

    fn prune_abandoned(&self) {
        let ttl = self.session_ttl;
        self.sessions.retain(|session_id, state| {
            let keep = state.created_at.elapsed() < ttl;
            if !keep {
                log::debug!(
                    "Dropping abandoned {} session {session_id} from {}",
                    state.node,
                    state.requester
                );
            }
            keep
        });
    }
}

fn surface(err: HandlerError) -> WireError {
    match err.try_into_wire() {
        Ok(wire) => wire,
        Err(other) => {
            log::error!("Unhandled command error: {other}");
            WireError::new(Condition::InternalServerError, ErrorType::Cancel)
                .with_text(other.to_string())
        }
    }
}
