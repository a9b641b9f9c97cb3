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

//! Error taxonomy for sensorlink operations.
//!
//! Two converters bridge the taxonomy levels: wire error conditions map into
//! domain errors on the client side ([`SensorlinkError::from`]), and local
//! handler errors map into wire conditions on the server side
//! ([`HandlerError::try_into_wire`]). Both are best-effort filters, not
//! exhaustive firewalls: unmapped values pass through unchanged.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};
use thiserror::Error;

use crate::common::parse::TimestampError;

/// Result type for sensorlink operations.
pub type SensorlinkResult<T> = Result<T, SensorlinkError>;

/// Wire-level error condition code.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    StrumDisplay,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Condition {
    /// The request was malformed or carried invalid field values.
    BadRequest,
    /// The responder does not implement the requested feature.
    FeatureNotImplemented,
    /// The responder hit an unexpected internal failure.
    InternalServerError,
    /// The addressed node does not exist.
    ItemNotFound,
    /// The requester lacks authorization for the operation.
    NotAuthorized,
    /// The remote cannot be reached.
    RemoteServerNotFound,
    /// The responder is temporarily unable to service the request.
    ServiceUnavailable,
    /// A failure with no dedicated condition; details ride alongside.
    UndefinedCondition,
}

/// Classifies how the requester should react to an error condition.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    StrumDisplay,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorType {
    /// Retry after providing credentials.
    Auth,
    /// Do not retry; the error is unrecoverable as sent.
    Cancel,
    /// Retry after changing the data sent.
    Modify,
    /// Retry after waiting.
    Wait,
}

/// Detail element carried by an [`Condition::UndefinedCondition`] error when
/// an upstream provider failed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDetail {
    /// Which upstream system produced the failure.
    pub issuer: String,
    /// The upstream system's own error code.
    pub code: String,
}

/// A transport-surfaced error response.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{condition}: {}", .text.as_deref().unwrap_or("no further detail"))]
pub struct WireError {
    /// The wire condition code.
    pub condition: Condition,
    /// How the requester should react.
    pub error_type: ErrorType,
    /// Free-text description.
    pub text: Option<String>,
    /// Upstream detail, present for some undefined-condition errors.
    pub upstream: Option<UpstreamDetail>,
}

impl WireError {
    /// Creates a wire error with the given condition and type.
    #[must_use]
    pub const fn new(condition: Condition, error_type: ErrorType) -> Self {
        Self {
            condition,
            error_type,
            text: None,
            upstream: None,
        }
    }

    /// Attaches a free-text description.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attaches upstream issuer/code detail.
    #[must_use]
    pub fn with_upstream(mut self, issuer: impl Into<String>, code: impl Into<String>) -> Self {
        self.upstream = Some(UpstreamDetail {
            issuer: issuer.into(),
            code: code.into(),
        });
        self
    }
}

/// Caller-visible error kinds.
///
/// Every failure surfaced by this crate is one of these; no raw transport
/// error escapes the boundary unwrapped. Callers are expected to handle the
/// kinds distinctly, e.g. retry on [`SensorlinkError::ServiceUnavailable`]
/// but not on [`SensorlinkError::BadRequest`].
#[derive(Debug, Error)]
pub enum SensorlinkError {
    /// The requester lacks authorization for the operation.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The remote is temporarily unable to service the request.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The request was rejected as malformed or invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An upstream provider behind the remote failed.
    #[error("upstream error from {issuer} (code {code}): {message}")]
    UpstreamError {
        issuer: String,
        code: String,
        message: String,
    },

    /// Session establishment or session loss.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The remote answered with an unexpected response shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A wire error condition with no domain mapping, passed through
    /// unchanged.
    #[error(transparent)]
    Wire(WireError),
}

impl From<WireError> for SensorlinkError {
    fn from(err: WireError) -> Self {
        match err.condition {
            Condition::NotAuthorized => Self::NotAuthorized(err.text.unwrap_or_default()),
            Condition::ServiceUnavailable => Self::ServiceUnavailable(err.text.unwrap_or_default()),
            Condition::BadRequest => Self::BadRequest(err.text.unwrap_or_default()),
            Condition::UndefinedCondition => match err.upstream {
                Some(detail) => Self::UpstreamError {
                    message: err.text.unwrap_or_default(),
                    issuer: detail.issuer,
                    code: detail.code,
                },
                None => Self::Wire(err),
            },
            _ => Self::Wire(err),
        }
    }
}

impl From<TimestampError> for SensorlinkError {
    fn from(err: TimestampError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Errors raised by command handler implementations on the server side.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The requester is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A submitted field value is missing or invalid.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An already-shaped wire error to send back verbatim.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Any other failure; surfaced by the dispatcher, not the converter.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<TimestampError> for HandlerError {
    fn from(err: TimestampError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl HandlerError {
    /// Best-effort conversion into a wire error condition.
    ///
    /// # Errors
    ///
    /// Errors with no wire mapping are returned unchanged for the dispatch
    /// layer to surface.
    pub fn try_into_wire(self) -> Result<WireError, Self> {
        match self {
            Self::PermissionDenied(msg) => {
                Ok(WireError::new(Condition::NotAuthorized, ErrorType::Auth).with_text(msg))
            }
            Self::InvalidInput(msg) => {
                Ok(WireError::new(Condition::BadRequest, ErrorType::Modify).with_text(msg))
            }
            Self::Wire(err) => Ok(err),
            other => Err(other),
        }
    }
}
