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

//! Command handler variants.
//!
//! Each variant supplies only its capability pair (`fill_form`, `execute`)
//! and delegates the two-phase mechanics to the dispatcher. Application
//! logic plugs in behind the [`HistoryProvider`] and [`SubscriptionManager`]
//! backend traits.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;

use crate::{
    common::{
        consts::{FIELD_END_TIME, FIELD_IDENTIFIER, FIELD_RESULT, FIELD_START_TIME},
        enums::CommandNode,
        parse::parse_timestamp,
    },
    data::Payload,
    error::HandlerError,
    messages::{DataForm, FormField},
    transport::Identity,
};

/// Reference timezone for default query windows.
const REFERENCE_TZ: Tz = chrono_tz::Europe::Paris;

/// One remote-invocable command.
///
/// Implementations render their field definitions in `fill_form` and consume
/// a validated submission in `execute`; the request/submit phase transitions
/// are shared dispatcher mechanics and never reimplemented per command.
#[async_trait]
pub trait CommandHandler<D: Payload>: Send + Sync {
    /// The node this handler serves.
    fn node(&self) -> CommandNode;

    /// Human-readable command name, used as the form title.
    fn name(&self) -> &str;

    /// Renders the command's field definitions and defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when defaults cannot be computed.
    fn fill_form(&self, form: &mut DataForm) -> Result<(), HandlerError>;

    /// Consumes the submitted field values and runs the command.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when validation or the backend fails.
    async fn execute(
        &self,
        requester: &Identity,
        submission: &DataForm,
        result_form: &mut DataForm,
    ) -> Result<Option<D>, HandlerError>;
}

/// Serves historical readings for the `get_history` command.
#[async_trait]
pub trait HistoryProvider<D: Payload>: Send + Sync {
    /// Identifier pre-filled into the rendered form.
    fn default_identifier(&self) -> String;

    /// Fetches readings for `identifier` within `[start_time, end_time)`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the requester is not allowed to read
    /// the series or the upstream fetch fails.
    async fn get_history(
        &self,
        requester: &Identity,
        identifier: &str,
        start_time: DateTime<FixedOffset>,
        end_time: DateTime<FixedOffset>,
    ) -> Result<D, HandlerError>;
}

/// Manages live-delivery subscriptions for the subscription commands.
#[async_trait]
pub trait SubscriptionManager: Send + Sync {
    /// Identifier pre-filled into the rendered forms.
    fn default_identifier(&self) -> String;

    /// Starts delivering readings for `identifier` to `requester`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the subscription cannot be created.
    async fn subscribe(&self, requester: &Identity, identifier: &str) -> Result<(), HandlerError>;

    /// Stops delivering readings for `identifier` to `requester`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the subscription cannot be removed.
    async fn unsubscribe(&self, requester: &Identity, identifier: &str)
    -> Result<(), HandlerError>;
}

fn require_value<'a>(form: &'a DataForm, var: &str) -> Result<&'a str, HandlerError> {
    form.value(var)
        .ok_or_else(|| HandlerError::InvalidInput(format!("missing required field '{var}'")))
}

/// Yesterday midnight to today midnight in the reference timezone.
fn default_history_window() -> (DateTime<Tz>, DateTime<Tz>) {
    let now = Utc::now().with_timezone(&REFERENCE_TZ);
    let end = now.with_time(NaiveTime::MIN).earliest().unwrap_or(now);
    let start = end - TimeDelta::days(1);
    (start, end)
}

/// The `get_history` command.
pub struct GetHistoryCommand<P> {
    provider: Arc<P>,
}

impl<P> GetHistoryCommand<P> {
    /// Creates the command over a history provider.
    #[must_use]
    pub const fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<D: Payload, P: HistoryProvider<D>> CommandHandler<D> for GetHistoryCommand<P> {
    fn node(&self) -> CommandNode {
        CommandNode::GetHistory
    }

    fn name(&self) -> &str {
        "Get history"
    }

    fn fill_form(&self, form: &mut DataForm) -> Result<(), HandlerError> {
        form.add_field(
            FormField::text_single(FIELD_IDENTIFIER, "Identifier")
                .required()
                .with_value(self.provider.default_identifier()),
        );

        let (start_time, end_time) = default_history_window();
        form.add_field(
            FormField::text_single(FIELD_START_TIME, "Start date (ISO 8601)")
                .required()
                .with_value(start_time.to_rfc3339()),
        );
        form.add_field(
            FormField::text_single(FIELD_END_TIME, "End date (ISO 8601)")
                .required()
                .with_value(end_time.to_rfc3339()),
        );
        Ok(())
    }

    async fn execute(
        &self,
        requester: &Identity,
        submission: &DataForm,
        result_form: &mut DataForm,
    ) -> Result<Option<D>, HandlerError> {
        let identifier = require_value(submission, FIELD_IDENTIFIER)?;
        let start_time = parse_timestamp(require_value(submission, FIELD_START_TIME)?)?;
        let end_time = parse_timestamp(require_value(submission, FIELD_END_TIME)?)?;

        let data = self
            .provider
            .get_history(requester, identifier, start_time, end_time)
            .await?;

        result_form.add_field(FormField::fixed(
            FIELD_RESULT,
            format!("Get {identifier}"),
            "Success",
        ));
        Ok(Some(data))
    }
}

/// The `subscribe` command.
pub struct SubscribeCommand<M> {
    manager: Arc<M>,
}

impl<M> SubscribeCommand<M> {
    /// Creates the command over a subscription manager.
    #[must_use]
    pub const fn new(manager: Arc<M>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<D: Payload, M: SubscriptionManager> CommandHandler<D> for SubscribeCommand<M> {
    fn node(&self) -> CommandNode {
        CommandNode::Subscribe
    }

    fn name(&self) -> &str {
        "Subscribe"
    }

    fn fill_form(&self, form: &mut DataForm) -> Result<(), HandlerError> {
        form.add_field(
            FormField::text_single(FIELD_IDENTIFIER, "Identifier")
                .required()
                .with_value(self.manager.default_identifier()),
        );
        Ok(())
    }

    async fn execute(
        &self,
        requester: &Identity,
        submission: &DataForm,
        result_form: &mut DataForm,
    ) -> Result<Option<D>, HandlerError> {
        let identifier = require_value(submission, FIELD_IDENTIFIER)?;
        self.manager.subscribe(requester, identifier).await?;

        result_form.add_field(FormField::fixed(
            FIELD_RESULT,
            format!("Subscribe to {identifier}"),
            "Success",
        ));
        Ok(None)
    }
}

/// The `unsubscribe` command.
pub struct UnsubscribeCommand<M> {
    manager: Arc<M>,
}

impl<M> UnsubscribeCommand<M> {
    /// Creates the command over a subscription manager.
    #[must_use]
    pub const fn new(manager: Arc<M>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<D: Payload, M: SubscriptionManager> CommandHandler<D> for UnsubscribeCommand<M> {
    fn node(&self) -> CommandNode {
        CommandNode::Unsubscribe
    }

    fn name(&self) -> &str {
        "Unsubscribe"
    }

    fn fill_form(&self, form: &mut DataForm) -> Result<(), HandlerError> {
        form.add_field(
            FormField::text_single(FIELD_IDENTIFIER, "Identifier")
                .required()
                .with_value(self.manager.default_identifier()),
        );
        Ok(())
    }

    async fn execute(
        &self,
        requester: &Identity,
        submission: &DataForm,
        result_form: &mut DataForm,
    ) -> Result<Option<D>, HandlerError> {
        let identifier = require_value(submission, FIELD_IDENTIFIER)?;
        self.manager.unsubscribe(requester, identifier).await?;

        result_form.add_field(FormField::fixed(
            FIELD_RESULT,
            format!("Unsubscribe from {identifier}"),
            "Success",
        ));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;
    use rstest::rstest;

    use super::*;
    use crate::{messages::FormType, stubs::Reading};

    struct NoopProvider;

    #[async_trait]
    impl HistoryProvider<Reading> for NoopProvider {
        fn default_identifier(&self) -> String {
            "prm:14883351595913".to_string()
        }

        async fn get_history(
            &self,
            _requester: &Identity,
            identifier: &str,
            _start_time: DateTime<FixedOffset>,
            _end_time: DateTime<FixedOffset>,
        ) -> Result<Reading, HandlerError> {
            Ok(Reading(identifier.to_string()))
        }
    }

    #[rstest]
    fn test_default_history_window_is_one_day_ending_at_midnight() {
        let (start_time, end_time) = default_history_window();
        assert_eq!(end_time - start_time, TimeDelta::days(1));
        assert_eq!(end_time.time().hour(), 0);
        assert_eq!(end_time.time().minute(), 0);
    }

    #[rstest]
    fn test_get_history_form_defaults_are_offset_aware() {
        let handler = GetHistoryCommand::new(Arc::new(NoopProvider));
        let mut form = DataForm::new(FormType::Form);
        CommandHandler::<Reading>::fill_form(&handler, &mut form).unwrap();

        assert_eq!(form.value(FIELD_IDENTIFIER), Some("prm:14883351595913"));
        for var in [FIELD_START_TIME, FIELD_END_TIME] {
            let value = form.value(var).unwrap();
            parse_timestamp(value).unwrap();
        }
        assert!(form.fields.iter().all(|field| field.required));
    }
}
