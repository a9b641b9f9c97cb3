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

//! Timestamp and date parsing helpers.
//!
//! Every string-to-timestamp boundary in the crate funnels through
//! [`parse_timestamp`], which refuses offset-less input before any I/O
//! happens. Ambiguous wall-clock times must never reach the wire.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Error raised when a timestamp or date string cannot be used.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// The value parsed as a local date-time but carried no UTC offset.
    #[error("timestamp '{0}' has no UTC offset; naive timestamps are not handled")]
    MissingOffset(String),

    /// The value is not valid ISO-8601 at all.
    #[error("invalid ISO-8601 timestamp '{value}': {source}")]
    Invalid {
        value: String,
        source: chrono::ParseError,
    },
}

/// Parses an ISO-8601 date-time with an explicit UTC offset.
///
/// # Errors
///
/// Returns [`TimestampError::MissingOffset`] for timezone-naive input and
/// [`TimestampError::Invalid`] for anything else unparseable.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Ok(ts),
        Err(source) => {
            if NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok() {
                Err(TimestampError::MissingOffset(value.to_string()))
            } else {
                Err(TimestampError::Invalid {
                    value: value.to_string(),
                    source,
                })
            }
        }
    }
}

/// Parses a plain `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`TimestampError::Invalid`] when the value is not a valid date.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, TimestampError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| TimestampError::Invalid {
        value: value.to_string(),
        source,
    })
}

/// Formats a date as `YYYY-MM-DD`.
#[must_use]
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("2024-05-02T00:00:00+02:00", 2)]
    #[case("2024-05-02T00:00:00Z", 0)]
    #[case("2024-05-02T13:45:30.250-05:00", -5)]
    fn test_parse_timestamp_with_offset(#[case] value: &str, #[case] offset_hours: i32) {
        let ts = parse_timestamp(value).unwrap();
        assert_eq!(ts.offset().local_minus_utc(), offset_hours * 3600);
    }

    #[rstest]
    #[case("2024-05-02T00:00:00")]
    #[case("2024-05-02T13:45:30.250")]
    fn test_parse_timestamp_rejects_naive(#[case] value: &str) {
        let err = parse_timestamp(value).unwrap_err();
        assert!(matches!(err, TimestampError::MissingOffset(_)));
        assert!(err.to_string().contains("no UTC offset"));
    }

    #[rstest]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("not a timestamp").unwrap_err();
        assert!(matches!(err, TimestampError::Invalid { .. }));
    }

    #[rstest]
    fn test_iso_date_round_trip() {
        let date = parse_iso_date("2024-05-02").unwrap();
        assert_eq!(format_iso_date(date), "2024-05-02");
        assert!(parse_iso_date("02/05/2024").is_err());
    }
}
