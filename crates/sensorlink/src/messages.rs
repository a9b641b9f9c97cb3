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

//! Command request/response types and the data-form wire text.
//!
//! Forms are the field-carrying payload of every command round trip. Field
//! values are XML-escaped on render and unescaped on parse, so any text value
//! survives the trip unchanged.

use quick_xml::{Reader, escape::escape, events::Event};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};
use thiserror::Error;

use crate::common::{
    consts::FORM_NS,
    enums::{CommandNode, CommandStatus},
};

/// Error raised when a form payload cannot be rendered or parsed.
#[derive(Debug, Error)]
pub enum FormError {
    /// The payload is not well-formed XML.
    #[error("malformed form payload: {0}")]
    Malformed(String),

    /// The payload contains an element this vocabulary does not define.
    #[error("unexpected element <{0}> in form payload")]
    UnexpectedElement(String),

    /// The payload has no `<x>` root element.
    #[error("form payload has no form root element")]
    MissingRoot,

    /// A field is missing its `var` attribute.
    #[error("form field is missing its 'var' attribute")]
    MissingVar,
}

fn malformed(err: impl std::fmt::Display) -> FormError {
    FormError::Malformed(err.to_string())
}

/// Role of a form within the command exchange.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, AsRefStr, StrumDisplay, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FormType {
    /// Field definitions with defaults, rendered by the responder.
    Form,
    /// Field values submitted by the requester.
    Submit,
    /// Outcome summary, rendered by the responder after execution.
    Result,
}

/// Data type of a single form field.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, AsRefStr, StrumDisplay, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FieldType {
    /// A single line of text.
    TextSingle,
    /// Display-only text, not meant to be edited.
    Fixed,
}

/// One named field of a data form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Stable field name.
    pub var: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Human-readable label.
    pub label: Option<String>,
    /// Whether a submission must carry this field.
    pub required: bool,
    /// Current or submitted value.
    pub value: Option<String>,
}

impl FormField {
    /// Creates a text field carrying a submitted value.
    #[must_use]
    pub fn text(var: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            field_type: FieldType::TextSingle,
            label: None,
            required: false,
            value: Some(value.into()),
        }
    }

    /// Creates a text field definition with a label and no value yet.
    #[must_use]
    pub fn text_single(var: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            field_type: FieldType::TextSingle,
            label: Some(label.into()),
            required: false,
            value: None,
        }
    }

    /// Creates a display-only field with a label and value.
    #[must_use]
    pub fn fixed(
        var: impl Into<String>,
        label: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            var: var.into(),
            field_type: FieldType::Fixed,
            label: Some(label.into()),
            required: false,
            value: Some(value.into()),
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the field value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// A set of named fields exchanged during a command round trip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataForm {
    /// Role of this form in the exchange.
    pub form_type: FormType,
    /// Human-readable form title.
    pub title: Option<String>,
    /// The fields, in render order.
    pub fields: Vec<FormField>,
}

impl DataForm {
    /// Creates an empty form of the given type.
    #[must_use]
    pub const fn new(form_type: FormType) -> Self {
        Self {
            form_type,
            title: None,
            fields: Vec::new(),
        }
    }

    /// Sets the form title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Appends a field.
    pub fn add_field(&mut self, field: FormField) {
        self.fields.push(field);
    }

    /// Returns the value of the named field, if present.
    #[must_use]
    pub fn value(&self, var: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.var == var)
            .and_then(|field| field.value.as_deref())
    }

    /// Whether the named field is present at all.
    #[must_use]
    pub fn has_field(&self, var: &str) -> bool {
        self.fields.iter().any(|field| field.var == var)
    }

    /// Renders the form as wire text. All attribute and element text is
    /// XML-escaped.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = format!("<x xmlns=\"{FORM_NS}\" type=\"{}\"", self.form_type);
        if let Some(title) = &self.title {
            xml.push_str(&format!(" title=\"{}\"", escape(title)));
        }
        xml.push('>');
        for field in &self.fields {
            xml.push_str(&format!(
                "<field var=\"{}\" type=\"{}\"",
                escape(&field.var),
                field.field_type
            ));
            if let Some(label) = &field.label {
                xml.push_str(&format!(" label=\"{}\"", escape(label)));
            }
            if field.required {
                xml.push_str(" required=\"true\"");
            }
            match &field.value {
                Some(value) => {
                    xml.push_str(&format!("><value>{}</value></field>", escape(value)));
                }
                None => xml.push_str("/>"),
            }
        }
        xml.push_str("</x>");
        xml
    }

    /// Parses a form from wire text.
    ///
    /// # Errors
    ///
    /// Returns a [`FormError`] when the payload is not a well-formed form.
    pub fn from_xml(xml: &str) -> Result<Self, FormError> {
        let mut reader = Reader::from_str(xml);
        let mut form: Option<Self> = None;
        let mut field: Option<FormField> = None;
        let mut in_value = false;

        loop {
            match reader.read_event().map_err(malformed)? {
                Event::Start(start) => match start.name().as_ref() {
                    b"x" => form = Some(Self::parse_root(&start)?),
                    b"field" => field = Some(Self::parse_field(&start)?),
                    b"value" => {
                        in_value = true;
                        if let Some(field) = field.as_mut() {
                            field.value = Some(String::new());
                        }
                    }
                    other => {
                        return Err(FormError::UnexpectedElement(
                            String::from_utf8_lossy(other).into_owned(),
                        ));
                    }
                },
                Event::Empty(start) => match start.name().as_ref() {
                    b"x" => form = Some(Self::parse_root(&start)?),
                    b"field" => {
                        let parsed = Self::parse_field(&start)?;
                        form.as_mut().ok_or(FormError::MissingRoot)?.fields.push(parsed);
                    }
                    b"value" => {
                        if let Some(field) = field.as_mut() {
                            field.value = Some(String::new());
                        }
                    }
                    other => {
                        return Err(FormError::UnexpectedElement(
                            String::from_utf8_lossy(other).into_owned(),
                        ));
                    }
                },
                Event::Text(text) => {
                    if in_value && let Some(field) = field.as_mut() {
                        let decoded = text.decode().map_err(malformed)?;
                        match field.value.as_mut() {
                            Some(value) => value.push_str(&decoded),
                            None => field.value = Some(decoded.into_owned()),
                        }
                    }
                }
                Event::GeneralRef(reference) => {
                    if in_value && let Some(field) = field.as_mut() {
                        let resolved = if let Some(ch) = reference.resolve_char_ref().map_err(malformed)? {
                            ch.to_string()
                        } else {
                            let name = reference.decode().map_err(malformed)?;
                            quick_xml::escape::resolve_predefined_entity(&name)
                                .ok_or_else(|| malformed(format!("unrecognized entity '{name}'")))?
                                .to_string()
                        };
                        match field.value.as_mut() {
                            Some(value) => value.push_str(&resolved),
                            None => field.value = Some(resolved),
                        }
                    }
                }
                Event::End(end) => match end.name().as_ref() {
                    b"value" => in_value = false,
                    b"field" => {
                        if let Some(done) = field.take() {
                            form.as_mut().ok_or(FormError::MissingRoot)?.fields.push(done);
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        form.ok_or(FormError::MissingRoot)
    }

    fn parse_root(start: &quick_xml::events::BytesStart<'_>) -> Result<Self, FormError> {
        let mut form_type = FormType::Form;
        let mut title = None;
        for attr in start.attributes() {
            let attr = attr.map_err(malformed)?;
            let value = attr.unescape_value().map_err(malformed)?;
            match attr.key.as_ref() {
                b"type" => {
                    form_type = value
                        .parse()
                        .map_err(|_| FormError::Malformed(format!("unknown form type '{value}'")))?;
                }
                b"title" => title = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(Self {
            form_type,
            title,
            fields: Vec::new(),
        })
    }

    fn parse_field(start: &quick_xml::events::BytesStart<'_>) -> Result<FormField, FormError> {
        let mut var = None;
        let mut field_type = FieldType::TextSingle;
        let mut label = None;
        let mut required = false;
        for attr in start.attributes() {
            let attr = attr.map_err(malformed)?;
            let value = attr.unescape_value().map_err(malformed)?;
            match attr.key.as_ref() {
                b"var" => var = Some(value.into_owned()),
                b"type" => {
                    field_type = value.parse().map_err(|_| {
                        FormError::Malformed(format!("unknown field type '{value}'"))
                    })?;
                }
                b"label" => label = Some(value.into_owned()),
                b"required" => required = value == "true" || value == "1",
                _ => {}
            }
        }
        Ok(FormField {
            var: var.ok_or(FormError::MissingVar)?,
            field_type,
            label,
            required,
            value: None,
        })
    }
}

/// A single remote command invocation, immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Target endpoint identity.
    pub destination: String,
    /// Command node to invoke.
    pub node: CommandNode,
    /// Rendered submit form carrying the field values.
    pub payload: String,
}

impl CommandRequest {
    /// Builds a request submitting the given fields to `node` at
    /// `destination`.
    #[must_use]
    pub fn new(destination: impl Into<String>, node: CommandNode, fields: Vec<FormField>) -> Self {
        let mut form = DataForm::new(FormType::Submit);
        for field in fields {
            form.add_field(field);
        }
        Self {
            destination: destination.into(),
            node,
            payload: form.to_xml(),
        }
    }

    /// Parses the submitted fields back out of the payload.
    ///
    /// # Errors
    ///
    /// Returns a [`FormError`] when the payload is not a well-formed form.
    pub fn form(&self) -> Result<DataForm, FormError> {
        DataForm::from_xml(&self.payload)
    }
}

/// The correlated response to one [`CommandRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Command status after this round trip.
    pub status: CommandStatus,
    /// Rendered form (field definitions or result summary).
    pub payload: Option<String>,
    /// Wire bytes of the data artifact, when the command produced one.
    pub data: Option<Vec<u8>>,
}

impl CommandResponse {
    /// A terminal success response.
    #[must_use]
    pub fn completed(form: Option<&DataForm>, data: Option<Vec<u8>>) -> Self {
        Self {
            status: CommandStatus::Completed,
            payload: form.map(DataForm::to_xml),
            data,
        }
    }

    /// An intermediate response expecting another round trip.
    #[must_use]
    pub fn executing(form: &DataForm) -> Self {
        Self {
            status: CommandStatus::Executing,
            payload: Some(form.to_xml()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::common::consts::{FIELD_IDENTIFIER, FIELD_START_TIME};

    fn submit_form(values: &[(&str, &str)]) -> DataForm {
        let mut form = DataForm::new(FormType::Submit);
        for (var, value) in values {
            form.add_field(FormField::text(*var, *value));
        }
        form
    }

    #[rstest]
    #[case("prm:14883351595913")]
    #[case("a < b & c > d \"quoted\" 'single'")]
    #[case("ligne électrique n°3 — 現場センサー")]
    #[case("")]
    fn test_field_value_round_trip(#[case] value: &str) {
        let form = submit_form(&[(FIELD_IDENTIFIER, value)]);
        let parsed = DataForm::from_xml(&form.to_xml()).unwrap();
        assert_eq!(parsed.value(FIELD_IDENTIFIER), Some(value));
    }

    #[rstest]
    fn test_form_metadata_round_trip() {
        let mut form = DataForm::new(FormType::Form).with_title("Get history");
        form.add_field(
            FormField::text_single(FIELD_IDENTIFIER, "Identifier")
                .required()
                .with_value("default-series"),
        );
        form.add_field(FormField::text_single(FIELD_START_TIME, "Start date"));

        let parsed = DataForm::from_xml(&form.to_xml()).unwrap();
        assert_eq!(parsed, form);
    }

    #[rstest]
    fn test_fixed_field_round_trip() {
        let mut form = DataForm::new(FormType::Result);
        form.add_field(FormField::fixed("result", "Get prm:123", "Success"));
        let parsed = DataForm::from_xml(&form.to_xml()).unwrap();
        assert_eq!(parsed, form);
    }

    #[rstest]
    fn test_from_xml_rejects_foreign_elements() {
        let err = DataForm::from_xml("<x type=\"submit\"><bogus/></x>").unwrap_err();
        assert!(matches!(err, FormError::UnexpectedElement(name) if name == "bogus"));
    }

    #[rstest]
    fn test_from_xml_requires_root() {
        assert!(matches!(DataForm::from_xml(""), Err(FormError::MissingRoot)));
    }

    #[rstest]
    fn test_from_xml_requires_field_var() {
        let err = DataForm::from_xml("<x type=\"submit\"><field type=\"text-single\"/></x>")
            .unwrap_err();
        assert!(matches!(err, FormError::MissingVar));
    }

    #[rstest]
    fn test_request_payload_parses_back() {
        let request = CommandRequest::new(
            "provider@data.example.net/proxy",
            CommandNode::GetHistory,
            vec![FormField::text(FIELD_IDENTIFIER, "prm:123")],
        );
        let form = request.form().unwrap();
        assert_eq!(form.form_type, FormType::Submit);
        assert_eq!(form.value(FIELD_IDENTIFIER), Some("prm:123"));
        assert!(!form.has_field(FIELD_START_TIME));
    }

    #[rstest]
    fn test_response_constructors() {
        let form = submit_form(&[(FIELD_IDENTIFIER, "x")]);
        let executing = CommandResponse::executing(&form);
        assert_eq!(executing.status, CommandStatus::Executing);
        assert!(executing.data.is_none());

        let completed = CommandResponse::completed(None, Some(vec![1, 2, 3]));
        assert_eq!(completed.status, CommandStatus::Completed);
        assert!(completed.payload.is_none());
        assert_eq!(completed.data.as_deref(), Some(&[1u8, 2, 3][..]));
    }

    proptest! {
        #[test]
        fn prop_escaping_is_reversible(value in "\\PC{0,64}", var in "[a-z_]{1,16}") {
            let form = submit_form(&[(var.as_str(), value.as_str())]);
            let parsed = DataForm::from_xml(&form.to_xml()).unwrap();
            prop_assert_eq!(parsed.value(&var), Some(value.as_str()));
        }
    }
}
