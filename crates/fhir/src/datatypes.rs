//! JSON builders for FHIR data types: `CodeableConcept` and `Extension`.

use std::fmt;
use std::str::FromStr;

use ferry_types::CodedText;
use serde_json::{json, Map, Value};

use crate::resource::is_date_time;
use crate::{FhirError, FhirResult};

/// Builds a `CodeableConcept`.
///
/// Terminology and code become a single `coding` entry; the display text is repeated as
/// `text`. A value with no terminology binding yields a concept holding only `text`.
pub fn codeable_concept(coded: &CodedText) -> Value {
    let mut concept = Map::new();
    if coded.system.is_some() || coded.code.is_some() {
        let mut coding = Map::new();
        if let Some(system) = &coded.system {
            coding.insert("system".into(), Value::String(system.clone()));
        }
        if let Some(code) = &coded.code {
            coding.insert("code".into(), Value::String(code.clone()));
        }
        if let Some(display) = &coded.display {
            coding.insert("display".into(), Value::String(display.clone()));
        }
        concept.insert("coding".into(), Value::Array(vec![Value::Object(coding)]));
    }
    if let Some(display) = &coded.display {
        concept.insert("text".into(), Value::String(display.clone()));
    }
    Value::Object(concept)
}

/// Explicit `value[x]` type of an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionValueType {
    String,
    DateTime,
    Boolean,
    Code,
}

impl ExtensionValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtensionValueType::String => "string",
            ExtensionValueType::DateTime => "dateTime",
            ExtensionValueType::Boolean => "boolean",
            ExtensionValueType::Code => "code",
        }
    }

    /// Converts record text into a value of this type.
    pub fn convert(self, text: &str) -> FhirResult<ExtensionValue> {
        match self {
            ExtensionValueType::String => Ok(ExtensionValue::String(text.to_string())),
            ExtensionValueType::Code => Ok(ExtensionValue::Code(text.to_string())),
            ExtensionValueType::DateTime if is_date_time(text) => {
                Ok(ExtensionValue::DateTime(text.to_string()))
            }
            ExtensionValueType::DateTime => Err(FhirError::InvalidInput(format!(
                "'{text}' is not a dateTime"
            ))),
            ExtensionValueType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" => Ok(ExtensionValue::Boolean(true)),
                "false" => Ok(ExtensionValue::Boolean(false)),
                _ => Err(FhirError::InvalidInput(format!("'{text}' is not a boolean"))),
            },
        }
    }
}

impl fmt::Display for ExtensionValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtensionValueType {
    type Err = FhirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ExtensionValueType::String),
            "dateTime" => Ok(ExtensionValueType::DateTime),
            "boolean" => Ok(ExtensionValueType::Boolean),
            "code" => Ok(ExtensionValueType::Code),
            other => Err(FhirError::InvalidInput(format!(
                "unknown extension value type: {other}"
            ))),
        }
    }
}

/// The `value[x]` of an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionValue {
    String(String),
    DateTime(String),
    Boolean(bool),
    Code(String),
    CodeableConcept(CodedText),
}

impl ExtensionValue {
    /// Builds the extension element `{ "url": ..., "value<Type>": ... }`.
    pub fn to_extension(&self, url: &str) -> Value {
        let (key, value) = match self {
            ExtensionValue::String(text) => ("valueString", json!(text)),
            ExtensionValue::DateTime(text) => ("valueDateTime", json!(text)),
            ExtensionValue::Boolean(flag) => ("valueBoolean", json!(flag)),
            ExtensionValue::Code(code) => ("valueCode", json!(code)),
            ExtensionValue::CodeableConcept(coded) => {
                ("valueCodeableConcept", codeable_concept(coded))
            }
        };
        let mut extension = Map::new();
        extension.insert("url".into(), Value::String(url.to_string()));
        extension.insert(key.into(), value);
        Value::Object(extension)
    }
}
