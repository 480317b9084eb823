//! Resources as schema-checked slot graphs.
//!
//! A [`Resource`] holds its content as JSON and exposes path-based access:
//! - [`Resource::get`] reads the value at an element path.
//! - [`Resource::set`] writes a value, coercing it against the declared element kind.
//! - [`Resource::set_element`] writes one element of a repeating field.
//!
//! Writes that do not fit the schema are rejected so that callers can fall back to another
//! representation of the same value.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::element_path::{self, Step};
use crate::schema::{self, ElementKind, FieldDef, TypeDef};
use crate::{FhirError, FhirResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    type_def: &'static TypeDef,
    body: Map<String, Value>,
}

impl Resource {
    /// Creates an empty resource of the registered type `type_name`.
    pub fn new(type_name: &str) -> FhirResult<Self> {
        if !schema::is_resource_type(type_name) {
            return Err(FhirError::UnknownType(type_name.to_string()));
        }
        let type_def =
            schema::lookup(type_name).ok_or_else(|| FhirError::UnknownType(type_name.to_string()))?;
        Ok(Self {
            type_def,
            body: Map::new(),
        })
    }

    pub fn resource_type(&self) -> &'static str {
        self.type_def.name
    }

    /// Reads the value at `path`.
    ///
    /// A declared repeating field that has never been written reads as an empty list.
    /// Returns `Ok(None)` for declared fields without a value.
    pub fn get(&self, path: &str) -> FhirResult<Option<Value>> {
        let steps = element_path::parse(path)?;
        let mut type_def = self.type_def;
        let mut current = Some(&self.body);

        for (position, step) in steps.iter().enumerate() {
            let field = field_of(type_def, step, path)?;
            let Some(object) = current else {
                return Ok(None);
            };

            let mut slot = object.get(step.name);
            if let Some(index) = step.index {
                slot = slot.and_then(Value::as_array).and_then(|items| items.get(index));
            }

            if position == steps.len() - 1 {
                if slot.is_none() && field.repeated && step.index.is_none() {
                    return Ok(Some(Value::Array(Vec::new())));
                }
                return Ok(slot.cloned());
            }

            type_def = backbone_of(field, step, path)?;
            current = slot.and_then(Value::as_object);
        }

        Ok(None)
    }

    /// Number of elements currently held by the repeating field at `path`.
    pub fn len_at(&self, path: &str) -> FhirResult<usize> {
        match self.get(path)? {
            Some(Value::Array(items)) => Ok(items.len()),
            Some(_) => Err(FhirError::NotAList(path.to_string())),
            None => Ok(0),
        }
    }

    /// Writes `value` at `path`.
    ///
    /// Intermediate single-valued elements are created on demand. Elements of repeating
    /// fields must already exist.
    pub fn set(&mut self, path: &str, value: Value) -> FhirResult<()> {
        let steps = element_path::parse(path)?;
        let Some((last, parents)) = steps.split_last() else {
            return Err(FhirError::InvalidPath(path.to_string()));
        };

        let mut type_def = self.type_def;
        let mut object = &mut self.body;
        for step in parents {
            let field = field_of(type_def, step, path)?;
            let next = backbone_of(field, step, path)?;
            let slot = match (field.repeated, step.index) {
                (true, Some(index)) => element_mut(object, step.name, index, path)?,
                (false, None) => object
                    .entry(step.name.to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                _ => return Err(FhirError::InvalidPath(path.to_string())),
            };
            object = slot.as_object_mut().ok_or_else(|| FhirError::TypeMismatch {
                path: path.to_string(),
                expected: next.name,
            })?;
            type_def = next;
        }

        let field = field_of(type_def, last, path)?;
        match last.index {
            None => {
                let coerced = coerce_field(field, value, path)?;
                object.insert(last.name.to_string(), coerced);
            }
            Some(index) => {
                if !field.repeated {
                    return Err(FhirError::NotAList(path.to_string()));
                }
                let coerced = coerce_element(field.kind, value, path)?;
                *element_mut(object, last.name, index, path)? = coerced;
            }
        }
        Ok(())
    }

    /// Writes `value` as element `index` of the repeating field at `path`.
    pub fn set_element(&mut self, path: &str, index: usize, value: Value) -> FhirResult<()> {
        self.set(&format!("{path}[{index}]"), value)
    }

    /// The resource as FHIR JSON, `resourceType` first.
    pub fn to_json(&self) -> Value {
        let mut out = Map::with_capacity(self.body.len() + 1);
        out.insert(
            "resourceType".to_string(),
            Value::String(self.type_def.name.to_string()),
        );
        out.extend(self.body.iter().map(|(k, v)| (k.clone(), v.clone())));
        Value::Object(out)
    }
}

fn field_of(type_def: &'static TypeDef, step: &Step<'_>, path: &str) -> FhirResult<&'static FieldDef> {
    let field = type_def
        .field(step.name)
        .ok_or_else(|| FhirError::UnknownField {
            type_name: type_def.name.to_string(),
            field: step.name.to_string(),
        })?;
    if step.index.is_some() && !field.repeated {
        return Err(FhirError::NotAList(path.to_string()));
    }
    Ok(field)
}

/// Type of the element reached through `field`; only backbone elements can be navigated.
fn backbone_of(field: &FieldDef, step: &Step<'_>, path: &str) -> FhirResult<&'static TypeDef> {
    let ElementKind::Backbone(name) = field.kind else {
        return Err(FhirError::InvalidPath(path.to_string()));
    };
    if field.repeated && step.index.is_none() {
        return Err(FhirError::InvalidPath(path.to_string()));
    }
    schema::lookup(name).ok_or_else(|| FhirError::UnknownType(name.to_string()))
}

fn element_mut<'m>(
    object: &'m mut Map<String, Value>,
    name: &str,
    index: usize,
    path: &str,
) -> FhirResult<&'m mut Value> {
    let items = object
        .get_mut(name)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| FhirError::IndexOutOfRange {
            path: path.to_string(),
            index,
            len: 0,
        })?;
    let len = items.len();
    items.get_mut(index).ok_or_else(|| FhirError::IndexOutOfRange {
        path: path.to_string(),
        index,
        len,
    })
}

fn coerce_field(field: &FieldDef, value: Value, path: &str) -> FhirResult<Value> {
    if !field.repeated {
        return coerce_element(field.kind, value, path);
    }
    let Value::Array(items) = value else {
        return Err(FhirError::TypeMismatch {
            path: path.to_string(),
            expected: "list",
        });
    };
    items
        .into_iter()
        .map(|item| coerce_element(field.kind, item, path))
        .collect::<FhirResult<Vec<_>>>()
        .map(Value::Array)
}

fn coerce_element(kind: ElementKind, value: Value, path: &str) -> FhirResult<Value> {
    let invalid = |reason: String| FhirError::InvalidValue {
        path: path.to_string(),
        reason,
    };
    match (&kind, &value) {
        (ElementKind::String, Value::String(_)) => Ok(value),
        (ElementKind::DateTime, Value::String(text)) => {
            if is_date_time(text) {
                Ok(value)
            } else {
                Err(invalid(format!("'{text}' is not a dateTime")))
            }
        }
        (ElementKind::Code(allowed), Value::String(text)) => {
            if allowed.contains(&text.as_str()) {
                Ok(value)
            } else {
                Err(invalid(format!("'{text}' is not one of {allowed:?}")))
            }
        }
        (ElementKind::Extension, Value::Object(map)) => {
            if map.is_empty() || map.get("url").is_some_and(Value::is_string) {
                Ok(value)
            } else {
                Err(invalid("extension without url".to_string()))
            }
        }
        (kind, Value::Object(_)) if kind.is_complex() => Ok(value),
        _ => Err(FhirError::TypeMismatch {
            path: path.to_string(),
            expected: kind.describe(),
        }),
    }
}

/// Accepts RFC 3339 timestamps, naive timestamps and plain dates.
pub fn is_date_time(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}
