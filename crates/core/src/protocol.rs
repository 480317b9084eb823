//! Value construction and assignment shared by every value-writing rule.
//!
//! Responsibilities:
//! - Locate the target slot for a source node ([`get_target_value`]).
//! - Build the value to write, reassembling grouped coded concepts from their sibling nodes
//!   ([`construct_new_target_value`]).
//! - Write the value, falling back to the raw record text and then to the resource root
//!   ([`set_target_value`]).
//!
//! Failed writes are soft: they are logged at `debug` and do not count as a success.

use std::sync::Arc;

use ferry_types::{CodeField, CodedText};
use fhir::element_path::split_trailing_index;
use fhir::{codeable_concept, ExtensionValue, ExtensionValueType};
use openehr::{parse_coded_string, NodeId, PathBinding};
use serde_json::Value;

use crate::error::MappingError;
use crate::rules::{Decision, MappingRule, RuleVariant};
use crate::session::Session;

/// Where a node's value goes inside its resource.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSlot {
    /// Element path inside the resource, without a trailing index.
    pub route: String,
    /// Value currently at `route`.
    pub value: Option<Value>,
    /// Trailing list index, when the node translates to a list element.
    pub index: Option<usize>,
}

impl TargetSlot {
    /// The value the node will replace: the indexed element for list slots.
    pub fn current(&self) -> Option<&Value> {
        match (self.index, &self.value) {
            (Some(index), Some(Value::Array(items))) => items.get(index),
            (Some(_), _) => None,
            (None, value) => value.as_ref(),
        }
    }

    fn full_route(&self) -> String {
        match self.index {
            Some(index) => format!("{}[{index}]", self.route),
            None => self.route.clone(),
        }
    }
}

/// Resolves the target slot of `node` inside resource `resource`.
///
/// A trailing index that is not a number means path translation produced garbage; that
/// aborts the session.
pub fn get_target_value(
    session: &Session,
    resource: usize,
    node: NodeId,
) -> Result<TargetSlot, MappingError> {
    let rules = &session.rules[..];
    let mut route = session.tree.inner_net_path(node, rules);
    if route.is_empty() {
        route = session.tree.net_path(node, rules);
    }

    let (route, index) = match split_trailing_index(&route) {
        Some((base, raw)) => {
            let index = raw.parse::<usize>().map_err(|_| MappingError::IndexParse {
                path: route.clone(),
                index: raw.to_string(),
            })?;
            (base.to_string(), Some(index))
        }
        None => (route, None),
    };

    let value = session
        .resources
        .get(resource)
        .and_then(|target| target.get(&route).ok().flatten());

    Ok(TargetSlot {
        route,
        value,
        index,
    })
}

/// Builds the value `rule` writes for `node`, given the value currently in the slot.
///
/// Every sibling node consulted is marked consumed. Returns `None` when there is nothing to
/// write.
pub fn construct_new_target_value(
    session: &mut Session,
    node: NodeId,
    rule: &MappingRule,
    existing: Option<&Value>,
) -> Option<Value> {
    let rules = Arc::clone(&session.rules);
    let tree = &session.tree;
    let destination = tree.net_path(node, &rules[..]);
    let parent = tree.parent(node)?;

    let siblings: Vec<NodeId> = tree
        .find_many(parent, rule.search_term())
        .into_iter()
        .filter(|id| !tree[*id].is_leaf() && tree.net_path(*id, &rules[..]) == destination)
        .collect();

    let coded = if is_grouped(tree.name(node), rule.source_key()) {
        let mut parts: [Option<String>; 3] = Default::default();
        for sibling in &siblings {
            let Some(field) = code_field_of(tree.name(*sibling)) else {
                continue;
            };
            let slot = &mut parts[field_slot(field)];
            if slot.is_none() {
                *slot = tree.leaf_value(*sibling).map(str::to_string);
            }
        }
        if parts.iter().all(Option::is_none) {
            tree.leaf_value(node).and_then(parse_coded_string)
        } else {
            let [system, code, display] = parts;
            Some(CodedText::new(system, code, display))
        }
    } else {
        let chosen = match siblings.as_slice() {
            [only] => *only,
            _ => tree
                .parent_resource_index(node, &rules[..])
                .and_then(|index| siblings.get(index).copied())
                .unwrap_or(node),
        };
        tree.leaf_value(chosen).and_then(parse_coded_string)
    };
    let raw = tree.leaf_value(node).map(str::to_string);

    session.consumed.extend(siblings);

    // Text the coded-string grammar rejects is still a plain value.
    let coded = coded
        .or_else(|| raw.clone().map(CodedText::text))
        .filter(|coded| !coded.is_empty())?;
    match rule.variant() {
        RuleVariant::Conditional { decisions } => decide(decisions, &coded, existing),
        RuleVariant::Extension { url, value_type } => {
            let value = extension_value(*value_type, &coded, raw.as_deref())?;
            let mut extensions = match existing {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            extensions.push(value.to_extension(url));
            Some(Value::Array(extensions))
        }
        RuleVariant::Resource { .. } | RuleVariant::List | RuleVariant::Attribute => {
            Some(codeable_concept(&coded))
        }
    }
}

/// Writes `value` into the slot and counts the write on success.
///
/// Outside pre-allocated list elements three writes are tried in turn: the structured value
/// at the route, the node's raw text at the route, the raw text on the same field of the
/// resource root.
pub fn set_target_value(
    session: &mut Session,
    resource: usize,
    node: NodeId,
    value: Value,
    slot: &TargetSlot,
) -> bool {
    let raw = session.tree.leaf_value(node).map(str::to_string);
    let Some(target) = session.resources.get_mut(resource) else {
        return false;
    };

    let result = match (&slot.value, slot.index) {
        (Some(_), Some(index)) => target.set_element(&slot.route, index, value),
        _ => {
            let path = slot.full_route();
            let last = path.rsplit('.').next().unwrap_or(&path);
            let field = split_trailing_index(last).map_or(last, |(base, _)| base);

            target
                .set(&path, value)
                .or_else(|err| match &raw {
                    Some(raw) => target.set(&path, Value::String(raw.clone())),
                    None => Err(err),
                })
                .or_else(|err| match &raw {
                    Some(raw) if field != path => target.set(field, Value::String(raw.clone())),
                    _ => Err(err),
                })
        }
    };

    match result {
        Ok(()) => {
            session.successes += 1;
            true
        }
        Err(err) => {
            tracing::debug!(
                node = %session.tree.path_to_root(node),
                route = %slot.full_route(),
                error = %err,
                "write skipped"
            );
            false
        }
    }
}

/// `field:N|part`, `key|part` or `key:N`.
fn is_grouped(name: &str, key: &str) -> bool {
    has_indexed_part(name) || name.contains(&format!("{key}|")) || has_key_index(name, key)
}

/// Whether `name` contains `:<digits>|`.
fn has_indexed_part(name: &str) -> bool {
    name.match_indices(':').any(|(position, _)| {
        let rest = &name[position + 1..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        digits > 0 && rest[digits..].starts_with('|')
    })
}

/// Whether `name` contains `<key>:<digit>`.
fn has_key_index(name: &str, key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    name.match_indices(key).any(|(position, _)| {
        name[position + key.len()..]
            .strip_prefix(':')
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
    })
}

/// Which part of a coded concept a `...|terminology`, `...|code` or `...|value` node holds.
fn code_field_of(name: &str) -> Option<CodeField> {
    let suffix = name.rsplit('|').next().unwrap_or(name);
    CodeField::ALL
        .into_iter()
        .find(|field| suffix.contains(field.as_str()))
}

fn field_slot(field: CodeField) -> usize {
    match field {
        CodeField::Terminology => 0,
        CodeField::Code => 1,
        CodeField::Value => 2,
    }
}

/// Applies a decision table. A list slot receives every matching result; any other slot
/// receives the first.
fn decide(decisions: &[Decision], coded: &CodedText, existing: Option<&Value>) -> Option<Value> {
    let mut results = decisions
        .iter()
        .filter(|d| {
            coded
                .field(d.field)
                .is_some_and(|v| v.eq_ignore_ascii_case(&d.matches))
        })
        .map(|d| Value::String(d.result.clone()))
        .peekable();

    results.peek()?;
    match existing {
        Some(Value::Array(items)) => {
            let mut list = items.clone();
            list.extend(results);
            Some(Value::Array(list))
        }
        _ => results.next(),
    }
}

fn extension_value(
    value_type: Option<ExtensionValueType>,
    coded: &CodedText,
    raw: Option<&str>,
) -> Option<ExtensionValue> {
    if let Some(value_type) = value_type {
        let text = raw?;
        return match value_type.convert(text) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(error = %err, "extension value rejected");
                None
            }
        };
    }
    if coded.system.is_some() || coded.code.is_some() {
        return Some(ExtensionValue::CodeableConcept(coded.clone()));
    }
    coded
        .display
        .clone()
        .or_else(|| raw.map(str::to_string))
        .map(ExtensionValue::String)
}
