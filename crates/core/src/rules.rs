//! Mapping rules.
//!
//! A rule binds a flat-file field (by exact key, or by pattern when one is given) to a FHIR
//! element path template. The five variants differ in what they do with matching nodes:
//!
//! - `Resource`: one target resource per occurrence of the field.
//! - `List`: allocates the elements of a repeating target field.
//! - `Attribute`: copies a scalar or coded value.
//! - `Conditional`: looks the value up in a decision table.
//! - `Extension`: appends an extension keyed by a URL derived from the field name.

use ferry_types::CodeField;
use fhir::{schema, ExtensionValueType};
use openehr::{PathBinding, RuleKind};
use regex::Regex;

use crate::error::MappingError;
use crate::CoreResult;

/// One row of a conditional decision table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Which part of the coded value is compared.
    pub field: CodeField,
    /// Compared case-insensitively.
    pub matches: String,
    pub result: String,
}

impl Decision {
    pub fn new(field: CodeField, matches: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            field,
            matches: matches.into(),
            result: result.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleVariant {
    Resource {
        resource_type: String,
    },
    List,
    Attribute,
    Conditional {
        decisions: Vec<Decision>,
    },
    Extension {
        url: String,
        value_type: Option<ExtensionValueType>,
    },
}

#[derive(Debug, Clone)]
pub struct MappingRule {
    source_key: String,
    pattern: Option<Regex>,
    target: String,
    variant: RuleVariant,
}

/// `{base_url}/{key}` with `|` and `:` removed from the key.
pub fn extension_url(base_url: &str, key: &str) -> String {
    let ender: String = key.chars().filter(|c| !matches!(c, '|' | ':')).collect();
    format!("{base_url}/{ender}")
}

impl MappingRule {
    fn new(source_key: &str, target: &str, variant: RuleVariant) -> Self {
        Self {
            source_key: source_key.to_string(),
            pattern: None,
            target: target.to_string(),
            variant,
        }
    }

    /// One `resource_type` resource per occurrence of `source_key:N`.
    pub fn resource(source_key: &str, resource_type: &str) -> CoreResult<Self> {
        if !schema::is_resource_type(resource_type) {
            return Err(MappingError::UnknownResourceType(resource_type.to_string()).into());
        }
        Ok(Self::new(
            source_key,
            resource_type,
            RuleVariant::Resource {
                resource_type: resource_type.to_string(),
            },
        ))
    }

    pub fn list(source_key: &str, target: &str) -> Self {
        Self::new(source_key, target, RuleVariant::List)
    }

    pub fn attribute(source_key: &str, target: &str) -> Self {
        Self::new(source_key, target, RuleVariant::Attribute)
    }

    pub fn conditional(source_key: &str, target: &str, decisions: Vec<Decision>) -> Self {
        Self::new(source_key, target, RuleVariant::Conditional { decisions })
    }

    /// An extension on the element holding the field. See [`MappingRule::on`] to place it
    /// elsewhere.
    pub fn extension(source_key: &str, base_url: &str) -> Self {
        Self::new(
            source_key,
            "",
            RuleVariant::Extension {
                url: extension_url(base_url, source_key),
                value_type: None,
            },
        )
    }

    /// Matches nodes by `pattern` instead of by key.
    pub fn with_pattern(mut self, pattern: &str) -> CoreResult<Self> {
        let compiled = Regex::new(pattern).map_err(|source| MappingError::InvalidPattern {
            key: self.source_key.clone(),
            source,
        })?;
        self.pattern = Some(compiled);
        Ok(self)
    }

    /// Places an extension on the element at `target` (e.g. `reaction[]`).
    pub fn on(mut self, target: &str) -> Self {
        self.target = target.to_string();
        self
    }

    /// Forces the `value[x]` type of an extension. Ignored by the other variants.
    pub fn with_value_type(mut self, value_type: ExtensionValueType) -> Self {
        if let RuleVariant::Extension { value_type: slot, .. } = &mut self.variant {
            *slot = Some(value_type);
        }
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn variant(&self) -> &RuleVariant {
        &self.variant
    }
}

impl PathBinding for MappingRule {
    fn source_key(&self) -> &str {
        &self.source_key
    }

    fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    fn kind(&self) -> RuleKind {
        match self.variant {
            RuleVariant::Resource { .. } => RuleKind::Resource,
            RuleVariant::List => RuleKind::List,
            RuleVariant::Attribute => RuleKind::Attribute,
            RuleVariant::Conditional { .. } => RuleKind::Conditional,
            RuleVariant::Extension { .. } => RuleKind::Extension,
        }
    }

    fn target_template(&self) -> &str {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;

    #[test]
    fn extension_url_strips_separators() {
        assert_eq!(
            extension_url("https://example.org/sd", "encoding|code:0"),
            "https://example.org/sd/encodingcode0"
        );
    }

    #[test]
    fn resource_rule_requires_registered_type() {
        let rule = MappingRule::resource("adverse_reaction_risk", "AllergyIntolerance")
            .expect("registered");
        assert_eq!(rule.kind(), RuleKind::Resource);
        assert!(matches!(
            MappingRule::resource("x", "Observation"),
            Err(CoreError::Mapping(MappingError::UnknownResourceType(t))) if t == "Observation"
        ));
    }

    #[test]
    fn invalid_pattern_is_reported_with_key() {
        let err = MappingRule::attribute("substance", "reaction[].substance")
            .with_pattern("substance(")
            .expect_err("unbalanced group");
        assert!(matches!(
            err,
            CoreError::Mapping(MappingError::InvalidPattern { key, .. }) if key == "substance"
        ));
    }

    #[test]
    fn value_type_only_applies_to_extensions() {
        let ext = MappingRule::extension("witnessed_by_clinician", "https://example.org")
            .with_value_type(ExtensionValueType::Boolean);
        assert!(matches!(
            ext.variant(),
            RuleVariant::Extension {
                value_type: Some(ExtensionValueType::Boolean),
                ..
            }
        ));

        let attr = MappingRule::attribute("reaction_comment", "reaction[].description")
            .with_value_type(ExtensionValueType::Boolean);
        assert_eq!(attr.variant(), &RuleVariant::Attribute);
    }
}
