//! FHIR STU3 type registry.
//!
//! Describes the resource types the transcoder can populate: which fields each type has,
//! what kind of element each field holds, and whether it repeats. Only the fields that
//! flat-file records are mapped onto are declared; unknown fields are rejected.

/// The kind of element a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    String,
    /// `dateTime`: a full timestamp, a naive timestamp or a date.
    DateTime,
    /// `code` restricted to the listed values.
    Code(&'static [&'static str]),
    CodeableConcept,
    Extension,
    /// A nested element described by the named [`TypeDef`].
    Backbone(&'static str),
}

impl ElementKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ElementKind::String => "string",
            ElementKind::DateTime => "dateTime",
            ElementKind::Code(_) => "code",
            ElementKind::CodeableConcept => "CodeableConcept",
            ElementKind::Extension => "Extension",
            ElementKind::Backbone(name) => *name,
        }
    }

    /// Whether an empty object is an acceptable placeholder for this kind.
    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            ElementKind::CodeableConcept | ElementKind::Extension | ElementKind::Backbone(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: ElementKind,
    pub repeated: bool,
}

impl FieldDef {
    const fn one(name: &'static str, kind: ElementKind) -> Self {
        Self {
            name,
            kind,
            repeated: false,
        }
    }

    const fn many(name: &'static str, kind: ElementKind) -> Self {
        Self {
            name,
            kind,
            repeated: true,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TypeDef {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

impl TypeDef {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// ============================================================================
// AllergyIntolerance
// ============================================================================

const ALLERGY_CLINICAL_STATUS: &[&str] = &["active", "inactive", "resolved"];
const ALLERGY_VERIFICATION_STATUS: &[&str] =
    &["unconfirmed", "confirmed", "refuted", "entered-in-error"];
const ALLERGY_TYPE: &[&str] = &["allergy", "intolerance"];
const ALLERGY_CATEGORY: &[&str] = &["food", "medication", "environment", "biologic"];
const ALLERGY_CRITICALITY: &[&str] = &["low", "high", "unable-to-assess"];
const REACTION_SEVERITY: &[&str] = &["mild", "moderate", "severe"];

pub static ALLERGY_INTOLERANCE: TypeDef = TypeDef {
    name: "AllergyIntolerance",
    fields: &[
        FieldDef::many("extension", ElementKind::Extension),
        FieldDef::one("clinicalStatus", ElementKind::Code(ALLERGY_CLINICAL_STATUS)),
        FieldDef::one(
            "verificationStatus",
            ElementKind::Code(ALLERGY_VERIFICATION_STATUS),
        ),
        FieldDef::one("type", ElementKind::Code(ALLERGY_TYPE)),
        FieldDef::many("category", ElementKind::Code(ALLERGY_CATEGORY)),
        FieldDef::one("criticality", ElementKind::Code(ALLERGY_CRITICALITY)),
        FieldDef::one("code", ElementKind::CodeableConcept),
        FieldDef::one("onsetDateTime", ElementKind::DateTime),
        FieldDef::one("assertedDate", ElementKind::DateTime),
        FieldDef::one("lastOccurrence", ElementKind::DateTime),
        FieldDef::many(
            "reaction",
            ElementKind::Backbone("AllergyIntolerance.reaction"),
        ),
    ],
};

pub static ALLERGY_INTOLERANCE_REACTION: TypeDef = TypeDef {
    name: "AllergyIntolerance.reaction",
    fields: &[
        FieldDef::many("extension", ElementKind::Extension),
        FieldDef::one("substance", ElementKind::CodeableConcept),
        FieldDef::many("manifestation", ElementKind::CodeableConcept),
        FieldDef::one("description", ElementKind::String),
        FieldDef::one("onset", ElementKind::DateTime),
        FieldDef::one("severity", ElementKind::Code(REACTION_SEVERITY)),
        FieldDef::one("exposureRoute", ElementKind::CodeableConcept),
    ],
};

// ============================================================================
// Condition
// ============================================================================

const CONDITION_CLINICAL_STATUS: &[&str] =
    &["active", "recurrence", "inactive", "remission", "resolved"];
const CONDITION_VERIFICATION_STATUS: &[&str] = &[
    "provisional",
    "differential",
    "confirmed",
    "refuted",
    "entered-in-error",
    "unknown",
];

pub static CONDITION: TypeDef = TypeDef {
    name: "Condition",
    fields: &[
        FieldDef::many("extension", ElementKind::Extension),
        FieldDef::one(
            "clinicalStatus",
            ElementKind::Code(CONDITION_CLINICAL_STATUS),
        ),
        FieldDef::one(
            "verificationStatus",
            ElementKind::Code(CONDITION_VERIFICATION_STATUS),
        ),
        FieldDef::many("category", ElementKind::CodeableConcept),
        FieldDef::one("severity", ElementKind::CodeableConcept),
        FieldDef::one("code", ElementKind::CodeableConcept),
        FieldDef::many("bodySite", ElementKind::CodeableConcept),
        FieldDef::one("onsetDateTime", ElementKind::DateTime),
        FieldDef::one("abatementDateTime", ElementKind::DateTime),
        FieldDef::one("assertedDate", ElementKind::DateTime),
    ],
};

static REGISTRY: &[&TypeDef] = &[
    &ALLERGY_INTOLERANCE,
    &ALLERGY_INTOLERANCE_REACTION,
    &CONDITION,
];

/// Looks up a type by name, e.g. `AllergyIntolerance` or `AllergyIntolerance.reaction`.
pub fn lookup(name: &str) -> Option<&'static TypeDef> {
    REGISTRY.iter().copied().find(|t| t.name == name)
}

/// Whether `name` is a resource type (as opposed to a nested backbone element).
pub fn is_resource_type(name: &str) -> bool {
    !name.contains('.') && lookup(name).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_resources_and_backbones() {
        assert_eq!(
            lookup("AllergyIntolerance").map(|t| t.name),
            Some("AllergyIntolerance")
        );
        assert!(lookup("AllergyIntolerance.reaction").is_some());
        assert!(lookup("Patient").is_none());
        assert!(is_resource_type("Condition"));
        assert!(!is_resource_type("AllergyIntolerance.reaction"));
    }

    #[test]
    fn every_backbone_is_registered() {
        for type_def in REGISTRY {
            for field in type_def.fields {
                if let ElementKind::Backbone(name) = field.kind {
                    assert!(lookup(name).is_some(), "{name} is not registered");
                }
            }
        }
    }
}
