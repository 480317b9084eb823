//! NWIS adverse reaction list to `AllergyIntolerance`.

use ferry_types::CodeField;
use fhir::ExtensionValueType;

use super::Adapter;
use crate::config::CoreConfig;
use crate::rules::{Decision, MappingRule};
use crate::CoreResult;

pub const NAME: &str = "NwisAdverseReactionList";

pub fn adapter(config: &CoreConfig) -> CoreResult<Adapter> {
    let base = config.extension_base_url();

    let rules = vec![
        // ====================================================================
        // Resources
        // ====================================================================
        MappingRule::resource("adverse_reaction_risk", "AllergyIntolerance")?,
        // ====================================================================
        // Lists
        // ====================================================================
        MappingRule::list("reaction_event", "reaction").with_pattern(r"reaction_event:\d")?,
        MappingRule::list("manifestation", "manifestation").with_pattern(r"manifestation:\d")?,
        // ====================================================================
        // Attributes
        // ====================================================================
        MappingRule::attribute("manifestation", "manifestation")
            .with_pattern(r"manifestation:\d+\|+")?,
        MappingRule::attribute("manifestation", "manifestation")
            .with_pattern(r"manifestation:\d+")?,
        // `substance\|+` also matches these, so this rule has to come first.
        MappingRule::attribute("specific_substance", "code")
            .with_pattern(r"specific_substance\|+")?,
        MappingRule::attribute("substance", "reaction[].substance").with_pattern(r"substance\|+")?,
        MappingRule::attribute("route_of_exposure", "reaction[].exposureRoute"),
        MappingRule::attribute("onset_of_last_reaction", "lastOccurrence"),
        MappingRule::attribute("onset_of_reaction", "lastOccurrence"),
        MappingRule::attribute("reaction_comment", "reaction[].description"),
        // ====================================================================
        // Conditionals
        // ====================================================================
        MappingRule::conditional(
            "criticality",
            "criticality",
            vec![
                Decision::new(CodeField::Code, "at0102", "low"),
                Decision::new(CodeField::Code, "at0103", "high"),
                Decision::new(CodeField::Code, "at0124", "unable-to-assess"),
            ],
        )
        .with_pattern(r"criticality\|+")?,
        MappingRule::conditional(
            "reaction_mechanism",
            "type",
            vec![
                Decision::new(CodeField::Code, "at0059", "allergy"),
                Decision::new(CodeField::Code, "at0060", "intolerance"),
            ],
        )
        .with_pattern(r"reaction_mechanism\|+")?,
        MappingRule::conditional(
            "category",
            "category",
            vec![
                Decision::new(CodeField::Value, "biologic", "biologic"),
                Decision::new(CodeField::Value, "medication", "medication"),
                Decision::new(CodeField::Value, "other", "environment"),
                Decision::new(CodeField::Value, "food", "food"),
            ],
        )
        .with_pattern(r"category\|+")?,
        // ====================================================================
        // Extensions
        // ====================================================================
        MappingRule::extension("encoding", base).with_pattern(r"encoding\|+")?,
        MappingRule::extension("last_updated", base).with_value_type(ExtensionValueType::DateTime),
        MappingRule::extension("language", base).with_pattern(r"language\|+")?,
        MappingRule::extension("witnessed_by_clinician", base)
            .on("reaction[]")
            .with_value_type(ExtensionValueType::Boolean),
    ];

    Ok(Adapter::new(NAME, rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RECORD: &str = r#"{
    "adverse_reaction_list/language|code": "en",
    "adverse_reaction_list/language|terminology": "ISO_639-1",
    "adverse_reaction_list/adverse_reaction_risk:0/specific_substance|code": "91936005",
    "adverse_reaction_list/adverse_reaction_risk:0/specific_substance|value": "Penicillin",
    "adverse_reaction_list/adverse_reaction_risk:0/specific_substance|terminology": "SNOMED-CT",
    "adverse_reaction_list/adverse_reaction_risk:0/criticality|code": "at0102",
    "adverse_reaction_list/adverse_reaction_risk:0/criticality|value": "Low",
    "adverse_reaction_list/adverse_reaction_risk:0/criticality|terminology": "local",
    "adverse_reaction_list/adverse_reaction_risk:0/category|value": "Medication",
    "adverse_reaction_list/adverse_reaction_risk:0/reaction_mechanism|code": "at0059",
    "adverse_reaction_list/adverse_reaction_risk:0/language|code": "en",
    "adverse_reaction_list/adverse_reaction_risk:0/language|terminology": "ISO_639-1",
    "adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/manifestation:0|code": "271807003",
    "adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/manifestation:0|value": "Rash",
    "adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/manifestation:0|terminology": "SNOMED-CT",
    "adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/manifestation:1|terminology": "SNOMED-CT",
    "adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/manifestation:1|value": "Hives",
    "adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/manifestation:1|code": "247472004",
    "adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/reaction_comment": "Started within the hour",
    "adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/witnessed_by_clinician": "true",
    "adverse_reaction_list/adverse_reaction_risk:0/onset_of_last_reaction": "2019-03-01T09:00:00Z",
    "adverse_reaction_list/adverse_reaction_risk:1/specific_substance|value": "Latex",
    "adverse_reaction_list/adverse_reaction_risk:1/criticality|code": "at0103"
}"#;

    fn adverse_reactions() -> Adapter {
        adapter(&CoreConfig::default()).expect("rule table builds")
    }

    fn snomed(code: &str, display: &str) -> serde_json::Value {
        json!({
            "coding": [{"system": "SNOMED-CT", "code": code, "display": display}],
            "text": display
        })
    }

    #[test]
    fn minimal_criticality_record() {
        let session = adverse_reactions()
            .transcode(r#""adverse_reaction_list/adverse_reaction_risk:0/criticality|code": "at0102""#)
            .expect("session runs");

        assert_eq!(session.resources().len(), 1);
        assert_eq!(session.resources()[0].to_json()["criticality"], "low");
        assert_eq!(session.successes(), 1);
    }

    #[test]
    fn full_record() {
        let session = adverse_reactions().transcode(RECORD).expect("session runs");
        assert_eq!(session.resources().len(), 2);

        let first = session.resources()[0].to_json();
        assert_eq!(first["resourceType"], "AllergyIntolerance");
        assert_eq!(first["code"], snomed("91936005", "Penicillin"));
        assert_eq!(first["criticality"], "low");
        assert_eq!(first["type"], "allergy");
        assert_eq!(first["category"], json!(["medication"]));
        assert_eq!(first["lastOccurrence"], "2019-03-01T09:00:00Z");
        assert_eq!(
            first["extension"],
            json!([{
                "url": "https://nwis.structure-definitions.nhs.uk/StructureDefinition/language",
                "valueCodeableConcept": {"coding": [{"system": "ISO_639-1", "code": "en"}]}
            }])
        );

        let reaction = &first["reaction"][0];
        assert_eq!(
            reaction["manifestation"],
            json!([snomed("271807003", "Rash"), snomed("247472004", "Hives")])
        );
        assert_eq!(reaction["description"], "Started within the hour");
        assert_eq!(
            reaction["extension"],
            json!([{
                "url": "https://nwis.structure-definitions.nhs.uk/StructureDefinition/witnessed_by_clinician",
                "valueBoolean": true
            }])
        );

        let second = session.resources()[1].to_json();
        assert_eq!(second["code"], json!({"text": "Latex"}));
        assert_eq!(second["criticality"], "high");
        assert!(second.get("reaction").is_none());

        assert_eq!(session.successes(), 12);
    }

    #[test]
    fn value_passes_are_idempotent() {
        let mut session = adverse_reactions().transcode(RECORD).expect("session runs");
        let successes = session.successes();
        let before = session.resources()[0].to_json();

        session.run_value_passes().expect("second run");

        assert_eq!(session.successes(), successes);
        assert_eq!(session.resources()[0].to_json(), before);
        assert_eq!(
            session.resources()[0].to_json()["extension"]
                .as_array()
                .map(Vec::len),
            Some(1)
        );
    }

    #[test]
    fn ungrouped_list_elements_each_get_a_slot() {
        let record = r#"
"adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/manifestation:0": "Rash",
"adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/manifestation:1": "Hives",
"adverse_reaction_list/adverse_reaction_risk:0/reaction_event:0/manifestation:2": "Wheeze",
"adverse_reaction_list/adverse_reaction_risk:0/reaction_event:1/manifestation:0|value": "Nausea",
"adverse_reaction_list/adverse_reaction_risk:0/reaction_event:1/manifestation:0|code": "422587007"
"#;
        let session = adverse_reactions().transcode(record).expect("session runs");
        let resource = &session.resources()[0];

        assert_eq!(resource.len_at("reaction").expect("list"), 2);
        assert_eq!(resource.len_at("reaction[0].manifestation").expect("list"), 3);
        assert_eq!(resource.len_at("reaction[1].manifestation").expect("list"), 1);
        assert_eq!(
            resource.to_json()["reaction"][0]["manifestation"][2],
            json!({"text": "Wheeze"})
        );
        assert_eq!(session.successes(), 4);
    }

    #[test]
    fn records_outside_a_risk_are_ignored() {
        let session = adverse_reactions()
            .transcode(r#""adverse_reaction_list/language|code": "en""#)
            .expect("session runs");
        assert!(session.resources().is_empty());
        assert_eq!(session.successes(), 0);
    }

    #[test]
    fn unmatched_decision_leaves_field_absent() {
        let session = adverse_reactions()
            .transcode(r#""adverse_reaction_list/adverse_reaction_risk:0/criticality|code": "at9999""#)
            .expect("session runs");
        assert!(session.resources()[0].to_json().get("criticality").is_none());
        assert_eq!(session.successes(), 0);
    }
}
