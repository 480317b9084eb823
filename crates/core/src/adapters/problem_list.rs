//! NWIS problem list to `Condition`.

use ferry_types::CodeField;
use fhir::ExtensionValueType;

use super::Adapter;
use crate::config::CoreConfig;
use crate::rules::{Decision, MappingRule};
use crate::CoreResult;

pub const NAME: &str = "NwisProblemList";

pub fn adapter(config: &CoreConfig) -> CoreResult<Adapter> {
    let base = config.extension_base_url();

    let rules = vec![
        MappingRule::resource("problem_diagnosis", "Condition")?,
        MappingRule::list("body_site", "bodySite").with_pattern(r"body_site:\d")?,
        MappingRule::attribute("body_site", "bodySite").with_pattern(r"body_site:\d+\|+")?,
        MappingRule::attribute("body_site", "bodySite").with_pattern(r"body_site:\d+")?,
        MappingRule::attribute("problem_diagnosis_name", "code")
            .with_pattern(r"problem_diagnosis_name\|+")?,
        MappingRule::attribute("severity", "severity").with_pattern(r"severity\|+")?,
        MappingRule::attribute("date_time_of_onset", "onsetDateTime"),
        MappingRule::attribute("date_time_of_resolution", "abatementDateTime"),
        MappingRule::attribute("date_clinically_recognised", "assertedDate"),
        MappingRule::conditional(
            "active_inactive",
            "clinicalStatus",
            vec![
                Decision::new(CodeField::Value, "active", "active"),
                Decision::new(CodeField::Value, "inactive", "inactive"),
                Decision::new(CodeField::Value, "resolved", "resolved"),
            ],
        )
        .with_pattern(r"active_inactive\|+")?,
        MappingRule::conditional(
            "diagnostic_certainty",
            "verificationStatus",
            vec![
                Decision::new(CodeField::Code, "at0074", "provisional"),
                Decision::new(CodeField::Code, "at0075", "provisional"),
                Decision::new(CodeField::Code, "at0076", "confirmed"),
            ],
        )
        .with_pattern(r"diagnostic_certainty\|+")?,
        MappingRule::extension("encoding", base).with_pattern(r"encoding\|+")?,
        MappingRule::extension("last_updated", base).with_value_type(ExtensionValueType::DateTime),
        MappingRule::extension("language", base).with_pattern(r"language\|+")?,
    ];

    Ok(Adapter::new(NAME, rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn problem_with_body_sites() {
        let record = r#"{
    "problem_list/problem_diagnosis:0/problem_diagnosis_name|code": "195967001",
    "problem_list/problem_diagnosis:0/problem_diagnosis_name|value": "Asthma",
    "problem_list/problem_diagnosis:0/problem_diagnosis_name|terminology": "SNOMED-CT",
    "problem_list/problem_diagnosis:0/body_site:0": "Lung",
    "problem_list/problem_diagnosis:0/body_site:1": "Bronchus",
    "problem_list/problem_diagnosis:0/date_time_of_onset": "2004-06-11",
    "problem_list/problem_diagnosis:0/diagnostic_certainty|code": "at0076",
    "problem_list/problem_diagnosis:0/active_inactive|value": "Active",
    "problem_list/problem_diagnosis:0/last_updated": "2020-01-02T03:04:05Z"
}"#;
        let session = adapter(&CoreConfig::default())
            .expect("rule table builds")
            .transcode(record)
            .expect("session runs");

        let condition = session.resources()[0].to_json();
        assert_eq!(condition["resourceType"], "Condition");
        assert_eq!(condition["code"]["text"], "Asthma");
        assert_eq!(
            condition["bodySite"],
            json!([{"text": "Lung"}, {"text": "Bronchus"}])
        );
        assert_eq!(condition["onsetDateTime"], "2004-06-11");
        assert_eq!(condition["verificationStatus"], "confirmed");
        assert_eq!(condition["clinicalStatus"], "active");
        assert_eq!(
            condition["extension"],
            json!([{
                "url": "https://nwis.structure-definitions.nhs.uk/StructureDefinition/last_updated",
                "valueDateTime": "2020-01-02T03:04:05Z"
            }])
        );
        assert_eq!(session.successes(), 7);
    }
}
