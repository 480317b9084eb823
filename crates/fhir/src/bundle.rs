//! FHIR `Bundle` rendering and reading.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::resource::Resource;
use crate::{FhirError, FhirResult};

/// Output encodings for a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundleFormat {
    #[default]
    Json,
    Yaml,
}

impl BundleFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            BundleFormat::Json => "application/fhir+json",
            BundleFormat::Yaml => "application/yaml",
        }
    }
}

impl fmt::Display for BundleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleFormat::Json => f.write_str("json"),
            BundleFormat::Yaml => f.write_str("yaml"),
        }
    }
}

impl FromStr for BundleFormat {
    type Err = FhirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(BundleFormat::Json),
            "yaml" | "yml" => Ok(BundleFormat::Yaml),
            other => Err(FhirError::InvalidInput(format!("unknown format: {other}"))),
        }
    }
}

/// Wraps `resources` in a `collection` bundle.
pub fn collection<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> Value {
    let entries: Vec<Value> = resources
        .into_iter()
        .map(|resource| json!({ "resource": resource.to_json() }))
        .collect();
    json!({
        "resourceType": "Bundle",
        "id": Uuid::new_v4().to_string(),
        "type": "collection",
        "entry": entries,
    })
}

pub fn render(bundle: &Value, format: BundleFormat) -> FhirResult<String> {
    match format {
        BundleFormat::Json => Ok(serde_json::to_string_pretty(bundle)?),
        BundleFormat::Yaml => Ok(serde_yaml::to_string(bundle)?),
    }
}

/// Reads the resources out of a bundle. A bare resource is returned on its own.
pub fn read_resources(input: &str) -> FhirResult<Vec<Value>> {
    let value: Value = serde_json::from_str(input)?;
    let resource_type = value
        .get("resourceType")
        .and_then(Value::as_str)
        .ok_or_else(|| FhirError::InvalidInput("missing resourceType".to_string()))?;

    if resource_type != "Bundle" {
        return Ok(vec![value]);
    }

    let entries = match value.get("entry") {
        None => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(FhirError::InvalidInput(
                "bundle entry must be a list".to_string(),
            ))
        }
    };
    Ok(entries
        .iter()
        .filter_map(|entry| entry.get("resource").cloned())
        .collect())
}
