//! FHIR to openEHR: the reverse direction.
//!
//! A bundle is dumped into a tree shaped like a parsed flat file:
//!
//! ```text
//! <composition>_rootnode
//!   <entry term>:0
//!     <resource term>:0
//!       criticality
//!         low
//!       reaction_event:0
//!         ...
//! ```
//!
//! Objects become branches, each array element becomes a `name:i` branch, and primitives
//! become a branch holding one leaf. Names and values pass through the adapter's term
//! dictionary. After dumping, [`prune`] lifts wrapper elements such as `text` so that their
//! value sits directly on the element they describe.

use std::collections::HashMap;

use openehr::flat_file::ROOT_SUFFIX;
use openehr::{NodeId, Tree};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::CoreResult;

/// Term dictionary, skip list and prune patterns for one resource family.
#[derive(Debug, Clone)]
pub struct ReverseAdapter {
    composition: &'static str,
    terms: &'static [(&'static str, &'static str)],
    skip: &'static [&'static str],
    prune: &'static [&'static str],
}

/// Key under which the entry group's term is looked up.
const ENTRY_TERM: &str = "Entry";

impl ReverseAdapter {
    pub fn allergy_intolerance() -> Self {
        Self {
            composition: "adverse_reaction_list",
            terms: &[
                (ENTRY_TERM, "allergies_and_adverse_reactions"),
                ("AllergyIntolerance", "adverse_reaction_risk"),
                ("reaction", "reaction_event"),
            ],
            skip: &["resourceType", "id"],
            prune: &[
                "valueCodeableConcept/text",
                "text",
                "valueString",
                "valueCode",
                "valueDateTime",
                "valueBoolean",
            ],
        }
    }

    pub fn composition(&self) -> &'static str {
        self.composition
    }

    fn term<'a>(&self, name: &'a str) -> &'a str {
        self.terms
            .iter()
            .find(|(from, _)| *from == name)
            .map_or(name, |(_, to)| *to)
    }

    fn skipped(&self, name: &str) -> bool {
        self.skip.iter().any(|skipped| *skipped == name)
    }

    /// Converts a bundle (or a bare resource) into a pruned tree.
    pub fn convert(&self, bundle_json: &str) -> CoreResult<Tree> {
        let resources = fhir::bundle::read_resources(bundle_json)?;

        let mut tree = Tree::new(&format!("{}{ROOT_SUFFIX}", self.composition));
        let root = tree.root();
        let entry = tree.add_branch(root, &format!("{}:0", self.term(ENTRY_TERM)))?;

        let mut occurrences: HashMap<String, usize> = HashMap::new();
        for resource in &resources {
            let resource_type = resource
                .get("resourceType")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let term = self.term(resource_type).to_string();
            let occurrence = occurrences.entry(term.clone()).or_default();

            let branch = tree.add_branch(entry, &format!("{term}:{occurrence}"))?;
            *occurrence += 1;

            if let Value::Object(fields) = resource {
                self.dump_fields(&mut tree, branch, fields)?;
            }
            let lifted = prune(&mut tree, branch, self.prune);
            tracing::debug!(resource = %term, lifted, "resource converted");
        }

        Ok(tree)
    }

    fn dump_fields(
        &self,
        tree: &mut Tree,
        parent: NodeId,
        fields: &Map<String, Value>,
    ) -> CoreResult<()> {
        for (name, value) in fields {
            if self.skipped(name) {
                continue;
            }
            let name = self.term(name);
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        let branch = tree.add_branch(parent, &format!("{name}:{index}"))?;
                        self.dump_value(tree, branch, item)?;
                    }
                }
                other => {
                    let branch = tree.add_branch(parent, name)?;
                    self.dump_value(tree, branch, other)?;
                }
            }
        }
        Ok(())
    }

    /// Fills an already created branch with `value`.
    fn dump_value(&self, tree: &mut Tree, branch: NodeId, value: &Value) -> CoreResult<()> {
        let text = match value {
            Value::Null | Value::Array(_) => return Ok(()),
            Value::Object(fields) => return self.dump_fields(tree, branch, fields),
            Value::String(text) => text.clone(),
            Value::Bool(flag) => flag.to_string(),
            Value::Number(number) => number.to_string(),
        };
        if !self.skipped(&text) {
            tree.add_leaf(branch, self.term(&text))?;
        }
        Ok(())
    }
}

/// One leaf selected for lifting, captured before the tree changes.
struct Lift {
    leaf: NodeId,
    chain_top: NodeId,
    anchor: NodeId,
    /// Identity of the anchor and each of its ancestors up to `under`, nearest first.
    lineage: Vec<Uuid>,
}

/// Lifts every leaf under `under` whose branch path ends with one of `patterns`.
///
/// The branches the pattern names are detached, and a leaf carrying the same value is added to
/// the branch they hung from. When several patterns match, the one with the most segments
/// wins. If an earlier lift already detached that branch, the leaf goes to its nearest
/// ancestor still in the tree. `under` must be reachable from the root.
///
/// Returns the number of leaves lifted.
pub fn prune(tree: &mut Tree, under: NodeId, patterns: &[&str]) -> usize {
    let patterns: Vec<Vec<&str>> = patterns.iter().map(|p| p.split('/').collect()).collect();

    let view: &Tree = tree;
    let lifts: Vec<Lift> = view
        .descendants(under)
        .into_iter()
        .filter(|id| view[*id].is_leaf())
        .filter_map(|leaf| plan_lift(view, under, leaf, &patterns))
        .collect();

    let mut lifted = 0;
    for lift in lifts {
        tree.remove(lift.anchor, lift.chain_top);

        let Some(target) = lift.lineage.iter().find_map(|id| tree.find_by_id(*id)) else {
            tracing::debug!(leaf = tree.name(lift.leaf), "no surviving ancestor to lift onto");
            continue;
        };
        let value = tree.name(lift.leaf).to_string();
        match tree.add_leaf(target, &value) {
            Ok(_) => lifted += 1,
            Err(err) => tracing::debug!(error = %err, "lift skipped"),
        }
    }
    lifted
}

fn plan_lift(tree: &Tree, under: NodeId, leaf: NodeId, patterns: &[Vec<&str>]) -> Option<Lift> {
    let branch = tree.parent(leaf)?;
    let path = tree.path_to_root(branch);
    let segments: Vec<&str> = path.split('/').collect();

    let depth = patterns
        .iter()
        .filter(|pattern| segments.ends_with(pattern))
        .map(Vec::len)
        .max()?;

    let mut chain_top = branch;
    for _ in 1..depth {
        chain_top = tree.parent(chain_top)?;
    }
    let anchor = tree.parent(chain_top)?;
    if chain_top == under || !(anchor == under || tree.ancestors(anchor).any(|a| a == under)) {
        return None;
    }

    let mut nearest_first = vec![anchor];
    if anchor != under {
        nearest_first.extend(tree.ancestors(anchor).take_while(|id| *id != under));
        nearest_first.push(under);
    }
    let lineage = nearest_first.into_iter().map(|id| tree[id].id()).collect();

    Some(Lift {
        leaf,
        chain_top,
        anchor,
        lineage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use openehr::flat_file;

    fn branch_path(tree: &mut Tree, path: &str) -> NodeId {
        let mut parent = tree.root();
        let mut prefix = String::new();
        for segment in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            parent = match tree.find_by_path(&prefix) {
                Some(existing) => existing,
                None => tree.add_branch(parent, segment).expect("add branch"),
            };
        }
        parent
    }

    fn leaf_at(tree: &mut Tree, path: &str, value: &str) {
        let branch = branch_path(tree, path);
        tree.add_leaf(branch, value).expect("add leaf");
    }

    #[test]
    fn lifts_wrapped_value_onto_described_element() {
        let mut tree = Tree::new("t_rootnode");
        leaf_at(&mut tree, "risk:0/code/text", "Penicillin");
        let root = tree.root();

        assert_eq!(prune(&mut tree, root, &["text"]), 1);
        assert!(tree.find_by_path("risk:0/code/text").is_none());
        let code = tree.find_by_path("risk:0/code").expect("code stays");
        assert_eq!(tree.leaf_value(code), Some("Penicillin"));
    }

    #[test]
    fn longest_pattern_wins() {
        let mut tree = Tree::new("t_rootnode");
        leaf_at(&mut tree, "risk:0/extension:0/valueCodeableConcept/text", "English");
        leaf_at(&mut tree, "risk:0/extension:0/url", "https://example.org/language");
        let root = tree.root();

        assert_eq!(
            prune(&mut tree, root, &["text", "valueCodeableConcept/text"]),
            1
        );
        let extension = tree.find_by_path("risk:0/extension:0").expect("extension");
        assert!(tree.find(extension, "valueCodeableConcept").is_none());
        assert_eq!(tree.leaf_value(extension), Some("English"));
        assert!(tree.find_by_path("risk:0/extension:0/url").is_some());
    }

    #[test]
    fn leaf_whose_anchor_was_detached_goes_to_nearest_survivor() {
        let mut tree = Tree::new("t_rootnode");
        leaf_at(&mut tree, "risk:0/note/text", "outer");
        leaf_at(&mut tree, "risk:0/note/text/detail/text", "inner");
        let root = tree.root();

        assert_eq!(prune(&mut tree, root, &["text"]), 2);
        let note = tree.find_by_path("risk:0/note").expect("note stays");
        let values: Vec<&str> = tree
            .children(note)
            .iter()
            .filter(|id| tree[**id].is_leaf())
            .map(|id| tree.name(*id))
            .collect();
        assert_eq!(values, ["outer", "inner"]);

        let detail = tree.find_by_path("risk:0/note/text/detail");
        assert!(detail.is_none());
        let risk = tree.find_by_path("risk:0").expect("risk");
        assert_eq!(tree.leaf_value(risk), None);
        assert_eq!(flat_file::serialise(&tree).matches("inner").count(), 1);
    }

    #[test]
    fn never_lifts_above_the_pruned_subtree() {
        let mut tree = Tree::new("t_rootnode");
        leaf_at(&mut tree, "text", "top");
        leaf_at(&mut tree, "risk:0/text", "kept");
        let risk = tree.find_by_path("risk:0").expect("risk");

        assert_eq!(prune(&mut tree, risk, &["text"]), 1);
        assert!(tree.find_by_path("text/top").is_some());
        assert_eq!(tree.leaf_value(risk), Some("kept"));
    }

    #[test]
    fn converts_bundle_into_flat_file_shape() {
        let bundle = r#"{
            "resourceType": "Bundle",
            "type": "collection",
            "entry": [
                {"resource": {
                    "resourceType": "AllergyIntolerance",
                    "id": "a1",
                    "criticality": "low",
                    "code": {"text": "Penicillin"},
                    "onsetDateTime": null,
                    "reaction": [{
                        "description": "Rash",
                        "manifestation": [{"text": "Hives"}],
                        "extension": [{"url": "https://example.org/witnessed", "valueBoolean": true}]
                    }]
                }},
                {"resource": {"resourceType": "AllergyIntolerance", "category": ["food"]}}
            ]
        }"#;

        let tree = ReverseAdapter::allergy_intolerance()
            .convert(bundle)
            .expect("bundle converts");
        assert_eq!(tree.name(tree.root()), "adverse_reaction_list_rootnode");

        let expected = [
            "{",
            r#"    "allergies_and_adverse_reactions:0/adverse_reaction_risk:0/criticality": "low","#,
            r#"    "allergies_and_adverse_reactions:0/adverse_reaction_risk:0/code": "Penicillin","#,
            r#"    "allergies_and_adverse_reactions:0/adverse_reaction_risk:0/reaction_event:0/description": "Rash","#,
            r#"    "allergies_and_adverse_reactions:0/adverse_reaction_risk:0/reaction_event:0/manifestation:0": "Hives","#,
            r#"    "allergies_and_adverse_reactions:0/adverse_reaction_risk:0/reaction_event:0/extension:0/url": "https://example.org/witnessed","#,
            r#"    "allergies_and_adverse_reactions:0/adverse_reaction_risk:0/reaction_event:0/extension:0": "true","#,
            r#"    "allergies_and_adverse_reactions:0/adverse_reaction_risk:1/category:0": "food""#,
            "}",
        ]
        .join("\n");
        assert_eq!(flat_file::serialise(&tree), expected);
    }

    #[test]
    fn bare_resource_and_bad_input() {
        let tree = ReverseAdapter::allergy_intolerance()
            .convert(r#"{"resourceType": "AllergyIntolerance", "criticality": "high"}"#)
            .expect("bare resource converts");
        assert!(tree
            .find_by_path("allergies_and_adverse_reactions:0/adverse_reaction_risk:0/criticality/high")
            .is_some());

        assert!(ReverseAdapter::allergy_intolerance().convert("not json").is_err());
    }
}
