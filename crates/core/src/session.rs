//! Transcoding sessions.
//!
//! A [`Session`] is one run of one rule set over one parsed message. It owns the source tree,
//! the resources being populated, the set of source nodes already consumed and the number of
//! successful writes, which serves as the confidence score during adapter selection.
//!
//! Passes run in a fixed order regardless of rule declaration order:
//! 1. `Resource` rules instantiate the target resources.
//! 2. `List` rules allocate repeating target fields.
//! 3. `Attribute`, `Conditional` and `Extension` rules run in declaration order.

use std::collections::HashSet;
use std::sync::Arc;

use fhir::element_path::split_trailing_index;
use fhir::Resource;
use openehr::{NodeId, PathBinding, RuleKind, Tree};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::protocol;
use crate::rules::{MappingRule, RuleVariant};
use crate::CoreResult;

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    adapter: String,
    pub(crate) tree: Tree,
    pub(crate) rules: Arc<[MappingRule]>,
    pub(crate) resources: Vec<Resource>,
    pub(crate) consumed: HashSet<NodeId>,
    pub(crate) successes: usize,
}

/// Identity of one list element during allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ListElement {
    Node(NodeId),
    /// A grouped coded concept: every `field:N|part` sibling under the same parent.
    Group(NodeId, String),
}

impl Session {
    pub fn new(adapter: &str, tree: Tree, rules: Arc<[MappingRule]>) -> Self {
        Self {
            id: Uuid::new_v4(),
            adapter: adapter.to_string(),
            tree,
            rules,
            resources: Vec::new(),
            consumed: HashSet::new(),
            successes: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name of the adapter whose rules this session runs.
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Number of fields written so far.
    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn is_consumed(&self, node: NodeId) -> bool {
        self.consumed.contains(&node)
    }

    /// The populated resources as a `collection` bundle.
    pub fn bundle(&self) -> Value {
        fhir::bundle::collection(&self.resources)
    }

    /// Runs every pass.
    pub fn run(&mut self) -> CoreResult<()> {
        let rules = Arc::clone(&self.rules);

        for rule in rules.iter().filter(|r| r.kind() == RuleKind::Resource) {
            self.apply_resource(rule)?;
        }

        let mut allocated = HashSet::new();
        for rule in rules.iter().filter(|r| r.kind() == RuleKind::List) {
            self.apply_list(rule, &mut allocated);
        }

        self.run_value_passes()?;

        tracing::debug!(
            session = %self.id,
            adapter = %self.adapter,
            resources = self.resources.len(),
            successes = self.successes,
            "session complete"
        );
        Ok(())
    }

    /// Runs the `Attribute`, `Conditional` and `Extension` rules in declaration order.
    ///
    /// Consumed nodes are skipped, so running this again has no effect.
    pub fn run_value_passes(&mut self) -> CoreResult<()> {
        let rules = Arc::clone(&self.rules);
        for rule in rules.iter().filter(|r| {
            matches!(
                r.kind(),
                RuleKind::Attribute | RuleKind::Conditional | RuleKind::Extension
            )
        }) {
            self.apply_value(rule)?;
        }
        Ok(())
    }

    fn branches_matching(&self, rule: &MappingRule) -> Vec<NodeId> {
        self.tree
            .find_many(self.tree.root(), rule.search_term())
            .into_iter()
            .filter(|id| !self.tree[*id].is_leaf())
            .collect()
    }

    fn apply_resource(&mut self, rule: &MappingRule) -> CoreResult<()> {
        let RuleVariant::Resource { resource_type } = rule.variant() else {
            return Ok(());
        };
        let occurrences = self
            .branches_matching(rule)
            .into_iter()
            .filter(|id| self.tree[*id].list_index().is_some())
            .count();

        for _ in 0..occurrences {
            self.resources.push(Resource::new(resource_type)?);
        }
        tracing::debug!(
            session = %self.id,
            resource_type = %resource_type,
            occurrences,
            "resources instantiated"
        );
        Ok(())
    }

    /// Allocates one placeholder per distinct list element for every target list the rule
    /// reaches. Lists already allocated during this pass are left alone.
    fn apply_list(&mut self, rule: &MappingRule, allocated: &mut HashSet<(usize, String)>) {
        let rules = Arc::clone(&self.rules);
        let mut lists: Vec<(usize, String, HashSet<ListElement>)> = Vec::new();

        for node in self.branches_matching(rule) {
            if self.consumed.contains(&node) {
                continue;
            }
            let Some(resource) = self.tree.parent_resource_index(node, &rules[..]) else {
                continue;
            };
            let path = self.tree.inner_net_path(node, &rules[..]);
            let Some((route, _)) = split_trailing_index(&path) else {
                tracing::debug!(path = %path, "list node does not translate to a list element");
                continue;
            };

            let element = self.list_element(node);
            match lists
                .iter_mut()
                .find(|(r, p, _)| *r == resource && p == route)
            {
                Some((_, _, elements)) => {
                    elements.insert(element);
                }
                None => lists.push((resource, route.to_string(), HashSet::from([element]))),
            }
        }

        for (resource, route, elements) in lists {
            if !allocated.insert((resource, route.clone())) {
                continue;
            }
            let Some(target) = self.resources.get_mut(resource) else {
                continue;
            };
            let placeholders = vec![Value::Object(Map::new()); elements.len()];
            if let Err(err) = target.set(&route, Value::Array(placeholders)) {
                tracing::debug!(route = %route, error = %err, "list allocation skipped");
            }
        }
    }

    fn list_element(&self, node: NodeId) -> ListElement {
        let name = self.tree.name(node);
        match (name.split_once('|'), self.tree.parent(node)) {
            (Some((group, _)), Some(parent)) if self.tree[node].list_index().is_some() => {
                ListElement::Group(parent, group.to_string())
            }
            _ => ListElement::Node(node),
        }
    }

    fn apply_value(&mut self, rule: &MappingRule) -> CoreResult<()> {
        let rules = Arc::clone(&self.rules);

        for node in self.branches_matching(rule) {
            if self.consumed.contains(&node) {
                continue;
            }
            let Some(resource) = self.tree.parent_resource_index(node, &rules[..]) else {
                continue;
            };
            if resource >= self.resources.len() {
                tracing::debug!(resource, "no resource for occurrence");
                continue;
            }

            let slot = protocol::get_target_value(self, resource, node)?;
            let value = protocol::construct_new_target_value(self, node, rule, slot.current());
            self.consumed.insert(node);

            match value {
                Some(value) => {
                    protocol::set_target_value(self, resource, node, value, &slot);
                }
                None => tracing::debug!(
                    node = %self.tree.path_to_root(node),
                    "no value constructed"
                ),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openehr::flat_file;

    fn run(rules: Vec<MappingRule>, message: &str) -> Session {
        let mut session = Session::new("test", flat_file::parse("record", message), rules.into());
        session.run().expect("session runs");
        session
    }

    #[test]
    fn passes_run_in_fixed_order_regardless_of_declaration() {
        let rules = vec![
            MappingRule::attribute("comment", "reaction[].description"),
            MappingRule::list("event", "reaction"),
            MappingRule::resource("risk", "AllergyIntolerance").expect("resource rule"),
        ];
        let session = run(
            rules,
            "\"record/risk:0/event:0/comment\": \"first\",\n\
             \"record/risk:0/event:1/comment\": \"second\"",
        );

        let resource = session.resources()[0].to_json();
        assert_eq!(resource["reaction"][0]["description"], "first");
        assert_eq!(resource["reaction"][1]["description"], "second");
        assert_eq!(session.successes(), 2);
    }

    #[test]
    fn one_resource_per_occurrence_in_discovery_order() {
        let rules = vec![
            MappingRule::resource("risk", "AllergyIntolerance").expect("resource rule"),
            MappingRule::attribute("seen", "lastOccurrence"),
        ];
        let session = run(
            rules,
            "\"record/risk:0/seen\": \"2020-01-01\",\n\
             \"record/risk:1/seen\": \"2021-01-01\",\n\
             \"record/risk:2/seen\": \"2022-01-01\",\n\
             \"record/seen\": \"2023-01-01\"",
        );

        assert_eq!(session.resources().len(), 3);
        for (index, year) in ["2020", "2021", "2022"].iter().enumerate() {
            assert_eq!(
                session.resources()[index].to_json()["lastOccurrence"],
                format!("{year}-01-01")
            );
        }
        let outside = session.tree().find_by_path("record/seen").expect("node");
        assert!(!session.is_consumed(outside));
        assert_eq!(session.successes(), 3);
    }

    #[test]
    fn list_allocated_once_per_target() {
        let rules = vec![
            MappingRule::resource("risk", "AllergyIntolerance").expect("resource rule"),
            MappingRule::list("event", "reaction"),
            MappingRule::list("episode", "reaction"),
        ];
        let session = run(
            rules,
            "\"record/risk:0/event:0/x\": \"a\",\n\
             \"record/risk:0/event:1/x\": \"b\",\n\
             \"record/risk:0/episode:0/x\": \"c\"",
        );

        assert_eq!(session.resources()[0].len_at("reaction").expect("list"), 2);
        assert_eq!(session.successes(), 0);
    }

    #[test]
    fn list_length_counts_elements_not_highest_index() {
        let rules = vec![
            MappingRule::resource("risk", "AllergyIntolerance").expect("resource rule"),
            MappingRule::list("event", "reaction"),
            MappingRule::attribute("comment", "reaction[].description"),
        ];
        let session = run(rules, "\"record/risk:0/event:1/comment\": \"late\"");

        let resource = session.resources()[0].to_json();
        assert_eq!(resource["reaction"], serde_json::json!([{}]));
        assert_eq!(session.successes(), 0);
        let comment = session
            .tree()
            .find_by_path("record/risk:0/event:1/comment")
            .expect("node");
        assert!(session.is_consumed(comment));
    }

    #[test]
    fn grouped_list_elements_count_once_per_group() {
        let rules = vec![
            MappingRule::resource("risk", "AllergyIntolerance").expect("resource rule"),
            MappingRule::list("event", "reaction"),
            MappingRule::list("manifestation", "reaction[].manifestation")
                .with_pattern(r"manifestation:\d")
                .expect("pattern"),
        ];
        let mut lines = Vec::new();
        for group in 0..4 {
            for part in ["code", "terminology", "value"] {
                lines.push(format!(
                    "\"record/risk:0/event:0/manifestation:{group}|{part}\": \"{part}{group}\","
                ));
            }
        }
        let session = run(rules, &lines.join("\n"));

        assert_eq!(
            session.resources()[0]
                .len_at("reaction[0].manifestation")
                .expect("list"),
            4
        );
    }

    #[test]
    fn unknown_target_field_is_soft() {
        let rules = vec![
            MappingRule::resource("risk", "AllergyIntolerance").expect("resource rule"),
            MappingRule::attribute("mystery", "noSuchField"),
            MappingRule::attribute("seen", "lastOccurrence"),
        ];
        let session = run(
            rules,
            "\"record/risk:0/mystery\": \"?\",\n\"record/risk:0/seen\": \"2020-01-01\"",
        );
        assert_eq!(session.successes(), 1);
        let bundle = session.bundle();
        assert_eq!(bundle["entry"][0]["resource"]["lastOccurrence"], "2020-01-01");
        assert!(bundle["entry"][0]["resource"].get("noSuchField").is_none());
    }
}
