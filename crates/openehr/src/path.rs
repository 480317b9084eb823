//! Path algebra: translating record paths into target-side paths.
//!
//! A record path such as `list/risk:1/reaction_event:0/substance|code` is translated, with the
//! help of a set of [`PathBinding`]s, into a dotted target path such as
//! `resources[1].reaction[0].substance`.
//!
//! Responsibilities:
//! - Define the [`PathBinding`] seam through which mapping rules take part in translation.
//! - Match nodes against bindings ([`SearchTerm`]).
//! - Produce full (`net_path`) and resource-relative (`inner_net_path`) target paths.
//! - Locate the resource occurrence enclosing a node.

use regex::Regex;

use crate::tree::{Node, NodeId, Tree};

/// Token used for the collection of target resources.
pub const RESOURCE_COLLECTION: &str = "resources";

/// Token used for the extension list of a target element.
pub const EXTENSION_COLLECTION: &str = "extension";

/// The five behaviours a binding can have during translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Resource,
    List,
    Attribute,
    Conditional,
    Extension,
}

/// A binding between a record field and a target path template.
///
/// Templates are dotted paths that may contain `[]` placeholders for enclosing repeating
/// groups, for example `reaction[].manifestation`.
pub trait PathBinding {
    fn source_key(&self) -> &str;

    fn pattern(&self) -> Option<&Regex>;

    fn kind(&self) -> RuleKind;

    fn target_template(&self) -> &str;

    fn search_term(&self) -> SearchTerm<'_> {
        SearchTerm::Binding {
            key: self.source_key(),
            pattern: self.pattern(),
        }
    }
}

/// What [`Tree::find_many`] looks for.
#[derive(Debug, Clone, Copy)]
pub enum SearchTerm<'a> {
    /// A name, compared with and without its list suffix.
    Text(&'a str),
    /// A binding: its pattern when present, its key otherwise.
    Binding {
        key: &'a str,
        pattern: Option<&'a Regex>,
    },
}

impl SearchTerm<'_> {
    pub(crate) fn matches(&self, node: &Node) -> bool {
        let key = match self {
            SearchTerm::Binding {
                pattern: Some(re), ..
            } => return re.is_match(node.name()),
            SearchTerm::Binding { key, pattern: None } => key,
            SearchTerm::Text(text) => text,
        };
        if node.name() == *key {
            return true;
        }
        !node.is_leaf() && strip_list_suffix(node.name()) == *key
    }
}

fn strip_list_suffix(name: &str) -> &str {
    name.split(':').next().unwrap_or(name)
}

/// Splits `field:N` or `field:N|sub` into `field` and the raw `N`.
fn split_indexed(segment: &str) -> Option<(&str, &str)> {
    let (field, rest) = segment.split_once(':')?;
    let index = rest.split_once('|').map_or(rest, |(index, _)| index);
    Some((field, index))
}

fn binding_for_field<'b, B: PathBinding>(bindings: &'b [B], field: &str) -> Option<&'b B> {
    bindings.iter().find(|b| b.source_key() == field)
}

fn binding_for_segment<'b, B: PathBinding>(bindings: &'b [B], segment: &str) -> Option<&'b B> {
    bindings.iter().find(|b| {
        b.source_key() == segment || b.pattern().is_some_and(|re| re.is_match(segment))
    })
}

/// Appends `field` to `out`, dropping leading segments of `field` that `out` already ends with.
fn append_deduplicated(out: &mut String, field: &str) {
    let rest = {
        let existing: Vec<&str> = out.split('.').filter(|s| !s.is_empty()).collect();
        let incoming: Vec<&str> = field.split('.').collect();
        let overlap = (1..=incoming.len().min(existing.len()))
            .rev()
            .find(|k| existing[existing.len() - k..] == incoming[..*k])
            .unwrap_or(0);
        incoming[overlap..].join(".")
    };
    out.push_str(&rest);
}

impl Tree {
    /// Target path of `node`, prefixed with its resource occurrence (`resources[K].`).
    pub fn net_path<B: PathBinding>(&self, node: NodeId, bindings: &[B]) -> String {
        self.translate(node, bindings, true)
    }

    /// Target path of `node` relative to the resource occurrence that encloses it.
    pub fn inner_net_path<B: PathBinding>(&self, node: NodeId, bindings: &[B]) -> String {
        self.translate(node, bindings, false)
    }

    /// Index of the resource occurrence enclosing `node`, if any.
    pub fn parent_resource_index<B: PathBinding>(
        &self,
        node: NodeId,
        bindings: &[B],
    ) -> Option<usize> {
        let node = self.as_branch(node)?;
        self.chain(node).into_iter().find_map(|id| {
            let (field, index) = split_indexed(self.name(id))?;
            let binding = binding_for_field(bindings, field)?;
            if binding.kind() != RuleKind::Resource {
                return None;
            }
            index.parse().ok()
        })
    }

    /// Whether `node` is itself an occurrence of a resource-bound group.
    pub fn is_resource_occurrence<B: PathBinding>(&self, node: NodeId, bindings: &[B]) -> bool {
        split_indexed(self.name(node))
            .and_then(|(field, _)| binding_for_field(bindings, field))
            .is_some_and(|b| b.kind() == RuleKind::Resource)
    }

    /// Leaves translate as the branch holding them.
    fn as_branch(&self, node: NodeId) -> Option<NodeId> {
        if self[node].is_leaf() {
            self.parent(node)
        } else {
            Some(node)
        }
    }

    /// Nodes from just below the root down to `node`.
    fn chain(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain: Vec<NodeId> = std::iter::once(node)
            .chain(self.ancestors(node))
            .filter(|id| *id != self.root())
            .collect();
        chain.reverse();
        chain
    }

    fn translate<B: PathBinding>(
        &self,
        node: NodeId,
        bindings: &[B],
        include_resource: bool,
    ) -> String {
        let Some(node) = self.as_branch(node) else {
            return String::new();
        };
        if node == self.root() {
            return String::new();
        }

        let chain = self.chain(node);
        let last = chain.len() - 1;
        let mut out = String::new();

        for (position, id) in chain.iter().enumerate() {
            let segment = self.name(*id);

            if let Some((field, index)) = split_indexed(segment) {
                let Some(binding) = binding_for_field(bindings, field) else {
                    continue;
                };
                match binding.kind() {
                    RuleKind::Resource if !include_resource => continue,
                    RuleKind::Resource => {
                        out.push_str(&format!("{RESOURCE_COLLECTION}[{index}]"));
                    }
                    _ => {
                        let start = self.parent(*id);
                        let template = match start {
                            Some(start) => {
                                self.fill_placeholders(start, binding.target_template(), bindings)
                            }
                            None => binding.target_template().replace("[]", "[0]"),
                        };
                        append_deduplicated(&mut out, &format!("{template}[{index}]"));
                    }
                }
                if position != last {
                    out.push('.');
                }
            } else if position == last {
                let Some(binding) = binding_for_segment(bindings, segment) else {
                    continue;
                };
                let template = binding.target_template();
                let field = match binding.kind() {
                    RuleKind::Resource => RESOURCE_COLLECTION.to_string(),
                    RuleKind::Extension if template.is_empty() || template == EXTENSION_COLLECTION => {
                        EXTENSION_COLLECTION.to_string()
                    }
                    RuleKind::Extension => format!(
                        "{}.{EXTENSION_COLLECTION}",
                        self.fill_placeholders(*id, template, bindings)
                    ),
                    _ => self.fill_placeholders(*id, template, bindings),
                };
                append_deduplicated(&mut out, &field);
            }
        }

        out.trim_end_matches('.').to_string()
    }

    /// Replaces each `[]` in `template` with the list index of an enclosing repeating group.
    ///
    /// Indexed nodes are collected walking upward from `start` (inclusive) until the resource
    /// occurrence. The innermost one fills the rightmost placeholder; placeholders left over
    /// resolve to `0`.
    fn fill_placeholders<B: PathBinding>(
        &self,
        start: NodeId,
        template: &str,
        bindings: &[B],
    ) -> String {
        let placeholders = template.matches("[]").count();
        if placeholders == 0 {
            return template.to_string();
        }

        let mut innermost_first = Vec::with_capacity(placeholders);
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            if innermost_first.len() == placeholders
                || id == self.root()
                || self.is_resource_occurrence(id, bindings)
            {
                break;
            }
            if let Some(index) = self[id].list_index() {
                innermost_first.push(index);
            }
            cursor = self.parent(id);
        }

        let mut pieces = template.split("[]");
        let mut out = pieces.next().unwrap_or_default().to_string();
        for (slot, piece) in pieces.enumerate() {
            let from_right = placeholders - 1 - slot;
            let index = innermost_first.get(from_right).copied().unwrap_or(0);
            out.push_str(&format!("[{index}]{piece}"));
        }
        out
    }
}
