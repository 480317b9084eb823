//! Flat-file reading and writing.
//!
//! A flat file is a JSON-like listing of one fact per line:
//!
//! ```text
//! {
//!     "adverse_reaction_list/adverse_reaction_risk:0/criticality|code": "at0102",
//!     "adverse_reaction_list/language|code": "en"
//! }
//! ```
//!
//! Parsing is best effort: malformed lines are skipped, never fatal.

use std::collections::HashMap;

use crate::tree::{NodeId, Tree};

/// Suffix appended to the composition name to form the root node name.
pub const ROOT_SUFFIX: &str = "_rootnode";

const PATH_VALUE_SEPARATOR: &str = ": ";

/// Parses `message` into a tree rooted at `<name>_rootnode`.
pub fn parse(name: &str, message: &str) -> Tree {
    let mut tree = Tree::new(&format!("{name}{ROOT_SUFFIX}"));
    let mut by_path: HashMap<String, NodeId> = HashMap::new();

    let normalised = message
        .replace('"', "")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    for (number, raw) in normalised.lines().enumerate() {
        let trimmed = raw.trim();
        let line = trimmed.strip_suffix(',').unwrap_or(trimmed);
        if line.trim().len() <= 1 {
            continue;
        }

        let (path, value) = match line.split_once(PATH_VALUE_SEPARATOR) {
            Some((path, value)) => (path.trim(), Some(value.trim())),
            None => match line.trim_end().strip_suffix(':') {
                Some(path) => (path.trim(), None),
                None => {
                    tracing::debug!(line = number + 1, "skipping line without a value separator");
                    continue;
                }
            },
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            tracing::debug!(line = number + 1, path, "skipping line with a malformed path");
            continue;
        }

        insert_line(&mut tree, &mut by_path, &segments, value.filter(|v| !v.is_empty()), number);
    }

    tree
}

fn insert_line(
    tree: &mut Tree,
    by_path: &mut HashMap<String, NodeId>,
    segments: &[&str],
    value: Option<&str>,
    number: usize,
) {
    let mut parent = tree.root();
    let mut prefix = String::new();
    let last = segments.len() - 1;

    for (position, segment) in segments.iter().enumerate() {
        if position > 0 {
            prefix.push('/');
        }
        prefix.push_str(segment);

        if let Some(existing) = by_path.get(&prefix) {
            if tree[*existing].is_leaf() {
                tracing::debug!(line = number + 1, path = %prefix, "path runs through a value");
                return;
            }
            if position == last {
                tracing::debug!(line = number + 1, path = %prefix, "duplicate path, value dropped");
                return;
            }
            parent = *existing;
            continue;
        }

        let branch = match tree.add_branch(parent, segment) {
            Ok(branch) => branch,
            Err(err) => {
                tracing::debug!(line = number + 1, error = %err, "skipping line");
                return;
            }
        };
        by_path.insert(prefix.clone(), branch);

        if position == last {
            if let Some(value) = value {
                match tree.add_leaf(branch, value) {
                    Ok(leaf) => {
                        by_path.insert(format!("{prefix}/{value}"), leaf);
                    }
                    Err(err) => tracing::debug!(line = number + 1, error = %err, "value dropped"),
                }
            }
        }
        parent = branch;
    }
}

/// Writes every leaf of `tree` back out as one `"path": "value"` line.
pub fn serialise(tree: &Tree) -> String {
    let lines: Vec<String> = tree
        .all()
        .into_iter()
        .filter(|id| tree[*id].is_leaf())
        .filter_map(|leaf| {
            let parent = tree.parent(leaf)?;
            Some(format!(
                "    \"{}\": \"{}\"",
                tree.path_to_root(parent),
                tree.name(leaf)
            ))
        })
        .collect();

    if lines.is_empty() {
        return "{\n}".to_string();
    }
    format!("{{\n{}\n}}", lines.join(",\n"))
}
