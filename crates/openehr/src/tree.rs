//! Arena-backed ordered tree used to represent parsed flat-file records.
//!
//! Responsibilities:
//! - Own every node of a record in a single table; parent and child links are [`NodeId`]
//!   indices into that table.
//! - Preserve child insertion order.
//! - Provide pre-order search by name, identity, path and binding.
//!
//! Nodes removed from the tree stay in the arena, detached, so that a [`NodeId`] handed out
//! once never points at a different node later.

use std::fmt;
use std::ops::Index;

use uuid::Uuid;

use crate::path::SearchTerm;
use crate::{OpenEhrError, OpenEhrResult};

/// Index of a node inside the [`Tree`] that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Whether a node can own children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Interior node. Its name is one step of a record path.
    Branch,
    /// Terminal node. Its name is the record value.
    Leaf,
}

#[derive(Debug, Clone)]
pub struct Node {
    id: Uuid,
    name: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    list_index: Option<u32>,
}

impl Node {
    fn new(name: &str, kind: NodeKind) -> Self {
        let list_index = match kind {
            NodeKind::Branch => parse_list_index(name),
            NodeKind::Leaf => None,
        };
        Self {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            kind,
            parent: None,
            children: Vec::new(),
            list_index,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Occurrence number parsed from a `field:N` or `field:N|sub` name.
    pub fn list_index(&self) -> Option<u32> {
        self.list_index
    }
}

/// Parses the occurrence number out of `field:N` and `field:N|sub` names.
pub(crate) fn parse_list_index(name: &str) -> Option<u32> {
    let (field, rest) = name.split_once(':')?;
    if field.is_empty() {
        return None;
    }
    let digits = rest.split_once('|').map_or(rest, |(digits, _)| digits);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// An ordered tree with a single root branch.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// Creates a tree holding only a root branch called `root_name`.
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Node::new(root_name, NodeKind::Branch)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self[id].name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self[id].children
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Creates a detached node. Use [`Tree::add`] to attach it.
    pub fn create(&mut self, name: &str, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(name, kind));
        id
    }

    /// Creates a branch called `name` and appends it to `parent`.
    pub fn add_branch(&mut self, parent: NodeId, name: &str) -> OpenEhrResult<NodeId> {
        let child = self.create(name, NodeKind::Branch);
        self.add(parent, child)?;
        Ok(child)
    }

    /// Creates a leaf holding `value` and appends it to `parent`.
    pub fn add_leaf(&mut self, parent: NodeId, value: &str) -> OpenEhrResult<NodeId> {
        let child = self.create(value, NodeKind::Leaf);
        self.add(parent, child)?;
        Ok(child)
    }

    /// Appends `child` to the children of `parent`.
    ///
    /// A child that is still attached elsewhere is detached first, so every node keeps a
    /// single parent.
    pub fn add(&mut self, parent: NodeId, child: NodeId) -> OpenEhrResult<()> {
        if self.get(parent).is_none() || self.get(child).is_none() {
            return Err(OpenEhrError::UnknownNode);
        }
        if self[parent].is_leaf() {
            return Err(OpenEhrError::LeafCannotHaveChildren(self[parent].name.clone()));
        }
        if child == self.root || self.ancestors(parent).any(|a| a == child) || parent == child {
            return Err(OpenEhrError::Cycle(self[child].name.clone()));
        }

        if let Some(old_parent) = self[child].parent {
            self.remove(old_parent, child);
        }
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// Detaches `child` from `parent`. The child's own children stay attached to it.
    ///
    /// Returns `false` when `child` was not a child of `parent`.
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(parent.0) else {
            return false;
        };
        let Some(position) = node.children.iter().position(|c| *c == child) else {
            return false;
        };
        node.children.remove(position);
        self.nodes[child.0].parent = None;
        true
    }

    // ========================================================================
    // Traversal and search
    // ========================================================================

    /// Every node reachable from `from` (inclusive), in pre-order.
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self[id].children.iter().rev().copied());
        }
        out
    }

    /// Every attached node, in pre-order from the root.
    pub fn all(&self) -> Vec<NodeId> {
        self.descendants(self.root)
    }

    /// Walks upward from the parent of `id` to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self[id].parent, move |current| self[*current].parent)
    }

    /// First node under `from` (inclusive) whose name equals `name`.
    pub fn find(&self, from: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(from)
            .into_iter()
            .find(|id| self[*id].name == name)
    }

    pub fn find_by_id(&self, id: Uuid) -> Option<NodeId> {
        self.all().into_iter().find(|n| self[*n].id == id)
    }

    /// First node whose [`Tree::path_to_root`] equals `path`.
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        self.all()
            .into_iter()
            .find(|id| self.path_to_root(*id) == path)
    }

    /// All nodes under `from` (inclusive) matching `term`, in pre-order.
    pub fn find_many(&self, from: NodeId, term: SearchTerm<'_>) -> Vec<NodeId> {
        self.descendants(from)
            .into_iter()
            .filter(|id| term.matches(&self[*id]))
            .collect()
    }

    /// `/`-joined names from below the root down to `id`. The root itself yields `""`.
    pub fn path_to_root(&self, id: NodeId) -> String {
        let mut names: Vec<&str> = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                break;
            }
            names.push(&self[current].name);
            cursor = self[current].parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Value of the first leaf directly under `id`.
    pub fn leaf_value(&self, id: NodeId) -> Option<&str> {
        self[id]
            .children
            .iter()
            .map(|child| &self[*child])
            .find(|child| child.is_leaf())
            .map(Node::name)
    }

    /// Indented rendering, one node per line.
    pub fn display(&self) -> TreeDisplay<'_> {
        TreeDisplay { tree: self }
    }
}

impl Index<NodeId> for Tree {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

/// Renders each node as its name prefixed with `-` repeated by depth.
pub struct TreeDisplay<'a> {
    tree: &'a Tree,
}

impl fmt::Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![(self.tree.root, 1usize)];
        while let Some((id, depth)) = stack.pop() {
            writeln!(f, "{}{}", "-".repeat(depth), self.tree.name(id))?;
            for child in self.tree.children(id).iter().rev() {
                stack.push((*child, depth + 2));
            }
        }
        Ok(())
    }
}
