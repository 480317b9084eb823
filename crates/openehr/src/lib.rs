//! openEHR flat-file support.
//!
//! This crate turns the line-oriented openEHR flat-file format into an ordered tree and
//! provides the path algebra that mapping rules use to translate record paths into target
//! paths. It knows nothing about FHIR; the target side is reached only through
//! [`path::PathBinding`].
//!
//! - [`tree`]: arena-backed tree, search and display.
//! - [`path`]: record-path to target-path translation.
//! - [`flat_file`]: parser and serialiser.
//! - [`coded`]: `terminology::code::display` strings.

pub mod coded;
pub mod flat_file;
pub mod path;
pub mod tree;

pub use coded::parse_coded_string;
pub use path::{PathBinding, RuleKind, SearchTerm, EXTENSION_COLLECTION, RESOURCE_COLLECTION};
pub use tree::{Node, NodeId, NodeKind, Tree};

use thiserror::Error;

/// Errors returned by the `openehr` crate.
#[derive(Debug, Error)]
pub enum OpenEhrError {
    #[error("leaf '{0}' cannot have children")]
    LeafCannotHaveChildren(String),

    #[error("adding '{0}' would create a cycle")]
    Cycle(String),

    #[error("node does not belong to this tree")]
    UnknownNode,
}

pub type OpenEhrResult<T> = Result<T, OpenEhrError>;
