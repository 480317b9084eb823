//! # Ferry Core
//!
//! Rule-driven transcoding of openEHR flat files into FHIR resources.
//!
//! This crate contains the mapping engine and the adapters built on it:
//! - Mapping rules and their five variants ([`rules`])
//! - Transcoding sessions with a fixed pass order ([`session`])
//! - The value protocol shared by every value-writing rule ([`protocol`])
//! - Adapters (named rule tables) and selection between them ([`adapters`], [`selector`])
//! - The reverse direction, FHIR bundle to openEHR tree ([`reverse`])
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and
//! `ferry-cli`.

pub mod adapters;
pub mod config;
pub mod constants;
mod error;
pub mod protocol;
pub mod reverse;
pub mod rules;
pub mod selector;
pub mod session;

pub use adapters::{registry, Adapter};
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult, MappingError};
pub use reverse::ReverseAdapter;
pub use rules::{Decision, MappingRule, RuleVariant};
pub use selector::{select, transcode_with};
pub use session::Session;
