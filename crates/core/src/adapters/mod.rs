//! Adapters: named rule sets for one record shape each.
//!
//! Responsibilities:
//! - Pair a rule table with the name it is selected and reported under.
//! - Parse a message and run a full session over it ([`Adapter::transcode`]).
//! - Expose the registry the selector iterates ([`registry`]).

pub mod adverse_reaction_list;
pub mod problem_list;

use std::sync::Arc;

use openehr::flat_file;

use crate::config::CoreConfig;
use crate::rules::MappingRule;
use crate::session::Session;
use crate::CoreResult;

#[derive(Debug, Clone)]
pub struct Adapter {
    name: &'static str,
    rules: Arc<[MappingRule]>,
}

impl Adapter {
    pub fn new(name: &'static str, rules: Vec<MappingRule>) -> Self {
        Self {
            name,
            rules: rules.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Parses `message` and runs every pass of this adapter's rules over it.
    ///
    /// The parsed tree is rooted at `<adapter name>_rootnode`.
    pub fn transcode(&self, message: &str) -> CoreResult<Session> {
        let tree = flat_file::parse(self.name, message);
        let mut session = Session::new(self.name, tree, Arc::clone(&self.rules));
        session.run()?;
        Ok(session)
    }
}

/// Every adapter, in selection order.
pub fn registry(config: &CoreConfig) -> CoreResult<Vec<Adapter>> {
    Ok(vec![
        adverse_reaction_list::adapter(config)?,
        problem_list::adapter(config)?,
    ])
}
