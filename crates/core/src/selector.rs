//! Adapter selection.
//!
//! Every adapter transcodes the message; the session with the most successful writes wins.
//! Ties keep the adapter registered first.

use crate::adapters::Adapter;
use crate::session::Session;
use crate::{CoreError, CoreResult};

/// Runs every adapter over `message` and returns the best session.
///
/// Sessions aborted by a fatal mapping error drop out. Returns `None` only when no adapter
/// produced a session; callers decide whether a zero score counts as a match.
pub fn select(adapters: &[Adapter], message: &str) -> Option<Session> {
    let mut best: Option<Session> = None;

    for adapter in adapters {
        let session = match adapter.transcode(message) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(adapter = adapter.name(), error = %err, "adapter aborted");
                continue;
            }
        };
        tracing::debug!(
            adapter = adapter.name(),
            confidence = session.successes(),
            "adapter scored"
        );

        let better = best
            .as_ref()
            .map_or(true, |current| session.successes() > current.successes());
        if better {
            best = Some(session);
        }
    }

    if let Some(session) = &best {
        tracing::info!(
            adapter = session.adapter(),
            confidence = session.successes(),
            "adapter selected"
        );
    }
    best
}

/// Transcodes `message` with the adapter called `name`.
pub fn transcode_with(adapters: &[Adapter], name: &str, message: &str) -> CoreResult<Session> {
    adapters
        .iter()
        .find(|adapter| adapter.name() == name)
        .ok_or_else(|| CoreError::UnknownAdapter(name.to_string()))?
        .transcode(message)
}
