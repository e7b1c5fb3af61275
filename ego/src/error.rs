// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use thiserror::Error;

/// Errors reported to callers of the dispatcher.
///
/// Job failures are never reported here; they end up in the recovery guard.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher has been closed and does not accept new jobs.
    #[error("dispatcher is closed")]
    Closed,

    #[error("failed to spawn the dispatch thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid dispatcher config: {0}")]
    Config(#[from] serde_json::Error),
}
