// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use serde::{Deserialize, Serialize};

use crate::dispatcher::{Dispatcher, DispatcherBuilder};
use crate::error::DispatchError;
use crate::queue::ChannelQueue;

/// Serializable dispatcher settings, e.g. read from a JSON config file.
///
/// The recovery guard cannot be expressed here; set it on the builder
/// returned by [`DispatcherConfig::into_builder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Maximum number of concurrently running jobs; 0 selects the default.
    pub capacity: usize,

    /// Bound of the overflow queue; `None` (or 0) means unbounded.
    pub queue_bound: Option<usize>,
}

impl DispatcherConfig {
    pub fn from_json(json: &str) -> Result<Self, DispatchError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_builder(self) -> DispatcherBuilder {
        let queue = match self.queue_bound {
            Some(bound) if bound > 0 => ChannelQueue::bounded(bound),
            _ => ChannelQueue::unbounded(),
        };
        Dispatcher::builder().capacity(self.capacity).queue(queue)
    }
}
