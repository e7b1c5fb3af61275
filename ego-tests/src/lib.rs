// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

pub mod meter;
pub mod recording_queue;
pub mod wait;
