// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use log::debug;
use std::any::Any;
use std::sync::Arc;

/// What a panicking job left behind, as returned by `catch_unwind`.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Invoked with the payload of every job that panicked.
pub type RecoverFn = Arc<dyn Fn(PanicPayload) + Send + Sync + 'static>;

/// Extracts the message of a `panic!("...")` payload, if it carries one.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Swallows the panic. The message is logged at debug level only; the
/// process panic hook, which runs before any guard, still reports it.
pub fn default_recover(payload: PanicPayload) {
    debug!("Recovered from panicking job: {}", panic_message(payload.as_ref()));
}
