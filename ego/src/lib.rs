// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>
//! # Design: Bounded-Concurrency Job Dispatcher
//!
//! ## Overview
//! Callers submit jobs; at most `capacity` of them run at the same time, the
//! rest wait in an overflow queue. [`Dispatcher::close`] waits until every
//! accepted job has finished.
//!
//! - A job that finds a free slot starts immediately on its own thread.
//! - A job that does not is put into the [`JobQueue`] (FIFO by default).
//! - One dispatch thread pulls queued jobs and admits them one at a time, in
//!   arrival order, spinning while the dispatcher is saturated.
//! - Slots are a lock-free atomic count; nothing else is shared but the
//!   in-flight counter and the queue.
//! - A panicking job is handed to the recovery guard and still frees its slot.
//!
//! ```text
//!         submit(ctx, f, args)
//!                 |
//!         +-------v--------+  slot free   +-----------------+
//!         |   admission    +------------->| job thread      |
//!         +-------+--------+              +-----------------+
//!                 | saturated                      ^
//!         +-------v--------+              +--------+--------+
//!         |   job queue    +------------->| dispatch thread |
//!         +----------------+   dequeue    +-----------------+
//! ```
//!
//! ## Example
//!
//! ```
//! use ego::{args, Context, Dispatcher};
//!
//! let dispatcher = Dispatcher::builder().capacity(2).build().unwrap();
//! dispatcher
//!     .submit(
//!         Context::background(),
//!         |_ctx, args| {
//!             let n = args[0].downcast_ref::<u32>().copied().unwrap_or_default();
//!             println!("job got {n}");
//!         },
//!         args![7u32],
//!     )
//!     .unwrap();
//! dispatcher.close();
//! ```

pub mod admission;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod queue;
pub mod recover;
pub mod tracker;

pub use config::DispatcherConfig;
pub use context::{Context, ContextError};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DEFAULT_CAPACITY};
pub use error::DispatchError;
pub use job::{Arg, Args, Job};
pub use queue::{Ack, ChannelQueue, JobQueue};
pub use recover::{panic_message, PanicPayload};
