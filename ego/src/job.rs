// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::any::Any;
use std::fmt;

use crate::context::Context;

/// A single job argument. Jobs downcast to whatever type they expect.
pub type Arg = Box<dyn Any + Send>;

pub type Args = Vec<Arg>;

/// The callable of a job. It receives the job's context and its arguments.
pub type JobFn = Box<dyn FnOnce(Context, Args) + Send + 'static>;

/// Builds an [`Args`] vector from a list of values.
///
/// ```
/// let args = ego::args![1u32, "two", String::from("three")];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::job::Args::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$(Box::new($value) as $crate::job::Arg),+]
    };
}

/// An immutable unit of work. It is moved from the submitter into the queue,
/// from the queue into the dispatch loop and finally into the thread running
/// it; it is never shared.
pub struct Job {
    ctx: Context,
    f: JobFn,
    args: Args,
}

impl Job {
    pub fn new<F>(ctx: Context, f: F, args: Args) -> Self
    where
        F: FnOnce(Context, Args) + Send + 'static,
    {
        Self {
            ctx,
            f: Box::new(f),
            args,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Runs the callable. Panics of the callable are not caught here.
    pub fn run(self) {
        (self.f)(self.ctx, self.args)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("ctx", &self.ctx)
            .field("args", &self.args.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_job_receives_context_and_args() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen_in_job = seen.clone();

        let job = Job::new(
            Context::background(),
            move |ctx, args| {
                assert!(!ctx.is_done());
                let a = args[0].downcast_ref::<u32>().copied().unwrap_or(0);
                let b = args[1].downcast_ref::<u32>().copied().unwrap_or(0);
                seen_in_job.store(a + b, Ordering::SeqCst);
            },
            crate::args![40u32, 2u32],
        );

        assert_eq!(job.arg_count(), 2);
        job.run();
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_job_keeps_the_submitted_context() {
        let ctx = Context::background();
        let job = Job::new(ctx.child(), |_ctx, _args| {}, crate::args![]);
        assert!(!job.context().is_done());

        ctx.cancel();
        assert!(job.context().is_done());
        assert_eq!(job.arg_count(), 0);
    }

    #[test]
    fn test_empty_args_macro() {
        let args = crate::args![];
        assert!(args.is_empty());
    }

    #[test]
    fn test_args_keep_their_types() {
        let args = crate::args!["text", 7i64];
        assert_eq!(args[0].downcast_ref::<&str>(), Some(&"text"));
        assert!(args[1].downcast_ref::<u32>().is_none());
        assert_eq!(args[1].downcast_ref::<i64>(), Some(&7));
    }
}
