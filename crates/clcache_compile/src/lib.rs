//! The per-source compile pipeline: direct and no-direct mode, the compiler
//! subprocess abstraction, `/showIncludes` handling, and the handle bundle
//! threaded through every job.
//!
//! Everything here is a pure function of a [`CompileJob`] and a
//! [`CacheHandles`] — no argv parsing, no environment-variable reading, no
//! process-wide state. Those belong to the classifier and scheduler above
//! this crate.

#![warn(missing_docs)]

mod direct;
mod error;
mod handles;
mod job;
mod nodirect;
mod runner;
mod showincludes;

pub use error::CompileError;
pub use handles::CacheHandles;
pub use job::{CompileJob, CompileOutcome};
pub use runner::{CompilerRunner, RealCompiler, RunOutput};

use clcache_digest::RemoteHasher;

/// Runs one [`CompileJob`] through the cache, dispatching to direct or
/// no-direct mode per [`CompileJob::direct_mode`].
pub fn compile_one<R: RemoteHasher>(
    handles: &CacheHandles<R>,
    runner: &dyn CompilerRunner,
    job: &CompileJob,
) -> Result<CompileOutcome, CompileError> {
    if job.direct_mode {
        direct::compile_direct(handles, runner, job)
    } else {
        nodirect::compile_no_direct(handles, runner, job)
    }
}
