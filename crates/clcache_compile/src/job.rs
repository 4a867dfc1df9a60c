//! The inputs and outputs of one `compile_one` call.

use std::collections::HashMap;
use std::path::PathBuf;

use clcache_fingerprint::Arguments;

/// One `(compiler, cmdLine, sourceFile, objectFile, env)` compile job, as
/// handed down by the scheduler for a single source file.
#[derive(Debug, Clone)]
pub struct CompileJob {
    /// Path to the compiler binary.
    pub compiler: PathBuf,
    /// Parsed flag map (everything but the source file itself), shared with
    /// the fingerprinter's canonical command-line reconstruction.
    pub arguments: Arguments,
    /// The full argv to pass when actually invoking the compiler (flags
    /// plus the source file, in the caller's original order — unlike
    /// `arguments`, which is sorted for fingerprinting only).
    pub full_args: Vec<String>,
    /// The translation unit being compiled.
    pub source_file: PathBuf,
    /// Where the compiler is expected to write the object file.
    pub object_file: PathBuf,
    /// The invocation's working directory, for resolving relative paths.
    pub cwd: PathBuf,
    /// `CLCACHE_BASEDIR`, if set.
    pub basedir: Option<PathBuf>,
    /// Environment overlay applied on top of the process environment.
    pub env: HashMap<String, String>,
    /// `false` forces no-direct mode (`CLCACHE_NODIRECT`).
    pub direct_mode: bool,
}

/// The result of running one [`CompileJob`] through the cache.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    /// The process exit code to propagate to the build.
    pub exit_code: i32,
    /// Standard output to print (with any cache-injected `/showIncludes`
    /// lines already stripped).
    pub stdout: Vec<u8>,
    /// Standard error to print.
    pub stderr: Vec<u8>,
    /// `true` if this insertion brought `CacheSize` to or past
    /// `MaximumCacheSize`, and the scheduler should trigger eviction after
    /// the batch completes.
    pub cleanup_required: bool,
}
