//! Reads the environment variable table. The only module in the workspace
//! that calls `std::env::var` for cache tunables — every other crate
//! receives parsed values as plain arguments, which is what keeps them
//! unit-testable without an environment to fake.

use std::path::PathBuf;
use std::time::Duration;

/// Parsed view of every `CLCACHE_*` (plus `CL`/`_CL_`) environment input.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// `CLCACHE_DIR`, default `~/clcache`.
    pub cache_dir: PathBuf,
    /// `CLCACHE_CL`, overriding the compiler path passed on argv.
    pub compiler_override: Option<PathBuf>,
    /// `CLCACHE_BASEDIR`.
    pub basedir: Option<PathBuf>,
    /// `CLCACHE_NODIRECT`.
    pub force_no_direct: bool,
    /// `CLCACHE_DISABLE`.
    pub disabled: bool,
    /// `CLCACHE_SINGLEFILE`.
    pub single_file: bool,
    /// `CLCACHE_HARDLINK`.
    pub hardlink: bool,
    /// `CLCACHE_COMPRESS`.
    pub compress: bool,
    /// `CLCACHE_COMPRESSLEVEL`, default 6.
    pub compress_level: u32,
    /// `CLCACHE_OBJECT_CACHE_TIMEOUT_MS`, default 10 000 ms.
    pub lock_timeout: Duration,
    /// `CLCACHE_SERVER`, an out-of-process hash server endpoint identifier.
    pub server: Option<String>,
    /// Tokens from `CL`, prepended to argv before classification.
    pub cl_prefix: Vec<String>,
    /// Tokens from `_CL_`, appended to argv before classification.
    pub cl_suffix: Vec<String>,
}

fn is_set(name: &str) -> bool {
    std::env::var_os(name).is_some()
}

fn default_cache_dir() -> PathBuf {
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) => PathBuf::from(home).join("clcache"),
        None => PathBuf::from("clcache"),
    }
}

impl EnvConfig {
    /// Reads every input named in the environment variable table.
    pub fn from_environment() -> Self {
        let cache_dir = std::env::var("CLCACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cache_dir());

        let compress_level = std::env::var("CLCACHE_COMPRESSLEVEL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(6);

        let lock_timeout = std::env::var("CLCACHE_OBJECT_CACHE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(clcache_lock::DEFAULT_TIMEOUT);

        Self {
            cache_dir,
            compiler_override: std::env::var("CLCACHE_CL").ok().map(PathBuf::from),
            basedir: std::env::var("CLCACHE_BASEDIR").ok().map(PathBuf::from),
            force_no_direct: is_set("CLCACHE_NODIRECT"),
            disabled: is_set("CLCACHE_DISABLE"),
            single_file: is_set("CLCACHE_SINGLEFILE"),
            hardlink: is_set("CLCACHE_HARDLINK"),
            compress: is_set("CLCACHE_COMPRESS"),
            compress_level,
            lock_timeout,
            server: std::env::var("CLCACHE_SERVER").ok(),
            cl_prefix: crate::cmdline::split_env_tokens(&std::env::var("CL").unwrap_or_default()),
            cl_suffix: crate::cmdline::split_env_tokens(
                &std::env::var("_CL_").unwrap_or_default(),
            ),
        }
    }

    /// Builds [`clcache_store::CopyOptions`] from `hardlink`/`compress`.
    pub fn copy_options(&self) -> clcache_store::CopyOptions {
        clcache_store::CopyOptions {
            hardlink: self.hardlink,
            compress: self.compress,
            compress_level: self.compress_level,
        }
    }
}
