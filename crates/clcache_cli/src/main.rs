//! `clcache` — transparent, content-addressed cache for `cl.exe`.
//!
//! Invoked either as a maintenance subcommand (`clcache stats`, `clcache
//! clean`, `clcache reset`) or, for every other first argument, as a
//! compiler wrapper: `clcache cl.exe /c foo.cpp` behaves exactly like `cl.exe
//! /c foo.cpp` but serves repeat compiles from the cache.

#![warn(missing_docs)]

mod classify;
mod cmdline;
mod env;
mod maintenance;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;

use clcache_compile::{CacheHandles, CompilerRunner, RealCompiler};
use clcache_scheduler::SourceJob;
use tracing_subscriber::EnvFilter;

use crate::classify::ClassifyOutcome;
use crate::env::EnvConfig;

const MAINTENANCE_COMMANDS: &[&str] = &["stats", "clean", "reset"];

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_env("CLCACHE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

/// Strips a leading `--log-format <json|text>` (or `--log-format=value`)
/// token, which is the one flag `clcache` itself recognizes before argv is
/// handed off untouched to a subcommand or the wrapped compiler.
fn take_log_format(argv: &[String]) -> (bool, Vec<String>) {
    if let Some(first) = argv.first() {
        if let Some(value) = first.strip_prefix("--log-format=") {
            return (value == "json", argv[1..].to_vec());
        }
        if first == "--log-format" {
            return match argv.get(1) {
                Some(value) => (value == "json", argv[2..].to_vec()),
                None => (false, argv[1..].to_vec()),
            };
        }
    }
    (false, argv.to_vec())
}

fn run_compiler_wrap(env_config: &EnvConfig, compiler_arg: &str, rest: &[String]) -> i32 {
    let compiler = env_config
        .compiler_override
        .clone()
        .unwrap_or_else(|| PathBuf::from(compiler_arg));
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let runner = RealCompiler;

    if env_config.disabled {
        return match runner.run(&compiler, rest, &cwd, &HashMap::new()) {
            Ok(output) => {
                print_bytes(&output.stdout, &output.stderr);
                output.exit_code
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to invoke compiler");
                1
            }
        };
    }

    let expanded = match cmdline::expand(rest) {
        Ok(expanded) => expanded,
        Err(err) => {
            tracing::error!(error = %err, "response file expansion failed");
            return 1;
        }
    };
    let spliced = cmdline::splice_cl_environment(
        &expanded,
        &env_config.cl_prefix,
        &env_config.cl_suffix,
    );

    let handles = {
        let mut h = CacheHandles::new(&env_config.cache_dir);
        h.copy_opts = env_config.copy_options();
        h
    };

    match classify::classify(&spliced, &cwd) {
        ClassifyOutcome::Rejected(reason) => {
            if let Err(err) = handles.with_stats(|stats, _config| stats.record_rejection(reason)) {
                tracing::warn!(error = %err, "failed to record rejection statistic");
            }
            match runner.run(&compiler, &spliced, &cwd, &HashMap::new()) {
                Ok(output) => {
                    print_bytes(&output.stdout, &output.stderr);
                    output.exit_code
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to invoke compiler");
                    1
                }
            }
        }
        ClassifyOutcome::Cacheable(invocation) => {
            let source_paths: Vec<&Path> =
                invocation.sources.iter().map(|s: &SourceJob| s.path.as_path()).collect();
            let base_args = clcache_scheduler::build_base_cmdline(&spliced, &source_paths);
            let max_jobs = clcache_scheduler::job_count(&spliced);

            let outcome = clcache_scheduler::run(
                &handles,
                &runner,
                &compiler,
                &cwd,
                env_config.basedir.as_deref(),
                &HashMap::new(),
                &invocation.arguments,
                &base_args,
                &invocation.sources,
                !env_config.force_no_direct,
                max_jobs,
                env_config.single_file,
            );

            if outcome.cleanup_required {
                maybe_evict(env_config);
            }
            outcome.exit_code
        }
    }
}

fn maybe_evict(env_config: &EnvConfig) {
    let handles = CacheHandles::new(&env_config.cache_dir);
    let max_size = clcache_config::Configuration::open(&env_config.cache_dir).maximum_cache_size();
    match clcache_store::evict(&handles.objects, &handles.manifests, max_size) {
        Ok(result) => {
            if let Err(err) = handles.with_stats(|stats, _config| {
                stats.set_cache_size(result.cache_size);
                stats.set_cache_entries(result.cache_entries);
            }) {
                tracing::warn!(error = %err, "failed to reconcile statistics after eviction");
            }
        }
        Err(err) => tracing::warn!(error = %err, "eviction pass failed"),
    }
}

fn print_bytes(stdout: &[u8], stderr: &[u8]) {
    use std::io::Write;
    let _ = std::io::stdout().write_all(stdout);
    let _ = std::io::stderr().write_all(stderr);
}

fn main() {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let (json_logs, argv) = take_log_format(&raw);
    init_logging(json_logs);

    let env_config = EnvConfig::from_environment();

    let Some(first) = argv.first() else {
        eprintln!("usage: clcache <compiler> [args...]  |  clcache <stats|clean|reset>");
        process::exit(2);
    };

    let exit_code = if MAINTENANCE_COMMANDS.contains(&first.as_str()) {
        let rest = &argv[1..];
        let result = match first.as_str() {
            "stats" => maintenance::run_stats(&env_config.cache_dir, rest),
            "clean" => maintenance::run_clean(&env_config.cache_dir, rest),
            "reset" => maintenance::run_reset(&env_config.cache_dir, rest),
            _ => unreachable!("checked above"),
        };
        match result {
            Ok(code) => code,
            Err(err) => {
                eprintln!("clcache: {err:#}");
                1
            }
        }
    } else {
        run_compiler_wrap(&env_config, first, &argv[1..])
    };

    process::exit(exit_code);
}
