//! No-direct mode: two passes over the compiler. The first preprocesses the
//! source to determine the object key without trusting a manifest's record
//! of which headers were pulled in; the second only runs if that key misses.

use clcache_digest::{Digest, RemoteHasher};
use clcache_fingerprint::{
    canonical_cmdline, compiler_hash, no_direct_object_key, strip_preprocessor_only_flags,
};
use clcache_stats::MissReason;

use crate::direct::cache_hit;
use crate::error::CompileError;
use crate::handles::CacheHandles;
use crate::job::{CompileJob, CompileOutcome};
use crate::runner::CompilerRunner;

/// Runs `job` through no-direct mode against `handles`.
pub fn compile_no_direct<R: RemoteHasher>(
    handles: &CacheHandles<R>,
    runner: &dyn CompilerRunner,
    job: &CompileJob,
) -> Result<CompileOutcome, CompileError> {
    let compiler_digest = compiler_hash(&job.compiler)?;

    let preprocess_args = build_preprocess_args(&job.full_args);
    let preprocess_run = runner.run(&job.compiler, &preprocess_args, &job.cwd, &job.env)?;

    if preprocess_run.exit_code != 0 {
        // The preprocessor itself failed (a missing header, a syntax error
        // in a macro). This is a normal build failure, not a cache defect —
        // surface it and let the real invocation fail the same way.
        handles.record_miss(MissReason::Plain)?;
        return Ok(CompileOutcome {
            exit_code: preprocess_run.exit_code,
            stdout: Vec::new(),
            stderr: preprocess_run.stderr,
            cleanup_required: false,
        });
    }

    let stripped = strip_preprocessor_only_flags(&job.arguments);
    let source_as_input = vec![job.source_file.to_string_lossy().into_owned()];
    let normalized_cmdline = canonical_cmdline(
        &stripped,
        &source_as_input,
        &job.cwd,
        job.basedir.as_deref(),
    );
    let object_key = no_direct_object_key(
        &compiler_digest,
        &normalized_cmdline,
        &preprocess_run.stdout,
    );

    if handles.objects.has(&object_key) {
        return cache_hit(handles, job, &object_key);
    }

    run_and_record(handles, runner, job, &object_key)
}

/// Appends `/E` (preprocess to stdout, compile nothing) unless the caller's
/// own command line already requests some form of preprocess-only output,
/// and strips `/c` — the real compile step it would otherwise still ask
/// for alongside preprocessing.
fn build_preprocess_args(full_args: &[String]) -> Vec<String> {
    let already_preprocessing = full_args
        .iter()
        .any(|a| a.eq_ignore_ascii_case("/E") || a.eq_ignore_ascii_case("-E"));
    let mut args: Vec<String> = full_args
        .iter()
        .filter(|a| !a.eq_ignore_ascii_case("/c") && !a.eq_ignore_ascii_case("-c"))
        .cloned()
        .collect();
    if !already_preprocessing {
        args.push("/E".to_string());
    }
    args
}

/// Runs the real compile and inserts the result under `object_key`. Unlike
/// direct mode there is no manifest to update — the preprocessed content
/// already fully determines `object_key`.
fn run_and_record<R: RemoteHasher>(
    handles: &CacheHandles<R>,
    runner: &dyn CompilerRunner,
    job: &CompileJob,
    object_key: &Digest,
) -> Result<CompileOutcome, CompileError> {
    let run = runner.run(&job.compiler, &job.full_args, &job.cwd, &job.env)?;

    if run.exit_code != 0 {
        handles.record_miss(MissReason::Plain)?;
        return Ok(CompileOutcome {
            exit_code: run.exit_code,
            stdout: run.stdout,
            stderr: run.stderr,
            cleanup_required: false,
        });
    }

    let object_src = job.object_file.exists().then_some(job.object_file.as_path());
    let already_cached = handles.objects.has(object_key);
    let mut size = 0u64;
    {
        let _guard = handles.objects.lock_for(object_key).acquire()?;
        if !already_cached {
            size = handles.objects.set(
                object_key,
                object_src,
                &run.stdout,
                &run.stderr,
                &handles.copy_opts,
            )?;
        }
    }

    let cleanup_required = handles.with_stats(|stats, config| {
        stats.record_miss(MissReason::Plain);
        if !already_cached {
            stats.set_cache_entries(stats.cache_entries() + 1);
            stats.set_cache_size(stats.cache_size() + size);
        }
        stats.cache_size() >= config.maximum_cache_size()
    })?;

    Ok(CompileOutcome {
        exit_code: run.exit_code,
        stdout: run.stdout,
        stderr: run.stderr,
        cleanup_required,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use super::*;
    use crate::runner::RunOutput;

    struct ScriptedCompiler {
        preprocess: RunOutput,
        real: RunOutput,
    }

    impl CompilerRunner for ScriptedCompiler {
        fn run(
            &self,
            _compiler: &Path,
            args: &[String],
            _cwd: &Path,
            _env: &HashMap<String, String>,
        ) -> Result<RunOutput, CompileError> {
            if args.iter().any(|a| a == "/E") {
                Ok(self.preprocess.clone())
            } else {
                Ok(self.real.clone())
            }
        }
    }

    fn job(dir: &Path, source: &Path, object: &Path) -> CompileJob {
        CompileJob {
            compiler: dir.join("cl.exe"),
            arguments: Default::default(),
            full_args: vec!["/c".to_string(), source.to_string_lossy().into_owned()],
            source_file: source.to_path_buf(),
            object_file: object.to_path_buf(),
            cwd: dir.to_path_buf(),
            basedir: None,
            env: HashMap::new(),
            direct_mode: false,
        }
    }

    #[test]
    fn identical_preprocessed_output_hits_on_second_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cl.exe"), b"fake compiler").unwrap();
        let source = dir.path().join("src.cpp");
        std::fs::write(&source, b"int main(){}").unwrap();
        let object = dir.path().join("src.obj");

        let handles = CacheHandles::new(dir.path());
        let j = job(dir.path(), &source, &object);
        let compiler = ScriptedCompiler {
            preprocess: RunOutput {
                exit_code: 0,
                stdout: b"int main(){}".to_vec(),
                stderr: Vec::new(),
            },
            real: RunOutput {
                exit_code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
            },
        };

        std::fs::write(&object, b"object bytes").unwrap();
        let first = compile_no_direct(&handles, &compiler, &j).unwrap();
        assert_eq!(first.exit_code, 0);

        std::fs::remove_file(&object).unwrap();
        let second = compile_no_direct(&handles, &compiler, &j).unwrap();
        assert_eq!(second.exit_code, 0);
        assert_eq!(std::fs::read(&object).unwrap(), b"object bytes");

        let stats = clcache_stats::Statistics::open(dir.path());
        assert_eq!(stats.counter("CacheHits"), 1);
        assert_eq!(stats.counter("CacheMisses"), 1);
    }

    #[test]
    fn preprocessor_failure_is_surfaced_without_running_the_real_compile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cl.exe"), b"fake compiler").unwrap();
        let source = dir.path().join("src.cpp");
        std::fs::write(&source, b"int main(){}").unwrap();
        let object = dir.path().join("src.obj");

        let handles = CacheHandles::new(dir.path());
        let j = job(dir.path(), &source, &object);
        let compiler = ScriptedCompiler {
            preprocess: RunOutput {
                exit_code: 1,
                stdout: Vec::new(),
                stderr: b"fatal error: missing.h: No such file".to_vec(),
            },
            real: RunOutput {
                exit_code: 0,
                stdout: b"should not run".to_vec(),
                stderr: Vec::new(),
            },
        };

        let outcome = compile_no_direct(&handles, &compiler, &j).unwrap();
        assert_eq!(outcome.exit_code, 1);
        assert!(!object.exists());
    }
}
