//! Fans per-source compile jobs out to a bounded worker pool, prints their
//! output in completion order under a single lock, and aggregates exit
//! codes and the cleanup-required flag.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Mutex;

use clcache_compile::{compile_one, CacheHandles, CompileJob, CompilerRunner};
use clcache_digest::RemoteHasher;
use clcache_fingerprint::Arguments;

/// One source file to compile: its path, optional forced-language tag
/// (`/Tc`, `/Tp`, ...) to prepend to it on the real invocation, and its
/// resolved object-file destination.
#[derive(Debug, Clone)]
pub struct SourceJob {
    /// The translation unit.
    pub path: PathBuf,
    /// `/Tc` or `/Tp`, if the caller forced this source's language.
    pub language_tag: Option<String>,
    /// Where the compiler is expected to write the object file.
    pub object_file: PathBuf,
}

/// The aggregated result of one scheduler run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerOutcome {
    /// First non-zero exit code seen, or 0 if every job succeeded.
    pub exit_code: i32,
    /// `true` if any job's insertion brought the cache to or past its
    /// configured maximum size.
    pub cleanup_required: bool,
}

/// Compiles every entry in `sources` against `handles`, bounded to
/// `max_jobs` concurrent workers (forced to 1 when `single_file` is set,
/// matching `CLCACHE_SINGLEFILE`'s inline-only contract). `arguments` and
/// `base_args` are shared across every job; each job appends its own
/// (optionally language-tagged) source path to `base_args` for the real
/// invocation.
pub fn run<R: RemoteHasher + Sync>(
    handles: &CacheHandles<R>,
    runner: &dyn CompilerRunner,
    compiler: &Path,
    cwd: &Path,
    basedir: Option<&Path>,
    env: &HashMap<String, String>,
    arguments: &Arguments,
    base_args: &[String],
    sources: &[SourceJob],
    direct_mode: bool,
    max_jobs: usize,
    single_file: bool,
) -> SchedulerOutcome {
    let max_jobs = if single_file { 1 } else { max_jobs.max(1) };

    let build_job = |source: &SourceJob| -> CompileJob {
        let mut full_args = base_args.to_vec();
        match &source.language_tag {
            Some(tag) => full_args.push(format!("{tag}{}", source.path.display())),
            None => full_args.push(source.path.to_string_lossy().into_owned()),
        }
        CompileJob {
            compiler: compiler.to_path_buf(),
            arguments: arguments.clone(),
            full_args,
            source_file: source.path.clone(),
            object_file: source.object_file.clone(),
            cwd: cwd.to_path_buf(),
            basedir: basedir.map(Path::to_path_buf),
            env: env.clone(),
            direct_mode,
        }
    };

    if single_file || sources.len() <= 1 {
        let mut outcome = SchedulerOutcome::default();
        for source in sources {
            let job = build_job(source);
            match compile_one(handles, runner, &job) {
                Ok(result) => {
                    print_output(&result.stdout, &result.stderr);
                    outcome.cleanup_required |= result.cleanup_required;
                    if result.exit_code != 0 && outcome.exit_code == 0 {
                        outcome.exit_code = result.exit_code;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "compile job failed");
                    if outcome.exit_code == 0 {
                        outcome.exit_code = 1;
                    }
                }
            }
        }
        return outcome;
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_jobs)
        .build()
        .expect("failed to build scheduler thread pool");

    let (tx, rx) = mpsc::channel();
    let output_lock = Mutex::new(());

    pool.scope(|scope| {
        for source in sources {
            let tx = tx.clone();
            let job = build_job(source);
            scope.spawn(move |_| {
                let result = compile_one(handles, runner, &job);
                let _ = tx.send(result);
            });
        }
        drop(tx);

        let mut outcome = SchedulerOutcome::default();
        let mut stop_reporting = false;

        for result in rx.iter() {
            match result {
                Ok(job_outcome) => {
                    if !stop_reporting {
                        let _guard = output_lock.lock().unwrap();
                        print_output(&job_outcome.stdout, &job_outcome.stderr);
                        drop(_guard);

                        outcome.cleanup_required |= job_outcome.cleanup_required;
                        if job_outcome.exit_code != 0 {
                            outcome.exit_code = job_outcome.exit_code;
                            stop_reporting = true;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "compile job failed");
                    if !stop_reporting {
                        outcome.exit_code = 1;
                        stop_reporting = true;
                    }
                }
            }
        }

        outcome
    })
}

fn print_output(stdout: &[u8], stderr: &[u8]) {
    let _ = std::io::stdout().write_all(stdout);
    let _ = std::io::stderr().write_all(stderr);
}
