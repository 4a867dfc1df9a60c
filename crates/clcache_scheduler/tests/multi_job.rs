//! Exercises [`clcache_scheduler::run`] across several sources at once
//! against a stub compiler, covering `/MP` job-count parsing end to end
//! and the scheduler's exit-code/cleanup aggregation.

use std::collections::HashMap;
use std::path::Path;

use clcache_compile::{CacheHandles, CompileError, CompilerRunner, RunOutput};
use clcache_fingerprint::Arguments;
use clcache_scheduler::{build_base_cmdline, job_count, run, SourceJob};

struct StubCompiler {
    fail_sources: Vec<String>,
}

impl CompilerRunner for StubCompiler {
    fn run(
        &self,
        _compiler: &Path,
        args: &[String],
        _cwd: &Path,
        _env: &HashMap<String, String>,
    ) -> Result<RunOutput, CompileError> {
        let source = args.last().cloned().unwrap_or_default();
        if self.fail_sources.iter().any(|f| source.ends_with(f)) {
            return Ok(RunOutput {
                exit_code: 2,
                stdout: Vec::new(),
                stderr: b"error C1234: fake failure\n".to_vec(),
            });
        }
        Ok(RunOutput {
            exit_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}

fn write_sources(dir: &Path, names: &[&str]) -> Vec<SourceJob> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let path = dir.join(name);
            std::fs::write(&path, format!("int f{i}(){{return {i};}}")).unwrap();
            let object = dir.join(name).with_extension("obj");
            std::fs::write(&object, format!("payload-{i}")).unwrap();
            SourceJob {
                path,
                language_tag: None,
                object_file: object,
            }
        })
        .collect()
}

#[test]
fn mp4_requests_four_jobs_from_the_raw_cmdline() {
    let cmd_line: Vec<String> = vec!["/c".into(), "/MP4".into(), "a.cpp".into(), "b.cpp".into()];
    assert_eq!(job_count(&cmd_line), 4);

    let sources = [Path::new("a.cpp"), Path::new("b.cpp")];
    let base = build_base_cmdline(&cmd_line, &sources);
    assert_eq!(base, vec!["/c".to_string()]);
}

#[test]
fn every_source_compiles_and_shares_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cl.exe"), b"fake compiler").unwrap();
    let sources = write_sources(dir.path(), &["a.cpp", "b.cpp", "c.cpp", "d.cpp"]);

    let handles = CacheHandles::new(dir.path());
    let compiler = StubCompiler {
        fail_sources: Vec::new(),
    };

    let outcome = run(
        &handles,
        &compiler,
        &dir.path().join("cl.exe"),
        dir.path(),
        None,
        &HashMap::new(),
        &Arguments::new(),
        &["/c".to_string()],
        &sources,
        true,
        4,
        false,
    );

    assert_eq!(outcome.exit_code, 0);

    let stats = clcache_stats::Statistics::open(dir.path());
    assert_eq!(stats.cache_entries(), 4);
}

#[test]
fn a_failing_source_sets_a_nonzero_exit_code_without_stopping_the_others() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cl.exe"), b"fake compiler").unwrap();
    let sources = write_sources(dir.path(), &["ok1.cpp", "bad.cpp", "ok2.cpp"]);

    let handles = CacheHandles::new(dir.path());
    let compiler = StubCompiler {
        fail_sources: vec!["bad.cpp".to_string()],
    };

    let outcome = run(
        &handles,
        &compiler,
        &dir.path().join("cl.exe"),
        dir.path(),
        None,
        &HashMap::new(),
        &Arguments::new(),
        &["/c".to_string()],
        &sources,
        true,
        4,
        false,
    );

    assert_eq!(outcome.exit_code, 2);

    let stats = clcache_stats::Statistics::open(dir.path());
    assert_eq!(stats.cache_entries(), 2);
}

#[test]
fn single_file_mode_forces_sequential_execution_of_every_source() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("cl.exe"), b"fake compiler").unwrap();
    let sources = write_sources(dir.path(), &["only.cpp"]);

    let handles = CacheHandles::new(dir.path());
    let compiler = StubCompiler {
        fail_sources: Vec::new(),
    };

    let outcome = run(
        &handles,
        &compiler,
        &dir.path().join("cl.exe"),
        dir.path(),
        None,
        &HashMap::new(),
        &Arguments::new(),
        &["/c".to_string()],
        &sources,
        true,
        8,
        true,
    );

    assert_eq!(outcome.exit_code, 0);
    let stats = clcache_stats::Statistics::open(dir.path());
    assert_eq!(stats.cache_entries(), 1);
}
