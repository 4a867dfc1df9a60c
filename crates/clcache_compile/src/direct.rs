//! Direct mode: probes a manifest keyed on the source file's own content
//! before ever invoking the compiler, and re-probes its recorded include
//! sets against what's currently on disk.

use std::path::PathBuf;

use clcache_digest::{Digest, RemoteHasher};
use clcache_fingerprint::{
    canonical_cmdline, collapse_path, compiler_hash, direct_manifest_hash, direct_object_key,
    expand_placeholder, includes_content_hash,
};
use clcache_stats::MissReason;
use clcache_store::{Manifest, ManifestEntry};

use crate::error::CompileError;
use crate::handles::CacheHandles;
use crate::job::{CompileJob, CompileOutcome};
use crate::runner::CompilerRunner;
use crate::showincludes::{extract_includes, requests_show_includes};

/// Runs `job` through direct mode against `handles`.
pub fn compile_direct<R: RemoteHasher>(
    handles: &CacheHandles<R>,
    runner: &dyn CompilerRunner,
    job: &CompileJob,
) -> Result<CompileOutcome, CompileError> {
    let compiler_digest = compiler_hash(&job.compiler)?;
    let source_as_input = vec![job.source_file.to_string_lossy().into_owned()];
    let cmdline = canonical_cmdline(
        &job.arguments,
        &source_as_input,
        &job.cwd,
        job.basedir.as_deref(),
    );
    let manifest_hash = direct_manifest_hash(
        &handles.hasher,
        &job.source_file,
        &compiler_digest,
        &cmdline,
        handles.manifest_version,
    )?;

    let (manifest, hit_key, had_manifest) = {
        let _guard = handles.manifests.lock_for(&manifest_hash).acquire()?;
        let mut manifest = handles.manifests.get(&manifest_hash).unwrap_or_default();
        let had_manifest = !manifest.entries().is_empty();

        let hit = probe_manifest(&manifest, handles, job.basedir.as_deref());
        if let Some((index, _)) = hit {
            if index != 0 {
                manifest.touch(index);
                handles.manifests.set(&manifest_hash, &manifest)?;
            }
        }

        (manifest, hit.map(|(_, key)| key), had_manifest)
    };

    if let Some(key) = hit_key {
        if handles.objects.has(&key) {
            return cache_hit(handles, job, &key);
        }
    }

    // A manifest existed but either no entry matched the current include
    // contents, or it matched an object key the object store no longer has
    // (evicted). spec.md's own accounting folds both into HeaderChangedMiss
    // rather than a distinct evicted-via-manifest reason.
    let miss_reason = if had_manifest {
        MissReason::HeaderChanged
    } else {
        MissReason::SourceChanged
    };

    run_and_record(handles, runner, job, &manifest_hash, manifest, miss_reason)
}

/// Finds the first manifest entry (MRU-first) whose recorded include-content
/// hash still matches the current on-disk contents, expanding any basedir
/// placeholder before re-reading each header. Entries that fail to hash
/// (a header went missing) or no longer match are skipped, not treated as
/// errors.
fn probe_manifest<R: RemoteHasher>(
    manifest: &Manifest,
    handles: &CacheHandles<R>,
    basedir: Option<&std::path::Path>,
) -> Option<(usize, Digest)> {
    for (index, entry) in manifest.entries().iter().enumerate() {
        let expanded: Vec<PathBuf> = entry
            .include_files
            .iter()
            .map(|p| expand_placeholder(p, basedir))
            .collect();

        match includes_content_hash(&handles.hasher, &expanded) {
            Ok(hash) if hash == entry.includes_content_hash => {
                return Some((index, entry.object_hash));
            }
            _ => continue,
        }
    }
    None
}

/// Serves a confirmed hit: records it, replaces any stale object file the
/// build directory already has, and copies the cached one in. Shared with
/// no-direct mode, whose object-store probe is otherwise identical.
pub(crate) fn cache_hit<R: RemoteHasher>(
    handles: &CacheHandles<R>,
    job: &CompileJob,
    key: &Digest,
) -> Result<CompileOutcome, CompileError> {
    let _guard = handles.objects.lock_for(key).acquire()?;
    let artifacts = handles.objects.get(key)?;
    handles.record_hit()?;

    if artifacts.object_file_path.is_some() {
        let _ = std::fs::remove_file(&job.object_file);
        handles
            .objects
            .copy_object_to(key, &job.object_file, &handles.copy_opts)?;
    }

    Ok(CompileOutcome {
        exit_code: 0,
        stdout: artifacts.stdout,
        stderr: artifacts.stderr,
        cleanup_required: false,
    })
}

/// The miss path: runs the compiler for real, inserts the result into the
/// object store, and records a new manifest entry. The manifest is only
/// persisted when the compile actually succeeded.
fn run_and_record<R: RemoteHasher>(
    handles: &CacheHandles<R>,
    runner: &dyn CompilerRunner,
    job: &CompileJob,
    manifest_hash: &Digest,
    mut manifest: Manifest,
    miss_reason: MissReason,
) -> Result<CompileOutcome, CompileError> {
    let caller_requested_show_includes = requests_show_includes(&job.full_args);
    let mut args = job.full_args.clone();
    if !caller_requested_show_includes {
        args.push("/showIncludes".to_string());
    }

    let run = runner.run(&job.compiler, &args, &job.cwd, &job.env)?;
    let (stdout, include_files) = extract_includes(
        &run.stdout,
        &job.cwd,
        &job.source_file,
        !caller_requested_show_includes,
    );

    // Bytes newly written to the object store for this insertion; stays 0
    // when the compiler produced no object file, rather than referencing an
    // uninitialized size.
    let mut size = 0u64;

    if run.exit_code == 0 {
        let includes_hash = includes_content_hash(&handles.hasher, &include_files)?;
        let object_key = direct_object_key(manifest_hash, &includes_hash);

        let object_src = job.object_file.exists().then_some(job.object_file.as_path());
        let already_cached = handles.objects.has(&object_key);

        {
            let _guard = handles.objects.lock_for(&object_key).acquire()?;
            if !already_cached {
                size = handles
                    .objects
                    .set(&object_key, object_src, &stdout, &run.stderr, &handles.copy_opts)?;
            }
        }

        let collapsed_includes = include_files
            .iter()
            .map(|p| PathBuf::from(collapse_path(&p.to_string_lossy(), &job.cwd, job.basedir.as_deref())))
            .collect();
        manifest.add_entry(ManifestEntry {
            include_files: collapsed_includes,
            includes_content_hash: includes_hash,
            object_hash: object_key,
        });
        handles.manifests.set(manifest_hash, &manifest)?;

        let cleanup_required = handles.with_stats(|stats, config| {
            stats.record_miss(miss_reason);
            if !already_cached {
                stats.set_cache_entries(stats.cache_entries() + 1);
                stats.set_cache_size(stats.cache_size() + size);
            }
            stats.cache_size() >= config.maximum_cache_size()
        })?;

        return Ok(CompileOutcome {
            exit_code: run.exit_code,
            stdout,
            stderr: run.stderr,
            cleanup_required,
        });
    }

    handles.record_miss(miss_reason)?;
    Ok(CompileOutcome {
        exit_code: run.exit_code,
        stdout,
        stderr: run.stderr,
        cleanup_required: false,
    })
}
