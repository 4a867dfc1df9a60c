//! The command-line classifier: decides whether an already-expanded,
//! already-`CL`/`_CL_`-spliced argv is cacheable at all, and if it is,
//! splits it into the per-source jobs the scheduler fans out.

use std::path::{Path, PathBuf};

use clcache_fingerprint::Arguments;
use clcache_scheduler::SourceJob;
use clcache_stats::RejectionReason;

const SOURCE_EXTENSIONS: &[&str] = &["c", "cpp", "cxx", "cc"];

/// Flags whose value is attached directly to the flag letters (`/Ipath`,
/// never `/I path`), checked longest-prefix-first so `/FI` isn't mistaken
/// for `/I`.
const VALUE_FLAG_PREFIXES: &[&str] = &["FI", "FU", "AI", "I", "D", "U"];

/// What the classifier decided about one invocation.
pub enum ClassifyOutcome {
    /// The invocation is cacheable.
    Cacheable(CacheableInvocation),
    /// The invocation was rejected outright; callers run the real compiler
    /// unchanged and record the given rejection counter.
    Rejected(RejectionReason),
}

/// A classified, cacheable invocation: the shared fingerprinting arguments
/// plus one job per source file.
pub struct CacheableInvocation {
    /// Flags contributing to the fingerprint. Source paths, `/Fo`, `/Tc`,
    /// `/Tp`, and `/MP` are deliberately excluded — none of them affect the
    /// compiled bytes.
    pub arguments: Arguments,
    /// One job per source file, in argv order (forced-language sources
    /// first, then plain positional ones).
    pub sources: Vec<SourceJob>,
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_flag(body: &str) -> (String, String) {
    for prefix in VALUE_FLAG_PREFIXES {
        if let Some(rest) = body.strip_prefix(prefix) {
            if !rest.is_empty() {
                return (prefix.to_string(), rest.to_string());
            }
        }
    }
    (body.to_string(), String::new())
}

fn resolve_object_path(source: &Path, fo: Option<&str>, cwd: &Path, multi_source: bool) -> PathBuf {
    let stem_name = source
        .with_extension("obj")
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("out.obj"));

    match fo {
        None | Some("") => cwd.join(stem_name),
        Some(raw) if multi_source || raw.ends_with('\\') || raw.ends_with('/') => {
            cwd.join(raw).join(stem_name)
        }
        Some(raw) => cwd.join(raw),
    }
}

/// Classifies `argv` (the compiler binary itself already stripped) relative
/// to `cwd`, in the rejection order: no source file, multiple sources,
/// linking, precompiled headers, external debug info, preprocessing-only.
pub fn classify(argv: &[String], cwd: &Path) -> ClassifyOutcome {
    if argv.is_empty() {
        return ClassifyOutcome::Rejected(RejectionReason::InvalidArgument);
    }

    let mut arguments: Arguments = Arguments::new();
    let mut positional: Vec<String> = Vec::new();
    let mut forced: Vec<(String, String)> = Vec::new();
    let mut fo: Option<String> = None;
    let mut has_link = false;
    let mut has_pch = false;
    let mut has_debug_info = false;
    let mut has_pdb = false;
    let mut has_preprocess_only = false;

    for token in argv {
        let Some(body) = token.strip_prefix('/').or_else(|| token.strip_prefix('-')) else {
            positional.push(token.clone());
            continue;
        };

        if body.eq_ignore_ascii_case("link") {
            has_link = true;
            continue;
        }
        if let Some(rest) = body.strip_prefix("Tc") {
            forced.push(("Tc".to_string(), rest.to_string()));
            continue;
        }
        if let Some(rest) = body.strip_prefix("Tp") {
            forced.push(("Tp".to_string(), rest.to_string()));
            continue;
        }
        if let Some(rest) = body.strip_prefix("Fo") {
            fo = Some(rest.to_string());
            continue;
        }
        if body.starts_with("MP") {
            continue;
        }
        if body.starts_with("Yc") || body.starts_with("Yu") {
            has_pch = true;
            continue;
        }
        if body == "Zi" || body == "ZI" {
            has_debug_info = true;
        }
        if body.starts_with("Fd") {
            has_pdb = true;
        }
        if body == "E" || body == "EP" || body == "P" {
            has_preprocess_only = true;
        }

        let (key, value) = parse_flag(body);
        arguments.entry(key).or_default().push(value);
    }

    let mut sources: Vec<(PathBuf, Option<String>)> = forced
        .iter()
        .map(|(tag, path)| (PathBuf::from(path), Some(format!("/{tag}"))))
        .collect();
    for raw in &positional {
        let path = Path::new(raw);
        if has_source_extension(path) {
            sources.push((path.to_path_buf(), None));
        }
    }

    if sources.is_empty() {
        return ClassifyOutcome::Rejected(RejectionReason::NoSource);
    }
    if sources.len() > 1 && !forced.is_empty() {
        // A forced-language tag only disambiguates the one file it's
        // attached to; fanning the rest out per-source would lose it.
        return ClassifyOutcome::Rejected(RejectionReason::MultipleSources);
    }
    // `cl.exe` links by default; omitting `/c` means this invocation also
    // links, same as an explicit `/link` (original_source/clcache/cmdline.py:173).
    if has_link || !arguments.contains_key("c") {
        return ClassifyOutcome::Rejected(RejectionReason::Linking);
    }
    if has_pch {
        return ClassifyOutcome::Rejected(RejectionReason::Pch);
    }
    if has_debug_info && has_pdb {
        return ClassifyOutcome::Rejected(RejectionReason::ExternalDebugInfo);
    }
    if has_preprocess_only {
        return ClassifyOutcome::Rejected(RejectionReason::Preprocessing);
    }

    let multi_source = sources.len() > 1;
    let jobs = sources
        .into_iter()
        .map(|(path, language_tag)| {
            let object_file = resolve_object_path(&path, fo.as_deref(), cwd, multi_source);
            SourceJob {
                path,
                language_tag,
                object_file,
            }
        })
        .collect();

    ClassifyOutcome::Cacheable(CacheableInvocation {
        arguments,
        sources: jobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &[&str]) -> Vec<String> {
        s.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn no_source_file_is_rejected() {
        let outcome = classify(&toks(&["/c", "/Zi"]), Path::new("/build"));
        assert!(matches!(
            outcome,
            ClassifyOutcome::Rejected(RejectionReason::NoSource)
        ));
    }

    #[test]
    fn plain_multi_source_is_cacheable() {
        let outcome = classify(&toks(&["/c", "a.cpp", "b.cpp"]), Path::new("/build"));
        match outcome {
            ClassifyOutcome::Cacheable(invocation) => assert_eq!(invocation.sources.len(), 2),
            ClassifyOutcome::Rejected(_) => panic!("expected a cacheable invocation"),
        }
    }

    #[test]
    fn forced_language_multi_source_is_rejected() {
        let outcome = classify(&toks(&["/c", "/Tca.c", "b.cpp"]), Path::new("/build"));
        assert!(matches!(
            outcome,
            ClassifyOutcome::Rejected(RejectionReason::MultipleSources)
        ));
    }

    #[test]
    fn link_step_is_rejected() {
        let outcome = classify(&toks(&["a.cpp", "/link", "/OUT:a.exe"]), Path::new("/build"));
        assert!(matches!(
            outcome,
            ClassifyOutcome::Rejected(RejectionReason::Linking)
        ));
    }

    #[test]
    fn precompiled_header_is_rejected() {
        let outcome = classify(&toks(&["/c", "a.cpp", "/Ycstdafx.h"]), Path::new("/build"));
        assert!(matches!(
            outcome,
            ClassifyOutcome::Rejected(RejectionReason::Pch)
        ));
    }

    #[test]
    fn external_debug_info_is_rejected() {
        let outcome = classify(
            &toks(&["/c", "a.cpp", "/Zi", "/Fdshared.pdb"]),
            Path::new("/build"),
        );
        assert!(matches!(
            outcome,
            ClassifyOutcome::Rejected(RejectionReason::ExternalDebugInfo)
        ));
    }

    #[test]
    fn debug_info_without_shared_pdb_is_cacheable() {
        let outcome = classify(&toks(&["/c", "a.cpp", "/Zi"]), Path::new("/build"));
        assert!(matches!(outcome, ClassifyOutcome::Cacheable(_)));
    }

    #[test]
    fn preprocess_only_is_rejected() {
        let outcome = classify(&toks(&["/c", "a.cpp", "/E"]), Path::new("/build"));
        assert!(matches!(
            outcome,
            ClassifyOutcome::Rejected(RejectionReason::Preprocessing)
        ));
    }

    #[test]
    fn missing_c_flag_is_rejected_as_linking() {
        let outcome = classify(&toks(&["a.cpp"]), Path::new("/build"));
        assert!(matches!(
            outcome,
            ClassifyOutcome::Rejected(RejectionReason::Linking)
        ));
    }

    #[test]
    fn include_and_define_flags_populate_arguments() {
        let outcome = classify(
            &toks(&["/c", "a.cpp", "/Iinclude", "/DFOO=1"]),
            Path::new("/build"),
        );
        match outcome {
            ClassifyOutcome::Cacheable(invocation) => {
                assert_eq!(invocation.arguments.get("I").unwrap(), &["include"]);
                assert_eq!(invocation.arguments.get("D").unwrap(), &["FOO=1"]);
                assert!(!invocation.arguments.contains_key("Fo"));
            }
            ClassifyOutcome::Rejected(_) => panic!("expected a cacheable invocation"),
        }
    }

    #[test]
    fn fo_directory_is_joined_with_source_stem() {
        let outcome = classify(
            &toks(&["/c", "a.cpp", "/Foout\\"]),
            Path::new("/build"),
        );
        match outcome {
            ClassifyOutcome::Cacheable(invocation) => {
                assert_eq!(
                    invocation.sources[0].object_file,
                    Path::new("/build/out\\").join("a.obj")
                );
            }
            ClassifyOutcome::Rejected(_) => panic!("expected a cacheable invocation"),
        }
    }

    #[test]
    fn empty_argv_is_an_invalid_argument() {
        let outcome = classify(&[], Path::new("/build"));
        assert!(matches!(
            outcome,
            ClassifyOutcome::Rejected(RejectionReason::InvalidArgument)
        ));
    }
}
