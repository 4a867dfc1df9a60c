//! Canonical command-line reconstruction, shared by both the direct-mode
//! manifest hash and the no-direct object key.
//!
//! The classifier (out of scope here, lives in `clcache_cli`) hands us
//! already-parsed `arguments`/`input_files`; everything below is a pure
//! function of those plus a working directory and an optional basedir.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Flags whose values are filesystem paths and therefore go through the
/// absolute + lower-case + basedir-collapse pipeline before hashing.
pub const PATH_BEARING_FLAGS: &[&str] = &["AI", "I", "FU"];

/// Switches that only influence the preprocessor (or the output path, or
/// parallelism) and are stripped from the no-direct object key's
/// normalized command line, since the preprocessed source already carries
/// their combined effect.
pub const NO_DIRECT_STRIP_FLAGS: &[&str] = &[
    "AI", "C", "E", "P", "FI", "u", "X", "FU", "D", "EP", "Fx", "U", "I", "Fo", "MP",
];

/// Parsed, still language-agnostic view of a `cl.exe` invocation: flags
/// mapped to their (possibly repeated) values, plus the positional input
/// files. Produced by the classifier; consumed here and by the compile
/// pipeline.
pub type Arguments = BTreeMap<String, Vec<String>>;

/// Makes `raw` absolute against `cwd` (if it isn't already), lower-cases it
/// for a case-insensitive filesystem, and replaces a matching `basedir`
/// prefix with the placeholder `?`.
pub fn collapse_path(raw: &str, cwd: &Path, basedir: Option<&Path>) -> String {
    let path = Path::new(raw);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let lowered = absolute.to_string_lossy().to_lowercase();

    match basedir {
        Some(base) => {
            let base_lowered = base.to_string_lossy().to_lowercase();
            if !base_lowered.is_empty() && lowered.starts_with(&base_lowered) {
                format!("?{}", &lowered[base_lowered.len()..])
            } else {
                lowered
            }
        }
        None => lowered,
    }
}

/// Reverses [`collapse_path`]'s basedir substitution: a stored path
/// beginning with the `?` placeholder is rejoined with `basedir`; anything
/// else is returned unchanged. Used when re-reading a manifest entry's
/// `includeFiles` to hash their current on-disk contents.
pub fn expand_placeholder(stored: &Path, basedir: Option<&Path>) -> PathBuf {
    match (stored.to_str(), basedir) {
        (Some(s), Some(base)) if s.starts_with('?') => {
            let base_str = base.to_string_lossy().to_lowercase();
            PathBuf::from(format!("{base_str}{}", &s[1..]))
        }
        _ => stored.to_path_buf(),
    }
}

/// Reconstructs the canonical command line from parsed `arguments` and
/// `input_files`: keys in lexicographic order (free, since `Arguments` is a
/// `BTreeMap`), each path-bearing value basedir-collapsed, followed by the
/// collapsed input files.
pub fn canonical_cmdline(
    arguments: &Arguments,
    input_files: &[String],
    cwd: &Path,
    basedir: Option<&Path>,
) -> String {
    let mut parts = Vec::new();

    for (flag, values) in arguments {
        for value in values {
            let rendered = if PATH_BEARING_FLAGS.contains(&flag.as_str()) {
                collapse_path(value, cwd, basedir)
            } else {
                value.clone()
            };
            parts.push(format!("/{flag}{rendered}"));
        }
    }

    for input in input_files {
        parts.push(collapse_path(input, cwd, basedir));
    }

    parts.join(" ")
}

/// Drops every key in [`NO_DIRECT_STRIP_FLAGS`] from `arguments`, for the
/// no-direct object key's normalized command line.
pub fn strip_preprocessor_only_flags(arguments: &Arguments) -> Arguments {
    arguments
        .iter()
        .filter(|(flag, _)| !NO_DIRECT_STRIP_FLAGS.contains(&flag.as_str()))
        .map(|(flag, values)| (flag.clone(), values.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &[&str])]) -> Arguments {
        pairs
            .iter()
            .map(|(k, vs)| {
                (
                    k.to_string(),
                    vs.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn keys_are_emitted_lexicographically() {
        let arguments = args(&[("Zi", &[""]), ("D", &["FOO"]), ("c", &[""])]);
        let cmdline = canonical_cmdline(&arguments, &[], Path::new("/build"), None);
        let d_pos = cmdline.find("/DFOO").unwrap();
        let zi_pos = cmdline.find("/Zi").unwrap();
        let c_pos = cmdline.find("/c").unwrap();
        assert!(d_pos < zi_pos);
        assert!(zi_pos < c_pos);
    }

    #[test]
    fn path_bearing_values_are_collapsed_case_insensitively() {
        let arguments = args(&[("I", &["Include"])]);
        let cmdline = canonical_cmdline(&arguments, &[], Path::new("/Build/Proj"), None);
        assert_eq!(cmdline, "/I/build/proj/include");
    }

    #[test]
    fn non_path_flags_pass_through_unmodified() {
        let arguments = args(&[("D", &["FOO=Bar"])]);
        let cmdline = canonical_cmdline(&arguments, &[], Path::new("/build"), None);
        assert_eq!(cmdline, "/DFOO=Bar");
    }

    #[test]
    fn basedir_prefix_collapses_to_placeholder() {
        let basedir = Path::new("/work/project");
        let arguments = args(&[("I", &["/work/project/include"])]);
        let cmdline = canonical_cmdline(&arguments, &[], Path::new("/whatever"), Some(basedir));
        assert_eq!(cmdline, "/I?/include");
    }

    #[test]
    fn paths_outside_basedir_are_untouched() {
        let basedir = Path::new("/work/project");
        let arguments = args(&[("I", &["/other/include"])]);
        let cmdline = canonical_cmdline(&arguments, &[], Path::new("/whatever"), Some(basedir));
        assert_eq!(cmdline, "/I/other/include");
    }

    #[test]
    fn input_files_are_appended_after_flags() {
        let arguments = args(&[("c", &[""])]);
        let cmdline = canonical_cmdline(
            &arguments,
            &["foo.cpp".to_string()],
            Path::new("/build"),
            None,
        );
        assert_eq!(cmdline, "/c /build/foo.cpp");
    }

    #[test]
    fn strip_removes_every_preprocessor_only_flag() {
        let arguments = args(&[
            ("D", &["X"]),
            ("Fo", &["out.obj"]),
            ("MP", &[""]),
            ("Zi", &[""]),
        ]);
        let stripped = strip_preprocessor_only_flags(&arguments);
        assert!(!stripped.contains_key("D"));
        assert!(!stripped.contains_key("Fo"));
        assert!(!stripped.contains_key("MP"));
        assert!(stripped.contains_key("Zi"));
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let arguments = args(&[("I", &["sub/dir"])]);
        let cmdline = canonical_cmdline(&arguments, &[], Path::new("/build"), None);
        assert_eq!(cmdline, "/I/build/sub/dir");
    }
}
