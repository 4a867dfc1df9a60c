//! Parsing and stripping of `/showIncludes` notification lines.
//!
//! The notification format is deliberately locale-agnostic:
//! `^<word>: <phrase of words and spaces>:\s+<non-space path>$`. No regex
//! crate is pulled in for this — the grammar is simple enough to parse by
//! hand with two colon-splits.

use std::path::{Path, PathBuf};

/// Parses one line of compiler stdout as an include-notification line,
/// returning the raw captured path if it matches.
fn parse_notification_line(line: &str) -> Option<&str> {
    let first_colon = line.find(':')?;
    let (word, after_word) = line.split_at(first_colon);
    if word.is_empty() || word.chars().any(char::is_whitespace) {
        return None;
    }

    let rest = after_word.get(1..)?;
    let last_colon = rest.rfind(':')?;
    let after_last_colon = &rest[last_colon + 1..];
    let path = after_last_colon.trim_start();

    // The grammar requires at least one whitespace character between the
    // final `:` and the path; if nothing was trimmed there was none.
    if path.is_empty() || path.len() == after_last_colon.len() || path.chars().any(char::is_whitespace) {
        return None;
    }

    Some(path)
}

/// Normalizes a captured include path: absolute (relative to `cwd` if it
/// wasn't already) and lower-cased for a case-insensitive filesystem.
fn normalize(path: &str, cwd: &Path) -> PathBuf {
    let p = Path::new(path);
    let absolute = if p.is_absolute() {
        p.to_path_buf()
    } else {
        cwd.join(p)
    };
    PathBuf::from(absolute.to_string_lossy().to_lowercase())
}

/// Scans `stdout` for include-notification lines, returning the stdout with
/// those lines removed (when `strip` is set — i.e. the cache injected
/// `/showIncludes` itself) and the set of normalized include paths found,
/// excluding `source_file` itself.
///
/// Stripping happens unconditionally regardless of compiler exit status —
/// the safer of the two readings of an otherwise-unspecified detail.
pub fn extract_includes(
    stdout: &[u8],
    cwd: &Path,
    source_file: &Path,
    strip: bool,
) -> (Vec<u8>, Vec<PathBuf>) {
    let text = String::from_utf8_lossy(stdout);
    let source_normalized = normalize(&source_file.to_string_lossy(), cwd);

    let mut kept_lines = Vec::new();
    let mut includes = Vec::new();

    for line in text.lines() {
        match parse_notification_line(line) {
            Some(raw_path) => {
                let normalized = normalize(raw_path, cwd);
                if normalized != source_normalized {
                    includes.push(normalized);
                }
                if !strip {
                    kept_lines.push(line);
                }
            }
            None => kept_lines.push(line),
        }
    }

    let mut rebuilt = kept_lines.join("\n");
    if text.ends_with('\n') && !rebuilt.is_empty() {
        rebuilt.push('\n');
    }
    (rebuilt.into_bytes(), includes)
}

/// `true` if `args` already requests `/showIncludes` in some casing.
pub fn requests_show_includes(args: &[String]) -> bool {
    args.iter()
        .any(|a| a.eq_ignore_ascii_case("/showIncludes") || a.eq_ignore_ascii_case("-showIncludes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_english_notification() {
        let line = "Note: including file: C:\\headers\\foo.h";
        assert_eq!(
            parse_notification_line(line),
            Some("C:\\headers\\foo.h")
        );
    }

    #[test]
    fn parses_localized_notification() {
        let line = "Remarque: inclusion du fichier: /usr/include/foo.h";
        assert_eq!(parse_notification_line(line), Some("/usr/include/foo.h"));
    }

    #[test]
    fn non_notification_line_passes_through() {
        assert_eq!(parse_notification_line("hello.cpp"), None);
        assert_eq!(parse_notification_line("warning C1234: something"), None);
    }

    #[test]
    fn requires_whitespace_before_path() {
        assert_eq!(parse_notification_line("Note: including file:foo.h"), None);
    }

    #[test]
    fn extract_includes_strips_and_excludes_source() {
        let stdout = b"Note: including file: /build/foo.h\nreal diagnostic\nNote: including file: /build/src.cpp\n";
        let (kept, includes) = extract_includes(
            stdout,
            Path::new("/build"),
            Path::new("src.cpp"),
            true,
        );
        assert_eq!(String::from_utf8(kept).unwrap(), "real diagnostic\n");
        assert_eq!(includes, vec![PathBuf::from("/build/foo.h")]);
    }

    #[test]
    fn extract_includes_keeps_lines_when_not_stripping() {
        let stdout = b"Note: including file: /build/foo.h\n";
        let (kept, includes) = extract_includes(stdout, Path::new("/build"), Path::new("x.cpp"), false);
        assert_eq!(
            String::from_utf8(kept).unwrap(),
            "Note: including file: /build/foo.h\n"
        );
        assert_eq!(includes.len(), 1);
    }

    #[test]
    fn detects_show_includes_flag_case_insensitively() {
        assert!(requests_show_includes(&["/ShowIncludes".to_string()]));
        assert!(!requests_show_includes(&["/c".to_string()]));
    }
}
