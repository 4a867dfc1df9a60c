//! `/MP` parsing and base command-line construction. Pure functions of a
//! token list — no environment reads, so the rest of the crate's
//! host-dependent pieces (thread count, the real worker pool) stay
//! independently testable.

use std::path::Path;

/// Forced-language prefixes tagging a positional argument as a source file
/// in a specific language, overriding extension sniffing.
const FORCED_LANGUAGE_PREFIXES: &[&str] = &["/Tc", "/Tp", "-Tc", "-Tp"];

/// Determines worker-pool size from `/MP` on `cmd_line`.
///
/// The *last* token starting with `/MP` decides, regardless of whether
/// earlier ones were well-formed: nothing after it means bare `/MP` (host
/// CPU count); all-digit trailing characters parse as the count; anything
/// else is malformed and counts as no count at all (1), it does not fall
/// back to an earlier `/MP` token. No `/MP` token at all is also 1.
pub fn job_count(cmd_line: &[String]) -> usize {
    match cmd_line.iter().rev().find(|tok| tok.starts_with("/MP")) {
        None => 1,
        Some(tok) => {
            let rest = &tok["/MP".len()..];
            if rest.is_empty() {
                host_cpu_count()
            } else if rest.chars().all(|c| c.is_ascii_digit()) {
                rest.parse().unwrap_or(1)
            } else {
                1
            }
        }
    }
}

fn host_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Strips every token equal to one of `sources`, starting with a
/// forced-language prefix, or starting with `/MP`, leaving the flags shared
/// by every per-source job.
pub fn build_base_cmdline(cmd_line: &[String], sources: &[&Path]) -> Vec<String> {
    cmd_line
        .iter()
        .filter(|tok| {
            if tok.starts_with("/MP") {
                return false;
            }
            if FORCED_LANGUAGE_PREFIXES.iter().any(|p| tok.starts_with(p)) {
                return false;
            }
            !sources.iter().any(|s| tok.as_str() == s.to_string_lossy())
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn toks(s: &[&str]) -> Vec<String> {
        s.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn no_mp_token_is_one_job() {
        assert_eq!(job_count(&toks(&["/c", "a.cpp"])), 1);
    }

    #[test]
    fn bare_mp_is_host_cpu_count() {
        assert_eq!(job_count(&toks(&["/MP"])), host_cpu_count());
    }

    #[test]
    fn mp_with_digits_parses() {
        assert_eq!(job_count(&toks(&["/MP8"])), 8);
    }

    #[test]
    fn malformed_trailing_characters_count_as_one() {
        assert_eq!(job_count(&toks(&["/MPfoo"])), 1);
    }

    #[test]
    fn last_mp_wins_even_when_later_one_is_malformed() {
        assert_eq!(job_count(&toks(&["/MP8", "/MPfoo"])), 1);
        assert_eq!(job_count(&toks(&["/MPfoo", "/MP8"])), 8);
    }

    #[test]
    fn base_cmdline_strips_sources_language_tags_and_mp() {
        let cmd_line = toks(&["/c", "/MP4", "/Tp", "a.cpp", "/Zi"]);
        let sources = [Path::new("a.cpp")];
        let base = build_base_cmdline(&cmd_line, &sources);
        assert_eq!(base, toks(&["/c", "/Zi"]));
    }
}
