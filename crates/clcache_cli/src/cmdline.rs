//! `expand(argv, env) -> argv'`: response-file splicing and the `CL`/`_CL_`
//! environment prefix/suffix, both treated as pure functions of a token
//! list plus already-read environment strings.

use anyhow::{bail, Context, Result};

/// Response files may reference further response files; this bounds the
/// recursion to guard against a cycle (`@a.rsp` containing `@a.rsp`).
const MAX_RESPONSE_FILE_DEPTH: u32 = 10;

/// Splits `raw` on whitespace, treating a double-quoted span as one token
/// (quotes themselves are stripped). Used for both response-file contents
/// and the `CL`/`_CL_` environment variables.
pub fn split_env_tokens(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Recursively expands every `@responseFile` token in `argv`, following the
/// original's `expandCommandLine` tokenization rules.
pub fn expand(argv: &[String]) -> Result<Vec<String>> {
    expand_depth(argv, 0)
}

fn expand_depth(argv: &[String], depth: u32) -> Result<Vec<String>> {
    if depth > MAX_RESPONSE_FILE_DEPTH {
        bail!("response files nested more than {MAX_RESPONSE_FILE_DEPTH} levels deep");
    }

    let mut out = Vec::with_capacity(argv.len());
    for token in argv {
        match token.strip_prefix('@') {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read response file {path}"))?;
                let nested = split_env_tokens(&contents);
                out.extend(expand_depth(&nested, depth + 1)?);
            }
            None => out.push(token.clone()),
        }
    }
    Ok(out)
}

/// Prepends `prefix` and appends `suffix` to `argv`, matching the original's
/// `extendCommandLineFromEnvironment` (`CL` before, `_CL_` after).
pub fn splice_cl_environment(argv: &[String], prefix: &[String], suffix: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(prefix.len() + argv.len() + suffix.len());
    out.extend(prefix.iter().cloned());
    out.extend(argv.iter().cloned());
    out.extend(suffix.iter().cloned());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(split_env_tokens("/c  /Zi  foo.cpp"), vec!["/c", "/Zi", "foo.cpp"]);
    }

    #[test]
    fn quoted_segment_is_one_token() {
        assert_eq!(
            split_env_tokens(r#"/I"C:\Program Files\inc" /c"#),
            vec![r"/IC:\Program Files\inc", "/c"]
        );
    }

    #[test]
    fn expand_splices_response_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let rsp = dir.path().join("args.rsp");
        std::fs::write(&rsp, "/c /Zi").unwrap();

        let argv = vec!["cl.exe".to_string(), format!("@{}", rsp.display())];
        let expanded = expand(&argv).unwrap();
        assert_eq!(expanded, vec!["cl.exe", "/c", "/Zi"]);
    }

    #[test]
    fn expand_recurses_into_nested_response_files() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("inner.rsp");
        std::fs::write(&inner, "/Zi").unwrap();
        let outer = dir.path().join("outer.rsp");
        std::fs::write(&outer, format!("/c @{}", inner.display())).unwrap();

        let argv = vec![format!("@{}", outer.display())];
        let expanded = expand(&argv).unwrap();
        assert_eq!(expanded, vec!["/c", "/Zi"]);
    }

    #[test]
    fn expand_guards_against_cyclical_response_files() {
        let dir = tempfile::tempdir().unwrap();
        let rsp = dir.path().join("cycle.rsp");
        std::fs::write(&rsp, format!("@{}", rsp.display())).unwrap();

        let argv = vec![format!("@{}", rsp.display())];
        assert!(expand(&argv).is_err());
    }

    #[test]
    fn splice_prepends_cl_and_appends_underscore_cl() {
        let argv = vec!["/c".to_string(), "foo.cpp".to_string()];
        let spliced = splice_cl_environment(
            &argv,
            &["/Zi".to_string()],
            &["/DFOO".to_string()],
        );
        assert_eq!(spliced, vec!["/Zi", "/c", "foo.cpp", "/DFOO"]);
    }
}
