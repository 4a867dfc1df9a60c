//! Order-independence and basedir-invariance properties for the
//! fingerprinting pipeline.

use std::path::Path;

use clcache_fingerprint::{canonical_cmdline, collapse_path, Arguments};
use proptest::prelude::*;

fn flag_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("D".to_string()),
        Just("Zi".to_string()),
        Just("Gy".to_string()),
        Just("EHsc".to_string()),
        Just("I".to_string()),
    ]
}

fn arguments_strategy() -> impl Strategy<Value = Arguments> {
    prop::collection::btree_map(flag_name(), Just(vec!["x".to_string()]), 0..5)
}

proptest! {
    /// The canonical command line depends only on the (key, values) pairs
    /// present, never on the order a caller happened to insert them in —
    /// `Arguments` is a `BTreeMap`, so two maps built from permuted
    /// insertions that end up with the same entries always iterate
    /// identically.
    #[test]
    fn canonical_cmdline_is_insertion_order_independent(arguments in arguments_strategy()) {
        let forward = canonical_cmdline(&arguments, &[], Path::new("/build"), None);

        let mut rebuilt: Arguments = Arguments::new();
        for (key, values) in arguments.iter().rev() {
            rebuilt.insert(key.clone(), values.clone());
        }
        let backward = canonical_cmdline(&rebuilt, &[], Path::new("/build"), None);

        prop_assert_eq!(forward, backward);
    }

    /// A path under the configured basedir collapses to the same string
    /// regardless of how deep the build's current working directory is,
    /// since basedir collapse happens after the path is already absolute.
    #[test]
    fn basedir_collapse_is_invariant_to_cwd(suffix in "[a-z]{1,8}") {
        let basedir = Path::new("/work/project");
        let absolute_path = format!("/work/project/src/{suffix}.h");

        let from_root_cwd = collapse_path(&absolute_path, Path::new("/"), Some(basedir));
        let from_deep_cwd = collapse_path(
            &absolute_path,
            Path::new("/some/unrelated/deep/cwd"),
            Some(basedir),
        );

        prop_assert_eq!(&from_root_cwd, &from_deep_cwd);
        prop_assert!(from_root_cwd.starts_with('?'));
    }
}
