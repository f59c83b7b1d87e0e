//! Exact output-file-set assertion

use std::collections::BTreeSet;

use crate::error::{HarnessError, Result};

/// Files in `expected` but not `actual`, and in `actual` but not `expected`.
pub fn symmetric_difference(
    actual: &BTreeSet<String>,
    expected: &BTreeSet<String>,
) -> (Vec<String>, Vec<String>) {
    let missing = expected.difference(actual).cloned().collect();
    let unexpected = actual.difference(expected).cloned().collect();
    (missing, unexpected)
}

/// Fail unless `actual` and `expected` hold exactly the same names.
///
/// A renamed file shows up once on each side of the difference.
pub fn assert_outputs(actual: &BTreeSet<String>, expected: &BTreeSet<String>) -> Result<()> {
    if actual == expected {
        return Ok(());
    }
    let (missing, unexpected) = symmetric_difference(actual, expected);
    Err(HarnessError::OutputMismatch {
        missing,
        unexpected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_equal_sets_pass() {
        assert!(assert_outputs(&set(&["a.html", "b.css"]), &set(&["b.css", "a.html"])).is_ok());
        assert!(assert_outputs(&set(&[]), &set(&[])).is_ok());
    }

    #[test]
    fn test_rename_reports_both_sides() {
        let error = assert_outputs(
            &set(&["test.html", "foo01.xyz"]),
            &set(&["test.html", "foo1.xyz"]),
        )
        .unwrap_err();
        match error {
            HarnessError::OutputMismatch { missing, unexpected } => {
                assert_eq!(missing, vec!["foo1.xyz"]);
                assert_eq!(unexpected, vec!["foo01.xyz"]);
            }
            other => panic!("expected output mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_difference_is_sorted() {
        let (missing, unexpected) =
            symmetric_difference(&set(&["z", "y", "a"]), &set(&["c", "b", "a"]));
        assert_eq!(missing, vec!["b", "c"]);
        assert_eq!(unexpected, vec!["y", "z"]);
    }

    #[test]
    fn test_extra_file_fails() {
        let error = assert_outputs(&set(&["a.html", "a.css"]), &set(&["a.html"])).unwrap_err();
        assert!(error.is_assertion());
    }
}
