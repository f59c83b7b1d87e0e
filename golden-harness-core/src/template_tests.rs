//! Tests for filename template expansion

use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn test_plain_template_is_untouched() {
    assert_eq!(expand("foo.xyz", 1), "foo.xyz");
    assert_eq!(expand("foo", 42), "foo");
    assert_eq!(expand("", 3), "");
}

#[test]
fn test_simple_placeholder() {
    assert_eq!(expand("fo%do.xyz", 1), "fo1o.xyz");
    assert_eq!(expand("fo%do.xyz", 2), "fo2o.xyz");
    assert_eq!(expand("fo%do.xyz", 13), "fo13o.xyz");
    assert_eq!(expand("%d", 5), "5");
}

#[test]
fn test_zero_padding() {
    assert_eq!(expand("fo%03do.xyz", 7), "fo007o.xyz");
    assert_eq!(expand("fo%03do.xyz", 1234), "fo1234o.xyz");
    assert_eq!(expand("foo%03d.xyz", 3), "foo003.xyz");
    // A width without the leading zero still pads with zeros.
    assert_eq!(expand("p%4d", 12), "p0012");
    assert_eq!(expand("p%0d", 12), "p12");
}

#[test]
fn test_only_first_placeholder_is_substituted() {
    assert_eq!(expand("f%do%do.xyz", 1), "f1o%do.xyz");
    assert_eq!(expand("f%do%do.xyz", 2), "f2o%do.xyz");
    assert_eq!(expand("%d%03d", 9), "9%03d");
}

#[test]
fn test_inert_conversions_stay_literal() {
    for template in ["f%soo.xyz", "f%poo.xyz", "f%noo.xyz", "foo%x", "%"] {
        for page in [1, 2, 3] {
            assert_eq!(expand(template, page), template);
        }
    }
}

#[test]
fn test_escape_collapses_to_single_marker() {
    assert_eq!(expand("f%%oo.xyz", 1), "f%oo.xyz");
    assert_eq!(expand("f%%oo.xyz", 99), "f%oo.xyz");
    assert_eq!(expand("foo%%.html", 2), "foo%.html");
}

#[test]
fn test_escape_wins_over_directive() {
    // `%%d` is an escaped marker followed by a literal `d`.
    assert_eq!(expand("f%%d.xyz", 4), "f%d.xyz");
    // `%%%d` is an escape pair followed by a directive.
    assert_eq!(expand("f%%%d.xyz", 4), "f%4.xyz");
    assert_eq!(expand("f%%o%do.xyz", 2), "f%o2o.xyz");
    assert_eq!(expand("fo%do%%.xyz", 3), "fo3o%.xyz");
}

#[test]
fn test_malformed_directive_falls_back_to_literal() {
    assert_eq!(expand("f%02%doo.xyz", 1), "f%021oo.xyz");
    assert_eq!(expand("f%02%doo.xyz", 3), "f%023oo.xyz");
    assert_eq!(expand("f%0x.xyz", 1), "f%0x.xyz");
    assert_eq!(expand("f%-3d.xyz", 1), "f%-3d.xyz");
    assert_eq!(expand("trailing%03", 1), "trailing%03");
}

#[test]
fn test_unrepresentable_width_is_literal() {
    let template = "f%99999999999999999999999d.xyz";
    assert_eq!(expand(template, 1), template);
    assert!(!contains_placeholder(template));
}

#[test]
fn test_oversized_width_is_literal() {
    for template in ["f%70000d.xyz", "f%99999999999999d.xyz", "f%0256d.xyz"] {
        assert_eq!(expand(template, 1), template);
        assert!(!contains_placeholder(template));
    }

    let widest = format!("%0{}d", MAX_WIDTH);
    let expanded = expand(&widest, 7);
    assert_eq!(expanded.len(), MAX_WIDTH);
    assert!(expanded.ends_with("007"));
}

#[test]
fn test_non_ascii_text_is_preserved() {
    assert_eq!(expand("página-%02d-ü.html", 5), "página-05-ü.html");
    assert_eq!(expand("日本%d語", 1), "日本1語");
}

#[test]
fn test_parse_parts() {
    let template = Template::parse("a%%b%05dc%dd");
    assert_eq!(template.prefix(), "a%b");
    assert_eq!(template.placeholder(), Some(Placeholder { width: Some(5) }));
    assert_eq!(template.suffix(), "c%dd");

    let literal = Template::parse("a%sb");
    assert_eq!(literal.prefix(), "a%sb");
    assert_eq!(literal.placeholder(), None);
    assert_eq!(literal.suffix(), "");
}

#[test]
fn test_display_is_canonical() {
    assert_eq!(Template::parse("f%%o%3do%d").to_string(), "f%%o%03do%%d");
    assert_eq!(Template::parse("plain").to_string(), "plain");
}

#[test]
fn test_contains_placeholder() {
    assert!(contains_placeholder("foo%d.xyz"));
    assert!(contains_placeholder("foo%12d"));
    assert!(!contains_placeholder("foo.xyz"));
    assert!(!contains_placeholder("foo%%d"));
    assert!(!contains_placeholder("foo%s"));
}

#[test]
fn test_suffix_and_file_name() {
    assert_eq!(file_name("a/b/c.PDF"), "c.PDF");
    assert_eq!(file_name("dir/"), "");
    assert_eq!(suffix("a/b/c.PDF"), ".pdf");
    assert_eq!(suffix("a.b/c"), "");
    assert_eq!(suffix("archive.tar.GZ"), ".gz");
}

#[test]
fn test_inject_placeholder() {
    assert_eq!(inject_placeholder("foo.xyz"), "foo%d.xyz");
    assert_eq!(inject_placeholder("foo"), "foo%d");
    assert_eq!(inject_placeholder("f%soo.xyz"), "f%soo%d.xyz");
    assert_eq!(inject_placeholder("fo%03do.xyz"), "fo%03do.xyz");
    assert_eq!(inject_placeholder("dir.d/page"), "dir.d/page%d");
}

#[test]
fn test_page_naming_defaults() {
    let naming = PageNaming::resolve("test/3-pages.pdf", None, None);
    assert_eq!(naming.html, "3-pages.html");
    assert_eq!(naming.page_template, "3-pages%d.page");

    let naming = PageNaming::resolve("issue501", None, None);
    assert_eq!(naming.html, "issue501.html");
    assert_eq!(naming.page_template, "issue501%d.page");

    let naming = PageNaming::resolve("UPPER.PDF", None, None);
    assert_eq!(naming.html, "UPPER.html");
}

#[test]
fn test_page_naming_escapes_input_stem() {
    let naming = PageNaming::resolve("50%d-off.pdf", None, None);
    assert_eq!(naming.page_file(2), "50%d-off2.page");
}

#[test]
fn test_page_naming_split_outputs() {
    let naming = PageNaming::resolve("3-pages.pdf", None, Some("foo%03d.xyz"));
    let expected: BTreeSet<String> = ["3-pages.html", "foo001.xyz", "foo002.xyz", "foo003.xyz"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(naming.split_outputs(3), expected);

    let naming = PageNaming::resolve("1-page.pdf", None, None);
    let expected: BTreeSet<String> = ["1-page.html", "1-page1.page"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(naming.split_outputs(1), expected);
}

#[test]
fn test_page_naming_single_output() {
    let naming = PageNaming::resolve("2-pages.pdf", Some("foo%d.html"), None);
    assert_eq!(naming.single_output().into_iter().collect::<Vec<_>>(), vec!["foo%d.html"]);
}

fn literal_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9._/ -]{0,16}"
}

proptest! {
    #[test]
    fn prop_no_marker_is_identity(template in literal_text(), page in any::<u32>()) {
        prop_assert_eq!(expand(&template, page), template);
    }

    #[test]
    fn prop_single_placeholder_is_injective(
        prefix in literal_text(),
        suffix in literal_text(),
        width in proptest::option::of(0usize..8),
        a in any::<u32>(),
        b in any::<u32>(),
    ) {
        prop_assume!(a != b);
        let directive = match width {
            Some(width) => format!("%0{}d", width),
            None => "%d".to_string(),
        };
        let template = format!("{}{}{}", prefix, directive, suffix);
        prop_assert_ne!(expand(&template, a), expand(&template, b));
    }

    #[test]
    fn prop_escaped_marker_ignores_page(
        prefix in literal_text(),
        suffix in literal_text(),
        page in any::<u32>(),
    ) {
        let template = format!("{}%%{}", prefix, suffix);
        prop_assert_eq!(expand(&template, page), format!("{}%{}", prefix, suffix));
    }

    #[test]
    fn prop_expansion_never_panics(template in "\\PC{0,24}", page in any::<u32>()) {
        let _ = expand(&template, page);
    }

    #[test]
    fn prop_zero_padding_width(width in 1usize..10, page in any::<u32>()) {
        let expanded = expand(&format!("%0{}d", width), page);
        prop_assert!(expanded.len() >= width);
        prop_assert_eq!(expanded.trim_start_matches('0').to_string(), {
            let plain = page.to_string();
            plain.trim_start_matches('0').to_string()
        });
    }
}
