//! The shipped case lists for the three suites
//!
//! Expectations are literal file lists as the real converter names them.

use golden_harness::{BrowserCase, Catalog, ConversionCase, ConverterArgs, OutputCase};

/// Every output case.
pub fn output_cases() -> Vec<OutputCase> {
    let split = ["--split-pages", "1"];
    let named = |template: &str| {
        let mut args: Vec<String> = split.iter().map(|s| s.to_string()).collect();
        args.push("--page-filename".to_string());
        args.push(template.to_string());
        args
    };
    let three_pages = |template: &str, expected: [&str; 3]| {
        OutputCase::new(&format!("split_pages_{}", template), "3-pages.pdf")
            .args(named(template))
            .expect(std::iter::once("3-pages.html").chain(expected))
    };

    vec![
        OutputCase::new("single_html_default_name_single_page", "1-page.pdf").expect(["1-page.html"]),
        OutputCase::new("single_html_default_name_multiple_pages", "2-pages.pdf").expect(["2-pages.html"]),
        OutputCase::new("single_html_specify_name_single_page", "1-page.pdf")
            .args(["foo.html"])
            .expect(["foo.html"]),
        OutputCase::new("single_html_specify_name_multiple_pages", "2-pages.pdf")
            .args(["foo.html"])
            .expect(["foo.html"]),
        OutputCase::new("split_pages_default_name_single_page", "1-page.pdf")
            .args(split)
            .expect(["1-page.html", "1-page1.page"]),
        OutputCase::new("split_pages_default_name_multiple_pages", "3-pages.pdf")
            .args(split)
            .expect(["3-pages.html", "3-pages1.page", "3-pages2.page", "3-pages3.page"]),
        OutputCase::new("split_pages_specify_name_single_page", "1-page.pdf")
            .args(named("foo.xyz"))
            .expect(["1-page.html", "foo1.xyz"]),
        three_pages("foo.xyz", ["foo1.xyz", "foo2.xyz", "foo3.xyz"]),
        three_pages("fo%do.xyz", ["fo1o.xyz", "fo2o.xyz", "fo3o.xyz"]),
        three_pages("fo%03do.xyz", ["fo001o.xyz", "fo002o.xyz", "fo003o.xyz"]),
        three_pages("f%do%do.xyz", ["f1o%do.xyz", "f2o%do.xyz", "f3o%do.xyz"]),
        three_pages("f%soo.xyz", ["f%soo1.xyz", "f%soo2.xyz", "f%soo3.xyz"]),
        three_pages("f%poo.xyz", ["f%poo1.xyz", "f%poo2.xyz", "f%poo3.xyz"]),
        three_pages("f%noo.xyz", ["f%noo1.xyz", "f%noo2.xyz", "f%noo3.xyz"]),
        three_pages("f%%oo.xyz", ["f%%oo1.xyz", "f%%oo2.xyz", "f%%oo3.xyz"]),
        three_pages("f%%o%do.xyz", ["f%%o1o.xyz", "f%%o2o.xyz", "f%%o3o.xyz"]),
        three_pages("fo%do%%.xyz", ["fo1o%%.xyz", "fo2o%%.xyz", "fo3o%%.xyz"]),
        three_pages("f%02%doo.xyz", ["f%021oo.xyz", "f%022oo.xyz", "f%023oo.xyz"]),
        OutputCase::new("split_pages_no_formatter_no_extension", "1-page.pdf")
            .args(named("foo"))
            .expect(["1-page.html", "foo1"]),
        OutputCase::new("single_html_name_with_percent_d", "2-pages.pdf")
            .args(["foo%d.html"])
            .expect(["foo%d.html"]),
        OutputCase::new("single_html_name_with_percent_p", "2-pages.pdf")
            .args(["foo%p.html"])
            .expect(["foo%p.html"]),
        OutputCase::new("single_html_name_with_percent_n", "2-pages.pdf")
            .args(["foo%n.html"])
            .expect(["foo%n.html"]),
        OutputCase::new("single_html_name_with_percent_percent", "2-pages.pdf")
            .args(["foo%%.html"])
            .expect(["foo%%.html"]),
        OutputCase::new("issue501", "issue501").args(["--split-pages", "1", "--embed-css", "0"]),
    ]
}

/// Whether the case's page template uses the `%%` escape.
///
/// The real converter keeps `%%` in split page names while the template
/// engine collapses it, so such cases only make sense against the real
/// converter.
pub fn uses_percent_escape(case: &OutputCase) -> bool {
    case.args
        .value_of("--page-filename")
        .map(|template| template.contains("%%"))
        .unwrap_or(false)
}

/// Every conversion case.
pub fn conversion_cases() -> Vec<ConversionCase> {
    let case = |name: &str, render_args: &[&str]| ConversionCase {
        name: name.to_string(),
        input: format!("{}.pdf", name),
        converter_args: ConverterArgs::new(),
        render_args: render_args.iter().map(|s| s.to_string()).collect(),
    };
    vec![
        case(
            "basic_text",
            &["--crop-x", "180", "--crop-y", "150", "--crop-w", "220", "--crop-h", "260"],
        ),
        case("geneve_1564", &["--height", "1100"]),
        case("text_visibility", &["--height", "1200"]),
    ]
}

/// Every browser case, the self-check first.
pub fn browser_cases() -> Vec<BrowserCase> {
    let case = |name: &str, args: &[&str]| BrowserCase {
        name: name.to_string(),
        input: format!("{}.pdf", name),
        args: args.iter().copied().collect(),
        must_load: true,
        expect_failure: false,
    };
    vec![
        BrowserCase {
            must_load: false,
            expect_failure: true,
            ..case("test_fail", &[])
        },
        case("basic_text", &[]),
        case("geneve_1564", &[]),
        case("text_visibility", &["--correct-text-visibility", "1"]),
        case("with_form", &["--process-form", "1"]),
        case("invalid_unicode_issue477", &[]),
        case("svg_background_with_page_rotation_issue402", &["--bg-format", "svg"]),
        case("fontfile3_opentype", &["-l", "1"]),
    ]
}

pub fn full_catalog() -> Catalog {
    Catalog {
        output: output_cases(),
        conversion: conversion_cases(),
        browser: browser_cases(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_case_names_are_unique() {
        let catalog = full_catalog();
        let names: HashSet<_> = catalog.output.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), catalog.output.len());
        assert_eq!(catalog.len(), 24 + 3 + 8);
    }

    #[test]
    fn test_only_issue501_lacks_expectation() {
        let open: Vec<_> = output_cases()
            .into_iter()
            .filter(|c| c.expected_files.is_none())
            .map(|c| c.name)
            .collect();
        assert_eq!(open, vec!["issue501"]);
    }

    #[test]
    fn test_percent_escape_cases() {
        let escaped = output_cases().iter().filter(|c| uses_percent_escape(c)).count();
        assert_eq!(escaped, 3);
    }

    #[test]
    fn test_self_check_case() {
        let cases = browser_cases();
        assert!(cases[0].expect_failure);
        assert!(!cases[0].must_load);
        assert!(cases[1..].iter().all(|c| c.must_load && !c.expect_failure));
    }
}
