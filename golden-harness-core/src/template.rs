//! Output filename templates
//!
//! The converter names split-page output files from a printf-like template
//! holding at most one page-number directive: `%d`, optionally with a zero-pad
//! width such as `%03d`. Everything else is literal text:
//!
//! - `%%` always renders as a single `%` and never starts a directive;
//! - only the first `%[width]d` directive is substituted, later ones stay literal;
//! - other conversions (`%s`, `%p`, `%n`, ...) are inert and stay literal;
//! - a malformed directive (`%02%d`, `%0x`) degrades to literal text;
//! - a width above [`MAX_WIDTH`] is treated as malformed.
//!
//! Expansion is total: no template is ever rejected.

use std::collections::BTreeSet;
use std::fmt;

/// Character that starts a directive.
pub const DIRECTIVE_START: char = '%';

/// Conversion character of the page-number directive.
pub const PAGE_MARKER: char = 'd';

/// Widest zero-pad a directive may ask for, the length of one filename component.
pub const MAX_WIDTH: usize = 255;

/// Suffix of the default page template (`<stem>%d.page`).
pub const DEFAULT_PAGE_SUFFIX: &str = ".page";

/// Page-number placeholder found in a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    /// Zero-pad width, if the directive carried one
    pub width: Option<usize>,
}

/// A template split around its first page-number directive.
///
/// `prefix` and `suffix` hold rendered literal text: escape pairs are already
/// collapsed. Without a placeholder the whole template lives in `prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    prefix: String,
    placeholder: Option<Placeholder>,
    suffix: String,
}

impl Template {
    /// Parse a template. Never fails.
    pub fn parse(template: &str) -> Self {
        let mut prefix = String::with_capacity(template.len());
        let mut suffix = String::new();
        let mut placeholder = None;

        let mut chars = template.char_indices().peekable();
        while let Some((index, c)) = chars.next() {
            let out = if placeholder.is_some() {
                &mut suffix
            } else {
                &mut prefix
            };

            if c != DIRECTIVE_START {
                out.push(c);
                continue;
            }

            // Escape pairs win over directives.
            if let Some(&(_, DIRECTIVE_START)) = chars.peek() {
                out.push(DIRECTIVE_START);
                chars.next();
                continue;
            }

            if placeholder.is_none() {
                let rest = &template[index + DIRECTIVE_START.len_utf8()..];
                if let Some((width, consumed)) = parse_directive(rest) {
                    placeholder = Some(Placeholder { width });
                    for _ in 0..consumed {
                        chars.next();
                    }
                    continue;
                }
            }

            out.push(DIRECTIVE_START);
        }

        Self {
            prefix,
            placeholder,
            suffix,
        }
    }

    /// Literal text before the placeholder (or the whole rendered template)
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Literal text after the placeholder
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn placeholder(&self) -> Option<Placeholder> {
        self.placeholder
    }

    pub fn has_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    /// Render the filename for `page`.
    pub fn render(&self, page: u32) -> String {
        match self.placeholder {
            None => self.prefix.clone(),
            Some(Placeholder { width }) => {
                let number = match width {
                    Some(width) => format!("{:0width$}", page, width = width),
                    None => page.to_string(),
                };
                let mut name =
                    String::with_capacity(self.prefix.len() + number.len() + self.suffix.len());
                name.push_str(&self.prefix);
                name.push_str(&number);
                name.push_str(&self.suffix);
                name
            }
        }
    }
}

impl fmt::Display for Template {
    /// Canonical template text, re-escaping literal markers.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", escape_literal(&self.prefix))?;
        if let Some(Placeholder { width }) = self.placeholder {
            match width {
                Some(width) => write!(f, "{}0{}{}", DIRECTIVE_START, width, PAGE_MARKER)?,
                None => write!(f, "{}{}", DIRECTIVE_START, PAGE_MARKER)?,
            }
        }
        write!(f, "{}", escape_literal(&self.suffix))
    }
}

/// Parse `[digits]d` at the start of `rest` (the text after a `%`).
///
/// Returns the width and the number of characters the directive occupies
/// after the `%`, or `None` when the text is not a page directive.
fn parse_directive(rest: &str) -> Option<(Option<usize>, usize)> {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if !rest[digits..].starts_with(PAGE_MARKER) {
        return None;
    }
    let width = if digits == 0 {
        None
    } else {
        // Oversized widths are malformed, not errors.
        let width = rest[..digits].parse::<usize>().ok()?;
        if width > MAX_WIDTH {
            return None;
        }
        Some(width)
    };
    Some((width, digits + PAGE_MARKER.len_utf8()))
}

/// Expand `template` for `page`.
///
/// ```
/// use golden_harness::template::expand;
///
/// assert_eq!(expand("fo%03do.xyz", 7), "fo007o.xyz");
/// assert_eq!(expand("f%do%do.xyz", 1), "f1o%do.xyz");
/// assert_eq!(expand("f%%oo.xyz", 4), "f%oo.xyz");
/// assert_eq!(expand("f%soo.xyz", 4), "f%soo.xyz");
/// ```
pub fn expand(template: &str, page: u32) -> String {
    if !template.contains(DIRECTIVE_START) {
        return template.to_string();
    }
    Template::parse(template).render(page)
}

/// Whether `template` holds an eligible page-number directive
pub fn contains_placeholder(template: &str) -> bool {
    template.contains(DIRECTIVE_START) && Template::parse(template).has_placeholder()
}

/// Escape literal text so it can be embedded in a template.
pub fn escape_literal(text: &str) -> String {
    text.replace(DIRECTIVE_START, "%%")
}

/// Final path component, mirroring the converter's `/`-based split.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

/// Suffix of the final path component (from its last `.`), lower-cased.
pub fn suffix(path: &str) -> String {
    let name = file_name(path);
    match name.rfind('.') {
        Some(index) => name[index..].to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Input name without a `.pdf` suffix
fn stem(input: &str) -> &str {
    let name = file_name(input);
    if suffix(name) == ".pdf" {
        &name[..name.len() - ".pdf".len()]
    } else {
        name
    }
}

/// Names the converter gives its output for one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNaming {
    /// Main HTML document
    pub html: String,
    /// Template used for split pages; always holds a placeholder
    pub page_template: String,
}

impl PageNaming {
    /// Resolve output names the way the converter defaults them.
    ///
    /// `output` is the optional positional output filename and `page_filename`
    /// the `--page-filename` option.
    pub fn resolve(input: &str, output: Option<&str>, page_filename: Option<&str>) -> Self {
        let stem = stem(input);

        let html = match output {
            Some(output) if !output.is_empty() => output.to_string(),
            _ => format!("{}.html", stem),
        };

        let page_template = match page_filename {
            Some(template) if !template.is_empty() => inject_placeholder(template),
            _ => format!("{}%d{}", escape_literal(stem), DEFAULT_PAGE_SUFFIX),
        };

        Self {
            html,
            page_template,
        }
    }

    /// Filename of split page `page` (1-based)
    pub fn page_file(&self, page: u32) -> String {
        expand(&self.page_template, page)
    }

    /// Files produced by a split-pages conversion of `pages` pages
    pub fn split_outputs(&self, pages: u32) -> BTreeSet<String> {
        let template = Template::parse(&self.page_template);
        std::iter::once(self.html.clone())
            .chain((1..=pages).map(|page| template.render(page)))
            .collect()
    }

    /// Files produced by a single-document conversion
    pub fn single_output(&self) -> BTreeSet<String> {
        std::iter::once(self.html.clone()).collect()
    }
}

/// Insert `%d` right before the suffix when the template has no placeholder.
pub fn inject_placeholder(template: &str) -> String {
    if contains_placeholder(template) {
        return template.to_string();
    }
    let split = template.len() - suffix(template).len();
    format!("{}%d{}", &template[..split], &template[split..])
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
