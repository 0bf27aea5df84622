//! Body cleanup passes applied by the content transformers.
//!
//! Each pass is a function `&str -> String` that leaves fenced code blocks
//! untouched.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::is_index_stem;

// ---------------------------------------------------------------------------
// Pass: Rewrite relative Markdown links
// ---------------------------------------------------------------------------

/// Rewrite relative links to Markdown files into pretty site URLs.
///
/// A page at `guide/install.md` is published at `guide/install/`, so a link
/// to `other.md#setup` from it becomes `../other/#setup`. Landing pages
/// (`index.md`, `README.md`) are published at their directory, so links from
/// them need no `../` prefix. Absolute URLs, root-relative paths, anchors and
/// links to non-Markdown files are left alone.
pub fn rewrite_relative_links(md: &str, page_path: &str) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    let from_landing_page = page_path
        .rsplit('/')
        .next()
        .and_then(|file| file.rsplit_once('.').map(|(stem, _)| stem))
        .is_some_and(is_index_stem);

    map_outside_code(md, |line| {
        LINK_RE
            .replace_all(line, |caps: &regex::Captures| {
                let bang = &caps[1];
                let text = &caps[2];
                let href = &caps[3];

                // Images keep their target
                if !bang.is_empty() {
                    return caps[0].to_string();
                }

                match pretty_href(href, from_landing_page) {
                    Some(rewritten) => format!("[{text}]({rewritten})"),
                    None => caps[0].to_string(),
                }
            })
            .to_string()
    })
}

/// Compute the pretty URL for a relative Markdown link, or `None` to keep it.
fn pretty_href(href: &str, from_landing_page: bool) -> Option<String> {
    if href.starts_with('#') || href.starts_with('/') || Url::parse(href).is_ok() {
        return None;
    }

    let (path, anchor) = match href.split_once('#') {
        Some((path, anchor)) => (path, Some(anchor)),
        None => (href, None),
    };

    let lower = path.to_ascii_lowercase();
    let stem_len = if lower.ends_with(".md") {
        path.len() - ".md".len()
    } else if lower.ends_with(".markdown") {
        path.len() - ".markdown".len()
    } else {
        return None;
    };

    let mut target = path[..stem_len].trim_start_matches("./").to_string();

    // `dir/README` publishes at `dir/`
    let file = target.rsplit('/').next().unwrap_or("");
    if is_index_stem(file) {
        target.truncate(target.len() - file.len());
    } else {
        target.push('/');
    }

    let prefix = if from_landing_page { "" } else { "../" };
    let mut out = format!("{prefix}{target}");
    if out.is_empty() {
        out.push_str("./");
    }
    if let Some(anchor) = anchor {
        out.push('#');
        out.push_str(anchor);
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Pass: Strip a leading title heading
// ---------------------------------------------------------------------------

/// Remove a leading H1 that repeats `title`, plus the blank lines after it.
///
/// The site theme renders the front matter title itself; keeping the heading
/// would show it twice. Headings that differ from the title stay.
pub fn strip_leading_title(md: &str, title: &str) -> String {
    let mut lines = md.lines().peekable();

    while lines.peek().is_some_and(|l| l.trim().is_empty()) {
        lines.next();
    }

    let Some(first) = lines.peek() else {
        return md.to_string();
    };

    let Some(heading) = first.strip_prefix("# ") else {
        return md.to_string();
    };

    if heading.trim().trim_end_matches('#').trim() != title.trim() {
        return md.to_string();
    }

    lines.next();
    while lines.peek().is_some_and(|l| l.trim().is_empty()) {
        lines.next();
    }

    let rest = lines.collect::<Vec<_>>().join("\n");
    ensure_trailing_newline(&rest)
}

// ---------------------------------------------------------------------------
// Pass: Ensure trailing newline
// ---------------------------------------------------------------------------

/// Ensure the text ends with exactly one newline.
pub fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches(['\n', '\r']);
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Apply `f` to every line outside fenced code blocks.
fn map_outside_code(md: &str, f: impl Fn(&str) -> String) -> String {
    let mut result = String::with_capacity(md.len());
    let mut in_code_block = false;

    for line in md.split_inclusive('\n') {
        let (content, newline) = match line.strip_suffix('\n') {
            Some(content) => (content, "\n"),
            None => (line, ""),
        };

        if content.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            result.push_str(line);
            continue;
        }

        if in_code_block {
            result.push_str(line);
        } else {
            result.push_str(&f(content));
            result.push_str(newline);
        }
    }

    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
