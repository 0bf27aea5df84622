//! Markdown document helpers: front matter blocks, titles, and cleanup passes.
//!
//! Everything here is a pure text function. The transform pipeline in
//! `docmesh-core` decides when each one runs.

mod cleanup;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use docmesh_shared::{DocmeshError, FrontMatter, Result};

pub use cleanup::{ensure_trailing_newline, rewrite_relative_links, strip_leading_title};

/// Opening and closing delimiter of a YAML front matter block.
const DELIMITER: &str = "---";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A source document split into front matter and body.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitDocument {
    /// Parsed front matter (empty when the document has none).
    pub front_matter: FrontMatter,
    /// Markdown body following the front matter block.
    pub body: String,
    /// Whether the source carried a front matter block at all.
    pub had_front_matter: bool,
}

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

/// Split a leading `---` YAML block off a Markdown document.
///
/// A block is recognised only when the very first line is `---` and a later
/// line is exactly `---`. Without a closing delimiter the whole text is body.
/// An empty block yields an empty map with `had_front_matter = true`.
#[instrument(skip(text), fields(len = text.len()))]
pub fn split_front_matter(text: &str) -> Result<SplitDocument> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some((block, body)) = find_block(text) else {
        debug!("no front matter block");
        return Ok(SplitDocument {
            front_matter: FrontMatter::new(),
            body: text.to_string(),
            had_front_matter: false,
        });
    };

    let front_matter = parse_yaml_block(block)?;
    debug!(keys = front_matter.len(), "front matter parsed");

    Ok(SplitDocument {
        front_matter,
        body: body.trim_start_matches(['\r', '\n']).to_string(),
        had_front_matter: true,
    })
}

/// Locate the YAML block and the body that follows it.
fn find_block(text: &str) -> Option<(&str, &str)> {
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end_matches(['\r', '\n']) != DELIMITER || !first.ends_with('\n') {
        return None;
    }

    let block_start = first.len();
    let mut offset = block_start;
    for line in lines {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            let block = &text[block_start..offset];
            let body = &text[offset + line.len()..];
            return Some((block, body));
        }
        offset += line.len();
    }

    None
}

/// Parse the inside of a front matter block into a map.
fn parse_yaml_block(block: &str) -> Result<FrontMatter> {
    if block.trim().is_empty() {
        return Ok(FrontMatter::new());
    }

    let value: serde_json::Value = serde_yaml::from_str(block)
        .map_err(|e| DocmeshError::parse(format!("invalid front matter YAML: {e}")))?;

    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(FrontMatter::new()),
        other => Err(DocmeshError::parse(format!(
            "front matter must be a mapping, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a sequence",
        serde_json::Value::Object(_) => "a mapping",
    }
}

/// Render front matter and body back into one Markdown document.
///
/// Keys come out in sorted order, so equal maps always render to equal bytes.
/// An empty map renders the body alone.
pub fn render_document(front_matter: &FrontMatter, body: &str) -> Result<String> {
    let body = ensure_trailing_newline(body.trim_start_matches(['\r', '\n']));

    if front_matter.is_empty() {
        return Ok(body);
    }

    let yaml = serde_yaml::to_string(front_matter)
        .map_err(|e| DocmeshError::Serialization(format!("front matter YAML: {e}")))?;

    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n\n{body}"))
}

// ---------------------------------------------------------------------------
// Titles
// ---------------------------------------------------------------------------

/// Extract the text of the first ATX H1 outside fenced code blocks.
pub fn extract_title(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^#[ \t]+(.+?)[ \t#]*$").expect("valid regex"));

    let mut in_code_block = false;
    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }
        if let Some(caps) = H1_RE.captures(line) {
            return Some(caps[1].trim().to_string());
        }
    }
    None
}

/// Derive a human title from a document path.
///
/// `guide/getting_started.md` becomes `Getting Started`; index-like files
/// (`index.md`, `README.md`, `_index.md`) take their directory's name.
pub fn title_from_path(path: &str) -> String {
    let path = path.trim_matches('/');
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let stem = segments
        .pop()
        .map(|file| file.rsplit_once('.').map_or(file, |(stem, _)| stem))
        .unwrap_or("");

    let name = if is_index_stem(stem) {
        segments.pop().unwrap_or("home")
    } else {
        stem
    };

    name.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a file stem denotes a directory's landing page.
pub fn is_index_stem(stem: &str) -> bool {
    matches!(
        stem.to_ascii_lowercase().as_str(),
        "index" | "_index" | "readme"
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_reads_yaml_block() {
        let doc = "---\ntitle: Install\ntags: [a, b]\n---\n\n# Install\n\nBody.\n";
        let split = split_front_matter(doc).unwrap();

        assert!(split.had_front_matter);
        assert_eq!(split.front_matter["title"], json!("Install"));
        assert_eq!(split.front_matter["tags"], json!(["a", "b"]));
        assert_eq!(split.body, "# Install\n\nBody.\n");
    }

    #[test]
    fn split_without_block_keeps_text() {
        let doc = "# Just a heading\n\n---\n\nafter a rule\n";
        let split = split_front_matter(doc).unwrap();

        assert!(!split.had_front_matter);
        assert!(split.front_matter.is_empty());
        assert_eq!(split.body, doc);
    }

    #[test]
    fn split_unclosed_block_is_body() {
        let doc = "---\ntitle: nope\n";
        let split = split_front_matter(doc).unwrap();
        assert!(!split.had_front_matter);
        assert_eq!(split.body, doc);
    }

    #[test]
    fn split_empty_block() {
        let split = split_front_matter("---\n---\nBody\n").unwrap();
        assert!(split.had_front_matter);
        assert!(split.front_matter.is_empty());
        assert_eq!(split.body, "Body\n");
    }

    #[test]
    fn split_handles_crlf() {
        let split = split_front_matter("---\r\ntitle: Win\r\n---\r\nBody\r\n").unwrap();
        assert!(split.had_front_matter);
        assert_eq!(split.front_matter["title"], json!("Win"));
        assert_eq!(split.body, "Body\r\n");
    }

    #[test]
    fn split_rejects_non_mapping() {
        let err = split_front_matter("---\n- a\n- b\n---\nBody\n").unwrap_err();
        assert!(err.to_string().contains("mapping"));
    }

    #[test]
    fn split_rejects_malformed_yaml() {
        let err = split_front_matter("---\ntitle: [unclosed\n---\nBody\n").unwrap_err();
        assert!(err.to_string().contains("invalid front matter"));
    }

    #[test]
    fn render_sorts_keys() {
        let mut fm = FrontMatter::new();
        fm.insert("title".into(), json!("Guide"));
        fm.insert("draft".into(), json!(false));

        let out = render_document(&fm, "Body").unwrap();
        assert_eq!(out, "---\ndraft: false\ntitle: Guide\n---\n\nBody\n");
    }

    #[test]
    fn render_without_front_matter() {
        let out = render_document(&FrontMatter::new(), "\n\nBody").unwrap();
        assert_eq!(out, "Body\n");
    }

    #[test]
    fn render_then_split_preserves_front_matter() {
        let mut fm = FrontMatter::new();
        fm.insert("title".into(), json!("Guide"));
        fm.insert("params".into(), json!({"weight": 3}));

        let out = render_document(&fm, "# Guide\n").unwrap();
        let split = split_front_matter(&out).unwrap();
        assert_eq!(split.front_matter, fm);
        assert_eq!(split.body, "# Guide\n");
    }

    #[test]
    fn extract_title_skips_code_blocks() {
        let md = "```sh\n# not a title\n```\n\n# Real Title #\n";
        assert_eq!(extract_title(md).as_deref(), Some("Real Title"));
    }

    #[test]
    fn extract_title_ignores_h2() {
        assert_eq!(extract_title("## Sub\ntext"), None);
    }

    #[test]
    fn title_from_plain_path() {
        assert_eq!(title_from_path("guide/getting_started.md"), "Getting Started");
        assert_eq!(title_from_path("api-reference.md"), "Api Reference");
    }

    #[test]
    fn title_from_index_path() {
        assert_eq!(title_from_path("operations/README.md"), "Operations");
        assert_eq!(title_from_path("_index.md"), "Home");
    }
}
