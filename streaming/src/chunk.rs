//! Chunk type (spec §3) and the regex-based head/body/suspense-boundary
//! extractor (spec §4.9, preserving the source's regex-based behavior per
//! §9's Design Notes rather than introducing a full tokenizer). The `regex`
//! crate has no backreferences, so matching `<!-- /SUSPENSE:ID -->` against
//! the captured `ID` from its opening marker is done with a literal
//! substring search rather than a single backreferenced pattern — the
//! observable chunk sequence is identical for well-formed input.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Head,
    Shell,
    Content,
    Suspense,
    Error,
    End,
}

impl ChunkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::Head => "head",
            ChunkKind::Shell => "shell",
            ChunkKind::Content => "content",
            ChunkKind::Suspense => "suspense",
            ChunkKind::Error => "error",
            ChunkKind::End => "end",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub content: String,
    pub id: Option<String>,
    pub timestamp: u64,
}

impl Chunk {
    pub fn new(kind: ChunkKind, content: impl Into<String>, id: Option<String>, timestamp: u64) -> Self {
        Self {
            kind,
            content: content.into(),
            id,
            timestamp,
        }
    }
}

fn head_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<head[^>]*>.*?</head\s*>").unwrap())
}

fn body_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body\s*>").unwrap())
}

fn suspense_open_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<!--\s*SUSPENSE:([A-Za-z0-9_]+)\s*-->").unwrap())
}

/// `<template data-suspense="ID" data-resolved="true">CONTENT</template>`
/// plus the live-replacement script (spec §4.9 "Suspense wrapping").
pub fn wrap_suspense(id: &str, content: &str) -> String {
    format!(
        r#"<template data-suspense="{id}" data-resolved="true">{content}</template><script>(function(){{var tpl=document.currentScript.previousElementSibling;var target=document.getElementById('suspense-{id}');if(target&&tpl){{target.replaceWith(tpl.content.cloneNode(true));}}}})();</script>"#,
        id = id,
        content = content
    )
}

/// Scans `body` for `<!-- SUSPENSE:ID -->...<!-- /SUSPENSE:ID -->`
/// boundaries, emitting `Shell` chunks for the non-empty content preceding
/// each and a `Suspense` chunk for each boundary's (optionally wrapped)
/// content, followed by one final `Content` chunk for whatever follows the
/// last boundary (spec §4.9 steps 2-3).
fn scan_body(body: &str, progressive_hydration: bool, chunks: &mut Vec<(ChunkKind, String, Option<String>)>) {
    let mut cursor = 0usize;
    loop {
        let Some(open) = suspense_open_re().find_at(body, cursor) else {
            break;
        };
        let id = suspense_open_re()
            .captures(&body[open.start()..])
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let shell = &body[cursor..open.start()];
        if !shell.trim().is_empty() {
            chunks.push((ChunkKind::Shell, shell.to_string(), None));
        }

        let close_marker = format!("<!-- /SUSPENSE:{id} -->");
        let content_start = open.end();
        match body[content_start..].find(&close_marker) {
            Some(rel_idx) => {
                let inner = &body[content_start..content_start + rel_idx];
                let wrapped = if progressive_hydration {
                    wrap_suspense(&id, inner)
                } else {
                    inner.to_string()
                };
                chunks.push((ChunkKind::Suspense, wrapped, Some(id)));
                cursor = content_start + rel_idx + close_marker.len();
            }
            None => {
                // Malformed (no matching close): stop scanning, treat the
                // rest as trailing content. Well-formed input never hits this.
                cursor = open.start();
                break;
            }
        }
    }

    let remaining = &body[cursor..];
    chunks.push((ChunkKind::Content, remaining.to_string(), None));
}

/// `render_to_stream`'s HTML→chunks parse (spec §4.9, steps 1-4). Does not
/// include the trailing `End` chunk; callers append that themselves after
/// timestamping.
pub fn parse_html_chunks(html: &str, progressive_hydration: bool) -> Vec<(ChunkKind, String, Option<String>)> {
    let mut chunks = Vec::new();
    let head_match = head_re().find(html);
    if let Some(m) = head_match {
        chunks.push((ChunkKind::Head, m.as_str().to_string(), None));
    }

    if let Some(caps) = body_re().captures(html) {
        let body = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        scan_body(body, progressive_hydration, &mut chunks);
    } else if head_match.is_none() {
        chunks.push((ChunkKind::Content, html.to_string(), None));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_head_shell_suspense_content() {
        let html = "<html><head><title>T</title></head><body>\nA<!-- SUSPENSE:x -->B<!-- /SUSPENSE:x -->C\n</body></html>";
        let chunks = parse_html_chunks(html, true);
        let kinds: Vec<ChunkKind> = chunks.iter().map(|c| c.0).collect();
        assert_eq!(
            kinds,
            vec![ChunkKind::Head, ChunkKind::Shell, ChunkKind::Suspense, ChunkKind::Content]
        );
        assert!(chunks[0].1.contains("<title>T</title>"));
        assert!(chunks[1].1.contains('A'));
        assert_eq!(chunks[2].2.as_deref(), Some("x"));
        assert!(chunks[2].1.contains('B'));
        assert!(chunks[3].1.contains('C'));
    }

    #[test]
    fn falls_back_to_single_content_chunk() {
        let chunks = parse_html_chunks("just text, no tags", true);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].0, ChunkKind::Content);
        assert_eq!(chunks[0].1, "just text, no tags");
    }

    #[test]
    fn no_suspense_boundaries_yields_single_content_chunk_for_body() {
        let html = "<body>hello</body>";
        let chunks = parse_html_chunks(html, true);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].0, ChunkKind::Content);
        assert_eq!(chunks[0].1, "hello");
    }

    #[test]
    fn hydration_disabled_emits_verbatim_content() {
        let html = "<body>A<!-- SUSPENSE:y -->B<!-- /SUSPENSE:y -->C</body>";
        let chunks = parse_html_chunks(html, false);
        assert_eq!(chunks[1].1, "B");
    }
}
