//! `render_page`'s full-document assembly (spec §4.10): wraps a
//! [`xmas_renderer::RenderResult`] in `<head>` injection and a minimal HTML
//! shell.

use xmas_renderer::RenderResult;

#[derive(Debug, Clone)]
pub struct RenderPageOptions {
    pub props: serde_json::Value,
    pub title: String,
    pub lang: String,
    pub base_url: Option<String>,
}

impl Default for RenderPageOptions {
    fn default() -> Self {
        Self {
            props: serde_json::Value::Object(Default::default()),
            title: String::new(),
            lang: "en".to_string(),
            base_url: None,
        }
    }
}

pub fn build_document(result: &RenderResult, opts: &RenderPageOptions) -> String {
    let base_tag = match &opts.base_url {
        Some(url) => format!(r#"<base href="{url}">"#),
        None => String::new(),
    };
    let style_tag = if result.css.is_empty() {
        String::new()
    } else {
        format!("<style>{}</style>", result.css)
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="utf-8">
<title>{title}</title>
{base_tag}
{head}
{style_tag}
</head>
<body>{html}</body>
</html>"#,
        lang = opts.lang,
        title = opts.title,
        base_tag = base_tag,
        head = result.head,
        style_tag = style_tag,
        html = result.html,
    )
}
