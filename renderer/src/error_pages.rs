//! User-visible failure rendering (spec §7 "User-visible failure behavior").
//! Two distinct shapes: a small inline snippet for a caught in-component
//! exception (the render otherwise succeeded), and a standalone dark-themed
//! document for a sandbox-level failure (timeout, memory, eval crash).

fn escape(message: &str) -> String {
    message
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// A thrown exception inside the user's component, embedded into the
/// produced `html` field (spec §7: "becomes an HTML snippet ... inside the
/// produced html field").
pub fn component_error_snippet(message: &str) -> String {
    format!(r#"<div style="color:red">Error: {}</div>"#, escape(message))
}

/// A sandbox-level failure (timeout, memory limit, eval crash): a
/// standalone HTML page with a dark theme and the escaped message (spec
/// §7/§8: "a 500 status where applicable").
pub fn styled_error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Render Error</title>
<style>
  body {{ background: #1e1e1e; color: #f5f5f5; font-family: monospace; padding: 2rem; }}
  .error {{ color: #ff6b6b; white-space: pre-wrap; }}
</style>
</head>
<body>
<h1>Render Error</h1>
<div class="error">{}</div>
</body>
</html>"#,
        escape(message)
    )
}
