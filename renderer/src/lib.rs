//! Multi-Framework Renderer (spec §4.8, C8): detects the source framework,
//! injects a one-shot runtime shim per framework, wraps user code in a
//! render IIFE, submits it to the Sandbox Host, shields the caller from
//! both in-component exceptions and sandbox-level failures, and integrates
//! with the SSR Cache.

pub mod error;
pub mod error_pages;
pub mod framework;
pub mod shims;
pub mod wrap;

pub use error::{RendererError, RendererResult};
pub use framework::Framework;

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;

use serde_json::Value;

use xmas_sandbox::SandboxHost;
use xmas_ssr_cache::{CacheEntry, SsrCache};

/// `render(code, filename, options)` input (spec §4.8 "Render contract").
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// `None` triggers auto-detection (spec §4.8 step 1).
    pub framework: Option<Framework>,
    pub cache: bool,
    pub cache_key: Option<String>,
    pub props: Value,
    pub slots: Value,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            framework: None,
            cache: true,
            cache_key: None,
            props: Value::Object(Default::default()),
            slots: Value::Object(Default::default()),
        }
    }
}

/// `render(...)` output. `error` is set alongside a usable `html` whenever
/// rendering was shielded rather than fully successful (spec §7).
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub html: String,
    pub css: String,
    pub head: String,
    pub framework: Framework,
    pub cached: bool,
    pub render_time_ms: u64,
    pub error: Option<String>,
}

pub struct Renderer {
    host: Rc<SandboxHost>,
    cache: Rc<RefCell<SsrCache>>,
    shims_injected: RefCell<HashSet<Framework>>,
}

impl Renderer {
    pub fn new(host: Rc<SandboxHost>, cache: Rc<RefCell<SsrCache>>) -> Self {
        Self {
            host,
            cache,
            shims_injected: RefCell::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> Rc<RefCell<SsrCache>> {
        self.cache.clone()
    }

    async fn ensure_shim(&self, framework: Framework) -> RendererResult<()> {
        if self.shims_injected.borrow().contains(&framework) {
            return Ok(());
        }
        let source = format!("{}\n{}", shims::BASE_SHIM, shims::shim_source(framework));
        let outcome = self
            .host
            .eval(&source, &format!("/shims/{}.js", framework.as_str()))
            .await
            .map_err(|e| RendererError::RenderFailure(e.to_string()))?;
        if !outcome.success {
            return Err(RendererError::RenderFailure(
                outcome.error.unwrap_or_else(|| "shim injection failed".into()),
            ));
        }
        self.shims_injected.borrow_mut().insert(framework);
        Ok(())
    }

    /// `render(code, filename, options)` (spec §4.8). Infallible from the
    /// caller's perspective: every failure mode is shielded into a usable
    /// `RenderResult` per spec §7's propagation policy.
    pub async fn render(&self, code: &str, filename: &str, options: RenderOptions) -> RenderResult {
        let started = Instant::now();
        let framework = options
            .framework
            .unwrap_or_else(|| framework::detect(filename, code));

        let cache_key = if options.cache {
            Some(options.cache_key.clone().unwrap_or_else(|| {
                xmas_ssr_cache::generate_key(filename, &options.props, Some(code))
            }))
        } else {
            None
        };

        if let Some(key) = &cache_key {
            if let Some(entry) = self.cache.borrow_mut().get(key) {
                return RenderResult {
                    html: entry.html,
                    css: entry.css,
                    head: entry.head,
                    framework,
                    cached: true,
                    render_time_ms: started.elapsed().as_millis() as u64,
                    error: None,
                };
            }
        }

        if let Err(e) = self.ensure_shim(framework).await {
            return RenderResult {
                html: error_pages::styled_error_page(&e.to_string()),
                css: String::new(),
                head: String::new(),
                framework,
                cached: false,
                render_time_ms: started.elapsed().as_millis() as u64,
                error: Some(e.to_string()),
            };
        }

        let props_json = serde_json::to_string(&options.props).unwrap_or_else(|_| "{}".into());
        let slots_json = serde_json::to_string(&options.slots).unwrap_or_else(|_| "{}".into());
        let wrapped = wrap::build(framework, code, &props_json, &slots_json);

        let outcome = match self.host.eval(&wrapped, filename).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return RenderResult {
                    html: error_pages::styled_error_page(&e.to_string()),
                    css: String::new(),
                    head: String::new(),
                    framework,
                    cached: false,
                    render_time_ms: started.elapsed().as_millis() as u64,
                    error: Some(e.to_string()),
                };
            }
        };

        let render_time_ms = started.elapsed().as_millis() as u64;

        if !outcome.success {
            let message = outcome.error.unwrap_or_else(|| "render failed".to_string());
            return RenderResult {
                html: error_pages::styled_error_page(&message),
                css: String::new(),
                head: String::new(),
                framework,
                cached: false,
                render_time_ms,
                error: Some(message),
            };
        }

        let raw = outcome.value.unwrap_or_default();
        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(_) => Value::String(raw),
        };

        let result = match parsed {
            Value::Object(ref map) if map.contains_key("__error") => {
                let message = map
                    .get("__error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown render error")
                    .to_string();
                RenderResult {
                    html: error_pages::component_error_snippet(&message),
                    css: String::new(),
                    head: String::new(),
                    framework,
                    cached: false,
                    render_time_ms,
                    error: Some(message),
                }
            }
            Value::Object(map) => RenderResult {
                html: map.get("html").and_then(Value::as_str).unwrap_or_default().to_string(),
                css: map.get("css").and_then(Value::as_str).unwrap_or_default().to_string(),
                head: map.get("head").and_then(Value::as_str).unwrap_or_default().to_string(),
                framework,
                cached: false,
                render_time_ms,
                error: None,
            },
            other => RenderResult {
                html: other.as_str().unwrap_or_default().to_string(),
                css: String::new(),
                head: String::new(),
                framework,
                cached: false,
                render_time_ms,
                error: None,
            },
        };

        if result.error.is_none() {
            if let Some(key) = cache_key {
                let entry = CacheEntry::new(
                    result.html.clone(),
                    result.css.clone(),
                    result.head.clone(),
                    Some(xmas_ssr_cache::simple_hash(code).to_string()),
                );
                self.cache.borrow_mut().set(key, entry);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmas_sandbox::SandboxConfig;
    use xmas_ssr_cache::SsrCacheConfig;

    fn make_renderer() -> Renderer {
        let host = Rc::new(SandboxHost::new(SandboxConfig::default()));
        let cache = Rc::new(RefCell::new(SsrCache::new(SsrCacheConfig::default())));
        Renderer::new(host, cache)
    }

    #[tokio::test]
    async fn renders_a_react_component() {
        let renderer = make_renderer();
        renderer.host.init().await.unwrap();
        let code = r#"function App(){ return createElement("div", null, "React"); }"#;
        let result = renderer
            .render(code, "App.tsx", RenderOptions { cache: false, ..Default::default() })
            .await;
        assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
        assert!(result.html.contains("<div>React</div>"), "html was: {}", result.html);
        assert_eq!(result.framework, Framework::React);
        assert!(!result.cached);
    }

    #[tokio::test]
    async fn second_identical_render_is_cached() {
        let renderer = make_renderer();
        renderer.host.init().await.unwrap();
        let code = r#"function App(){ return createElement("div", null, "React"); }"#;
        let opts = RenderOptions { cache: true, ..Default::default() };
        let first = renderer.render(code, "App.tsx", opts.clone()).await;
        assert!(!first.cached);
        let second = renderer.render(code, "App.tsx", opts).await;
        assert!(second.cached);
        assert_eq!(second.html, first.html);
    }

    #[tokio::test]
    async fn component_exception_is_shielded_into_html() {
        let renderer = make_renderer();
        renderer.host.init().await.unwrap();
        let code = r#"function App(){ throw new Error("boom"); }"#;
        let result = renderer
            .render(code, "App.tsx", RenderOptions { cache: false, ..Default::default() })
            .await;
        assert!(result.html.contains("boom"));
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn missing_component_is_reported() {
        let renderer = make_renderer();
        renderer.host.init().await.unwrap();
        let result = renderer
            .render("var x = 1;", "App.tsx", RenderOptions { cache: false, ..Default::default() })
            .await;
        assert!(result.error.is_some());
    }
}
