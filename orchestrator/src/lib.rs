//! Orchestrator / Bridge (spec §4.10, C10): the public façade. Receives
//! `(code, filename, props)` from the build layer, consults the Cache,
//! calls the Renderer (which drives the Sandbox Host through the Loaders
//! and Resolver over the VFS), and exposes the Streaming Renderer for
//! chunked output. Single-threaded cooperative by construction (spec §5):
//! every owned handle is `Rc`, not `Arc`.

pub mod config;
pub mod document;
pub mod error;

pub use config::{Mode, OrchestratorConfig, SsrDecision};
pub use document::{build_document, RenderPageOptions};
pub use error::{OrchestratorError, OrchestratorResult};

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use xmas_js_modules::BuiltinTable;
use xmas_loader::{CommonJsLoader, EsmLoader};
use xmas_renderer::{RenderOptions, RenderResult, Renderer};
use xmas_resolver::Resolver;
use xmas_sandbox::SandboxHost;
use xmas_ssr_cache::{CacheStats, SsrCache};
use xmas_streaming::{ChunkStream, StreamOptions, StreamingRenderer};
use xmas_vfs::{Content, DirOptions, Vfs};

const SANDBOX_ENTRY_FILENAME: &str = "/sandbox.js";

/// One page to render for [`Orchestrator::prerender_pages`].
#[derive(Debug, Clone)]
pub struct PrerenderInput {
    pub filename: String,
    pub code: String,
    pub options: RenderPageOptions,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    vfs: Rc<RefCell<Vfs>>,
    host: Rc<SandboxHost>,
    #[allow(dead_code)]
    resolver: Rc<Resolver>,
    #[allow(dead_code)]
    builtins: Rc<BuiltinTable>,
    cjs_loader: Rc<CommonJsLoader>,
    #[allow(dead_code)]
    esm_loader: Rc<EsmLoader>,
    cache: Rc<RefCell<SsrCache>>,
    renderer: Renderer,
    streaming: StreamingRenderer,
    initialized: Cell<bool>,
    enabled: Cell<bool>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let mode = config.mode;
        let vfs = Rc::new(RefCell::new(Vfs::new()));

        let mut builtins = BuiltinTable::new();
        builtins.attach_vfs(vfs.clone());
        let builtins = Rc::new(builtins);

        let resolver = Rc::new(Resolver::new(config.resolver.clone()));
        let host = Rc::new(SandboxHost::new(config.sandbox.clone()));
        let cjs_loader = CommonJsLoader::new(vfs.clone(), resolver.clone(), builtins.clone());
        let esm_loader = EsmLoader::new(vfs.clone(), resolver.clone(), builtins.clone());
        let cache = Rc::new(RefCell::new(SsrCache::new(config.cache.clone())));
        let renderer = Renderer::new(host.clone(), cache.clone());
        let streaming = StreamingRenderer::new(config.streaming.clone());

        Self {
            config,
            vfs,
            host,
            resolver,
            builtins,
            cjs_loader,
            esm_loader,
            cache,
            renderer,
            streaming,
            initialized: Cell::new(false),
            enabled: Cell::new(mode != Mode::Disabled),
        }
    }

    /// Lazily initializes the Sandbox Host and wires a global `require`
    /// bound to [`SANDBOX_ENTRY_FILENAME`] for code the Renderer submits
    /// directly (spec §4.10 `init()`). Idempotent. A failure here leaves
    /// SSR disabled with the rationale logged, rather than propagating out
    /// of `render`/`render_page` (spec §7).
    pub async fn init(&self) -> OrchestratorResult<()> {
        if self.initialized.get() {
            return Ok(());
        }
        if self.config.mode == Mode::Disabled {
            self.enabled.set(false);
            return Ok(());
        }
        if let Err(e) = self.host.init().await {
            tracing::warn!(error = %e, "sandbox init failed; SSR disabled");
            self.enabled.set(false);
            return Err(OrchestratorError::from(e));
        }

        let loader = self.cjs_loader.clone();
        let install_result = self
            .host
            .with_context(move |ctx| loader.install_global_require(&ctx, SANDBOX_ENTRY_FILENAME))
            .await;
        match install_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to install global require"),
            Err(e) => tracing::warn!(error = %e, "sandbox context unavailable for require install"),
        }

        self.initialized.set(true);
        self.enabled.set(true);
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// `should_use_ssr(filename, code?)` (spec §4.10): in `auto` mode SSR
    /// applies only to `.astro`/`.vue`/`.svelte` files — React components
    /// are never auto-selected, matching the spec's explicit carve-out.
    pub fn should_use_ssr(&self, filename: &str, _code: Option<&str>) -> SsrDecision {
        if !self.enabled.get() {
            return SsrDecision::no("SSR disabled (init failed or mode=disabled)");
        }
        match self.config.mode {
            Mode::Disabled => SsrDecision::no("mode=disabled"),
            Mode::Always => SsrDecision::yes("mode=always"),
            Mode::Auto => {
                if filename.ends_with(".astro") || filename.ends_with(".vue") || filename.ends_with(".svelte")
                {
                    SsrDecision::yes(format!("auto mode matched suffix of '{filename}'"))
                } else {
                    SsrDecision::no("auto mode only applies to .astro/.vue/.svelte files")
                }
            }
        }
    }

    /// `render(code, filename, props)` (spec §4.10): `None` when SSR is
    /// not applicable or disabled, never a thrown error.
    pub async fn render(&self, code: &str, filename: &str, props: Value) -> Option<RenderResult> {
        if !self.should_use_ssr(filename, Some(code)).use_ssr {
            return None;
        }
        let framework = xmas_renderer::framework::detect(filename, code);
        if !self.config.enabled_frameworks.contains(&framework) {
            return None;
        }
        if !self.initialized.get() {
            let _ = self.init().await;
        }
        if !self.enabled.get() {
            return None;
        }

        let options = RenderOptions {
            framework: Some(framework),
            cache: self.config.cache_enabled,
            props,
            ..Default::default()
        };
        Some(self.renderer.render(code, filename, options).await)
    }

    /// `render_page(code, filename, {props, title, lang, base_url})` (spec
    /// §4.10): a full HTML document, or `None` under the same conditions
    /// as `render`.
    pub async fn render_page(
        &self,
        code: &str,
        filename: &str,
        options: RenderPageOptions,
    ) -> Option<String> {
        let result = self.render(code, filename, options.props.clone()).await?;
        Some(build_document(&result, &options))
    }

    /// `prerender_pages(list)` (spec §4.10): only successful renders are
    /// included in the returned mapping.
    pub async fn prerender_pages(&self, pages: Vec<PrerenderInput>) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for page in pages {
            if let Some(html) = self.render_page(&page.code, &page.filename, page.options).await {
                out.insert(page.filename, html);
            }
        }
        out
    }

    /// `sync_files(files)` (spec §4.10): copies build artifacts into the
    /// VFS, creating intermediate directories as needed.
    pub fn sync_files(&self, files: &BTreeMap<String, String>) {
        let mut vfs = self.vfs.borrow_mut();
        for (path, content) in files {
            let dir = xmas_vfs::path::dirname(path);
            let _ = vfs.mkdir(&dir, DirOptions { recursive: true });
            let _ = vfs.write_file(path, Content::Text(content.clone()));
        }
    }

    pub fn vfs(&self) -> Rc<RefCell<Vfs>> {
        self.vfs.clone()
    }

    pub fn streaming(&self) -> &StreamingRenderer {
        &self.streaming
    }

    pub fn render_to_stream(&self, html: String, options: StreamOptions) -> ChunkStream {
        self.streaming.render_to_stream(html, options)
    }

    pub fn get_cache_stats(&self) -> Option<CacheStats> {
        if !self.config.cache_enabled {
            return None;
        }
        Some(self.cache.borrow().stats())
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// `invalidate_cache(filename)` (spec §4.10): drops every cache entry
    /// keyed under `filename` (spec §4.7 `invalidate_component`).
    pub fn invalidate_cache(&self, filename: &str) -> usize {
        self.cache.borrow_mut().invalidate_component(filename)
    }

    /// Idempotent; safe to call multiple times (spec §5 "Cancellation").
    pub async fn destroy(&self) {
        self.streaming.cancel_all_streams();
        self.host.destroy().await;
        self.cache.borrow_mut().clear();
        self.initialized.set(false);
        self.enabled.set(false);
    }
}

thread_local! {
    static SHARED: RefCell<Option<Rc<Orchestrator>>> = const { RefCell::new(None) };
}

/// Process-wide (thread-local, since every handle here is `Rc`)
/// convenience accessor (spec §9 Design Notes "Global singletons"). The
/// injectable constructor [`Orchestrator::new`] remains the primary API;
/// this is a convenience only.
pub fn get_shared_orchestrator() -> Rc<Orchestrator> {
    SHARED.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(Rc::new(Orchestrator::new(OrchestratorConfig::default())));
        }
        slot.as_ref().unwrap().clone()
    })
}

pub fn reset_shared_orchestrator() {
    SHARED.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make() -> Orchestrator {
        Orchestrator::new(OrchestratorConfig::default())
    }

    #[test]
    fn auto_mode_applies_only_to_framework_suffixes() {
        let orch = make();
        assert!(orch.should_use_ssr("Button.astro", None).use_ssr);
        assert!(orch.should_use_ssr("Button.vue", None).use_ssr);
        assert!(orch.should_use_ssr("Button.svelte", None).use_ssr);
        assert!(!orch.should_use_ssr("Button.tsx", None).use_ssr);
    }

    #[test]
    fn disabled_mode_never_uses_ssr() {
        let orch = Orchestrator::new(OrchestratorConfig {
            mode: Mode::Disabled,
            ..OrchestratorConfig::default()
        });
        assert!(!orch.should_use_ssr("Button.astro", None).use_ssr);
    }

    #[tokio::test]
    async fn render_returns_none_for_unsupported_suffix_in_auto_mode() {
        let orch = make();
        let result = orch.render("const x = 1;", "index.js", Value::Null).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn render_page_produces_a_full_document() {
        let orch = Orchestrator::new(OrchestratorConfig {
            mode: Mode::Always,
            ..OrchestratorConfig::default()
        });
        let code = r#"function App(){ return createElement("div", null, "Hi"); }"#;
        let html = orch
            .render_page(
                code,
                "App.tsx",
                RenderPageOptions { title: "Test".into(), ..Default::default() },
            )
            .await
            .expect("render_page should succeed");
        assert!(html.contains("<!DOCTYPE html>"));
        assert!(html.contains("<title>Test</title>"));
        assert!(html.contains("<div>Hi</div>"));
    }

    #[tokio::test]
    async fn sync_files_populates_the_vfs() {
        let orch = make();
        let mut files = BTreeMap::new();
        files.insert("/src/a.txt".to_string(), "hi".to_string());
        orch.sync_files(&files);
        assert!(orch.vfs().borrow().exists("/src/a.txt"));
    }

    #[tokio::test]
    async fn cache_stats_reflect_enabled_flag() {
        let enabled = make();
        assert!(enabled.get_cache_stats().is_some());

        let disabled = Orchestrator::new(OrchestratorConfig {
            cache_enabled: false,
            ..OrchestratorConfig::default()
        });
        assert!(disabled.get_cache_stats().is_none());
    }

    #[test]
    fn shared_orchestrator_accessor_is_reusable() {
        reset_shared_orchestrator();
        let a = get_shared_orchestrator();
        let b = get_shared_orchestrator();
        assert!(Rc::ptr_eq(&a, &b));
        reset_shared_orchestrator();
    }
}
