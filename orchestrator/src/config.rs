//! Orchestrator configuration (spec §6): aggregates every subsystem's
//! `Config`/`Options` the way `repl/src/main.rs` aggregated the teacher's
//! CLI config — except this façade is a library entry point, so no `clap`
//! dependency is carried here.

use std::collections::HashSet;

use xmas_renderer::Framework;
use xmas_resolver::ResolverConfig;
use xmas_sandbox::SandboxConfig;
use xmas_ssr_cache::SsrCacheConfig;
use xmas_streaming::StreamingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Disabled,
    Auto,
    Always,
}

#[derive(Clone)]
pub struct OrchestratorConfig {
    pub mode: Mode,
    pub cache_enabled: bool,
    pub enabled_frameworks: HashSet<Framework>,
    pub sandbox: SandboxConfig,
    pub resolver: ResolverConfig,
    pub cache: SsrCacheConfig,
    pub streaming: StreamingConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            cache_enabled: true,
            enabled_frameworks: HashSet::from([
                Framework::Astro,
                Framework::Vue,
                Framework::Svelte,
                Framework::React,
            ]),
            sandbox: SandboxConfig::default(),
            resolver: ResolverConfig::default(),
            cache: SsrCacheConfig::default(),
            streaming: StreamingConfig::default(),
        }
    }
}

/// `should_use_ssr`'s result (spec §4.10): a decision plus a human-readable
/// reason for logging/debugging.
#[derive(Debug, Clone)]
pub struct SsrDecision {
    pub use_ssr: bool,
    pub reason: String,
}

impl SsrDecision {
    pub fn yes(reason: impl Into<String>) -> Self {
        Self { use_ssr: true, reason: reason.into() }
    }

    pub fn no(reason: impl Into<String>) -> Self {
        Self { use_ssr: false, reason: reason.into() }
    }
}
