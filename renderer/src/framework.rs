//! Framework detection (spec §4.8): filename suffix first, then a small
//! set of code-pattern heuristics, defaulting to React. Order matters —
//! the first match wins, matching the source behavior verbatim.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framework {
    Astro,
    Vue,
    Svelte,
    React,
}

impl Framework {
    pub fn as_str(self) -> &'static str {
        match self {
            Framework::Astro => "astro",
            Framework::Vue => "vue",
            Framework::Svelte => "svelte",
            Framework::React => "react",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "astro" => Some(Framework::Astro),
            "vue" => Some(Framework::Vue),
            "svelte" => Some(Framework::Svelte),
            "react" => Some(Framework::React),
            _ => None,
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the framework for `filename`/`code` (spec §4.8 "Framework
/// detection"). Never fails: falls back to React when nothing else
/// matches, exactly as the spec's step 3 default says.
pub fn detect(filename: &str, code: &str) -> Framework {
    if filename.ends_with(".astro") {
        return Framework::Astro;
    }
    if filename.ends_with(".vue") {
        return Framework::Vue;
    }
    if filename.ends_with(".svelte") {
        return Framework::Svelte;
    }

    if code.contains("$$createComponent") || code.contains("createAstro") {
        return Framework::Astro;
    }
    if code.contains("defineComponent") || code.contains("createApp") || code.contains("<template>")
    {
        return Framework::Vue;
    }
    if code.contains("SvelteComponent") || code.contains("create_ssr_component") {
        return Framework::Svelte;
    }
    if code.contains("createElement") || code.contains("React.") || code.contains("jsx") {
        return Framework::React;
    }

    Framework::React
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_wins_over_code_pattern() {
        assert_eq!(detect("Button.astro", "defineComponent()"), Framework::Astro);
    }

    #[test]
    fn code_pattern_detects_vue() {
        assert_eq!(detect("Button.tsx", "export default defineComponent({})"), Framework::Vue);
    }

    #[test]
    fn defaults_to_react() {
        assert_eq!(detect("index.js", "const x = 1;"), Framework::React);
    }

    #[test]
    fn svelte_pattern() {
        assert_eq!(
            detect("App.js", "import { create_ssr_component } from 'svelte'"),
            Framework::Svelte
        );
    }
}
