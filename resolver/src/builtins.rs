//! The fixed set of trusted built-in module names the resolver recognizes.
//! Their *implementations* live in `xmas-js-modules`; the resolver only
//! needs to know which specifiers are built-in.

/// Names exposed to sandboxed code under a fixed name (spec §4.3).
pub const BUILTIN_MODULES: &[&str] = &[
    "path",
    "events",
    "buffer",
    "fs",
    "fs/promises",
    "crypto",
    "stream",
    "stream/promises",
    "util",
    "process",
    "timers",
    "timers/promises",
    "url",
    "os",
];

/// Whether `specifier` (after stripping an optional `node:` prefix) names a
/// built-in module.
pub fn is_builtin(specifier: &str) -> bool {
    let name = specifier.strip_prefix("node:").unwrap_or(specifier);
    BUILTIN_MODULES.contains(&name)
}

/// Strip a `node:` prefix, returning the bare built-in name if recognized.
pub fn builtin_name(specifier: &str) -> Option<&str> {
    if let Some(name) = specifier.strip_prefix("node:") {
        return BUILTIN_MODULES.contains(&name).then_some(name);
    }
    BUILTIN_MODULES.contains(&specifier).then_some(specifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_node_prefixed_builtins() {
        assert!(is_builtin("node:fs"));
        assert!(is_builtin("path"));
        assert!(!is_builtin("node:not-a-builtin"));
        assert!(!is_builtin("lodash"));
    }
}
