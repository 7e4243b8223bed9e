//! `package.json` parsing, the `exports` resolution algorithm (spec §4.4),
//! and the per-path package cache with negative-result caching.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use xmas_vfs::Vfs;

/// The condition resolution order for nested `exports` condition objects.
pub const CONDITION_ORDER: &[&str] = &["import", "require", "node", "default"];

/// Typed projection of the common `package.json` fields. `exports` stays on
/// `serde_json::Value` because its shape (string | map-of-subpaths |
/// map-of-conditions) is not fixed.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageJson {
    pub name: Option<String>,
    pub version: Option<String>,
    pub main: Option<String>,
    pub module: Option<String>,
    #[serde(default, rename = "type")]
    pub module_type: Option<String>,
    #[serde(default)]
    pub exports: Option<Value>,
}

impl PackageJson {
    /// Whether this package is declared as ESM (`"type": "module"`).
    pub fn is_esm_by_default(&self) -> bool {
        self.module_type.as_deref() == Some("module")
    }
}

/// Cache of parsed `package.json` files keyed by absolute path. Negative
/// entries (file absent or unparsable) are cached as `None` to avoid
/// repeated VFS lookups.
#[derive(Default)]
pub struct PackageCache {
    entries: RefCell<HashMap<String, Option<PackageJson>>>,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Read and parse `package.json` at `path`, caching the (possibly
    /// negative) result.
    pub fn get(&self, vfs: &mut Vfs, path: &str) -> Option<PackageJson> {
        if let Some(cached) = self.entries.borrow().get(path) {
            return cached.clone();
        }

        let parsed = vfs
            .read_file_string(path)
            .ok()
            .and_then(|content| serde_json::from_str::<PackageJson>(&content).ok());

        self.entries
            .borrow_mut()
            .insert(path.to_string(), parsed.clone());
        parsed
    }
}

/// Resolve `exports[subpath]` following spec §4.4: exact subpath match
/// first, then a single-`*` pattern match with capture substitution, then
/// condition-object resolution in `CONDITION_ORDER`.
pub fn resolve_exports(exports: &Value, subpath: &str) -> Option<String> {
    match exports {
        Value::String(s) => (subpath == ".").then(|| s.clone()),
        Value::Object(map) => {
            let keys_are_subpaths = map.keys().next().map(|k| k.starts_with('.')).unwrap_or(false);
            if !keys_are_subpaths {
                return if subpath == "." {
                    resolve_conditions(exports)
                } else {
                    None
                };
            }

            if let Some(target) = map.get(subpath) {
                if let Some(resolved) = resolve_conditions(target) {
                    return Some(resolved);
                }
            }

            for (pattern, target) in map {
                if let Some(captured) = match_pattern(pattern, subpath) {
                    if let Some(resolved) = resolve_conditions(target) {
                        return Some(resolved.replacen('*', &captured, 1));
                    }
                }
            }
            None
        }
        _ => None,
    }
}

fn match_pattern<'a>(pattern: &str, subpath: &'a str) -> Option<&'a str> {
    let star_idx = pattern.find('*')?;
    let (prefix, rest) = pattern.split_at(star_idx);
    let suffix = &rest[1..];
    if subpath.starts_with(prefix)
        && subpath.ends_with(suffix)
        && subpath.len() >= prefix.len() + suffix.len()
    {
        Some(&subpath[prefix.len()..subpath.len() - suffix.len()])
    } else {
        None
    }
}

fn resolve_conditions(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            for cond in CONDITION_ORDER {
                if let Some(target) = map.get(*cond) {
                    if let Some(resolved) = resolve_conditions(target) {
                        return Some(resolved);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_export_only_applies_to_dot() {
        let exports = json!("./index.js");
        assert_eq!(resolve_exports(&exports, "."), Some("./index.js".into()));
        assert_eq!(resolve_exports(&exports, "./sub"), None);
    }

    #[test]
    fn condition_object_tries_order() {
        let exports = json!({ "import": "./esm.mjs", "require": "./cjs.cjs" });
        assert_eq!(resolve_exports(&exports, "."), Some("./esm.mjs".into()));
    }

    #[test]
    fn pattern_export_substitutes_capture() {
        let exports = json!({ "./features/*": "./src/features/*.js" });
        assert_eq!(
            resolve_exports(&exports, "./features/foo"),
            Some("./src/features/foo.js".into())
        );
    }
}
