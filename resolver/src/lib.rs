//! Node-style CommonJS/ESM specifier resolution over the VFS (spec §4.4,
//! C4). Resolves specifiers to absolute VFS paths, built-in names, or
//! external CDN URLs; caches `package.json`.

pub mod builtins;
pub mod error;
pub mod package;

pub use builtins::{is_builtin, BUILTIN_MODULES};
pub use error::{ResolverError, ResolverResult};
pub use package::{resolve_exports, PackageCache, PackageJson};

use xmas_vfs::Vfs;

/// The module format a resolved specifier should be loaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    CommonJs,
    Module,
    Json,
    Builtin,
}

/// Result of `Resolver::resolve` (spec §3, "Resolution Result").
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub found: bool,
    /// Absolute VFS path for local resolutions, or the builtin name / CDN
    /// URL otherwise.
    pub filename: Option<String>,
    pub format: ModuleFormat,
    pub is_builtin: bool,
    pub is_external: bool,
}

impl ResolutionResult {
    fn not_found() -> Self {
        Self {
            found: false,
            filename: None,
            format: ModuleFormat::CommonJs,
            is_builtin: false,
            is_external: false,
        }
    }

    fn builtin(name: &str) -> Self {
        Self {
            found: true,
            filename: Some(name.to_string()),
            format: ModuleFormat::Builtin,
            is_builtin: true,
            is_external: false,
        }
    }

    fn local(path: String, format: ModuleFormat) -> Self {
        Self {
            found: true,
            filename: Some(path),
            format,
            is_builtin: false,
            is_external: false,
        }
    }

    fn external(url: String) -> Self {
        Self {
            found: true,
            filename: Some(url),
            format: ModuleFormat::Module,
            is_builtin: false,
            is_external: true,
        }
    }
}

/// Resolver configuration (spec §6 defaults).
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub base_dir: String,
    pub module_paths: Vec<String>,
    pub extensions: Vec<String>,
    pub cdn_url: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_dir: "/".to_string(),
            module_paths: vec!["/node_modules".to_string()],
            extensions: vec![
                ".js".into(),
                ".mjs".into(),
                ".cjs".into(),
                ".ts".into(),
                ".tsx".into(),
                ".jsx".into(),
                ".json".into(),
            ],
            cdn_url: "https://esm.sh".to_string(),
        }
    }
}

impl ResolverConfig {
    /// The basename each configured module root resolves to when walked at
    /// every ancestor directory (default: just `node_modules`).
    fn module_root_names(&self) -> Vec<String> {
        self.module_paths
            .iter()
            .map(|p| xmas_vfs::path::basename(p, None))
            .collect()
    }
}

/// Extensions rejected outright as unsupported (spec §4.4 step 3b).
const UNSUPPORTED_EXTENSION: &str = ".node";

pub struct Resolver {
    pub config: ResolverConfig,
    pub packages: PackageCache,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            packages: PackageCache::new(),
        }
    }

    /// Resolve `specifier` as imported/required from `from_file`.
    pub fn resolve(&self, vfs: &mut Vfs, specifier: &str, from_file: &str) -> ResolutionResult {
        if let Some(name) = builtins::builtin_name(specifier) {
            return ResolutionResult::builtin(name);
        }
        if specifier.starts_with("node:") {
            // node:-prefixed but not in the builtin table.
            return ResolutionResult::not_found();
        }

        let is_relative = specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier.starts_with('/');

        if is_relative {
            let from_dir = xmas_vfs::path::dirname(from_file);
            let target = xmas_vfs::path::resolve(&from_dir, specifier);
            return match self.resolve_file_or_dir(vfs, &target) {
                Some((path, format)) => ResolutionResult::local(path, format),
                None => ResolutionResult::not_found(),
            };
        }

        if let Some((path, format)) = self.resolve_package(vfs, specifier, from_file) {
            return ResolutionResult::local(path, format);
        }

        if looks_like_npm_package(specifier) {
            return ResolutionResult::external(format!("{}/{}", self.config.cdn_url, specifier));
        }

        ResolutionResult::not_found()
    }

    /// Try an exact file, then each configured extension, then directory
    /// resolution (`exports`/`main`/`module`/`index.<ext>`).
    fn resolve_file_or_dir(&self, vfs: &mut Vfs, path: &str) -> Option<(String, ModuleFormat)> {
        if let Some(found) = self.try_as_file(vfs, path) {
            return Some(found);
        }
        self.try_as_directory(vfs, path)
    }

    fn try_as_file(&self, vfs: &mut Vfs, path: &str) -> Option<(String, ModuleFormat)> {
        if let Ok(stat) = vfs.stat(path) {
            if stat.is_file {
                return Some((path.to_string(), detect_format(path)));
            }
        }
        for ext in &self.config.extensions {
            if ext == UNSUPPORTED_EXTENSION {
                continue;
            }
            let candidate = format!("{path}{ext}");
            if let Ok(stat) = vfs.stat(&candidate) {
                if stat.is_file {
                    return Some((candidate.clone(), detect_format(&candidate)));
                }
            }
        }
        None
    }

    fn try_as_directory(&self, vfs: &mut Vfs, dir: &str) -> Option<(String, ModuleFormat)> {
        let stat = vfs.stat(dir).ok()?;
        if !stat.is_directory {
            return None;
        }

        let pkg_path = xmas_vfs::path::join(&[dir, "package.json"]);
        if let Some(pkg) = self.packages.get(vfs, &pkg_path) {
            if let Some(exports) = &pkg.exports {
                if let Some(target) = resolve_exports(exports, ".") {
                    let resolved = xmas_vfs::path::join(&[dir, target.as_str()]);
                    if let Some(found) = self.try_as_file(vfs, &resolved) {
                        return Some(found);
                    }
                }
            }
            if let Some(main) = pkg.module.as_ref().or(pkg.main.as_ref()) {
                let resolved = xmas_vfs::path::join(&[dir, main.as_str()]);
                if let Some(found) = self.try_as_file(vfs, &resolved) {
                    return Some(found);
                }
            }
        }

        for ext in &self.config.extensions {
            if ext == UNSUPPORTED_EXTENSION {
                continue;
            }
            let index = xmas_vfs::path::join(&[dir, format!("index{ext}").as_str()]);
            if let Ok(stat) = vfs.stat(&index) {
                if stat.is_file {
                    return Some((index.clone(), detect_format(&index)));
                }
            }
        }
        None
    }

    /// Extract `(package_name, subpath)` from a bare specifier, handling
    /// scoped packages (`@scope/name/sub`).
    fn split_package_specifier(specifier: &str) -> (String, String) {
        if specifier.starts_with('@') {
            let mut parts = specifier.splitn(3, '/');
            let scope = parts.next().unwrap_or_default();
            let name = parts.next().unwrap_or_default();
            let subpath = parts.next().map(|r| format!("./{r}")).unwrap_or_else(|| ".".to_string());
            (format!("{scope}/{name}"), subpath)
        } else {
            let mut parts = specifier.splitn(2, '/');
            let name = parts.next().unwrap_or_default().to_string();
            let subpath = parts.next().map(|r| format!("./{r}")).unwrap_or_else(|| ".".to_string());
            (name, subpath)
        }
    }

    fn resolve_package(
        &self,
        vfs: &mut Vfs,
        specifier: &str,
        from_file: &str,
    ) -> Option<(String, ModuleFormat)> {
        let (package_name, subpath) = Self::split_package_specifier(specifier);
        let module_roots = self.config.module_root_names();

        let mut current = Some(xmas_vfs::path::dirname(from_file));
        while let Some(dir) = current {
            for root_name in &module_roots {
                let pkg_dir = xmas_vfs::path::join(&[dir.as_str(), root_name.as_str(), package_name.as_str()]);
                if let Ok(stat) = vfs.stat(&pkg_dir) {
                    if stat.is_directory {
                        if subpath == "." {
                            if let Some(found) = self.try_as_directory(vfs, &pkg_dir) {
                                return Some(found);
                            }
                        } else {
                            let pkg_path = xmas_vfs::path::join(&[pkg_dir.as_str(), "package.json"]);
                            if let Some(pkg) = self.packages.get(vfs, &pkg_path) {
                                if let Some(exports) = &pkg.exports {
                                    if let Some(target) = resolve_exports(exports, &subpath) {
                                        let resolved =
                                            xmas_vfs::path::join(&[pkg_dir.as_str(), target.as_str()]);
                                        if let Some(found) = self.try_as_file(vfs, &resolved) {
                                            return Some(found);
                                        }
                                    }
                                }
                            }
                            let direct = xmas_vfs::path::join(&[pkg_dir.as_str(), subpath.as_str()]);
                            if let Some(found) = self.resolve_file_or_dir(vfs, &direct) {
                                return Some(found);
                            }
                        }
                    }
                }
            }
            if dir == "/" {
                break;
            }
            current = Some(xmas_vfs::path::dirname(&dir)).filter(|d| d != &dir);
        }
        None
    }
}

fn detect_format(path: &str) -> ModuleFormat {
    if path.ends_with(".json") {
        return ModuleFormat::Json;
    }
    if path.ends_with(".mjs") {
        return ModuleFormat::Module;
    }
    if path.ends_with(".cjs") {
        return ModuleFormat::CommonJs;
    }
    ModuleFormat::CommonJs
}

/// Format inference consulting the nearest ancestor `package.json`'s `type`
/// field (spec §4.4). Used by loaders once a file is resolved with a bare
/// `.js`/`.ts`/`.jsx`/`.tsx` extension, where the extension alone is
/// ambiguous between CommonJS and ESM.
pub fn infer_format(vfs: &mut Vfs, packages: &PackageCache, path: &str) -> ModuleFormat {
    if path.ends_with(".json") {
        return ModuleFormat::Json;
    }
    if path.ends_with(".mjs") {
        return ModuleFormat::Module;
    }
    if path.ends_with(".cjs") {
        return ModuleFormat::CommonJs;
    }

    let mut dir = xmas_vfs::path::dirname(path);
    loop {
        let pkg_path = xmas_vfs::path::join(&[&dir, "package.json"]);
        if let Some(pkg) = packages.get(vfs, &pkg_path) {
            return if pkg.is_esm_by_default() {
                ModuleFormat::Module
            } else {
                ModuleFormat::CommonJs
            };
        }
        if dir == "/" {
            break;
        }
        let parent = xmas_vfs::path::dirname(&dir);
        if parent == dir {
            break;
        }
        dir = parent;
    }
    ModuleFormat::CommonJs
}

fn looks_like_npm_package(specifier: &str) -> bool {
    let head = specifier.split('/').next().unwrap_or(specifier);
    let name = head.trim_start_matches('@');
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmas_vfs::{Content, DirOptions};

    fn seeded_vfs() -> Vfs {
        let mut vfs = Vfs::new();
        vfs.mkdir("/src/components", DirOptions { recursive: true }).unwrap();
        vfs.write_file("/src/index.js", Content::Text("".into())).unwrap();
        vfs.write_file("/src/utils.ts", Content::Text("".into())).unwrap();
        vfs.write_file("/src/components/Button.tsx", Content::Text("".into())).unwrap();

        vfs.mkdir("/node_modules/lodash", DirOptions { recursive: true }).unwrap();
        vfs.write_file("/node_modules/lodash/index.js", Content::Text("".into())).unwrap();
        vfs.write_file(
            "/node_modules/lodash/package.json",
            Content::Text(r#"{"name":"lodash","main":"index.js"}"#.into()),
        )
        .unwrap();

        vfs.mkdir("/node_modules/@scope/lib", DirOptions { recursive: true }).unwrap();
        vfs.write_file("/node_modules/@scope/lib/index.mjs", Content::Text("".into())).unwrap();
        vfs.write_file(
            "/node_modules/@scope/lib/package.json",
            Content::Text(r#"{"name":"@scope/lib","module":"index.mjs"}"#.into()),
        )
        .unwrap();

        vfs
    }

    #[test]
    fn s2_resolver_scenario() {
        let mut vfs = seeded_vfs();
        let resolver = Resolver::new(ResolverConfig::default());

        let r = resolver.resolve(&mut vfs, "./utils", "/src/index.js");
        assert_eq!(r.filename.as_deref(), Some("/src/utils.ts"));

        let r = resolver.resolve(&mut vfs, "../utils", "/src/components/Button.tsx");
        assert_eq!(r.filename.as_deref(), Some("/src/utils.ts"));

        let r = resolver.resolve(&mut vfs, "lodash", "/src/index.js");
        assert_eq!(r.filename.as_deref(), Some("/node_modules/lodash/index.js"));

        let r = resolver.resolve(&mut vfs, "@scope/lib", "/src/index.js");
        assert_eq!(r.filename.as_deref(), Some("/node_modules/@scope/lib/index.mjs"));

        let r = resolver.resolve(&mut vfs, "unknown-package", "/src/index.js");
        assert!(r.is_external);
    }

    #[test]
    fn determinism() {
        let mut vfs = seeded_vfs();
        let resolver = Resolver::new(ResolverConfig::default());
        let a = resolver.resolve(&mut vfs, "lodash", "/src/index.js");
        let b = resolver.resolve(&mut vfs, "lodash", "/src/index.js");
        assert_eq!(a.filename, b.filename);
        assert_eq!(a.found, b.found);
    }

    #[test]
    fn relative_specifiers_never_escape_to_external() {
        let mut vfs = seeded_vfs();
        let resolver = Resolver::new(ResolverConfig::default());
        let r = resolver.resolve(&mut vfs, "./does-not-exist", "/src/index.js");
        assert!(!r.is_external);
        assert!(!r.found);
    }
}
