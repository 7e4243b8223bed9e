//! ESM module loader (spec §4.6, C6): a two-phase link/evaluate pipeline
//! with explicit per-module states (`unlinked → linking → linked →
//! evaluating → evaluated`) so cycles are tolerated the same way CommonJS
//! tolerates them — re-entry during `linking`/`evaluating` returns the
//! record (or its current, possibly-empty namespace) instead of recursing.
//!
//! Dependency discovery and the import/export transform are both
//! line-oriented regex scans rather than a real parser, matching the
//! source behavior spec §9's Design Notes explicitly sanctions preserving.
//! Executable semantics run through the same `Function`-wrapper technique
//! `CommonJsLoader` uses for CJS modules (spec §4.6: "free to use a real
//! ESM evaluator when available" — none is, here).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;
use rsquickjs::context::EvalOptions;
use rsquickjs::{Array, Ctx, Exception, Function, Object, Persistent, Result as JsResult, Value};

use xmas_js_modules::BuiltinTable;
use xmas_resolver::Resolver;
use xmas_vfs::Vfs;

use crate::commonjs::SharedVfs;
use crate::error::LoaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Unlinked,
    Linking,
    Linked,
    Evaluating,
    Evaluated,
    Errored,
}

#[derive(Debug, Clone)]
enum ResolvedDep {
    Local(String),
    Builtin(String),
    External(String),
}

impl ResolvedDep {
    fn key(&self) -> &str {
        match self {
            ResolvedDep::Local(k) | ResolvedDep::Builtin(k) | ResolvedDep::External(k) => k,
        }
    }
}

struct EsmRecord {
    state: ModuleState,
    dependencies: Vec<ResolvedDep>,
    transformed_source: Option<String>,
    namespace: Option<Persistent<Value<'static>>>,
}

impl EsmRecord {
    fn unlinked() -> Self {
        Self {
            state: ModuleState::Unlinked,
            dependencies: Vec::new(),
            transformed_source: None,
            namespace: None,
        }
    }
}

fn js_err<'js>(ctx: &Ctx<'js>, err: LoaderError) -> rsquickjs::Error {
    Exception::throw_message(ctx, &err.to_string())
}

pub struct EsmLoader {
    vfs: SharedVfs,
    resolver: Rc<Resolver>,
    builtins: Rc<BuiltinTable>,
    records: RefCell<HashMap<String, EsmRecord>>,
}

impl EsmLoader {
    pub fn new(vfs: SharedVfs, resolver: Rc<Resolver>, builtins: Rc<BuiltinTable>) -> Rc<Self> {
        Rc::new(Self {
            vfs,
            resolver,
            builtins,
            records: RefCell::new(HashMap::new()),
        })
    }

    pub fn module_state(&self, key: &str) -> Option<ModuleState> {
        self.records.borrow().get(key).map(|r| r.state)
    }

    /// Link phase (spec §4.6): resolve `specifier` from `referrer`, scan its
    /// dependencies, and recursively link them. Returns the resolution key
    /// (absolute VFS path, builtin name, or CDN URL) to pass to `evaluate`.
    pub fn link(&self, specifier: &str, referrer: &str) -> Result<String, LoaderError> {
        let resolution = {
            let mut vfs = self.vfs.borrow_mut();
            self.resolver.resolve(&mut vfs, specifier, referrer)
        };
        if !resolution.found {
            return Err(LoaderError::ModuleNotFound(specifier.to_string()));
        }
        let key = resolution.filename.clone().unwrap();

        {
            let records = self.records.borrow();
            if let Some(rec) = records.get(&key) {
                if !matches!(rec.state, ModuleState::Unlinked) {
                    // Already linking/linked/evaluating/evaluated: cycle
                    // tolerance, return immediately (spec §4.6).
                    return Ok(key);
                }
            }
        }

        if resolution.is_builtin || resolution.is_external {
            self.records.borrow_mut().insert(
                key.clone(),
                EsmRecord {
                    state: ModuleState::Linked,
                    ..EsmRecord::unlinked()
                },
            );
            return Ok(key);
        }

        self.records.borrow_mut().insert(
            key.clone(),
            EsmRecord {
                state: ModuleState::Linking,
                ..EsmRecord::unlinked()
            },
        );

        let source = {
            let mut vfs = self.vfs.borrow_mut();
            vfs.read_file_string(&key).map_err(|e| {
                self.records.borrow_mut().remove(&key);
                LoaderError::ModuleNotFound(format!("{key}: {e}"))
            })?
        };

        let (transformed, specifiers) = transform(&source);

        let mut dependencies = Vec::with_capacity(specifiers.len());
        for spec in &specifiers {
            let dep_key = self.link(spec, &key)?;
            dependencies.push(self.classify(&dep_key));
        }

        if let Some(rec) = self.records.borrow_mut().get_mut(&key) {
            rec.dependencies = dependencies;
            rec.transformed_source = Some(transformed);
            rec.state = ModuleState::Linked;
        }
        Ok(key)
    }

    fn classify(&self, key: &str) -> ResolvedDep {
        if BuiltinTable::recognizes(key) {
            ResolvedDep::Builtin(key.to_string())
        } else if key.starts_with("http://") || key.starts_with("https://") {
            ResolvedDep::External(key.to_string())
        } else {
            ResolvedDep::Local(key.to_string())
        }
    }

    /// Evaluate phase (spec §4.6): depth-first over linked dependencies.
    /// Re-entry during `evaluating` returns the module's current (possibly
    /// empty) namespace rather than recursing — the same cycle-tolerance
    /// contract CommonJS gives.
    pub fn evaluate<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, key: &str) -> JsResult<Value<'js>> {
        let state = self.records.borrow().get(key).map(|r| r.state);
        match state {
            None => return Err(js_err(ctx, LoaderError::ModuleNotFound(key.to_string()))),
            Some(ModuleState::Evaluated) | Some(ModuleState::Evaluating) => {
                let records = self.records.borrow();
                let rec = records.get(key).unwrap();
                return match &rec.namespace {
                    Some(ns) => ns.clone().restore(ctx),
                    None => Ok(Value::new_undefined(ctx.clone())),
                };
            }
            Some(ModuleState::Errored) => {
                return Err(js_err(ctx, LoaderError::CompilationFailure(key.to_string(), "module previously failed to evaluate".into())));
            }
            _ => {}
        }

        if BuiltinTable::recognizes(key) {
            let ns = self.builtins.install(ctx, key)?;
            self.finish(key, ctx, ns.clone().into_value());
            return Ok(ns.into_value());
        }
        if key.starts_with("http://") || key.starts_with("https://") {
            // Fetching an external module is delegated to the embedder
            // (spec §1 Non-goals); surface an empty namespace rather than
            // blocking evaluation on network I/O this crate does not own.
            let ns = Object::new(ctx.clone())?;
            self.finish(key, ctx, ns.clone().into_value());
            return Ok(ns.into_value());
        }

        let ns_obj = Object::new(ctx.clone())?;
        let placeholder = Persistent::save(ctx, ns_obj.clone().into_value());
        {
            let mut records = self.records.borrow_mut();
            let rec = records.get_mut(key).expect("module must be linked before evaluate");
            rec.state = ModuleState::Evaluating;
            rec.namespace = Some(placeholder);
        }

        let deps: Vec<ResolvedDep> = self.records.borrow().get(key).unwrap().dependencies.clone();
        let mut dep_values = Vec::with_capacity(deps.len());
        for dep in &deps {
            match self.evaluate(ctx, dep.key()) {
                Ok(v) => dep_values.push(v),
                Err(e) => {
                    self.mark_errored(key);
                    return Err(e);
                }
            }
        }

        let source = self.records.borrow().get(key).unwrap().transformed_source.clone().unwrap();
        let result = self.run_module_body(ctx, key, &source, &ns_obj, dep_values);
        match result {
            Ok(()) => {
                let persisted = Persistent::save(ctx, ns_obj.clone().into_value());
                if let Some(rec) = self.records.borrow_mut().get_mut(key) {
                    rec.state = ModuleState::Evaluated;
                    rec.namespace = Some(persisted);
                }
                Ok(ns_obj.into_value())
            }
            Err(e) => {
                self.mark_errored(key);
                Err(e)
            }
        }
    }

    fn mark_errored(&self, key: &str) {
        if let Some(rec) = self.records.borrow_mut().get_mut(key) {
            rec.state = ModuleState::Errored;
        }
    }

    fn finish<'js>(&self, key: &str, ctx: &Ctx<'js>, value: Value<'js>) {
        let persisted = Persistent::save(ctx, value);
        self.records.borrow_mut().insert(
            key.to_string(),
            EsmRecord {
                state: ModuleState::Evaluated,
                namespace: Some(persisted),
                ..EsmRecord::unlinked()
            },
        );
    }

    fn run_module_body<'js>(
        self: &Rc<Self>,
        ctx: &Ctx<'js>,
        key: &str,
        source: &str,
        ns_obj: &Object<'js>,
        dep_values: Vec<Value<'js>>,
    ) -> JsResult<()> {
        let deps_array = Array::new(ctx.clone())?;
        for (i, v) in dep_values.into_iter().enumerate() {
            deps_array.set(i, v)?;
        }

        let wrapped = format!(
            "(function(__esm_exports__, __esm_import_meta__, __dynamicImport, __esm_deps__) {{\n{source}\n}})"
        );
        let options = EvalOptions {
            filename: Some(key.to_string()),
            ..Default::default()
        };
        let wrapper: Function = ctx
            .eval_with_options(wrapped, options)
            .map_err(|e| js_err(ctx, LoaderError::CompilationFailure(key.to_string(), e.to_string())))?;

        let import_meta = self.make_import_meta(ctx, key)?;
        let dynamic_import = self.make_dynamic_import_fn(ctx, key)?;

        wrapper.call::<_, Value<'js>>((ns_obj.clone(), import_meta, dynamic_import, deps_array))?;
        Ok(())
    }

    fn make_import_meta<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, key: &str) -> JsResult<Object<'js>> {
        let meta = Object::new(ctx.clone())?;
        meta.set("url", format!("file://{key}"))?;
        let vfs = self.vfs.clone();
        let resolver = self.resolver.clone();
        let referrer = key.to_string();
        meta.set(
            "resolve",
            Function::new(ctx.clone(), move |_ctx: Ctx<'js>, specifier: String| -> String {
                let mut v = vfs.borrow_mut();
                let result = resolver.resolve(&mut v, &specifier, &referrer);
                result.filename.unwrap_or(specifier)
            }),
        )?;
        Ok(meta)
    }

    fn make_dynamic_import_fn<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, referrer: &str) -> JsResult<Function<'js>> {
        let loader = self.clone();
        let referrer = referrer.to_string();
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, specifier: String| -> JsResult<rsquickjs::Promise<'js>> {
            let (promise, resolve, reject) = ctx.promise()?;
            match loader.import_module(&ctx, &specifier, &referrer) {
                Ok(v) => resolve.call::<_, ()>((v,))?,
                Err(e) => reject.call::<_, ()>((e.to_string(),))?,
            }
            Ok(promise)
        })
    }

    /// `import()` dynamic import: link then evaluate in one step.
    pub fn import_module<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, specifier: &str, referrer: &str) -> JsResult<Value<'js>> {
        let key = self.link(specifier, referrer).map_err(|e| js_err(ctx, e))?;
        self.evaluate(ctx, &key)
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}

macro_rules! lazy_re {
    ($name:ident, $pat:literal) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pat).unwrap())
        }
    };
}

lazy_re!(re_import_default_named, r#"^import\s+(\w+)\s*,\s*\{\s*([^}]*)\}\s*from\s*["']([^"']+)["'];?\s*$"#);
lazy_re!(re_import_namespace, r#"^import\s*\*\s*as\s+(\w+)\s*from\s*["']([^"']+)["'];?\s*$"#);
lazy_re!(re_import_named, r#"^import\s*\{\s*([^}]*)\}\s*from\s*["']([^"']+)["'];?\s*$"#);
lazy_re!(re_import_default, r#"^import\s+(\w+)\s*from\s*["']([^"']+)["'];?\s*$"#);
lazy_re!(re_import_side_effect, r#"^import\s*["']([^"']+)["'];?\s*$"#);
lazy_re!(re_dynamic_import, r#"import\(\s*["']([^"']+)["']\s*\)"#);

lazy_re!(re_export_default, r#"^export\s+default\s+(.*)$"#);
lazy_re!(re_export_decl, r#"^export\s+(const|let|var|function\*?|class)\s+(\w+)(.*)$"#);
lazy_re!(re_export_list_from, r#"^export\s*\{\s*([^}]*)\}\s*from\s*["']([^"']+)["'];?\s*$"#);
lazy_re!(re_export_list, r#"^export\s*\{\s*([^}]*)\}\s*;?\s*$"#);
lazy_re!(re_export_star_as_from, r#"^export\s*\*\s*as\s+(\w+)\s*from\s*["']([^"']+)["'];?\s*$"#);
lazy_re!(re_export_star_from, r#"^export\s*\*\s*from\s*["']([^"']+)["'];?\s*$"#);

fn parse_named_list(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|item| match item.split_once(" as ") {
            Some((imported, local)) => (imported.trim().to_string(), local.trim().to_string()),
            None => (item.to_string(), item.to_string()),
        })
        .collect()
}

/// Transform ESM `import`/`export` syntax into an equivalent CJS-style body
/// executed by [`EsmLoader::run_module_body`], plus the ordered list of
/// specifiers referenced by `__esm_deps__[i]` (spec §9: regex-based scanner
/// standing in for a real ESM evaluator).
fn transform(source: &str) -> (String, Vec<String>) {
    let mut specifiers: Vec<String> = Vec::new();
    let mut out = String::with_capacity(source.len());
    // `export function`/`export class` declarations are hoisted across the
    // whole wrapper body; assigning `__esm_exports__.name = name` right
    // after the (possibly multi-line) declaration's first line would land
    // the assignment *inside* the function instead of at module scope. Defer
    // every declaration export to one assignment block at the end instead.
    let mut deferred_exports: Vec<String> = Vec::new();

    for line in source.lines() {
        let trimmed = line.trim();

        if let Some(caps) = re_import_default_named().captures(trimmed) {
            let idx = push_spec(&mut specifiers, &caps[3]);
            out.push_str(&format!("const {} = __esm_deps__[{idx}].default;\n", &caps[1]));
            for (imported, local) in parse_named_list(&caps[2]) {
                out.push_str(&format!("const {local} = __esm_deps__[{idx}].{imported};\n"));
            }
            continue;
        }
        if let Some(caps) = re_import_namespace().captures(trimmed) {
            let idx = push_spec(&mut specifiers, &caps[2]);
            out.push_str(&format!("const {} = __esm_deps__[{idx}];\n", &caps[1]));
            continue;
        }
        if let Some(caps) = re_import_named().captures(trimmed) {
            let idx = push_spec(&mut specifiers, &caps[2]);
            for (imported, local) in parse_named_list(&caps[1]) {
                out.push_str(&format!("const {local} = __esm_deps__[{idx}].{imported};\n"));
            }
            continue;
        }
        if let Some(caps) = re_import_default().captures(trimmed) {
            let idx = push_spec(&mut specifiers, &caps[2]);
            out.push_str(&format!("const {} = __esm_deps__[{idx}].default;\n", &caps[1]));
            continue;
        }
        if let Some(caps) = re_import_side_effect().captures(trimmed) {
            push_spec(&mut specifiers, &caps[1]);
            continue;
        }
        if let Some(caps) = re_export_default().captures(trimmed) {
            out.push_str(&format!("__esm_exports__.default = {};\n", &caps[1]));
            continue;
        }
        if let Some(caps) = re_export_decl().captures(trimmed) {
            let keyword = &caps[1];
            let name = &caps[2];
            let rest = &caps[3];
            out.push_str(&format!("{keyword} {name}{rest}\n"));
            deferred_exports.push(name.to_string());
            continue;
        }
        if let Some(caps) = re_export_list_from().captures(trimmed) {
            let idx = push_spec(&mut specifiers, &caps[2]);
            for (imported, local) in parse_named_list(&caps[1]) {
                out.push_str(&format!("__esm_exports__.{local} = __esm_deps__[{idx}].{imported};\n"));
            }
            continue;
        }
        if let Some(caps) = re_export_list().captures(trimmed) {
            for (imported, local) in parse_named_list(&caps[1]) {
                out.push_str(&format!("__esm_exports__.{local} = {imported};\n"));
            }
            continue;
        }
        if let Some(caps) = re_export_star_as_from().captures(trimmed) {
            let idx = push_spec(&mut specifiers, &caps[2]);
            out.push_str(&format!("__esm_exports__.{} = __esm_deps__[{idx}];\n", &caps[1]));
            continue;
        }
        if let Some(caps) = re_export_star_from().captures(trimmed) {
            let idx = push_spec(&mut specifiers, &caps[1]);
            out.push_str(&format!("Object.assign(__esm_exports__, __esm_deps__[{idx}]);\n"));
            continue;
        }

        if re_dynamic_import().is_match(line) {
            out.push_str(&re_dynamic_import().replace_all(line, "__dynamicImport(\"$1\")"));
            out.push('\n');
            continue;
        }

        out.push_str(line);
        out.push('\n');
    }

    for name in &deferred_exports {
        out.push_str(&format!("__esm_exports__.{name} = {name};\n"));
    }

    (out, specifiers)
}

fn push_spec(specifiers: &mut Vec<String>, spec: &str) -> usize {
    specifiers.push(spec.to_string());
    specifiers.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use xmas_vfs::{Content, DirOptions};

    fn seeded(files: &[(&str, &str)]) -> (SharedVfs, Rc<Resolver>, Rc<BuiltinTable>) {
        let mut vfs = Vfs::new();
        for (path, content) in files {
            let dir = xmas_vfs::path::dirname(path);
            let _ = vfs.mkdir(&dir, DirOptions { recursive: true });
            vfs.write_file(path, Content::Text((*content).to_string())).unwrap();
        }
        (
            Rc::new(StdRefCell::new(vfs)),
            Rc::new(Resolver::new(xmas_resolver::ResolverConfig::default())),
            Rc::new(BuiltinTable::new()),
        )
    }

    #[test]
    fn transform_named_and_default_export() {
        let (body, specs) = transform("export const a = 1;\nexport default function foo() {}\n");
        assert!(body.contains("__esm_exports__.a = a;"));
        assert!(specs.is_empty());
    }

    #[test]
    fn transform_collects_import_specifiers() {
        let (_body, specs) = transform("import x from \"./x.js\";\nimport { a, b as c } from \"./y.js\";\n");
        assert_eq!(specs, vec!["./x.js".to_string(), "./y.js".to_string()]);
    }

    #[tokio::test]
    async fn link_tolerates_two_module_cycle() {
        let (vfs, resolver, builtins) = seeded(&[
            ("/src/a.mjs", "import { fromB } from './b.mjs';\nexport const fromA = 'a';\n"),
            ("/src/b.mjs", "import { fromA } from './a.mjs';\nexport const fromB = 'b';\n"),
        ]);
        let loader = EsmLoader::new(vfs, resolver, builtins);
        let key = loader.link("./a.mjs", "/src/entry.mjs").unwrap();
        assert_eq!(loader.module_state(&key), Some(ModuleState::Linked));
        assert_eq!(loader.module_state("/src/b.mjs"), Some(ModuleState::Linked));
    }

    #[tokio::test]
    async fn evaluate_runs_depth_first_and_exposes_named_exports() {
        let (vfs, resolver, builtins) = seeded(&[
            ("/src/math.mjs", "export const add = (a, b) => a + b;\n"),
            ("/src/entry.mjs", "import { add } from './math.mjs';\nexport const sum = add(2, 3);\n"),
        ]);
        let loader = EsmLoader::new(vfs, resolver, builtins);
        let key = loader.link("./entry.mjs", "/src/app.mjs").unwrap();

        let host = xmas_sandbox::SandboxHost::new(xmas_sandbox::SandboxConfig::default());
        host.init().await.unwrap();
        let sum: f64 = host
            .with_context(|ctx| {
                let ns = loader.evaluate(&ctx, &key).unwrap();
                let obj = ns.into_object().unwrap();
                obj.get("sum").unwrap()
            })
            .await
            .unwrap();
        assert_eq!(sum, 5.0);
    }
}
