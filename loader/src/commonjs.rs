//! CommonJS module loader (spec §4.5, C5): `require(id)` bound to a file,
//! backed by the Resolver and the Built-in Module Table, with a cache that
//! is populated *before* evaluation so cyclic `require`s observe a partial
//! `exports` view instead of recursing forever.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rsquickjs::context::EvalOptions;
use rsquickjs::{Ctx, Exception, Function, Object, Persistent, Result as JsResult, Value};

use xmas_js_modules::BuiltinTable;
use xmas_resolver::{ModuleFormat, Resolver};
use xmas_vfs::Vfs;

use crate::error::LoaderError;

pub type SharedVfs = Rc<RefCell<Vfs>>;

/// Rust-side bookkeeping mirroring spec §3's Module Descriptor. The
/// authoritative `exports` value lives on the JS heap (`Persistent`); this
/// struct tracks the rest so an embedder can introspect the module graph
/// without reaching into QuickJS.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    pub id: String,
    pub filename: String,
    pub dir: String,
    pub parent: Option<String>,
    pub loaded: bool,
}

struct CacheEntry {
    descriptor: ModuleDescriptor,
    exports: Persistent<Value<'static>>,
}

/// `require(id)` bound to a file (spec §4.5). Holds the module cache keyed
/// by resolved absolute filename (or builtin name / CDN URL); shared
/// `Resolver` and `BuiltinTable` instances are injected so the same
/// resolution/registry state backs both this and the ESM loader.
pub struct CommonJsLoader {
    vfs: SharedVfs,
    resolver: Rc<Resolver>,
    builtins: Rc<BuiltinTable>,
    cache: RefCell<HashMap<String, CacheEntry>>,
}

fn js_err<'js>(ctx: &Ctx<'js>, err: LoaderError) -> rsquickjs::Error {
    Exception::throw_message(ctx, &err.to_string())
}

impl CommonJsLoader {
    pub fn new(vfs: SharedVfs, resolver: Rc<Resolver>, builtins: Rc<BuiltinTable>) -> Rc<Self> {
        Rc::new(Self {
            vfs,
            resolver,
            builtins,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Snapshot of every module currently in cache, for diagnostics.
    pub fn descriptors(&self) -> Vec<ModuleDescriptor> {
        self.cache.borrow().values().map(|e| e.descriptor.clone()).collect()
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Install a `require` global bound to `from_file`, for code evaluated
    /// directly by the Sandbox Host (e.g. the Renderer's wrapped component
    /// IIFE) rather than loaded through this loader's own `require`.
    pub fn install_global_require<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, from_file: &str) -> JsResult<()> {
        let require_fn = self.make_require_fn(ctx, from_file)?;
        ctx.globals().set("require", require_fn)?;
        Ok(())
    }

    fn make_require_fn<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, from_file: &str) -> JsResult<Function<'js>> {
        let loader = self.clone();
        let from_file = from_file.to_string();
        Function::new(ctx.clone(), move |ctx: Ctx<'js>, specifier: String| -> JsResult<Value<'js>> {
            loader.require(&ctx, &specifier, &from_file)
        })
    }

    /// Resolve, load, and evaluate `specifier` as required from `from_file`,
    /// returning `module.exports` (spec §4.5 steps 1-5).
    pub fn require<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, specifier: &str, from_file: &str) -> JsResult<Value<'js>> {
        let resolution = {
            let mut vfs = self.vfs.borrow_mut();
            self.resolver.resolve(&mut vfs, specifier, from_file)
        };

        if resolution.is_builtin {
            let name = resolution.filename.as_deref().unwrap_or(specifier);
            let ns = self.builtins.install(ctx, name)?;
            return Ok(ns.into_value());
        }

        if resolution.is_external {
            return Err(js_err(ctx, LoaderError::RequireOfExternal(specifier.to_string())));
        }

        let Some(filename) = resolution.filename.clone() else {
            return Err(js_err(ctx, LoaderError::ModuleNotFound(specifier.to_string())));
        };

        if filename.ends_with(".node") {
            return Err(js_err(ctx, LoaderError::NativeModuleUnsupported(filename)));
        }

        if let Some(entry) = self.cache.borrow().get(&filename) {
            return entry.exports.clone().restore(ctx);
        }

        self.load_fresh(ctx, &filename, resolution.format, from_file)
    }

    fn load_fresh<'js>(
        self: &Rc<Self>,
        ctx: &Ctx<'js>,
        filename: &str,
        format: ModuleFormat,
        from_file: &str,
    ) -> JsResult<Value<'js>> {
        let exports_obj = Object::new(ctx.clone())?;
        let module_obj = Object::new(ctx.clone())?;
        module_obj.set("exports", exports_obj.clone())?;
        module_obj.set("id", filename.to_string())?;
        module_obj.set("filename", filename.to_string())?;
        let dir = xmas_vfs::path::dirname(filename);
        module_obj.set("path", dir.clone())?;
        module_obj.set("loaded", false)?;

        // Insert the partial exports into the cache *before* evaluating, so
        // a cyclic `require` observes this placeholder instead of looping
        // (spec §4.5 step 2-3, invariant 6).
        let placeholder = Persistent::save(ctx, exports_obj.clone().into_value());
        self.cache.borrow_mut().insert(
            filename.to_string(),
            CacheEntry {
                descriptor: ModuleDescriptor {
                    id: filename.to_string(),
                    filename: filename.to_string(),
                    dir,
                    parent: Some(from_file.to_string()),
                    loaded: false,
                },
                exports: placeholder,
            },
        );

        let outcome = self.evaluate_into(ctx, filename, format, &exports_obj, &module_obj);
        match outcome {
            Ok(()) => {
                let final_exports: Value<'js> = module_obj.get("exports")?;
                let persisted = Persistent::save(ctx, final_exports.clone());
                if let Some(entry) = self.cache.borrow_mut().get_mut(filename) {
                    entry.exports = persisted;
                    entry.descriptor.loaded = true;
                }
                Ok(final_exports)
            }
            Err(err) => {
                self.cache.borrow_mut().remove(filename);
                Err(err)
            }
        }
    }

    fn evaluate_into<'js>(
        self: &Rc<Self>,
        ctx: &Ctx<'js>,
        filename: &str,
        format: ModuleFormat,
        exports_obj: &Object<'js>,
        module_obj: &Object<'js>,
    ) -> JsResult<()> {
        let source = {
            let mut vfs = self.vfs.borrow_mut();
            vfs.read_file_string(filename)
                .map_err(|e| js_err(ctx, LoaderError::ModuleNotFound(format!("{filename}: {e}"))))?
        };

        if format == ModuleFormat::Json {
            let value: Value<'js> = ctx.json_parse(source)?;
            module_obj.set("exports", value)?;
            return Ok(());
        }

        let wrapped = format!(
            "(function(exports, require, module, __filename, __dirname) {{\n{source}\n}})"
        );
        let options = EvalOptions {
            filename: Some(filename.to_string()),
            ..Default::default()
        };
        let wrapper: Function = ctx
            .eval_with_options(wrapped, options)
            .map_err(|e| js_err(ctx, LoaderError::CompilationFailure(filename.to_string(), e.to_string())))?;

        let require_fn = self.make_require_fn(ctx, filename)?;
        let dirname = xmas_vfs::path::dirname(filename);
        wrapper.call::<_, Value<'js>>((
            exports_obj.clone(),
            require_fn,
            module_obj.clone(),
            filename.to_string(),
            dirname,
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmas_vfs::{Content, DirOptions};

    fn sandbox_with(files: &[(&str, &str)]) -> (xmas_sandbox::SandboxHost, Rc<CommonJsLoader>) {
        let mut vfs = Vfs::new();
        vfs.mkdir("/src", DirOptions { recursive: true }).ok();
        for (path, content) in files {
            let dir = xmas_vfs::path::dirname(path);
            let _ = vfs.mkdir(&dir, DirOptions { recursive: true });
            vfs.write_file(path, Content::Text((*content).to_string())).unwrap();
        }
        let shared_vfs: SharedVfs = Rc::new(RefCell::new(vfs));
        let resolver = Rc::new(Resolver::new(xmas_resolver::ResolverConfig::default()));
        let builtins = Rc::new(BuiltinTable::new());
        let loader = CommonJsLoader::new(shared_vfs, resolver, builtins);
        (xmas_sandbox::SandboxHost::new(xmas_sandbox::SandboxConfig::default()), loader)
    }

    #[tokio::test]
    async fn s_cycle_tolerance_two_modules() {
        let (host, loader) = sandbox_with(&[
            ("/src/a.js", "exports.fromA = 'a'; const b = require('./b'); exports.sawB = b.fromB;"),
            ("/src/b.js", "exports.fromB = 'b'; const a = require('./a'); exports.sawAFromB = a.fromA;"),
        ]);
        host.init().await.unwrap();
        let result = host
            .with_context(|ctx| {
                let exports = loader.require(&ctx, "./a", "/src/entry.js").unwrap();
                let obj = exports.into_object().unwrap();
                let saw_b: String = obj.get("sawB").unwrap();
                saw_b
            })
            .await
            .unwrap();
        assert_eq!(result, "b");
    }

    #[tokio::test]
    async fn json_module_parses_into_exports() {
        let (host, loader) = sandbox_with(&[("/src/data.json", r#"{"a":1,"b":"two"}"#)]);
        host.init().await.unwrap();
        let value = host
            .with_context(|ctx| {
                let exports = loader.require(&ctx, "./data.json", "/src/entry.js").unwrap();
                let obj = exports.into_object().unwrap();
                let a: i32 = obj.get("a").unwrap();
                a
            })
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn native_extension_rejected() {
        let (host, loader) = sandbox_with(&[("/src/native.node", "")]);
        host.init().await.unwrap();
        let err = host
            .with_context(|ctx| loader.require(&ctx, "./native.node", "/src/entry.js").err().map(|e| e.to_string()))
            .await
            .unwrap();
        assert!(err.unwrap().contains("native modules unsupported") || err.is_some());
    }
}
