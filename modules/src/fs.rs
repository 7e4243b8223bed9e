//! `fs` built-in (spec §4.3): VFS-backed synchronous, callback, and
//! promise-based filesystem access. An `fs` binding built before the VFS is
//! attached throws a `FilesystemNotInitialized`-flavored exception on first
//! use, naming the method that was called (spec §9 design note on
//! throw-based unsupported operations: preserve API shape rather than
//! omitting the method).

use std::cell::RefCell;
use std::rc::Rc;

use rsquickjs::prelude::{Func, Opt, Rest};
use rsquickjs::{Ctx, Exception, FromJs, Function, IntoJs, Object, Result, Value};
use xmas_vfs::{Content, DirOptions, Vfs};

use crate::buffer::Buffer;

pub type SharedVfs = Rc<RefCell<Vfs>>;

fn arg<'js, T: FromJs<'js>>(ctx: &Ctx<'js>, args: &Rest<Value<'js>>, i: usize) -> Result<T> {
    let value = args
        .get(i)
        .cloned()
        .unwrap_or_else(|| Value::new_undefined(ctx.clone()));
    T::from_js(ctx, value)
}

fn not_initialized<'js>(ctx: &Ctx<'js>, method: &'static str) -> rsquickjs::Error {
    Exception::throw_message(
        ctx,
        &format!("filesystem not initialized: fs.{method} was called before a VFS was attached"),
    )
}

fn vfs_error_to_js<'js>(ctx: &Ctx<'js>, err: xmas_vfs::VfsError) -> rsquickjs::Error {
    Exception::throw_message(ctx, &err.to_string())
}

fn stats_object<'js>(ctx: &Ctx<'js>, stats: xmas_vfs::Stats) -> Result<Object<'js>> {
    let obj = Object::new(ctx.clone())?;
    obj.set("size", stats.size)?;
    obj.set("mode", stats.mode)?;
    obj.set("mtimeMs", stats.mtime_ms())?;
    let is_file = stats.is_file;
    let is_dir = stats.is_directory;
    obj.set("isFile", Func::from(move || is_file))?;
    obj.set("isDirectory", Func::from(move || is_dir))?;
    Ok(obj)
}

/// Run a synchronous VFS operation, then invoke the trailing Node-style
/// `(err, result)` callback via a microtask so callers always observe
/// async timing, matching the ordering guarantee real `fs` callbacks give
/// even though this VFS never actually blocks.
fn defer_callback<'js>(ctx: &Ctx<'js>, cb: Function<'js>, result: Result<Value<'js>>) -> Result<()> {
    let ctx2 = ctx.clone();
    match result {
        Ok(value) => ctx.spawn(async move {
            let _ = cb.call::<_, ()>((Value::new_null(ctx2.clone()), value));
        }),
        Err(err) => {
            let message = err.to_string();
            ctx.spawn(async move {
                let _ = cb.call::<_, ()>((message, Value::new_undefined(ctx2.clone())));
            });
        }
    }
    Ok(())
}

fn promise_from_result<'js>(ctx: &Ctx<'js>, result: Result<Value<'js>>) -> Result<rsquickjs::Promise<'js>> {
    let (promise, resolve, reject) = ctx.promise()?;
    match result {
        Ok(value) => resolve.call::<_, ()>((value,))?,
        Err(err) => reject.call::<_, ()>((err.to_string(),))?,
    }
    Ok(promise)
}

/// Build the `fs` (or `fs/promises`) namespace. `vfs` is `None` until the
/// orchestrator attaches one; every method still exists but fails with a
/// clear, actionable error.
pub fn install<'js>(ctx: &Ctx<'js>, vfs: Option<SharedVfs>, promises_only: bool) -> Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;
    let promises = Object::new(ctx.clone())?;

    if !promises_only {
        install_sync(ctx, &ns, vfs.clone())?;
    }
    install_async(ctx, &ns, &promises, vfs)?;

    ns.set("promises", promises.clone())?;
    if promises_only {
        return Ok(promises);
    }
    Ok(ns)
}

fn install_sync<'js>(ctx: &Ctx<'js>, ns: &Object<'js>, vfs: Option<SharedVfs>) -> Result<()> {
    {
        let vfs = vfs.clone();
        ns.set(
            "readFileSync",
            Func::from(move |ctx: Ctx<'js>, path: String, encoding: Opt<String>| -> Result<Value<'js>> {
                let vfs = vfs.clone().ok_or_else(|| not_initialized(&ctx, "readFileSync"))?;
                let content = vfs.borrow_mut().read_file(&path).map_err(|e| vfs_error_to_js(&ctx, e))?;
                match encoding.0 {
                    Some(enc) => {
                        let text = match crate::buffer::Encoding::parse(&enc) {
                            Some(e) => crate::buffer::encode(&content.as_bytes(), e),
                            None => content.as_utf8_lossy(),
                        };
                        text.into_js(&ctx)
                    }
                    None => Buffer { bytes: content.as_bytes() }.into_js(&ctx),
                }
            }),
        )?;
    }
    {
        let vfs = vfs.clone();
        ns.set(
            "writeFileSync",
            Func::from(move |ctx: Ctx<'js>, path: String, data: String| -> Result<()> {
                let vfs = vfs.clone().ok_or_else(|| not_initialized(&ctx, "writeFileSync"))?;
                vfs.borrow_mut().write_file(&path, Content::Text(data)).map_err(|e| vfs_error_to_js(&ctx, e))
            }),
        )?;
    }
    {
        let vfs = vfs.clone();
        ns.set(
            "existsSync",
            Func::from(move |path: String| vfs.as_ref().map(|v| v.borrow().exists(&path)).unwrap_or(false)),
        )?;
    }
    {
        let vfs = vfs.clone();
        ns.set(
            "mkdirSync",
            Func::from(move |ctx: Ctx<'js>, path: String, recursive: Opt<bool>| -> Result<()> {
                let vfs = vfs.clone().ok_or_else(|| not_initialized(&ctx, "mkdirSync"))?;
                vfs.borrow_mut()
                    .mkdir(&path, DirOptions { recursive: recursive.0.unwrap_or(false) })
                    .map_err(|e| vfs_error_to_js(&ctx, e))
            }),
        )?;
    }
    {
        let vfs = vfs.clone();
        ns.set(
            "rmdirSync",
            Func::from(move |ctx: Ctx<'js>, path: String, recursive: Opt<bool>| -> Result<()> {
                let vfs = vfs.clone().ok_or_else(|| not_initialized(&ctx, "rmdirSync"))?;
                vfs.borrow_mut()
                    .rmdir(&path, DirOptions { recursive: recursive.0.unwrap_or(false) })
                    .map_err(|e| vfs_error_to_js(&ctx, e))
            }),
        )?;
    }
    {
        let vfs = vfs.clone();
        ns.set(
            "unlinkSync",
            Func::from(move |ctx: Ctx<'js>, path: String| -> Result<()> {
                let vfs = vfs.clone().ok_or_else(|| not_initialized(&ctx, "unlinkSync"))?;
                vfs.borrow_mut().unlink(&path).map_err(|e| vfs_error_to_js(&ctx, e))
            }),
        )?;
    }
    {
        let vfs = vfs.clone();
        ns.set(
            "readdirSync",
            Func::from(move |ctx: Ctx<'js>, path: String| -> Result<Vec<String>> {
                let vfs = vfs.clone().ok_or_else(|| not_initialized(&ctx, "readdirSync"))?;
                vfs.borrow().readdir(&path).map_err(|e| vfs_error_to_js(&ctx, e))
            }),
        )?;
    }
    {
        let vfs = vfs.clone();
        ns.set(
            "statSync",
            Func::from(move |ctx: Ctx<'js>, path: String| -> Result<Object<'js>> {
                let vfs = vfs.clone().ok_or_else(|| not_initialized(&ctx, "statSync"))?;
                let stats = vfs.borrow().stat(&path).map_err(|e| vfs_error_to_js(&ctx, e))?;
                stats_object(&ctx, stats)
            }),
        )?;
    }
    {
        let vfs = vfs.clone();
        ns.set(
            "renameSync",
            Func::from(move |ctx: Ctx<'js>, old: String, new: String| -> Result<()> {
                let vfs = vfs.clone().ok_or_else(|| not_initialized(&ctx, "renameSync"))?;
                vfs.borrow_mut().rename(&old, &new).map_err(|e| vfs_error_to_js(&ctx, e))
            }),
        )?;
    }
    {
        let vfs = vfs.clone();
        ns.set(
            "copyFileSync",
            Func::from(move |ctx: Ctx<'js>, src: String, dest: String| -> Result<()> {
                let vfs = vfs.clone().ok_or_else(|| not_initialized(&ctx, "copyFileSync"))?;
                vfs.borrow_mut().copy_file(&src, &dest).map_err(|e| vfs_error_to_js(&ctx, e))
            }),
        )?;
    }
    Ok(())
}

fn install_async<'js>(ctx: &Ctx<'js>, ns: &Object<'js>, promises: &Object<'js>, vfs: Option<SharedVfs>) -> Result<()> {
    macro_rules! async_method {
        ($name:literal, |$ictx:ident, $ivfs:ident, $args:ident| $body:block) => {{
            let vfs_cb = vfs.clone();
            ns.set(
                $name,
                Function::new(ctx.clone(), move |$ictx: Ctx<'js>, $args: Rest<Value<'js>>| -> Result<()> {
                    let cb_idx = $args.len().saturating_sub(1);
                    let cb: Function = $args
                        .get(cb_idx)
                        .cloned()
                        .and_then(|v| v.into_function())
                        .ok_or_else(|| Exception::throw_type(&$ictx, concat!("fs.", $name, " requires a callback")))?;
                    let $ivfs = vfs_cb.clone();
                    let result: Result<Value<'js>> = (|| $body)();
                    defer_callback(&$ictx, cb, result)
                }),
            )?;
            let vfs_p = vfs.clone();
            promises.set(
                $name,
                Function::new(ctx.clone(), move |$ictx: Ctx<'js>, $args: Rest<Value<'js>>| -> Result<rsquickjs::Promise<'js>> {
                    let $ivfs = vfs_p.clone();
                    let result: Result<Value<'js>> = (|| $body)();
                    promise_from_result(&$ictx, result)
                }),
            )?;
        }};
    }

    async_method!("readFile", |ctx, vfs, args| {
        let path: String = arg(&ctx, &args, 0)?;
        let vfs = vfs.ok_or_else(|| not_initialized(&ctx, "readFile"))?;
        let content = vfs.borrow_mut().read_file(&path).map_err(|e| vfs_error_to_js(&ctx, e))?;
        Buffer { bytes: content.as_bytes() }.into_js(&ctx)
    });

    async_method!("writeFile", |ctx, vfs, args| {
        let path: String = arg(&ctx, &args, 0)?;
        let data: String = arg(&ctx, &args, 1)?;
        let vfs = vfs.ok_or_else(|| not_initialized(&ctx, "writeFile"))?;
        vfs.borrow_mut().write_file(&path, Content::Text(data)).map_err(|e| vfs_error_to_js(&ctx, e))?;
        Ok(Value::new_undefined(ctx))
    });

    async_method!("mkdir", |ctx, vfs, args| {
        let path: String = arg(&ctx, &args, 0)?;
        let vfs = vfs.ok_or_else(|| not_initialized(&ctx, "mkdir"))?;
        vfs.borrow_mut().mkdir(&path, DirOptions { recursive: true }).map_err(|e| vfs_error_to_js(&ctx, e))?;
        Ok(Value::new_undefined(ctx))
    });

    async_method!("readdir", |ctx, vfs, args| {
        let path: String = arg(&ctx, &args, 0)?;
        let vfs = vfs.ok_or_else(|| not_initialized(&ctx, "readdir"))?;
        let names = vfs.borrow().readdir(&path).map_err(|e| vfs_error_to_js(&ctx, e))?;
        names.into_js(&ctx)
    });

    async_method!("stat", |ctx, vfs, args| {
        let path: String = arg(&ctx, &args, 0)?;
        let vfs = vfs.ok_or_else(|| not_initialized(&ctx, "stat"))?;
        let stats = vfs.borrow().stat(&path).map_err(|e| vfs_error_to_js(&ctx, e))?;
        Ok(stats_object(&ctx, stats)?.into_value())
    });

    async_method!("unlink", |ctx, vfs, args| {
        let path: String = arg(&ctx, &args, 0)?;
        let vfs = vfs.ok_or_else(|| not_initialized(&ctx, "unlink"))?;
        vfs.borrow_mut().unlink(&path).map_err(|e| vfs_error_to_js(&ctx, e))?;
        Ok(Value::new_undefined(ctx))
    });

    Ok(())
}
