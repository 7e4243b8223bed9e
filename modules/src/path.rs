//! `path` built-in (spec §4.3): POSIX-only operations over [`xmas_vfs::path`].
//! `sep`/`delimiter` are exposed as plain string properties rather than
//! functions, matching Node's own `path` module shape.

use rsquickjs::prelude::{Func, Opt};
use rsquickjs::{Ctx, Object, Result};
use xmas_vfs::path;

/// Build the `path` namespace object.
pub fn install<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;

    ns.set("sep", "/")?;
    ns.set("delimiter", ":")?;

    ns.set("normalize", Func::from(|p: String| path::normalize(&p)))?;
    ns.set(
        "join",
        Func::from(|parts: rsquickjs::prelude::Rest<String>| {
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            path::join(&refs)
        }),
    )?;
    ns.set(
        "resolve",
        Func::from(|base: String, target: Opt<String>| match target.0 {
            Some(t) => path::resolve(&base, &t),
            None => path::resolve("/", &base),
        }),
    )?;
    ns.set("isAbsolute", Func::from(|p: String| path::is_absolute(&p)))?;
    ns.set("relative", Func::from(|from: String, to: String| path::relative(&from, &to)))?;
    ns.set("dirname", Func::from(|p: String| path::dirname(&p)))?;
    ns.set(
        "basename",
        Func::from(|p: String, ext: Opt<String>| path::basename(&p, ext.0.as_deref())),
    )?;
    ns.set("extname", Func::from(|p: String| path::extname(&p)))?;

    ns.set(
        "parse",
        Func::from(|ctx: Ctx<'js>, p: String| -> Result<Object<'js>> {
            let parsed = path::parse(&p);
            let obj = Object::new(ctx)?;
            obj.set("root", parsed.root)?;
            obj.set("dir", parsed.dir)?;
            obj.set("base", parsed.base)?;
            obj.set("ext", parsed.ext)?;
            obj.set("name", parsed.name)?;
            Ok(obj)
        }),
    )?;
    ns.set(
        "format",
        Func::from(|obj: Object<'js>| -> Result<String> {
            let parsed = path::ParsedPath {
                root: obj.get("root").unwrap_or_default(),
                dir: obj.get("dir").unwrap_or_default(),
                base: obj.get("base").unwrap_or_default(),
                ext: obj.get("ext").unwrap_or_default(),
                name: obj.get("name").unwrap_or_default(),
            };
            Ok(path::format(&parsed))
        }),
    )?;

    Ok(ns)
}
