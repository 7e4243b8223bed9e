//! `util` built-in (spec §4.3): `format`/`inspect`, `deprecate`,
//! `promisify`/`callbackify`, the `is*` type predicates, and a
//! `TextEncoder`/`TextDecoder` passthrough.

use rsquickjs::prelude::{Func, Opt, Rest};
use rsquickjs::{Ctx, Exception, Function, Object, Result, Value};

/// `util.format(fmt, ...args)`: substitutes `%s %d %i %f %j %o %O %%` in
/// order, appending any remaining arguments space-separated, matching
/// Node's `format` for the subset of specifiers SSR output realistically
/// uses.
fn format_value<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    if let Some(s) = value.as_string() {
        return s.to_string().unwrap_or_default();
    }
    ctx.json_stringify(value.clone())
        .ok()
        .flatten()
        .and_then(|s| s.to_string().ok())
        .unwrap_or_else(|| "undefined".to_string())
}

fn util_format<'js>(ctx: Ctx<'js>, args: Rest<Value<'js>>) -> Result<String> {
    let mut args = args.0.into_iter();
    let Some(first) = args.next() else {
        return Ok(String::new());
    };
    let Some(fmt) = first.as_string().and_then(|s| s.to_string().ok()) else {
        let mut parts = vec![format_value(&ctx, &first)];
        parts.extend(args.map(|v| format_value(&ctx, &v)));
        return Ok(parts.join(" "));
    };

    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') | Some('d') | Some('i') | Some('f') | Some('j') | Some('o') | Some('O') => {
                chars.next();
                match args.next() {
                    Some(v) => out.push_str(&format_value(&ctx, &v)),
                    None => {
                        out.push('%');
                        out.push(chars.clone().next().unwrap_or('s'));
                    }
                }
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    for rest in args {
        out.push(' ');
        out.push_str(&format_value(&ctx, &rest));
    }
    Ok(out)
}

pub fn install<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;

    ns.set("format", Func::from(util_format))?;
    ns.set("inspect", Func::from(util_format))?;

    ns.set(
        "deprecate",
        Func::from(|ctx: Ctx<'js>, f: Function<'js>, message: String| -> Result<Function<'js>> {
            let warned = std::cell::Cell::new(false);
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> Result<Value<'js>> {
                if !warned.get() {
                    warned.set(true);
                    tracing::warn!(%message, "deprecated function called");
                }
                f.call::<_, Value>(args).map_err(|_| Exception::throw_message(&ctx, "deprecated call failed"))
            })
        }),
    )?;

    ns.set(
        "promisify",
        Func::from(|ctx: Ctx<'js>, f: Function<'js>| -> Result<Function<'js>> {
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> Result<rsquickjs::Promise<'js>> {
                let (promise, resolve, reject) = ctx.promise()?;
                let mut call_args = args.0;
                let resolver = resolve.clone();
                let rejecter = reject.clone();
                let callback = Function::new(ctx.clone(), move |args: Rest<Value<'js>>| -> Result<()> {
                    let mut args = args.0.into_iter();
                    let err = args.next();
                    let value = args.next();
                    match err {
                        Some(e) if !e.is_null() && !e.is_undefined() => rejecter.call::<_, ()>((e,)),
                        _ => resolver.call::<_, ()>((value,)),
                    }
                })?;
                call_args.push(callback.into_value());
                f.call::<_, ()>(rsquickjs::prelude::Rest(call_args))?;
                Ok(promise)
            })
        }),
    )?;

    ctx.eval::<(), _>(
        r#"
        globalThis.__xmas_util_callbackify = function (f) {
            return function (...args) {
                const cb = args.pop();
                Promise.resolve()
                    .then(() => f.apply(this, args))
                    .then((value) => cb(null, value), (err) => cb(err));
            };
        };
        "#,
    )?;
    let callbackify: Value = ctx.globals().get("__xmas_util_callbackify")?;
    ns.set("callbackify", callbackify)?;

    ns.set("isArray", Func::from(|v: Value<'js>| v.is_array()))?;
    ns.set("isString", Func::from(|v: Value<'js>| v.is_string()))?;
    ns.set("isNumber", Func::from(|v: Value<'js>| v.is_number()))?;
    ns.set("isBoolean", Func::from(|v: Value<'js>| v.is_bool()))?;
    ns.set("isNull", Func::from(|v: Value<'js>| v.is_null()))?;
    ns.set("isUndefined", Func::from(|v: Value<'js>| v.is_undefined()))?;
    ns.set(
        "isNullOrUndefined",
        Func::from(|v: Value<'js>| v.is_null() || v.is_undefined()),
    )?;
    ns.set("isObject", Func::from(|v: Value<'js>| v.is_object()))?;
    ns.set("isFunction", Func::from(|v: Value<'js>| v.is_function()))?;
    ns.set("isSymbol", Func::from(|v: Value<'js>| v.is_symbol()))?;
    ns.set(
        "isDate",
        Func::from(|ctx: Ctx<'js>, v: Value<'js>| -> Result<bool> {
            match v.into_object() {
                Some(obj) => {
                    let ctor: Result<Function> = obj.get("constructor");
                    Ok(ctor
                        .ok()
                        .and_then(|c| c.get::<_, String>("name").ok())
                        .map(|n| n == "Date")
                        .unwrap_or(false))
                }
                None => {
                    let _ = ctx;
                    Ok(false)
                }
            }
        }),
    )?;
    ns.set(
        "isError",
        Func::from(|v: Value<'js>| v.as_exception().is_some()),
    )?;

    ns.set("TextEncoder", {
        let g: Value = ctx.globals().get("TextEncoder")?;
        g
    })?;
    ns.set("TextDecoder", {
        let g: Value = ctx.globals().get("TextDecoder")?;
        g
    })?;

    Ok(ns)
}

#[cfg(test)]
mod tests {
    #[test]
    fn smoke() {
        // `util_format` is covered via end-to-end loader tests; formatting
        // needs a live `Ctx` to convert `Value`s.
    }
}
