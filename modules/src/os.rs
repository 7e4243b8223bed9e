//! `os` built-in (spec §4.3): static host metadata. A sandboxed renderer
//! never needs live OS access, so every value here is a fixed constant
//! rather than a syscall, matching the read-only `process.env` snapshot
//! approach in `xmas-sandbox` (spec §4.2).

use rsquickjs::prelude::Func;
use rsquickjs::{Ctx, Object, Result};

pub fn install<'js>(ctx: &Ctx<'js>) -> Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;

    ns.set("EOL", "\n")?;
    ns.set("platform", Func::from(|| "linux"))?;
    ns.set("arch", Func::from(|| "x64"))?;
    ns.set("type", Func::from(|| "Linux"))?;
    ns.set("release", Func::from(|| "0.0.0"))?;
    ns.set("tmpdir", Func::from(|| "/tmp"))?;
    ns.set("homedir", Func::from(|| "/home"))?;
    ns.set("hostname", Func::from(|| "sandbox"))?;
    ns.set("cpus", Func::from(|| -> Vec<String> { Vec::new() }))?;
    ns.set("totalmem", Func::from(|| 0u64))?;
    ns.set("freemem", Func::from(|| 0u64))?;
    ns.set("uptime", Func::from(|| 0u64))?;
    ns.set("endianness", Func::from(|| "LE"))?;

    Ok(ns)
}

#[cfg(test)]
mod tests {
    #[test]
    fn smoke() {
        // Install is a pure-data namespace; exercised end to end in
        // `xmas-loader`'s integration tests.
    }
}
