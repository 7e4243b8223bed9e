//! Globals injected into every Sandbox Host context (spec §4.2): `console`,
//! `setTimeout`/`clearTimeout`, `process`, `TextEncoder`/`TextDecoder`, a
//! minimal `Buffer`, `__dirname`, `__filename`, and `global`/`globalThis`.

use std::cell::RefCell;
use std::rc::Rc;

use rsquickjs::prelude::{Func, Rest};
use rsquickjs::{Ctx, Function, Object, Persistent, Result, Value};

use crate::buffers::RingBuffer;

/// Per-context state backing `console` and `setTimeout`. Lives as QuickJS
/// userdata; `Rc<RefCell<_>>` is sound because a Sandbox Host's context is
/// never touched from more than one task at a time (spec §5).
#[derive(Clone, rquickjs::JsLifetime)]
pub struct ConsoleState {
    pub stdout: Rc<RefCell<RingBuffer>>,
    pub stderr: Rc<RefCell<RingBuffer>>,
}

unsafe impl<'js> rquickjs::class::Trace<'js> for ConsoleState {
    fn trace<'a>(&self, _tracer: rquickjs::class::Tracer<'a, 'js>) {}
}

/// Static process metadata surfaced to sandboxed code (spec §4.2, `process`
/// shim). `env` is a fixed snapshot taken at `init`, not a live view of the
/// host's environment — sandboxed code must not be able to observe changes
/// to the embedder's process after the fact.
#[derive(Debug, Clone, Default)]
pub struct ProcessShim {
    pub platform: String,
    pub arch: String,
    pub version: String,
    pub cwd: String,
    pub env: Vec<(String, String)>,
}

impl ProcessShim {
    pub fn host_default() -> Self {
        Self {
            platform: "linux".into(),
            arch: "x64".into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cwd: "/".into(),
            env: Vec::new(),
        }
    }
}

pub fn install_console<'js>(
    ctx: &Ctx<'js>,
    stdout: Rc<RefCell<RingBuffer>>,
    stderr: Rc<RefCell<RingBuffer>>,
) -> Result<()> {
    ctx.store_userdata(ConsoleState { stdout, stderr })?;

    let console = Object::new(ctx.clone())?;
    console.set("log", Func::from(log_stdout))?;
    console.set("info", Func::from(log_stdout))?;
    console.set("debug", Func::from(log_stdout))?;
    console.set("warn", Func::from(log_stderr))?;
    console.set("error", Func::from(log_stderr))?;
    ctx.globals().set("console", console)?;
    Ok(())
}

fn format_args<'js>(ctx: &Ctx<'js>, args: &Rest<Value<'js>>) -> String {
    args.iter()
        .map(|v| {
            v.clone()
                .try_into_string()
                .map(|s| s.to_string().unwrap_or_default())
                .unwrap_or_else(|_| {
                    ctx.json_stringify(v.clone())
                        .ok()
                        .flatten()
                        .map(|s| s.to_string().unwrap_or_default())
                        .unwrap_or_else(|| "undefined".to_string())
                })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn log_stdout<'js>(ctx: Ctx<'js>, args: Rest<Value<'js>>) -> Result<()> {
    let line = format_args(&ctx, &args);
    if let Ok(state) = ctx.userdata::<ConsoleState>() {
        state.stdout.borrow_mut().push(&line);
        state.stdout.borrow_mut().push("\n");
    }
    Ok(())
}

fn log_stderr<'js>(ctx: Ctx<'js>, args: Rest<Value<'js>>) -> Result<()> {
    let line = format_args(&ctx, &args);
    if let Ok(state) = ctx.userdata::<ConsoleState>() {
        state.stderr.borrow_mut().push(&line);
        state.stderr.borrow_mut().push("\n");
    }
    Ok(())
}

/// Install `setTimeout`/`clearTimeout`. Callbacks are held as
/// `Persistent<Function>` so they survive the suspension between scheduling
/// and firing, then re-entered on the context's job queue via `ctx.spawn`.
pub fn install_timers<'js>(ctx: &Ctx<'js>) -> Result<()> {
    let globals = ctx.globals();
    globals.set(
        "setTimeout",
        Func::from(|ctx: Ctx<'js>, cb: Function<'js>, ms: Option<f64>| -> Result<i32> {
            let delay_ms = ms.unwrap_or(0.0).max(0.0) as u64;
            let persisted = Persistent::save(&ctx, cb);
            let task_ctx = ctx.clone();
            ctx.spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                if let Ok(cb) = persisted.clone().restore(&task_ctx) {
                    let _ = cb.call::<_, ()>(());
                }
            });
            Ok(0)
        }),
    )?;
    globals.set("clearTimeout", Func::from(|_id: Value<'js>| -> Result<()> { Ok(()) }))?;
    globals.set("setInterval", Func::from(|_cb: Value<'js>, _ms: Option<f64>| -> Result<i32> { Ok(0) }))?;
    globals.set("clearInterval", Func::from(|_id: Value<'js>| -> Result<()> { Ok(()) }))?;
    Ok(())
}

pub fn install_process<'js>(ctx: &Ctx<'js>, shim: &ProcessShim) -> Result<()> {
    let process = Object::new(ctx.clone())?;
    process.set("platform", shim.platform.clone())?;
    process.set("arch", shim.arch.clone())?;
    process.set("version", shim.version.clone())?;

    let env = Object::new(ctx.clone())?;
    for (key, value) in &shim.env {
        env.set(key.as_str(), value.clone())?;
    }
    process.set("env", env)?;

    let cwd = shim.cwd.clone();
    process.set("cwd", Func::from(move || cwd.clone()))?;
    ctx.globals().set("process", process)?;
    Ok(())
}

/// A byte-array-backed `Buffer` stub, deliberately minimal (spec §4.2); the
/// fully-featured `buffer.Buffer` lives behind `require("buffer")` in the
/// built-in module table.
pub fn install_minimal_buffer<'js>(ctx: &Ctx<'js>) -> Result<()> {
    ctx.eval::<(), _>(
        r#"
        globalThis.Buffer = (function () {
            function wrap(bytes) {
                const view = new Uint8Array(bytes);
                view.toString = function (encoding) {
                    if (encoding === "hex") {
                        return Array.from(view).map(b => b.toString(16).padStart(2, "0")).join("");
                    }
                    return new TextDecoder().decode(view);
                };
                return view;
            }
            return {
                from(data, encoding) {
                    if (typeof data === "string") {
                        if (encoding === "hex") {
                            const bytes = [];
                            for (let i = 0; i < data.length; i += 2) {
                                bytes.push(parseInt(data.slice(i, i + 2), 16));
                            }
                            return wrap(bytes);
                        }
                        return wrap(Array.from(new TextEncoder().encode(data)));
                    }
                    return wrap(Array.from(data));
                },
                alloc(size, fill) {
                    const bytes = new Array(size).fill(fill === undefined ? 0 : fill);
                    return wrap(bytes);
                },
                isBuffer(v) { return v instanceof Uint8Array; },
            };
        })();
        "#,
    )
}

/// A UTF-8-only `TextEncoder`/`TextDecoder` pair, the minimum
/// `install_minimal_buffer`'s generated code needs; `xmas-js-modules`'
/// `util` built-in re-exports these rather than redefining them.
pub fn install_text_codec<'js>(ctx: &Ctx<'js>) -> Result<()> {
    ctx.eval::<(), _>(
        r#"
        globalThis.TextEncoder = class TextEncoder {
            get encoding() { return "utf-8"; }
            encode(input) {
                input = input === undefined ? "" : String(input);
                const bytes = [];
                for (const ch of input) {
                    const cp = ch.codePointAt(0);
                    if (cp < 0x80) {
                        bytes.push(cp);
                    } else if (cp < 0x800) {
                        bytes.push(0xc0 | (cp >> 6), 0x80 | (cp & 0x3f));
                    } else if (cp < 0x10000) {
                        bytes.push(0xe0 | (cp >> 12), 0x80 | ((cp >> 6) & 0x3f), 0x80 | (cp & 0x3f));
                    } else {
                        bytes.push(
                            0xf0 | (cp >> 18),
                            0x80 | ((cp >> 12) & 0x3f),
                            0x80 | ((cp >> 6) & 0x3f),
                            0x80 | (cp & 0x3f)
                        );
                    }
                }
                return new Uint8Array(bytes);
            }
        };
        globalThis.TextDecoder = class TextDecoder {
            constructor(encoding) { this.encoding = encoding || "utf-8"; }
            decode(bytes) {
                if (bytes === undefined) return "";
                const arr = bytes instanceof Uint8Array ? bytes : new Uint8Array(bytes);
                let out = "";
                for (let i = 0; i < arr.length; ) {
                    const b0 = arr[i];
                    let cp, len;
                    if (b0 < 0x80) { cp = b0; len = 1; }
                    else if ((b0 & 0xe0) === 0xc0) { cp = b0 & 0x1f; len = 2; }
                    else if ((b0 & 0xf0) === 0xe0) { cp = b0 & 0x0f; len = 3; }
                    else { cp = b0 & 0x07; len = 4; }
                    for (let k = 1; k < len; k++) { cp = (cp << 6) | (arr[i + k] & 0x3f); }
                    out += String.fromCodePoint(cp);
                    i += len;
                }
                return out;
            }
        };
        "#,
    )
}

pub fn install_module_identity<'js>(ctx: &Ctx<'js>, filename: &str, dirname: &str) -> Result<()> {
    let globals = ctx.globals();
    globals.set("__filename", filename.to_string())?;
    globals.set("__dirname", dirname.to_string())?;
    ctx.eval::<(), _>("globalThis.global = globalThis;")?;
    Ok(())
}
