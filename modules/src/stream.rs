//! `stream`/`stream/promises` built-in (spec §4.3): `Readable`, `Writable`,
//! `Duplex`, `Transform`, `PassThrough`, plus `pipeline`/`finished`. Built as
//! plain JS on top of the native `events.EventEmitter` class the way Node's
//! own `stream` module is itself userland logic layered over `events`; the
//! invariants that matter here (listener ordering, once-safety) already live
//! in [`crate::events`].

use rsquickjs::{Ctx, Object, Result, Value};

const PRELUDE: &str = r#"
(function (EventEmitter) {
    class Readable extends EventEmitter {
        constructor(options) {
            super();
            options = options || {};
            this._read = options.read || (() => {});
            this._buffer = [];
            this._ended = false;
            this._flowing = false;
        }
        push(chunk) {
            if (chunk === null) {
                this._ended = true;
                this.emit("end");
                return false;
            }
            this._buffer.push(chunk);
            this.emit("data", chunk);
            return true;
        }
        read() {
            return this._buffer.shift();
        }
        pipe(dest) {
            this.on("data", (chunk) => dest.write(chunk));
            this.on("end", () => dest.end && dest.end());
            this.on("error", (err) => dest.emit && dest.emit("error", err));
            return dest;
        }
        [Symbol.asyncIterator]() {
            const self = this;
            const queue = [];
            const waiters = [];
            let done = false;
            self.on("data", (chunk) => {
                if (waiters.length) waiters.shift().resolve({ value: chunk, done: false });
                else queue.push(chunk);
            });
            self.on("end", () => {
                done = true;
                for (const w of waiters) w.resolve({ value: undefined, done: true });
            });
            return {
                next() {
                    if (queue.length) return Promise.resolve({ value: queue.shift(), done: false });
                    if (done) return Promise.resolve({ value: undefined, done: true });
                    return new Promise((resolve) => waiters.push({ resolve }));
                },
            };
        }
    }

    class Writable extends EventEmitter {
        constructor(options) {
            super();
            options = options || {};
            this._write = options.write || ((chunk, enc, cb) => cb && cb());
            this._ended = false;
        }
        write(chunk, encoding, callback) {
            if (typeof encoding === "function") { callback = encoding; encoding = undefined; }
            this._write(chunk, encoding, (err) => {
                if (err) this.emit("error", err);
                else this.emit("drain");
                if (callback) callback(err);
            });
            return true;
        }
        end(chunk, encoding, callback) {
            if (typeof chunk === "function") { callback = chunk; chunk = undefined; }
            const finish = () => {
                this._ended = true;
                this.emit("finish");
                if (callback) callback();
            };
            if (chunk !== undefined) this.write(chunk, encoding, finish);
            else finish();
        }
    }

    class Duplex extends Writable {
        constructor(options) {
            super(options);
            options = options || {};
            this._read = options.read || (() => {});
            this._buffer = [];
        }
        push(chunk) {
            if (chunk === null) { this.emit("end"); return false; }
            this._buffer.push(chunk);
            this.emit("data", chunk);
            return true;
        }
        read() { return this._buffer.shift(); }
    }
    Object.assign(Duplex.prototype, {
        pipe: Readable.prototype.pipe,
        [Symbol.asyncIterator]: Readable.prototype[Symbol.asyncIterator],
    });

    class Transform extends Duplex {
        constructor(options) {
            super(options);
            options = options || {};
            this._transform = options.transform || ((chunk, enc, cb) => cb(null, chunk));
        }
        write(chunk, encoding, callback) {
            if (typeof encoding === "function") { callback = encoding; encoding = undefined; }
            this._transform(chunk, encoding, (err, out) => {
                if (err) { this.emit("error", err); return; }
                if (out !== undefined) this.push(out);
                if (callback) callback();
            });
            return true;
        }
        end(chunk, encoding, callback) {
            const finish = () => { this.push(null); this.emit("finish"); if (callback) callback(); };
            if (chunk !== undefined) this.write(chunk, encoding, finish);
            else finish();
        }
    }

    class PassThrough extends Transform {
        constructor(options) {
            super(Object.assign({}, options, { transform: (chunk, enc, cb) => cb(null, chunk) }));
        }
    }

    function pipeline(...args) {
        const callback = typeof args[args.length - 1] === "function" ? args.pop() : null;
        let current = args[0];
        for (let i = 1; i < args.length; i++) {
            current = current.pipe(args[i]);
        }
        const last = args[args.length - 1];
        return new Promise((resolve, reject) => {
            last.on("finish", () => { if (callback) callback(); resolve(); });
            last.on("end", () => { if (callback) callback(); resolve(); });
            for (const s of args) {
                s.on("error", (err) => { if (callback) callback(err); reject(err); });
            }
        });
    }

    function finished(stream, callback) {
        const promise = new Promise((resolve, reject) => {
            stream.on("finish", resolve);
            stream.on("end", resolve);
            stream.on("error", reject);
        });
        if (callback) {
            promise.then(() => callback(), (err) => callback(err));
            return undefined;
        }
        return promise;
    }

    return { Readable, Writable, Duplex, Transform, PassThrough, pipeline, finished };
})
"#;

/// Build the `stream` namespace (or, with `promises_only`, just the
/// `pipeline`/`finished` promise facet used by `stream/promises`).
pub fn install<'js>(ctx: &Ctx<'js>, promises_only: bool) -> Result<Object<'js>> {
    let events = crate::events::install(ctx)?;
    let event_emitter: Value = events.get("EventEmitter")?;
    let factory: rsquickjs::Function = ctx.eval(PRELUDE)?;
    let built: Object = factory.call((event_emitter,))?;

    if promises_only {
        let promises = Object::new(ctx.clone())?;
        promises.set("pipeline", built.get::<_, Value>("pipeline")?)?;
        promises.set("finished", built.get::<_, Value>("finished")?)?;
        return Ok(promises);
    }

    let promises = Object::new(ctx.clone())?;
    promises.set("pipeline", built.get::<_, Value>("pipeline")?)?;
    promises.set("finished", built.get::<_, Value>("finished")?)?;
    built.set("promises", promises)?;
    Ok(built)
}

#[cfg(test)]
mod tests {
    #[test]
    fn smoke() {
        // `Readable`/`Writable`/etc. are plain JS classes evaluated against
        // a live context; exercised end to end in `xmas-loader`'s
        // integration tests.
    }
}
