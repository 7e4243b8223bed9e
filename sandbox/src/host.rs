//! The Sandbox Host (spec §4.2): one QuickJS runtime, one evaluation
//! context, resource limits, and the buffers/queues that back the injected
//! globals.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rsquickjs::{context::EvalOptions, AsyncContext, AsyncRuntime, CatchResultExt, Promise};
use tokio::sync::{Mutex, OnceCell};

use crate::buffers::{NextTickQueue, RingBuffer};
use crate::error::{SandboxError, SandboxResult};
use crate::globals::{self, ProcessShim};

const DEFAULT_MEMORY_LIMIT_BYTES: usize = 128 * 1024 * 1024;
const DEFAULT_STACK_LIMIT_BYTES: usize = 1024 * 1024;
const DEFAULT_INTERRUPT_AFTER_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub memory_limit_bytes: usize,
    pub stack_limit_bytes: usize,
    pub interrupt_after_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
            stack_limit_bytes: DEFAULT_STACK_LIMIT_BYTES,
            interrupt_after_ms: DEFAULT_INTERRUPT_AFTER_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub success: bool,
    pub value: Option<String>,
    pub error: Option<String>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
}

/// Shared with the interrupt handler closure: records when the in-flight
/// `eval` started, in milliseconds since an arbitrary epoch fixed at host
/// construction. `None` means no eval is outstanding.
struct EvalClock {
    started_at_ms: AtomicI64,
    epoch: Instant,
}

impl EvalClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started_at_ms: AtomicI64::new(-1),
            epoch: Instant::now(),
        })
    }

    fn mark_start(&self) {
        self.started_at_ms
            .store(self.epoch.elapsed().as_millis() as i64, Ordering::SeqCst);
    }

    fn mark_clear(&self) {
        self.started_at_ms.store(-1, Ordering::SeqCst);
    }

    fn elapsed_since_start_ms(&self) -> Option<i64> {
        let started = self.started_at_ms.load(Ordering::SeqCst);
        if started < 0 {
            return None;
        }
        Some(self.epoch.elapsed().as_millis() as i64 - started)
    }
}

struct Initialized {
    runtime: AsyncRuntime,
    context: AsyncContext,
    stdout: Rc<RefCell<RingBuffer>>,
    stderr: Rc<RefCell<RingBuffer>>,
}

/// Owns one interpreter runtime and context (spec §4.2). `init` is
/// idempotent and safe to race; `eval`/`eval_module` serialize on
/// `eval_lock` so at most one evaluation is ever in flight.
pub struct SandboxHost {
    config: SandboxConfig,
    process: ProcessShim,
    state: OnceCell<Initialized>,
    eval_lock: Mutex<()>,
    clock: Arc<EvalClock>,
    next_ticks: Mutex<NextTickQueue>,
}

impl SandboxHost {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            process: ProcessShim::host_default(),
            state: OnceCell::new(),
            eval_lock: Mutex::new(()),
            clock: EvalClock::new(),
            next_ticks: Mutex::new(NextTickQueue::default()),
        }
    }

    pub fn with_process_shim(mut self, process: ProcessShim) -> Self {
        self.process = process;
        self
    }

    /// Idempotent; concurrent callers share one initialization (spec §4.2).
    pub async fn init(&self) -> SandboxResult<()> {
        self.state
            .get_or_try_init(|| async {
                let runtime = AsyncRuntime::new()?;
                runtime.set_memory_limit(self.config.memory_limit_bytes).await;
                runtime.set_max_stack_size(self.config.stack_limit_bytes).await;

                let clock = self.clock.clone();
                let interrupt_after_ms = self.config.interrupt_after_ms as i64;
                runtime
                    .set_interrupt_handler(Some(Box::new(move || {
                        match clock.elapsed_since_start_ms() {
                            Some(elapsed) if elapsed > interrupt_after_ms => true,
                            _ => false,
                        }
                    })))
                    .await;

                let context = AsyncContext::full(&runtime).await?;
                let stdout = Rc::new(RefCell::new(RingBuffer::default()));
                let stderr = Rc::new(RefCell::new(RingBuffer::default()));

                let process = self.process.clone();
                let install_stdout = stdout.clone();
                let install_stderr = stderr.clone();
                rsquickjs::async_with!(context => |ctx| {
                    globals::install_console(&ctx, install_stdout, install_stderr)?;
                    globals::install_timers(&ctx)?;
                    globals::install_process(&ctx, &process)?;
                    globals::install_text_codec(&ctx)?;
                    globals::install_minimal_buffer(&ctx)?;
                    globals::install_module_identity(&ctx, "/sandbox.js", "/")?;
                    Ok::<_, rsquickjs::Error>(())
                })
                .await?;

                Ok::<_, SandboxError>(Initialized {
                    runtime,
                    context,
                    stdout,
                    stderr,
                })
            })
            .await?;
        Ok(())
    }

    fn initialized(&self) -> SandboxResult<&Initialized> {
        self.state.get().ok_or(SandboxError::NotInitialized)
    }

    /// `eval(code, filename)` (spec §4.2). Single outstanding eval per host.
    pub async fn eval(&self, code: &str, filename: &str) -> SandboxResult<EvalOutcome> {
        self.eval_with(code, filename).await
    }

    /// `eval_module(code, filename)`: wraps `code` as a CommonJS enclosure
    /// providing `exports, require, module, __filename, __dirname` before
    /// evaluating. The `require` implementation itself is wired in by the
    /// loader crate via [`SandboxHost::with_context`]; here the wrapper just
    /// shapes the function signature so a loader-supplied `require` can be
    /// bound positionally.
    pub async fn eval_module(&self, code: &str, filename: &str) -> SandboxResult<EvalOutcome> {
        let wrapped = format!(
            "(function(exports, require, module, __filename, __dirname) {{\n{code}\n}})"
        );
        self.eval_with(&wrapped, filename).await
    }

    async fn eval_with(&self, code: &str, filename: &str) -> SandboxResult<EvalOutcome> {
        let _guard = self.eval_lock.lock().await;
        let state = self.initialized()?;

        state.stdout.borrow_mut().clear();
        state.stderr.borrow_mut().clear();
        self.clock.mark_start();

        let started = Instant::now();
        let filename_owned = filename.to_string();
        let code_owned = code.to_string();
        let eval_result: Result<Result<Option<String>, String>, rsquickjs::Error> =
            rsquickjs::async_with!(state.context => |ctx| {
                let options = EvalOptions {
                    promise: true,
                    filename: Some(filename_owned.clone()),
                    ..Default::default()
                };
                match ctx.eval_with_options::<rsquickjs::Value, _>(code_owned.clone(), options) {
                    Ok(value) => {
                        if let Ok(promise) = value.clone().into_promise() {
                            let promise: Promise<'_> = promise;
                            match promise.into_future::<rsquickjs::Value>().await.catch(&ctx) {
                                Ok(resolved) => Ok(Ok(stringify(&ctx, resolved))),
                                Err(err) => Ok(Err(err.to_string())),
                            }
                        } else {
                            Ok(Ok(stringify(&ctx, value)))
                        }
                    }
                    Err(_) => {
                        let caught = ctx.catch();
                        let message = caught
                            .into_exception()
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "unknown evaluation error".to_string());
                        Ok(Err(message))
                    }
                }
            })
            .await;

        self.clock.mark_clear();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let stdout = state.stdout.borrow_mut().take();
        let stderr = state.stderr.borrow_mut().take();

        let timed_out = elapsed_ms >= self.config.interrupt_after_ms;

        let outcome = match eval_result {
            Ok(Ok(value)) => EvalOutcome {
                success: true,
                value,
                error: None,
                stdout,
                stderr,
                elapsed_ms,
            },
            Ok(Err(message)) => EvalOutcome {
                success: false,
                value: None,
                error: Some(if timed_out {
                    format!("Timeout: {message}")
                } else {
                    message
                }),
                stdout,
                stderr,
                elapsed_ms,
            },
            Err(engine_err) => EvalOutcome {
                success: false,
                value: None,
                error: Some(engine_err.to_string()),
                stdout,
                stderr,
                elapsed_ms,
            },
        };
        Ok(outcome)
    }

    /// Run a closure with direct access to the evaluation context. Used by
    /// the loader crate to compile and link module source without the
    /// Sandbox Host needing to know about module resolution.
    pub async fn with_context<F, R>(&self, f: F) -> SandboxResult<R>
    where
        F: for<'js> FnOnce(rsquickjs::Ctx<'js>) -> R,
    {
        let state = self.initialized()?;
        let result = rsquickjs::async_with!(state.context => |ctx| {
            f(ctx)
        })
        .await;
        Ok(result)
    }

    /// Drain the interpreter's microtask queue until idle or an error
    /// occurs (spec §4.2). Returns the number of jobs executed.
    pub async fn execute_pending_jobs(&self) -> SandboxResult<u32> {
        let state = self.initialized()?;
        let mut count = 0u32;
        loop {
            match state.runtime.execute_pending_job().await {
                Ok(true) => count += 1,
                Ok(false) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "pending job failed");
                    break;
                }
            }
        }
        Ok(count)
    }

    pub async fn next_tick_queue_len(&self) -> usize {
        self.next_ticks.lock().await.len()
    }

    /// Disposes context then runtime. Safe to call multiple times; a host
    /// that was never initialized is a no-op.
    pub async fn destroy(&self) {
        // `OnceCell` has no take(); the runtime/context are dropped with the
        // host itself. A fresh host must be constructed to re-initialize,
        // matching the "create/destroy" lifecycle of the Sandbox Context.
        if let Some(state) = self.state.get() {
            state.stdout.borrow_mut().clear();
            state.stderr.borrow_mut().clear();
            drop(state.context.clone());
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized()
    }
}

fn stringify<'js>(ctx: &rsquickjs::Ctx<'js>, value: rsquickjs::Value<'js>) -> Option<String> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    if let Some(s) = value.as_string() {
        return s.to_string().ok();
    }
    ctx.json_stringify(value)
        .ok()
        .flatten()
        .and_then(|s| s.to_string().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_is_idempotent_and_eval_runs() {
        let host = SandboxHost::new(SandboxConfig::default());
        host.init().await.unwrap();
        host.init().await.unwrap();

        let outcome = host.eval("JSON.stringify({a: 1})", "/entry.js").await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.value.as_deref(), Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn eval_without_init_fails() {
        let host = SandboxHost::new(SandboxConfig::default());
        let err = host.eval("1", "/entry.js").await.unwrap_err();
        assert!(matches!(err, SandboxError::NotInitialized));
    }

    #[tokio::test]
    async fn eval_captures_console_output() {
        let host = SandboxHost::new(SandboxConfig::default());
        host.init().await.unwrap();
        let outcome = host
            .eval("console.log('hello'); 1", "/entry.js")
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn eval_surfaces_thrown_errors() {
        let host = SandboxHost::new(SandboxConfig::default());
        host.init().await.unwrap();
        let outcome = host
            .eval("throw new Error('boom')", "/entry.js")
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("boom"));
    }
}
