use anyhow::{Context as AnyhowContext, Result};
use rquickjs::{Context, Ctx, Error as JsError, Function, Runtime, Value};

/// JavaScript runtime backed by QuickJS.
///
/// Owns the QuickJS runtime and context, evaluates scripts and forwards
/// `console` output to tracing.
pub struct QuickJsEngine {
    runtime: Runtime,
    context: Context,
    max_pending_jobs: usize,
}

impl QuickJsEngine {
    pub fn new(max_pending_jobs: usize) -> Result<Self> {
        let runtime = Runtime::new().context("failed to create QuickJS runtime")?;
        let context = Context::full(&runtime).context("failed to create QuickJS context")?;
        let engine = Self {
            runtime,
            context,
            max_pending_jobs,
        };
        engine.init_console()?;
        Ok(engine)
    }

    /// Evaluate a script and discard the result.
    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.eval_with::<()>(source, filename)
    }

    /// Evaluate a script and convert the completion value into `V`.
    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        let script = Self::with_source_url(source, filename);
        let eval_result = self.context.with(|ctx| {
            ctx.eval::<V, _>(script.clone())
                .map_err(|err| describe_error(&ctx, err))
        });
        let value = eval_result?;

        self.drain_jobs()?;
        Ok(value)
    }

    /// Run queued promise jobs, up to the configured limit. Returns whether
    /// any job ran.
    pub fn drain_jobs(&self) -> Result<bool> {
        let mut job_count = 0;

        while self.runtime.is_job_pending() {
            match self.runtime.execute_pending_job() {
                Ok(true) => {
                    job_count += 1;
                    if job_count >= self.max_pending_jobs {
                        tracing::warn!(
                            target = "quickjs",
                            limit = self.max_pending_jobs,
                            "stopped processing pending jobs"
                        );
                        break;
                    }
                }
                Ok(false) => break,
                Err(job_exception) => {
                    tracing::error!(
                        target = "quickjs",
                        "Job execution error: {:?}",
                        job_exception
                    );
                    break;
                }
            }
        }

        if job_count > 0 {
            tracing::debug!(target = "quickjs", job_count, "executed pending jobs");
        }
        Ok(job_count > 0)
    }

    /// Run `f` inside the context. Script exceptions surface as errors
    /// carrying the thrown message.
    pub fn with_context<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> rquickjs::Result<T>,
    {
        self.context.with(|ctx| {
            let outcome = f(ctx.clone());
            outcome.map_err(|err| describe_error(&ctx, err))
        })
    }

    fn init_console(&self) -> Result<()> {
        self.context
            .with(|ctx| {
                let global = ctx.globals();
                let log_fn =
                    Function::new(ctx.clone(), log_from_js)?.with_name("__svgbridge_log")?;
                global.set("__svgbridge_log", log_fn)?;
                ctx.eval::<(), _>(CONSOLE_BOOTSTRAP.as_bytes())
            })
            .map_err(anyhow::Error::from)
    }

    fn with_source_url(source: &str, filename: &str) -> Vec<u8> {
        let mut script = String::with_capacity(source.len() + filename.len() + 32);
        script.push_str(source);
        if !source.ends_with('\n') {
            script.push('\n');
        }
        script.push_str("//# sourceURL=");
        script.push_str(filename);
        script.push('\n');
        script.into_bytes()
    }
}

fn describe_error(ctx: &Ctx<'_>, err: JsError) -> anyhow::Error {
    match err {
        JsError::Exception => {
            anyhow::anyhow!(capture_exception_message(ctx).unwrap_or_else(|| "QuickJS exception".to_string()))
        }
        other => anyhow::Error::from(other),
    }
}

fn log_from_js(level: String, message: String) -> rquickjs::Result<()> {
    match level.as_str() {
        "error" => tracing::error!(target = "quickjs", message = %message),
        "warn" => tracing::warn!(target = "quickjs", message = %message),
        "debug" => tracing::debug!(target = "quickjs", message = %message),
        _ => tracing::info!(target = "quickjs", message = %message),
    }
    Ok(())
}

fn capture_exception_message(ctx: &Ctx<'_>) -> Option<String> {
    let exception: Value = ctx.catch();

    if let Some(text) = exception.as_string() {
        return text.to_string().ok();
    }
    if let Some(obj) = exception.as_object() {
        if let Ok(message) = obj.get::<_, String>("message") {
            if let Ok(stack) = obj.get::<_, String>("stack") {
                return Some(format!("Error: {}\nStack: {}", message, stack));
            }
            return Some(format!("Error: {}", message));
        }
    }

    Some(format!("{:?}", exception))
}

const CONSOLE_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;
    const stringify = (value) => {
        try {
            if (typeof value === 'string') {
                return value;
            }
            if (value === undefined) {
                return 'undefined';
            }
            if (value === null) {
                return 'null';
            }
            return String(value);
        } catch (err) {
            return '[unprintable]';
        }
    };

    const logAt = (level) => (...args) => {
        try {
            global.__svgbridge_log(level, args.map(stringify).join(' '));
        } catch (err) {
            // console must never throw
        }
    };

    if (typeof global.console !== 'object' || global.console === null) {
        global.console = {};
    }
    global.console.log = logAt('info');
    global.console.info = logAt('info');
    global.console.warn = logAt('warn');
    global.console.error = logAt('error');
    global.console.debug = logAt('debug');
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_and_reports_exceptions() {
        let engine = QuickJsEngine::new(16).expect("engine");
        let sum: i32 = engine.eval_with("1 + 2", "sum.js").expect("eval");
        assert_eq!(sum, 3);

        let err = engine
            .eval("throw new Error('boom')", "throw.js")
            .expect_err("exception surfaces");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn promise_jobs_are_drained_after_eval() {
        let engine = QuickJsEngine::new(16).expect("engine");
        engine
            .eval(
                "globalThis.done = false; Promise.resolve().then(() => { globalThis.done = true; });",
                "jobs.js",
            )
            .expect("eval");
        let done: bool = engine.eval_with("globalThis.done", "check.js").expect("eval");
        assert!(done);
    }
}
