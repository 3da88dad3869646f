//! QuickJS runtime management
//!
//! One `ScriptRuntime` per loaded script: an isolated QuickJS runtime and
//! its full context. Errors come back as plain messages so callers can
//! wrap them in the phase they were running.

use rquickjs::{Context, Ctx, Runtime};

/// Heap ceiling per script runtime.
const MEMORY_LIMIT: usize = 32 * 1024 * 1024;

/// Script execution context
pub struct ScriptRuntime {
    #[allow(dead_code)] // Kept alive for context lifetime
    runtime: Runtime,
    context: Context,
}

impl ScriptRuntime {
    pub fn new() -> Result<Self, String> {
        let runtime = Runtime::new().map_err(|err| err.to_string())?;
        runtime.set_memory_limit(MEMORY_LIMIT);
        let context = Context::full(&runtime).map_err(|err| err.to_string())?;
        Ok(Self { runtime, context })
    }

    /// Evaluate `source` at global scope.
    pub fn execute(&self, source: &str) -> Result<(), String> {
        self.context.with(|ctx| {
            ctx.eval::<rquickjs::Value, _>(source)
                .map(drop)
                .map_err(|err| describe_error(&ctx, err))
        })
    }

    /// Run `f` inside the context.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: for<'js> FnOnce(Ctx<'js>) -> R,
    {
        self.context.with(f)
    }
}

/// Human-readable message for an interpreter error, pulling the pending
/// exception out of the context when there is one.
pub fn describe_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    if !matches!(err, rquickjs::Error::Exception) {
        return err.to_string();
    }
    let caught = ctx.catch();
    if let Some(exception) = caught.as_exception() {
        let message = exception.message().unwrap_or_else(|| "exception".to_string());
        return match exception.stack() {
            Some(stack) if !stack.is_empty() => format!("{message}\n{stack}"),
            _ => message,
        };
    }
    if let Some(text) = caught.as_string().and_then(|s| s.to_string().ok()) {
        return text;
    }
    "uncaught exception".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_reports_thrown_messages() {
        let runtime = ScriptRuntime::new().unwrap();
        assert!(runtime.execute("var answer = 42;").is_ok());
        let err = runtime.execute("throw new Error('boom');").unwrap_err();
        assert!(err.starts_with("boom"), "{err}");
    }

    #[test]
    fn syntax_errors_are_described() {
        let runtime = ScriptRuntime::new().unwrap();
        assert!(runtime.execute("function (").is_err());
    }
}
