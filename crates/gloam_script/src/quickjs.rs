// quickjs.rs - QuickJS implementation of ScriptEngine
//
// Host functions only exchange strings, bools and numbers with JS. Richer
// values cross as JSON text and are parsed by the prelude.

use crate::bridge::HostBridge;
use crate::engine::{LifecyclePhase, ScriptEngine, ScriptInstance};
use crate::error::ScriptError;
use crate::runtime::{describe_error, ScriptRuntime};
use rquickjs::{Ctx, Function, Value};
use std::rc::Rc;

#[derive(Debug, Default, Clone, Copy)]
pub struct QuickJsEngine;

impl ScriptEngine for QuickJsEngine {
    fn name(&self) -> &'static str {
        "quickjs"
    }

    fn compile(
        &self,
        path: &str,
        source: &str,
        host: Rc<HostBridge>,
    ) -> Result<Box<dyn ScriptInstance>, ScriptError> {
        let compile_error = |message: String| ScriptError::Compile {
            path: path.to_string(),
            message,
        };

        let runtime = ScriptRuntime::new().map_err(compile_error)?;
        let prelude = host.prelude();
        runtime
            .with(|ctx| install_host_functions(&ctx, host).map_err(|err| describe_error(&ctx, err)))
            .map_err(compile_error)?;
        runtime.execute(&prelude).map_err(compile_error)?;
        runtime.execute(source).map_err(compile_error)?;

        tracing::debug!(path, "script compiled");
        Ok(Box::new(QuickJsInstance { runtime }))
    }
}

fn install_host_functions(ctx: &Ctx<'_>, host: Rc<HostBridge>) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let h = host.clone();
    globals.set(
        "__host_action",
        Function::new(ctx.clone(), move |name: String, arg: String| -> String {
            h.action(&name, &arg).err().unwrap_or_default()
        })?,
    )?;
    let h = host.clone();
    globals.set(
        "__host_check",
        Function::new(ctx.clone(), move |name: String| h.check(&name))?,
    )?;
    let h = host.clone();
    globals.set(
        "__host_transition",
        Function::new(ctx.clone(), move |target: String| h.transition(&target))?,
    )?;
    let h = host.clone();
    globals.set(
        "__host_emit",
        Function::new(ctx.clone(), move |event: String| h.emit(&event))?,
    )?;
    let h = host.clone();
    globals.set(
        "__host_event",
        Function::new(ctx.clone(), move |name: String| h.has_event(&name))?,
    )?;
    let h = host.clone();
    globals.set(
        "__host_consume_event",
        Function::new(ctx.clone(), move |name: String| h.consume_event(&name))?,
    )?;
    let h = host.clone();
    globals.set(
        "__host_position",
        Function::new(ctx.clone(), move || h.position_json())?,
    )?;
    let h = host.clone();
    globals.set(
        "__host_player_position",
        Function::new(ctx.clone(), move || h.player_position_json())?,
    )?;
    let h = host.clone();
    globals.set(
        "__host_state",
        Function::new(ctx.clone(), move || h.current_state())?,
    )?;
    globals.set(
        "__host_log",
        Function::new(ctx.clone(), move |message: String| host.log(&message))?,
    )?;
    Ok(())
}

struct QuickJsInstance {
    runtime: ScriptRuntime,
}

impl ScriptInstance for QuickJsInstance {
    fn run_phase(&self, phase: LifecyclePhase<'_>) -> Result<(), ScriptError> {
        self.runtime
            .with(|ctx| {
                let func: Option<Function> = ctx
                    .globals()
                    .get(phase.function_name())
                    .map_err(|err| describe_error(&ctx, err))?;
                let Some(func) = func else {
                    return Ok(());
                };
                let result = match phase {
                    LifecyclePhase::Enter(state) | LifecyclePhase::Exit(state) => {
                        func.call::<_, Value>((state.to_string(),))
                    }
                    LifecyclePhase::Update(state, dt) => {
                        func.call::<_, Value>((state.to_string(), f64::from(dt)))
                    }
                };
                result.map(drop).map_err(|err| describe_error(&ctx, err))
            })
            .map_err(|message| ScriptError::runtime(phase.function_name(), message))
    }

    fn get_global(&self, name: &str) -> Result<Option<String>, ScriptError> {
        self.runtime
            .with(|ctx| {
                ctx.globals()
                    .get::<_, Option<String>>(name)
                    .map_err(|err| describe_error(&ctx, err))
            })
            .map_err(|message| ScriptError::runtime(name, message))
    }
}
