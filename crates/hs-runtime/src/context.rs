use std::rc::Rc;

use hs_compiler::{
    span_from_position, CompiledUnit, BINDING_ARGS, BINDING_DIRNAME, BINDING_EXPORTS,
    BINDING_FILENAME, BINDING_MODULE, DEFAULT_EXPORT,
};
use hs_core::HostScriptError;
use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, Map, Scope};

use crate::module::ScriptModule;

pub(crate) fn map_eval_error(unit: &CompiledUnit, error: Box<EvalAltResult>) -> HostScriptError {
    let message = format!("{}: {}", unit.filename().display(), error);
    match span_from_position(error.position()) {
        Some(span) => HostScriptError::with_span("RUN_EVAL_ERROR", message, span),
        None => HostScriptError::new("RUN_EVAL_ERROR", message),
    }
}

/// Result of one execution: the exports as the script left them and the
/// default export's return value (unit when there was nothing to call).
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub exports: Map,
    pub value: Dynamic,
}

/// Disposable scope for exactly one execution of a compiled unit.
///
/// Every execution gets a fresh engine and a fresh binding table; only the
/// `exports` map handed in survives, and only through the returned outcome.
pub struct ExecutionContext {
    module: ScriptModule,
    unit: Rc<CompiledUnit>,
    exports: Map,
    args: Array,
}

impl ExecutionContext {
    pub fn new(module: &ScriptModule, unit: Rc<CompiledUnit>, exports: Map, args: Array) -> Self {
        Self {
            module: module.clone(),
            unit,
            exports,
            args,
        }
    }

    pub fn args(&self) -> &Array {
        &self.args
    }

    pub fn filename(&self) -> String {
        self.unit.filename().display().to_string()
    }

    pub fn dirname(&self) -> String {
        self.unit.dirname().display().to_string()
    }

    fn bindings(&self) -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push(BINDING_EXPORTS, self.exports.clone());
        scope.push(BINDING_MODULE, self.module.clone());
        scope.push(BINDING_FILENAME, self.filename());
        scope.push(BINDING_DIRNAME, self.dirname());
        scope.push(BINDING_ARGS, self.args.clone());
        scope
    }

    fn run_body(&self, engine: &Engine, scope: &mut Scope<'static>) -> Result<(), HostScriptError> {
        engine
            .run_ast_with_scope(scope, self.unit.ast())
            .map_err(|error| map_eval_error(&self.unit, error))
    }

    fn exports_of(scope: &Scope<'static>) -> Map {
        scope
            .get_value::<Map>(BINDING_EXPORTS)
            .unwrap_or_default()
    }

    /// Runs the body only and returns the resulting exports.
    pub fn evaluate(self) -> Result<Map, HostScriptError> {
        let engine = self.module.build_engine(&self.unit);
        let mut scope = self.bindings();
        self.run_body(&engine, &mut scope)?;
        Ok(Self::exports_of(&scope))
    }

    /// Runs the body, then calls `exports["default"]` with the arguments if it is a function.
    pub fn execute(self) -> Result<ExecutionOutcome, HostScriptError> {
        let engine = self.module.build_engine(&self.unit);
        let mut scope = self.bindings();
        self.run_body(&engine, &mut scope)?;

        let default_export = Self::exports_of(&scope)
            .get(DEFAULT_EXPORT)
            .and_then(|value| value.clone().flatten().try_cast::<FnPtr>());

        let value = match default_export {
            Some(callback) => callback
                .call::<Dynamic>(&engine, self.unit.ast(), self.args.clone())
                .map_err(|error| map_eval_error(&self.unit, error))?,
            None => Dynamic::UNIT,
        };

        Ok(ExecutionOutcome {
            exports: Self::exports_of(&scope),
            value,
        })
    }
}
