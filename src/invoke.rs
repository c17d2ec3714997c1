//! Function resolution, argument binding and invocation for a single step.
//!
//! Arguments are bound in three phases, and a later phase never overrides an
//! earlier one:
//!
//! 1. injected capabilities (`console`, `run_tk_dialog`, `recipe_context`)
//! 2. values prompted from the user (`prompt_for`)
//! 3. literal values from the step (`statement` and extra fields)
//!
//! Only parameters the function declares are ever bound.

use crate::console::{Console, DialogHelper, Tone};
use crate::context::ExecutionContext;
use crate::fault::FunctionFault;
use crate::recipe::Step;
use crate::registry::RecipeModule;
use indexmap::IndexMap;
use serde_json::Value;
use std::io;
use thiserror::Error;
use tracing::debug;

/// Parameter name receiving the console
pub const CONSOLE_PARAM: &str = "console";

/// Parameter name receiving the dialog helper
pub const DIALOG_PARAM: &str = "run_tk_dialog";

/// Parameter name receiving the shared execution context
pub const RECIPE_CONTEXT_PARAM: &str = "recipe_context";

/// Every injected parameter name
pub const INJECTED_PARAMS: [&str; 3] = [CONSOLE_PARAM, DIALOG_PARAM, RECIPE_CONTEXT_PARAM];

/// Returns true for names bound by injection rather than from the recipe
pub fn is_injected(name: &str) -> bool {
    INJECTED_PARAMS.contains(&name)
}

/// Arguments handed to a step function
#[derive(Default)]
pub struct CallArgs<'a> {
    console: Option<&'a mut dyn Console>,
    /// Whether `console` is bound as a parameter or only carries output
    console_injected: bool,
    dialog: Option<&'a mut dyn DialogHelper>,
    context: Option<&'a mut ExecutionContext>,
    values: IndexMap<String, Value>,
}

impl<'a> CallArgs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_console(mut self, console: &'a mut dyn Console) -> Self {
        self.console = Some(console);
        self.console_injected = true;
        self
    }

    /// Give the function somewhere to relay output without binding `console`
    pub fn with_output(mut self, console: &'a mut dyn Console) -> Self {
        self.console = Some(console);
        self.console_injected = false;
        self
    }

    pub fn with_dialog(mut self, dialog: &'a mut dyn DialogHelper) -> Self {
        self.dialog = Some(dialog);
        self
    }

    pub fn with_context(mut self, context: &'a mut ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Bind a plain value unless the name is already bound
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        if self.is_bound(&name) {
            return false;
        }
        self.values.insert(name, value);
        true
    }

    /// The injected `console` parameter
    pub fn console(&mut self) -> Option<&mut (dyn Console + 'a)> {
        if !self.console_injected {
            return None;
        }
        self.console.as_deref_mut()
    }

    /// Where captured output goes, whether or not `console` was declared
    pub fn output(&mut self) -> Option<&mut (dyn Console + 'a)> {
        self.console.as_deref_mut()
    }

    pub fn dialog(&mut self) -> Option<&mut (dyn DialogHelper + 'a)> {
        self.dialog.as_deref_mut()
    }

    pub fn context(&mut self) -> Option<&mut ExecutionContext> {
        self.context.as_deref_mut()
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// A bound value, if it is a string
    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// A bound string value, or a fault located at the caller
    #[track_caller]
    pub fn require_str(&self, name: &str) -> Result<&str, FunctionFault> {
        match self.str(name) {
            Some(value) => Ok(value),
            None => Err(FunctionFault::new(format!("missing string argument '{name}'"))),
        }
    }

    /// Plain (non-injected) values in binding order
    pub fn values(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        match name {
            CONSOLE_PARAM => self.console_injected && self.console.is_some(),
            DIALOG_PARAM => self.dialog.is_some(),
            RECIPE_CONTEXT_PARAM => self.context.is_some(),
            _ => self.values.contains_key(name),
        }
    }

    /// Names of everything bound, injected names first
    pub fn bound_names(&self) -> Vec<&str> {
        INJECTED_PARAMS
            .iter()
            .copied()
            .filter(|name| self.is_bound(name))
            .chain(self.values.keys().map(String::as_str))
            .collect()
    }
}

/// Capabilities the invoker can inject
pub struct Dependencies<'d> {
    pub console: &'d mut dyn Console,
    pub dialog: &'d mut dyn DialogHelper,
}

impl<'d> Dependencies<'d> {
    pub fn new(console: &'d mut dyn Console, dialog: &'d mut dyn DialogHelper) -> Self {
        Self { console, dialog }
    }
}

/// Why a step cannot continue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FatalReason {
    #[error("step requires function '{0}', but no module was found for this recipe")]
    MissingModule(String),

    #[error("function '{0}' not found in the module")]
    FunctionNotFound(String),

    #[error("recipe wants to prompt for '{param}', but function '{function}' has no such parameter")]
    UndeclaredPromptParameter { function: String, param: String },

    #[error("could not read input for '{param}': {message}")]
    Input { param: String, message: String },

    #[error("{0}")]
    Fault(#[from] FunctionFault),
}

/// Classified result of one step attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Retryable,
    Fatal(FatalReason),
}

/// Truthiness of a function's return value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Resolve the step's function, bind its arguments, invoke it and classify
/// the result.
pub fn resolve_and_invoke(
    step: &Step,
    module: Option<&RecipeModule>,
    deps: &mut Dependencies<'_>,
    context: &mut ExecutionContext,
) -> Outcome {
    let Some(name) = step.callable() else {
        return Outcome::Success;
    };
    let Some(module) = module else {
        return Outcome::Fatal(FatalReason::MissingModule(name.to_string()));
    };
    let Some(function) = module.function(name) else {
        return Outcome::Fatal(FatalReason::FunctionNotFound(name.to_string()));
    };

    if let Some(param) = step.prompt_for.keys().find(|p| !function.declares(p)) {
        return Outcome::Fatal(FatalReason::UndeclaredPromptParameter {
            function: name.to_string(),
            param: param.clone(),
        });
    }

    let prompted = match prompt_values(step, deps.console) {
        Ok(values) => values,
        Err(reason) => return Outcome::Fatal(reason),
    };

    let result = {
        let mut args = CallArgs::new();
        args = if function.declares(CONSOLE_PARAM) {
            args.with_console(&mut *deps.console)
        } else {
            args.with_output(&mut *deps.console)
        };
        if function.declares(DIALOG_PARAM) {
            args = args.with_dialog(&mut *deps.dialog);
        }
        if function.declares(RECIPE_CONTEXT_PARAM) {
            args = args.with_context(&mut *context);
        }
        for (param, value) in prompted {
            args.bind(param, value);
        }
        for (param, value) in step.literal_params() {
            if function.declares(param) {
                args.bind(param, value);
            }
        }

        debug!(function = name, bound = ?args.bound_names(), "invoking step function");
        function.call(&mut args)
    };

    match result {
        Ok(value) if is_truthy(&value) => Outcome::Success,
        Ok(value) => {
            debug!(function = name, returned = %value, "step function returned a falsy value");
            Outcome::Retryable
        }
        Err(fault) => Outcome::Fatal(fault.into()),
    }
}

/// Ask for every `prompt_for` parameter, re-asking on empty input
fn prompt_values(
    step: &Step,
    console: &mut dyn Console,
) -> Result<IndexMap<String, Value>, FatalReason> {
    let mut values = IndexMap::new();
    for (param, text) in &step.prompt_for {
        if is_injected(param) {
            debug!(param = %param, "not prompting for injected parameter");
            continue;
        }
        loop {
            let answer = console.input(&format!("{text}: ")).map_err(|e| input_error(param, e))?;
            let answer = answer.trim();
            if answer.is_empty() {
                console.say(Tone::Error, "Input cannot be empty. Please try again.");
                continue;
            }
            values.insert(param.clone(), Value::String(answer.to_string()));
            break;
        }
    }
    Ok(values)
}

fn input_error(param: &str, err: io::Error) -> FatalReason {
    FatalReason::Input {
        param: param.to_string(),
        message: err.to_string(),
    }
}
