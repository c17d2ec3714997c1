//! Faults raised by step functions.
//!
//! A step function fails fatally either by returning a [`FunctionFault`] or by
//! panicking. Both end up as a `FunctionFault` carrying the location inside the
//! function where the failure originated.

use serde_json::Value;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::Once;
use thiserror::Error;

/// Source position of a fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line(), location.column())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// A fatal error raised inside a step function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", headline(.function, .message), location_suffix(.location))]
pub struct FunctionFault {
    /// Function the fault was raised in; filled in by the invoker when blank
    pub function: String,
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Extra diagnostic output (script stderr, exit status)
    pub detail: Option<String>,
}

impl FunctionFault {
    /// Create a fault located at the caller
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            function: String::new(),
            message: message.into(),
            location: Some(Location::caller().into()),
            detail: None,
        }
    }

    pub fn in_function(mut self, function: impl Into<String>) -> Self {
        if self.function.is_empty() {
            self.function = function.into();
        }
        self
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

fn headline(function: &str, message: &str) -> String {
    if function.is_empty() {
        message.to_string()
    } else {
        format!("function '{function}' failed: {message}")
    }
}

fn location_suffix(location: &Option<SourceLocation>) -> String {
    match location {
        Some(location) => format!(" (at {location})"),
        None => String::new(),
    }
}

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<SourceLocation>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chain a panic hook that records the panic location while a step function
/// runs and stays silent; outside of step functions the previous hook runs.
fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                let location = info.location().map(SourceLocation::from);
                LAST_PANIC.with(|last| *last.borrow_mut() = location);
            } else {
                previous(info);
            }
        }));
    });
}

/// Run a step function body, turning panics into faults
pub fn catch_fault<F>(function: &str, body: F) -> Result<Value, FunctionFault>
where
    F: FnOnce() -> Result<Value, FunctionFault>,
{
    install_panic_hook();
    let was_capturing = CAPTURING.with(|c| c.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(body));
    CAPTURING.with(|c| c.set(was_capturing));

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(fault)) => Err(fault.in_function(function)),
        Err(payload) => {
            let location = LAST_PANIC.with(|last| last.borrow_mut().take());
            Err(FunctionFault {
                function: function.to_string(),
                message: format!("panicked: {}", panic_message(payload.as_ref())),
                location,
                detail: None,
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
