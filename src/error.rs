//! Error type for script compilation and execution.
//!
//! Nothing in this crate lets a script failure escape to the host: `exec`
//! catches, logs and swallows. The error type exists for the internal
//! fallible path and for tests that want to assert on the failure mode.

use thiserror::Error;

/// Why a behavior program failed.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script text did not produce a callable body. Treated the same as
    /// an empty program: nothing is running afterwards.
    #[error("script compilation failed: {0}")]
    Compile(#[from] rhai::ParseError),

    /// A runtime exception while the script body ran. Listeners and
    /// cuepoints registered before the failure point stay active until the
    /// next reset.
    #[error("script execution failed: {0}")]
    Eval(String),
}

impl From<Box<rhai::EvalAltResult>> for ScriptError {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        Self::Eval(err.to_string())
    }
}
