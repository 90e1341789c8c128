//! Rule dispatch over Java syntax trees.
//!
//! A [`analysis::DispatchEngine`] walks each [`analysis::SyntaxUnit`] once, in
//! pre-order, and calls the rules subscribed to every node kind it meets. Rules
//! report into a per-pass sink; the engine hands the diagnostics back together
//! with any rule faults.

use log::error;
use thiserror::Error;

pub mod analysis;
pub mod lexer;
pub mod parser;

use crate::analysis::{DispatchEngine, EngineError, PassReport, SyntaxUnit};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Lexer error at {line}:{column}: {message}")]
    Lexer {
        message: String,
        line: usize,
        column: usize,
    },
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Parses `source` and runs the built-in rules over it
pub fn analyze_source(name: &str, source: &str) -> Result<PassReport, Vec<CheckError>> {
    let unit = SyntaxUnit::from_source(name, source).inspect_err(|errors| {
        for err in errors {
            error!("{}: {}", name, err);
        }
    })?;

    DispatchEngine::with_builtin_rules()
        .scan(&unit)
        .map_err(|err| vec![CheckError::from(err)])
}
