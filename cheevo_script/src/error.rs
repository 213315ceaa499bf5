//! Error types shared by the interpreter and the trigger compiler.

use std::fmt;

use cheevo_data::OptimizeError;

use crate::ast::Location;

/// Broad class of a compile failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Structural,
    ResourceLimit,
    Semantic,
    Unsupported,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Structural => "structural",
            ErrorCategory::ResourceLimit => "resource limit",
            ErrorCategory::Semantic => "semantic",
            ErrorCategory::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Failures while lowering a clause tree into requirements.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("expected a comparison, found {0}")]
    NotAComparison(String),
    #[error("OR expansion would produce {projected} alt groups (limit {limit})")]
    ExpansionLimit { projected: usize, limit: usize },
    #[error("{construct} cannot be used {context}")]
    Unsupported {
        construct: &'static str,
        context: &'static str,
    },
    #[error("cannot apply {applied} to a condition already using {existing}")]
    ConflictingFlags {
        applied: &'static str,
        existing: &'static str,
    },
    #[error("{0} reads 32 bits, leaving no headroom to rewrite the comparison")]
    ThirtyTwoBit(String),
    #[error("comparison overflows the 32-bit accumulator")]
    Overflow,
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("{0}")]
    Optimize(#[from] OptimizeError),
}

impl CompileError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CompileError::ExpansionLimit { .. } => ErrorCategory::ResourceLimit,
            CompileError::Unsupported { .. } => ErrorCategory::Unsupported,
            CompileError::NotAComparison(_) | CompileError::ConflictingFlags { .. } | CompileError::Optimize(_) => {
                ErrorCategory::Semantic
            },
            CompileError::ThirtyTwoBit(_)
            | CompileError::Overflow
            | CompileError::InvalidAddress(_) => ErrorCategory::Structural,
        }
    }
}

/// What kind of evaluation failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    General,
    /// A condition of an `if` depends on live memory.
    RuntimeLogicInCondition,
    Compile(ErrorCategory),
}

/// A located evaluation error, optionally wrapping the error that caused it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{location}: {message}")]
pub struct EvalError {
    pub message: String,
    pub location: Location,
    pub kind: EvalErrorKind,
    #[source]
    pub inner: Option<Box<EvalError>>,
}

impl EvalError {
    pub fn new(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location,
            kind: EvalErrorKind::General,
            inner: None,
        }
    }

    pub fn with_kind(mut self, kind: EvalErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Wraps `inner` under a higher level message at `location`.
    pub fn wrap(message: impl Into<String>, location: Location, inner: EvalError) -> Self {
        Self {
            message: message.into(),
            location,
            kind: inner.kind,
            inner: Some(Box::new(inner)),
        }
    }

    pub fn compile(error: &CompileError, location: Location) -> Self {
        Self::new(error.to_string(), location).with_kind(EvalErrorKind::Compile(error.category()))
    }

    /// The innermost error of the chain.
    pub fn root_cause(&self) -> &EvalError {
        let mut current = self;
        while let Some(inner) = &current.inner {
            current = inner;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_keep_their_root_cause() {
        let cause = EvalError::compile(
            &CompileError::Optimize(OptimizeError::IncompleteClause { group: 0 }),
            Location::new(3, 9),
        );
        let outer = EvalError::wrap("achievement call failed", Location::new(3, 1), cause);
        assert_eq!(outer.to_string(), "3:1: achievement call failed");
        assert_eq!(
            outer.root_cause().message,
            "incomplete trigger condition in core group"
        );
        assert_eq!(outer.kind, EvalErrorKind::Compile(ErrorCategory::Semantic));
        assert!(std::error::Error::source(&outer).is_some());
    }
}
