//! Error taxonomy: recoverable `UserError`s returned to callers, and
//! `InternalError` invariant violations that panic rather than propagate.

use crate::format::Dim;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UserError>;

/// Recoverable errors surfaced from the assignment protocol and the
/// expression-construction factory. Never raised for analyses, which
/// report findings as `bool` per the taxonomy's "never swallowed, never
/// raised for queries" rule.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("dimensional mismatch on index var {var}: {lhs} assigns dimension {lhs_dim}, {rhs} assigns dimension {rhs_dim}")]
    DimensionalMismatch {
        var: String,
        lhs: String,
        lhs_dim: Dim,
        rhs: String,
        rhs_dim: Dim,
    },

    #[error("ill-formed assignment `{rendered}`: unbound index vars {unbound:?}")]
    IllFormedAssignment {
        rendered: String,
        unbound: Vec<String>,
    },

    #[error("tensor `{tensor}` already has an assignment; re-assignment is not permitted")]
    Reassignment { tensor: String },

    #[error("access to tensor `{tensor}` supplies {given} indices but its order is {expected}")]
    ArityMismatch {
        tensor: String,
        expected: usize,
        given: usize,
    },

    #[error("assignment to `{tensor}` requires a transposition (result mode order {result_mode_order:?} vs source mode order {source_mode_order:?}) the current lowering does not support")]
    UnsupportedTransposition {
        tensor: String,
        result_mode_order: Vec<usize>,
        source_mode_order: Vec<usize>,
    },

    #[error("free index var `{var}` appears on the result of `{tensor}` but in no access on the right-hand side")]
    UnsupportedDistribution { tensor: String, var: String },

    #[error("scalar tensor `{tensor}` cannot take a non-empty free-index list")]
    ScalarWithFreeVars { tensor: String },

    #[error("non-scalar tensor `{tensor}` of order {order} requires a free-index list")]
    MissingFreeVars { tensor: String, order: usize },

    #[error("assignment to `{tensor}` supplies {given} free index vars but its order is {order}")]
    FreeVarArityMismatch {
        tensor: String,
        order: usize,
        given: usize,
    },

    #[error("unrecognized format mode character `{found}` at position {position}")]
    BadFormatChar { found: char, position: usize },
}

/// Invariant violations: a strict visitor asked to dispatch a variant it
/// does not cover, a node expected to be defined turning up undefined, or
/// similar internal-bug conditions. These panic; they are never returned
/// as a `Result`, per the spec's "indicates a bug; terminates the build".
pub fn internal_error(msg: impl std::fmt::Display) -> ! {
    panic!("tensorix internal error: {}", msg);
}
