//! `TensorVar`: an identity-based, typed, formatted tensor handle that may
//! carry a single recorded assignment and a derived schedule.
//!
//! Grounded on nanoda's `env::Declaration`/`env::Definition` (name + type +
//! payload struct, validated before acceptance by `declaration_check`).

use crate::dtype::DType;
use crate::expr::{IndexExpr, OperatorSplit};
use crate::format::{Format, Shape};
use crate::ident::{fresh_name, next_serial};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

static TENSOR_VAR_SERIAL: AtomicU64 = AtomicU64::new(0);

/// A recorded `result(free...) = expr` / `+= expr` binding.
#[derive(Clone)]
pub struct Assignment {
    pub free: Vec<crate::ident::IndexVar>,
    pub expr: IndexExpr,
    pub accumulate: bool,
}

struct TensorVarInner {
    id: u64,
    name: RwLock<String>,
    dtype: DType,
    shape: Shape,
    format: Format,
    assignment: RwLock<Option<Assignment>>,
}

/// An identity-based tensor handle.
///
/// Equality and ordering are identity-based, exactly as for `IndexVar`. A
/// `TensorVar` is single-assignment: the assignment protocol in `assign.rs`
/// enforces that `assign`/`assign_accumulate` succeed at most once.
#[derive(Clone)]
pub struct TensorVar(Arc<TensorVarInner>);

impl TensorVar {
    pub fn fresh(dtype: DType, shape: Shape, format: Format) -> Self {
        Self::new(fresh_name('t'), dtype, shape, format)
    }

    pub fn new(name: impl Into<String>, dtype: DType, shape: Shape, format: Format) -> Self {
        assert_eq!(
            shape.order(),
            format.order(),
            "shape and format must agree on tensor order"
        );
        TensorVar(Arc::new(TensorVarInner {
            id: next_serial(&TENSOR_VAR_SERIAL),
            name: RwLock::new(name.into()),
            dtype,
            shape,
            format,
            assignment: RwLock::new(None),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> String {
        self.0.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.0.name.write() = name.into();
    }

    pub fn dtype(&self) -> DType {
        self.0.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.0.shape
    }

    pub fn order(&self) -> usize {
        self.0.shape.order()
    }

    pub fn format(&self) -> &Format {
        &self.0.format
    }

    /// The currently recorded assignment, if any.
    pub fn assignment(&self) -> Option<Assignment> {
        self.0.assignment.read().clone()
    }

    pub fn has_assignment(&self) -> bool {
        self.0.assignment.read().is_some()
    }

    /// Records an assignment outright. Only called by `assign.rs` after
    /// every protocol check has passed; not exposed as a public way to
    /// bypass those checks.
    pub(crate) fn record_assignment(&self, assignment: Assignment) {
        *self.0.assignment.write() = Some(assignment);
    }

    /// Rebuilds the schedule by walking the bound expression and collecting
    /// every binary node's operator-split annotations in traversal order.
    /// Rebuilt fresh on each call, as the spec requires ("the cache is
    /// cleared and rebuilt on each call").
    pub fn get_schedule(&self) -> Vec<OperatorSplit> {
        match self.assignment() {
            Some(a) => crate::expr::collect_splits(&a.expr),
            None => Vec::new(),
        }
    }
}

impl fmt::Display for TensorVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for TensorVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TensorVar(#{}, {:?})", self.0.id, self.name())
    }
}

impl PartialEq for TensorVar {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for TensorVar {}

impl Hash for TensorVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl PartialOrd for TensorVar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TensorVar {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Dim;

    fn scalar_tensor(name: &str) -> TensorVar {
        TensorVar::new(name, DType::F64, Shape::scalar(), Format::dense_row_major(0))
    }

    #[test]
    fn identity_not_name() {
        let a = scalar_tensor("a");
        let b = scalar_tensor("a");
        assert_ne!(a, b);
    }

    #[test]
    fn starts_unassigned() {
        let a = scalar_tensor("a");
        assert!(!a.has_assignment());
        assert!(a.get_schedule().is_empty());
    }

    #[test]
    fn shape_format_order_mismatch_panics() {
        let shape = Shape::new(vec![Dim::Fixed(3)]);
        let result = std::panic::catch_unwind(|| {
            TensorVar::new("x", DType::F64, shape, Format::dense_row_major(2))
        });
        assert!(result.is_err());
    }
}
