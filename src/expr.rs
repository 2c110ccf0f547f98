//! Expression node model: tagged variants for access, arithmetic,
//! reduction, and immediates, plus the factory operator surface and
//! mutable operator-split annotations.
//!
//! Grounded on nanoda's `Expr(Arc<InnerExpr>)` wrapper and its
//! construct-time-cached metadata (`ExprCache`); here the cache holds the
//! node's promoted `DType` rather than a hash digest and variable-boundedness
//! flag, since this IR's equality is structural (analysis.rs) rather than
//! hash-based.

use crate::dtype::{Complex64, DType};
use crate::error::{Result, UserError};
use crate::ident::IndexVar;
use crate::tensor::TensorVar;
use parking_lot::RwLock;
use std::sync::Arc;

/// The reduction operator a `Reduction` node folds over its bound variable.
///
/// An explicit enum rather than nanoda-style encoding-by-shape: `spec.md`'s
/// Design Notes flag the "empty Add stands for sum" representation as
/// idiosyncratic and suggest this is the cleaner alternative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Product,
    Min,
    Max,
}

impl ReduceOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Product => "prod",
            ReduceOp::Min => "min",
            ReduceOp::Max => "max",
        }
    }
}

/// A client annotation recording that a binary node's index var `old`
/// should later be split into `left` and `right` by the loop-lowering
/// stage. Consumed, not interpreted, by this crate.
#[derive(Clone, Debug)]
pub struct OperatorSplit {
    pub old: IndexVar,
    pub left: IndexVar,
    pub right: IndexVar,
}

/// One variant of the expression tree. Children are `IndexExpr` handles,
/// never raw nodes, preserving invariant 2 (no null sub-expressions inside
/// a defined node).
pub enum ExprNode {
    Access(TensorVar, Vec<IndexVar>),
    Neg(IndexExpr),
    Sqrt(IndexExpr),
    Add(IndexExpr, IndexExpr),
    Sub(IndexExpr, IndexExpr),
    Mul(IndexExpr, IndexExpr),
    Div(IndexExpr, IndexExpr),
    Reduction(ReduceOp, IndexVar, IndexExpr),
    IntImm(i64),
    UIntImm(u64),
    FloatImm(f64),
    ComplexImm(Complex64),
}

struct ExprData {
    node: ExprNode,
    dtype: DType,
    splits: RwLock<Vec<OperatorSplit>>,
}

/// A shared-ownership reference to an immutable `ExprNode`.
///
/// `Arc`-backed (not `Rc`) so that concurrent read-only traversal from
/// multiple threads is sound, as the concurrency model requires; the
/// operator-split list is the one piece of per-node mutable state and is
/// guarded by a `parking_lot::RwLock`.
#[derive(Clone)]
pub struct IndexExpr(Arc<ExprData>);

impl IndexExpr {
    fn new(node: ExprNode, dtype: DType) -> Self {
        IndexExpr(Arc::new(ExprData {
            node,
            dtype,
            splits: RwLock::new(Vec::new()),
        }))
    }

    pub fn node(&self) -> &ExprNode {
        &self.0.node
    }

    pub fn dtype(&self) -> DType {
        self.0.dtype
    }

    /// True iff both handles point at the same allocation. Used by the
    /// `Rewrite` trait's default method to decide whether a rebuilt node
    /// actually changed, so unmodified subtrees are reused rather than
    /// re-cloned.
    pub fn ptr_eq(a: &IndexExpr, b: &IndexExpr) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Appends to this node's split list. Mutates the shared node in
    /// place, so every alias of this handle observes the annotation.
    pub fn split_operator(&self, old: IndexVar, left: IndexVar, right: IndexVar) {
        self.0.splits.write().push(OperatorSplit { old, left, right });
    }

    pub fn splits(&self) -> Vec<OperatorSplit> {
        self.0.splits.read().clone()
    }

    pub fn access(tensor: TensorVar, indices: Vec<IndexVar>) -> Result<Self> {
        if indices.len() != tensor.order() {
            return Err(UserError::ArityMismatch {
                tensor: tensor.name(),
                expected: tensor.order(),
                given: indices.len(),
            });
        }
        let dtype = tensor.dtype();
        Ok(Self::new(ExprNode::Access(tensor, indices), dtype))
    }

    pub fn neg(a: IndexExpr) -> Self {
        let dtype = a.dtype();
        Self::new(ExprNode::Neg(a), dtype)
    }

    pub fn sqrt(a: IndexExpr) -> Self {
        let dtype = a.dtype();
        Self::new(ExprNode::Sqrt(a), dtype)
    }

    pub fn add(a: IndexExpr, b: IndexExpr) -> Self {
        let dtype = a.dtype().promote(b.dtype());
        Self::new(ExprNode::Add(a, b), dtype)
    }

    pub fn sub(a: IndexExpr, b: IndexExpr) -> Self {
        let dtype = a.dtype().promote(b.dtype());
        Self::new(ExprNode::Sub(a, b), dtype)
    }

    pub fn mul(a: IndexExpr, b: IndexExpr) -> Self {
        let dtype = a.dtype().promote(b.dtype());
        Self::new(ExprNode::Mul(a, b), dtype)
    }

    pub fn div(a: IndexExpr, b: IndexExpr) -> Self {
        let dtype = a.dtype().promote(b.dtype());
        Self::new(ExprNode::Div(a, b), dtype)
    }

    pub fn reduction(op: ReduceOp, var: IndexVar, body: IndexExpr) -> Self {
        let dtype = body.dtype();
        Self::new(ExprNode::Reduction(op, var, body), dtype)
    }

    /// `sum(var)(expr)` builder named directly after the spec's reduction
    /// syntax; the other reduction operators are reached via `reduction`.
    pub fn sum(var: IndexVar, body: IndexExpr) -> Self {
        Self::reduction(ReduceOp::Sum, var, body)
    }

    pub fn int(v: i64) -> Self {
        Self::new(ExprNode::IntImm(v), DType::I64)
    }

    pub fn uint(v: u64) -> Self {
        Self::new(ExprNode::UIntImm(v), DType::U64)
    }

    pub fn float(v: f64) -> Self {
        Self::new(ExprNode::FloatImm(v), DType::F64)
    }

    pub fn complex(v: Complex64) -> Self {
        Self::new(ExprNode::ComplexImm(v), DType::Complex64)
    }
}

impl From<i64> for IndexExpr {
    fn from(v: i64) -> Self {
        IndexExpr::int(v)
    }
}
impl From<u64> for IndexExpr {
    fn from(v: u64) -> Self {
        IndexExpr::uint(v)
    }
}
impl From<f64> for IndexExpr {
    fn from(v: f64) -> Self {
        IndexExpr::float(v)
    }
}
impl From<Complex64> for IndexExpr {
    fn from(v: Complex64) -> Self {
        IndexExpr::complex(v)
    }
}

impl std::ops::Add for IndexExpr {
    type Output = IndexExpr;
    fn add(self, rhs: IndexExpr) -> IndexExpr {
        IndexExpr::add(self, rhs)
    }
}
impl std::ops::Sub for IndexExpr {
    type Output = IndexExpr;
    fn sub(self, rhs: IndexExpr) -> IndexExpr {
        IndexExpr::sub(self, rhs)
    }
}
impl std::ops::Mul for IndexExpr {
    type Output = IndexExpr;
    fn mul(self, rhs: IndexExpr) -> IndexExpr {
        IndexExpr::mul(self, rhs)
    }
}
impl std::ops::Div for IndexExpr {
    type Output = IndexExpr;
    fn div(self, rhs: IndexExpr) -> IndexExpr {
        IndexExpr::div(self, rhs)
    }
}
impl std::ops::Neg for IndexExpr {
    type Output = IndexExpr;
    fn neg(self) -> IndexExpr {
        IndexExpr::neg(self)
    }
}

/// Walks the bound expression and collects every binary node's recorded
/// operator splits, in depth-first traversal order. Used by
/// `TensorVar::get_schedule`.
pub(crate) fn collect_splits(expr: &IndexExpr) -> Vec<OperatorSplit> {
    let mut out = Vec::new();
    collect_splits_into(expr, &mut out);
    out
}

fn collect_splits_into(expr: &IndexExpr, out: &mut Vec<OperatorSplit>) {
    match expr.node() {
        ExprNode::Access(..) | ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_)
        | ExprNode::ComplexImm(_) => {}
        ExprNode::Neg(a) | ExprNode::Sqrt(a) => {
            collect_splits_into(a, out);
        }
        ExprNode::Add(a, b) | ExprNode::Sub(a, b) | ExprNode::Mul(a, b) | ExprNode::Div(a, b) => {
            collect_splits_into(a, out);
            collect_splits_into(b, out);
            out.extend(expr.splits());
        }
        ExprNode::Reduction(_, _, body) => {
            collect_splits_into(body, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Format, Shape};

    fn vec_tensor(name: &str) -> TensorVar {
        TensorVar::new(
            name,
            DType::F64,
            Shape::new(vec![crate::format::Dim::Fixed(4)]),
            Format::dense_row_major(1),
        )
    }

    #[test]
    fn access_checks_arity() {
        let a = vec_tensor("a");
        let i = IndexVar::new("i");
        let j = IndexVar::new("j");
        assert!(IndexExpr::access(a.clone(), vec![i.clone()]).is_ok());
        assert!(matches!(
            IndexExpr::access(a, vec![i, j]),
            Err(UserError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn dtype_promotes_through_arithmetic() {
        let x = IndexExpr::int(1);
        let y = IndexExpr::float(2.0);
        let sum = x + y;
        assert_eq!(sum.dtype(), DType::F64);
    }

    #[test]
    fn operator_split_is_observed_through_aliases() {
        let expr = IndexExpr::add(IndexExpr::int(1), IndexExpr::int(2));
        let alias = expr.clone();
        let old = IndexVar::new("i");
        let left = IndexVar::new("i0");
        let right = IndexVar::new("i1");
        expr.split_operator(old, left, right);
        assert_eq!(alias.splits().len(), 1);
    }

    #[test]
    fn ptr_eq_distinguishes_equal_but_distinct_allocations() {
        let a = IndexExpr::int(5);
        let b = IndexExpr::int(5);
        assert!(!IndexExpr::ptr_eq(&a, &b));
        let c = a.clone();
        assert!(IndexExpr::ptr_eq(&a, &c));
    }

    #[test]
    fn schedule_only_collects_binary_node_splits() {
        let a = vec_tensor("a");
        let i = IndexVar::new("i");
        let access = IndexExpr::access(a, vec![i.clone()]).unwrap();
        let reduced = IndexExpr::sum(i.clone(), access.clone());
        let old = IndexVar::new("i");
        let left = IndexVar::new("i0");
        let right = IndexVar::new("i1");
        // Splits on a non-binary node (here: an Access and the enclosing
        // Reduction) must not show up in the collected schedule — only
        // Add/Sub/Mul/Div nodes carry schedule-relevant splits.
        access.split_operator(old.clone(), left.clone(), right.clone());
        reduced.split_operator(old.clone(), left.clone(), right.clone());
        assert!(collect_splits(&reduced).is_empty());

        let binary = IndexExpr::add(reduced.clone(), IndexExpr::int(1));
        binary.split_operator(old, left, right);
        assert_eq!(collect_splits(&binary).len(), 1);
    }
}
