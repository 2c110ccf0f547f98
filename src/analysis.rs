//! Structural analyses: equality, free/reduction-variable collection,
//! well-formedness, dimension inference, dimensional type-checking,
//! transposition/distribution detection, and einsum eligibility.
//!
//! The recursive-comparison shape of `equals` is grounded on nanoda's
//! `Expr::eq_mod_locals`/`contains_subterm`; the per-subtree set-minus used
//! by `vars_without_reduction` resolves the order-sensitivity design note
//! in the spec's Design Notes by computing the free set of each subtree
//! independently before merging upward, rather than inserting into and
//! removing from one accumulated set during a single linear walk.

use crate::expr::{ExprNode, IndexExpr};
use crate::format::{Dim, Format, Shape};
use crate::ident::IndexVar;
use crate::tensor::TensorVar;
use hashbrown::HashMap;
use indexmap::IndexSet;

/// Structural equality. Both undefined is true; exactly one undefined is
/// false; otherwise recurses structurally. Equality is by structure and
/// identity, not mathematical value: `a+b` is not equal to `b+a`, and two
/// distinct `IndexVar`s sharing a display name are not equal.
pub fn equals(a: Option<&IndexExpr>, b: Option<&IndexExpr>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => equals_defined(x, y),
        _ => false,
    }
}

fn equals_defined(a: &IndexExpr, b: &IndexExpr) -> bool {
    match (a.node(), b.node()) {
        (ExprNode::Access(ta, ia), ExprNode::Access(tb, ib)) => ta == tb && ia == ib,
        (ExprNode::Neg(a1), ExprNode::Neg(b1)) => equals_defined(a1, b1),
        (ExprNode::Sqrt(a1), ExprNode::Sqrt(b1)) => equals_defined(a1, b1),
        (ExprNode::Add(a1, a2), ExprNode::Add(b1, b2)) => {
            equals_defined(a1, b1) && equals_defined(a2, b2)
        }
        (ExprNode::Sub(a1, a2), ExprNode::Sub(b1, b2)) => {
            equals_defined(a1, b1) && equals_defined(a2, b2)
        }
        (ExprNode::Mul(a1, a2), ExprNode::Mul(b1, b2)) => {
            equals_defined(a1, b1) && equals_defined(a2, b2)
        }
        (ExprNode::Div(a1, a2), ExprNode::Div(b1, b2)) => {
            equals_defined(a1, b1) && equals_defined(a2, b2)
        }
        (ExprNode::Reduction(opa, va, bodya), ExprNode::Reduction(opb, vb, bodyb)) => {
            opa == opb && va == vb && equals_defined(bodya, bodyb)
        }
        (ExprNode::IntImm(x), ExprNode::IntImm(y)) => x == y,
        (ExprNode::UIntImm(x), ExprNode::UIntImm(y)) => x == y,
        (ExprNode::FloatImm(x), ExprNode::FloatImm(y)) => x.to_bits() == y.to_bits(),
        (ExprNode::ComplexImm(x), ExprNode::ComplexImm(y)) => x == y,
        _ => false,
    }
}

/// The in-order, de-duplicated sequence of `IndexVar`s occurring in any
/// `Access` within `expr` (depth-first pre-order, first occurrence wins).
pub fn get_index_vars(expr: &IndexExpr) -> Vec<IndexVar> {
    let mut seen = IndexSet::new();
    collect_index_vars(expr, &mut seen);
    seen.into_iter().collect()
}

fn collect_index_vars(expr: &IndexExpr, out: &mut IndexSet<IndexVar>) {
    match expr.node() {
        ExprNode::Access(_, indices) => {
            for v in indices {
                out.insert(v.clone());
            }
        }
        ExprNode::Neg(a) | ExprNode::Sqrt(a) => collect_index_vars(a, out),
        ExprNode::Add(a, b) | ExprNode::Sub(a, b) | ExprNode::Mul(a, b) | ExprNode::Div(a, b) => {
            collect_index_vars(a, out);
            collect_index_vars(b, out);
        }
        ExprNode::Reduction(_, _, body) => collect_index_vars(body, out),
        ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_) | ExprNode::ComplexImm(_) => {}
    }
}

/// `IndexVar`s that appear in an `Access` but are not bound by an enclosing
/// `Reduction` on the path from the root. Computed per subtree: a
/// reduction's bound variable is removed from its own body's free set
/// before that set is merged into the parent's, so a var bound by a
/// reduction is excluded regardless of traversal order or of whether the
/// same var also occurs free elsewhere in the expression.
pub fn vars_without_reduction(expr: &IndexExpr) -> IndexSet<IndexVar> {
    let mut out = IndexSet::new();
    collect_free(expr, &mut out);
    out
}

fn collect_free(expr: &IndexExpr, out: &mut IndexSet<IndexVar>) {
    match expr.node() {
        ExprNode::Access(_, indices) => {
            for v in indices {
                out.insert(v.clone());
            }
        }
        ExprNode::Neg(a) | ExprNode::Sqrt(a) => collect_free(a, out),
        ExprNode::Add(a, b) | ExprNode::Sub(a, b) | ExprNode::Mul(a, b) | ExprNode::Div(a, b) => {
            collect_free(a, out);
            collect_free(b, out);
        }
        ExprNode::Reduction(_, var, body) => {
            let mut inner = IndexSet::new();
            collect_free(body, &mut inner);
            inner.shift_remove(var);
            out.extend(inner);
        }
        ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_) | ExprNode::ComplexImm(_) => {}
    }
}

/// `verify(expr, free)` holds iff every var free in `expr` belongs to `free`.
pub fn verify(expr: &IndexExpr, free: &[IndexVar]) -> bool {
    let allowed: IndexSet<IndexVar> = free.iter().cloned().collect();
    vars_without_reduction(expr).iter().all(|v| allowed.contains(v))
}

/// Applies `verify` to a tensor's recorded assignment; a tensor with no
/// assignment has nothing to verify and reports `false`.
pub fn verify_tensor(tensor: &TensorVar) -> bool {
    match tensor.assignment() {
        Some(a) => verify(&a.expr, &a.free),
        None => false,
    }
}

/// A mapping from each `IndexVar` in the tensor's free set or expression to
/// the dimension it indexes. Conflicts across occurrences are not
/// detected here — first occurrence wins — see `dimension_conflicts`.
pub fn get_index_var_ranges(tensor: &TensorVar) -> HashMap<IndexVar, Dim> {
    let mut ranges = HashMap::new();
    if let Some(assignment) = tensor.assignment() {
        for (i, var) in assignment.free.iter().enumerate() {
            if let Some(dim) = tensor.shape().dim(i) {
                ranges.insert(var.clone(), dim.clone());
            }
        }
        collect_access_ranges(&assignment.expr, &mut ranges);
    }
    ranges
}

fn collect_access_ranges(expr: &IndexExpr, ranges: &mut HashMap<IndexVar, Dim>) {
    match expr.node() {
        ExprNode::Access(tensor, indices) => {
            for (i, var) in indices.iter().enumerate() {
                if let Some(dim) = tensor.shape().dim(i) {
                    ranges.entry(var.clone()).or_insert_with(|| dim.clone());
                }
            }
        }
        ExprNode::Neg(a) | ExprNode::Sqrt(a) => collect_access_ranges(a, ranges),
        ExprNode::Add(a, b) | ExprNode::Sub(a, b) | ExprNode::Mul(a, b) | ExprNode::Div(a, b) => {
            collect_access_ranges(a, ranges);
            collect_access_ranges(b, ranges);
        }
        ExprNode::Reduction(_, _, body) => collect_access_ranges(body, ranges),
        ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_) | ExprNode::ComplexImm(_) => {}
    }
}

/// One dimension disagreement found by `dimension_conflicts`: `var` is
/// assigned `first_dim` by `first_source` and `second_dim` by
/// `second_source`, and the two dimensions differ.
pub struct DimensionConflict {
    pub var: IndexVar,
    pub first_source: String,
    pub first_dim: Dim,
    pub second_source: String,
    pub second_dim: Dim,
}

/// Every dimension disagreement between the result's free-index list and
/// the expression's accesses. Empty iff dimensions are consistent.
pub fn dimension_conflicts(
    free: &[IndexVar],
    result_name: &str,
    expr: &IndexExpr,
    shape: &Shape,
) -> Vec<DimensionConflict> {
    let mut seen: HashMap<IndexVar, (String, Dim)> = HashMap::new();
    let mut conflicts = Vec::new();
    for (i, var) in free.iter().enumerate() {
        if let Some(dim) = shape.dim(i) {
            record_dim(var.clone(), result_name.to_string(), dim.clone(), &mut seen, &mut conflicts);
        }
    }
    collect_conflicting_access_dims(expr, &mut seen, &mut conflicts);
    conflicts
}

fn record_dim(
    var: IndexVar,
    source: String,
    dim: Dim,
    seen: &mut HashMap<IndexVar, (String, Dim)>,
    conflicts: &mut Vec<DimensionConflict>,
) {
    match seen.get(&var) {
        Some((s0, d0)) if d0 != &dim => conflicts.push(DimensionConflict {
            var,
            first_source: s0.clone(),
            first_dim: d0.clone(),
            second_source: source,
            second_dim: dim,
        }),
        Some(_) => {}
        None => {
            seen.insert(var, (source, dim));
        }
    }
}

fn collect_conflicting_access_dims(
    expr: &IndexExpr,
    seen: &mut HashMap<IndexVar, (String, Dim)>,
    conflicts: &mut Vec<DimensionConflict>,
) {
    match expr.node() {
        ExprNode::Access(tensor, indices) => {
            for (i, var) in indices.iter().enumerate() {
                if let Some(dim) = tensor.shape().dim(i) {
                    record_dim(var.clone(), tensor.name(), dim.clone(), seen, conflicts);
                }
            }
        }
        ExprNode::Neg(a) | ExprNode::Sqrt(a) => collect_conflicting_access_dims(a, seen, conflicts),
        ExprNode::Add(a, b) | ExprNode::Sub(a, b) | ExprNode::Mul(a, b) | ExprNode::Div(a, b) => {
            collect_conflicting_access_dims(a, seen, conflicts);
            collect_conflicting_access_dims(b, seen, conflicts);
        }
        ExprNode::Reduction(_, _, body) => collect_conflicting_access_dims(body, seen, conflicts),
        ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_) | ExprNode::ComplexImm(_) => {}
    }
}

/// External-collaborator seam: dimensions assigned to each `IndexVar` must
/// be consistent across every occurrence in the result and the expression.
pub trait DimensionsTypecheck {
    fn check(&self, free: &[IndexVar], result_name: &str, expr: &IndexExpr, shape: &Shape) -> bool;
}

/// Reference implementation used by the assignment protocol by default.
pub struct DefaultDimensionsTypecheck;

impl DimensionsTypecheck for DefaultDimensionsTypecheck {
    fn check(&self, free: &[IndexVar], result_name: &str, expr: &IndexExpr, shape: &Shape) -> bool {
        dimension_conflicts(free, result_name, expr, shape).is_empty()
    }
}

/// External-collaborator seam: detects a transposition the current
/// lowering does not support — the expression amounts to a direct access
/// of a single tensor whose indices are a permutation of the free list
/// that disagrees with the destination format's declared mode order.
pub trait TranspositionCheck {
    fn is_transposition(&self, free: &[IndexVar], expr: &IndexExpr, result_format: &Format) -> bool;
}

pub struct DefaultTranspositionCheck;

impl TranspositionCheck for DefaultTranspositionCheck {
    fn is_transposition(&self, free: &[IndexVar], expr: &IndexExpr, result_format: &Format) -> bool {
        let (tensor, indices) = match expr.node() {
            ExprNode::Access(tensor, indices) => (tensor, indices),
            _ => return false,
        };
        if indices.len() != free.len() {
            return false;
        }
        let free_set: IndexSet<&IndexVar> = free.iter().collect();
        let index_set: IndexSet<&IndexVar> = indices.iter().collect();
        if free_set != index_set {
            return false;
        }
        let positions: Vec<usize> = free
            .iter()
            .map(|v| indices.iter().position(|x| x == v).expect("checked equal sets"))
            .collect();
        let identity: Vec<usize> = (0..free.len()).collect();
        positions != identity && result_format.mode_order() == tensor.format().mode_order()
    }
}

/// External-collaborator seam: a free var on the result side that no
/// access on the right-hand side ever produces.
pub trait DistributionCheck {
    fn find_undistributed(&self, free: &[IndexVar], expr: &IndexExpr) -> Option<IndexVar>;
}

pub struct DefaultDistributionCheck;

impl DistributionCheck for DefaultDistributionCheck {
    fn find_undistributed(&self, free: &[IndexVar], expr: &IndexExpr) -> Option<IndexVar> {
        let used = get_index_vars(expr);
        free.iter().find(|v| !used.contains(v)).cloned()
    }
}

/// An expression is einsum-eligible iff it is a sum of products of
/// accesses and immediates: `Add`/`Sub` never occur beneath a `Mul`. Any
/// `Reduction`, `Neg`, `Sqrt`, or `Div` disqualifies.
pub fn is_einsum_eligible(expr: &IndexExpr) -> bool {
    eligible_sum(expr)
}

fn eligible_sum(expr: &IndexExpr) -> bool {
    match expr.node() {
        ExprNode::Add(a, b) | ExprNode::Sub(a, b) => eligible_sum(a) && eligible_sum(b),
        ExprNode::Mul(a, b) => eligible_product(a) && eligible_product(b),
        ExprNode::Access(..) => true,
        ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_) | ExprNode::ComplexImm(_) => true,
        ExprNode::Neg(_) | ExprNode::Sqrt(_) | ExprNode::Div(..) | ExprNode::Reduction(..) => false,
    }
}

fn eligible_product(expr: &IndexExpr) -> bool {
    match expr.node() {
        ExprNode::Mul(a, b) => eligible_product(a) && eligible_product(b),
        ExprNode::Access(..) => true,
        ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_) | ExprNode::ComplexImm(_) => true,
        _ => false,
    }
}
