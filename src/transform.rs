//! Transformations: zero-propagation simplification and einsum
//! normalization.
//!
//! Built on the identity-reuse discipline of `walker::Rewriter`, but
//! written as dedicated recursive functions rather than trait impls: both
//! passes need to propagate `Option<IndexExpr>` ("undefined") through the
//! tree with variant-specific tolerance/propagation rules that don't fit
//! the generic "always returns a defined replacement" shape of `Rewriter`.

use crate::analysis::{equals, get_index_vars, is_einsum_eligible};
use crate::expr::{ExprNode, IndexExpr, ReduceOp};
use crate::ident::IndexVar;
use hashbrown::HashSet;

fn is_zeroed(expr: &IndexExpr, zeroed: &[IndexExpr]) -> bool {
    zeroed.iter().any(|z| equals(Some(expr), Some(z)))
}

/// Rewrites `expr` so every `Access` structurally equal to a member of
/// `zeroed` becomes undefined, then propagates that undefinedness: `Add`
/// and `Sub` tolerate one undefined operand (the zero element), `Mul` and
/// `Div` propagate undefinedness from either operand. Returns `None` when
/// the whole expression collapses. Unmodified subtrees are reused by
/// `Arc` identity, never re-cloned.
pub fn simplify(expr: &IndexExpr, zeroed: &[IndexExpr]) -> Option<IndexExpr> {
    if is_zeroed(expr, zeroed) {
        log::trace!("simplify: zeroing access node directly");
        return None;
    }
    match expr.node() {
        ExprNode::Access(..) => Some(expr.clone()),
        ExprNode::Neg(a) => simplify(a, zeroed).map(|a2| rebuild_unary(expr, a, &a2, IndexExpr::neg)),
        ExprNode::Sqrt(a) => simplify(a, zeroed).map(|a2| rebuild_unary(expr, a, &a2, IndexExpr::sqrt)),
        ExprNode::Add(a, b) => simplify_disjunctive(expr, a, b, zeroed, IndexExpr::add),
        ExprNode::Sub(a, b) => simplify_disjunctive(expr, a, b, zeroed, IndexExpr::sub),
        ExprNode::Mul(a, b) => simplify_conjunctive(expr, a, b, zeroed, IndexExpr::mul),
        ExprNode::Div(a, b) => simplify_conjunctive(expr, a, b, zeroed, IndexExpr::div),
        ExprNode::Reduction(op, var, body) => simplify(body, zeroed).map(|body2| {
            if IndexExpr::ptr_eq(body, &body2) {
                expr.clone()
            } else {
                IndexExpr::reduction(*op, var.clone(), body2)
            }
        }),
        ExprNode::IntImm(_) | ExprNode::UIntImm(_) | ExprNode::FloatImm(_) | ExprNode::ComplexImm(_) => {
            Some(expr.clone())
        }
    }
}

fn rebuild_unary(
    expr: &IndexExpr,
    original_child: &IndexExpr,
    new_child: &IndexExpr,
    ctor: fn(IndexExpr) -> IndexExpr,
) -> IndexExpr {
    if IndexExpr::ptr_eq(original_child, new_child) {
        expr.clone()
    } else {
        ctor(new_child.clone())
    }
}

fn simplify_disjunctive(
    expr: &IndexExpr,
    a: &IndexExpr,
    b: &IndexExpr,
    zeroed: &[IndexExpr],
    ctor: fn(IndexExpr, IndexExpr) -> IndexExpr,
) -> Option<IndexExpr> {
    let a2 = simplify(a, zeroed);
    let b2 = simplify(b, zeroed);
    match (a2, b2) {
        (None, None) => None,
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (Some(x), Some(y)) => {
            if IndexExpr::ptr_eq(a, &x) && IndexExpr::ptr_eq(b, &y) {
                Some(expr.clone())
            } else {
                Some(ctor(x, y))
            }
        }
    }
}

fn simplify_conjunctive(
    expr: &IndexExpr,
    a: &IndexExpr,
    b: &IndexExpr,
    zeroed: &[IndexExpr],
    ctor: fn(IndexExpr, IndexExpr) -> IndexExpr,
) -> Option<IndexExpr> {
    let a2 = simplify(a, zeroed)?;
    let b2 = simplify(b, zeroed)?;
    if IndexExpr::ptr_eq(a, &a2) && IndexExpr::ptr_eq(b, &b2) {
        Some(expr.clone())
    } else {
        Some(ctor(a2, b2))
    }
}

/// Normalizes `expr` into einsum form under the given free set: rejects
/// (returns `None`) expressions that are not einsum-eligible (§ analysis);
/// otherwise wraps every `IndexVar` occurring in the expression but absent
/// from `free` inside a `Reduction`, per term when the top level is a
/// sum/difference, so summation binds per the Einstein convention rather
/// than once over the whole expression.
pub fn einsum(expr: &IndexExpr, free: &[IndexVar]) -> Option<IndexExpr> {
    if !is_einsum_eligible(expr) {
        log::debug!("einsum: expression is not einsum-eligible, declining normalization");
        return None;
    }
    Some(einsum_normalize(expr, free))
}

fn einsum_normalize(expr: &IndexExpr, free: &[IndexVar]) -> IndexExpr {
    match expr.node() {
        ExprNode::Add(a, b) => rebuild_sum_term(expr, a, b, free, IndexExpr::add),
        ExprNode::Sub(a, b) => rebuild_sum_term(expr, a, b, free, IndexExpr::sub),
        _ => wrap_term(expr, free),
    }
}

fn rebuild_sum_term(
    expr: &IndexExpr,
    a: &IndexExpr,
    b: &IndexExpr,
    free: &[IndexVar],
    ctor: fn(IndexExpr, IndexExpr) -> IndexExpr,
) -> IndexExpr {
    let a2 = einsum_normalize(a, free);
    let b2 = einsum_normalize(b, free);
    if IndexExpr::ptr_eq(a, &a2) && IndexExpr::ptr_eq(b, &b2) {
        expr.clone()
    } else {
        ctor(a2, b2)
    }
}

/// Wraps a single product-or-access term: every var occurring in the term
/// but not in `free` is bound by a `Reduction`, outermost wrap last in
/// occurrence order so the innermost reduction binds the term's first
/// occurring non-free var.
fn wrap_term(term: &IndexExpr, free: &[IndexVar]) -> IndexExpr {
    let occurrence = get_index_vars(term);
    let free_set: HashSet<&IndexVar> = free.iter().collect();
    let mut result = term.clone();
    for v in occurrence {
        if !free_set.contains(&v) {
            result = IndexExpr::sum(v, result);
        }
    }
    result
}

/// Unwraps a chain of `Reduction` nodes, returning the bound vars
/// (outermost first) and the innermost body. Exposed for tests and for
/// callers that need to inspect einsum-normalized output.
pub fn unwrap_reductions(expr: &IndexExpr) -> (Vec<(ReduceOp, IndexVar)>, IndexExpr) {
    let mut bound = Vec::new();
    let mut current = expr.clone();
    loop {
        let next = match current.node() {
            ExprNode::Reduction(op, var, body) => {
                bound.push((*op, var.clone()));
                Some(body.clone())
            }
            _ => None,
        };
        match next {
            Some(body) => current = body,
            None => break,
        }
    }
    (bound, current)
}
