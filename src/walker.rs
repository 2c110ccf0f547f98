//! Traversal framework: a strict (exhaustive) visitor and a rewriter that
//! rebuilds subtrees only where they actually changed.
//!
//! Grounded directly on nanoda's `Expr::replace_expr_core`, which recurses
//! through a closure `f: Fn(&Expr) -> Option<Expr>` and, when `f` declines
//! (`None`), rebuilds the current node from its rewritten children,
//! returning the original `Expr` clone when nothing below changed. This
//! module promotes that one hand-written function into a pair of traits so
//! any analysis or transform gets the same dispatch and reuse discipline
//! for free.

use crate::dtype::Complex64;
use crate::expr::{ExprNode, IndexExpr, ReduceOp};
use crate::ident::IndexVar;
use crate::tensor::TensorVar;

/// Exhaustive dispatch over every `ExprNode` variant. Implementors must
/// handle every variant (there is no catch-all default), matching the
/// spec's requirement that strict visitors be total.
pub trait Visitor<R> {
    fn visit_access(&mut self, tensor: &TensorVar, indices: &[IndexVar]) -> R;
    fn visit_neg(&mut self, a: &IndexExpr) -> R;
    fn visit_sqrt(&mut self, a: &IndexExpr) -> R;
    fn visit_add(&mut self, a: &IndexExpr, b: &IndexExpr) -> R;
    fn visit_sub(&mut self, a: &IndexExpr, b: &IndexExpr) -> R;
    fn visit_mul(&mut self, a: &IndexExpr, b: &IndexExpr) -> R;
    fn visit_div(&mut self, a: &IndexExpr, b: &IndexExpr) -> R;
    fn visit_reduction(&mut self, op: ReduceOp, var: &IndexVar, body: &IndexExpr) -> R;
    fn visit_int_imm(&mut self, v: i64) -> R;
    fn visit_uint_imm(&mut self, v: u64) -> R;
    fn visit_float_imm(&mut self, v: f64) -> R;
    fn visit_complex_imm(&mut self, v: Complex64) -> R;

    /// Dispatches on `expr`'s variant, depth-first pre-order: the caller's
    /// `visit_*` method runs before (and is responsible for) recursing into
    /// children, if the analysis needs to.
    fn visit(&mut self, expr: &IndexExpr) -> R {
        match expr.node() {
            ExprNode::Access(tensor, indices) => self.visit_access(tensor, indices),
            ExprNode::Neg(a) => self.visit_neg(a),
            ExprNode::Sqrt(a) => self.visit_sqrt(a),
            ExprNode::Add(a, b) => self.visit_add(a, b),
            ExprNode::Sub(a, b) => self.visit_sub(a, b),
            ExprNode::Mul(a, b) => self.visit_mul(a, b),
            ExprNode::Div(a, b) => self.visit_div(a, b),
            ExprNode::Reduction(op, var, body) => self.visit_reduction(*op, var, body),
            ExprNode::IntImm(v) => self.visit_int_imm(*v),
            ExprNode::UIntImm(v) => self.visit_uint_imm(*v),
            ExprNode::FloatImm(v) => self.visit_float_imm(*v),
            ExprNode::ComplexImm(v) => self.visit_complex_imm(*v),
        }
    }
}

/// A rewriter that produces a replacement `IndexExpr`.
///
/// `rewrite` is the hook: return `Some(replacement)` to substitute a node
/// outright, or `None` to let `apply`'s default recurse into children and
/// rebuild. `apply` reuses the original child handle (by `Arc` pointer,
/// via `IndexExpr::ptr_eq`) whenever rewriting a child returns the
/// identical sub-expression, so unmodified subtrees are never re-cloned.
/// Traversal is depth-first post-order: children are rewritten before the
/// parent is rebuilt.
pub trait Rewriter {
    fn rewrite(&mut self, expr: &IndexExpr) -> Option<IndexExpr> {
        let _ = expr;
        None
    }

    fn apply(&mut self, expr: &IndexExpr) -> IndexExpr {
        if let Some(replacement) = self.rewrite(expr) {
            return replacement;
        }
        match expr.node() {
            ExprNode::Access(..)
            | ExprNode::IntImm(_)
            | ExprNode::UIntImm(_)
            | ExprNode::FloatImm(_)
            | ExprNode::ComplexImm(_) => expr.clone(),
            ExprNode::Neg(a) => {
                let a2 = self.apply(a);
                if IndexExpr::ptr_eq(a, &a2) {
                    expr.clone()
                } else {
                    IndexExpr::neg(a2)
                }
            }
            ExprNode::Sqrt(a) => {
                let a2 = self.apply(a);
                if IndexExpr::ptr_eq(a, &a2) {
                    expr.clone()
                } else {
                    IndexExpr::sqrt(a2)
                }
            }
            ExprNode::Add(a, b) => self.rebuild_binary(expr, a, b, IndexExpr::add),
            ExprNode::Sub(a, b) => self.rebuild_binary(expr, a, b, IndexExpr::sub),
            ExprNode::Mul(a, b) => self.rebuild_binary(expr, a, b, IndexExpr::mul),
            ExprNode::Div(a, b) => self.rebuild_binary(expr, a, b, IndexExpr::div),
            ExprNode::Reduction(op, var, body) => {
                let body2 = self.apply(body);
                if IndexExpr::ptr_eq(body, &body2) {
                    expr.clone()
                } else {
                    IndexExpr::reduction(*op, var.clone(), body2)
                }
            }
        }
    }

    fn rebuild_binary(
        &mut self,
        expr: &IndexExpr,
        a: &IndexExpr,
        b: &IndexExpr,
        ctor: fn(IndexExpr, IndexExpr) -> IndexExpr,
    ) -> IndexExpr {
        let a2 = self.apply(a);
        let b2 = self.apply(b);
        if IndexExpr::ptr_eq(a, &a2) && IndexExpr::ptr_eq(b, &b2) {
            expr.clone()
        } else {
            ctor(a2, b2)
        }
    }
}

/// Non-strict, per-variant handlers; variants with no handler installed
/// are ignored (the "ignores the rest" convenience the spec describes).
#[derive(Default)]
pub struct ExprMatch<'a, R> {
    pub access: Option<Box<dyn FnMut(&TensorVar, &[IndexVar]) -> R + 'a>>,
    pub neg: Option<Box<dyn FnMut(&IndexExpr) -> R + 'a>>,
    pub sqrt: Option<Box<dyn FnMut(&IndexExpr) -> R + 'a>>,
    pub add: Option<Box<dyn FnMut(&IndexExpr, &IndexExpr) -> R + 'a>>,
    pub sub: Option<Box<dyn FnMut(&IndexExpr, &IndexExpr) -> R + 'a>>,
    pub mul: Option<Box<dyn FnMut(&IndexExpr, &IndexExpr) -> R + 'a>>,
    pub div: Option<Box<dyn FnMut(&IndexExpr, &IndexExpr) -> R + 'a>>,
    pub reduction: Option<Box<dyn FnMut(ReduceOp, &IndexVar, &IndexExpr) -> R + 'a>>,
    pub imm: Option<Box<dyn FnMut(&IndexExpr) -> R + 'a>>,
}

impl<'a, R> ExprMatch<'a, R> {
    pub fn new() -> Self {
        ExprMatch {
            access: None,
            neg: None,
            sqrt: None,
            add: None,
            sub: None,
            mul: None,
            div: None,
            reduction: None,
            imm: None,
        }
    }

    /// Runs the installed handler for `expr`'s variant, if any.
    pub fn run(&mut self, expr: &IndexExpr) -> Option<R> {
        match expr.node() {
            ExprNode::Access(tensor, indices) => {
                self.access.as_mut().map(|f| f(tensor, indices))
            }
            ExprNode::Neg(a) => self.neg.as_mut().map(|f| f(a)),
            ExprNode::Sqrt(a) => self.sqrt.as_mut().map(|f| f(a)),
            ExprNode::Add(a, b) => self.add.as_mut().map(|f| f(a, b)),
            ExprNode::Sub(a, b) => self.sub.as_mut().map(|f| f(a, b)),
            ExprNode::Mul(a, b) => self.mul.as_mut().map(|f| f(a, b)),
            ExprNode::Div(a, b) => self.div.as_mut().map(|f| f(a, b)),
            ExprNode::Reduction(op, var, body) => {
                self.reduction.as_mut().map(|f| f(*op, var, body))
            }
            ExprNode::IntImm(_)
            | ExprNode::UIntImm(_)
            | ExprNode::FloatImm(_)
            | ExprNode::ComplexImm(_) => self.imm.as_mut().map(|f| f(expr)),
        }
    }
}
