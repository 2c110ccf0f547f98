//! Deterministic infix printer, used only for diagnostics and tests.
//!
//! Grounded on nanoda's `pretty::pretty_printer::PrettyPrinter`'s
//! precedence-threading shape (a recursive printer that parenthesizes a
//! child only when its own precedence is looser than its parent's),
//! simplified away from that module's Wadler-style `Doc` line-wrapping
//! combinator library: nothing in this IR needs multi-line output, so the
//! printer here just builds a `String` directly.

use crate::expr::{ExprNode, IndexExpr};
use std::fmt;

/// Precedence groups, tightest first. A child is parenthesized iff its
/// own precedence is numerically greater (looser) than its parent's.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Atom,
    Unary,
    MulDiv,
    AddSub,
}

impl fmt::Display for IndexExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, Prec::AddSub)
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &IndexExpr, max_prec: Prec) -> fmt::Result {
    let prec = precedence(expr);
    let needs_parens = prec > max_prec;
    if needs_parens {
        write!(f, "(")?;
    }
    match expr.node() {
        ExprNode::Access(tensor, indices) => {
            write!(f, "{}(", tensor.name())?;
            for (i, v) in indices.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", v.name())?;
            }
            write!(f, ")")?;
        }
        ExprNode::Neg(a) => {
            write!(f, "-")?;
            write_expr(f, a, Prec::Unary)?;
        }
        ExprNode::Sqrt(a) => {
            write!(f, "sqrt(")?;
            write_expr(f, a, Prec::AddSub)?;
            write!(f, ")")?;
        }
        ExprNode::Add(a, b) => {
            write_expr(f, a, Prec::AddSub)?;
            write!(f, "+")?;
            write_expr(f, b, Prec::AddSub)?;
        }
        ExprNode::Sub(a, b) => {
            write_expr(f, a, Prec::AddSub)?;
            write!(f, "-")?;
            write_expr(f, b, Prec::AddSub)?;
        }
        ExprNode::Mul(a, b) => {
            write_expr(f, a, Prec::MulDiv)?;
            write!(f, "*")?;
            write_expr(f, b, Prec::MulDiv)?;
        }
        ExprNode::Div(a, b) => {
            write_expr(f, a, Prec::MulDiv)?;
            write!(f, "/")?;
            write_expr(f, b, Prec::MulDiv)?;
        }
        ExprNode::Reduction(op, var, body) => {
            write!(f, "{}({})(", op.symbol(), var.name())?;
            write_expr(f, body, Prec::AddSub)?;
            write!(f, ")")?;
        }
        ExprNode::IntImm(v) => write!(f, "{}", v)?,
        ExprNode::UIntImm(v) => write!(f, "{}", v)?,
        ExprNode::FloatImm(v) => write!(f, "{}", v)?,
        ExprNode::ComplexImm(v) => write!(f, "{}", v)?,
    }
    if needs_parens {
        write!(f, ")")?;
    }
    Ok(())
}

fn precedence(expr: &IndexExpr) -> Prec {
    match expr.node() {
        ExprNode::Access(..)
        | ExprNode::Reduction(..)
        | ExprNode::IntImm(_)
        | ExprNode::UIntImm(_)
        | ExprNode::FloatImm(_)
        | ExprNode::ComplexImm(_)
        | ExprNode::Sqrt(_) => Prec::Atom,
        ExprNode::Neg(_) => Prec::Unary,
        ExprNode::Mul(..) | ExprNode::Div(..) => Prec::MulDiv,
        ExprNode::Add(..) | ExprNode::Sub(..) => Prec::AddSub,
    }
}

/// Renders `result(free...) = expr` (or `+=` when `accumulate`), used in
/// the assignment protocol's well-formedness diagnostics.
pub fn render_assignment(
    result: &crate::tensor::TensorVar,
    free: &[crate::ident::IndexVar],
    expr: &IndexExpr,
    accumulate: bool,
) -> String {
    let names: Vec<String> = free.iter().map(|v| v.name()).collect();
    let op = if accumulate { "+=" } else { "=" };
    format!("{}({}) {} {}", result.name(), names.join(","), op, expr)
}
