//! The assignment protocol: `result(free...) = expr` / `+= expr`.
//!
//! Grounded on nanoda's `env::Declaration::declaration_check`, which runs
//! every validating assertion before a declaration is accepted into the
//! environment; here the equivalent discipline is an early-return
//! `Result` chain — if any check fails, nothing is recorded on `result`.

use crate::analysis::{
    dimension_conflicts, vars_without_reduction, verify, DefaultDimensionsTypecheck,
    DefaultDistributionCheck, DefaultTranspositionCheck, DimensionsTypecheck, DistributionCheck,
    TranspositionCheck,
};
use crate::error::{Result, UserError};
use crate::expr::IndexExpr;
use crate::ident::IndexVar;
use crate::pretty::render_assignment;
use crate::tensor::{Assignment, TensorVar};

/// Binds `expr` to `result` under the free-index list `free`, using the
/// default dimension/transposition/distribution checks. See
/// `assign_with` to supply custom collaborators.
pub fn assign(result: &TensorVar, free: Vec<IndexVar>, expr: IndexExpr, accumulate: bool) -> Result<()> {
    assign_with(
        &DefaultDimensionsTypecheck,
        &DefaultTranspositionCheck,
        &DefaultDistributionCheck,
        result,
        free,
        expr,
        accumulate,
    )
}

/// The assignment protocol, parameterized over the external-collaborator
/// checks (`dimensionsTypecheck`, transposition, distribution) so a
/// downstream lowering crate can supply its own. Runs, in order:
/// prior-assignment check, order/free-list arity, dimensional
/// type-check, well-formedness, transposition rejection, distribution
/// rejection — and records `(free, expr, accumulate)` only if every check
/// passes.
pub fn assign_with(
    dims: &dyn DimensionsTypecheck,
    transposition: &dyn TranspositionCheck,
    distribution: &dyn DistributionCheck,
    result: &TensorVar,
    free: Vec<IndexVar>,
    expr: IndexExpr,
    accumulate: bool,
) -> Result<()> {
    if result.has_assignment() {
        return Err(UserError::Reassignment { tensor: result.name() });
    }

    let order = result.order();
    if order == 0 && !free.is_empty() {
        return Err(UserError::ScalarWithFreeVars { tensor: result.name() });
    }
    if order > 0 && free.is_empty() {
        return Err(UserError::MissingFreeVars { tensor: result.name(), order });
    }
    if order > 0 && free.len() != order {
        return Err(UserError::FreeVarArityMismatch {
            tensor: result.name(),
            order,
            given: free.len(),
        });
    }

    if !dims.check(&free, &result.name(), &expr, result.shape()) {
        let conflict = dimension_conflicts(&free, &result.name(), &expr, result.shape())
            .into_iter()
            .next()
            .expect("check() reported inconsistency but no conflict was found");
        return Err(UserError::DimensionalMismatch {
            var: conflict.var.name(),
            lhs: conflict.first_source,
            lhs_dim: conflict.first_dim,
            rhs: conflict.second_source,
            rhs_dim: conflict.second_dim,
        });
    }

    if !verify(&expr, &free) {
        let allowed: hashbrown::HashSet<&IndexVar> = free.iter().collect();
        let unbound: Vec<String> = vars_without_reduction(&expr)
            .iter()
            .filter(|v| !allowed.contains(v))
            .map(|v| v.name())
            .collect();
        let rendered = render_assignment(result, &free, &expr, accumulate);
        return Err(UserError::IllFormedAssignment { rendered, unbound });
    }

    if transposition.is_transposition(&free, &expr, result.format()) {
        return Err(UserError::UnsupportedTransposition {
            tensor: result.name(),
            result_mode_order: result.format().mode_order().to_vec(),
            source_mode_order: source_mode_order(&expr),
        });
    }

    if let Some(var) = distribution.find_undistributed(&free, &expr) {
        return Err(UserError::UnsupportedDistribution {
            tensor: result.name(),
            var: var.name(),
        });
    }

    log::debug!(
        "recording assignment: {}",
        render_assignment(result, &free, &expr, accumulate)
    );
    result.record_assignment(Assignment { free, expr, accumulate });
    Ok(())
}

fn source_mode_order(expr: &IndexExpr) -> Vec<usize> {
    match expr.node() {
        crate::expr::ExprNode::Access(tensor, _) => tensor.format().mode_order().to_vec(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use crate::format::{Dim, Format, Shape};

    fn mat(name: &str, m: u64, n: u64) -> TensorVar {
        TensorVar::new(name, DType::F64, Shape::new(vec![Dim::Fixed(m), Dim::Fixed(n)]), Format::dense_row_major(2))
    }

    fn vec_(name: &str, n: u64) -> TensorVar {
        TensorVar::new(name, DType::F64, Shape::new(vec![Dim::Fixed(n)]), Format::dense_row_major(1))
    }

    // S1: matmul einsum assignment succeeds and verifies.
    #[test]
    fn matmul_assignment_succeeds() {
        let a = mat("A", 2, 3);
        let b = mat("B", 3, 4);
        let c = mat("C", 2, 4);
        let i = IndexVar::new("i");
        let j = IndexVar::new("j");
        let k = IndexVar::new("k");
        let expr = IndexExpr::mul(
            IndexExpr::access(a, vec![i.clone(), j.clone()]).unwrap(),
            IndexExpr::access(b, vec![j, k.clone()]).unwrap(),
        );
        assign(&c, vec![i, k], expr, false).unwrap();
        assert!(crate::analysis::verify_tensor(&c));
    }

    // S2: vector add, no reduction needed.
    #[test]
    fn vector_add_assignment_succeeds() {
        let x = vec_("x", 4);
        let z = vec_("z", 4);
        let y = vec_("y", 4);
        let i = IndexVar::new("i");
        let expr = IndexExpr::add(
            IndexExpr::access(x, vec![i.clone()]).unwrap(),
            IndexExpr::access(z, vec![i.clone()]).unwrap(),
        );
        assign(&y, vec![i], expr, false).unwrap();
        assert!(y.has_assignment());
    }

    // S3: transpose rejected when both tensors are row-major dense.
    #[test]
    fn transpose_assignment_is_rejected() {
        let a = mat("A", 2, 3);
        let b = mat("B", 3, 2);
        let i = IndexVar::new("i");
        let j = IndexVar::new("j");
        let expr = IndexExpr::access(a, vec![i.clone(), j.clone()]).unwrap();
        let result = assign(&b, vec![j, i], expr, false);
        assert!(matches!(result, Err(UserError::UnsupportedTransposition { .. })));
    }

    // S4 is exercised in transform.rs; S5 here:
    #[test]
    fn reassignment_is_rejected() {
        let a = mat("A", 2, 2);
        let b = mat("B", 2, 2);
        let c = mat("C", 2, 2);
        let i = IndexVar::new("i");
        let j = IndexVar::new("j");
        let expr1 = IndexExpr::add(
            IndexExpr::access(a.clone(), vec![i.clone(), j.clone()]).unwrap(),
            IndexExpr::access(b.clone(), vec![i.clone(), j.clone()]).unwrap(),
        );
        assign(&c, vec![i.clone(), j.clone()], expr1, false).unwrap();
        let expr2 = IndexExpr::add(
            IndexExpr::access(a, vec![i.clone(), j.clone()]).unwrap(),
            IndexExpr::access(b, vec![i.clone(), j.clone()]).unwrap(),
        );
        let result = assign(&c, vec![i, j], expr2, false);
        assert!(matches!(result, Err(UserError::Reassignment { .. })));
    }

    // S6: scalar assignment with unbound free vars is ill-formed.
    #[test]
    fn ill_formed_assignment_names_unbound_vars() {
        let a = mat("A", 2, 3);
        let b = mat("B", 3, 2);
        let c = TensorVar::new("c", DType::F64, Shape::scalar(), Format::new(vec![], vec![], true));
        let i = IndexVar::new("i");
        let j = IndexVar::new("j");
        let expr = IndexExpr::mul(
            IndexExpr::access(a, vec![i.clone(), j.clone()]).unwrap(),
            IndexExpr::access(b, vec![j, i.clone()]).unwrap(),
        );
        let result = assign(&c, vec![], expr, false);
        match result {
            Err(UserError::IllFormedAssignment { unbound, .. }) => {
                assert!(unbound.contains(&"i".to_string()));
            }
            other => panic!("expected IllFormedAssignment, got {:?}", other),
        }
    }

    #[test]
    fn scalar_result_rejects_nonempty_free_list() {
        let c = TensorVar::new("c", DType::F64, Shape::scalar(), Format::new(vec![], vec![], true));
        let i = IndexVar::new("i");
        let result = assign(&c, vec![i], IndexExpr::int(1), false);
        assert!(matches!(result, Err(UserError::ScalarWithFreeVars { .. })));
    }

    #[test]
    fn nonscalar_result_requires_free_list() {
        let v = vec_("v", 4);
        let result = assign(&v, vec![], IndexExpr::int(1), false);
        assert!(matches!(result, Err(UserError::MissingFreeVars { .. })));
    }

    #[test]
    fn free_list_length_must_match_result_order() {
        // `c` is order-2 but only one free var is supplied: every shape
        // position must get exactly one free var, per getIndexVarRanges's
        // 1:1 contract between `free` and the result's shape.
        let a = mat("A", 2, 2);
        let c = mat("c", 2, 2);
        let i = IndexVar::new("i");
        let expr = IndexExpr::access(a, vec![i.clone(), i.clone()]).unwrap();
        let result = assign(&c, vec![i], expr, false);
        assert!(matches!(result, Err(UserError::FreeVarArityMismatch { order: 2, given: 1, .. })));
    }

    #[test]
    fn distribution_pattern_is_rejected() {
        // free var j appears on the result but no access produces it.
        let a = vec_("a", 4);
        let out = mat("out", 4, 4);
        let i = IndexVar::new("i");
        let j = IndexVar::new("j");
        let expr = IndexExpr::access(a, vec![i.clone()]).unwrap();
        let result = assign(&out, vec![i, j], expr, false);
        assert!(matches!(result, Err(UserError::UnsupportedDistribution { .. })));
    }
}
