//! Integration tests for the end-to-end scenarios in spec.md §8 (S1-S6):
//! matmul einsum, vector add, rejected transpose, zero propagation,
//! reassignment, and an ill-formed scalar assignment. Each scenario builds
//! its tensors and expressions through the crate's public surface only.

use tensorix::{
    assign, dtype::DType, einsum, equals, format::{Dim, Format, Shape}, simplify, verify,
    verify_tensor, IndexExpr, IndexVar, TensorVar, UserError,
};

fn init() {
    let _ = env_logger::try_init();
}

fn matrix(name: &str, m: u64, n: u64) -> TensorVar {
    TensorVar::new(
        name,
        DType::F64,
        Shape::new(vec![Dim::Fixed(m), Dim::Fixed(n)]),
        Format::dense_row_major(2),
    )
}

fn vector(name: &str, n: u64) -> TensorVar {
    TensorVar::new(
        name,
        DType::F64,
        Shape::new(vec![Dim::Fixed(n)]),
        Format::dense_row_major(1),
    )
}

/// S1: C(i,k) = A(i,j) * B(j,k); after assignment, verify holds and the
/// einsum-normalized form wraps `j` in a single sum reduction.
#[test]
fn s1_matmul_einsum() {
    init();
    let a = matrix("A", 3, 4);
    let b = matrix("B", 4, 5);
    let c = matrix("C", 3, 5);
    let i = IndexVar::new("i");
    let j = IndexVar::new("j");
    let k = IndexVar::new("k");

    let expr = IndexExpr::mul(
        IndexExpr::access(a.clone(), vec![i.clone(), j.clone()]).unwrap(),
        IndexExpr::access(b.clone(), vec![j.clone(), k.clone()]).unwrap(),
    );

    assign(&c, vec![i.clone(), k.clone()], expr.clone(), false).unwrap();
    assert!(verify_tensor(&c));

    let normalized = einsum(&expr, &[i, k]).expect("matmul body is einsum-eligible");
    let (bound, body) = tensorix::unwrap_reductions(&normalized);
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].1.name(), "j");
    assert!(equals(Some(&body), Some(&expr)));
}

/// S2: y(i) = x(i) + z(i); einsum is eligible and a no-op (no var to
/// reduce, since every index var appears in the free set).
#[test]
fn s2_vector_add_einsum_noop() {
    init();
    let x = vector("x", 8);
    let z = vector("z", 8);
    let y = vector("y", 8);
    let i = IndexVar::new("i");

    let expr = IndexExpr::add(
        IndexExpr::access(x, vec![i.clone()]).unwrap(),
        IndexExpr::access(z, vec![i.clone()]).unwrap(),
    );

    assign(&y, vec![i.clone()], expr.clone(), false).unwrap();
    assert!(verify_tensor(&y));

    let normalized = einsum(&expr, &[i]).expect("vector add is einsum-eligible");
    assert!(IndexExpr::ptr_eq(&expr, &normalized), "no var to reduce: must be the identical node");
}

/// S3: B(j,i) = A(i,j) with both tensors row-major dense: assignment fails
/// with a transposition error, since the access's index order disagrees
/// with the result's free-index (and hence mode) order.
#[test]
fn s3_transpose_rejected() {
    init();
    let a = matrix("A", 4, 5);
    let b = matrix("B", 5, 4);
    let i = IndexVar::new("i");
    let j = IndexVar::new("j");

    let expr = IndexExpr::access(a, vec![i.clone(), j.clone()]).unwrap();
    let result = assign(&b, vec![j, i], expr, false);
    assert!(matches!(result, Err(UserError::UnsupportedTransposition { .. })));
}

/// S4: e = A(i,j)*B(j,k) + A(i,j)*C(j,k). Zeroing {A(i,j)} collapses the
/// whole expression (every term multiplies by the zeroed access); zeroing
/// {C(j,k)} leaves only the A*B term.
#[test]
fn s4_zero_propagation() {
    init();
    let a = matrix("A", 2, 3);
    let b = matrix("B", 3, 4);
    let c = matrix("C", 3, 4);
    let i = IndexVar::new("i");
    let j = IndexVar::new("j");
    let k = IndexVar::new("k");

    let acc_a = IndexExpr::access(a, vec![i.clone(), j.clone()]).unwrap();
    let acc_b = IndexExpr::access(b, vec![j.clone(), k.clone()]).unwrap();
    let acc_c = IndexExpr::access(c, vec![j.clone(), k.clone()]).unwrap();

    let e = IndexExpr::add(
        IndexExpr::mul(acc_a.clone(), acc_b.clone()),
        IndexExpr::mul(acc_a.clone(), acc_c.clone()),
    );

    assert!(simplify(&e, std::slice::from_ref(&acc_a)).is_none());

    let simplified = simplify(&e, std::slice::from_ref(&acc_c)).expect("A*B term survives");
    let expected = IndexExpr::mul(acc_a, acc_b);
    assert!(equals(Some(&simplified), Some(&expected)));
}

/// S5: after S1 succeeds, a second assignment to the same tensor fails
/// with a reassignment error, even though it would otherwise be
/// dimensionally consistent.
#[test]
fn s5_reassignment_rejected() {
    init();
    let a = matrix("A", 3, 4);
    let b = matrix("B", 4, 5);
    let c = matrix("C", 3, 5);
    let i = IndexVar::new("i");
    let j = IndexVar::new("j");
    let k = IndexVar::new("k");

    let first = IndexExpr::mul(
        IndexExpr::access(a.clone(), vec![i.clone(), j.clone()]).unwrap(),
        IndexExpr::access(b.clone(), vec![j.clone(), k.clone()]).unwrap(),
    );
    assign(&c, vec![i.clone(), k.clone()], first, false).unwrap();

    let second = IndexExpr::add(
        IndexExpr::access(a, vec![i.clone(), k.clone()]).unwrap(),
        IndexExpr::access(b, vec![k.clone(), k.clone()]).unwrap(),
    );
    let result = assign(&c, vec![i, k], second, false);
    assert!(matches!(result, Err(UserError::Reassignment { .. })));
}

/// S6: c = A(i,j) * B(j,k) assigned to a scalar `c` with an empty free
/// set: `i` and `k` are unbound, so verification (and the assignment
/// protocol) must fail, naming both.
#[test]
fn s6_ill_formed_scalar_assignment() {
    init();
    let a = matrix("A", 3, 4);
    let b = matrix("B", 4, 5);
    let c = TensorVar::new("c", DType::F64, Shape::scalar(), Format::new(vec![], vec![], true));
    let i = IndexVar::new("i");
    let j = IndexVar::new("j");
    let k = IndexVar::new("k");

    let expr = IndexExpr::mul(
        IndexExpr::access(a, vec![i.clone(), j.clone()]).unwrap(),
        IndexExpr::access(b, vec![j, k.clone()]).unwrap(),
    );

    assert!(!verify(&expr, &[]));

    match assign(&c, vec![], expr, false) {
        Err(UserError::IllFormedAssignment { unbound, .. }) => {
            assert!(unbound.contains(&"i".to_string()));
            assert!(unbound.contains(&"k".to_string()));
        }
        other => panic!("expected IllFormedAssignment, got {:?}", other),
    }
}

/// Testable property 7 (spec.md §8): the accumulate flag round-trips
/// through the assignment protocol — `y(i) += x(i)` records `accumulate
/// == true` on the bound tensor, not just the non-accumulating default
/// exercised by S1-S6 above.
#[test]
fn accumulate_flag_round_trips() {
    init();
    let x = vector("x", 4);
    let y = vector("y", 4);
    let i = IndexVar::new("i");

    let expr = IndexExpr::access(x, vec![i.clone()]).unwrap();
    assign(&y, vec![i], expr, true).unwrap();

    assert!(y.assignment().unwrap().accumulate);
}
