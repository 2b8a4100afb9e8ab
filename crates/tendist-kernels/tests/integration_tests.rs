//! Integration tests for the distributed kernels.
//!
//! Multi-rank scenarios run under the in-process SPMD harness, so the
//! full ring/collective paths are exercised by `cargo test`.

use std::sync::Arc;

use scirs2_core::ndarray_ext::Array2;
use tendist_comm::World;
use tendist_core::{Distribution, Tensor};
use tendist_kernels::{gather, gram, scatter, ttm};

fn assert_close(got: &[f64], want: &[f64], tol: f64) {
    assert_eq!(got.len(), want.len());
    for (i, (g, w)) in got.iter().zip(want.iter()).enumerate() {
        assert!((g - w).abs() < tol, "element {i}: {g} vs {w}");
    }
}

#[test]
fn two_rank_ttm_with_identity_is_a_no_op() {
    // A is 4x2 split row-wise over two ranks; M = I_4 keeps it intact.
    World::spawn(2, |comm| {
        let dist = Arc::new(Distribution::cartesian(vec![2, 1], comm.clone()).unwrap());
        let mut a = Tensor::<f64>::distributed(&dist, &[4, 2]).unwrap();
        a.fill_with(|idx| (idx[0] * 2 + idx[1]) as f64).unwrap();

        let eye = Array2::from_shape_fn((4, 4), |(i, j)| if i == j { 1.0 } else { 0.0 });
        let m = Tensor::from_matrix(&eye, &comm);

        let y = ttm(&a, &m, 0).unwrap();
        assert_eq!(y.shape_global(), &[4, 2]);
        assert_eq!(y.shape(), a.shape());

        let full = gather(&y).unwrap();
        let expect: Vec<f64> = (0..8).map(|x| x as f64).collect();
        assert_close(full.data(), &expect, 1e-12);
    });
}

#[test]
fn distributed_ttm_commutes_with_gather() {
    // gather(ttm(A, M, n)) == ttm(gather(A), M, n) on every rank
    World::spawn(4, |comm| {
        let dist = Arc::new(Distribution::cartesian(vec![2, 2, 1], comm.clone()).unwrap());
        let shape = [5, 4, 3];
        let mut a = Tensor::<f64>::distributed(&dist, &shape).unwrap();
        a.fill_with(|idx| ((idx[0] * 31 + idx[1] * 7 + idx[2] * 3) % 13) as f64 - 6.0)
            .unwrap();

        let reference = gather(&a).unwrap();
        for mode in 0..3 {
            let m = Array2::from_shape_fn((3, shape[mode]), |(i, j)| {
                ((i + 2 * j) as f64) * 0.5 - 1.0
            });
            let m_t = Tensor::from_matrix(&m, &comm);

            let dist_result = gather(&ttm(&a, &m_t, mode).unwrap()).unwrap();
            let local_result = ttm(&reference, &m_t, mode).unwrap();
            assert_eq!(dist_result.shape_global(), local_result.shape_global());
            assert_close(dist_result.data(), local_result.data(), 1e-10);
        }
    });
}

#[test]
fn ttm_along_every_mode_of_a_three_way_grid() {
    World::spawn(8, |comm| {
        let dist = Arc::new(Distribution::cartesian(vec![2, 2, 2], comm.clone()).unwrap());
        let shape = [4, 5, 6];
        let mut a = Tensor::<f64>::distributed(&dist, &shape).unwrap();
        a.fill_with(|idx| ((idx[0] + idx[1] * idx[2]) as f64).cos()).unwrap();

        let reference = gather(&a).unwrap();
        for mode in 0..3 {
            let rows = 3;
            let m = Array2::from_shape_fn((rows, shape[mode]), |(i, j)| {
                ((i * shape[mode] + j) as f64).sin()
            });
            let m_t = Tensor::from_matrix(&m, &comm);

            let got = gather(&ttm(&a, &m_t, mode).unwrap()).unwrap();
            let want = ttm(&reference, &m_t, mode).unwrap();
            assert_close(got.data(), want.data(), 1e-9);
        }
    });
}

#[test]
fn gram_matches_gathered_matricization() {
    // Gram(A, n) == M M^T where M = gather(A) matricized along n
    World::spawn(4, |comm| {
        let dist = Arc::new(Distribution::cartesian(vec![2, 1, 2], comm.clone()).unwrap());
        let shape = [4, 3, 4];
        let mut a = Tensor::<f64>::distributed(&dist, &shape).unwrap();
        a.fill_with(|idx| ((idx[0] * 17 + idx[1] * 5 + idx[2]) % 7) as f64 - 3.0)
            .unwrap();

        let full = gather(&a).unwrap();
        for mode in 0..3 {
            let g = gram(&a, mode).unwrap();
            let m = tendist_kernels::tenmat(full.data(), full.shape(), mode).unwrap();
            let want = m.dot(&m.t());
            let want_flat: Vec<f64> = want.iter().copied().collect();
            assert_eq!(g.shape_global(), &[shape[mode], shape[mode]]);
            assert_close(g.data(), &want_flat, 1e-9);
        }
    });
}

#[test]
fn ttt_except_with_unequal_mode_extents() {
    // B has a different mode-0 extent: result is rectangular (4 x 2)
    World::spawn(2, |comm| {
        let dist = Arc::new(Distribution::cartesian(vec![2, 1], comm.clone()).unwrap());
        let mut a = Tensor::<f64>::distributed(&dist, &[4, 3]).unwrap();
        let mut b = Tensor::<f64>::distributed(&dist, &[2, 3]).unwrap();
        a.fill_with(|idx| (idx[0] * 3 + idx[1]) as f64).unwrap();
        b.fill_with(|idx| (idx[0] + idx[1]) as f64).unwrap();

        let g = tendist_kernels::ttt_except(&a, &b, 0).unwrap();
        assert_eq!(g.shape_global(), &[4, 2]);

        let fa = gather(&a).unwrap();
        let fb = gather(&b).unwrap();
        let ma = tendist_kernels::tenmat(fa.data(), fa.shape(), 0).unwrap();
        let mb = tendist_kernels::tenmat(fb.data(), fb.shape(), 0).unwrap();
        let want = ma.dot(&mb.t());
        let want_flat: Vec<f64> = want.iter().copied().collect();
        assert_close(g.data(), &want_flat, 1e-10);
    });
}

#[test]
fn scatter_is_left_inverse_to_gather() {
    World::spawn(6, |comm| {
        let dist = Arc::new(Distribution::cartesian(vec![2, 3, 1], comm.clone()).unwrap());
        let mut a = Tensor::<f64>::distributed(&dist, &[6, 6, 6]).unwrap();
        let rank = comm.rank();
        a.fill_with(|idx| (idx[0] * 36 + idx[1] * 6 + idx[2] + rank) as f64)
            .unwrap();

        let full = gather(&a).unwrap();
        let back = scatter(&full, &dist, 0).unwrap();
        assert_eq!(back.shape(), a.shape());
        assert_eq!(back.data(), a.data());
    });
}

#[test]
fn fnorm_squared_equals_sum_of_squares_on_every_rank() {
    World::spawn(4, |comm| {
        let dist = Arc::new(Distribution::cartesian(vec![4], comm.clone()).unwrap());
        let mut a = Tensor::<f64>::distributed(&dist, &[9]).unwrap();
        a.fill_with(|idx| idx[0] as f64).unwrap();

        let norm = a.fnorm().unwrap();
        let want: f64 = (0..9).map(|x| (x * x) as f64).sum::<f64>().sqrt();
        assert!((norm - want).abs() < 1e-12);
    });
}
