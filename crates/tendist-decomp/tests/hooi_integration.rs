//! End-to-end HOOI tests on synthetic low-multilinear-rank tensors.

use std::sync::Arc;

use scirs2_core::ndarray_ext::Array2;
use tendist_comm::World;
use tendist_core::{Distribution, Tensor};
use tendist_decomp::hooi_als;
use tendist_kernels::{scatter, ttm};

/// Orthonormal 4x2 factor built from two disjoint rotations.
fn planted_factor(theta: f64, phi: f64) -> Array2<f64> {
    let mut u = Array2::<f64>::zeros((4, 2));
    u[[0, 0]] = theta.cos();
    u[[1, 0]] = theta.sin();
    u[[2, 1]] = phi.cos();
    u[[3, 1]] = phi.sin();
    u
}

/// T = G ×₁ U₁ ×₂ U₂ ×₃ U₃ assembled on every rank.
fn planted_tensor(
    comm: &tendist_comm::Communicator,
    factors: &[Array2<f64>],
) -> Tensor<f64> {
    let mut core = Tensor::<f64>::replicated(&[2, 2, 2], comm);
    core.fill_with(|idx| 1.0 + (idx[0] * 4 + idx[1] * 2 + idx[2]) as f64)
        .unwrap();

    let mut full = core;
    for (mode, u) in factors.iter().enumerate() {
        let m = Tensor::from_matrix(u, comm);
        full = ttm(&full, &m, mode).unwrap();
    }
    full
}

fn subspace_distance(recovered: &Array2<f64>, truth: &Array2<f64>) -> f64 {
    // ‖U^⊤ U* U*^⊤ U − I‖_max over the rank-2 identity
    let overlap = recovered.t().dot(truth);
    let projected = overlap.dot(&overlap.t());
    let mut worst: f64 = 0.0;
    for i in 0..projected.nrows() {
        for j in 0..projected.ncols() {
            let want = if i == j { 1.0 } else { 0.0 };
            worst = worst.max((projected[[i, j]] - want).abs());
        }
    }
    worst
}

#[test]
fn recovers_planted_subspaces_on_two_ranks() {
    let outputs = World::spawn(2, |comm| {
        let truth = [
            planted_factor(0.3, 1.1),
            planted_factor(0.8, 0.2),
            planted_factor(1.4, 0.6),
        ];
        let full = planted_tensor(&comm, &truth);

        let dist = Arc::new(Distribution::cartesian(vec![2, 1, 1], comm.clone()).unwrap());
        let t = scatter(&full, &dist, 0).unwrap();

        let decomp = hooi_als(&t, &[2, 2, 2], 5).unwrap();
        for (u, u_true) in decomp.factors.iter().zip(truth.iter()) {
            let dist_to_truth = subspace_distance(u, u_true);
            assert!(dist_to_truth < 1e-8, "subspace distance {dist_to_truth}");
        }

        // the planted tensor is exactly rank (2,2,2): nothing left over
        let res = decomp.residual(&t).unwrap();
        let norm = t.fnorm().unwrap();
        assert!(res.abs() < 1e-6 * norm * norm, "residual {res}");

        // factors must agree bit-for-bit across ranks
        let mut flat: Vec<f64> = Vec::new();
        for u in &decomp.factors {
            flat.extend(u.iter().copied());
        }
        flat
    });
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn energy_never_decreases_across_sweeps() {
    World::spawn(4, |comm| {
        let dist = Arc::new(Distribution::cartesian(vec![2, 2, 1], comm.clone()).unwrap());
        let mut t = Tensor::<f64>::distributed(&dist, &[6, 6, 4]).unwrap();
        t.fill_with(|idx| {
            let lin = idx[0] * 24 + idx[1] * 4 + idx[2];
            ((lin * 37 % 101) as f64) / 101.0 - 0.5
        })
        .unwrap();

        let decomp = hooi_als(&t, &[3, 2, 2], 5).unwrap();
        for pair in decomp.energy.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-9, "{} then {}", pair[0], pair[1]);
        }

        // residual ‖X‖² − ‖G‖² stays non-negative
        let res = decomp.residual(&t).unwrap();
        assert!(res >= -1e-9);
    });
}

#[test]
fn core_partition_follows_the_grid() {
    World::spawn(2, |comm| {
        let dist = Arc::new(Distribution::cartesian(vec![2, 1, 1], comm.clone()).unwrap());
        let mut t = Tensor::<f64>::distributed(&dist, &[4, 4, 4]).unwrap();
        t.fill_with(|idx| (idx[0] + idx[1] + idx[2]) as f64).unwrap();

        let decomp = hooi_als(&t, &[3, 2, 2], 1).unwrap();
        assert_eq!(decomp.core.shape_global(), &[3, 2, 2]);
        // mode 0 of the core is split 2|1 over the two ranks
        let rows = decomp.core.shape()[0];
        assert_eq!(rows, if comm.rank() == 0 { 2 } else { 1 });
    });
}
