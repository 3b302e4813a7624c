//! Dense symmetric eigen-decomposition (cyclic Jacobi rotations).
//!
//! Partitioned graphs are small (hundreds of waypoints), so a dense O(n^3)
//! sweep is fast enough and keeps results fully deterministic.

const MAX_SWEEPS: usize = 64;
const TOLERANCE: f64 = 1e-24;

/// Eigenvalues in ascending order with matching unit eigenvectors.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    /// Eigenvalues, ascending
    pub values: Vec<f64>,
    /// `vectors[k]` is the eigenvector of `values[k]`
    pub vectors: Vec<Vec<f64>>,
}

impl SymmetricEigen {
    /// Eigenvector of the k-th smallest eigenvalue.
    pub fn vector(&self, k: usize) -> Option<&[f64]> {
        self.vectors.get(k).map(Vec::as_slice)
    }
}

/// Decompose a symmetric matrix. Only the upper triangle symmetry is assumed,
/// not checked.
pub fn symmetric_eigen(matrix: &[Vec<f64>]) -> SymmetricEigen {
    let n = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    let scale: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().max(1.0);

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off <= TOLERANCE * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }

                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = if theta == 0.0 {
                    1.0
                } else {
                    theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt())
                };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (a[p][k], a[q][k]);
                    a[p][k] = c * pk - s * qk;
                    a[q][k] = s * pk + c * qk;
                }
                for row in v.iter_mut() {
                    let (kp, kq) = (row[p], row[q]);
                    row[p] = c * kp - s * kq;
                    row[q] = s * kp + c * kq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[i][i].total_cmp(&a[j][j]).then(i.cmp(&j)));

    let values = order.iter().map(|&k| a[k][k]).collect();
    let vectors = order
        .iter()
        .map(|&k| {
            let mut column: Vec<f64> = v.iter().map(|row| row[k]).collect();
            orient(&mut column);
            column
        })
        .collect();

    SymmetricEigen { values, vectors }
}

/// Fix the sign ambiguity: the largest-magnitude component is positive.
fn orient(vector: &mut [f64]) {
    let pivot = vector
        .iter()
        .copied()
        .fold(0.0_f64, |best, x| if x.abs() > best.abs() + 1e-12 { x } else { best });
    if pivot < 0.0 {
        vector.iter_mut().for_each(|x| *x = -*x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-7, "{a} != {b}");
    }

    #[test]
    fn diagonal_matrix() {
        let m = vec![vec![3.0, 0.0], vec![0.0, 1.0]];
        let eig = symmetric_eigen(&m);
        assert_close(eig.values[0], 1.0);
        assert_close(eig.values[1], 3.0);
        assert_close(eig.vectors[0][1].abs(), 1.0);
    }

    #[test]
    fn two_by_two() {
        // Eigenvalues 1 and 3, eigenvectors (1,-1)/sqrt2 and (1,1)/sqrt2
        let m = vec![vec![2.0, 1.0], vec![1.0, 2.0]];
        let eig = symmetric_eigen(&m);
        assert_close(eig.values[0], 1.0);
        assert_close(eig.values[1], 3.0);
        assert_close(eig.vectors[1][0], eig.vectors[1][1]);
        assert_close(eig.vectors[0][0], -eig.vectors[0][1]);
    }

    #[test]
    fn path_laplacian_fiedler_is_monotone() {
        // Laplacian of the path 0 - 1 - 2 - 3
        let m = vec![
            vec![1.0, -1.0, 0.0, 0.0],
            vec![-1.0, 2.0, -1.0, 0.0],
            vec![0.0, -1.0, 2.0, -1.0],
            vec![0.0, 0.0, -1.0, 1.0],
        ];
        let eig = symmetric_eigen(&m);
        assert_close(eig.values[0], 0.0);

        let fiedler = eig.vector(1).unwrap();
        let increasing = fiedler.windows(2).all(|w| w[0] < w[1]);
        let decreasing = fiedler.windows(2).all(|w| w[0] > w[1]);
        assert!(increasing || decreasing, "{fiedler:?}");
        // Ends have opposite signs
        assert!(fiedler[0] * fiedler[3] < 0.0);
    }

    #[test]
    fn eigenpairs_satisfy_definition() {
        let m = vec![
            vec![4.0, 1.0, 2.0],
            vec![1.0, 3.0, 0.5],
            vec![2.0, 0.5, 5.0],
        ];
        let eig = symmetric_eigen(&m);
        for (lambda, vector) in eig.values.iter().zip(&eig.vectors) {
            for i in 0..3 {
                let mv: f64 = (0..3).map(|j| m[i][j] * vector[j]).sum();
                assert_close(mv, lambda * vector[i]);
            }
        }
    }
}
