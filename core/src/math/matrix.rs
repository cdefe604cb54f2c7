use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

pub struct MatrixHelper;

impl MatrixHelper {
    /// Multiply two 2D arrays.
    pub fn multiply(lhs: ArrayView2<f64>, rhs: ArrayView2<f64>) -> Array2<f64> {
        lhs.dot(&rhs)
    }

    /// Solves `a * x = b` with partially pivoted Gaussian elimination.
    ///
    /// Returns `None` for non-square or numerically singular systems.
    pub fn solve(a: ArrayView2<f64>, b: ArrayView1<f64>) -> Option<Array1<f64>> {
        let n = a.nrows();
        if a.ncols() != n || b.len() != n {
            return None;
        }

        let mut m = a.to_owned();
        let mut rhs = b.to_owned();

        for col in 0..n {
            let pivot = (col..n).max_by(|&i, &j| m[[i, col]].abs().total_cmp(&m[[j, col]].abs()))?;
            if m[[pivot, col]].abs() < 1e-12 {
                return None;
            }
            if pivot != col {
                for k in 0..n {
                    m.swap([col, k], [pivot, k]);
                }
                rhs.swap(col, pivot);
            }
            for row in (col + 1)..n {
                let factor = m[[row, col]] / m[[col, col]];
                if factor == 0.0 {
                    continue;
                }
                for k in col..n {
                    m[[row, k]] -= factor * m[[col, k]];
                }
                rhs[row] -= factor * rhs[col];
            }
        }

        let mut x = Array1::<f64>::zeros(n);
        for row in (0..n).rev() {
            let tail: f64 = ((row + 1)..n).map(|k| m[[row, k]] * x[k]).sum();
            x[row] = (rhs[row] - tail) / m[[row, row]];
        }
        Some(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn solve_recovers_known_solution() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![3.0, 5.0];
        let x = MatrixHelper::solve(a.view(), b.view()).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn solve_rejects_singular_matrix() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        assert!(MatrixHelper::solve(a.view(), b.view()).is_none());
    }

    #[test]
    fn multiply_matches_identity() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let id = Array2::<f64>::eye(2);
        assert_eq!(MatrixHelper::multiply(a.view(), id.view()), a);
    }
}
