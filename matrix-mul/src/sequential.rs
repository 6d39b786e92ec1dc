//! Single-threaded reference multiplication.

use crate::matrix::check_dimensions;
use crate::{Error, Matrix};

/// Plain triple-loop `a x b`, used as the correctness and timing baseline.
pub fn multiply(a: &Matrix, b: &Matrix) -> Result<Matrix, Error> {
    check_dimensions(a, b)?;

    let (n, m) = a.shape();
    let p = b.cols();
    let mut c = Vec::with_capacity(n * p);
    for i in 0..n {
        for j in 0..p {
            let mut sum = 0.0f32;
            for k in 0..m {
                sum += a.as_slice()[i * m + k] * b.as_slice()[k * p + j];
            }
            c.push(sum);
        }
    }
    Matrix::new(n, p, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_by_two() {
        let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let b = Matrix::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]]).unwrap();
        let c = multiply(&a, &b).unwrap();
        assert_eq!(c.to_rows(), vec![vec![19.0, 22.0], vec![43.0, 50.0]]);
    }

    #[test]
    fn test_rectangular() {
        let a = Matrix::from_rows(vec![vec![1.0, 2.0, 3.0]]).unwrap();
        let b = Matrix::from_rows(vec![vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        assert_eq!(multiply(&a, &b).unwrap().to_rows(), vec![vec![14.0]]);
        assert_eq!(multiply(&b, &a).unwrap().shape(), (3, 3));
    }

    #[test]
    fn test_empty_inner_dimension() {
        let a = Matrix::zeros(2, 0);
        let b = Matrix::zeros(0, 3);
        assert_eq!(multiply(&a, &b).unwrap(), Matrix::zeros(2, 3));
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = Matrix::zeros(2, 3);
        assert!(matches!(
            multiply(&a, &a),
            Err(Error::DimensionMismatch(2, 3, 2, 3))
        ));
    }
}
