//! Dense row-major `f32` matrix.

use std::ops::Range;

use rand::Rng;

use crate::Error;

/// A dense `rows x cols` matrix of `f32`, stored row-major in one buffer.
///
/// Matrices are shared read-only between workers through `Arc<Matrix>`;
/// nothing in this crate mutates an input matrix once it is built.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Wraps a flat row-major buffer.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, Error> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(Error::ShapeMismatch {
                rows,
                cols,
                found: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Builds a matrix from nested rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, Error> {
        let cols = rows.first().map_or(0, |row| row.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(Error::RaggedRows {
                    row: i,
                    expected: cols,
                    found: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Fills a matrix with values drawn uniformly from `[-1, 1)`.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let data = (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows && col < self.cols {
            Some(self.data[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Contiguous slice covering the given rows.
    pub fn row_range(&self, rows: Range<usize>) -> &[f32] {
        &self.data[rows.start * self.cols..rows.end * self.cols]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        (0..self.rows).map(|i| self.row(i).to_vec()).collect()
    }

    /// Copies a row-major block into this matrix starting at `start_row`.
    pub(crate) fn copy_rows_from(&mut self, start_row: usize, block: &[f32]) {
        let offset = start_row * self.cols;
        self.data[offset..offset + block.len()].copy_from_slice(block);
    }
}

/// Checks that `a` and `b` can be multiplied as `a x b`.
pub fn check_dimensions(a: &Matrix, b: &Matrix) -> Result<(), Error> {
    if a.cols() != b.rows() {
        return Err(Error::DimensionMismatch(a.rows(), a.cols(), b.rows(), b.cols()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_from_rows() {
        let m = Matrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.row(1), &[4.0, 5.0, 6.0]);
        assert_eq!(m.get(0, 2), Some(3.0));
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.to_rows(), vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err,
            Error::RaggedRows {
                row: 1,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_empty() {
        let m = Matrix::from_rows(Vec::new()).unwrap();
        assert_eq!(m.shape(), (0, 0));
        assert!(m.as_slice().is_empty());
    }

    #[test]
    fn test_new_checks_length() {
        assert!(Matrix::new(2, 2, vec![0.0; 4]).is_ok());
        assert!(matches!(
            Matrix::new(2, 2, vec![0.0; 3]),
            Err(Error::ShapeMismatch { found: 3, .. })
        ));
    }

    #[test]
    fn test_identity_and_row_range() {
        let m = Matrix::identity(3);
        assert_eq!(m.row_range(1..3), &[0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(m.row_range(2..2).is_empty());
    }

    #[test]
    fn test_random_is_seeded() {
        let a = Matrix::random(4, 5, &mut StdRng::seed_from_u64(7));
        let b = Matrix::random(4, 5, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.as_slice().iter().all(|v| (-1.0..1.0).contains(v)));
    }

    #[test]
    fn test_check_dimensions() {
        let a = Matrix::zeros(2, 3);
        assert!(check_dimensions(&a, &Matrix::zeros(3, 4)).is_ok());
        assert!(matches!(
            check_dimensions(&a, &Matrix::zeros(2, 3)),
            Err(Error::DimensionMismatch(2, 3, 2, 3))
        ));
    }
}
