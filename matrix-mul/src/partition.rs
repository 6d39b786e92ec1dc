//! Row partitioning across workers.

use std::ops::Range;

use crate::Error;

/// A contiguous range of output rows assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub id: usize,
    pub start_row: usize,
    pub end_row: usize,
}

impl Partition {
    pub fn rows(&self) -> Range<usize> {
        self.start_row..self.end_row
    }

    pub fn len(&self) -> usize {
        self.end_row - self.start_row
    }

    pub fn is_empty(&self) -> bool {
        self.start_row == self.end_row
    }

    /// Number of `f32` values in this partition's block for a result of width `cols`.
    pub fn block_len(&self, cols: usize) -> usize {
        self.len() * cols
    }
}

/// Splits `rows` output rows into `workers` contiguous partitions.
///
/// The first `rows % workers` partitions get one extra row. When there are
/// more workers than rows the trailing partitions are empty; they are still
/// returned so that every worker id has a partition.
pub fn partition(rows: usize, workers: usize) -> Result<Vec<Partition>, Error> {
    if workers == 0 {
        return Err(Error::InvalidWorkerCount(workers));
    }

    let base = rows / workers;
    let remainder = rows % workers;

    let mut partitions = Vec::with_capacity(workers);
    let mut start_row = 0;
    for id in 0..workers {
        let len = base + usize::from(id < remainder);
        partitions.push(Partition {
            id,
            start_row,
            end_row: start_row + len,
        });
        start_row += len;
    }
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(rows: usize, parts: &[Partition]) {
        let mut next = 0;
        for (id, p) in parts.iter().enumerate() {
            assert_eq!(p.id, id);
            assert_eq!(p.start_row, next, "gap or overlap at partition {id}");
            assert!(p.start_row <= p.end_row);
            next = p.end_row;
        }
        assert_eq!(next, rows);
    }

    #[test]
    fn test_even_split() {
        let parts = partition(8, 4).unwrap();
        assert!(parts.iter().all(|p| p.len() == 2));
        assert_covers(8, &parts);
    }

    #[test]
    fn test_remainder_goes_first() {
        let parts = partition(10, 4).unwrap();
        let lens: Vec<_> = parts.iter().map(Partition::len).collect();
        assert_eq!(lens, vec![3, 3, 2, 2]);
        assert_eq!(parts[2].rows(), 6..8);
    }

    #[test]
    fn test_single_worker() {
        let parts = partition(5, 1).unwrap();
        assert_eq!(
            parts,
            vec![Partition {
                id: 0,
                start_row: 0,
                end_row: 5
            }]
        );
    }

    #[test]
    fn test_more_workers_than_rows() {
        let parts = partition(2, 5).unwrap();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts.iter().filter(|p| p.is_empty()).count(), 3);
        assert_covers(2, &parts);
    }

    #[test]
    fn test_zero_rows() {
        let parts = partition(0, 3).unwrap();
        assert!(parts.iter().all(Partition::is_empty));
        assert_covers(0, &parts);
    }

    #[test]
    fn test_zero_workers() {
        assert!(matches!(partition(4, 0), Err(Error::InvalidWorkerCount(0))));
    }

    #[test]
    fn test_coverage_grid() {
        for rows in 0..40 {
            for workers in 1..12 {
                let parts = partition(rows, workers).unwrap();
                assert_eq!(parts.len(), workers);
                assert_covers(rows, &parts);
                let max = parts.iter().map(Partition::len).max().unwrap();
                let min = parts.iter().map(Partition::len).min().unwrap();
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn test_block_len() {
        let p = Partition {
            id: 0,
            start_row: 3,
            end_row: 5,
        };
        assert_eq!(p.block_len(7), 14);
    }
}
