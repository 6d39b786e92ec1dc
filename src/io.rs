//! Matrix text files: one row per line, values separated by whitespace.

use std::fmt::Write as _;
use std::path::Path;

use matrix_mul::Matrix;
use thiserror::Error;

use crate::Error;

/// A malformed matrix file. Line numbers are 1-based.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("line {line}: invalid number {token:?}")]
    InvalidNumber { line: usize, token: String },

    #[error("line {line}: expected {expected} values, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Shape(#[from] matrix_mul::Error),
}

/// Parses a matrix. Blank lines are skipped.
pub fn parse_matrix(text: &str) -> Result<Matrix, FormatError> {
    let mut rows = 0;
    let mut cols = None;
    let mut data = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let before = data.len();
        for token in line.split_whitespace() {
            let value = token.parse::<f32>().map_err(|_| FormatError::InvalidNumber {
                line: line_no,
                token: token.to_string(),
            })?;
            data.push(value);
        }

        let found = data.len() - before;
        if found == 0 {
            continue;
        }
        match cols {
            None => cols = Some(found),
            Some(expected) if expected != found => {
                return Err(FormatError::RaggedRow {
                    line: line_no,
                    expected,
                    found,
                });
            }
            Some(_) => {}
        }
        rows += 1;
    }

    let cols = cols.unwrap_or(0);
    Ok(Matrix::new(rows, cols, data)?)
}

/// Formats a matrix with single spaces between values and a newline after each row.
pub fn format_matrix(matrix: &Matrix) -> String {
    let mut out = String::new();
    for i in 0..matrix.rows() {
        for (j, value) in matrix.row(i).iter().enumerate() {
            if j > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{}", value);
        }
        out.push('\n');
    }
    out
}

pub async fn read_matrix(path: impl AsRef<Path>) -> Result<Matrix, Error> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_matrix(&text).map_err(|source| Error::Format {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn write_matrix(path: impl AsRef<Path>, matrix: &Matrix) -> Result<(), Error> {
    let path = path.as_ref();
    tokio::fs::write(path, format_matrix(matrix))
        .await
        .map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let m = parse_matrix("1 2 3\n4.5\t-5 6e1\n").unwrap();
        assert_eq!(m.to_rows(), vec![vec![1.0, 2.0, 3.0], vec![4.5, -5.0, 60.0]]);
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let m = parse_matrix("\n1 2\n   \n3 4\n\n").unwrap();
        assert_eq!(m.shape(), (2, 2));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_matrix("").unwrap().shape(), (0, 0));
    }

    #[test]
    fn test_parse_ragged() {
        assert!(matches!(
            parse_matrix("1 2\n\n3\n"),
            Err(FormatError::RaggedRow {
                line: 3,
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_parse_invalid_number() {
        match parse_matrix("1 2\n3 x4\n") {
            Err(FormatError::InvalidNumber { line, token }) => {
                assert_eq!(line, 2);
                assert_eq!(token, "x4");
            }
            other => panic!("expected invalid number, got {:?}", other),
        }
    }

    #[test]
    fn test_format_round_trips() {
        let m = Matrix::from_rows(vec![vec![0.1, -2.0], vec![1.0e-7, 3.25]]).unwrap();
        let text = format_matrix(&m);
        assert_eq!(text, "0.1 -2\n0.0000001 3.25\n");
        assert_eq!(parse_matrix(&text).unwrap(), m);
    }
}
