//! Work items handed to workers, and their wire frame for worker processes.
//!
//! # Frame layout
//!
//! All integers and floats are little-endian.
//!
//! | Field | Size |
//! |-------|------|
//! | magic `MMJB` | 4 |
//! | version | 4 |
//! | partition id | 4 |
//! | start row | 8 |
//! | end row | 8 |
//! | inner dimension | 8 |
//! | columns of B | 8 |
//! | rows `start..end` of A | `4 * (end - start) * inner` |
//! | all of B | `4 * inner * cols` |

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::channel::{decode_block, encode_block, read_exact_or_eof};
use crate::{Error, Matrix, Partition};

const JOB_MAGIC: &[u8; 4] = b"MMJB";
const JOB_VERSION: u32 = 1;
const HEADER_LEN: usize = 44;

/// One partition's share of a multiplication.
#[derive(Debug, Clone)]
pub struct Job {
    pub partition: Partition,
    pub a: Arc<Matrix>,
    pub b: Arc<Matrix>,
}

impl Job {
    pub fn new(partition: Partition, a: Arc<Matrix>, b: Arc<Matrix>) -> Self {
        Self { partition, a, b }
    }

    /// Number of values in the block this job produces.
    pub fn block_len(&self) -> usize {
        self.partition.block_len(self.b.cols())
    }

    /// Serializes the job, shipping only the rows of A the partition needs.
    ///
    /// Fails if the partition id does not fit the 32-bit frame field.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let p = &self.partition;
        let id = u32::try_from(p.id)
            .map_err(|_| Error::Job(format!("partition id {} does not fit in the frame", p.id)))?;
        let a_rows = self.a.row_range(p.rows());

        let mut buf = Vec::with_capacity(HEADER_LEN + 4 * (a_rows.len() + self.b.as_slice().len()));
        buf.extend_from_slice(JOB_MAGIC);
        buf.extend_from_slice(&JOB_VERSION.to_le_bytes());
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(&(p.start_row as u64).to_le_bytes());
        buf.extend_from_slice(&(p.end_row as u64).to_le_bytes());
        buf.extend_from_slice(&(self.a.cols() as u64).to_le_bytes());
        buf.extend_from_slice(&(self.b.cols() as u64).to_le_bytes());
        buf.extend_from_slice(&encode_block(a_rows));
        buf.extend_from_slice(&encode_block(self.b.as_slice()));
        Ok(buf)
    }
}

/// A decoded job frame as seen by a worker process.
///
/// `a_rows` holds only the partition's rows of A, so row `start_row` of the
/// original matrix is row 0 here.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFrame {
    pub partition: Partition,
    pub a_rows: Matrix,
    pub b: Matrix,
}

/// Reads one job frame.
pub async fn read_job<R>(reader: &mut R) -> Result<JobFrame, Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_LEN];
    read_exact_or_eof(reader, &mut header)
        .await
        .map_err(|e| Error::Job(format!("header: {}", e)))?;

    if &header[0..4] != JOB_MAGIC {
        return Err(Error::Job(format!(
            "invalid magic: {}",
            String::from_utf8_lossy(&header[0..4])
        )));
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != JOB_VERSION {
        return Err(Error::Job(format!("unsupported version: {}", version)));
    }

    let id = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
    let start_row = read_u64(&header[12..20])?;
    let end_row = read_u64(&header[20..28])?;
    let inner = read_u64(&header[28..36])?;
    let cols = read_u64(&header[36..44])?;

    if start_row > end_row {
        return Err(Error::Job(format!(
            "start row {} after end row {}",
            start_row, end_row
        )));
    }
    let rows = end_row - start_row;

    let a_rows = read_matrix(reader, rows, inner).await?;
    let b = read_matrix(reader, inner, cols).await?;

    let mut probe = [0u8; 1];
    if reader.read(&mut probe).await? != 0 {
        return Err(Error::Job("unexpected bytes after job".to_string()));
    }

    Ok(JobFrame {
        partition: Partition {
            id,
            start_row,
            end_row,
        },
        a_rows,
        b,
    })
}

fn read_u64(bytes: &[u8]) -> Result<usize, Error> {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    usize::try_from(u64::from_le_bytes(raw))
        .map_err(|_| Error::Job("dimension does not fit in usize".to_string()))
}

async fn read_matrix<R>(reader: &mut R, rows: usize, cols: usize) -> Result<Matrix, Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let byte_len = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::Job(format!("{}x{} matrix is too large", rows, cols)))?;

    let mut buf = vec![0u8; byte_len];
    read_exact_or_eof(reader, &mut buf)
        .await
        .map_err(|e| Error::Job(format!("{}x{} payload: {}", rows, cols, e)))?;
    Matrix::new(rows, cols, decode_block(&buf))
}
