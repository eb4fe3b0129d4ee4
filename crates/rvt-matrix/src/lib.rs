//! Binary matrix files and the host-side math used to build fixtures.
//!
//! File layout: `rows` as u32 LE, `cols` as u32 LE, then `rows * cols`
//! i32 LE entries in row-major order. Arithmetic wraps at 32 bits like the
//! routines under test.

#![forbid(unsafe_code)]

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

const HEADER_BYTES: usize = 8;

#[derive(Debug)]
pub enum MatrixError {
    /// Fewer than 8 bytes, or a body shorter than the header promises.
    Truncated { expected: usize, actual: usize },
    /// Body longer than the header promises.
    TrailingBytes { expected: usize, actual: usize },
    /// `data.len()` disagrees with `rows * cols`.
    ShapeMismatch { rows: u32, cols: u32, len: usize },
    /// Inner dimensions of a product disagree.
    DimensionMismatch { left: (u32, u32), right: (u32, u32) },
    Parse { line: usize, detail: String },
    Io(std::io::Error),
}

impl std::fmt::Display for MatrixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { expected, actual } => {
                write!(f, "matrix file truncated: expected {expected} bytes, got {actual}")
            }
            Self::TrailingBytes { expected, actual } => {
                write!(f, "matrix file has trailing bytes: expected {expected}, got {actual}")
            }
            Self::ShapeMismatch { rows, cols, len } => {
                write!(f, "{rows}x{cols} matrix cannot hold {len} entries")
            }
            Self::DimensionMismatch { left, right } => write!(
                f,
                "cannot multiply {}x{} by {}x{}",
                left.0, left.1, right.0, right.1
            ),
            Self::Parse { line, detail } => write!(f, "matrix text line {line}: {detail}"),
            Self::Io(err) => write!(f, "matrix io: {err}"),
        }
    }
}

impl std::error::Error for MatrixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MatrixError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: u32,
    pub cols: u32,
    /// Row-major entries.
    pub data: Vec<i32>,
}

impl Matrix {
    pub fn new(rows: u32, cols: u32, data: Vec<i32>) -> Result<Self, MatrixError> {
        if rows as usize * cols as usize != data.len() {
            return Err(MatrixError::ShapeMismatch {
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    #[must_use]
    pub fn zeros(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows as usize * cols as usize],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn get(&self, row: u32, col: u32) -> Option<i32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data
            .get(row as usize * self.cols as usize + col as usize)
            .copied()
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_BYTES + self.data.len() * 4);
        out.extend_from_slice(&self.rows.to_le_bytes());
        out.extend_from_slice(&self.cols.to_le_bytes());
        for value in &self.data {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MatrixError> {
        if bytes.len() < HEADER_BYTES {
            return Err(MatrixError::Truncated {
                expected: HEADER_BYTES,
                actual: bytes.len(),
            });
        }
        let rows = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let cols = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let expected = (rows as usize)
            .checked_mul(cols as usize)
            .and_then(|cells| cells.checked_mul(4))
            .and_then(|body| body.checked_add(HEADER_BYTES))
            .ok_or(MatrixError::Truncated {
                expected: usize::MAX,
                actual: bytes.len(),
            })?;
        if bytes.len() < expected {
            return Err(MatrixError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        if bytes.len() > expected {
            return Err(MatrixError::TrailingBytes {
                expected,
                actual: bytes.len(),
            });
        }
        let data = bytes[HEADER_BYTES..]
            .chunks_exact(4)
            .map(|word| i32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect();
        Ok(Self { rows, cols, data })
    }

    /// Parses the text fixture form: `rows cols v0 v1 ...`, whitespace
    /// separated across any number of lines.
    pub fn parse_text(text: &str) -> Result<Self, MatrixError> {
        let mut numbers = Vec::new();
        for (index, line) in text.lines().enumerate() {
            for token in line.split_whitespace() {
                let value = token.parse::<i64>().map_err(|err| MatrixError::Parse {
                    line: index + 1,
                    detail: format!("`{token}`: {err}"),
                })?;
                numbers.push((index + 1, value));
            }
        }
        let header = |position: usize, name: &str| -> Result<u32, MatrixError> {
            let (line, value) = numbers.get(position).copied().ok_or(MatrixError::Parse {
                line: numbers.last().map_or(1, |(line, _)| *line),
                detail: format!("missing {name}"),
            })?;
            u32::try_from(value).map_err(|_| MatrixError::Parse {
                line,
                detail: format!("{name} must be a non-negative 32-bit count, got {value}"),
            })
        };
        let rows = header(0, "row count")?;
        let cols = header(1, "column count")?;
        let data = numbers
            .iter()
            .skip(2)
            .map(|(line, value)| {
                i32::try_from(*value).map_err(|_| MatrixError::Parse {
                    line: *line,
                    detail: format!("{value} does not fit in a word"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rows, cols, data)
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = format!("{} {}\n", self.rows, self.cols);
        for row in self.data.chunks(self.cols.max(1) as usize) {
            let line = row.iter().map(i32::to_string).collect::<Vec<_>>();
            out.push_str(&line.join(" "));
            out.push('\n');
        }
        out
    }
}

/// Reads a binary matrix file.
pub fn read_matrix(path: &Path) -> Result<Matrix, MatrixError> {
    let bytes = std::fs::read(path)?;
    Matrix::from_bytes(&bytes)
}

/// Writes a binary matrix file, creating parent directories.
pub fn write_matrix(path: &Path, matrix: &Matrix) -> Result<(), MatrixError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, matrix.to_bytes())?;
    Ok(())
}

/// Random `rows x cols` matrix with entries in `0..=10`.
pub fn randmat<R: Rng + ?Sized>(rng: &mut R, rows: u32, cols: u32) -> Matrix {
    let data = (0..rows as usize * cols as usize)
        .map(|_| rng.gen_range(0..=10))
        .collect();
    Matrix { rows, cols, data }
}

pub fn relu_in_place(values: &mut [i32]) {
    for value in values.iter_mut() {
        if *value < 0 {
            *value = 0;
        }
    }
}

/// Row-major product with 32-bit wrapping accumulation.
pub fn matmul(left: &Matrix, right: &Matrix) -> Result<Matrix, MatrixError> {
    if left.cols != right.rows {
        return Err(MatrixError::DimensionMismatch {
            left: (left.rows, left.cols),
            right: (right.rows, right.cols),
        });
    }
    let (n, k, m) = (left.rows as usize, left.cols as usize, right.cols as usize);
    let mut data = vec![0i32; n * m];
    for row in 0..n {
        for col in 0..m {
            let mut acc = 0i32;
            for inner in 0..k {
                let product = left.data[row * k + inner].wrapping_mul(right.data[inner * m + col]);
                acc = acc.wrapping_add(product);
            }
            data[row * m + col] = acc;
        }
    }
    Ok(Matrix {
        rows: left.rows,
        cols: right.cols,
        data,
    })
}

/// Index of the first maximum. `None` for an empty slice.
#[must_use]
pub fn argmax(values: &[i32]) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for (index, value) in values.iter().copied().enumerate() {
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}
