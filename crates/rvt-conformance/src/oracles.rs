//! Host-side reference semantics for the routines under test.
//!
//! Errors are the exit code the routine is expected to terminate with.

use rvt_core::ExitCode;
use rvt_matrix::{Matrix, matmul as matrix_product, relu_in_place};

#[must_use]
pub fn abs(value: i32) -> i32 {
    value.wrapping_abs()
}

pub fn relu(values: &[i32]) -> Result<Vec<i32>, ExitCode> {
    if values.is_empty() {
        return Err(ExitCode::InvalidLength);
    }
    let mut out = values.to_vec();
    relu_in_place(&mut out);
    Ok(out)
}

/// First index of the maximum.
pub fn argmax(values: &[i32]) -> Result<usize, ExitCode> {
    rvt_matrix::argmax(values).ok_or(ExitCode::InvalidLength)
}

/// Strided dot product over `len` elements; strides count elements.
pub fn dot(v0: &[i32], v1: &[i32], len: i32, stride0: i32, stride1: i32) -> Result<i32, ExitCode> {
    if len < 1 {
        return Err(ExitCode::InvalidLength);
    }
    if stride0 < 1 || stride1 < 1 {
        return Err(ExitCode::InvalidStride);
    }
    let mut acc = 0i32;
    for index in 0..len as usize {
        let left = v0.get(index * stride0 as usize).copied().unwrap_or(0);
        let right = v1.get(index * stride1 as usize).copied().unwrap_or(0);
        acc = acc.wrapping_add(left.wrapping_mul(right));
    }
    Ok(acc)
}

/// Dimension checks match the routine: every dimension at least 1 and the
/// inner dimensions equal.
pub fn matmul(
    m0: &[i32],
    (rows0, cols0): (i32, i32),
    m1: &[i32],
    (rows1, cols1): (i32, i32),
) -> Result<Vec<i32>, ExitCode> {
    if rows0 < 1 || cols0 < 1 || rows1 < 1 || cols1 < 1 || cols0 != rows1 {
        return Err(ExitCode::DimensionMismatch);
    }
    let left = Matrix::new(rows0 as u32, cols0 as u32, m0.to_vec())
        .map_err(|_| ExitCode::DimensionMismatch)?;
    let right = Matrix::new(rows1 as u32, cols1 as u32, m1.to_vec())
        .map_err(|_| ExitCode::DimensionMismatch)?;
    matrix_product(&left, &right)
        .map(|product| product.data)
        .map_err(|_| ExitCode::DimensionMismatch)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// `m1 * relu(m0 * input)`.
    pub scores: Matrix,
    pub label: usize,
}

/// The two-layer network `classify` evaluates.
pub fn classify(m0: &Matrix, m1: &Matrix, input: &Matrix) -> Result<Classification, ExitCode> {
    let mut hidden = matrix_product(m0, input).map_err(|_| ExitCode::DimensionMismatch)?;
    relu_in_place(&mut hidden.data);
    let scores = matrix_product(m1, &hidden).map_err(|_| ExitCode::DimensionMismatch)?;
    let label = argmax(&scores.data)?;
    Ok(Classification { scores, label })
}
