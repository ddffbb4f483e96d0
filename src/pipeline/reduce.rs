//! Matryoshka (MRL) dimensionality reduction.
//!
//! Steps, in this order: layer-normalize each full-width row, keep the
//! leading `target_dim` components, then rescale to unit length. Skipping
//! the layer norm and truncating directly gives noticeably worse vectors.

use crate::error::{AppError, Result};
use crate::inference::model::l2_normalize_rows;
use ndarray::{s, Array2};

/// Epsilon added to the variance in the layer norm.
pub const LAYER_NORM_EPS: f32 = 1e-5;

/// Reduce `[N × D]` embeddings to `[N × target_dim]`.
///
/// `target_dim == D` returns the input unchanged. A constant row carries no
/// direction after the layer norm; it comes out as `[1, 0, ..., 0]`.
pub fn reduce(vectors: Array2<f32>, target_dim: usize) -> Result<Array2<f32>> {
    let native_dim = vectors.ncols();

    if target_dim == 0 || target_dim > native_dim {
        return Err(AppError::ValidationError(format!(
            "dimensions must be between 1 and {}",
            native_dim
        )));
    }
    if target_dim == native_dim {
        return Ok(vectors);
    }

    let mut normalized = vectors;
    layer_norm_rows(&mut normalized);

    let mut reduced = normalized.slice(s![.., ..target_dim]).to_owned();
    l2_normalize_rows(&mut reduced);

    for mut row in reduced.rows_mut() {
        if row.iter().all(|&x| x == 0.0) {
            row[0] = 1.0;
        }
    }

    Ok(reduced)
}

/// Centre each row and divide by its (population) standard deviation.
fn layer_norm_rows(matrix: &mut Array2<f32>) {
    let width = matrix.ncols() as f32;
    if width == 0.0 {
        return;
    }

    for mut row in matrix.rows_mut() {
        let mean = row.sum() / width;
        let variance = row.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / width;
        let denom = (variance + LAYER_NORM_EPS).sqrt();
        row.mapv_inplace(|x| (x - mean) / denom);
    }
}
