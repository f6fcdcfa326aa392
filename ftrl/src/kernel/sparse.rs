use super::update_slices;
use crate::config::Hyperparams;

/// Applies a single gradient row to row `index` of a parameter.
///
/// # Arguments
/// * `weights`, `moment`, `linear` - The whole parameter state, updated in place.
/// * `index` - The row to update.
/// * `row_len` - The amount of elements per row.
/// * `grad_row` - The gradient of that row.
/// * `hyper` - The hyperparameters of this step.
///
/// # Panics
/// If `index` is out of bounds or `grad_row` isn't `row_len` long.
#[inline]
pub fn apply_row(
    weights: &mut [f32],
    moment: &mut [f32],
    linear: &mut [f32],
    index: usize,
    row_len: usize,
    grad_row: &[f32],
    hyper: &Hyperparams,
) {
    assert_eq!(grad_row.len(), row_len, "gradient row of the wrong length");

    let range = index * row_len..(index + 1) * row_len;
    update_slices(
        &mut weights[range.clone()],
        &mut moment[range.clone()],
        &mut linear[range],
        grad_row,
        hyper,
    );
}

/// Applies a sparse gradient, touching only the rows named in `indices`.
///
/// Rows are processed in the given order, repeated indices update the same row cumulatively.
///
/// # Arguments
/// * `weights`, `moment`, `linear` - The whole parameter state, updated in place.
/// * `indices` - The rows to update.
/// * `values` - One gradient row per index, flattened.
/// * `row_len` - The amount of elements per row.
/// * `hyper` - The hyperparameters of this step.
///
/// # Panics
/// If an index is out of bounds or `values` doesn't hold `indices.len()` rows.
pub fn apply_sparse(
    weights: &mut [f32],
    moment: &mut [f32],
    linear: &mut [f32],
    indices: &[usize],
    values: &[f32],
    row_len: usize,
    hyper: &Hyperparams,
) {
    assert_eq!(
        values.len(),
        indices.len() * row_len,
        "sparse values don't hold one row per index"
    );

    if row_len == 0 {
        return;
    }

    for (&index, grad_row) in indices.iter().zip(values.chunks_exact(row_len)) {
        apply_row(weights, moment, linear, index, row_len, grad_row, hyper);
    }
}
