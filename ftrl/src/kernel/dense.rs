use rayon::prelude::*;

use super::update_slices;
use crate::config::Hyperparams;

/// Tensors at least this large are split in chunks updated on the rayon pool.
const PAR_THRESHOLD: usize = 1 << 15;
const PAR_CHUNK: usize = 1 << 12;

/// Applies a dense gradient to a whole parameter.
///
/// # Arguments
/// * `weights` - The parameter, updated in place.
/// * `moment` - The squared gradient accumulator, updated in place.
/// * `linear` - The linear coefficient accumulator, updated in place.
/// * `grad` - The gradient, one value per element.
/// * `hyper` - The hyperparameters of this step.
///
/// # Panics
/// If the four slices don't have the same length.
pub fn apply_dense(
    weights: &mut [f32],
    moment: &mut [f32],
    linear: &mut [f32],
    grad: &[f32],
    hyper: &Hyperparams,
) {
    let len = weights.len();
    assert!(
        moment.len() == len && linear.len() == len && grad.len() == len,
        "dense kernel called with slices of different lengths"
    );

    if len < PAR_THRESHOLD {
        update_slices(weights, moment, linear, grad, hyper);
        return;
    }

    weights
        .par_chunks_mut(PAR_CHUNK)
        .zip(moment.par_chunks_mut(PAR_CHUNK))
        .zip(linear.par_chunks_mut(PAR_CHUNK))
        .zip(grad.par_chunks(PAR_CHUNK))
        .for_each(|(((w, m), l), g)| update_slices(w, m, l, g, hyper));
}
