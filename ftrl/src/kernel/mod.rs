//! The FTRL-proximal update rule.
//!
//! For every coordinate, with gradient `g`:
//! ```text
//! new_moment = moment + g^2
//! sigma      = (new_moment^(-lr_power) - moment^(-lr_power)) / learning_rate
//! new_linear = linear + g - sigma * weight
//! new_weight = (sign(new_linear) * l1 - new_linear) / (new_moment^(-lr_power) / learning_rate + 2 * l2)
//!              if |new_linear| > l1, else 0
//! ```
//! `sigma` is zero when `lr_power` is zero (fixed rate) or when the learning rate is zero, in
//! which case the weight is zero as well.
//!
//! Kernels work on flat slices, callers validate lengths and indices beforehand.

mod dense;
mod sparse;

pub use dense::apply_dense;
pub use sparse::{apply_row, apply_sparse};

use crate::config::Hyperparams;

/// Raises a non negative accumulator to `-lr_power`.
#[inline]
fn scaled_power(moment: f32, lr_power: f32) -> f32 {
    if lr_power == -0.5 {
        moment.sqrt()
    } else {
        moment.powf(-lr_power)
    }
}

/// Applies the update rule to a single coordinate.
#[inline]
pub fn update_coordinate(
    weight: &mut f32,
    moment: &mut f32,
    linear: &mut f32,
    grad: f32,
    hyper: &Hyperparams,
) {
    let Hyperparams {
        learning_rate: lr,
        l1,
        l2,
        lr_power,
    } = *hyper;

    let new_moment = *moment + grad * grad;
    let new_power = scaled_power(new_moment, lr_power);

    let sigma = if lr_power == 0. || lr == 0. {
        0.
    } else {
        (new_power - scaled_power(*moment, lr_power)) / lr
    };

    let new_linear = *linear + grad - sigma * *weight;

    // A zero rate makes the quadratic term infinite, which pins the weight at zero.
    *weight = if new_linear.abs() > l1 && lr > 0. {
        (new_linear.signum() * l1 - new_linear) / (new_power / lr + 2. * l2)
    } else {
        0.
    };
    *moment = new_moment;
    *linear = new_linear;
}

/// Applies the update rule element-wise over equally sized slices.
#[inline]
pub(crate) fn update_slices(
    weights: &mut [f32],
    moment: &mut [f32],
    linear: &mut [f32],
    grad: &[f32],
    hyper: &Hyperparams,
) {
    weights
        .iter_mut()
        .zip(moment.iter_mut())
        .zip(linear.iter_mut())
        .zip(grad)
        .for_each(|(((w, m), l), &g)| update_coordinate(w, m, l, g, hyper));
}
