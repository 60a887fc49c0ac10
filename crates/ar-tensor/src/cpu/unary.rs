// Elementwise activation kernels over host slices.
//
// Callers check lengths; these loops assume `x`, `y` and `dy` line up.

use crate::activation::ActivationKind;

pub(crate) fn activation_forward(kind: ActivationKind, x: &[f32]) -> Vec<f32> {
    x.iter().map(|&v| kind.forward(v)).collect()
}

pub(crate) fn activation_backward(
    kind: ActivationKind,
    x: &[f32],
    y: &[f32],
    dy: &[f32],
) -> Vec<f32> {
    x.iter()
        .zip(y.iter())
        .zip(dy.iter())
        .map(|((&xv, &yv), &g)| kind.backward(xv, yv, g))
        .collect()
}
