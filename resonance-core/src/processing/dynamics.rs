//! Conversions between exponential smoothing factors and time constants.

/// Time constant (seconds) of a one-pole smoother with factor `alpha`.
pub fn time_constant(alpha: f32, sample_rate: f32) -> f32 {
    -1.0 / (sample_rate * (1.0 - alpha).ln())
}

/// Smoothing factor reaching `1 - 1/e` of a step after `time_constant` seconds.
pub fn alpha(time_constant: f32, sample_rate: f32) -> f32 {
    1.0 - (-1.0 / (sample_rate * time_constant)).exp()
}
