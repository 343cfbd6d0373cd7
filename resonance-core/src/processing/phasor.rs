//! Recursive unit-magnitude complex phasor.
//!
//! A phasor `Z = Zc + i·Zs` is rotated once per sample by the constant
//! `W = Wc + i·Ws = exp(i·2π·f/fs)`, which yields `cos`/`sin` of the running
//! phase without evaluating any trigonometric function per sample.

use std::f32::consts::TAU;

/// Rotating complex value shared by [`Oscillator`](super::oscillator::Oscillator)
/// and [`Resonator`](super::resonator::Resonator).
#[derive(Debug, Clone, PartialEq)]
pub struct Phasor {
    frequency: f32,
    sample_rate: f32,
    pub(crate) zc: f32,
    pub(crate) zs: f32,
    wc: f32,
    ws: f32,
    wcps: f32,
}

impl Phasor {
    /// Starts at phase zero (`Z = 1`).
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        let mut phasor = Self {
            frequency,
            sample_rate,
            zc: 1.0,
            zs: 0.0,
            wc: 0.0,
            ws: 0.0,
            wcps: 0.0,
        };
        phasor.update_rotation();
        phasor
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Changes the rotation speed; the current phase is kept.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        self.update_rotation();
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Changes the rotation speed; the current phase is kept.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_rotation();
    }

    /// Current `(Zc, Zs)`.
    pub fn value(&self) -> (f32, f32) {
        (self.zc, self.zs)
    }

    /// Rotation constant `(Wc, Ws, Wc + Ws)`.
    pub fn rotation(&self) -> (f32, f32, f32) {
        (self.wc, self.ws, self.wcps)
    }

    /// `Zc² + Zs²`; stays near 1 as long as [`stabilize`](Self::stabilize)
    /// runs regularly.
    pub fn norm_sqr(&self) -> f32 {
        self.zc * self.zc + self.zs * self.zs
    }

    fn update_rotation(&mut self) {
        let omega = TAU * self.frequency / self.sample_rate;
        self.wc = omega.cos();
        self.ws = omega.sin();
        self.wcps = self.wc + self.ws;
    }

    /// `Z ← Z·W` using three real multiplications.
    #[inline]
    pub fn advance(&mut self) {
        let ac = self.wc * self.zc;
        let bd = self.ws * self.zs;
        let abcd = self.wcps * (self.zc + self.zs);
        self.zc = ac - bd;
        self.zs = abcd - ac - bd;
    }

    /// Pulls `|Z|` back towards 1.
    ///
    /// `k = (3 - |Z|²) / 2` is the first-order Taylor expansion of
    /// `1/sqrt(|Z|²)` around 1, so it only holds for small drift. Call it every
    /// few hundred samples at most.
    #[inline]
    pub fn stabilize(&mut self) {
        let k = (3.0 - self.zc * self.zc - self.zs * self.zs) / 2.0;
        self.zc *= k;
        self.zs *= k;
    }

    /// Back to phase zero.
    pub fn reset_phase(&mut self) {
        self.zc = 1.0;
        self.zs = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn starts_at_unit_real() {
        let phasor = Phasor::new(440.0, 44100.0);
        assert_eq!(phasor.value(), (1.0, 0.0));
        assert_eq!(phasor.frequency(), 440.0);
        assert_eq!(phasor.sample_rate(), 44100.0);
    }

    #[test]
    fn wcps_is_precomputed_sum() {
        let phasor = Phasor::new(440.0, 44100.0);
        let (wc, ws, wcps) = phasor.rotation();
        assert_abs_diff_eq!(wc + ws, wcps, epsilon = 1e-6);
    }

    #[test]
    fn setters_recompute_rotation_but_keep_phase() {
        let mut phasor = Phasor::new(440.0, 44100.0);
        for _ in 0..10 {
            phasor.advance();
        }
        let before = phasor.value();
        let (wc, ws, _) = phasor.rotation();

        phasor.set_frequency(880.0);
        let (wc2, ws2, _) = phasor.rotation();
        assert!((wc - wc2).abs() > 1e-5);
        assert!((ws - ws2).abs() > 1e-5);
        assert_eq!(phasor.value(), before);

        phasor.set_sample_rate(48000.0);
        let (wc3, _, _) = phasor.rotation();
        assert!((wc2 - wc3).abs() > 1e-7);
        assert_eq!(phasor.value(), before);
    }

    #[test]
    fn advance_tracks_cosine() {
        let mut phasor = Phasor::new(1000.0, 48000.0);
        for n in 0..200 {
            let expected = (TAU * 1000.0 * n as f32 / 48000.0).cos();
            assert_abs_diff_eq!(phasor.value().0, expected, epsilon = 1e-3);
            phasor.advance();
        }
    }

    #[test]
    fn advance_preserves_norm_for_one_step() {
        let mut phasor = Phasor::new(440.0, 44100.0);
        phasor.advance();
        assert_abs_diff_eq!(phasor.norm_sqr(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn stabilize_reduces_drift() {
        for &(frequency, sample_rate) in &[
            (220.0, 44100.0),
            (440.0, 44100.0),
            (880.0, 44100.0),
            (1000.0, 48000.0),
            (16.35, 8000.0),
            (10000.0, 22050.0),
        ] {
            let mut phasor = Phasor::new(frequency, sample_rate);
            for _ in 0..1000 {
                phasor.advance();
            }
            let drift = (phasor.norm_sqr() - 1.0).abs();
            phasor.stabilize();
            let corrected = (phasor.norm_sqr() - 1.0).abs();

            assert!(corrected < 1e-2, "{frequency} Hz @ {sample_rate}: {corrected}");
            // Below a few ulps the norm itself cannot resolve any improvement.
            if drift > 4.0 * f32::EPSILON {
                assert!(corrected < drift, "{frequency} Hz @ {sample_rate}: {corrected} >= {drift}");
            }
        }
    }

    #[test]
    fn stabilize_corrects_injected_drift() {
        let mut phasor = Phasor::new(440.0, 44100.0);
        phasor.zc = 0.6 * 1.004;
        phasor.zs = 0.8 * 1.004;
        let drift = (phasor.norm_sqr() - 1.0).abs();
        phasor.stabilize();
        let corrected = (phasor.norm_sqr() - 1.0).abs();
        assert!(corrected < drift / 100.0);
    }

    #[test]
    fn stays_finite_with_periodic_stabilization() {
        let mut phasor = Phasor::new(440.0, 44100.0);
        for i in 0..10_000 {
            phasor.advance();
            assert!(phasor.zc.is_finite() && phasor.zs.is_finite());
            if i % 500 == 0 {
                phasor.stabilize();
            }
        }
        assert_abs_diff_eq!(phasor.norm_sqr(), 1.0, epsilon = 1e-2);
    }
}
