use std::f32::consts::{PI, TAU};

use super::phasor::Phasor;

/// Amplitude below which no frequency tracking is attempted.
const TRACK_FREQUENCY_THRESHOLD: f32 = 0.001;

/// Default smoothing factor for a resonator at `frequency`.
///
/// `1 - exp(-f / (fs · k · log10(1 + f)))`. Empirical: `k` has no physical
/// derivation, larger values smooth more.
pub fn alpha_heuristic(frequency: f32, sample_rate: f32, k: f32) -> f32 {
    1.0 - (-frequency / (sample_rate * k * (1.0 + frequency).log10())).exp()
}

/// Narrowband amplitude/phase estimator for a single frequency.
///
/// The input is correlated against a rotating reference [`Phasor`] and the
/// product is smoothed twice (`alpha`, then `beta`).
#[derive(Debug, Clone, PartialEq)]
pub struct Resonator {
    phasor: Phasor,
    alpha: f32,
    om_alpha: f32,
    beta: f32,
    om_beta: f32,
    c: f32,
    s: f32,
    cc: f32,
    ss: f32,
    phase: f32,
    tracked_frequency: f32,
}

impl Resonator {
    /// `beta` defaults to `alpha` when `None`.
    pub fn new(frequency: f32, alpha: f32, beta: Option<f32>, sample_rate: f32) -> Self {
        let beta = beta.unwrap_or(alpha);
        Self {
            phasor: Phasor::new(frequency, sample_rate),
            alpha,
            om_alpha: 1.0 - alpha,
            beta,
            om_beta: 1.0 - beta,
            c: 0.0,
            s: 0.0,
            cc: 0.0,
            ss: 0.0,
            phase: 0.0,
            tracked_frequency: frequency,
        }
    }

    /// Resonator with `alpha = beta = alpha_heuristic(frequency, sample_rate, k)`.
    pub fn with_heuristic(frequency: f32, sample_rate: f32, k: f32) -> Self {
        debug_assert!(
            frequency > 0.0 && frequency < sample_rate / 2.0,
            "resonator frequency {frequency} outside (0, {})",
            sample_rate / 2.0
        );
        Self::new(frequency, alpha_heuristic(frequency, sample_rate, k), None, sample_rate)
    }

    pub fn phasor(&self) -> &Phasor {
        &self.phasor
    }

    pub fn frequency(&self) -> f32 {
        self.phasor.frequency()
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.phasor.set_frequency(frequency);
    }

    pub fn sample_rate(&self) -> f32 {
        self.phasor.sample_rate()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.phasor.set_sample_rate(sample_rate);
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
        self.om_alpha = 1.0 - alpha;
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }

    pub fn set_beta(&mut self, beta: f32) {
        self.beta = beta;
        self.om_beta = 1.0 - beta;
    }

    /// Smoothed complex output `(cc, ss)`.
    pub fn output(&self) -> (f32, f32) {
        (self.cc, self.ss)
    }

    pub fn power(&self) -> f32 {
        self.cc * self.cc + self.ss * self.ss
    }

    pub fn amplitude(&self) -> f32 {
        self.power().sqrt()
    }

    /// Phase observed at the last tracking update.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Frequency estimate; only moves during `update_and_track*` calls.
    pub fn tracked_frequency(&self) -> f32 {
        self.tracked_frequency
    }

    #[inline]
    fn update_with_sample(&mut self, sample: f32) {
        let alpha_sample = self.alpha * sample;
        self.c = self.om_alpha * self.c + alpha_sample * self.phasor.zc;
        self.s = self.om_alpha * self.s + alpha_sample * self.phasor.zs;
        self.cc = self.om_beta * self.cc + self.beta * self.c;
        self.ss = self.om_beta * self.ss + self.beta * self.s;
        self.phasor.advance();
    }

    pub fn update(&mut self, sample: f32) {
        self.update_with_sample(sample);
        self.phasor.stabilize();
    }

    /// Feeds a batch, stabilizing once at the end.
    pub fn update_batch(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.update_with_sample(sample);
        }
        self.phasor.stabilize();
    }

    /// Feeds every `stride`-th sample of `frame_data`, `frames` samples in total.
    ///
    /// Picks one channel out of interleaved multi-channel data.
    pub fn update_strided(&mut self, frame_data: &[f32], frames: usize, stride: usize) {
        for &sample in frame_data.iter().step_by(stride.max(1)).take(frames) {
            self.update_with_sample(sample);
        }
        self.phasor.stabilize();
    }

    pub fn update_and_track(&mut self, sample: f32) {
        self.update(sample);
        self.track(1);
    }

    pub fn update_and_track_batch(&mut self, samples: &[f32]) {
        self.update_batch(samples);
        self.track(samples.len());
    }

    pub fn update_and_track_strided(&mut self, frame_data: &[f32], frames: usize, stride: usize) {
        self.update_strided(frame_data, frames, stride);
        self.track(frames);
    }

    /// Clears the accumulators and tracking state; keeps frequency and smoothing.
    pub fn reset(&mut self) {
        self.c = 0.0;
        self.s = 0.0;
        self.cc = 0.0;
        self.ss = 0.0;
        self.phase = 0.0;
        self.tracked_frequency = self.phasor.frequency();
        self.phasor.reset_phase();
    }

    fn track(&mut self, num_samples: usize) {
        if num_samples == 0 {
            return;
        }
        if self.amplitude() <= TRACK_FREQUENCY_THRESHOLD {
            self.tracked_frequency = self.phasor.frequency();
            return;
        }

        let new_phase = self.ss.atan2(self.cc);
        let mut phase_drift = new_phase - self.phase;
        self.phase = new_phase;

        if phase_drift <= -PI {
            phase_drift += TAU;
        } else if phase_drift > PI {
            phase_drift -= TAU;
        }

        self.tracked_frequency = self.phasor.frequency()
            - phase_drift * self.phasor.sample_rate() / (TAU * num_samples as f32);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::processing::dynamics;
    use crate::processing::oscillator::Oscillator;

    const SAMPLE_RATE: f32 = 44100.0;

    fn default_alpha() -> f32 {
        1.0 / (SAMPLE_RATE * 0.1)
    }

    #[test]
    fn beta_defaults_to_alpha() {
        let resonator = Resonator::new(440.0, 0.99, None, SAMPLE_RATE);
        assert_eq!(resonator.alpha(), 0.99);
        assert_eq!(resonator.beta(), 0.99);
        assert_eq!(resonator.tracked_frequency(), 440.0);
    }

    #[test]
    fn setters_keep_complements_consistent() {
        let mut resonator = Resonator::new(440.0, default_alpha(), Some(0.5), SAMPLE_RATE);
        resonator.set_alpha(0.11);
        resonator.set_beta(0.25);
        assert_eq!(resonator.om_alpha, 1.0 - 0.11);
        assert_eq!(resonator.om_beta, 1.0 - 0.25);
    }

    #[test]
    fn alpha_heuristic_is_a_fraction() {
        for &f in &[27.5f32, 100.0, 440.0, 4186.0] {
            let alpha = alpha_heuristic(f, SAMPLE_RATE, 1.0);
            assert!(alpha > 0.0 && alpha < 1.0, "f={f} alpha={alpha}");
        }
        // Larger k smooths more.
        assert!(alpha_heuristic(440.0, SAMPLE_RATE, 4.0) < alpha_heuristic(440.0, SAMPLE_RATE, 1.0));
    }

    #[test]
    fn single_update_grows_amplitude() {
        let mut resonator = Resonator::new(440.0, 1.0, None, SAMPLE_RATE);
        let before = resonator.amplitude();
        resonator.update(1.0);
        assert!(resonator.amplitude() >= before);
        let after = resonator.amplitude();
        resonator.update(0.0);
        assert!(resonator.amplitude() <= after + 1e-6);
    }

    #[test]
    fn power_is_squared_amplitude() {
        let mut resonator = Resonator::new(440.0, 0.5, None, SAMPLE_RATE);
        for _ in 0..100 {
            resonator.update(1.0);
        }
        let amplitude = resonator.amplitude();
        assert_abs_diff_eq!(resonator.power(), amplitude * amplitude, epsilon = 1e-6);
    }

    #[test]
    fn settles_to_half_amplitude_on_matching_tone() {
        let alpha = dynamics::alpha(0.02, SAMPLE_RATE);
        let mut resonator = Resonator::new(440.0, alpha, None, SAMPLE_RATE);
        let mut osc = Oscillator::new(440.0, SAMPLE_RATE);
        for _ in 0..100 {
            resonator.update_batch(&osc.next_samples(441));
        }
        // cos = (e^{iwt} + e^{-iwt}) / 2: one side lands on the reference.
        assert_abs_diff_eq!(resonator.amplitude(), 0.5, epsilon = 0.01);
    }

    #[test]
    fn strided_update_matches_batch_on_one_channel() {
        let mut osc = Oscillator::new(440.0, SAMPLE_RATE);
        let mono = osc.next_samples(1000);
        let interleaved: Vec<f32> = mono.iter().flat_map(|&s| [s, -1.0]).collect();

        let mut a = Resonator::with_heuristic(440.0, SAMPLE_RATE, 1.0);
        let mut b = a.clone();
        a.update_batch(&mono);
        b.update_strided(&interleaved, 1000, 2);
        assert_eq!(a.output(), b.output());
    }

    #[test]
    fn silence_snaps_tracking_back_to_center() {
        let mut resonator = Resonator::with_heuristic(440.0, SAMPLE_RATE, 1.0);
        resonator.update_and_track_batch(&[0.0; 256]);
        assert_eq!(resonator.tracked_frequency(), 440.0);
    }

    #[test]
    fn tracks_nearby_frequency_sample_by_sample() {
        for &target in &[420.0f32, 433.0, 440.0, 452.0, 460.0] {
            let alpha = alpha_heuristic(440.0, SAMPLE_RATE, 1.0);
            let mut resonator = Resonator::new(440.0, alpha, None, SAMPLE_RATE);
            let mut osc = Oscillator::new(target, SAMPLE_RATE);

            for i in 0..40_000 {
                resonator.update_and_track(osc.next_sample());
                if i % 100 == 99 {
                    osc.stabilize();
                }
            }

            assert_abs_diff_eq!(resonator.tracked_frequency(), target, epsilon = 1.0);
        }
    }

    #[test]
    fn tracks_nearby_frequency_in_batches() {
        for &target in &[420.0f32, 425.0, 433.0, 440.0, 452.0, 459.0, 460.0] {
            let alpha = alpha_heuristic(440.0, SAMPLE_RATE, 1.0);
            let mut resonator = Resonator::new(440.0, alpha, None, SAMPLE_RATE);
            let mut osc = Oscillator::new(target, SAMPLE_RATE);

            for _ in 0..400 {
                resonator.update_and_track_batch(&osc.next_samples(100));
            }

            assert!(resonator.amplitude() > 0.0);
            assert_abs_diff_eq!(resonator.tracked_frequency(), target, epsilon = 1.0);
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "resonator frequency 0 outside")]
    fn heuristic_rejects_zero_frequency() {
        Resonator::with_heuristic(0.0, SAMPLE_RATE, 1.0);
    }

    #[test]
    fn reset_clears_state() {
        let mut resonator = Resonator::with_heuristic(440.0, SAMPLE_RATE, 1.0);
        let mut osc = Oscillator::new(445.0, SAMPLE_RATE);
        resonator.update_and_track_batch(&osc.next_samples(4410));
        resonator.reset();
        assert_eq!(resonator.amplitude(), 0.0);
        assert_eq!(resonator.tracked_frequency(), 440.0);
        assert_eq!(resonator.phasor().value(), (1.0, 0.0));
    }
}
