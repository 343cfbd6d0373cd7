use super::phasor::Phasor;

/// Sinusoid generator driven by a recursive [`Phasor`].
#[derive(Debug, Clone, PartialEq)]
pub struct Oscillator {
    phasor: Phasor,
    amplitude: f32,
}

impl Oscillator {
    pub fn new(frequency: f32, sample_rate: f32) -> Self {
        Self::with_amplitude(frequency, sample_rate, 1.0)
    }

    pub fn with_amplitude(frequency: f32, sample_rate: f32, amplitude: f32) -> Self {
        Self {
            phasor: Phasor::new(frequency, sample_rate),
            amplitude,
        }
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

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude;
    }

    /// Current output value without advancing.
    #[inline]
    pub fn sample(&self) -> f32 {
        self.amplitude * self.phasor.zc
    }

    /// Returns the current sample, then advances.
    ///
    /// Does not stabilize; callers producing long single-sample runs should
    /// call [`stabilize`](Self::stabilize) every few hundred samples, or use
    /// [`fill`](Self::fill) which does it once per batch.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let sample = self.sample();
        self.phasor.advance();
        sample
    }

    pub fn stabilize(&mut self) {
        self.phasor.stabilize();
    }

    /// Fills `samples` and stabilizes once at the end.
    ///
    /// Identical to calling [`next_sample`](Self::next_sample) for every slot
    /// followed by a single [`stabilize`](Self::stabilize).
    pub fn fill(&mut self, samples: &mut [f32]) {
        for slot in samples.iter_mut() {
            *slot = self.next_sample();
        }
        self.phasor.stabilize();
    }

    pub fn next_samples(&mut self, num_samples: usize) -> Vec<f32> {
        let mut samples = vec![0.0; num_samples];
        self.fill(&mut samples);
        samples
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn batch_matches_single_steps() {
        let mut single = Oscillator::with_amplitude(440.0, 44100.0, 0.8);
        let mut batched = single.clone();

        let expected: Vec<f32> = (0..512).map(|_| single.next_sample()).collect();
        single.stabilize();
        let actual = batched.next_samples(512);

        assert_eq!(expected, actual);
        assert_eq!(single, batched);
    }

    #[test]
    fn consecutive_batches_match_single_steps() {
        let mut single = Oscillator::new(1234.5, 48000.0);
        let mut batched = single.clone();

        for _ in 0..4 {
            let expected: Vec<f32> = (0..300).map(|_| single.next_sample()).collect();
            single.stabilize();
            assert_eq!(expected, batched.next_samples(300));
        }
    }

    #[test]
    fn produces_scaled_cosine() {
        let mut osc = Oscillator::with_amplitude(100.0, 8000.0, 0.5);
        let samples = osc.next_samples(160);
        for (n, &s) in samples.iter().enumerate() {
            let expected = 0.5 * (TAU * 100.0 * n as f32 / 8000.0).cos();
            assert_abs_diff_eq!(s, expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn amplitude_stays_bounded_over_long_runs() {
        let mut osc = Oscillator::new(440.0, 44100.0);
        let mut peak = 0.0f32;
        for _ in 0..1000 {
            for s in osc.next_samples(441) {
                peak = peak.max(s.abs());
            }
        }
        assert!(peak <= 1.001, "peak={peak}");
        assert_abs_diff_eq!(osc.phasor().norm_sqr(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn sample_does_not_advance() {
        let osc = Oscillator::with_amplitude(440.0, 44100.0, 2.0);
        assert_eq!(osc.sample(), 2.0);
        assert_eq!(osc.sample(), 2.0);
    }
}
