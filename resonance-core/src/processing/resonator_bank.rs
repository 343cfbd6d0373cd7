//! Struct-of-arrays bank of resonators advanced together per input sample.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use super::kernel::{BankCoefficients, BankKernel, BankLanes, KernelKind};
use super::resonator::alpha_heuristic;

/// Bank-wide stabilization runs once every this many samples.
pub const STABILIZE_INTERVAL: u32 = 4;

/// Serializable description of a [`ResonatorBank`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfiguration {
    pub frequencies: Vec<f32>,
    pub sample_rate: f32,
    /// Smoothing heuristic constant passed to [`alpha_heuristic`].
    pub k: f32,
    pub kernel: KernelKind,
}

impl Default for BankConfiguration {
    fn default() -> Self {
        Self {
            frequencies: Vec::new(),
            sample_rate: 44_100.0,
            k: 1.0,
            kernel: KernelKind::default(),
        }
    }
}

impl BankConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(format!("sample rate must be positive, got {}", self.sample_rate));
        }
        if !(self.k.is_finite() && self.k > 0.0) {
            return Err(format!("heuristic constant must be positive, got {}", self.k));
        }
        if let Some(f) = self
            .frequencies
            .iter()
            .find(|f| !(f.is_finite() && **f > 0.0 && **f < self.sample_rate / 2.0))
        {
            return Err(format!("frequency {f} outside (0, {})", self.sample_rate / 2.0));
        }
        Ok(())
    }

    pub fn build(&self) -> ResonatorBank {
        ResonatorBank::with_kernel(&self.frequencies, self.sample_rate, self.k, self.kernel.build())
    }
}

/// One resonator per target frequency, stored as parallel arrays.
///
/// Complex state is interleaved `[re, im]`; the per-sample work is delegated to
/// a [`BankKernel`] chosen at construction.
#[derive(Debug)]
pub struct ResonatorBank {
    sample_rate: f32,
    frequencies: Vec<f32>,
    phasors: Vec<f32>,
    resonators: Vec<f32>,
    smoothed: Vec<f32>,
    coefficients: BankCoefficients,
    kernel: Box<dyn BankKernel>,
    tick: u32,
}

impl ResonatorBank {
    /// Bank using the default kernel.
    pub fn new(frequencies: &[f32], sample_rate: f32, k: f32) -> Self {
        Self::with_kernel(frequencies, sample_rate, k, KernelKind::default().build())
    }

    pub fn with_kernel(
        frequencies: &[f32],
        sample_rate: f32,
        k: f32,
        kernel: Box<dyn BankKernel>,
    ) -> Self {
        debug_assert!(sample_rate > 0.0);
        let bins = frequencies.len();
        let mut rotators = Vec::with_capacity(bins);
        let mut alphas = Vec::with_capacity(bins);
        for &frequency in frequencies {
            debug_assert!(
                frequency > 0.0 && frequency < sample_rate / 2.0,
                "bin frequency {frequency} outside (0, {})",
                sample_rate / 2.0
            );
            let radians_per_sample = TAU * frequency / sample_rate;
            rotators.push((radians_per_sample.cos(), radians_per_sample.sin()));
            alphas.push(alpha_heuristic(frequency, sample_rate, k));
        }

        let mut bank = Self {
            sample_rate,
            frequencies: frequencies.to_vec(),
            phasors: vec![0.0; 2 * bins],
            resonators: vec![0.0; 2 * bins],
            smoothed: vec![0.0; 2 * bins],
            // Beta defaults to alpha.
            coefficients: BankCoefficients::new(&alphas, &alphas, &rotators),
            kernel,
            tick: 0,
        };
        bank.reset();
        bank
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    pub fn kernel_name(&self) -> &'static str {
        self.kernel.name()
    }

    pub fn alpha(&self, bin: usize) -> f32 {
        self.coefficients.alpha(bin)
    }

    pub fn beta(&self, bin: usize) -> f32 {
        self.coefficients.beta(bin)
    }

    pub fn update_with_sample(&mut self, sample: f32) {
        let mut lanes = BankLanes {
            phasors: &mut self.phasors,
            resonators: &mut self.resonators,
            smoothed: &mut self.smoothed,
            coefficients: &self.coefficients,
        };
        self.kernel.update(&mut lanes, sample);

        self.tick += 1;
        if self.tick >= STABILIZE_INTERVAL {
            self.tick = 0;
            self.kernel.stabilize(&mut self.phasors);
        }
    }

    pub fn update(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.update_with_sample(sample);
        }
    }

    /// Smoothed complex output of `bin`.
    pub fn smoothed(&self, bin: usize) -> (f32, f32) {
        (self.smoothed[2 * bin], self.smoothed[2 * bin + 1])
    }

    pub fn power(&self, bin: usize) -> f32 {
        let (re, im) = self.smoothed(bin);
        re * re + im * im
    }

    pub fn amplitude(&self, bin: usize) -> f32 {
        self.power(bin).sqrt()
    }

    pub fn phase(&self, bin: usize) -> f32 {
        let (re, im) = self.smoothed(bin);
        im.atan2(re)
    }

    /// Writes one amplitude per bin into `out` (up to the shorter length).
    pub fn amplitudes_into(&self, out: &mut [f32]) {
        for (bin, slot) in out.iter_mut().enumerate().take(self.len()) {
            *slot = self.amplitude(bin);
        }
    }

    pub fn amplitudes(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.len()];
        self.amplitudes_into(&mut out);
        out
    }

    /// Zeroes all accumulators and rewinds every phasor to `1 + 0i`.
    pub fn reset(&mut self) {
        for pair in self.phasors.chunks_exact_mut(2) {
            pair[0] = 1.0;
            pair[1] = 0.0;
        }
        self.resonators.fill(0.0);
        self.smoothed.fill(0.0);
        self.tick = 0;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::processing::oscillator::Oscillator;

    fn tone(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        let mut osc = Oscillator::new(frequency, sample_rate);
        let mut out = vec![0.0; len];
        for chunk in out.chunks_mut(256) {
            osc.fill(chunk);
        }
        out
    }

    #[test]
    fn parallel_arrays_share_length() {
        let bank = ResonatorBank::new(&[100.0, 200.0, 300.0], 44_100.0, 1.0);
        assert_eq!(bank.len(), 3);
        assert_eq!(bank.phasors.len(), 6);
        assert_eq!(bank.resonators.len(), 6);
        assert_eq!(bank.smoothed.len(), 6);
        assert_eq!(bank.coefficients.bins(), 3);
        assert_eq!(bank.coefficients.rotator_re.len(), 6);
        assert_eq!(bank.coefficients.rotator_im.len(), 6);
        assert_abs_diff_eq!(bank.alpha(1), alpha_heuristic(200.0, 44_100.0, 1.0));
        assert_eq!(bank.alpha(2), bank.beta(2));
    }

    #[test]
    fn empty_bank_is_inert() {
        let mut bank = ResonatorBank::new(&[], 44_100.0, 1.0);
        bank.update(&[0.5, -0.5, 0.25]);
        assert!(bank.is_empty());
        assert!(bank.amplitudes().is_empty());
    }

    #[test]
    fn pure_tone_peaks_at_its_bin() {
        let sample_rate = 44_100.0;
        let frequencies = [220.0, 330.0, 440.0, 660.0, 880.0];
        for kind in KernelKind::all() {
            let mut bank = ResonatorBank::with_kernel(&frequencies, sample_rate, 1.0, kind.build());
            bank.update(&tone(440.0, sample_rate, 44_100));

            let amplitudes = bank.amplitudes();
            for (bin, &amplitude) in amplitudes.iter().enumerate() {
                if bin != 2 {
                    assert!(amplitude < amplitudes[2], "{}: bin {bin} = {amplitude}", kind.build().name());
                }
            }
            assert_abs_diff_eq!(amplitudes[2], 0.5, epsilon = 0.02);
        }
    }

    #[test]
    fn kernels_agree() {
        // Seven bins: neither a multiple of two nor four.
        let frequencies = [55.0, 110.0, 220.0, 440.0, 880.0, 1760.0, 3520.0];
        let sample_rate = 48_000.0;
        let signal: Vec<f32> = tone(440.0, sample_rate, 2_000)
            .iter()
            .zip(tone(1_700.0, sample_rate, 2_000))
            .map(|(a, b)| 0.6 * a + 0.3 * b)
            .collect();

        let mut scalar = ResonatorBank::with_kernel(&frequencies, sample_rate, 1.0, KernelKind::Scalar.build());
        scalar.update(&signal);
        for kind in [KernelKind::Wide4, KernelKind::Wide8] {
            let mut bank = ResonatorBank::with_kernel(&frequencies, sample_rate, 1.0, kind.build());
            bank.update(&signal);
            for bin in 0..frequencies.len() {
                let (a_re, a_im) = scalar.smoothed(bin);
                let (b_re, b_im) = bank.smoothed(bin);
                assert_abs_diff_eq!(a_re, b_re, epsilon = 1e-5);
                assert_abs_diff_eq!(a_im, b_im, epsilon = 1e-5);
            }
            for (a, b) in scalar.phasors.iter().zip(&bank.phasors) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn phasors_stay_normalized() {
        let mut bank = ResonatorBank::new(&[30.0, 1_000.0, 15_000.0], 44_100.0, 1.0);
        bank.update(&vec![0.0; 100_003]);
        for pair in bank.phasors.chunks_exact(2) {
            let norm = pair[0] * pair[0] + pair[1] * pair[1];
            assert!((norm - 1.0).abs() < 1e-3, "norm {norm}");
        }
    }

    #[test]
    fn reset_clears_output() {
        let mut bank = ResonatorBank::new(&[440.0], 44_100.0, 1.0);
        bank.update(&tone(440.0, 44_100.0, 4_096));
        assert!(bank.amplitude(0) > 0.1);

        bank.reset();
        assert_eq!(bank.amplitude(0), 0.0);
        assert_eq!(bank.smoothed(0), (0.0, 0.0));
        assert_eq!((bank.phasors[0], bank.phasors[1]), (1.0, 0.0));
    }

    #[test]
    fn amplitudes_into_fills_prefix() {
        let mut bank = ResonatorBank::new(&[440.0, 880.0], 44_100.0, 1.0);
        bank.update(&tone(440.0, 44_100.0, 2_048));
        let mut out = [-1.0f32; 3];
        bank.amplitudes_into(&mut out);
        assert_abs_diff_eq!(out[0], bank.amplitude(0));
        assert_abs_diff_eq!(out[1], bank.amplitude(1));
        assert_eq!(out[2], -1.0);
    }

    #[test]
    fn configuration_builds_selected_kernel() {
        let config: BankConfiguration =
            serde_json::from_str(r#"{"frequencies":[110.0,220.0],"kernel":"wide8"}"#).unwrap();
        assert!(config.validate().is_ok());
        let bank = config.build();
        assert_eq!(bank.kernel_name(), "wide8");
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.sample_rate(), 44_100.0);

        let invalid = BankConfiguration { frequencies: vec![30_000.0], ..Default::default() };
        assert!(invalid.validate().is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "bin frequency 0 outside")]
    fn zero_frequency_bin_is_rejected() {
        ResonatorBank::new(&[0.0, 440.0], 44_100.0, 1.0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "outside (0, 22050)")]
    fn bin_above_nyquist_is_rejected() {
        ResonatorBank::new(&[440.0, 22_050.0], 44_100.0, 1.0);
    }
}
