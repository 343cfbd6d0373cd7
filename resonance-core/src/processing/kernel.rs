//! Interchangeable execution strategies for [`ResonatorBank`](super::resonator_bank::ResonatorBank).
//!
//! All complex state is stored interleaved (`[re0, im0, re1, im1, ...]`), so
//! a SIMD register of `L` floats holds `L / 2` bins. Every kernel evaluates
//! the same formulas in the same order of operations; the wide kernels only
//! change how many bins are handled per instruction.

use std::fmt;

use serde::{Deserialize, Serialize};
use wide::{f32x4, f32x8};

/// Per-lane constants of a bank, laid out to line up with the interleaved
/// complex state so kernels load them straight into registers.
///
/// Every array holds `2 * bins` floats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BankCoefficients {
    /// `[a0, a0, a1, a1, ...]`
    pub alphas: Vec<f32>,
    /// `[b0, b0, b1, b1, ...]`
    pub betas: Vec<f32>,
    /// `[re0, re0, re1, re1, ...]`
    pub rotator_re: Vec<f32>,
    /// `[-im0, im0, -im1, im1, ...]`
    pub rotator_im: Vec<f32>,
}

impl BankCoefficients {
    /// Builds the lane layout from per-bin `(alpha, beta, rotator)` values,
    /// rotators given as `(cos, sin)`.
    pub fn new(alphas: &[f32], betas: &[f32], rotators: &[(f32, f32)]) -> Self {
        debug_assert!(alphas.len() == betas.len() && alphas.len() == rotators.len());
        Self {
            alphas: per_bin(alphas),
            betas: per_bin(betas),
            rotator_re: rotators.iter().flat_map(|&(re, _)| [re, re]).collect(),
            rotator_im: rotators.iter().flat_map(|&(_, im)| [-im, im]).collect(),
        }
    }

    pub fn bins(&self) -> usize {
        self.alphas.len() / 2
    }

    pub fn alpha(&self, bin: usize) -> f32 {
        self.alphas[2 * bin]
    }

    pub fn beta(&self, bin: usize) -> f32 {
        self.betas[2 * bin]
    }
}

/// Mutable view over a bank's state plus its constants. Complex arrays hold
/// `2 * bins` floats.
pub struct BankLanes<'a> {
    pub phasors: &'a mut [f32],
    pub resonators: &'a mut [f32],
    pub smoothed: &'a mut [f32],
    pub coefficients: &'a BankCoefficients,
}

impl BankLanes<'_> {
    pub fn bins(&self) -> usize {
        self.coefficients.bins()
    }
}

/// One execution strategy for the per-sample bank recursion.
pub trait BankKernel: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Correlates `sample` against every bin's phasor, smooths, then rotates
    /// every phasor by its own rotator.
    fn update(&self, lanes: &mut BankLanes<'_>, sample: f32);

    /// Renormalizes a batch of interleaved unit-magnitude complex values.
    fn stabilize(&self, phasors: &mut [f32]);
}

/// Kernel selection for configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    Scalar,
    #[default]
    Wide4,
    Wide8,
}

impl KernelKind {
    pub fn build(self) -> Box<dyn BankKernel> {
        match self {
            Self::Scalar => Box::new(ScalarKernel),
            Self::Wide4 => Box::new(Wide4Kernel),
            Self::Wide8 => Box::new(Wide8Kernel),
        }
    }

    pub fn all() -> [KernelKind; 3] {
        [Self::Scalar, Self::Wide4, Self::Wide8]
    }
}

#[inline]
fn update_bins(lanes: &mut BankLanes<'_>, bins: std::ops::Range<usize>, sample: f32) {
    let coefficients = lanes.coefficients;
    for bin in bins {
        let re = 2 * bin;
        let im = re + 1;
        let alpha = coefficients.alphas[re];
        let beta = coefficients.betas[re];
        let pr = lanes.phasors[re];
        let pi = lanes.phasors[im];

        let alpha_sample = alpha * sample;
        lanes.resonators[re] = (1.0 - alpha) * lanes.resonators[re] + alpha_sample * pr;
        lanes.resonators[im] = (1.0 - alpha) * lanes.resonators[im] + alpha_sample * pi;
        lanes.smoothed[re] = (1.0 - beta) * lanes.smoothed[re] + beta * lanes.resonators[re];
        lanes.smoothed[im] = (1.0 - beta) * lanes.smoothed[im] + beta * lanes.resonators[im];

        lanes.phasors[re] = pr * coefficients.rotator_re[re] + pi * coefficients.rotator_im[re];
        lanes.phasors[im] = pi * coefficients.rotator_re[im] + pr * coefficients.rotator_im[im];
    }
}

#[inline]
fn stabilize_pairs(interleaved: &mut [f32]) {
    for pair in interleaved.chunks_exact_mut(2) {
        let k = 0.5 * (3.0 - (pair[0] * pair[0] + pair[1] * pair[1]));
        pair[0] *= k;
        pair[1] *= k;
    }
}

/// Plain per-bin loop. Reference for the wide kernels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarKernel;

impl BankKernel for ScalarKernel {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn update(&self, lanes: &mut BankLanes<'_>, sample: f32) {
        let bins = lanes.bins();
        update_bins(lanes, 0..bins, sample);
    }

    fn stabilize(&self, phasors: &mut [f32]) {
        stabilize_pairs(phasors);
    }
}

#[inline]
fn load<const L: usize>(values: &[f32]) -> [f32; L] {
    let mut out = [0.0; L];
    out.copy_from_slice(&values[..L]);
    out
}

/// `[v0, v0, v1, v1, ...]`
fn per_bin(values: &[f32]) -> Vec<f32> {
    values.iter().flat_map(|&v| [v, v]).collect()
}

/// Swaps real and imaginary lanes of every pair.
#[inline]
fn swap_pairs<const L: usize>(lanes: [f32; L]) -> [f32; L] {
    let mut out = lanes;
    for pair in out.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    out
}

macro_rules! wide_kernel {
    ($(#[$meta:meta])* $name:ident, $vec:ty, $lanes:expr, $label:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl BankKernel for $name {
            fn name(&self) -> &'static str {
                $label
            }

            fn update(&self, lanes: &mut BankLanes<'_>, sample: f32) {
                const L: usize = $lanes;
                const BINS_PER_VEC: usize = L / 2;

                let bins = lanes.bins();
                let vector_bins = bins - bins % BINS_PER_VEC;
                let coefficients = lanes.coefficients;
                let sample_vec = <$vec>::splat(sample);
                let one = <$vec>::splat(1.0);

                for j in (0..2 * vector_bins).step_by(L) {
                    let alpha = <$vec>::from(load::<L>(&coefficients.alphas[j..]));
                    let beta = <$vec>::from(load::<L>(&coefficients.betas[j..]));
                    let rot_re = <$vec>::from(load::<L>(&coefficients.rotator_re[j..]));
                    let rot_im = <$vec>::from(load::<L>(&coefficients.rotator_im[j..]));
                    let p_arr: [f32; L] = load(&lanes.phasors[j..]);
                    let r_arr: [f32; L] = load(&lanes.resonators[j..]);
                    let s_arr: [f32; L] = load(&lanes.smoothed[j..]);

                    let phasor = <$vec>::from(p_arr);
                    let alpha_sample = alpha * sample_vec;
                    let resonator = (one - alpha) * <$vec>::from(r_arr) + alpha_sample * phasor;
                    let smoothed = (one - beta) * <$vec>::from(s_arr) + beta * resonator;

                    let swapped = <$vec>::from(swap_pairs(p_arr));
                    let rotated = phasor * rot_re + swapped * rot_im;

                    lanes.resonators[j..j + L].copy_from_slice(&resonator.to_array());
                    lanes.smoothed[j..j + L].copy_from_slice(&smoothed.to_array());
                    lanes.phasors[j..j + L].copy_from_slice(&rotated.to_array());
                }

                update_bins(lanes, vector_bins..bins, sample);
            }

            fn stabilize(&self, phasors: &mut [f32]) {
                const L: usize = $lanes;

                let three = <$vec>::splat(3.0);
                let half = <$vec>::splat(0.5);
                let mut chunks = phasors.chunks_exact_mut(L);
                for chunk in &mut chunks {
                    let arr: [f32; L] = load(chunk);
                    let item = <$vec>::from(arr);
                    let squared = item * item;
                    let magnitude = squared + <$vec>::from(swap_pairs(squared.to_array()));
                    let scaled = item * (half * (three - magnitude));
                    chunk.copy_from_slice(&scaled.to_array());
                }
                stabilize_pairs(chunks.into_remainder());
            }
        }
    };
}

wide_kernel!(
    /// Two bins per `f32x4`.
    Wide4Kernel,
    f32x4,
    4,
    "wide4"
);

wide_kernel!(
    /// Four bins per `f32x8`.
    Wide8Kernel,
    f32x8,
    8,
    "wide8"
);

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn drifted_phasors(bins: usize) -> Vec<f32> {
        (0..bins)
            .flat_map(|i| {
                let angle = i as f32 * 0.37;
                let scale = 1.0 + 0.002 * ((i % 5) as f32 - 2.0);
                [scale * angle.cos(), scale * angle.sin()]
            })
            .collect()
    }

    fn norm_error(interleaved: &[f32]) -> f32 {
        interleaved
            .chunks_exact(2)
            .map(|p| (p[0] * p[0] + p[1] * p[1] - 1.0).abs())
            .fold(0.0, f32::max)
    }

    #[test]
    fn every_kernel_stabilizes_towards_unit_norm() {
        // Odd bin counts exercise the scalar tail of the wide kernels.
        for bins in [1usize, 2, 3, 7, 8, 13] {
            for kind in KernelKind::all() {
                let kernel = kind.build();
                let mut phasors = drifted_phasors(bins);
                let before = norm_error(&phasors);
                kernel.stabilize(&mut phasors);
                let after = norm_error(&phasors);

                assert!(after < 1e-2, "{} bins={bins}: {after}", kernel.name());
                if before > 4.0 * f32::EPSILON {
                    assert!(after < before, "{} bins={bins}: {after} >= {before}", kernel.name());
                }
            }
        }
    }

    #[test]
    fn kernels_stabilize_identically() {
        let reference = {
            let mut p = drifted_phasors(11);
            ScalarKernel.stabilize(&mut p);
            p
        };
        for kind in [KernelKind::Wide4, KernelKind::Wide8] {
            let mut p = drifted_phasors(11);
            kind.build().stabilize(&mut p);
            for (a, b) in reference.iter().zip(&p) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn coefficients_line_up_with_interleaved_state() {
        let coefficients = BankCoefficients::new(&[0.1, 0.2], &[0.3, 0.4], &[(0.5, 0.25), (0.75, 0.125)]);
        assert_eq!(coefficients.bins(), 2);
        assert_eq!(coefficients.alphas, vec![0.1, 0.1, 0.2, 0.2]);
        assert_eq!(coefficients.betas, vec![0.3, 0.3, 0.4, 0.4]);
        assert_eq!(coefficients.rotator_re, vec![0.5, 0.5, 0.75, 0.75]);
        assert_eq!(coefficients.rotator_im, vec![-0.25, 0.25, -0.125, 0.125]);
        assert_eq!(coefficients.alpha(1), 0.2);
        assert_eq!(coefficients.beta(0), 0.3);
        assert_eq!(swap_pairs([1.0, 2.0, 3.0, 4.0]), [2.0, 1.0, 4.0, 3.0]);
    }

    #[test]
    fn wide_update_matches_scalar_step() {
        let bins = 7;
        let rotators: Vec<(f32, f32)> = (0..bins).map(|i| (i as f32 * 0.1).sin_cos()).map(|(s, c)| (c, s)).collect();
        let alphas: Vec<f32> = (0..bins).map(|i| 0.01 * (i + 1) as f32).collect();
        let betas: Vec<f32> = alphas.iter().map(|a| a * 0.5).collect();
        let coefficients = BankCoefficients::new(&alphas, &betas, &rotators);

        let run = |kernel: &dyn BankKernel| {
            let mut phasors = drifted_phasors(bins);
            let mut resonators = vec![0.0; 2 * bins];
            let mut smoothed = vec![0.0; 2 * bins];
            for step in 0..64 {
                let mut lanes = BankLanes {
                    phasors: &mut phasors,
                    resonators: &mut resonators,
                    smoothed: &mut smoothed,
                    coefficients: &coefficients,
                };
                kernel.update(&mut lanes, (step as f32 * 0.3).sin());
            }
            (phasors, smoothed)
        };

        let (ref_phasors, ref_smoothed) = run(&ScalarKernel);
        for kind in [KernelKind::Wide4, KernelKind::Wide8] {
            let (phasors, smoothed) = run(kind.build().as_ref());
            for (a, b) in ref_phasors.iter().zip(&phasors).chain(ref_smoothed.iter().zip(&smoothed)) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn kernel_kind_builds_matching_names() {
        assert_eq!(KernelKind::Scalar.build().name(), "scalar");
        assert_eq!(KernelKind::Wide4.build().name(), "wide4");
        assert_eq!(KernelKind::Wide8.build().name(), "wide8");
        assert_eq!(KernelKind::default(), KernelKind::Wide4);
    }
}
