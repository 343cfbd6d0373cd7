use crate::models::samples::SamplesMut;
use crate::processing::convert;
use crate::processing::oscillator::Oscillator;
use crate::processing::resonator_bank::ResonatorBank;
use crate::traits::stream_handler::{CaptureHandler, RenderHandler};

/// Feeds every captured buffer, downmixed to mono, into a resonator bank.
#[derive(Debug)]
pub struct SpectrumCapture {
    bank: ResonatorBank,
    mono: Vec<f32>,
    frames: u64,
}

impl SpectrumCapture {
    pub fn new(bank: ResonatorBank) -> Self {
        Self {
            bank,
            mono: Vec::new(),
            frames: 0,
        }
    }

    pub fn bank(&self) -> &ResonatorBank {
        &self.bank
    }

    pub fn into_bank(self) -> ResonatorBank {
        self.bank
    }

    /// Frames analysed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Current amplitude per bin.
    pub fn magnitudes(&self) -> Vec<f32> {
        self.bank.amplitudes()
    }

    /// Index of the loudest bin, if the bank has any.
    pub fn peak_bin(&self) -> Option<usize> {
        (0..self.bank.len())
            .filter(|&bin| !self.bank.power(bin).is_nan())
            .max_by(|&a, &b| self.bank.power(a).total_cmp(&self.bank.power(b)))
    }

    /// Most recent captured buffer as mono `f32`.
    pub fn last_buffer(&self) -> &[f32] {
        &self.mono
    }
}

impl CaptureHandler for SpectrumCapture {
    fn process(&mut self, samples: SamplesMut<'_>) {
        convert::downmix_to_mono(&samples, &mut self.mono);
        self.bank.update(&self.mono);
        self.frames += self.mono.len() as u64;
    }
}

/// Renders a sine tone into any playback layout.
#[derive(Debug, Clone)]
pub struct ToneRenderer {
    oscillator: Oscillator,
    mono: Vec<f32>,
}

impl ToneRenderer {
    pub fn new(oscillator: Oscillator) -> Self {
        Self {
            oscillator,
            mono: Vec::new(),
        }
    }

    pub fn oscillator(&self) -> &Oscillator {
        &self.oscillator
    }

    pub fn oscillator_mut(&mut self) -> &mut Oscillator {
        &mut self.oscillator
    }
}

impl RenderHandler for ToneRenderer {
    fn render(&mut self, mut samples: SamplesMut<'_>) {
        self.mono.resize(samples.frames(), 0.0);
        self.oscillator.fill(&mut self.mono);
        convert::fill_from_mono(&mut samples, &self.mono);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::models::samples::{StereoF32, StereoI16};

    #[test]
    fn capture_feeds_bank_with_downmixed_audio() {
        let sample_rate = 44_100.0;
        let mut renderer = ToneRenderer::new(Oscillator::new(440.0, sample_rate));
        let mut capture = SpectrumCapture::new(ResonatorBank::new(&[220.0, 440.0, 880.0], sample_rate, 1.0));

        let mut frames = vec![StereoI16::default(); 441];
        for _ in 0..100 {
            renderer.render(SamplesMut::Stereo16(&mut frames));
            capture.process(SamplesMut::Stereo16(&mut frames));
        }

        assert_eq!(capture.frames(), 44_100);
        assert_eq!(capture.peak_bin(), Some(1));
        assert_abs_diff_eq!(capture.magnitudes()[1], 0.5, epsilon = 0.02);
        assert_eq!(capture.last_buffer().len(), 441);
    }

    #[test]
    fn renderer_continues_phase_across_buffers() {
        let mut renderer = ToneRenderer::new(Oscillator::with_amplitude(1_000.0, 48_000.0, 0.5));
        let mut reference = Oscillator::with_amplitude(1_000.0, 48_000.0, 0.5);

        let mut frames = vec![StereoF32::default(); 64];
        renderer.render(SamplesMut::StereoFloat32(&mut frames));
        renderer.render(SamplesMut::StereoFloat32(&mut frames));

        let mut expected = vec![0.0; 64];
        reference.fill(&mut expected);
        reference.fill(&mut expected);
        for (frame, want) in frames.iter().zip(&expected) {
            assert_eq!(frame.left, *want);
            assert_eq!(frame.right, *want);
        }
    }

    #[test]
    fn empty_bank_has_no_peak() {
        let capture = SpectrumCapture::new(ResonatorBank::new(&[], 44_100.0, 1.0));
        assert_eq!(capture.peak_bin(), None);
    }
}
