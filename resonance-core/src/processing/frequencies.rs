//! Frequency grids for resonator banks and a few related conversions.

/// Speed of sound at room temperature, in m/s.
pub const SPEED_OF_SOUND: f32 = 346.0;

/// Index of A4 when index 0 is C0.
pub const A4_INDEX: i32 = 57;

/// Equal-temperament pitches for note indices `from..=to`.
///
/// Index 0 is C0 and A4 (index 57) is tuned to `tuning` Hz. The piano range is
/// A0 = 9 (27.5 Hz) to C8 = 96 (≈4186 Hz).
pub fn musical_pitch_frequencies(from: i32, to: i32, tuning: f32) -> Vec<f32> {
    (from..=to)
        .map(|idx| tuning * 2.0f32.powf((idx - A4_INDEX) as f32 / 12.0))
        .collect()
}

/// `num_bins` frequencies spaced uniformly on a log scale from `min_frequency`.
pub fn log_uniform_frequencies(min_frequency: f32, num_bins: usize, bins_per_octave: usize) -> Vec<f32> {
    (0..num_bins)
        .map(|bin| min_frequency * 2.0f32.powf(bin as f32 / bins_per_octave as f32))
        .collect()
}

/// `num_mels` frequencies equally spaced on the mel scale between the limits.
///
/// `htk` selects the HTK formula; otherwise the Slaney (Auditory Toolbox)
/// formula with a linear range below 1 kHz is used.
pub fn mel_frequencies(num_mels: usize, min_frequency: f32, max_frequency: f32, htk: bool) -> Vec<f32> {
    let (to_mel, to_hz): (fn(f32) -> f32, fn(f32) -> f32) = if htk {
        (hz_to_mel_htk, mel_to_hz_htk)
    } else {
        (hz_to_mel, mel_to_hz)
    };
    let min_mel = to_mel(min_frequency);
    let max_mel = to_mel(max_frequency);
    let steps = num_mels.saturating_sub(1).max(1) as f32;

    (0..num_mels)
        .map(|i| to_hz(min_mel + (max_mel - min_mel) * i as f32 / steps))
        .collect()
}

const SLANEY_SP: f32 = 200.0 / 3.0;
const SLANEY_MIN_LOG_HZ: f32 = 1000.0;

fn slaney_logstep() -> f32 {
    6.4f32.ln() / 27.0
}

/// Hz to mels, Slaney formula.
pub fn hz_to_mel(frequency: f32) -> f32 {
    if frequency < SLANEY_MIN_LOG_HZ {
        return frequency / SLANEY_SP;
    }
    let min_log_mel = SLANEY_MIN_LOG_HZ / SLANEY_SP;
    min_log_mel + (frequency / SLANEY_MIN_LOG_HZ).ln() / slaney_logstep()
}

/// Mels to Hz, Slaney formula.
pub fn mel_to_hz(mel: f32) -> f32 {
    let min_log_mel = SLANEY_MIN_LOG_HZ / SLANEY_SP;
    if mel < min_log_mel {
        return SLANEY_SP * mel;
    }
    SLANEY_MIN_LOG_HZ * (slaney_logstep() * (mel - min_log_mel)).exp()
}

pub fn hz_to_mel_htk(frequency: f32) -> f32 {
    2595.0 * (1.0 + frequency / 700.0).log10()
}

pub fn mel_to_hz_htk(mel: f32) -> f32 {
    700.0 * (10.0f32.powf(mel / 2595.0) - 1.0)
}

/// Relative velocity (m/s, positive when approaching) of a source emitting
/// `reference_frequency` that is observed at `observed_frequency`.
pub fn doppler_velocity(observed_frequency: f32, reference_frequency: f32) -> f32 {
    if reference_frequency <= 0.0 {
        return 0.0;
    }
    SPEED_OF_SOUND * (observed_frequency - reference_frequency) / reference_frequency
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    use super::*;

    #[test]
    fn equal_temperament_reference_pitches() {
        let freqs = musical_pitch_frequencies(0, 116, 440.0);
        assert_eq!(freqs.len(), 117);

        for &(index, expected) in &[(0, 16.351_597), (9, 27.5), (57, 440.0), (96, 4186.008_8), (116, 13289.748)] {
            assert_relative_eq!(freqs[index], expected, max_relative = 2e-7);
        }
    }

    #[test]
    fn piano_scenario_subset() {
        let freqs = musical_pitch_frequencies(0, 96, 440.0);
        let picked: Vec<f32> = [0usize, 9, 57, 96].iter().map(|&i| freqs[i]).collect();
        // A few ulps at each magnitude.
        assert_abs_diff_eq!(picked[0], 16.351_597, epsilon = 1e-5);
        assert_abs_diff_eq!(picked[1], 27.5, epsilon = 1e-6);
        assert_abs_diff_eq!(picked[2], 440.0, epsilon = 1e-6);
        assert_abs_diff_eq!(picked[3], 4186.008_8, epsilon = 1e-3);
    }

    #[test]
    fn custom_tuning() {
        let freqs = musical_pitch_frequencies(0, 116, 441.0);
        assert_relative_eq!(freqs[0], 16.388_76, max_relative = 1e-5);
        assert_relative_eq!(freqs[9], 27.5625, max_relative = 1e-5);
        assert_relative_eq!(freqs[57], 441.0, max_relative = 1e-6);
        assert_relative_eq!(freqs[96], 4195.5225, max_relative = 1e-5);
    }

    #[test]
    fn sub_range_starts_at_from() {
        let freqs = musical_pitch_frequencies(57, 69, 440.0);
        assert_eq!(freqs.len(), 13);
        assert_relative_eq!(freqs[0], 440.0);
        assert_relative_eq!(freqs[12], 880.0, max_relative = 1e-6);
    }

    #[test]
    fn log_uniform_distribution() {
        let freqs = log_uniform_frequencies(32.70, 84, 12);
        assert_eq!(freqs.len(), 84);
        assert_abs_diff_eq!(freqs[0], 32.70, epsilon = 1e-6);
        assert_abs_diff_eq!(freqs[83], 3950.68, epsilon = 0.01);
        assert_abs_diff_eq!(freqs[2] / freqs[1], freqs[1] / freqs[0], epsilon = 1e-5);
        assert_abs_diff_eq!(freqs[83] / freqs[82], freqs[82] / freqs[81], epsilon = 1e-5);
    }

    #[test]
    fn mel_grid_hits_limits() {
        for htk in [false, true] {
            let freqs = mel_frequencies(128, 0.0, 11025.0, htk);
            assert_eq!(freqs.len(), 128);
            assert_eq!(freqs[0], 0.0);
            assert_relative_eq!(freqs[127], 11025.0, max_relative = 1e-5);
            assert!(freqs.windows(2).all(|w| w[1] > w[0]));
        }
    }

    #[test]
    fn slaney_is_linear_below_one_khz() {
        assert_abs_diff_eq!(hz_to_mel(200.0 / 3.0), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hz_to_mel(1000.0), 15.0, epsilon = 1e-4);
        assert_relative_eq!(mel_to_hz(hz_to_mel(4000.0)), 4000.0, max_relative = 1e-5);
    }

    #[test]
    fn htk_reference_point() {
        // 1000 Hz is ~1000 mel on the HTK scale.
        assert_abs_diff_eq!(hz_to_mel_htk(1000.0), 1000.0, epsilon = 0.1);
        assert_relative_eq!(mel_to_hz_htk(hz_to_mel_htk(2500.0)), 2500.0, max_relative = 1e-5);
    }

    #[test]
    fn doppler() {
        assert_abs_diff_eq!(doppler_velocity(440.0, 441.0), -0.784_580_47, epsilon = 1e-6);
        assert_abs_diff_eq!(doppler_velocity(441.0, 440.0), 0.786_363_66, epsilon = 1e-6);
        assert_eq!(doppler_velocity(440.0, 0.0), 0.0);
    }
}
