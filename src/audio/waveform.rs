//! Recording level meter.
//!
//! While the microphone is open the UI shows a bar chart of the most recent
//! audio.  [`level_bars`] turns the tail of the captured mono signal into
//! `n` RMS values in `[0.0, 1.0]`.

/// Compute `num_bars` RMS amplitudes over `audio`, oldest bar first.
///
/// The signal is split into equal windows; when there are fewer samples than
/// bars the missing bars are `0.0`.  `num_bars == 0` yields an empty vector.
///
/// ```rust
/// use voice_to_ui::audio::level_bars;
///
/// let audio = vec![0.5_f32; 1_600];
/// let bars = level_bars(&audio, 8);
/// assert_eq!(bars.len(), 8);
/// assert!(bars.iter().all(|b| (b - 0.5).abs() < 1e-4));
/// ```
pub fn level_bars(audio: &[f32], num_bars: usize) -> Vec<f32> {
    if num_bars == 0 {
        return Vec::new();
    }

    let window = (audio.len() / num_bars).max(1);
    let mut bars: Vec<f32> = audio
        .chunks(window)
        .take(num_bars)
        .map(|w| {
            let mean_sq = w.iter().map(|s| s * s).sum::<f32>() / w.len() as f32;
            mean_sq.sqrt().min(1.0)
        })
        .collect();

    bars.resize(num_bars, 0.0);
    bars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_audio_gives_silent_bars() {
        assert_eq!(level_bars(&[], 4), vec![0.0; 4]);
    }

    #[test]
    fn zero_bars() {
        assert!(level_bars(&[0.3; 100], 0).is_empty());
    }

    #[test]
    fn full_scale_is_clamped() {
        let bars = level_bars(&[1.0; 1_000], 10);
        assert!(bars.iter().all(|&b| (0.0..=1.0).contains(&b)));
    }

    #[test]
    fn short_audio_is_padded() {
        let bars = level_bars(&[0.5], 5);
        assert_eq!(bars.len(), 5);
        assert!(bars[1..].iter().all(|&b| b == 0.0));
    }
}
