use std::sync::Arc;

use anyhow::Result;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Spectrum analysis parameters.
#[derive(Clone, Copy, Debug)]
pub struct SpectrumConfig {
    /// FFT size in samples. Must be a power of two.
    pub fft_size: usize,
    /// Number of output bars.
    pub bars: usize,
    /// Dynamic range floor in dB: a bar at -floor_db maps to 0.0, 0 dB to 1.0.
    /// Tuned constant, not derived from the input.
    pub floor_db: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            bars: 64,
            floor_db: 60.0,
        }
    }
}

impl SpectrumConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || self.fft_size < 4 {
            anyhow::bail!("fft_size must be a power of two >= 4, got {}", self.fft_size);
        }
        if self.bars == 0 || self.bars > self.fft_size / 2 {
            anyhow::bail!(
                "bars must be in 1..={}, got {}",
                self.fft_size / 2,
                self.bars
            );
        }
        if self.floor_db <= 0.0 {
            anyhow::bail!("floor_db must be positive, got {}", self.floor_db);
        }
        Ok(())
    }
}

/// Transforms one PCM chunk into normalized spectrum bars.
///
/// Pure per call: identical input yields an identical frame. The output is
/// always exactly `bars` values in [0, 1], lowest frequency first; malformed
/// input degrades to a flat frame, never an error.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    fft_size: usize,
    bars: usize,
    floor_db: f64,
}

impl SpectrumAnalyzer {
    pub fn new(config: &SpectrumConfig) -> Result<Self> {
        config.validate()?;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        Ok(Self {
            fft,
            window: hamming_window(config.fft_size),
            fft_size: config.fft_size,
            bars: config.bars,
            floor_db: config.floor_db as f64,
        })
    }

    /// Analyze one mono PCM chunk into `bars` normalized magnitudes.
    pub fn analyze(&self, pcm: &[f32]) -> Vec<f32> {
        if pcm.len() != self.fft_size {
            log::warn!(
                "PCM chunk had {} samples, expected {}; resizing",
                pcm.len(),
                self.fft_size
            );
        }

        // Windowed complex buffer, truncated or zero-padded to the FFT size.
        let mut buffer: Vec<Complex<f32>> = (0..self.fft_size)
            .map(|i| {
                let sample = pcm.get(i).copied().unwrap_or(0.0);
                Complex::new(sample * self.window[i], 0.0)
            })
            .collect();

        self.fft.process(&mut buffer);

        self.to_bars(&buffer)
    }

    /// Group positive-frequency FFT bins into logarithmically spaced bars.
    fn to_bars(&self, fft_data: &[Complex<f32>]) -> Vec<f32> {
        // Only the first half of the FFT carries positive frequencies.
        let usable = self.fft_size / 2;
        let log2_usable = (usable as f64).log2();

        let mut spectrum = vec![0.0f32; self.bars];

        for (i, bar) in spectrum.iter_mut().enumerate() {
            let start_freq = 2f64.powf(i as f64 / self.bars as f64 * log2_usable);
            let end_freq = 2f64.powf((i + 1) as f64 / self.bars as f64 * log2_usable);

            // Floor for the start, ceiling for the end; bin 0 (DC) is never
            // included, and adjacent bars may share a boundary bin.
            let start_bin = (start_freq.floor() as usize).clamp(1, usable - 1);
            let end_bin = (end_freq.ceil() as usize).min(usable - 1).max(start_bin);

            let mut magnitude = 0.0f64;
            for bin in start_bin..=end_bin {
                magnitude += fft_data[bin].norm() as f64;
            }
            magnitude /= (end_bin - start_bin + 1) as f64;

            // dB scale against a fixed dynamic-range floor.
            let db = 20.0 * (magnitude + 1e-10).log10();
            let normalized = (db + self.floor_db) / self.floor_db;

            *bar = if normalized.is_finite() {
                normalized.clamp(0.0, 1.0) as f32
            } else {
                0.0
            };
        }

        spectrum
    }

    /// Bin range a bar reads from, using the same boundary math as
    /// `to_bars`. Exposed for renderers that label bars with frequencies.
    pub fn bar_bin_range(&self, bar: usize) -> (usize, usize) {
        let usable = self.fft_size / 2;
        let log2_usable = (usable as f64).log2();
        let start_freq = 2f64.powf(bar as f64 / self.bars as f64 * log2_usable);
        let end_freq = 2f64.powf((bar + 1) as f64 / self.bars as f64 * log2_usable);
        let start_bin = (start_freq.floor() as usize).clamp(1, usable - 1);
        let end_bin = (end_freq.ceil() as usize).min(usable - 1).max(start_bin);
        (start_bin, end_bin)
    }
}

fn hamming_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            (0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
                as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> SpectrumAnalyzer {
        SpectrumAnalyzer::new(&SpectrumConfig::default()).unwrap()
    }

    fn sine(freq_hz: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq_hz * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn output_has_fixed_shape() {
        let analyzer = analyzer();
        for input_len in [0, 1, 512, 1024, 4096] {
            let frame = analyzer.analyze(&vec![0.25; input_len]);
            assert_eq!(frame.len(), 64);
            assert!(frame.iter().all(|b| (0.0..=1.0).contains(b)));
        }
    }

    #[test]
    fn analysis_is_deterministic() {
        let analyzer = analyzer();
        let chunk = sine(1000.0, 44100.0, 1024);
        let a = analyzer.analyze(&chunk);
        let b = analyzer.analyze(&chunk);
        assert_eq!(a, b);
    }

    #[test]
    fn silence_maps_to_zero_bars() {
        let analyzer = analyzer();
        let frame = analyzer.analyze(&vec![0.0; 1024]);
        // 20*log10(1e-10) = -200 dB, far below the -60 dB floor.
        assert!(frame.iter().all(|b| *b == 0.0));
    }

    #[test]
    fn dc_bin_is_never_included() {
        for (fft_size, bars) in [(1024, 64), (1024, 32), (2048, 64), (512, 16), (256, 128)] {
            let analyzer = SpectrumAnalyzer::new(&SpectrumConfig {
                fft_size,
                bars,
                floor_db: 60.0,
            })
            .unwrap();
            for bar in 0..bars {
                let (start, end) = analyzer.bar_bin_range(bar);
                assert!(start >= 1, "fft={} bars={} bar={}", fft_size, bars, bar);
                assert!(end < fft_size / 2);
                assert!(start <= end);
            }
        }
    }

    #[test]
    fn bar_ranges_are_nondecreasing() {
        let analyzer = analyzer();
        let mut prev_start = 0;
        for bar in 0..64 {
            let (start, _) = analyzer.bar_bin_range(bar);
            assert!(start >= prev_start);
            prev_start = start;
        }
    }

    #[test]
    fn sine_peak_lands_in_matching_bar() {
        let analyzer = analyzer();
        // Quiet tone: a full-scale sine saturates several bars at 1.0 under
        // the -60 dB floor mapping, which would make the argmax ambiguous.
        let chunk: Vec<f32> = sine(1000.0, 44100.0, 1024).iter().map(|s| s * 1e-3).collect();
        let frame = analyzer.analyze(&chunk);

        let peak_bar = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        // 1 kHz at 44.1kHz/1024 lands in FFT bin ~23; the winning bar's
        // range must cover it.
        let bin_of_1khz = (1000.0_f64 / (44100.0 / 1024.0)).round() as usize;
        assert_eq!(bin_of_1khz, 23);
        let (start, end) = analyzer.bar_bin_range(peak_bar);
        assert!(
            start <= bin_of_1khz && bin_of_1khz <= end,
            "peak bar {} covers bins {}..={}",
            peak_bar,
            start,
            end
        );
    }

    #[test]
    fn louder_signal_raises_bars() {
        let analyzer = analyzer();
        let quiet: Vec<f32> = sine(1000.0, 44100.0, 1024).iter().map(|s| s * 1e-5).collect();
        let loud: Vec<f32> = sine(1000.0, 44100.0, 1024).iter().map(|s| s * 1e-2).collect();
        let quiet_frame = analyzer.analyze(&quiet);
        let loud_frame = analyzer.analyze(&loud);
        let q_max = quiet_frame.iter().cloned().fold(0.0f32, f32::max);
        let l_max = loud_frame.iter().cloned().fold(0.0f32, f32::max);
        assert!(l_max > q_max);
    }

    #[test]
    fn nan_input_degrades_to_flat_frame() {
        let analyzer = analyzer();
        let frame = analyzer.analyze(&vec![f32::NAN; 1024]);
        assert_eq!(frame.len(), 64);
        assert!(frame.iter().all(|b| *b == 0.0));
    }

    #[test]
    fn rejects_bad_config() {
        assert!(SpectrumConfig {
            fft_size: 1000,
            bars: 64,
            floor_db: 60.0
        }
        .validate()
        .is_err());
        assert!(SpectrumConfig {
            fft_size: 1024,
            bars: 0,
            floor_db: 60.0
        }
        .validate()
        .is_err());
        assert!(SpectrumConfig {
            fft_size: 1024,
            bars: 1024,
            floor_db: 60.0
        }
        .validate()
        .is_err());
        assert!(SpectrumConfig {
            fft_size: 1024,
            bars: 64,
            floor_db: 0.0
        }
        .validate()
        .is_err());
    }
}
