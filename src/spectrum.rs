//! Frequency view of traces
//!
//! Magnitude of the real-input FFT of every row, keeping the
//! `n / 2 + 1` non-redundant bins.

use crate::dataset::TraceMatrix;
use crate::error::Result;
use rustfft::{num_complex::Complex, FftPlanner};

/// Number of bins produced for a trace of `n` samples
pub fn spectrum_len(n: usize) -> usize {
    n / 2 + 1
}

/// `|rfft(row)|` for every row of `traces`
pub fn magnitude_spectrum(traces: &TraceMatrix) -> Result<TraceMatrix> {
    let (rows, n) = traces.shape();
    let bins = spectrum_len(n);

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);

    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); n];
    let mut data = Vec::with_capacity(rows * bins);

    for row in traces.rows() {
        for (slot, &sample) in buffer.iter_mut().zip(row) {
            *slot = Complex::new(sample, 0.0);
        }
        fft.process(&mut buffer);
        data.extend(buffer.iter().take(bins).map(|c| c.norm()));
    }

    TraceMatrix::new(rows, bins, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_signal_has_only_dc() {
        let traces = TraceMatrix::from_rows(&[vec![2.0; 8]]).unwrap();
        let spectrum = magnitude_spectrum(&traces).unwrap();

        assert_eq!(spectrum.shape(), (1, 5));
        assert!((spectrum.row(0)[0] - 16.0).abs() < 1e-4);
        for &bin in &spectrum.row(0)[1..] {
            assert!(bin.abs() < 1e-4);
        }
    }

    #[test]
    fn test_single_tone_peaks_at_its_bin() {
        let n = 64;
        let tone: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 5.0 * i as f32 / n as f32).cos())
            .collect();
        let traces = TraceMatrix::from_rows(&[tone]).unwrap();
        let spectrum = magnitude_spectrum(&traces).unwrap();

        let row = spectrum.row(0);
        let peak = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 5);
        assert!((row[5] - n as f32 / 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_odd_length_bins() {
        assert_eq!(spectrum_len(7), 4);
        let traces = TraceMatrix::from_rows(&[vec![1.0; 7], vec![0.0; 7]]).unwrap();
        assert_eq!(magnitude_spectrum(&traces).unwrap().shape(), (2, 4));
    }
}
