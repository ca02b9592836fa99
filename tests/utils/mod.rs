// Integration test utilities
//
// Synthetic labeled trace sets: every program has its own waveform plus
// seeded noise, so datasets are reproducible and targets are separable.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Samples per synthetic trace
pub const TRACE_LEN: usize = 32;

/// One trace of program `label`
fn waveform(label: u32, rng: &mut StdRng) -> Vec<f32> {
    (0..TRACE_LEN)
        .map(|j| {
            let t = j as f32 / TRACE_LEN as f32;
            let base = match label {
                0 => (2.0 * std::f32::consts::PI * 2.0 * t).sin(),
                1 => (2.0 * std::f32::consts::PI * 2.0 * t).cos(),
                _ => {
                    let bump = if (10..14).contains(&j) { label as f32 * 0.3 } else { 0.0 };
                    (2.0 * std::f32::consts::PI * 2.0 * t).sin() + bump
                }
            };
            base + rng.gen_range(-0.1..0.1)
        })
        .collect()
}

/// Rows and labels for consecutive `(label, count)` blocks
pub fn synthetic_rows(blocks: &[(u32, usize)], seed: u64) -> (Vec<Vec<f32>>, Vec<u32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for &(label, count) in blocks {
        for _ in 0..count {
            rows.push(waveform(label, &mut rng));
            labels.push(label);
        }
    }
    (rows, labels)
}

/// The same rows rendered as `samples..., label` CSV text
pub fn synthetic_csv(blocks: &[(u32, usize)], seed: u64) -> String {
    let (rows, labels) = synthetic_rows(blocks, seed);
    let mut text = String::new();
    for (row, label) in rows.iter().zip(labels) {
        let values: Vec<String> = row.iter().map(|v| format!("{:.6}", v)).collect();
        text.push_str(&values.join(","));
        text.push_str(&format!(",{}\n", label));
    }
    text
}

/// Write a synthetic dataset named `file_name` into `dir`
pub fn write_dataset(dir: &Path, file_name: &str, blocks: &[(u32, usize)], seed: u64) -> PathBuf {
    let path = dir.join(file_name);
    let mut file = std::fs::File::create(&path).expect("create dataset file");
    file.write_all(synthetic_csv(blocks, seed).as_bytes())
        .expect("write dataset file");
    path
}

/// Blocks of the standard scenario: two baselines and two targets
pub fn standard_blocks() -> Vec<(u32, usize)> {
    vec![(0, 100), (1, 100), (2, 60), (4, 108)]
}
