#![no_main]

use leakcluster::dataset::parse_dataset;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must yield a dataset or an error, never a panic
    if let Ok(dataset) = parse_dataset(data) {
        assert_eq!(dataset.len(), dataset.traces().n_rows());
        assert!(dataset.traces().n_cols() >= 1);
    }
});
