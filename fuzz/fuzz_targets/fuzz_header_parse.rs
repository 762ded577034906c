#![no_main]
use asar_rs::core::header::{parse_header, parse_header_size};
use libfuzzer_sys::fuzz_target;

// Header decoding must reject garbage without panicking
fuzz_target!(|input: &[u8]| {
    if input.len() >= 8 {
        let _ = parse_header_size(&input[..8]);
    }
    if let Ok((_, namespace)) = parse_header(input.to_vec()) {
        let _ = namespace.list_paths(true);
        for (path, _) in namespace.walk() {
            let _ = namespace.lookup_resolved(&path, true);
        }
    }
});
