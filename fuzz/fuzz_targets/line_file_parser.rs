#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary text must parse or be rejected, never panic
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok((_, set)) = asmcov::line_file::parse(input) {
            let _ = asmcov::line_file::render(&set);
        }
    }
});
