#![no_main]

use asmcov::disasm::{index_listing, ListingLayout};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let layout = ListingLayout {
        progress_interval: 0,
        ..ListingLayout::default()
    };
    let _ = index_listing(data, &layout);
});
