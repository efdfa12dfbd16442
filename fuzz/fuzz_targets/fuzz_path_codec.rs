#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Anything encodable must decode back to itself
    if let Ok(name) = symdex::utils::encode_path(Path::new(text)) {
        assert!(!name.contains('/'));
        assert_eq!(symdex::utils::decode_path(&name), Path::new(text));
    }
    let _ = symdex::utils::HostAddress::parse(text);
    let _ = text.parse::<symdex::index::Location>();
});
