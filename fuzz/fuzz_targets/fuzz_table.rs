#![no_main]

use libfuzzer_sys::fuzz_target;
use std::collections::{BTreeMap, BTreeSet};
use symdex::index::{FixIt, Location, Source, SymbolInfo, TargetKind};
use symdex::utils::encoding::{Codec, Decoder};

fuzz_target!(|data: &[u8]| {
    // Decoding table values from arbitrary bytes must fail cleanly
    let _ = SymbolInfo::decode(&mut Decoder::new(data));
    let _ = Source::decode(&mut Decoder::new(data));
    let _ = BTreeSet::<Location>::decode(&mut Decoder::new(data));
    let _ = BTreeMap::<Location, TargetKind>::decode(&mut Decoder::new(data));
    let _ = BTreeSet::<FixIt>::decode(&mut Decoder::new(data));
});
