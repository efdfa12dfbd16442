use crate::index::location::Location;
use crate::index::types::{FixIt, Source, SymbolInfo, SymbolKind, TargetKind, UnitType};
use crate::utils::encoding::{Codec, Decoder};

impl Codec for Location {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.file_id.encode(buf);
        self.line.encode(buf);
        self.column.encode(buf);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        Some(Location::new(
            u32::decode(dec)?,
            u32::decode(dec)?,
            u32::decode(dec)?,
        ))
    }
}

impl Codec for TargetKind {
    fn encode(&self, buf: &mut Vec<u8>) {
        (*self as u16).encode(buf);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        TargetKind::from_u16(u16::decode(dec)?)
    }
}

impl Codec for SymbolKind {
    fn encode(&self, buf: &mut Vec<u8>) {
        (*self as u16).encode(buf);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        Some(SymbolKind::from_u16(u16::decode(dec)?))
    }
}

impl Codec for UnitType {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(*self as u8);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        match dec.bytes(1)?[0] {
            0 => Some(UnitType::CompileC),
            1 => Some(UnitType::CompileCPlusPlus),
            _ => None,
        }
    }
}

impl Codec for SymbolInfo {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.symbol_name.encode(buf);
        self.usr.encode(buf);
        self.kind.encode(buf);
        self.symbol_length.encode(buf);
        self.type_name.encode(buf);
        self.is_definition.encode(buf);
        self.start_line.encode(buf);
        self.start_column.encode(buf);
        self.end_line.encode(buf);
        self.end_column.encode(buf);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        Some(SymbolInfo {
            symbol_name: Codec::decode(dec)?,
            usr: Codec::decode(dec)?,
            kind: Codec::decode(dec)?,
            symbol_length: Codec::decode(dec)?,
            type_name: Codec::decode(dec)?,
            is_definition: Codec::decode(dec)?,
            start_line: Codec::decode(dec)?,
            start_column: Codec::decode(dec)?,
            end_line: Codec::decode(dec)?,
            end_column: Codec::decode(dec)?,
        })
    }
}

impl Codec for Source {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.file_id.encode(buf);
        self.build_root_id.encode(buf);
        self.compiler.encode(buf);
        self.directory.encode(buf);
        self.arguments.encode(buf);
        self.defines.encode(buf);
        self.include_paths.encode(buf);
        self.unit_type.encode(buf);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        Some(Source {
            file_id: Codec::decode(dec)?,
            build_root_id: Codec::decode(dec)?,
            compiler: Codec::decode(dec)?,
            directory: Codec::decode(dec)?,
            arguments: Codec::decode(dec)?,
            defines: Codec::decode(dec)?,
            include_paths: Codec::decode(dec)?,
            unit_type: Codec::decode(dec)?,
        })
    }
}

impl Codec for FixIt {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.line.encode(buf);
        self.column.encode(buf);
        self.length.encode(buf);
        self.text.encode(buf);
    }

    fn decode(dec: &mut Decoder<'_>) -> Option<Self> {
        Some(FixIt {
            line: Codec::decode(dec)?,
            column: Codec::decode(dec)?,
            length: Codec::decode(dec)?,
            text: Codec::decode(dec)?,
        })
    }
}
