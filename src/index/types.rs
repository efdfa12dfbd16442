use crate::index::location::{FileId, Location};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk index format version; a mismatch requires a rebuild
pub const INDEX_VERSION: u32 = 1025;

/// Translation unit identifier: `(build_root_id << 32) | file_id`
pub type UnitId = u64;

/// Kind of the cursor a symbol was declared by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum SymbolKind {
    #[default]
    Unknown = 0,
    Namespace = 1,
    Class = 2,
    Struct = 3,
    Union = 4,
    Enum = 5,
    EnumConstant = 6,
    Function = 7,
    Method = 8,
    Constructor = 9,
    Destructor = 10,
    Field = 11,
    Variable = 12,
    Parameter = 13,
    Typedef = 14,
    Macro = 15,
    Include = 16,
}

impl SymbolKind {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => SymbolKind::Namespace,
            2 => SymbolKind::Class,
            3 => SymbolKind::Struct,
            4 => SymbolKind::Union,
            5 => SymbolKind::Enum,
            6 => SymbolKind::EnumConstant,
            7 => SymbolKind::Function,
            8 => SymbolKind::Method,
            9 => SymbolKind::Constructor,
            10 => SymbolKind::Destructor,
            11 => SymbolKind::Field,
            12 => SymbolKind::Variable,
            13 => SymbolKind::Parameter,
            14 => SymbolKind::Typedef,
            15 => SymbolKind::Macro,
            16 => SymbolKind::Include,
            _ => SymbolKind::Unknown,
        }
    }

    /// Kinds that introduce a type name
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            SymbolKind::Class
                | SymbolKind::Struct
                | SymbolKind::Union
                | SymbolKind::Enum
                | SymbolKind::Typedef
        )
    }
}

/// Relation from a reference site to one of its targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum TargetKind {
    #[default]
    Reference = 0,
    Definition = 1,
    Declaration = 2,
    Override = 3,
}

impl TargetKind {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(TargetKind::Reference),
            1 => Some(TargetKind::Definition),
            2 => Some(TargetKind::Declaration),
            3 => Some(TargetKind::Override),
            _ => None,
        }
    }
}

/// Language mode a translation unit was compiled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum UnitType {
    #[default]
    CompileC = 0,
    CompileCPlusPlus = 1,
}

/// Descriptor of one declaration or definition site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SymbolInfo {
    pub symbol_name: String,
    #[serde(default)]
    pub usr: String,
    #[serde(default)]
    pub kind: SymbolKind,
    #[serde(default)]
    pub symbol_length: u32,
    #[serde(default)]
    pub type_name: Option<String>,
    #[serde(default)]
    pub is_definition: bool,
    #[serde(default)]
    pub start_line: u32,
    #[serde(default)]
    pub start_column: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(default)]
    pub end_column: u32,
}

impl SymbolInfo {
    /// Name under which the symbol is registered in the name index.
    ///
    /// Qualified names (`ns::Class::method`) are also reachable by their
    /// trailing component.
    pub fn lookup_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if self.symbol_name.is_empty() {
            return names;
        }
        names.push(self.symbol_name.as_str());
        if let Some(idx) = self.symbol_name.rfind("::") {
            let short = &self.symbol_name[idx + 2..];
            if !short.is_empty() {
                names.push(short);
            }
        }
        names
    }
}

/// Compile configuration of a translation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Source {
    pub file_id: FileId,
    #[serde(default)]
    pub build_root_id: u32,
    #[serde(default)]
    pub compiler: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub unit_type: UnitType,
}

impl Source {
    pub fn key(&self) -> UnitId {
        unit_key(self.file_id, self.build_root_id)
    }
}

/// Build the translation unit key for a source file under a build root
pub fn unit_key(file_id: FileId, build_root_id: u32) -> UnitId {
    ((build_root_id as u64) << 32) | file_id as u64
}

/// Suggested fix reported by the compiler for one file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FixIt {
    pub line: u32,
    pub column: u32,
    pub length: u32,
    pub text: String,
}

/// A reference edge produced by analysis: `from` refers to `to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFact {
    pub from: Location,
    pub to: Location,
    #[serde(default)]
    pub kind: TargetKind,
}

/// Index metadata stored in meta.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub root_path: PathBuf,
    #[serde(default)]
    pub file_count: u32,
    #[serde(default)]
    pub symbol_count: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Default for IndexMeta {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            root_path: PathBuf::new(),
            file_count: 0,
            symbol_count: 0,
            created_at: 0,
            updated_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_kind_roundtrip_repr() {
        for kind in [
            SymbolKind::Namespace,
            SymbolKind::Method,
            SymbolKind::Include,
            SymbolKind::Unknown,
        ] {
            assert_eq!(SymbolKind::from_u16(kind as u16), kind);
        }
        assert_eq!(SymbolKind::from_u16(999), SymbolKind::Unknown);
        assert!(SymbolKind::Struct.is_type());
        assert!(!SymbolKind::Function.is_type());
    }

    #[test]
    fn test_target_kind_unknown_tag() {
        assert_eq!(TargetKind::from_u16(3), Some(TargetKind::Override));
        assert_eq!(TargetKind::from_u16(42), None);
    }

    #[test]
    fn test_unit_key() {
        let source = Source {
            file_id: 7,
            build_root_id: 2,
            ..Default::default()
        };
        assert_eq!(source.key(), (2u64 << 32) | 7);
        assert_ne!(unit_key(7, 1), unit_key(7, 2));
    }

    #[test]
    fn test_lookup_names_qualified() {
        let info = SymbolInfo {
            symbol_name: "ns::Widget::draw".to_string(),
            ..Default::default()
        };
        assert_eq!(info.lookup_names(), vec!["ns::Widget::draw", "draw"]);

        let plain = SymbolInfo {
            symbol_name: "main".to_string(),
            ..Default::default()
        };
        assert_eq!(plain.lookup_names(), vec!["main"]);
        assert!(SymbolInfo::default().lookup_names().is_empty());
    }

    #[test]
    fn test_symbol_info_partial_json() {
        let json = r#"{"symbol_name": "foo", "kind": "function"}"#;
        let info: SymbolInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.kind, SymbolKind::Function);
        assert!(!info.is_definition);
        assert_eq!(info.type_name, None);
    }

    #[test]
    fn test_meta_default_version() {
        assert_eq!(IndexMeta::default().version, INDEX_VERSION);
    }
}
