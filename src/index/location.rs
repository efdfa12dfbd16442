use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a source file inside one project index
pub type FileId = u32;

/// A point in a source file: `(file_id, line, column)`.
///
/// Field order matters: the derived `Ord` sorts by file first, so every
/// key belonging to one file forms a contiguous range in an ordered store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Location {
    pub file_id: FileId,
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// The null location; sorts before every valid key
    pub const NULL: Location = Location {
        file_id: 0,
        line: 0,
        column: 0,
    };

    pub const fn new(file_id: FileId, line: u32, column: u32) -> Self {
        Self {
            file_id,
            line,
            column,
        }
    }

    /// A location is valid iff it names a resolved file
    pub const fn is_valid(&self) -> bool {
        self.file_id != 0
    }

    pub const fn is_null(&self) -> bool {
        !self.is_valid()
    }

    /// Smallest key in `file_id`
    pub const fn file_start(file_id: FileId) -> Self {
        Self::new(file_id, 0, 0)
    }

    /// Largest key in `file_id`
    pub const fn file_end(file_id: FileId) -> Self {
        Self::new(file_id, u32::MAX, u32::MAX)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_id, self.line, self.column)
    }
}

/// Error returned when a `file:line:column` string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected file:line:column, got {0:?}")]
pub struct ParseLocationError(pub String);

impl FromStr for Location {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let mut next = || -> Result<u32, ParseLocationError> {
            parts
                .next()
                .and_then(|p| p.trim().parse().ok())
                .ok_or_else(|| ParseLocationError(s.to_string()))
        };
        let file_id = next()?;
        let line = next()?;
        let column = next()?;
        Ok(Location::new(file_id, line, column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = Location::new(1, 5, 10);
        let b = Location::new(1, 5, 11);
        let c = Location::new(1, 6, 0);
        let d = Location::new(2, 0, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(c < d);

        let mut shuffled = vec![d, b, a, c];
        shuffled.sort();
        assert_eq!(shuffled, vec![a, b, c, d]);
    }

    #[test]
    fn test_null_location() {
        assert!(Location::NULL.is_null());
        assert!(!Location::NULL.is_valid());
        assert!(Location::new(1, 0, 0).is_valid());
        assert_eq!(Location::default(), Location::NULL);
        assert!(Location::NULL < Location::new(1, 0, 0));
    }

    #[test]
    fn test_file_range_bounds() {
        let start = Location::file_start(7);
        let end = Location::file_end(7);
        assert!(start <= Location::new(7, 0, 0));
        assert!(Location::new(7, 123, 45) <= end);
        assert!(Location::new(6, u32::MAX, u32::MAX) < start);
        assert!(end < Location::new(8, 0, 0));
    }

    #[test]
    fn test_display_and_parse() {
        let loc = Location::new(3, 14, 2);
        assert_eq!(loc.to_string(), "3:14:2");
        assert_eq!("3:14:2".parse::<Location>().unwrap(), loc);
        assert!("3:14".parse::<Location>().is_err());
        assert!("a:1:2".parse::<Location>().is_err());
    }

    #[test]
    fn test_parse_error_message() {
        let err = "main.c:4".parse::<Location>().unwrap_err();
        assert_eq!(err.to_string(), "expected file:line:column, got \"main.c:4\"");
        let _: &dyn std::error::Error = &err;
    }
}
