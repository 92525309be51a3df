use std::fmt;
use std::str::FromStr;

use super::error::LookupError;
use crate::store::RunFilter;

/// Longest accepted object id: a full 12-byte id in hex
const OBJECT_ID_MAX_LEN: usize = 24;

/// Which unique key a lookup goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    ObjectId,
    RunNumber,
    Timestamp,
}

impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::ObjectId => "objectid",
            IdentifierKind::RunNumber => "runnumber",
            IdentifierKind::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal document id: a hex token, stored lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ObjectId {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("object id is empty");
        }
        if s.len() > OBJECT_ID_MAX_LEN {
            return Err("object id is longer than 24 hex digits");
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err("object id must be hexadecimal");
        }
        Ok(ObjectId(s.to_ascii_lowercase()))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed run identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    ByObjectId(ObjectId),
    ByRunNumber(u64),
    ByTimestamp(String),
}

impl Identifier {
    /// Parse a raw path segment according to `kind`
    pub fn parse(kind: IdentifierKind, raw: &str) -> Result<Self, LookupError> {
        let invalid = |reason: &'static str| LookupError::InvalidIdentifier {
            kind,
            value: raw.to_string(),
            reason,
        };

        match kind {
            IdentifierKind::ObjectId => raw.parse().map(Identifier::ByObjectId).map_err(invalid),
            IdentifierKind::RunNumber => {
                if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("run number must be a non-negative integer"));
                }
                let number: u64 = raw.parse().map_err(|_| invalid("run number is out of range"))?;
                if number > i64::MAX as u64 {
                    return Err(invalid("run number is out of range"));
                }
                Ok(Identifier::ByRunNumber(number))
            }
            IdentifierKind::Timestamp => {
                if raw.is_empty() {
                    return Err(invalid("timestamp is empty"));
                }
                Ok(Identifier::ByTimestamp(raw.to_string()))
            }
        }
    }

    pub fn kind(&self) -> IdentifierKind {
        match self {
            Identifier::ByObjectId(_) => IdentifierKind::ObjectId,
            Identifier::ByRunNumber(_) => IdentifierKind::RunNumber,
            Identifier::ByTimestamp(_) => IdentifierKind::Timestamp,
        }
    }

    pub fn to_filter(&self) -> RunFilter {
        match self {
            Identifier::ByObjectId(id) => RunFilter::Id(id.as_str().to_string()),
            // parse() caps run numbers at i64::MAX
            Identifier::ByRunNumber(n) => RunFilter::Number(*n as i64),
            Identifier::ByTimestamp(name) => RunFilter::Name(name.clone()),
        }
    }
}

/// Map an identifier kind and raw value to a store filter
pub fn resolve(kind: IdentifierKind, raw: &str) -> Result<RunFilter, LookupError> {
    Identifier::parse(kind, raw).map(|id| id.to_filter())
}
