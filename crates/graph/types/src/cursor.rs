//! Cursor codec.
//!
//! A cursor is the storage key of a relation inside its anchor address's keyspace and doubles
//! as the pagination token handed to clients: `"<entityId>;<ts>;<hash>"`. Both numeric fields are
//! radix-252 encoded at a fixed width so byte-wise comparison orders cursors by timestamp and
//! then by hash.

use crate::{NodeId, Relation, RelationId, radix};
use alloy_primitives::{U256, keccak256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Relations per page of `fetch_address_rels`.
pub const PAGE_SIZE: usize = 50;

/// Digits used for the timestamp field (covers timestamps up to ~2.5e14).
pub const TS_WIDTH: usize = 6;

/// Digits used for the hash field (covers the 31-bit hash).
pub const HASH_WIDTH: usize = 4;

const SEPARATOR: char = ';';

/// Errors returned when decoding a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// The cursor does not have exactly three `;` separated fields.
    #[error("malformed cursor {0:?}")]
    Malformed(String),
    /// The entity id field is invalid.
    #[error("invalid cursor entity: {0}")]
    Entity(#[from] crate::IdError),
    /// Only addresses are paginated.
    #[error("cursor entity {0} is not paginated")]
    NotPaginated(String),
    /// A numeric field is invalid.
    #[error("invalid cursor field: {0}")]
    Field(#[from] radix::RadixError),
    /// The timestamp cannot be expressed in milliseconds.
    #[error("cursor timestamp out of range")]
    TimeOutOfRange,
}

/// Decoded form of a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCursor {
    /// The paginated entity.
    pub id: NodeId,
    /// Relation timestamp in seconds.
    pub ts: u64,
    /// Relation timestamp in milliseconds.
    pub time_ms: u64,
    /// Disambiguating hash of the relation identity.
    pub hash: u32,
}

/// A sortable pagination token for an address's relations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GraphCursor {
    raw: String,
    id: NodeId,
}

impl GraphCursor {
    /// Encodes `(id, ts, hash)` into a cursor.
    pub fn encode(id: &NodeId, ts: u64, hash: u32) -> Self {
        let raw = format!(
            "{id}{SEPARATOR}{}{SEPARATOR}{}",
            radix::encode_padded(U256::from(ts), TS_WIDTH),
            radix::encode_padded(U256::from(hash), HASH_WIDTH),
        );
        Self { raw, id: id.clone() }
    }

    /// Decodes a cursor string.
    pub fn decode(input: &str) -> Result<ParsedCursor, CursorError> {
        let mut fields = input.split(SEPARATOR);
        let (Some(id), Some(ts), Some(hash), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(CursorError::Malformed(input.into()));
        };
        let id: NodeId = id.parse()?;
        if !id.is_address() {
            return Err(CursorError::NotPaginated(id.to_string()));
        }
        let ts = radix::decode_u64(ts)?;
        let hash = u32::try_from(radix::decode(hash)?).map_err(|_| radix::RadixError::Overflow)?;
        let time_ms = ts.checked_mul(1000).ok_or(CursorError::TimeOutOfRange)?;
        Ok(ParsedCursor { id, ts, time_ms, hash })
    }

    /// Parses and validates a cursor string.
    pub fn parse(input: &str) -> Result<Self, CursorError> {
        let parsed = Self::decode(input)?;
        Ok(Self { raw: input.to_string(), id: parsed.id })
    }

    /// The first cursor of an entity, sorting before every relation of it.
    pub fn start(id: &NodeId) -> Self {
        Self::encode(id, 0, 0)
    }

    /// The storage key of `relation` inside the keyspace of `id`.
    pub fn for_relation(id: &NodeId, relation: &Relation) -> Self {
        Self::encode(id, relation.ts, relation_hash(id, &relation.id))
    }

    /// Advances past `page`.
    ///
    /// A page shorter than [`PAGE_SIZE`] signals the end of the data, and the cursor is returned
    /// unchanged.
    pub fn next_cursor(&self, page: &[Relation]) -> Self {
        match page.last() {
            Some(last) if page.len() >= PAGE_SIZE => Self::for_relation(&self.id, last),
            _ => self.clone(),
        }
    }

    /// The paginated entity.
    pub const fn entity_id(&self) -> &NodeId {
        &self.id
    }

    /// Returns true if this is the start cursor of its entity.
    pub fn is_start(&self) -> bool {
        *self == Self::start(&self.id)
    }

    /// The encoded cursor.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Decodes this cursor.
    pub fn parsed(&self) -> Result<ParsedCursor, CursorError> {
        Self::decode(&self.raw)
    }
}

/// Returns true if `input` is a well formed cursor of a paginated entity.
pub fn is_valid_cursor(input: &str) -> bool {
    GraphCursor::decode(input).is_ok()
}

/// Stable 31-bit hash of a relation's identity with the paginated entity removed.
pub fn relation_hash(id: &NodeId, relation: &RelationId) -> u32 {
    let digest = keccak256(relation.without(id).as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) >> 1
}

impl fmt::Display for GraphCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for GraphCursor {
    type Error = CursorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parsed = Self::decode(&value)?;
        Ok(Self { raw: value, id: parsed.id })
    }
}

impl From<GraphCursor> for String {
    fn from(cursor: GraphCursor) -> Self {
        cursor.raw
    }
}

impl AsRef<str> for GraphCursor {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}
