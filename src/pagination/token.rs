//! Page-token codec
//!
//! Binary layout (little-endian), then URL-safe base64 without padding:
//!
//! ```text
//! u8   version (1)
//! str  parent           str = u32 length + UTF-8 bytes
//! str  filter
//! str  last item id
//! u8   has order value (0|1)
//! str  order field      ┐
//! i64  seconds          │ only when has order value
//! u32  nanoseconds      │
//! u8   direction (0|1)  ┘
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::order::{Direction, Order};
use crate::errors::{QueryError, QueryResult};

const TOKEN_VERSION: u8 = 1;

/// Tokens larger than this are refused before decoding
const MAX_TOKEN_LEN: usize = 16 * 1024;

/// Page-token codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("{0}")]
    Malformed(String),

    #[error("{0}")]
    Encode(String),
}

/// Order value of the last returned row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderValue {
    pub field_name: String,
    pub value: DateTime<Utc>,
    pub direction: Direction,
}

/// Last row of the page a token continues from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastItem {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderValue>,
}

/// Continuation token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageToken {
    pub parent: String,
    pub filter: String,
    pub last_item: LastItem,
}

impl PageToken {
    pub fn encode(&self) -> Result<String, TokenError> {
        let mut buf = Vec::with_capacity(64);
        buf.push(TOKEN_VERSION);
        write_str(&mut buf, &self.parent)?;
        write_str(&mut buf, &self.filter)?;
        write_str(&mut buf, &self.last_item.uid)?;
        match &self.last_item.order_by {
            None => buf.push(0),
            Some(order) => {
                buf.push(1);
                write_str(&mut buf, &order.field_name)?;
                buf.extend_from_slice(&order.value.timestamp().to_le_bytes());
                buf.extend_from_slice(&order.value.timestamp_subsec_nanos().to_le_bytes());
                buf.push(match order.direction {
                    Direction::Asc => 0,
                    Direction::Desc => 1,
                });
            }
        }
        Ok(URL_SAFE_NO_PAD.encode(buf))
    }

    /// Decode a token; an empty string means "first page"
    pub fn decode(token: &str) -> Result<Option<Self>, TokenError> {
        if token.is_empty() {
            return Ok(None);
        }
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Malformed(format!(
                "token exceeds {} characters",
                MAX_TOKEN_LEN
            )));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| TokenError::Malformed(format!("bad base64: {}", e)))?;

        let mut reader = Reader::new(&bytes);
        let version = reader.u8()?;
        if version != TOKEN_VERSION {
            return Err(TokenError::Malformed(format!(
                "unsupported token version {}",
                version
            )));
        }
        let parent = reader.string()?;
        let filter = reader.string()?;
        let uid = reader.string()?;
        let order_by = match reader.u8()? {
            0 => None,
            1 => {
                let field_name = reader.string()?;
                let secs = reader.i64()?;
                let nanos = reader.u32()?;
                let value = DateTime::<Utc>::from_timestamp(secs, nanos)
                    .ok_or_else(|| TokenError::Malformed("order value out of range".into()))?;
                let direction = match reader.u8()? {
                    0 => Direction::Asc,
                    1 => Direction::Desc,
                    other => {
                        return Err(TokenError::Malformed(format!("bad direction tag {}", other)))
                    }
                };
                Some(OrderValue {
                    field_name,
                    value,
                    direction,
                })
            }
            other => return Err(TokenError::Malformed(format!("bad order tag {}", other))),
        };
        if !reader.is_empty() {
            return Err(TokenError::Malformed("trailing bytes".into()));
        }

        Ok(Some(PageToken {
            parent,
            filter,
            last_item: LastItem { uid, order_by },
        }))
    }

    /// Reject a token that was produced for a different request
    pub fn check_continuity(&self, parent: &str, filter: &str, order: &Order) -> QueryResult<()> {
        if self.parent != parent {
            return Err(QueryError::InvalidToken(format!(
                "token was issued for parent \"{}\", not \"{}\"",
                self.parent, parent
            )));
        }
        if self.filter != filter {
            return Err(QueryError::InvalidToken(format!(
                "token was issued for filter \"{}\", not \"{}\"",
                self.filter, filter
            )));
        }
        match (&self.last_item.order_by, order.is_custom()) {
            (None, false) => Ok(()),
            (Some(value), true)
                if value.field_name == order.field_name && value.direction == order.direction =>
            {
                Ok(())
            }
            (Some(value), _) => Err(QueryError::InvalidToken(format!(
                "token was issued for order \"{} {}\"",
                value.field_name,
                value.direction.as_str().to_lowercase()
            ))),
            (None, true) => Err(QueryError::InvalidToken(
                "token was issued for the default order".into(),
            )),
        }
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) -> Result<(), TokenError> {
    let len = u32::try_from(s.len())
        .map_err(|_| TokenError::Encode(format!("field of {} bytes is too large", s.len())))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TokenError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| TokenError::Malformed("unexpected end of token".into()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, TokenError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, TokenError> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(b))
    }

    fn i64(&mut self) -> Result<i64, TokenError> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(b))
    }

    fn string(&mut self) -> Result<String, TokenError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| TokenError::Malformed("string field is not UTF-8".into()))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}
