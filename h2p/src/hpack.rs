//! HPACK header block decoding (RFC 7541).
//!
//! The decoder handles every representation a peer may send: indexed fields,
//! the three literal forms, dynamic table size updates, and Huffman-coded
//! strings. Encoders outside this crate get the building blocks they need
//! without a compression context: [`encode_prefix_int`], [`static_index`] and
//! [`static_name_index`].

use std::collections::VecDeque;

use crate::error::H2Error;

/// A single header name-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl HeaderField {
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Dynamic table accounting size (RFC 7541 Section 4.1).
    fn size(&self) -> usize {
        self.name.len() + self.value.len() + 32
    }
}

/// Append `value` as an HPACK integer with an N-bit prefix (RFC 7541
/// Section 5.1). `pattern` supplies the bits above the prefix.
pub fn encode_prefix_int(buf: &mut Vec<u8>, value: u64, prefix_bits: u8, pattern: u8) {
    let max = (1u64 << prefix_bits) - 1;
    if value < max {
        buf.push(pattern | value as u8);
        return;
    }
    buf.push(pattern | max as u8);
    let mut rest = value - max;
    while rest >= 0x80 {
        buf.push(0x80 | (rest & 0x7f) as u8);
        rest >>= 7;
    }
    buf.push(rest as u8);
}

/// Read an N-bit-prefix integer; returns the value and bytes consumed, or
/// `None` when truncated or implausibly large.
pub(crate) fn decode_prefix_int(buf: &[u8], prefix_bits: u8) -> Option<(u64, usize)> {
    let (&first, rest) = buf.split_first()?;
    let max = (1u64 << prefix_bits) - 1;
    let mut value = u64::from(first) & max;
    if value < max {
        return Some((value, 1));
    }
    for (i, &b) in rest.iter().enumerate() {
        let shift = 7 * i as u32;
        if shift > 56 {
            return None;
        }
        value += u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Some((value, i + 2));
        }
    }
    None
}

/// RFC 7541 Appendix A; HPACK index `i` is `STATIC_TABLE[i - 1]`.
const STATIC_TABLE: [(&[u8], &[u8]); 61] = [
    (b":authority", b""),
    (b":method", b"GET"),
    (b":method", b"POST"),
    (b":path", b"/"),
    (b":path", b"/index.html"),
    (b":scheme", b"http"),
    (b":scheme", b"https"),
    (b":status", b"200"),
    (b":status", b"204"),
    (b":status", b"206"),
    (b":status", b"304"),
    (b":status", b"400"),
    (b":status", b"404"),
    (b":status", b"500"),
    (b"accept-charset", b""),
    (b"accept-encoding", b"gzip, deflate"),
    (b"accept-language", b""),
    (b"accept-ranges", b""),
    (b"accept", b""),
    (b"access-control-allow-origin", b""),
    (b"age", b""),
    (b"allow", b""),
    (b"authorization", b""),
    (b"cache-control", b""),
    (b"content-disposition", b""),
    (b"content-encoding", b""),
    (b"content-language", b""),
    (b"content-length", b""),
    (b"content-location", b""),
    (b"content-range", b""),
    (b"content-type", b""),
    (b"cookie", b""),
    (b"date", b""),
    (b"etag", b""),
    (b"expect", b""),
    (b"expires", b""),
    (b"from", b""),
    (b"host", b""),
    (b"if-match", b""),
    (b"if-modified-since", b""),
    (b"if-none-match", b""),
    (b"if-range", b""),
    (b"if-unmodified-since", b""),
    (b"last-modified", b""),
    (b"link", b""),
    (b"location", b""),
    (b"max-forwards", b""),
    (b"proxy-authenticate", b""),
    (b"proxy-authorization", b""),
    (b"range", b""),
    (b"referer", b""),
    (b"refresh", b""),
    (b"retry-after", b""),
    (b"server", b""),
    (b"set-cookie", b""),
    (b"strict-transport-security", b""),
    (b"transfer-encoding", b""),
    (b"user-agent", b""),
    (b"vary", b""),
    (b"via", b""),
    (b"www-authenticate", b""),
];

/// HPACK index of the static entry matching both name and value.
pub fn static_index(name: &[u8], value: &[u8]) -> Option<usize> {
    STATIC_TABLE
        .iter()
        .position(|(n, v)| *n == name && *v == value)
        .map(|i| i + 1)
}

/// HPACK index of the first static entry with this name.
pub fn static_name_index(name: &[u8]) -> Option<usize> {
    STATIC_TABLE.iter().position(|(n, _)| *n == name).map(|i| i + 1)
}

/// Dynamic table, newest entry first (RFC 7541 Section 2.3.2).
#[derive(Debug)]
struct DynamicTable {
    entries: VecDeque<HeaderField>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    fn get(&self, index: usize) -> Option<&HeaderField> {
        self.entries.get(index)
    }

    fn evict_to(&mut self, limit: usize) {
        while self.size > limit {
            let Some(evicted) = self.entries.pop_back() else {
                break;
            };
            self.size -= evicted.size();
        }
    }

    /// Insert at the front, evicting from the back (RFC 7541 Section 4.4).
    /// An entry larger than the table empties it and is not stored.
    fn insert(&mut self, field: HeaderField) {
        let entry_size = field.size();
        if entry_size > self.max_size {
            self.entries.clear();
            self.size = 0;
            return;
        }
        self.evict_to(self.max_size - entry_size);
        self.size += entry_size;
        self.entries.push_front(field);
    }

    fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to(max_size);
    }
}

/// Decode a string literal (RFC 7541 Section 5.2); returns the string and the
/// bytes consumed.
fn decode_string(buf: &[u8]) -> Result<(Vec<u8>, usize), H2Error> {
    let huffman = buf.first().ok_or(H2Error::CompressionError)? & 0x80 != 0;
    let (len, n) = decode_prefix_int(buf, 7).ok_or(H2Error::CompressionError)?;
    let end = n
        .checked_add(usize::try_from(len).map_err(|_| H2Error::CompressionError)?)
        .ok_or(H2Error::CompressionError)?;
    let raw = buf.get(n..end).ok_or(H2Error::CompressionError)?;
    let value = if huffman {
        crate::huffman::decode(raw)?
    } else {
        raw.to_vec()
    };
    Ok((value, end))
}

/// How a literal field interacts with the dynamic table.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Indexing {
    Incremental,
    Without,
    Never,
}

/// HPACK decoder. One per connection; state carries across header blocks.
#[derive(Debug)]
pub struct Decoder {
    table: DynamicTable,
    /// Upper bound we advertised in SETTINGS_HEADER_TABLE_SIZE.
    max_table_size: usize,
}

impl Decoder {
    pub fn new(max_table_size: usize) -> Self {
        Self {
            table: DynamicTable::new(max_table_size),
            max_table_size,
        }
    }

    /// Decode a complete header block.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<HeaderField>, H2Error> {
        let mut headers = Vec::new();
        let mut pos = 0;

        while let Some(&first) = block.get(pos) {
            let rest = &block[pos..];
            if first & 0x80 != 0 {
                // Indexed field (Section 6.1).
                let (index, n) = decode_prefix_int(rest, 7).ok_or(H2Error::CompressionError)?;
                headers.push(self.lookup(index)?);
                pos += n;
            } else if first & 0x40 != 0 {
                let (field, n) = self.decode_literal(rest, 6, Indexing::Incremental)?;
                headers.push(field);
                pos += n;
            } else if first & 0x20 != 0 {
                // Dynamic table size update (Section 6.3). Only allowed
                // before the first field of a block (Section 4.2).
                if !headers.is_empty() {
                    return Err(H2Error::CompressionError);
                }
                let (size, n) = decode_prefix_int(rest, 5).ok_or(H2Error::CompressionError)?;
                let size = usize::try_from(size).map_err(|_| H2Error::CompressionError)?;
                if size > self.max_table_size {
                    return Err(H2Error::CompressionError);
                }
                self.table.set_max_size(size);
                pos += n;
            } else {
                let indexing = if first & 0x10 != 0 {
                    Indexing::Never
                } else {
                    Indexing::Without
                };
                let (field, n) = self.decode_literal(rest, 4, indexing)?;
                headers.push(field);
                pos += n;
            }
        }

        Ok(headers)
    }

    /// Literal field with an N-bit name index prefix (Section 6.2).
    fn decode_literal(
        &mut self,
        buf: &[u8],
        prefix_bits: u8,
        indexing: Indexing,
    ) -> Result<(HeaderField, usize), H2Error> {
        let (name_index, mut pos) =
            decode_prefix_int(buf, prefix_bits).ok_or(H2Error::CompressionError)?;
        let name = if name_index == 0 {
            let (name, n) = decode_string(&buf[pos..])?;
            pos += n;
            name
        } else {
            self.lookup(name_index)?.name
        };
        let (value, n) = decode_string(&buf[pos..])?;
        pos += n;

        let field = HeaderField { name, value };
        if indexing == Indexing::Incremental {
            self.table.insert(field.clone());
        }
        Ok((field, pos))
    }

    fn lookup(&self, index: u64) -> Result<HeaderField, H2Error> {
        let index = usize::try_from(index).map_err(|_| H2Error::CompressionError)?;
        match index {
            0 => Err(H2Error::CompressionError),
            i if i <= STATIC_TABLE.len() => {
                let (name, value) = STATIC_TABLE[i - 1];
                Ok(HeaderField::new(name, value))
            }
            i => self
                .table
                .get(i - STATIC_TABLE.len() - 1)
                .cloned()
                .ok_or(H2Error::CompressionError),
        }
    }

    /// Number of entries currently in the dynamic table.
    pub fn table_len(&self) -> usize {
        self.table.entries.len()
    }
}
