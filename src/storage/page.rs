use crate::errors::{Error, Result};
use crate::types::Key;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use crc32fast::Hasher as Crc32Hasher;
use serde::{Deserialize, Serialize};

/// A block's position within the run of blocks an oversized entry was split across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// The entry fits entirely within one block.
    Complete = 0,
    /// The first block of a multi-block entry.
    Head = 1,
    /// An interior block of a multi-block entry.
    Slice = 2,
    /// The final block of a multi-block entry.
    Tail = 3,
}

impl BlockKind {
    const fn tag(self) -> u8 {
        match self {
            Self::Complete => 0,
            Self::Head => 1,
            Self::Slice => 2,
            Self::Tail => 3,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Complete),
            1 => Ok(Self::Head),
            2 => Ok(Self::Slice),
            3 => Ok(Self::Tail),
            other => Err(Error::Corrupt(format!("unknown block kind tag {other}"))),
        }
    }
}

/// A single framed chunk of page payload: a 1-byte kind tag, a 4-byte big-endian
/// length, then that many bytes of payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub payload: Vec<u8>,
}

const FRAME_HEADER_LEN: usize = 5;

impl Block {
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        out.push(self.kind.tag());
        out.extend_from_slice(&u32::try_from(self.payload.len()).unwrap_or(u32::MAX).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode one framed block from the front of `bytes`, returning it and the
    /// number of bytes consumed.
    ///
    /// # Errors
    /// Returns `Error::Corrupt` if the frame header or declared length don't fit.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(Error::Corrupt("block frame shorter than header".into()));
        }
        let kind = BlockKind::from_tag(bytes[0])?;
        let len = u32::from_be_bytes(bytes[1..5].try_into().expect("4 bytes")) as usize;
        let end = FRAME_HEADER_LEN
            .checked_add(len)
            .ok_or_else(|| Error::Corrupt("block length overflow".into()))?;
        if end > bytes.len() {
            return Err(Error::Corrupt("block payload truncated".into()));
        }
        Ok((Self { kind, payload: bytes[FRAME_HEADER_LEN..end].to_vec() }, end))
    }
}

/// Split raw entry content into one or more framed blocks no larger than
/// `max_payload` bytes each.
#[must_use]
pub fn split_into_blocks(content: &[u8], max_payload: usize) -> Vec<Block> {
    assert!(max_payload > 0, "max_payload must be positive");
    if content.len() <= max_payload {
        return vec![Block { kind: BlockKind::Complete, payload: content.to_vec() }];
    }
    let mut blocks = Vec::new();
    let mut chunks = content.chunks(max_payload).peekable();
    let mut first = true;
    while let Some(chunk) = chunks.next() {
        let kind = if first {
            BlockKind::Head
        } else if chunks.peek().is_some() {
            BlockKind::Slice
        } else {
            BlockKind::Tail
        };
        blocks.push(Block { kind, payload: chunk.to_vec() });
        first = false;
    }
    blocks
}

/// Reassemble content from a run of blocks previously produced by `split_into_blocks`.
///
/// # Errors
/// Returns `Error::Corrupt` if the run's kinds don't form a valid Complete, or
/// Head/Slice*/Tail sequence.
pub fn join_blocks(blocks: &[Block]) -> Result<Vec<u8>> {
    match blocks {
        [] => Err(Error::Corrupt("empty block run".into())),
        [single] if single.kind == BlockKind::Complete => Ok(single.payload.clone()),
        [single] => Err(Error::Corrupt(format!("lone block with kind {:?}", single.kind))),
        [head, .., tail] => {
            if head.kind != BlockKind::Head {
                return Err(Error::Corrupt("block run does not start with Head".into()));
            }
            if tail.kind != BlockKind::Tail {
                return Err(Error::Corrupt("block run does not end with Tail".into()));
            }
            if blocks[1..blocks.len() - 1].iter().any(|b| b.kind != BlockKind::Slice) {
                return Err(Error::Corrupt("interior block is not a Slice".into()));
            }
            Ok(blocks.iter().flat_map(|b| b.payload.clone()).collect())
        }
    }
}

/// Fixed header carried by every on-disk page: identity, the CoW version that
/// produced it, and a CRC32 over header-plus-body for corruption detection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageHeader {
    pub page_id: u64,
    pub version: u64,
    pub crc32: u32,
}

/// A page: a framed run of blocks plus the header that identifies and checksums it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub header: PageHeader,
    pub body: Vec<u8>,
}

impl Page {
    #[must_use]
    pub fn new(page_id: u64, version: u64, blocks: &[Block]) -> Self {
        let body: Vec<u8> = blocks.iter().flat_map(Block::encode).collect();
        let mut header = PageHeader { page_id, version, crc32: 0 };
        header.crc32 = checksum(&header, &body);
        Self { header, body }
    }

    #[must_use]
    pub fn verify_crc(&self) -> bool {
        checksum(&self.header, &self.body) == self.header.crc32
    }

    /// Decode the framed blocks carried in this page's body.
    ///
    /// # Errors
    /// Returns `Error::Corrupt` if a block frame in the body is malformed.
    pub fn blocks(&self) -> Result<Vec<Block>> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < self.body.len() {
            let (block, used) = Block::decode(&self.body[offset..])?;
            offset += used;
            out.push(block);
        }
        Ok(out)
    }

    /// # Errors
    /// Returns `Error::Encode` if the page cannot be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode_to_vec(self, standard())?)
    }

    /// # Errors
    /// Returns `Error::Decode` if `bytes` is not a well-formed page.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(decode_from_slice(bytes, standard())?.0)
    }
}

/// Frame every entry in `entries` through `encode_entry`/`split_into_blocks`, no
/// block larger than `max_block_payload`, and wrap the run in one checksummed page.
/// This is the on-disk shape an `IndexEngine` page is written in.
///
/// # Errors
/// Returns `Error::Encode` if the resulting page cannot be serialized.
pub fn encode_page(page_id: u64, version: u64, entries: &[(Key, Vec<u8>)], max_block_payload: usize) -> Result<Vec<u8>> {
    let mut blocks = Vec::new();
    for (key, content) in entries {
        let entry_bytes = encode_entry(key, content);
        blocks.extend(split_into_blocks(&entry_bytes, max_block_payload));
    }
    Page::new(page_id, version, &blocks).to_bytes()
}

/// The inverse of `encode_page`: verify the page's CRC, decode its block run, then
/// regroup Complete/Head..Tail runs back into the entries that produced them.
///
/// # Errors
/// Returns `Error::Corrupt` if the CRC fails or the block run is malformed.
pub fn decode_page(bytes: &[u8]) -> Result<Vec<(Key, Vec<u8>)>> {
    let page = Page::from_bytes(bytes)?;
    if !page.verify_crc() {
        return Err(Error::Corrupt(format!("page {} failed crc check", page.header.page_id)));
    }
    let mut entries = Vec::new();
    let mut run: Vec<Block> = Vec::new();
    for block in page.blocks()? {
        match block.kind {
            BlockKind::Complete => entries.push(decode_entry(&block.payload)?),
            BlockKind::Head => {
                run.clear();
                run.push(block);
            }
            BlockKind::Slice => run.push(block),
            BlockKind::Tail => {
                run.push(block);
                entries.push(decode_entry(&join_blocks(&run)?)?);
                run.clear();
            }
        }
    }
    Ok(entries)
}

/// The on-disk byte size `entries` would occupy once framed through
/// `encode_page`, the budget an `IndexEngine` splits a page against.
#[must_use]
pub fn page_byte_size(entries: &[(Key, Vec<u8>)], max_block_payload: usize) -> usize {
    entries
        .iter()
        .map(|(key, content)| {
            let entry_bytes = encode_entry(key, content);
            split_into_blocks(&entry_bytes, max_block_payload).iter().map(|b| b.encode().len()).sum::<usize>()
        })
        .sum()
}

fn checksum(header: &PageHeader, body: &[u8]) -> u32 {
    let mut zeroed = *header;
    zeroed.crc32 = 0;
    let mut hasher = Crc32Hasher::new();
    if let Ok(hdr_bytes) = encode_to_vec(zeroed, standard()) {
        hasher.update(&hdr_bytes);
    }
    hasher.update(body);
    hasher.finalize()
}

/// Encode a page entry as an ASCII header line (`"{len} {key}\n"`), a blank
/// separator line, then the raw content bytes.
#[must_use]
pub fn encode_entry(key: &Key, content: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\n\n", content.len(), key_repr(key));
    let mut out = header.into_bytes();
    out.extend_from_slice(content);
    out
}

/// Decode a page entry previously produced by `encode_entry`.
///
/// # Errors
/// Returns `Error::InvalidEntryFormat` if the header line or blank separator is missing,
/// or the declared length doesn't match the remaining bytes.
pub fn decode_entry(bytes: &[u8]) -> Result<(Key, Vec<u8>)> {
    let header_end = bytes
        .windows(2)
        .position(|w| w == b"\n\n")
        .ok_or_else(|| Error::InvalidEntryFormat("missing blank-line separator".into()))?;
    let header = std::str::from_utf8(&bytes[..header_end])
        .map_err(|e| Error::InvalidEntryFormat(format!("header is not utf-8: {e}")))?;
    let (len_str, key_str) = header
        .split_once(' ')
        .ok_or_else(|| Error::InvalidEntryFormat("header missing length/key separator".into()))?;
    let len: usize =
        len_str.parse().map_err(|e| Error::InvalidEntryFormat(format!("bad length {len_str:?}: {e}")))?;
    let content = &bytes[header_end + 2..];
    if content.len() != len {
        return Err(Error::InvalidEntryFormat(format!(
            "declared length {len} does not match actual {}",
            content.len()
        )));
    }
    Ok((key_from_repr(key_str)?, content.to_vec()))
}

fn key_repr(key: &Key) -> String {
    match key {
        Key::Bytes(b) => format!("b:{}", hex::encode(b)),
        Key::Str(s) => format!("s:{s}"),
        Key::I64(i) => format!("i:{i}"),
        Key::U64(u) => format!("u:{u}"),
        Key::Bool(b) => format!("z:{b}"),
    }
}

fn key_from_repr(repr: &str) -> Result<Key> {
    let (tag, rest) = repr
        .split_once(':')
        .ok_or_else(|| Error::InvalidEntryFormat(format!("malformed key repr {repr:?}")))?;
    match tag {
        "b" => Ok(Key::Bytes(
            hex::decode(rest).map_err(|e| Error::InvalidEntryFormat(format!("bad hex key: {e}")))?,
        )),
        "s" => Ok(Key::Str(rest.to_string())),
        "i" => Ok(Key::I64(
            rest.parse().map_err(|e| Error::InvalidEntryFormat(format!("bad i64 key: {e}")))?,
        )),
        "u" => Ok(Key::U64(
            rest.parse().map_err(|e| Error::InvalidEntryFormat(format!("bad u64 key: {e}")))?,
        )),
        "z" => Ok(Key::Bool(
            rest.parse().map_err(|e| Error::InvalidEntryFormat(format!("bad bool key: {e}")))?,
        )),
        other => Err(Error::InvalidEntryFormat(format!("unknown key tag {other:?}"))),
    }
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, String> {
        if s.len() % 2 != 0 {
            return Err("odd-length hex string".into());
        }
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_roundtrips_as_complete() {
        let blocks = split_into_blocks(b"hello", 64);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Complete);
        assert_eq!(join_blocks(&blocks).unwrap(), b"hello");
    }

    #[test]
    fn oversized_content_splits_head_slice_tail() {
        let content = vec![7u8; 100];
        let blocks = split_into_blocks(&content, 30);
        assert_eq!(blocks.first().unwrap().kind, BlockKind::Head);
        assert_eq!(blocks.last().unwrap().kind, BlockKind::Tail);
        assert!(blocks[1..blocks.len() - 1].iter().all(|b| b.kind == BlockKind::Slice));
        assert_eq!(join_blocks(&blocks).unwrap(), content);
    }

    #[test]
    fn block_frame_roundtrips() {
        let block = Block { kind: BlockKind::Slice, payload: vec![1, 2, 3] };
        let encoded = block.encode();
        let (decoded, used) = Block::decode(&encoded).unwrap();
        assert_eq!(used, encoded.len());
        assert_eq!(decoded, block);
    }

    #[test]
    fn page_detects_corruption_via_crc() {
        let blocks = split_into_blocks(b"payload", 64);
        let mut page = Page::new(1, 1, &blocks);
        assert!(page.verify_crc());
        page.body[0] ^= 0xFF;
        assert!(!page.verify_crc());
    }

    #[test]
    fn entry_codec_roundtrips() {
        let key = Key::Str("users/42".to_string());
        let content = b"{\"name\":\"ada\"}".to_vec();
        let encoded = encode_entry(&key, &content);
        let (decoded_key, decoded_content) = decode_entry(&encoded).unwrap();
        assert_eq!(decoded_key, key);
        assert_eq!(decoded_content, content);
    }

    #[test]
    fn encode_page_then_decode_page_recovers_every_entry() {
        let entries = vec![
            (Key::Str("a".into()), b"small".to_vec()),
            (Key::I64(9), vec![9u8; 200]),
            (Key::U64(3), b"tiny".to_vec()),
        ];
        let bytes = encode_page(1, 1, &entries, 48).unwrap();
        let decoded = decode_page(&bytes).unwrap();
        assert_eq!(decoded, entries);
    }

    #[test]
    fn decode_page_rejects_a_corrupted_page() {
        let entries = vec![(Key::Str("a".into()), b"v".to_vec())];
        let mut bytes = encode_page(1, 1, &entries, 48).unwrap();
        *bytes.last_mut().unwrap() ^= 0xFF;
        assert!(decode_page(&bytes).is_err());
    }

    #[test]
    fn page_byte_size_grows_with_content() {
        let small = vec![(Key::Str("a".into()), b"x".to_vec())];
        let big = vec![(Key::Str("a".into()), vec![0u8; 500])];
        assert!(page_byte_size(&big, 64) > page_byte_size(&small, 64));
    }
}
