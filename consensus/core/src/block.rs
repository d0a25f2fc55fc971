use crate::MilestoneIndex;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

pub const BLOCK_ID_SIZE: usize = 32;

/// The identifier of a block, i.e. the hash of its serialized form
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BlockId([u8; BLOCK_ID_SIZE]);

impl BlockId {
    pub const fn from_bytes(bytes: [u8; BLOCK_ID_SIZE]) -> Self {
        BlockId(bytes)
    }

    pub const fn as_bytes(&self) -> [u8; BLOCK_ID_SIZE] {
        self.0
    }

    /// Builds an id whose first 8 bytes hold `word` in little-endian order. Mostly useful for tests.
    pub const fn from_u64_word(word: u64) -> Self {
        let le = word.to_le_bytes();
        let mut bytes = [0u8; BLOCK_ID_SIZE];
        let mut i = 0;
        while i < le.len() {
            bytes[i] = le[i];
            i += 1;
        }
        BlockId(bytes)
    }
}

impl From<u64> for BlockId {
    fn from(word: u64) -> Self {
        Self::from_u64_word(word)
    }
}

impl AsRef<[u8]> for BlockId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8; BLOCK_ID_SIZE]> for BlockId {
    fn as_ref(&self) -> &[u8; BLOCK_ID_SIZE] {
        &self.0
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut hex = [0u8; BLOCK_ID_SIZE * 2];
        f.write_str(faster_hex::hex_encode(&self.0, &mut hex).map_err(|_| std::fmt::Error)?)
    }
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for BlockId {
    type Err = faster_hex::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != BLOCK_ID_SIZE * 2 {
            return Err(faster_hex::Error::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; BLOCK_ID_SIZE];
        faster_hex::hex_decode(s.as_bytes(), &mut bytes)?;
        Ok(BlockId(bytes))
    }
}

pub type BlockIds = Vec<BlockId>;

/// A stored block. The payload is opaque to pruning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub parents: BlockIds,
    pub payload: Vec<u8>,
}

impl Block {
    pub fn new(id: BlockId, parents: BlockIds, payload: Vec<u8>) -> Self {
        Self { id, parents, payload }
    }
}

/// Node local metadata of a block
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub block_id: BlockId,
    pub parents: BlockIds,
    pub solid: bool,
    /// The index of the milestone which referenced this block, if any
    pub referenced_index: Option<MilestoneIndex>,
}

impl BlockMetadata {
    pub fn new(block_id: BlockId, parents: BlockIds) -> Self {
        Self { block_id, parents, solid: false, referenced_index: None }
    }

    pub fn is_referenced(&self) -> bool {
        self.referenced_index.is_some()
    }

    /// Returns true if the block was referenced by a milestone with index at least `index`
    pub fn is_referenced_at_or_after(&self, index: MilestoneIndex) -> bool {
        self.referenced_index.is_some_and(|referenced| referenced >= index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_hex() {
        let id = BlockId::from_u64_word(0xabcd);
        let hex = id.to_string();
        assert_eq!(&hex[..6], "cdab00");
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<BlockId>().unwrap(), id);
        assert!("zz".parse::<BlockId>().is_err());
        assert!(hex.replace('c', "x").parse::<BlockId>().is_err());
    }

    #[test]
    fn test_metadata_referenced() {
        let mut metadata = BlockMetadata::new(1.into(), vec![0.into()]);
        assert!(!metadata.is_referenced());
        assert!(!metadata.is_referenced_at_or_after(0));
        metadata.referenced_index = Some(10);
        assert!(metadata.is_referenced_at_or_after(10));
        assert!(!metadata.is_referenced_at_or_after(11));
    }
}
