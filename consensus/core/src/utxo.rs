use crate::{BlockId, MilestoneIndex};
use serde::{Deserialize, Serialize};

pub const TRANSACTION_ID_SIZE: usize = 32;
pub const OUTPUT_ID_SIZE: usize = TRANSACTION_ID_SIZE + 2;

/// Identifies an output by its transaction id followed by the little-endian output index
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OutputId(#[serde(with = "output_id_bytes")] [u8; OUTPUT_ID_SIZE]);

impl OutputId {
    pub fn new(transaction_id: [u8; TRANSACTION_ID_SIZE], index: u16) -> Self {
        let mut bytes = [0u8; OUTPUT_ID_SIZE];
        bytes[..TRANSACTION_ID_SIZE].copy_from_slice(&transaction_id);
        bytes[TRANSACTION_ID_SIZE..].copy_from_slice(&index.to_le_bytes());
        Self(bytes)
    }

    pub fn index(&self) -> u16 {
        u16::from_le_bytes([self.0[TRANSACTION_ID_SIZE], self.0[TRANSACTION_ID_SIZE + 1]])
    }
}

impl AsRef<[u8]> for OutputId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

mod output_id_bytes {
    use super::OUTPUT_ID_SIZE;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8; OUTPUT_ID_SIZE], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; OUTPUT_ID_SIZE], D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        bytes.try_into().map_err(|v: Vec<u8>| D::Error::invalid_length(v.len(), &"34 bytes"))
    }
}

/// An output created by a confirmed transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub output_id: OutputId,
    pub block_id: BlockId,
    pub booked_index: MilestoneIndex,
    pub amount: u64,
    pub address: Vec<u8>,
}

/// Records the consumption of an output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spent {
    pub output_id: OutputId,
    pub transaction_id_spent: [u8; TRANSACTION_ID_SIZE],
    pub spent_index: MilestoneIndex,
}

/// The outputs created and consumed by the cone of one milestone
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDiff {
    pub index: MilestoneIndex,
    pub outputs: Vec<OutputId>,
    pub spents: Vec<OutputId>,
}

/// Funds migrated from a foreign chain, announced by a milestone receipt
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MigratedFundsEntry {
    pub tail_transaction_hash: Vec<u8>,
    pub address: Vec<u8>,
    pub amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Receipt {
    pub migrated_at: MilestoneIndex,
    /// The milestone which included this receipt
    pub milestone_index: MilestoneIndex,
    pub is_final: bool,
    pub funds: Vec<MigratedFundsEntry>,
}
