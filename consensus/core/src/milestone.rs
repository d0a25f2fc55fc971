use crate::{BlockId, MilestoneIndex, block::BlockIds};
use serde::{Deserialize, Serialize};

/// Marks the inclusion of migrated funds from a foreign chain batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptOption {
    /// The foreign chain batch index the receipt belongs to
    pub migrated_at: MilestoneIndex,
    pub is_final: bool,
}

/// Announces protocol parameters which become active at `target_index`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParamsOption {
    pub target_index: MilestoneIndex,
    pub protocol_version: u8,
    pub params: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneOptions {
    pub receipt: Option<ReceiptOption>,
    pub protocol_params: Option<ProtocolParamsOption>,
}

/// A confirmed milestone. Its parents are the roots of the cone it confirms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub index: MilestoneIndex,
    pub timestamp: u64,
    pub block_id: BlockId,
    pub parents: BlockIds,
    pub options: MilestoneOptions,
}

impl Milestone {
    pub fn new(index: MilestoneIndex, timestamp: u64, block_id: BlockId, parents: BlockIds) -> Self {
        Self { index, timestamp, block_id, parents, options: Default::default() }
    }

    pub fn with_receipt(mut self, migrated_at: MilestoneIndex, is_final: bool) -> Self {
        self.options.receipt = Some(ReceiptOption { migrated_at, is_final });
        self
    }

    pub fn with_protocol_params(mut self, option: ProtocolParamsOption) -> Self {
        self.options.protocol_params = Some(option);
        self
    }

    /// The foreign chain batch index of the receipt carried by this milestone, if any
    pub fn migrated_at(&self) -> Option<MilestoneIndex> {
        self.options.receipt.as_ref().map(|receipt| receipt.migrated_at)
    }
}
