use enum_primitive_derive::Primitive;

/// We use `u8::MAX` as a key separator. Through the [`DatabaseStorePrefixes`] enum
/// we make sure it is never used as a store prefix as well
pub const SEPARATOR: u8 = u8::MAX;

#[derive(Primitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DatabaseStorePrefixes {
    // ---- Tangle ----
    Blocks = 1,
    BlockMetadata = 2,
    Children = 3,
    Milestones = 4,
    UnreferencedBlocks = 5,
    ProtocolParameters = 6,

    // ---- Snapshot ----
    SnapshotInfo = 16,
    SolidEntryPoints = 17,

    // ---- UTXO ledger ----
    LedgerDiffs = 32,
    Outputs = 33,
    Spents = 34,
    Receipts = 35,
    LedgerIndex = 36,

    // ---- Separator ----
    /// Reserved as a separator
    Separator = SEPARATOR,
}

impl From<DatabaseStorePrefixes> for Vec<u8> {
    fn from(value: DatabaseStorePrefixes) -> Self {
        [value as u8].to_vec()
    }
}

impl From<DatabaseStorePrefixes> for u8 {
    fn from(value: DatabaseStorePrefixes) -> Self {
        value as u8
    }
}

impl AsRef<[u8]> for DatabaseStorePrefixes {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: enum has repr(u8)
        std::slice::from_ref(unsafe { &*(self as *const Self as *const u8) })
    }
}
