//! Proof classes and their dispatch rank.

use std::fmt;

/// A closed enumeration of job kinds the broker understands natively.
///
/// The set is fixed at design time. Each variant is also reachable through
/// [`ProofClass::rank`], which determines dispatch preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum ProofClass {
    PublicVm,
    TubeProof,
    PrivateKernelEmpty,
    PrivateBaseRollup,
    PublicBaseRollup,
    MergeRollup,
    RootRollup,
    BlockMergeRollup,
    BlockRootRollup,
    EmptyBlockRootRollup,
    BaseParity,
    RootParity,
}

impl ProofClass {
    /// All classes known to the broker, used as the default `allow_list`.
    pub const ALL: [ProofClass; 12] = [
        ProofClass::PublicVm,
        ProofClass::TubeProof,
        ProofClass::PrivateKernelEmpty,
        ProofClass::PrivateBaseRollup,
        ProofClass::PublicBaseRollup,
        ProofClass::MergeRollup,
        ProofClass::RootRollup,
        ProofClass::BlockMergeRollup,
        ProofClass::BlockRootRollup,
        ProofClass::EmptyBlockRootRollup,
        ProofClass::BaseParity,
        ProofClass::RootParity,
    ];

    /// Static dispatch rank, most preferred first. Classes closer to a
    /// block's root proof are prioritized so in-flight blocks finish before
    /// new ones start.
    ///
    /// Lower return value means more preferred. Unranked classes (none exist
    /// today, but a future variant added without updating this table) would
    /// sort after every known class — deliberately, so they never starve
    /// existing work.
    pub fn rank(self) -> u8 {
        match self {
            ProofClass::BlockRootRollup => 0,
            ProofClass::BlockMergeRollup => 1,
            ProofClass::RootRollup => 2,
            ProofClass::MergeRollup => 3,
            ProofClass::PublicBaseRollup => 4,
            ProofClass::PrivateBaseRollup => 5,
            ProofClass::PublicVm => 6,
            ProofClass::TubeProof => 7,
            ProofClass::RootParity => 8,
            ProofClass::BaseParity => 9,
            ProofClass::EmptyBlockRootRollup => 10,
            ProofClass::PrivateKernelEmpty => 11,
        }
    }
}

impl fmt::Display for ProofClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Stable wire/column name for each class, independent of the `Debug`
/// representation — used by store implementations that persist the class
/// as text (e.g. `broker-store-postgres`).
impl ProofClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ProofClass::PublicVm => "public_vm",
            ProofClass::TubeProof => "tube_proof",
            ProofClass::PrivateKernelEmpty => "private_kernel_empty",
            ProofClass::PrivateBaseRollup => "private_base_rollup",
            ProofClass::PublicBaseRollup => "public_base_rollup",
            ProofClass::MergeRollup => "merge_rollup",
            ProofClass::RootRollup => "root_rollup",
            ProofClass::BlockMergeRollup => "block_merge_rollup",
            ProofClass::BlockRootRollup => "block_root_rollup",
            ProofClass::EmptyBlockRootRollup => "empty_block_root_rollup",
            ProofClass::BaseParity => "base_parity",
            ProofClass::RootParity => "root_parity",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "public_vm" => ProofClass::PublicVm,
            "tube_proof" => ProofClass::TubeProof,
            "private_kernel_empty" => ProofClass::PrivateKernelEmpty,
            "private_base_rollup" => ProofClass::PrivateBaseRollup,
            "public_base_rollup" => ProofClass::PublicBaseRollup,
            "merge_rollup" => ProofClass::MergeRollup,
            "root_rollup" => ProofClass::RootRollup,
            "block_merge_rollup" => ProofClass::BlockMergeRollup,
            "block_root_rollup" => ProofClass::BlockRootRollup,
            "empty_block_root_rollup" => ProofClass::EmptyBlockRootRollup,
            "base_parity" => ProofClass::BaseParity,
            "root_parity" => ProofClass::RootParity,
            _ => return None,
        })
    }
}
