pub mod account;
pub mod asset;
pub mod block;
pub mod constants;
pub mod error;
pub mod fee;
pub mod id;
pub mod impl_entities;
pub mod market;
pub mod operations;
pub mod proposal;
pub mod types;
pub mod witness;

pub use account::{Account, AccountOptions};
pub use asset::{Asset, AssetOptions, BitAssetOptions};
pub use block::{Block, BlockHeader, Transaction};
pub use error::{ChainError, ChainResult};
pub use id::{
    AccountId, AssetId, CallOrderId, CollateralBidId, CommitteeMemberId, ForceSettlementId, Id,
    LimitOrderId, ObjectId, ObjectType, ProposalId, Space, WitnessId, WorkerId, CORE_ASSET,
    COMMITTEE_ACCOUNT, TEMP_ACCOUNT, WITNESS_ACCOUNT,
};
pub use impl_entities::{
    AccountBalance, AccountStatistics, AssetBitAssetData, AssetDynamicData, BlockSummary,
    ChainParameters, DynamicGlobalProperties, GlobalProperties, PriceFeed,
    TransactionHistoryEntry,
};
pub use market::{CallOrder, CollateralBid, ForceSettlement, LimitOrder};
pub use operations::{Operation, OperationTag, VirtualOperation};
pub use proposal::Proposal;
pub use types::{Address, Amount, AssetAmount, Authority, Price, PublicKeyType, Sha256Id, Signature, Timestamp, VoteId, VoteType};
pub use witness::{CommitteeMember, Witness, Worker, WorkerInitializer};
