//! EVM signing, encryption and transaction submission

pub mod encryption;
mod ethereum;
pub mod revert;
pub mod typed_data;
pub mod units;

pub use ethereum::{
    EthereumTransactions, FeeData, GasOracle, SubmittedTransaction, TokenTransfer, TransferRequest,
};
pub use typed_data::{Eip712Hasher, TypedDataHasher, TypedDataVersion};
pub use units::{FeeTier, FormattedGasPrice};
