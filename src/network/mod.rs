//! Validation of candidate network endpoints

pub mod registry;
mod validator;

pub use registry::{Bip44Coin, Bip44Registry, ChainInfo, ChainRegistry, StaticBip44Registry, StaticChainRegistry};
pub use validator::{
    is_valid_chain_id_for_eth_networks, validate_chain_id, Bip44Chain, Bip44NetworkDetails,
    ChainIdInput, ChainIdValidation, EthRpcRequest, EthRpcValidation, NativeCurrency,
    NetworkValidator, SysRpc, SysRpcRequest, SysRpcValidation, MAX_EVM_CHAIN_ID,
};
