//! Wallet state model
//!
//! Accounts and networks are kept in ordered maps keyed by tagged enums so the
//! serialized form matches the `wallet-state` document layout.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Account bucket an account lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountType {
    #[serde(rename = "HDAccount")]
    HdAccount,
    Imported,
    Trezor,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::HdAccount => write!(f, "HDAccount"),
            AccountType::Imported => write!(f, "Imported"),
            AccountType::Trezor => write!(f, "Trezor"),
        }
    }
}

/// Ledger model a network belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkFamily {
    /// Account-based EVM chains
    Ethereum,
    /// UTXO chains served by a Blockbook explorer
    Syscoin,
}

impl NetworkFamily {
    pub fn name(&self) -> &'static str {
        match self {
            NetworkFamily::Ethereum => "ethereum",
            NetworkFamily::Syscoin => "syscoin",
        }
    }

    pub fn is_utxo(&self) -> bool {
        matches!(self, NetworkFamily::Syscoin)
    }
}

impl fmt::Display for NetworkFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A keyring account.
///
/// `xprv` holds ciphertext only; use [`Account::view`] for anything leaving
/// the keyring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: u32,
    pub address: String,
    pub label: String,
    pub xprv: String,
    pub xpub: String,
    pub balances: BTreeMap<String, String>,
    pub is_imported: bool,
    pub is_trezor_wallet: bool,
}

impl Account {
    /// The empty account every bucket starts with
    pub fn placeholder(account_type: AccountType) -> Self {
        let balances = [NetworkFamily::Ethereum, NetworkFamily::Syscoin]
            .iter()
            .map(|family| (family.name().to_string(), "0".to_string()))
            .collect();

        Self {
            id: 0,
            address: String::new(),
            label: "Account 1".to_string(),
            xprv: String::new(),
            xpub: String::new(),
            balances,
            is_imported: account_type == AccountType::Imported,
            is_trezor_wallet: account_type == AccountType::Trezor,
        }
    }

    /// Public projection without the sealed private key
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            address: self.address.clone(),
            label: self.label.clone(),
            xpub: self.xpub.clone(),
            balances: self.balances.clone(),
            is_imported: self.is_imported,
            is_trezor_wallet: self.is_trezor_wallet,
        }
    }

    pub(crate) fn has_key(&self) -> bool {
        !self.xprv.is_empty()
    }
}

/// Account data that is safe to hand to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: u32,
    pub address: String,
    pub label: String,
    pub xpub: String,
    pub balances: BTreeMap<String, String>,
    pub is_imported: bool,
    pub is_trezor_wallet: bool,
}

/// A chain endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub chain_id: u64,
    pub label: String,
    pub url: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub explorer: String,
    pub currency: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slip44: Option<u32>,
}

impl Network {
    /// BIP44 coin type used to derive keys on this network
    pub fn coin_type(&self, family: NetworkFamily) -> u32 {
        match family {
            NetworkFamily::Ethereum => 60,
            NetworkFamily::Syscoin => self
                .slip44
                .unwrap_or_else(|| u32::try_from(self.chain_id).unwrap_or(u32::MAX)),
        }
    }
}

pub type AccountMap = BTreeMap<AccountType, BTreeMap<u32, Account>>;
pub type NetworkMap = BTreeMap<NetworkFamily, BTreeMap<u64, Network>>;

/// Everything the keyring persists besides the vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub accounts: AccountMap,
    pub active_account_id: u32,
    pub active_account_type: AccountType,
    pub networks: NetworkMap,
    pub active_network: Network,
    pub active_network_family: NetworkFamily,
}

impl WalletState {
    /// Placeholder accounts plus the given network table, Syscoin Mainnet active.
    pub fn with_networks(networks: NetworkMap) -> Self {
        let accounts = [AccountType::HdAccount, AccountType::Imported, AccountType::Trezor]
            .into_iter()
            .map(|ty| (ty, BTreeMap::from([(0, Account::placeholder(ty))])))
            .collect();

        let active_network = networks
            .get(&NetworkFamily::Syscoin)
            .and_then(|chains| chains.get(&crate::config::rpc::chains::SYSCOIN_MAINNET))
            .cloned()
            .unwrap_or_else(crate::config::rpc::syscoin_mainnet);

        Self {
            accounts,
            active_account_id: 0,
            active_account_type: AccountType::HdAccount,
            networks,
            active_network,
            active_network_family: NetworkFamily::Syscoin,
        }
    }

    pub fn active_account(&self) -> Option<&Account> {
        self.accounts
            .get(&self.active_account_type)
            .and_then(|bucket| bucket.get(&self.active_account_id))
    }

    pub fn active_account_mut(&mut self) -> Option<&mut Account> {
        self.accounts
            .get_mut(&self.active_account_type)
            .and_then(|bucket| bucket.get_mut(&self.active_account_id))
    }

    pub fn bucket(&self, account_type: AccountType) -> Option<&BTreeMap<u32, Account>> {
        self.accounts.get(&account_type)
    }

    /// HD accounts that hold a derived key (placeholders excluded)
    pub fn hd_accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts
            .get(&AccountType::HdAccount)
            .into_iter()
            .flat_map(|bucket| bucket.values())
            .filter(|account| account.has_key())
    }

    pub fn snapshot(&self) -> WalletSnapshot {
        let accounts = self
            .accounts
            .iter()
            .map(|(ty, bucket)| {
                let views = bucket.iter().map(|(id, acc)| (*id, acc.view())).collect();
                (*ty, views)
            })
            .collect();

        WalletSnapshot {
            accounts,
            active_account_id: self.active_account_id,
            active_account_type: self.active_account_type,
            networks: self.networks.clone(),
            active_network: self.active_network.clone(),
            active_network_family: self.active_network_family,
        }
    }
}

impl Default for WalletState {
    fn default() -> Self {
        Self::with_networks(crate::config::rpc::default_networks())
    }
}

/// [`WalletState`] with every account projected to an [`AccountView`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub accounts: BTreeMap<AccountType, BTreeMap<u32, AccountView>>,
    pub active_account_id: u32,
    pub active_account_type: AccountType,
    pub networks: NetworkMap,
    pub active_network: Network,
    pub active_network_family: NetworkFamily,
}

/// Lifecycle of the keyring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyringStatus {
    /// No session key
    Locked,
    /// Password set, no HD account derived yet
    Unlocked,
    /// Mnemonic sealed and at least one account derived
    VaultActive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_matches_initial_layout() {
        let state = WalletState::default();

        assert_eq!(state.active_account_id, 0);
        assert_eq!(state.active_account_type, AccountType::HdAccount);
        assert_eq!(state.active_network_family, NetworkFamily::Syscoin);
        assert_eq!(state.active_network.chain_id, 57);
        assert_eq!(state.accounts.len(), 3);

        let imported = &state.accounts[&AccountType::Imported][&0];
        assert!(imported.is_imported);
        assert!(!imported.is_trezor_wallet);
        assert_eq!(imported.label, "Account 1");

        let hd = state.active_account().unwrap();
        assert_eq!(hd.balances["ethereum"], "0");
        assert_eq!(hd.balances["syscoin"], "0");
        assert_eq!(state.hd_accounts().count(), 0);
    }

    #[test]
    fn test_state_serializes_with_tagged_keys() {
        let state = WalletState::default();
        let value = serde_json::to_value(&state).unwrap();

        assert!(value["accounts"]["HDAccount"]["0"].is_object());
        assert!(value["networks"]["ethereum"]["137"].is_object());
        assert_eq!(value["activeAccountType"], "HDAccount");

        let back: WalletState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_view_omits_xprv() {
        let mut account = Account::placeholder(AccountType::HdAccount);
        account.xprv = "deadbeef".to_string();

        let json = serde_json::to_string(&account.view()).unwrap();
        assert!(!json.contains("xprv"));
        assert!(!json.contains("deadbeef"));
    }

    #[test]
    fn test_coin_type_per_family() {
        let mut network = crate::config::rpc::syscoin_mainnet();
        assert_eq!(network.coin_type(NetworkFamily::Syscoin), 57);
        assert_eq!(network.coin_type(NetworkFamily::Ethereum), 60);

        network.slip44 = None;
        network.chain_id = 5700;
        assert_eq!(network.coin_type(NetworkFamily::Syscoin), 5700);
    }
}
