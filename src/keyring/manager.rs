//! Account lifecycle state machine
//!
//! `KeyringManager` owns the vault and the wallet state behind one
//! `tokio::sync::RwLock`. Every mutation holds the write guard for its whole
//! read-modify-write and persists the resulting state before releasing it,
//! so readers never see an active-account pointer out of step with the
//! account data it points at.

use crate::config::KeyringConfig;
use crate::keyring::derivation::{self, DerivedAccount};
use crate::keyring::types::{
    Account, AccountType, AccountView, KeyringStatus, Network, NetworkFamily, WalletSnapshot,
    WalletState,
};
use crate::provider::{EvmProvider, HttpProviderFactory, ProviderFactory};
use crate::rpc::{HttpRpcClient, RpcClient};
use crate::storage::{FileStore, KeyValueStore, MemoryStore, WALLET_STATE};
use crate::transactions::units::format_units;
use crate::vault::cipher::{self, PasswordHash, SessionKey};
use crate::vault::VaultStore;
use crate::wallet::ScopedSigner;
use crate::{Error, Result};
use alloy::primitives::{Address, U256};
use bip39::Mnemonic;
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroizing;

/// Satoshi-denominated balances on UTXO chains
const UTXO_DECIMALS: u32 = 8;
const EVM_DECIMALS: u32 = 18;

struct Inner {
    vault: VaultStore,
    state: WalletState,
}

impl Inner {
    fn status(&self) -> KeyringStatus {
        if !self.vault.is_unlocked() {
            KeyringStatus::Locked
        } else if self.state.hd_accounts().next().is_some() {
            KeyringStatus::VaultActive
        } else {
            KeyringStatus::Unlocked
        }
    }

    fn require_vault(&self) -> Result<()> {
        match self.status() {
            KeyringStatus::VaultActive => Ok(()),
            _ => Err(Error::VaultNotInitialized),
        }
    }

    fn active_account(&self) -> Result<&Account> {
        self.state.active_account().ok_or(Error::AccountNotFound)
    }

    fn seed(&self) -> Result<Zeroizing<[u8; 64]>> {
        let phrase = self.vault.get_decrypted_mnemonic()?;
        let mnemonic = Mnemonic::parse(phrase.expose_secret()).map_err(|_| Error::InvalidSeed)?;
        Ok(Zeroizing::new(mnemonic.to_seed("")))
    }

    fn derive(&self, seed: &[u8], index: u32) -> Result<DerivedAccount> {
        derivation::derive_account(
            seed,
            self.state.active_network_family,
            &self.state.active_network,
            index,
        )
    }

    /// Build a new HD account at `index` with its key sealed under the session.
    fn new_hd_account(&self, seed: &[u8], index: u32, label: String) -> Result<Account> {
        let derived = self.derive(seed, index)?;
        let mut account = Account::placeholder(AccountType::HdAccount);
        account.id = index;
        account.label = label;
        account.address = derived.address;
        account.xpub = derived.xpub;
        account.xprv = self.vault.seal(derived.xprv.as_bytes())?;
        Ok(account)
    }
}

/// Vault, accounts and networks for one wallet
#[derive(Clone)]
pub struct KeyringManager {
    inner: Arc<RwLock<Inner>>,
    store: Arc<dyn KeyValueStore>,
    providers: Arc<dyn ProviderFactory>,
    rpc: Arc<dyn RpcClient>,
    config: KeyringConfig,
}

impl KeyringManager {
    /// A fresh keyring in the default state.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        providers: Arc<dyn ProviderFactory>,
        rpc: Arc<dyn RpcClient>,
        config: KeyringConfig,
    ) -> Self {
        let inner = Inner {
            vault: VaultStore::new(store.clone(), config.kdf),
            state: WalletState::default(),
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
            store,
            providers,
            rpc,
            config,
        }
    }

    /// Restore vault and wallet state from `store`. The keyring comes back locked.
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        providers: Arc<dyn ProviderFactory>,
        rpc: Arc<dyn RpcClient>,
        config: KeyringConfig,
    ) -> Result<Self> {
        let vault = VaultStore::load(store.clone(), config.kdf)?;
        let state = match store.get(WALLET_STATE)? {
            Some(value) => serde_json::from_value(value)?,
            None => WalletState::default(),
        };
        tracing::info!(
            active_account_id = state.active_account_id,
            chain_id = state.active_network.chain_id,
            "keyring loaded"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(Inner { vault, state })),
            store,
            providers,
            rpc,
            config,
        })
    }

    /// HTTP providers plus a [`FileStore`] at `config.storage_path`, or an
    /// in-memory store when no path is configured.
    pub fn from_config(config: KeyringConfig) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> = match &config.storage_path {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        let providers = Arc::new(HttpProviderFactory::new(config.rpc_timeout()));
        let rpc = Arc::new(HttpRpcClient::new(config.rpc_timeout())?);
        Self::load(store, providers, rpc, config)
    }

    pub fn config(&self) -> &KeyringConfig {
        &self.config
    }

    pub(crate) fn rpc(&self) -> &Arc<dyn RpcClient> {
        &self.rpc
    }

    fn persist(&self, state: &WalletState) -> Result<()> {
        self.store.set(WALLET_STATE, serde_json::to_value(state)?)
    }

    // --- vault -----------------------------------------------------------

    /// Derive the session key for `password` on the blocking pool, without
    /// holding the state lock.
    async fn derive_session(&self, password: &str) -> Result<(PasswordHash, SessionKey)> {
        let record = self
            .inner
            .read()
            .await
            .vault
            .password_record()
            .cloned()
            .ok_or(Error::VaultNotInitialized)?;
        let key = cipher::verify_blocking(record.clone(), password)
            .await?
            .ok_or(Error::InvalidPassword)?;
        Ok((record, key))
    }

    /// Set or change the wallet password.
    ///
    /// Sealed account keys are resealed under the new password and written
    /// in the same storage batch as the new vault entries.
    pub async fn set_wallet_password(&self, password: &str) -> Result<()> {
        let (record, key) = cipher::create_blocking(password, self.config.kdf).await?;

        let mut inner = self.inner.write().await;
        let rekey = inner.vault.rekey(record, key)?;
        let mut next = inner.state.clone();
        let mut resealed = 0usize;
        for bucket in next.accounts.values_mut() {
            for account in bucket.values_mut().filter(|a| a.has_key()) {
                account.xprv = inner.vault.reseal(&account.xprv, &rekey)?;
                resealed += 1;
            }
        }

        let mut entries = rekey.entries()?;
        entries.push((WALLET_STATE, serde_json::to_value(&next)?));
        self.store.set_all(entries)?;

        inner.vault.apply(rekey);
        inner.state = next;
        if resealed > 0 {
            tracing::info!(resealed, "account keys resealed under new password");
        }
        Ok(())
    }

    pub async fn check_password(&self, password: &str) -> bool {
        match self.derive_session(password).await {
            Ok(_) => true,
            Err(Error::InvalidPassword | Error::VaultNotInitialized) => false,
            Err(e) => {
                tracing::warn!(error = %e, "password check failed");
                false
            }
        }
    }

    pub async fn create_seed(&self) -> Result<SecretString> {
        self.inner.write().await.vault.create_seed()
    }

    pub async fn validate_seed(&self, candidate: &str) -> bool {
        self.inner.write().await.vault.validate_seed(candidate)
    }

    pub async fn get_seed(&self, password: &str) -> Result<SecretString> {
        let (record, key) = self.derive_session(password).await.map_err(as_password_error)?;
        self.inner.read().await.vault.reveal_seed(&record, &key)
    }

    pub async fn unlock(&self, password: &str) -> Result<()> {
        let (record, key) = self.derive_session(password).await?;
        self.inner.write().await.vault.open_session(&record, key)
    }

    pub async fn lock(&self) {
        self.inner.write().await.vault.lock();
    }

    pub async fn status(&self) -> KeyringStatus {
        self.inner.read().await.status()
    }

    pub async fn is_unlocked(&self) -> bool {
        self.inner.read().await.vault.is_unlocked()
    }

    pub async fn has_hd_accounts(&self) -> bool {
        self.inner.read().await.state.hd_accounts().next().is_some()
    }

    // --- accounts --------------------------------------------------------

    /// Commit the pending mnemonic, derive HD account 0 from it and make it
    /// active. Only valid while `Unlocked`: an active vault keeps its root.
    pub async fn create_keyring_vault(&self) -> Result<AccountView> {
        let mut inner = self.inner.write().await;
        match inner.status() {
            KeyringStatus::Unlocked => {}
            KeyringStatus::Locked => return Err(Error::VaultNotInitialized),
            KeyringStatus::VaultActive => return Err(Error::VaultAlreadyInitialized),
        }

        inner.vault.commit_pending()?;
        let seed = inner.seed()?;
        let account = inner.new_hd_account(seed.as_slice(), 0, "Account 1".to_string())?;
        let view = account.view();

        let state = &mut inner.state;
        state
            .accounts
            .insert(AccountType::HdAccount, [(0, account)].into_iter().collect());
        state.active_account_id = 0;
        state.active_account_type = AccountType::HdAccount;
        self.persist(state)?;

        tracing::info!(address = %view.address, family = %state.active_network_family, "keyring vault created");
        Ok(view)
    }

    /// Derive the next HD account and make it active.
    pub async fn add_new_account(&self, label: Option<&str>) -> Result<AccountView> {
        let mut inner = self.inner.write().await;
        inner.require_vault()?;

        let id = inner
            .state
            .hd_accounts()
            .map(|account| account.id)
            .max()
            .map_or(0, |max| max + 1);
        let label = match label {
            Some(label) if !label.trim().is_empty() => label.to_string(),
            _ => format!("Account {}", id + 1),
        };

        let seed = inner.seed()?;
        let account = inner.new_hd_account(seed.as_slice(), id, label)?;
        let view = account.view();

        let state = &mut inner.state;
        state
            .accounts
            .entry(AccountType::HdAccount)
            .or_default()
            .insert(id, account);
        state.active_account_id = id;
        state.active_account_type = AccountType::HdAccount;
        self.persist(state)?;

        tracing::info!(account_id = id, address = %view.address, "account added");
        Ok(view)
    }

    /// Point the keyring at account `id` of `account_type` (default: the
    /// active bucket).
    pub async fn set_active_account(
        &self,
        id: u32,
        account_type: Option<AccountType>,
    ) -> Result<AccountView> {
        let mut inner = self.inner.write().await;
        let account_type = account_type.unwrap_or(inner.state.active_account_type);
        let view = inner
            .state
            .bucket(account_type)
            .and_then(|bucket| bucket.get(&id))
            .map(Account::view)
            .ok_or(Error::AccountNotFound)?;

        inner.state.active_account_id = id;
        inner.state.active_account_type = account_type;
        self.persist(&inner.state)?;

        tracing::info!(account_id = id, account_type = %account_type, "active account switched");
        Ok(view)
    }

    pub async fn set_account_label(&self, id: u32, label: &str) -> Result<AccountView> {
        let mut inner = self.inner.write().await;
        let account_type = inner.state.active_account_type;
        let account = inner
            .state
            .accounts
            .get_mut(&account_type)
            .and_then(|bucket| bucket.get_mut(&id))
            .ok_or(Error::AccountNotFound)?;
        account.label = label.to_string();
        let view = account.view();

        self.persist(&inner.state)?;
        Ok(view)
    }

    /// Account `id` in the active bucket.
    pub async fn get_account_by_id(&self, id: u32) -> Result<AccountView> {
        let inner = self.inner.read().await;
        inner
            .state
            .bucket(inner.state.active_account_type)
            .and_then(|bucket| bucket.get(&id))
            .map(Account::view)
            .ok_or(Error::AccountNotFound)
    }

    pub async fn get_active_account(&self) -> Result<AccountView> {
        self.inner.read().await.active_account().map(Account::view)
    }

    /// Accounts of the active bucket in id order
    pub async fn get_accounts(&self) -> Vec<AccountView> {
        let inner = self.inner.read().await;
        inner
            .state
            .bucket(inner.state.active_account_type)
            .map(|bucket| bucket.values().map(Account::view).collect())
            .unwrap_or_default()
    }

    /// Plaintext extended private key of account `id` in the active bucket.
    pub async fn get_private_key_by_account_id(&self, id: u32) -> Result<SecretString> {
        let inner = self.inner.read().await;
        let account = inner
            .state
            .bucket(inner.state.active_account_type)
            .and_then(|bucket| bucket.get(&id))
            .ok_or(Error::AccountNotFound)?;
        if !account.has_key() {
            return Err(Error::VaultNotInitialized);
        }

        tracing::warn!(account_id = id, "revealing extended private key");
        inner.vault.open(&account.xprv)
    }

    /// Sealed extended private key of the active account
    pub async fn get_encrypted_xprv(&self) -> Result<String> {
        let inner = self.inner.read().await;
        let account = inner.active_account()?;
        if !account.has_key() {
            return Err(Error::VaultNotInitialized);
        }
        Ok(account.xprv.clone())
    }

    pub async fn get_account_xpub(&self) -> Result<String> {
        let inner = self.inner.read().await;
        let account = inner.active_account()?;
        if account.xpub.is_empty() {
            return Err(Error::VaultNotInitialized);
        }
        Ok(account.xpub.clone())
    }

    pub async fn get_state(&self) -> WalletSnapshot {
        self.inner.read().await.state.snapshot()
    }

    // --- networks --------------------------------------------------------

    pub async fn get_network(&self) -> Network {
        self.inner.read().await.state.active_network.clone()
    }

    pub async fn get_network_family(&self) -> NetworkFamily {
        self.inner.read().await.state.active_network_family
    }

    /// Registered network `chain_id` of `family`
    pub async fn network(&self, family: NetworkFamily, chain_id: u64) -> Result<Network> {
        self.inner
            .read()
            .await
            .state
            .networks
            .get(&family)
            .and_then(|chains| chains.get(&chain_id))
            .cloned()
            .ok_or(Error::NetworkNotFound { family, chain_id })
    }

    /// Switch the active network.
    ///
    /// When the derivation context changes (family or coin type), every HD
    /// account's address and xpub are re-derived for the new network.
    pub async fn set_signer_network(
        &self,
        network: &Network,
        family: NetworkFamily,
    ) -> Result<AccountView> {
        let mut inner = self.inner.write().await;
        let target = inner
            .state
            .networks
            .get(&family)
            .and_then(|chains| chains.get(&network.chain_id))
            .cloned()
            .ok_or(Error::NetworkNotFound {
                family,
                chain_id: network.chain_id,
            })?;

        let previous_family = inner.state.active_network_family;
        let rederive = previous_family != family
            || inner.state.active_network.coin_type(previous_family) != target.coin_type(family);

        let mut rederived = Vec::new();
        if rederive && inner.state.hd_accounts().next().is_some() {
            let seed = inner.seed()?;
            for account in inner.state.hd_accounts() {
                let derived = derivation::derive_account(seed.as_slice(), family, &target, account.id)?;
                let xprv = inner.vault.seal(derived.xprv.as_bytes())?;
                rederived.push((account.id, derived.address, derived.xpub, xprv));
            }
        }

        let state = &mut inner.state;
        if let Some(bucket) = state.accounts.get_mut(&AccountType::HdAccount) {
            for (id, address, xpub, xprv) in rederived {
                if let Some(account) = bucket.get_mut(&id) {
                    account.address = address;
                    account.xpub = xpub;
                    account.xprv = xprv;
                }
            }
        }
        state.active_network = target;
        state.active_network_family = family;
        self.persist(state)?;

        tracing::info!(
            chain_id = state.active_network.chain_id,
            family = %family,
            rederived = rederive,
            "signer network switched"
        );
        state.active_account().map(Account::view).ok_or(Error::AccountNotFound)
    }

    /// Register a validated network. Chain id 0 is never valid; default
    /// entries cannot be replaced.
    pub async fn add_network(&self, family: NetworkFamily, mut network: Network) -> Result<Network> {
        if network.chain_id == 0 {
            return Err(Error::InvalidChainId("0x0".to_string()));
        }
        let mut inner = self.inner.write().await;
        let chains = inner.state.networks.entry(family).or_default();
        if chains.get(&network.chain_id).is_some_and(|existing| existing.default) {
            return Err(Error::NetworkRemovalForbidden {
                family,
                chain_id: network.chain_id,
                reason: "default networks cannot be replaced",
            });
        }

        network.default = false;
        if family.is_utxo() && network.slip44.is_none() {
            network.slip44 = u32::try_from(network.chain_id).ok();
        }
        chains.insert(network.chain_id, network.clone());

        let state = &mut inner.state;
        if state.active_network_family == family && state.active_network.chain_id == network.chain_id {
            state.active_network = network.clone();
        }
        self.persist(state)?;

        tracing::info!(chain_id = network.chain_id, family = %family, label = %network.label, "network added");
        Ok(network)
    }

    /// Remove a custom network. Default and active networks are kept.
    pub async fn remove_network(&self, family: NetworkFamily, chain_id: u64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let state = &mut inner.state;
        let existing = state
            .networks
            .get(&family)
            .and_then(|chains| chains.get(&chain_id))
            .ok_or(Error::NetworkNotFound { family, chain_id })?;

        if existing.default {
            return Err(Error::NetworkRemovalForbidden {
                family,
                chain_id,
                reason: "default networks cannot be removed",
            });
        }
        if state.active_network_family == family && state.active_network.chain_id == chain_id {
            return Err(Error::NetworkRemovalForbidden {
                family,
                chain_id,
                reason: "the active network cannot be removed",
            });
        }

        if let Some(chains) = state.networks.get_mut(&family) {
            chains.remove(&chain_id);
        }
        self.persist(state)?;
        tracing::info!(chain_id, family = %family, "network removed");
        Ok(())
    }

    // --- balances --------------------------------------------------------

    /// Refresh the active account's balance on the active network.
    pub async fn get_latest_update_for_account(&self) -> Result<AccountView> {
        let (account_type, id, address, xpub, network, family) = {
            let inner = self.inner.read().await;
            inner.require_vault()?;
            let account = inner.active_account()?;
            (
                inner.state.active_account_type,
                account.id,
                account.address.clone(),
                account.xpub.clone(),
                inner.state.active_network.clone(),
                inner.state.active_network_family,
            )
        };

        let balance = match family {
            NetworkFamily::Ethereum => {
                let owner = Address::from_str(&address)
                    .map_err(|e| Error::InvalidInput(format!("account address: {}", e)))?;
                let wei = self.providers.connect(&network)?.get_balance(owner).await?;
                format_units(wei, EVM_DECIMALS)
            }
            NetworkFamily::Syscoin => {
                let url = format!(
                    "{}/api/v2/xpub/{}?details=basic",
                    network.url.trim_end_matches('/'),
                    xpub
                );
                let body = self.rpc.get_json(&url).await?;
                let sats = body
                    .get("balance")
                    .and_then(|b| b.as_str())
                    .ok_or_else(|| Error::Provider("balance missing from explorer response".to_string()))?;
                let sats = U256::from_str(sats)
                    .map_err(|e| Error::Provider(format!("invalid balance {}: {}", sats, e)))?;
                format_units(sats, UTXO_DECIMALS)
            }
        };

        let mut inner = self.inner.write().await;
        let state = &mut inner.state;
        let account = state
            .accounts
            .get_mut(&account_type)
            .and_then(|bucket| bucket.get_mut(&id))
            .ok_or(Error::AccountNotFound)?;
        if account.address == address {
            account.balances.insert(network.currency.clone(), balance);
        } else {
            tracing::debug!(account_id = id, "account re-derived during balance refresh, skipping merge");
        }
        let view = account.view();
        self.persist(state)?;

        tracing::debug!(account_id = id, currency = %network.currency, "balance updated");
        Ok(view)
    }

    /// Wipe the vault and restore the default wallet state.
    pub async fn forget_main_wallet(&self, password: &str) -> Result<()> {
        let (record, _) = self.derive_session(password).await.map_err(as_password_error)?;
        let mut inner = self.inner.write().await;
        if inner.vault.password_record() != Some(&record) {
            return Err(Error::InvalidPassword);
        }

        inner.vault.wipe()?;
        inner.state = WalletState::default();
        self.store.remove(WALLET_STATE)?;
        tracing::warn!("main wallet forgotten, state reset to defaults");
        Ok(())
    }

    // --- signing context -------------------------------------------------

    /// Decrypt the active account's key if it controls `address`.
    ///
    /// The address check happens before any decryption.
    pub(crate) async fn signer_for(&self, address: &str) -> Result<ScopedSigner> {
        let inner = self.inner.read().await;
        inner.require_vault()?;
        let account = inner.active_account()?;
        if !account.address.eq_ignore_ascii_case(address.trim()) {
            return Err(Error::WrongAddress(address.to_string()));
        }
        Self::unseal_signer(&inner, account)
    }

    /// Fail with `WrongAddress` unless `address` is the active account.
    pub(crate) async fn ensure_active(&self, address: &str) -> Result<Address> {
        let inner = self.inner.read().await;
        inner.require_vault()?;
        let account = inner.active_account()?;
        if !account.address.eq_ignore_ascii_case(address.trim()) {
            return Err(Error::WrongAddress(address.to_string()));
        }
        Address::from_str(&account.address).map_err(|_| Error::UnsupportedNetworkFamily {
            expected: NetworkFamily::Ethereum,
            actual: inner.state.active_network_family,
        })
    }

    /// Decrypt the active account's key.
    pub(crate) async fn active_signer(&self) -> Result<ScopedSigner> {
        let inner = self.inner.read().await;
        inner.require_vault()?;
        let account = inner.active_account()?;
        Self::unseal_signer(&inner, account)
    }

    fn unseal_signer(inner: &Inner, account: &Account) -> Result<ScopedSigner> {
        let family = inner.state.active_network_family;
        if family != NetworkFamily::Ethereum {
            return Err(Error::UnsupportedNetworkFamily {
                expected: NetworkFamily::Ethereum,
                actual: family,
            });
        }
        let expected = Address::from_str(&account.address)
            .map_err(|e| Error::InvalidInput(format!("account address: {}", e)))?;

        let xprv = inner.vault.open(&account.xprv)?;
        let secret = derivation::private_key_bytes(xprv.expose_secret())?;
        ScopedSigner::new(secret, expected)
    }

    /// Active account address on an EVM network.
    pub(crate) async fn active_address(&self) -> Result<Address> {
        let inner = self.inner.read().await;
        inner.require_vault()?;
        let account = inner.active_account()?;
        Address::from_str(&account.address)
            .map_err(|_| Error::UnsupportedNetworkFamily {
                expected: NetworkFamily::Ethereum,
                actual: inner.state.active_network_family,
            })
    }

    /// Provider for the active EVM network.
    pub(crate) async fn provider(&self) -> Result<Arc<dyn EvmProvider>> {
        let (network, family) = {
            let inner = self.inner.read().await;
            (
                inner.state.active_network.clone(),
                inner.state.active_network_family,
            )
        };
        if family != NetworkFamily::Ethereum {
            return Err(Error::UnsupportedNetworkFamily {
                expected: NetworkFamily::Ethereum,
                actual: family,
            });
        }
        self.providers.connect(&network)
    }
}

/// A missing password record reads as a failed password check.
fn as_password_error(e: Error) -> Error {
    match e {
        Error::VaultNotInitialized => Error::InvalidPassword,
        other => other,
    }
}

impl std::fmt::Debug for KeyringManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
