//! Asset collaborators.
//!
//! The core never moves value itself; it asks an [`Asset`] to do so. Assets
//! follow the fungible-token convention of signalling failure by returning
//! `false`, so every call from the core goes through [`AssetRegistry`], which
//! turns `false` into [`Error::TransferFailed`].
//!
//! The registry is generic over the [`Asset`] implementation. The simulated
//! deployment holds [`TokenLedger`]s, which also carry a faucet for funding
//! accounts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::validation::validate_decimals;

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fungible asset with boolean-returning transfers
pub trait Asset {
    /// Address the asset is registered under
    fn address(&self) -> Address;

    /// Decimal places of the native unit
    fn decimals(&self) -> u8;

    /// Balance held by `account`
    fn balance_of(&self, account: &Address) -> u128;

    /// Move `amount` from `sender` to `to`
    fn transfer(&mut self, sender: Address, to: Address, amount: u128) -> bool;

    /// Move `amount` from `from` to `to` using `spender`'s allowance
    fn transfer_from(&mut self, spender: Address, from: Address, to: Address, amount: u128) -> bool;

    /// Set `spender`'s allowance over `owner`'s balance
    fn approve(&mut self, owner: Address, spender: Address, amount: u128) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Plain balance-holding token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Asset address
    pub address: Address,
    /// Token symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
    /// When set, every transfer returns `false`
    pub halted: bool,
    total_supply: u128,
    balances: BTreeMap<Address, u128>,
    allowances: BTreeMap<Address, BTreeMap<Address, u128>>,
}

impl TokenLedger {
    /// Create an empty token
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u8) -> Result<Self> {
        validate_decimals(decimals, "decimals")?;
        Ok(Self {
            address,
            symbol: symbol.into(),
            decimals,
            halted: false,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        })
    }

    /// Create new supply out of thin air (faucet)
    pub fn mint(&mut self, to: Address, amount: u128) -> Result<()> {
        let supply = self.total_supply.checked_add(amount).ok_or(Error::Overflow {
            operation: "mint total supply".into(),
        })?;
        let balance = self.balance_of(&to).checked_add(amount).ok_or(Error::Overflow {
            operation: "mint balance".into(),
        })?;
        self.balances.insert(to, balance);
        self.total_supply = supply;
        Ok(())
    }

    /// Total supply
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Allowance granted by `owner` to `spender`
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Verify supply invariant (total_supply == sum of all balances)
    pub fn verify_supply_invariant(&self) -> bool {
        let sum = self
            .balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b));
        sum == Some(self.total_supply)
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: u128) -> bool {
        if self.halted {
            return false;
        }
        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return false;
        }
        if from == to {
            return true;
        }
        let to_balance = match self.balance_of(&to).checked_add(amount) {
            Some(b) => b,
            None => return false,
        };

        let new_from_balance = from_balance - amount;
        if new_from_balance == 0 {
            self.balances.remove(&from);
        } else {
            self.balances.insert(from, new_from_balance);
        }
        self.balances.insert(to, to_balance);
        true
    }
}

impl Asset for TokenLedger {
    fn address(&self) -> Address {
        self.address
    }

    fn decimals(&self) -> u8 {
        self.decimals
    }

    fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(&mut self, sender: Address, to: Address, amount: u128) -> bool {
        self.move_balance(sender, to, amount)
    }

    fn transfer_from(&mut self, spender: Address, from: Address, to: Address, amount: u128) -> bool {
        let allowed = self.allowance(&from, &spender);
        if allowed < amount {
            return false;
        }
        if !self.move_balance(from, to, amount) {
            return false;
        }
        self.allowances
            .entry(from)
            .or_default()
            .insert(spender, allowed - amount);
        true
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: u128) -> bool {
        self.allowances.entry(owner).or_default().insert(spender, amount);
        true
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// All assets known to the host, addressed by asset address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRegistry<A = TokenLedger> {
    tokens: BTreeMap<Address, A>,
}

impl<A> Default for AssetRegistry<A> {
    fn default() -> Self {
        Self {
            tokens: BTreeMap::new(),
        }
    }
}

impl<A: Asset> AssetRegistry<A> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset under its own address
    pub fn register(&mut self, token: A) -> Result<()> {
        let address = token.address();
        if self.tokens.contains_key(&address) {
            return Err(Error::InvalidParameter {
                name: "asset".into(),
                reason: format!("{} already registered", address),
            });
        }
        self.tokens.insert(address, token);
        Ok(())
    }

    /// Look up an asset
    pub fn get(&self, asset: &Address) -> Result<&A> {
        self.tokens.get(asset).ok_or(Error::UnknownAsset(*asset))
    }

    /// Look up an asset mutably
    pub fn get_mut(&mut self, asset: &Address) -> Result<&mut A> {
        self.tokens.get_mut(asset).ok_or(Error::UnknownAsset(*asset))
    }

    /// Decimals of an asset
    pub fn decimals(&self, asset: &Address) -> Result<u8> {
        Ok(self.get(asset)?.decimals())
    }

    /// Balance of `account` in `asset`
    pub fn balance_of(&self, asset: &Address, account: &Address) -> Result<u128> {
        Ok(self.get(asset)?.balance_of(account))
    }

    /// Push `amount` from `sender` to `to`
    pub fn transfer(&mut self, asset: &Address, sender: Address, to: Address, amount: u128) -> Result<()> {
        if self.get_mut(asset)?.transfer(sender, to, amount) {
            Ok(())
        } else {
            Err(Error::TransferFailed(*asset))
        }
    }

    /// Pull `amount` from `from` into `to` on `spender`'s allowance
    pub fn transfer_from(
        &mut self,
        asset: &Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<()> {
        if self.get_mut(asset)?.transfer_from(spender, from, to, amount) {
            Ok(())
        } else {
            Err(Error::TransferFailed(*asset))
        }
    }

    /// Grant `spender` an allowance over `owner`'s balance
    pub fn approve(&mut self, asset: &Address, owner: Address, spender: Address, amount: u128) -> Result<()> {
        if self.get_mut(asset)?.approve(owner, spender, amount) {
            Ok(())
        } else {
            Err(Error::TransferFailed(*asset))
        }
    }
}

impl AssetRegistry<TokenLedger> {
    /// Faucet mint
    pub fn mint(&mut self, asset: &Address, to: Address, amount: u128) -> Result<()> {
        self.get_mut(asset)?.mint(to, amount)
    }
}
