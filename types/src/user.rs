//! Tracked users, their wallets and addresses.

use serde::{Deserialize, Serialize};

use crate::WalletStatus;

/// A user document: an ordered list of wallets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub wallets: Vec<Wallet>,
}

/// A wallet inside a user document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Stable index of the wallet within the user.
    pub wallet_index: u32,
    #[serde(default)]
    pub wallet_name: String,
    #[serde(default)]
    pub addresses: Vec<TrackedAddress>,
    #[serde(default)]
    pub status: WalletStatus,
    #[serde(default)]
    pub last_action_time: i64,
}

/// An address derived for a wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedAddress {
    /// Stable index of the address within its wallet.
    pub address_index: u32,
    pub address: String,
    #[serde(default)]
    pub last_action_time: i64,
}

/// The owner of a tracked address, as answered by the address index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressOwner {
    pub user_id: String,
    pub wallet_index: u32,
    pub address_index: u32,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            wallets: Vec::new(),
        }
    }

    /// Add a wallet with the given addresses, indexed in order.
    pub fn with_wallet(mut self, wallet_index: u32, addresses: &[&str]) -> Self {
        self.wallets.push(Wallet {
            wallet_index,
            wallet_name: String::new(),
            addresses: addresses
                .iter()
                .enumerate()
                .map(|(i, addr)| TrackedAddress {
                    address_index: i as u32,
                    address: (*addr).to_string(),
                    last_action_time: 0,
                })
                .collect(),
            status: WalletStatus::Created,
            last_action_time: 0,
        });
        self
    }

    pub fn wallet(&self, wallet_index: u32) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.wallet_index == wallet_index)
    }

    pub fn wallet_mut(&mut self, wallet_index: u32) -> Option<&mut Wallet> {
        self.wallets
            .iter_mut()
            .find(|w| w.wallet_index == wallet_index)
    }

    /// Every `(address, owner)` pair this user tracks.
    pub fn owned_addresses(&self) -> impl Iterator<Item = (&str, AddressOwner)> + '_ {
        self.wallets.iter().flat_map(move |wallet| {
            wallet.addresses.iter().map(move |addr| {
                (
                    addr.address.as_str(),
                    AddressOwner {
                        user_id: self.user_id.clone(),
                        wallet_index: wallet.wallet_index,
                        address_index: addr.address_index,
                    },
                )
            })
        })
    }
}
