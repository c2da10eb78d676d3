//! Address index: maps every tracked address to the wallet that owns it.
//!
//! Lookups take a shared read lock; a rebuild swaps the whole map under a
//! short write lock, so readers see either the old or the new index.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;
use tracing::{debug, error};
use txflow_store::{StoreError, UserStore};
use txflow_types::{AddressOwner, User};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Two different wallets claim the same address.
    #[error("address {address} claimed by {existing:?} and {conflicting:?}")]
    DuplicateAddress {
        address: String,
        existing: AddressOwner,
        conflicting: AddressOwner,
    },
}

#[derive(Default)]
pub struct AddressIndex {
    owners: RwLock<HashMap<String, AddressOwner>>,
}

impl AddressIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from `users`.
    ///
    /// Addresses claimed by more than one wallet are left out entirely and
    /// reported; no owner wins by ordering.
    pub fn from_users(users: &[User]) -> (Self, Vec<IndexError>) {
        let (owners, conflicts) = build_map(users);
        (
            Self {
                owners: RwLock::new(owners),
            },
            conflicts,
        )
    }

    /// Load the index from the user store.
    pub async fn load(store: &dyn UserStore) -> Result<(Self, Vec<IndexError>), StoreError> {
        let users = store.users().await?;
        Ok(Self::from_users(&users))
    }

    /// Owner of `address`, if it is tracked.
    pub fn lookup(&self, address: &str) -> Option<AddressOwner> {
        self.read().get(address).cloned()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.read().contains_key(address)
    }

    /// Track a newly derived address.
    ///
    /// Re-inserting the same owner is a no-op; a different owner is rejected.
    pub fn insert(&self, address: &str, owner: AddressOwner) -> Result<(), IndexError> {
        let mut owners = self.write();
        match owners.get(address) {
            Some(existing) if *existing == owner => Ok(()),
            Some(existing) => Err(IndexError::DuplicateAddress {
                address: address.to_string(),
                existing: existing.clone(),
                conflicting: owner,
            }),
            None => {
                owners.insert(address.to_string(), owner);
                Ok(())
            }
        }
    }

    /// Replace the index with the current contents of the user store.
    ///
    /// On a store error the previous index stays in place.
    pub async fn rebuild(&self, store: &dyn UserStore) -> Result<Vec<IndexError>, StoreError> {
        let users = store.users().await?;
        let (owners, conflicts) = build_map(&users);
        for conflict in &conflicts {
            error!(%conflict, "address left out of index");
        }
        let count = owners.len();
        *self.write() = owners;
        debug!(addresses = count, "address index rebuilt");
        Ok(conflicts)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, AddressOwner>> {
        self.owners.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, AddressOwner>> {
        self.owners.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn build_map(users: &[User]) -> (HashMap<String, AddressOwner>, Vec<IndexError>) {
    let mut owners: HashMap<String, AddressOwner> = HashMap::new();
    let mut conflicts = Vec::new();
    let mut contested: Vec<String> = Vec::new();

    for user in users {
        for (address, owner) in user.owned_addresses() {
            match owners.get(address) {
                Some(existing) if *existing == owner => {}
                Some(existing) => {
                    conflicts.push(IndexError::DuplicateAddress {
                        address: address.to_string(),
                        existing: existing.clone(),
                        conflicting: owner,
                    });
                    contested.push(address.to_string());
                }
                None => {
                    owners.insert(address.to_string(), owner);
                }
            }
        }
    }

    for address in contested {
        owners.remove(&address);
    }
    (owners, conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(user: &str, wallet: u32, index: u32) -> AddressOwner {
        AddressOwner {
            user_id: user.into(),
            wallet_index: wallet,
            address_index: index,
        }
    }

    #[test]
    fn indexes_every_wallet_address() {
        let users = vec![
            User::new("u1").with_wallet(0, &["a1", "a2"]),
            User::new("u2").with_wallet(3, &["b1"]),
        ];
        let (index, conflicts) = AddressIndex::from_users(&users);
        assert!(conflicts.is_empty());
        assert_eq!(index.len(), 3);
        assert_eq!(index.lookup("a2"), Some(owner("u1", 0, 1)));
        assert_eq!(index.lookup("b1"), Some(owner("u2", 3, 0)));
        assert_eq!(index.lookup("zz"), None);
    }

    #[test]
    fn contested_address_is_excluded_and_reported() {
        let users = vec![
            User::new("u1").with_wallet(0, &["shared", "a1"]),
            User::new("u2").with_wallet(0, &["shared"]),
        ];
        let (index, conflicts) = AddressIndex::from_users(&users);
        assert_eq!(conflicts.len(), 1);
        assert!(!index.contains("shared"));
        assert!(index.contains("a1"));
    }

    #[test]
    fn insert_rejects_second_owner() {
        let index = AddressIndex::new();
        index.insert("a1", owner("u1", 0, 0)).unwrap();
        index.insert("a1", owner("u1", 0, 0)).unwrap();
        let err = index.insert("a1", owner("u2", 0, 0)).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateAddress { ref address, .. } if address == "a1"));
        assert_eq!(index.lookup("a1"), Some(owner("u1", 0, 0)));
    }
}
