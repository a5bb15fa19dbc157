use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use serde_json::Map;

use crate::marketplace::domain::{
    DocumentUploads, Favorite, IdType, ServiceInput, User, UserType, VerificationDetails,
};
use crate::marketplace::Marketplace;
use crate::store::{MemoryStore, PersistentStore, StoreError};

pub(super) const PREFIX: &str = "icateryou_";

pub(super) fn key(name: &str) -> String {
    format!("{PREFIX}{name}")
}

pub(super) fn provider(name: &str) -> User {
    User::new(name, UserType::Provider).expect("valid provider")
}

pub(super) fn client(name: &str) -> User {
    User::new(name, UserType::Client).expect("valid client")
}

pub(super) fn details() -> VerificationDetails {
    VerificationDetails {
        business_name: "Iloilo Flavors".to_string(),
        business_type: "catering".to_string(),
        business_address: "Diversion Road, Iloilo City".to_string(),
        contact_phone: "09171234567".to_string(),
        tax_id: "123-456-789".to_string(),
        description: "Family-run Ilonggo catering".to_string(),
        id_type: IdType::DriversLicense,
        id_number: "N0312345678".to_string(),
        documents: DocumentUploads {
            business_license: true,
            id_front: true,
            id_back: true,
            selfie: true,
            ..DocumentUploads::default()
        },
        extra: Map::new(),
    }
}

pub(super) fn wedding_package() -> ServiceInput {
    ServiceInput {
        name: "Wedding Package".to_string(),
        description: "Plated dinner for the reception".to_string(),
        price: "₱300-500".to_string(),
        category: "Weddings".to_string(),
        capacity: "50-300".to_string(),
        image: None,
    }
}

pub(super) fn caterer(id: &str, name: &str) -> Favorite {
    Favorite::new(id, name)
        .with_detail("rating", 4.8)
        .with_detail("location", "Iloilo City")
}

pub(super) fn memory_marketplace() -> (Marketplace<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let marketplace = Marketplace::new(store.clone()).expect("hydrate empty store");
    (marketplace, store)
}

/// Raw bytes under every key, for before/after comparisons.
pub(super) fn snapshot(store: &MemoryStore) -> Vec<(String, Option<Vec<u8>>)> {
    [
        "user",
        "services",
        "favorites",
        "pending_verifications",
        "verification_decisions",
    ]
    .iter()
    .map(|name| {
        let key = key(name);
        let raw = store.raw(&key);
        (key, raw)
    })
    .collect()
}

/// Memory store whose writes to selected keys can be made to fail.
#[derive(Default)]
pub(super) struct FlakyStore {
    pub(super) inner: MemoryStore,
    failing: Mutex<BTreeSet<String>>,
}

impl FlakyStore {
    pub(super) fn fail_writes_to(&self, key: &str) {
        self.failing
            .lock()
            .expect("flaky mutex poisoned")
            .insert(key.to_string());
    }

    pub(super) fn heal(&self) {
        self.failing.lock().expect("flaky mutex poisoned").clear();
    }

    fn check(&self, key: &str) -> Result<(), StoreError> {
        if self
            .failing
            .lock()
            .expect("flaky mutex poisoned")
            .contains(key)
        {
            return Err(StoreError::Unavailable(format!("{key} is read only")));
        }
        Ok(())
    }
}

impl PersistentStore for FlakyStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.load(key)
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.save(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check(key)?;
        self.inner.remove(key)
    }
}

/// Store that cannot be read at all.
pub(super) struct OfflineStore;

impl PersistentStore for OfflineStore {
    fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Unavailable("disk detached".to_string()))
    }

    fn save(&self, _key: &str, _value: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk detached".to_string()))
    }

    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk detached".to_string()))
    }
}
