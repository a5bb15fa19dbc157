//! Typed, write-through access to the persisted marketplace collections.
//!
//! Every collection is read from the store exactly once, at [`EntityRepository::hydrate`].
//! Afterwards reads are served from memory and every replacement is written to the store before
//! memory is updated, so the two never disagree.

use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use super::domain::{Favorite, Service, User, VerificationDecision, VerificationRequest};
use crate::store::{PersistentStore, StoreError};

/// Latest admin decision per user id, waiting for that user's next session.
pub type DecisionLedger = BTreeMap<String, VerificationDecision>;

/// Unprefixed key names shared with the storefront's storage layout.
pub mod keys {
    pub const USER: &str = "user";
    pub const SERVICES: &str = "services";
    pub const FAVORITES: &str = "favorites";
    pub const PENDING_VERIFICATIONS: &str = "pending_verifications";
    pub const VERIFICATION_DECISIONS: &str = "verification_decisions";
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("unable to encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Value shapes that can occupy a store key.
pub trait Persisted: Serialize + DeserializeOwned + Default {
    /// Absent values are removed from the store rather than written.
    fn is_absent(&self) -> bool {
        false
    }
}

impl Persisted for Option<User> {
    fn is_absent(&self) -> bool {
        self.is_none()
    }
}

impl Persisted for Vec<Service> {}
impl Persisted for Vec<Favorite> {}
impl Persisted for Vec<VerificationRequest> {}
impl Persisted for DecisionLedger {}

#[derive(Debug)]
struct Slot<T> {
    key: String,
    value: T,
    /// Bytes currently held by the store under `key`.
    raw: Option<Vec<u8>>,
}

/// What a slot held before a write, byte for byte.
type Previous<T> = (T, Option<Vec<u8>>);

impl<T: Persisted> Slot<T> {
    fn hydrate<S: PersistentStore + ?Sized>(store: &S, key: String) -> Self {
        let (value, raw) = match store.load(&key) {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => (value, Some(bytes)),
                Err(err) => {
                    warn!(%key, error = %err, "discarding unreadable marketplace state");
                    (T::default(), Some(bytes))
                }
            },
            Ok(None) => (T::default(), None),
            Err(err) => {
                warn!(%key, error = %err, "marketplace state unavailable, starting empty");
                (T::default(), None)
            }
        };
        Self { key, value, raw }
    }

    /// Persist `value`, then swap it in. Returns what it replaced.
    fn replace<S: PersistentStore + ?Sized>(
        &mut self,
        store: &S,
        value: T,
    ) -> Result<Previous<T>, RepositoryError> {
        let raw = if value.is_absent() {
            store.remove(&self.key)?;
            None
        } else {
            let bytes = serde_json::to_vec(&value).map_err(|source| RepositoryError::Encode {
                key: self.key.clone(),
                source,
            })?;
            store.save(&self.key, &bytes)?;
            Some(bytes)
        };
        debug!(key = %self.key, "marketplace state persisted");
        let previous_raw = mem::replace(&mut self.raw, raw);
        Ok((mem::replace(&mut self.value, value), previous_raw))
    }

    /// Put back exactly what a failed commit overwrote.
    fn restore<S: PersistentStore + ?Sized>(
        &mut self,
        store: &S,
        previous: Previous<T>,
    ) -> Result<(), RepositoryError> {
        let (value, raw) = previous;
        match &raw {
            Some(bytes) => store.save(&self.key, bytes)?,
            None => store.remove(&self.key)?,
        }
        self.value = value;
        self.raw = raw;
        Ok(())
    }
}

/// New values for any subset of collections, committed together.
#[derive(Debug, Default, Clone)]
pub struct Changeset {
    user: Option<Option<User>>,
    services: Option<Vec<Service>>,
    favorites: Option<Vec<Favorite>>,
    pending: Option<Vec<VerificationRequest>>,
    decisions: Option<DecisionLedger>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user: Option<User>) -> Self {
        self.user = Some(user);
        self
    }

    pub fn services(mut self, services: Vec<Service>) -> Self {
        self.services = Some(services);
        self
    }

    pub fn favorites(mut self, favorites: Vec<Favorite>) -> Self {
        self.favorites = Some(favorites);
        self
    }

    pub fn pending_verifications(mut self, pending: Vec<VerificationRequest>) -> Self {
        self.pending = Some(pending);
        self
    }

    pub fn decisions(mut self, decisions: DecisionLedger) -> Self {
        self.decisions = Some(decisions);
        self
    }
}

#[derive(Default)]
struct Undo {
    user: Option<Previous<Option<User>>>,
    services: Option<Previous<Vec<Service>>>,
    favorites: Option<Previous<Vec<Favorite>>>,
    pending: Option<Previous<Vec<VerificationRequest>>>,
    decisions: Option<Previous<DecisionLedger>>,
}

fn stage<T: Persisted, S: PersistentStore + ?Sized>(
    store: &S,
    slot: &mut Slot<T>,
    next: Option<T>,
    undo: &mut Option<Previous<T>>,
) -> Result<(), RepositoryError> {
    if let Some(value) = next {
        *undo = Some(slot.replace(store, value)?);
    }
    Ok(())
}

fn unstage<T: Persisted, S: PersistentStore + ?Sized>(
    store: &S,
    slot: &mut Slot<T>,
    previous: Option<Previous<T>>,
) {
    if let Some(previous) = previous {
        if let Err(err) = slot.restore(store, previous) {
            error!(key = %slot.key, error = %err, "rollback of partial marketplace write failed");
        }
    }
}

/// Owner of the four marketplace collections plus the decision ledger.
pub struct EntityRepository<S: ?Sized> {
    store: Arc<S>,
    user: Slot<Option<User>>,
    services: Slot<Vec<Service>>,
    favorites: Slot<Vec<Favorite>>,
    pending: Slot<Vec<VerificationRequest>>,
    decisions: Slot<DecisionLedger>,
}

impl<S: PersistentStore + ?Sized> EntityRepository<S> {
    /// Read every collection once. Unreadable data hydrates as empty.
    pub fn hydrate(store: Arc<S>, key_prefix: &str) -> Self {
        let key = |name: &str| format!("{key_prefix}{name}");
        Self {
            user: Slot::hydrate(&*store, key(keys::USER)),
            services: Slot::hydrate(&*store, key(keys::SERVICES)),
            favorites: Slot::hydrate(&*store, key(keys::FAVORITES)),
            pending: Slot::hydrate(&*store, key(keys::PENDING_VERIFICATIONS)),
            decisions: Slot::hydrate(&*store, key(keys::VERIFICATION_DECISIONS)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.value.as_ref()
    }

    pub fn services(&self) -> &[Service] {
        &self.services.value
    }

    pub fn favorites(&self) -> &[Favorite] {
        &self.favorites.value
    }

    pub fn pending_verifications(&self) -> &[VerificationRequest] {
        &self.pending.value
    }

    pub fn decisions(&self) -> &DecisionLedger {
        &self.decisions.value
    }

    pub fn replace_user(&mut self, user: Option<User>) -> Result<(), RepositoryError> {
        self.commit(Changeset::new().user(user))
    }

    pub fn replace_services(&mut self, services: Vec<Service>) -> Result<(), RepositoryError> {
        self.commit(Changeset::new().services(services))
    }

    pub fn replace_favorites(&mut self, favorites: Vec<Favorite>) -> Result<(), RepositoryError> {
        self.commit(Changeset::new().favorites(favorites))
    }

    pub fn replace_pending_verifications(
        &mut self,
        pending: Vec<VerificationRequest>,
    ) -> Result<(), RepositoryError> {
        self.commit(Changeset::new().pending_verifications(pending))
    }

    pub fn replace_decisions(&mut self, decisions: DecisionLedger) -> Result<(), RepositoryError> {
        self.commit(Changeset::new().decisions(decisions))
    }

    /// Write every collection in `changes`. If any write fails, collections already written
    /// by this call are restored before the error is returned.
    pub fn commit(&mut self, changes: Changeset) -> Result<(), RepositoryError> {
        let mut undo = Undo::default();
        if let Err(err) = self.apply(changes, &mut undo) {
            self.rollback(undo);
            return Err(err);
        }
        Ok(())
    }

    fn rollback(&mut self, undo: Undo) {
        let store = &*self.store;
        unstage(store, &mut self.user, undo.user);
        unstage(store, &mut self.favorites, undo.favorites);
        unstage(store, &mut self.services, undo.services);
        unstage(store, &mut self.decisions, undo.decisions);
        unstage(store, &mut self.pending, undo.pending);
    }

    fn apply(&mut self, changes: Changeset, undo: &mut Undo) -> Result<(), RepositoryError> {
        let Changeset {
            user,
            services,
            favorites,
            pending,
            decisions,
        } = changes;
        let store = &*self.store;

        stage(store, &mut self.pending, pending, &mut undo.pending)?;
        stage(store, &mut self.decisions, decisions, &mut undo.decisions)?;
        stage(store, &mut self.services, services, &mut undo.services)?;
        stage(store, &mut self.favorites, favorites, &mut undo.favorites)?;
        stage(store, &mut self.user, user, &mut undo.user)
    }
}
