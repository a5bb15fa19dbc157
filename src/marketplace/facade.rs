use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::domain::{
    Favorite, Service, ServiceId, ServiceInput, ServicePatch, User, UserType, VerificationDecision,
    VerificationDetails, VerificationRequest,
};
use super::repository::{Changeset, EntityRepository};
use super::session::{require_role, AccessError, DemoAccount, LoginRequest, SignupRequest};
use super::verification;
use crate::config::{MarketplaceConfig, StoreConfig};
use crate::error::MarketplaceError;
use crate::store::PersistentStore;

/// What `add_favorite` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteOutcome {
    Added,
    AlreadyFavorited,
}

/// Operations surface consumed by the storefront pages.
///
/// Each operation computes the next value of the collections it touches and commits them
/// through the repository before returning. Operations take `&mut self`, so two of them can
/// never interleave.
pub struct Marketplace<S: ?Sized> {
    repository: EntityRepository<S>,
    config: MarketplaceConfig,
}

impl<S: PersistentStore + ?Sized> Marketplace<S> {
    /// Hydrate from `store` with default key names and rules.
    pub fn new(store: Arc<S>) -> Result<Self, MarketplaceError> {
        Self::open(store, &StoreConfig::default(), MarketplaceConfig::default())
    }

    /// Hydrate from `store` and resume any persisted session.
    pub fn open(
        store: Arc<S>,
        store_config: &StoreConfig,
        config: MarketplaceConfig,
    ) -> Result<Self, MarketplaceError> {
        let repository = EntityRepository::hydrate(store, &store_config.key_prefix);
        let mut marketplace = Self { repository, config };
        marketplace.resume_session()?;
        info!(
            services = marketplace.repository.services().len(),
            favorites = marketplace.repository.favorites().len(),
            pending_verifications = marketplace.repository.pending_verifications().len(),
            session = ?marketplace.current_user().map(|user| &user.name),
            "marketplace state hydrated"
        );
        Ok(marketplace)
    }

    pub fn config(&self) -> MarketplaceConfig {
        self.config
    }

    pub fn repository(&self) -> &EntityRepository<S> {
        &self.repository
    }

    fn resume_session(&mut self) -> Result<(), MarketplaceError> {
        let Some(user) = self.repository.current_user() else {
            return Ok(());
        };
        let (reconciled, ledger) = verification::reconcile(
            user,
            self.repository.pending_verifications(),
            self.repository.decisions(),
        );
        if &reconciled == user && ledger.is_none() {
            return Ok(());
        }

        debug!(
            user = %reconciled.name,
            status = reconciled.verification_status.label(),
            "session reconciled"
        );
        let mut changes = Changeset::new().user(Some(reconciled));
        if let Some(ledger) = ledger {
            changes = changes.decisions(ledger);
        }
        self.repository.commit(changes)?;
        Ok(())
    }

    // --- session ---------------------------------------------------------------------------

    pub fn current_user(&self) -> Option<&User> {
        self.repository.current_user()
    }

    /// Start a session for `user`, replacing any existing one.
    pub fn login(&mut self, mut user: User) -> Result<&User, MarketplaceError> {
        user.name = User::new(user.name.as_str(), user.user_type)?.name;
        let (user, ledger) = verification::reconcile(
            &user,
            self.repository.pending_verifications(),
            self.repository.decisions(),
        );

        info!(user = %user.name, role = user.user_type.label(), "session started");
        let mut changes = Changeset::new().user(Some(user));
        if let Some(ledger) = ledger {
            changes = changes.decisions(ledger);
        }
        self.repository.commit(changes)?;
        self.repository
            .current_user()
            .ok_or_else(|| AccessError::NoActiveSession.into())
    }

    /// Resolve the login form into a user and start their session.
    pub fn sign_in(&mut self, request: &LoginRequest) -> Result<&User, MarketplaceError> {
        let user = request.resolve()?;
        self.login(user)
    }

    pub fn demo_login(&mut self, account: DemoAccount) -> Result<&User, MarketplaceError> {
        self.login(account.user())
    }

    pub fn signup(&mut self, request: &SignupRequest) -> Result<&User, MarketplaceError> {
        let user = request.resolve()?;
        self.login(user)
    }

    /// End the session, deleting the persisted user. Returns who was logged out.
    pub fn logout(&mut self) -> Result<Option<User>, MarketplaceError> {
        let previous = self.repository.current_user().cloned();
        if previous.is_none() {
            return Ok(None);
        }
        self.repository.replace_user(None)?;
        if let Some(user) = &previous {
            info!(user = %user.name, "session ended");
        }
        Ok(previous)
    }

    // --- favorites -------------------------------------------------------------------------

    pub fn list_favorites(&self) -> &[Favorite] {
        self.repository.favorites()
    }

    pub fn is_favorite(&self, caterer_id: &str) -> bool {
        self.repository
            .favorites()
            .iter()
            .any(|favorite| favorite.id == caterer_id)
    }

    pub fn add_favorite(&mut self, caterer: Favorite) -> Result<FavoriteOutcome, MarketplaceError> {
        caterer.validate()?;
        if self.is_favorite(&caterer.id) {
            return Ok(FavoriteOutcome::AlreadyFavorited);
        }

        info!(caterer = %caterer.id, name = %caterer.name, "added to favorites");
        let mut favorites = self.repository.favorites().to_vec();
        favorites.push(caterer);
        self.repository.replace_favorites(favorites)?;
        Ok(FavoriteOutcome::Added)
    }

    /// Remove a favorite by caterer id. Absent ids are a no-op.
    pub fn remove_favorite(
        &mut self,
        caterer_id: &str,
    ) -> Result<Option<Favorite>, MarketplaceError> {
        let (removed, kept): (Vec<Favorite>, Vec<Favorite>) = self
            .repository
            .favorites()
            .iter()
            .cloned()
            .partition(|favorite| favorite.id == caterer_id);
        let Some(removed) = removed.into_iter().next() else {
            return Ok(None);
        };

        self.repository.replace_favorites(kept)?;
        info!(caterer = %removed.id, name = %removed.name, "removed from favorites");
        Ok(Some(removed))
    }

    // --- catalog ---------------------------------------------------------------------------

    pub fn list_services(&self) -> &[Service] {
        self.repository.services()
    }

    pub fn service(&self, id: &ServiceId) -> Option<&Service> {
        self.repository
            .services()
            .iter()
            .find(|service| &service.id == id)
    }

    pub fn list_services_by_provider(&self, provider_id: &str) -> Vec<&Service> {
        self.repository
            .services()
            .iter()
            .filter(|service| service.provider_id == provider_id)
            .collect()
    }

    /// The logged-in provider's own services; empty without a session.
    pub fn my_services(&self) -> Vec<&Service> {
        match self.current_user() {
            Some(user) => self.list_services_by_provider(&user.name),
            None => Vec::new(),
        }
    }

    pub fn search_services(&self, query: &str) -> Vec<&Service> {
        self.repository
            .services()
            .iter()
            .filter(|service| service.matches(query))
            .collect()
    }

    /// Publish a new service owned by the logged-in provider.
    pub fn add_service(&mut self, input: ServiceInput) -> Result<Service, MarketplaceError> {
        let owner = require_role(self.repository.current_user(), UserType::Provider)?;
        if self.config.require_verified_providers && !owner.verified {
            return Err(AccessError::VerificationRequired(owner.name.clone()).into());
        }
        let service = Service::create(input, owner)?;

        let mut services = self.repository.services().to_vec();
        services.push(service.clone());
        self.repository.replace_services(services)?;
        info!(
            service = %service.id,
            provider = %service.provider_id,
            verified = service.verified,
            "service added"
        );
        Ok(service)
    }

    /// Merge `patch` into the service with `id`. Unknown ids are a no-op returning `None`.
    pub fn update_service(
        &mut self,
        id: &ServiceId,
        patch: ServicePatch,
    ) -> Result<Option<Service>, MarketplaceError> {
        let mut services = self.repository.services().to_vec();
        let Some(service) = services.iter_mut().find(|service| &service.id == id) else {
            debug!(service = %id, "update for unknown service ignored");
            return Ok(None);
        };
        patch.validate()?;
        service.apply(patch);
        let updated = service.clone();

        self.repository.replace_services(services)?;
        info!(service = %id, "service updated");
        Ok(Some(updated))
    }

    /// Delete by id. Unknown ids are a no-op returning `None`.
    pub fn delete_service(&mut self, id: &ServiceId) -> Result<Option<Service>, MarketplaceError> {
        let (removed, kept): (Vec<Service>, Vec<Service>) = self
            .repository
            .services()
            .iter()
            .cloned()
            .partition(|service| &service.id == id);
        let Some(removed) = removed.into_iter().next() else {
            return Ok(None);
        };

        self.repository.replace_services(kept)?;
        info!(service = %id, name = %removed.name, "service deleted");
        Ok(Some(removed))
    }

    // --- verification ----------------------------------------------------------------------

    pub fn list_pending_verifications(&self) -> &[VerificationRequest] {
        self.repository.pending_verifications()
    }

    /// The admin queue split by the submitter's role.
    pub fn pending_verifications_by_type(&self, user_type: UserType) -> Vec<&VerificationRequest> {
        self.repository
            .pending_verifications()
            .iter()
            .filter(|request| request.user_type == user_type)
            .collect()
    }

    /// Queue the logged-in user's documents for admin review.
    pub fn submit_verification(
        &mut self,
        details: VerificationDetails,
    ) -> Result<VerificationRequest, MarketplaceError> {
        let user = self
            .repository
            .current_user()
            .ok_or(AccessError::NoActiveSession)?;
        let submission = verification::submit(
            user,
            self.repository.pending_verifications(),
            details,
            Utc::now(),
        )?;

        self.repository.commit(
            Changeset::new()
                .pending_verifications(submission.queue)
                .user(Some(submission.user)),
        )?;
        info!(
            user = %submission.request.user_id,
            role = submission.request.user_type.label(),
            "verification submitted"
        );
        Ok(submission.request)
    }

    pub fn approve_verification(&mut self, user_id: &str) -> Result<(), MarketplaceError> {
        self.resolve_verification(user_id, VerificationDecision::Approved)
    }

    pub fn reject_verification(
        &mut self,
        user_id: &str,
        reason: &str,
    ) -> Result<(), MarketplaceError> {
        let decision = verification::rejection(reason)?;
        self.resolve_verification(user_id, decision)
    }

    /// Drop the request and apply `decision` to the session user, or park it in the ledger
    /// until `user_id` next logs in.
    fn resolve_verification(
        &mut self,
        user_id: &str,
        decision: VerificationDecision,
    ) -> Result<(), MarketplaceError> {
        let queue = verification::resolve(self.repository.pending_verifications(), user_id)?;
        let mut changes = Changeset::new().pending_verifications(queue);

        match self.repository.current_user() {
            Some(user) if user.name == user_id => {
                changes = changes.user(Some(verification::decide(user, &decision)));
            }
            _ => {
                let mut ledger = self.repository.decisions().clone();
                ledger.insert(user_id.to_string(), decision.clone());
                changes = changes.decisions(ledger);
            }
        }

        self.repository.commit(changes)?;
        match &decision {
            VerificationDecision::Approved => info!(user = %user_id, "verification approved"),
            VerificationDecision::Rejected { reason } => {
                info!(user = %user_id, %reason, "verification rejected")
            }
        }
        Ok(())
    }
}
