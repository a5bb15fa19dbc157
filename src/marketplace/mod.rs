//! Marketplace state: the persisted entity collections, the verification workflow that gates
//! provider and client privileges, and the façade the storefront pages call.

pub mod domain;
pub mod facade;
pub mod repository;
pub mod session;
pub mod verification;

#[cfg(test)]
mod tests;

pub use domain::{
    DocumentUploads, Favorite, IdType, RequestStatus, Service, ServiceId, ServiceInput,
    ServicePatch, ServiceStatus, User, UserType, ValidationError, VerificationDecision,
    VerificationDetails, VerificationRequest, VerificationStatus,
};
pub use facade::{FavoriteOutcome, Marketplace};
pub use repository::{Changeset, DecisionLedger, EntityRepository, RepositoryError};
pub use session::{AccessError, DemoAccount, LoginRequest, SignupRequest};
pub use verification::VerificationError;
