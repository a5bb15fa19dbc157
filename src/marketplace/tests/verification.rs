use super::common::*;
use crate::error::{ErrorKind, MarketplaceError};
use crate::marketplace::domain::{
    IdType, User, UserType, ValidationError, VerificationDecision, VerificationStatus,
};
use crate::marketplace::verification::{self, VerificationError};
use crate::marketplace::Marketplace;
use chrono::Utc;
use std::sync::Arc;

#[test]
fn submission_queues_request_and_marks_user_pending() {
    let (mut marketplace, _store) = memory_marketplace();
    marketplace.login(provider("Flavors")).expect("login");

    let request = marketplace
        .submit_verification(details())
        .expect("submission accepted");

    assert_eq!(request.user_id, "Flavors");
    assert_eq!(request.user_type, UserType::Provider);
    let queue = marketplace.list_pending_verifications();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].user_id, "Flavors");

    let user = marketplace.current_user().expect("session");
    assert_eq!(user.verification_status, VerificationStatus::Pending);
    assert!(!user.verified);
}

#[test]
fn second_submission_before_resolution_is_a_conflict() {
    let (mut marketplace, store) = memory_marketplace();
    marketplace.login(provider("Flavors")).expect("login");
    marketplace.submit_verification(details()).expect("first");
    let before = snapshot(&store);

    let mut resubmitted = details();
    resubmitted.business_name = "Flavors Reloaded".to_string();
    let err = marketplace
        .submit_verification(resubmitted)
        .expect_err("duplicate must fail");

    assert!(matches!(
        err,
        MarketplaceError::Verification(VerificationError::AlreadyPending(ref user))
            if user == "Flavors"
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(marketplace.list_pending_verifications().len(), 1);
    assert_eq!(
        marketplace.list_pending_verifications()[0].details.business_name,
        "Iloilo Flavors"
    );
    assert_eq!(snapshot(&store), before);
}

#[test]
fn approval_of_active_session_verifies_user_and_empties_queue() {
    let (mut marketplace, _store) = memory_marketplace();
    marketplace.login(provider("Flavors")).expect("login");
    marketplace.submit_verification(details()).expect("submit");

    marketplace
        .approve_verification("Flavors")
        .expect("approval succeeds");

    assert!(marketplace.list_pending_verifications().is_empty());
    let user = marketplace.current_user().expect("session");
    assert!(user.verified);
    assert_eq!(user.verification_status, VerificationStatus::Approved);
    assert!(marketplace.repository().decisions().is_empty());
}

#[test]
fn approved_user_cannot_resubmit() {
    let (mut marketplace, _store) = memory_marketplace();
    marketplace.login(provider("Flavors")).expect("login");
    marketplace.submit_verification(details()).expect("submit");
    marketplace.approve_verification("Flavors").expect("approve");

    let err = marketplace
        .submit_verification(details())
        .expect_err("approved is terminal");
    assert!(matches!(
        err,
        MarketplaceError::Verification(VerificationError::AlreadyVerified(_))
    ));
}

#[test]
fn rejection_requires_a_reason_and_leaves_queue_untouched() {
    let (mut marketplace, store) = memory_marketplace();
    marketplace.login(client("Bob")).expect("login");
    marketplace.submit_verification(details()).expect("submit");
    let before = snapshot(&store);

    for reason in ["", "   \t"] {
        let err = marketplace
            .reject_verification("Bob", reason)
            .expect_err("blank reason");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(matches!(
            err,
            MarketplaceError::Verification(VerificationError::Invalid(
                ValidationError::MissingReason
            ))
        ));
    }

    assert_eq!(marketplace.list_pending_verifications().len(), 1);
    assert_eq!(snapshot(&store), before);
}

#[test]
fn rejected_user_can_resubmit() {
    let (mut marketplace, _store) = memory_marketplace();
    marketplace.login(client("Bob")).expect("login");
    marketplace.submit_verification(details()).expect("submit");

    marketplace
        .reject_verification("Bob", "blurry ID")
        .expect("reject");
    {
        let user = marketplace.current_user().expect("session");
        assert_eq!(user.verification_status, VerificationStatus::Rejected);
        assert_eq!(user.rejection_reason.as_deref(), Some("blurry ID"));
        assert!(!user.verified);
    }

    let mut sharper = details();
    sharper.id_type = IdType::Passport;
    sharper.id_number = "P1234567".to_string();
    marketplace
        .submit_verification(sharper)
        .expect("resubmission accepted");

    let user = marketplace.current_user().expect("session");
    assert_eq!(user.verification_status, VerificationStatus::Pending);
    assert_eq!(user.rejection_reason, None);
    assert_eq!(marketplace.list_pending_verifications().len(), 1);
}

#[test]
fn resolving_unknown_request_reports_not_found() {
    let (mut marketplace, store) = memory_marketplace();
    marketplace.login(User::admin()).expect("admin");
    let before = snapshot(&store);

    let approve = marketplace
        .approve_verification("Ghost")
        .expect_err("nothing queued");
    assert_eq!(approve.kind(), ErrorKind::NotFound);

    let reject = marketplace
        .reject_verification("Ghost", "no documents")
        .expect_err("nothing queued");
    assert_eq!(reject.kind(), ErrorKind::NotFound);

    assert_eq!(snapshot(&store), before);
}

#[test]
fn decision_for_absent_user_waits_for_their_next_login() {
    let (mut marketplace, _store) = memory_marketplace();
    marketplace.login(provider("Flavors")).expect("provider login");
    marketplace.submit_verification(details()).expect("submit");
    marketplace.logout().expect("logout");

    marketplace.login(User::admin()).expect("admin login");
    marketplace.approve_verification("Flavors").expect("approve");
    assert!(marketplace.list_pending_verifications().is_empty());
    assert!(marketplace.repository().decisions().contains_key("Flavors"));
    assert!(marketplace.current_user().expect("admin").verified);
    marketplace.logout().expect("logout");

    let user = marketplace
        .login(provider("Flavors"))
        .expect("provider returns")
        .clone();
    assert!(user.verified);
    assert_eq!(user.verification_status, VerificationStatus::Approved);
    assert!(marketplace.repository().decisions().is_empty());
}

#[test]
fn login_restores_pending_status_from_queue() {
    let (mut marketplace, _store) = memory_marketplace();
    marketplace.login(client("Bob")).expect("login");
    marketplace.submit_verification(details()).expect("submit");
    marketplace.logout().expect("logout");

    let user = marketplace.login(client("Bob")).expect("login again");
    assert_eq!(user.verification_status, VerificationStatus::Pending);
}

#[test]
fn submission_requires_session_and_valid_details() {
    let (mut marketplace, _store) = memory_marketplace();
    let err = marketplace
        .submit_verification(details())
        .expect_err("anonymous");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    marketplace.login(provider("Flavors")).expect("login");
    let mut unlicensed = details();
    unlicensed.documents.business_license = false;
    let err = marketplace
        .submit_verification(unlicensed)
        .expect_err("providers need a license");
    assert!(matches!(
        err,
        MarketplaceError::Verification(VerificationError::Invalid(
            ValidationError::BusinessLicenseRequired
        ))
    ));

    let mut short_passport = details();
    short_passport.id_type = IdType::Passport;
    short_passport.id_number = "P12".to_string();
    let err = marketplace
        .submit_verification(short_passport)
        .expect_err("passport too short");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        err.to_string(),
        "passport number must be 6-9 alphanumeric characters"
    );
    assert!(marketplace.list_pending_verifications().is_empty());
}

#[test]
fn submission_requires_id_photos_and_selfie() {
    let (mut marketplace, store) = memory_marketplace();
    marketplace.login(client("Bob")).expect("login");
    let before = snapshot(&store);

    let mut no_selfie = details();
    no_selfie.documents.selfie = false;
    let err = marketplace
        .submit_verification(no_selfie)
        .expect_err("selfie missing");
    assert!(matches!(
        err,
        MarketplaceError::Verification(VerificationError::Invalid(
            ValidationError::IdentityDocumentsRequired
        ))
    ));

    let mut no_back = details();
    no_back.documents.id_back = false;
    assert!(marketplace.submit_verification(no_back).is_err());

    assert_eq!(
        marketplace.current_user().map(|user| user.verification_status),
        Some(VerificationStatus::None)
    );
    assert_eq!(snapshot(&store), before);
}

#[test]
fn extra_fields_cannot_shadow_queued_request_fields() {
    let (mut marketplace, store) = memory_marketplace();
    marketplace.login(provider("Flavors")).expect("login");
    let before = snapshot(&store);

    for key in ["status", "userId", "submittedAt", "businessName", "documents"] {
        let mut clashing = details();
        clashing.extra.insert(key.to_string(), "urgent".into());
        let err = marketplace
            .submit_verification(clashing)
            .expect_err("reserved key");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), format!("'{key}' is a reserved field name"));
    }
    assert_eq!(snapshot(&store), before);
}

#[test]
fn clients_do_not_need_a_business_license() {
    let (mut marketplace, _store) = memory_marketplace();
    marketplace.login(client("Bob")).expect("login");
    let mut personal = details();
    personal.documents.business_license = false;
    marketplace
        .submit_verification(personal)
        .expect("client submission");
    assert_eq!(
        marketplace.pending_verifications_by_type(UserType::Client).len(),
        1
    );
    assert!(marketplace
        .pending_verifications_by_type(UserType::Provider)
        .is_empty());
}

#[test]
fn reconcile_resets_stale_pending_user() {
    let mut stale = provider("Flavors");
    stale.verification_status = VerificationStatus::Pending;
    let (user, ledger) = verification::reconcile(&stale, &[], &Default::default());
    assert_eq!(user.verification_status, VerificationStatus::None);
    assert!(ledger.is_none());
}

#[test]
fn resolve_drops_duplicate_entries_for_the_same_user() {
    let bob = client("Bob");
    let first = verification::submit(&bob, &[], details(), Utc::now()).expect("first");
    let mut queue = first.queue.clone();
    queue.push(first.request.clone());

    let remaining = verification::resolve(&queue, "Bob").expect("resolve");
    assert!(remaining.is_empty());
    assert_eq!(
        verification::decide(&bob, &VerificationDecision::Approved).verification_status,
        VerificationStatus::Approved
    );
}

#[test]
fn failed_write_rolls_back_queue() {
    let store = Arc::new(FlakyStore::default());
    let mut marketplace = Marketplace::new(store.clone()).expect("hydrate");
    marketplace.login(provider("Flavors")).expect("login");
    let before = snapshot(&store.inner);

    store.fail_writes_to(&key("user"));
    let err = marketplace
        .submit_verification(details())
        .expect_err("user write fails");
    assert_eq!(err.kind(), ErrorKind::Storage);

    assert!(marketplace.list_pending_verifications().is_empty());
    assert_eq!(
        marketplace.current_user().expect("session").verification_status,
        VerificationStatus::None
    );
    assert_eq!(snapshot(&store.inner), before);

    store.heal();
    marketplace
        .submit_verification(details())
        .expect("retry succeeds");
    assert_eq!(marketplace.list_pending_verifications().len(), 1);
}
