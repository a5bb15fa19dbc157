use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Marketplace role attached to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Client,
    Provider,
    Admin,
}

impl UserType {
    pub const fn label(self) -> &'static str {
        match self {
            UserType::Client => "client",
            UserType::Provider => "provider",
            UserType::Admin => "admin",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a user sits in the identity verification pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    None,
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::None => "none",
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

/// The single logged-in user persisted under the `user` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl User {
    /// Build an unverified user, rejecting blank names.
    pub fn new(name: impl Into<String>, user_type: UserType) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        Ok(Self {
            name,
            user_type,
            verified: false,
            verification_status: VerificationStatus::None,
            rejection_reason: None,
        })
    }

    /// The built-in administrator, verified from the start.
    pub fn admin() -> Self {
        Self {
            name: "Admin".to_string(),
            user_type: UserType::Admin,
            verified: true,
            verification_status: VerificationStatus::Approved,
            rejection_reason: None,
        }
    }

    /// Bring `verified`, `verificationStatus` and `rejectionReason` back into agreement.
    ///
    /// Older sessions stored only the `verified` flag; a verified user without a status is
    /// treated as approved.
    pub fn normalized(mut self) -> Self {
        match (self.verified, self.verification_status) {
            (true, VerificationStatus::None) | (_, VerificationStatus::Approved) => {
                self.verified = true;
                self.verification_status = VerificationStatus::Approved;
            }
            (_, VerificationStatus::Pending | VerificationStatus::Rejected) => {
                self.verified = false;
            }
            (false, VerificationStatus::None) => {}
        }
        if self.verification_status != VerificationStatus::Rejected {
            self.rejection_reason = None;
        }
        self
    }
}

/// Identifier wrapper for catalog services.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub String);

impl ServiceId {
    pub fn generate() -> Self {
        Self(format!("svc-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Active,
    Draft,
    Inactive,
}

/// A catering package offered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub description: String,
    /// Display price such as `₱300-500`.
    pub price: String,
    pub category: String,
    pub capacity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub provider: String,
    pub provider_id: String,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub bookings: u32,
    #[serde(default)]
    pub rating: f64,
    /// Provider verification at creation time. Not updated afterwards.
    #[serde(default)]
    pub verified: bool,
}

impl Service {
    /// Mint a new catalog entry owned by `owner`.
    pub fn create(input: ServiceInput, owner: &User) -> Result<Self, ValidationError> {
        input.validate()?;
        Ok(Self {
            id: ServiceId::generate(),
            name: input.name.trim().to_string(),
            description: input.description.trim().to_string(),
            price: input.price.trim().to_string(),
            category: input.category.trim().to_string(),
            capacity: input.capacity.trim().to_string(),
            image: input.image.filter(|image| !image.trim().is_empty()),
            provider: owner.name.clone(),
            provider_id: owner.name.clone(),
            status: ServiceStatus::Active,
            bookings: 0,
            rating: 0.0,
            verified: owner.verified,
        })
    }

    /// Merge editable fields. Identity, ownership and counters are never touched.
    pub fn apply(&mut self, patch: ServicePatch) {
        let ServicePatch {
            name,
            description,
            price,
            category,
            capacity,
            image,
            status,
        } = patch;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(price) = price {
            self.price = price;
        }
        if let Some(category) = category {
            self.category = category;
        }
        if let Some(capacity) = capacity {
            self.capacity = capacity;
        }
        if let Some(image) = image {
            self.image = Some(image).filter(|image| !image.trim().is_empty());
        }
        if let Some(status) = status {
            self.status = status;
        }
    }

    /// Case-insensitive match on name or description, as the services browser filters.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
    }

    /// Caterer card shown in the services browser, suitable for favoriting.
    pub fn caterer_snapshot(&self) -> Favorite {
        let mut details = Map::new();
        details.insert("rating".to_string(), Value::from(self.rating));
        details.insert("reviews".to_string(), Value::from(self.bookings));
        details.insert(
            "description".to_string(),
            Value::from(self.description.clone()),
        );
        details.insert(
            "categories".to_string(),
            Value::from(vec![self.category.clone()]),
        );
        details.insert("capacity".to_string(), Value::from(self.capacity.clone()));
        details.insert("price".to_string(), Value::from(self.price.clone()));
        details.insert("verified".to_string(), Value::from(self.verified));
        details.insert("provider".to_string(), Value::from(self.provider.clone()));
        if let Some(image) = &self.image {
            details.insert("image".to_string(), Value::from(image.clone()));
        }

        Favorite {
            id: self.id.0.clone(),
            name: self.name.clone(),
            details,
        }
    }
}

/// Provider form payload for a new service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInput {
    pub name: String,
    pub description: String,
    pub price: String,
    pub category: String,
    pub capacity: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl ServiceInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("description", &self.description)?;
        require("price", &self.price)?;
        require("category", &self.category)?;
        require("capacity", &self.capacity)
    }
}

/// Partial update for an existing service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub capacity: Option<String>,
    pub image: Option<String>,
    pub status: Option<ServiceStatus>,
}

impl ServicePatch {
    /// Required catalog fields may be replaced but never blanked.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("name", &self.name),
            ("description", &self.description),
            ("price", &self.price),
            ("category", &self.category),
            ("capacity", &self.capacity),
        ];
        for (field, value) in required {
            if let Some(value) = value {
                require(field, value)?;
            }
        }
        Ok(())
    }
}

/// Client bookmark: a snapshot of the caterer card taken when it was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: String,
    pub name: String,
    /// Remaining display fields (rating, image, price range, ...) kept verbatim.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Favorite {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            details: Map::new(),
        }
    }

    const FIELDS: [&'static str; 2] = ["id", "name"];

    /// Add a display field. `id` and `name` belong to the favorite itself and are refused by
    /// [`Favorite::validate`].
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require("id", &self.id)?;
        require("name", &self.name)?;
        reject_reserved(&self.details, &Self::FIELDS)
    }
}

/// Government ID accepted during verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdType {
    DriversLicense,
    Passport,
    NationalId,
    StateId,
}

impl IdType {
    pub const fn label(self) -> &'static str {
        match self {
            IdType::DriversLicense => "driver's license",
            IdType::Passport => "passport",
            IdType::NationalId => "national ID",
            IdType::StateId => "state ID",
        }
    }

    /// Inclusive length bounds for the alphanumeric ID number.
    pub const fn number_length(self) -> (usize, usize) {
        match self {
            IdType::DriversLicense | IdType::StateId => (8, 15),
            IdType::Passport => (6, 9),
            IdType::NationalId => (8, 20),
        }
    }

    pub fn validate_number(self, number: &str) -> Result<(), ValidationError> {
        let (min, max) = self.number_length();
        let number = number.trim();
        let well_formed = number.chars().all(|c| c.is_ascii_alphanumeric())
            && (min..=max).contains(&number.len());
        if well_formed {
            Ok(())
        } else {
            Err(ValidationError::InvalidIdNumber {
                id_type: self,
                min,
                max,
            })
        }
    }
}

/// Which verification documents were attached. File contents never enter the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentUploads {
    pub business_license: bool,
    pub insurance: bool,
    pub tax_cert: bool,
    pub identification: bool,
    pub id_front: bool,
    pub id_back: bool,
    pub selfie: bool,
}

/// Verification form as submitted by a client or provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDetails {
    pub business_name: String,
    #[serde(default)]
    pub business_type: String,
    pub business_address: String,
    pub contact_phone: String,
    #[serde(default)]
    pub tax_id: String,
    #[serde(default)]
    pub description: String,
    pub id_type: IdType,
    pub id_number: String,
    #[serde(default)]
    pub documents: DocumentUploads,
    /// Any additional form fields, carried through to the admin queue untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VerificationDetails {
    const MIN_PHONE_LEN: usize = 10;
    const FIELDS: [&'static str; 9] = [
        "businessName",
        "businessType",
        "businessAddress",
        "contactPhone",
        "taxId",
        "description",
        "idType",
        "idNumber",
        "documents",
    ];

    pub fn validate(&self, user_type: UserType) -> Result<(), ValidationError> {
        require("businessName", &self.business_name)?;
        require("businessAddress", &self.business_address)?;
        require("contactPhone", &self.contact_phone)?;
        if self.contact_phone.trim().len() < Self::MIN_PHONE_LEN {
            return Err(ValidationError::PhoneTooShort {
                min: Self::MIN_PHONE_LEN,
            });
        }
        require("idNumber", &self.id_number)?;
        self.id_type.validate_number(&self.id_number)?;

        let DocumentUploads {
            id_front,
            id_back,
            selfie,
            business_license,
            ..
        } = self.documents;
        if !(id_front && id_back && selfie) {
            return Err(ValidationError::IdentityDocumentsRequired);
        }
        if user_type == UserType::Provider && !business_license {
            return Err(ValidationError::BusinessLicenseRequired);
        }

        // Extra keys are flattened next to the typed ones when the request is queued.
        reject_reserved(&self.extra, &Self::FIELDS)?;
        reject_reserved(&self.extra, &VerificationRequest::FIELDS)
    }
}

/// Lifecycle marker stored on queued requests. Resolved requests are deleted, not re-marked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
}

/// Entry in the admin verification queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub user_id: String,
    pub user_type: UserType,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(flatten)]
    pub details: VerificationDetails,
}

impl VerificationRequest {
    const FIELDS: [&'static str; 4] = ["userId", "userType", "submittedAt", "status"];
}

/// Admin ruling on a verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum VerificationDecision {
    Approved,
    Rejected { reason: String },
}

/// Field-level validation failure surfaced to the caller for user-visible messaging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("a rejection reason is required")]
    MissingReason,
    #[error("contact phone must have at least {min} characters")]
    PhoneTooShort { min: usize },
    #[error("{} number must be {min}-{max} alphanumeric characters", .id_type.label())]
    InvalidIdNumber { id_type: IdType, min: usize, max: usize },
    #[error("ID photos (front and back) and a selfie must be uploaded")]
    IdentityDocumentsRequired,
    #[error("providers must upload a business license")]
    BusinessLicenseRequired,
    #[error("'{0}' is a reserved field name")]
    ReservedField(String),
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("terms of service and privacy policy must be accepted")]
    TermsNotAccepted,
    #[error("{0} accounts cannot sign in through this form")]
    UnsupportedRole(UserType),
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

fn reject_reserved(fields: &Map<String, Value>, reserved: &[&str]) -> Result<(), ValidationError> {
    let clash = fields
        .keys()
        .find(|key| reserved.iter().any(|name| *name == key.as_str()));
    match clash {
        Some(key) => Err(ValidationError::ReservedField(key.clone())),
        None => Ok(()),
    }
}
