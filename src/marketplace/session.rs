//! Mock sign-in and sign-up. No credentials are checked against a backend; a request only has
//! to be complete to produce a [`User`].

use serde::{Deserialize, Serialize};

use super::domain::{require, User, UserType, ValidationError};

const ADMIN_EMAIL: &str = "admin@icateryou.com";
const ADMIN_PASSWORD: &str = "admin123";
const MIN_PASSWORD_LEN: usize = 6;

/// Access rule violations for the active session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("no user is logged in")]
    NoActiveSession,
    #[error("{required} account required, logged in as {actual}")]
    RoleRequired { required: UserType, actual: UserType },
    #[error("'{0}' must complete verification first")]
    VerificationRequired(String),
}

/// The active user, if they hold `role`.
pub fn require_role(user: Option<&User>, role: UserType) -> Result<&User, AccessError> {
    let user = user.ok_or(AccessError::NoActiveSession)?;
    if user.user_type != role {
        return Err(AccessError::RoleRequired {
            required: role,
            actual: user.user_type,
        });
    }
    Ok(user)
}

/// Login form. `role` is the tab the user picked; the admin account ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: UserType,
}

impl LoginRequest {
    pub fn resolve(&self) -> Result<User, ValidationError> {
        require("email", &self.email)?;
        require("password", &self.password)?;

        let email = self.email.trim();
        if email.eq_ignore_ascii_case(ADMIN_EMAIL) && self.password == ADMIN_PASSWORD {
            return Ok(User::admin());
        }
        if self.role == UserType::Admin {
            return Err(ValidationError::UnsupportedRole(UserType::Admin));
        }

        let local = email.split('@').next().unwrap_or(email);
        User::new(capitalize(local), self.role)
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One-click accounts offered on the login page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemoAccount {
    Client,
    Provider,
}

impl DemoAccount {
    pub fn user(self) -> User {
        let (name, user_type) = match self {
            DemoAccount::Client => ("Demo Client", UserType::Client),
            DemoAccount::Provider => ("Demo Provider", UserType::Provider),
        };
        User {
            name: name.to_string(),
            user_type,
            verified: false,
            verification_status: Default::default(),
            rejection_reason: None,
        }
    }
}

/// Sign-up form, one variant per tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignupRequest {
    #[serde(rename_all = "camelCase")]
    Client {
        first_name: String,
        last_name: String,
        email: String,
        #[serde(default)]
        phone: String,
        password: String,
        confirm_password: String,
        agree_to_terms: bool,
    },
    #[serde(rename_all = "camelCase")]
    Provider {
        business_name: String,
        owner_name: String,
        email: String,
        #[serde(default)]
        phone: String,
        #[serde(default)]
        location: String,
        #[serde(default)]
        description: String,
        password: String,
        confirm_password: String,
        agree_to_terms: bool,
    },
}

impl SignupRequest {
    pub fn resolve(&self) -> Result<User, ValidationError> {
        match self {
            SignupRequest::Client {
                first_name,
                last_name,
                email,
                password,
                confirm_password,
                agree_to_terms,
                ..
            } => {
                accept_terms(*agree_to_terms)?;
                require("firstName", first_name)?;
                require("lastName", last_name)?;
                require("email", email)?;
                check_password(password, confirm_password)?;
                User::new(
                    format!("{} {}", first_name.trim(), last_name.trim()),
                    UserType::Client,
                )
            }
            SignupRequest::Provider {
                business_name,
                owner_name,
                email,
                password,
                confirm_password,
                agree_to_terms,
                ..
            } => {
                accept_terms(*agree_to_terms)?;
                require("businessName", business_name)?;
                require("ownerName", owner_name)?;
                require("email", email)?;
                check_password(password, confirm_password)?;
                User::new(business_name.trim(), UserType::Provider)
            }
        }
    }
}

fn accept_terms(agreed: bool) -> Result<(), ValidationError> {
    if agreed {
        Ok(())
    } else {
        Err(ValidationError::TermsNotAccepted)
    }
}

fn check_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    require("password", password)?;
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}
