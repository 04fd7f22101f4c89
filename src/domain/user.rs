use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DietaryRestriction, ValidationError};

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid");
}

pub const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Organizer,
}

impl UserRole {
    pub fn can_post_events(self) -> bool {
        matches!(self, Self::Organizer)
    }
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
    pub food_restrictions: Vec<DietaryRestriction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored form of an account, including the bcrypt hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
}

/// Organizer details embedded into event responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizerSummary {
    pub full_name: String,
    pub email: String,
}

impl From<&User> for OrganizerSummary {
    fn from(user: &User) -> Self {
        Self {
            full_name: user.full_name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUp {
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub confirm: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub food_restrictions: Vec<DietaryRestriction>,
}

impl SignUp {
    /// Checks the form and returns the normalized email.
    pub fn validate(&self) -> Result<String, ValidationError> {
        validate_full_name(&self.full_name)?;
        let email = normalize_email(&self.email)?;

        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::new(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if let Some(confirm) = self.confirm.as_deref()
            && confirm != self.password
        {
            return Err(ValidationError::new("passwords do not match"));
        }

        Ok(email)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub food_restrictions: Option<Vec<DietaryRestriction>>,
}

impl ProfilePatch {
    pub fn has_changes(&self) -> bool {
        self.full_name.is_some() || self.role.is_some() || self.food_restrictions.is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.has_changes() {
            return Err(ValidationError::new(
                "at least one field must be provided for profile update",
            ));
        }
        if let Some(full_name) = self.full_name.as_deref() {
            validate_full_name(full_name)?;
        }
        Ok(())
    }

    pub fn apply(self, user: &mut User, now: DateTime<Utc>) {
        if let Some(full_name) = self.full_name {
            user.full_name = full_name.trim().to_string();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(restrictions) = self.food_restrictions {
            user.food_restrictions = dedup_restrictions(restrictions);
        }
        user.updated_at = now;
    }
}

pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(ValidationError::new("email must be a valid address"));
    }
    Ok(email)
}

pub fn dedup_restrictions(restrictions: Vec<DietaryRestriction>) -> Vec<DietaryRestriction> {
    let mut unique = Vec::with_capacity(restrictions.len());
    for restriction in restrictions {
        if !unique.contains(&restriction) {
            unique.push(restriction);
        }
    }
    unique
}

fn validate_full_name(full_name: &str) -> Result<(), ValidationError> {
    if full_name.trim().is_empty() {
        return Err(ValidationError::new("full_name must not be blank"));
    }
    if full_name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(format!(
            "full_name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}
