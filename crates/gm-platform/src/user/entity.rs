//! User Entity
//!
//! An account that can sign in. Users are soft-deleted: the row stays with
//! `is_deleted` set and is hidden from listings.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::shared::repository::{Entity, SqliteQuery};
use crate::shared::validation::normalize;
use crate::TsidGenerator;

const INDEFINITE_LOCK_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub user_name: String,
    pub normalized_user_name: String,
    pub email: String,
    pub normalized_email: String,
    pub email_confirmed: bool,
    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Rotated whenever credentials change; binds password reset tokens
    #[serde(skip_serializing)]
    pub security_stamp: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_picture_url: Option<String>,
    pub is_active: bool,
    pub lockout_enabled: bool,
    pub lockout_end: Option<DateTime<Utc>>,
    pub lock_reason: Option<String>,
    pub access_failed_count: i32,
    pub last_login_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(user_name: impl Into<String>, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let user_name = user_name.into().trim().to_string();
        let email = email.into().trim().to_string();
        Self {
            id: TsidGenerator::generate(),
            normalized_user_name: normalize(&user_name),
            normalized_email: normalize(&email),
            user_name,
            email,
            email_confirmed: false,
            password_hash: password_hash.into(),
            security_stamp: new_security_stamp(),
            first_name: None,
            last_name: None,
            phone_number: None,
            profile_picture_url: None,
            is_active: true,
            lockout_enabled: true,
            lockout_end: None,
            lock_reason: None,
            access_failed_count: 0,
            last_login_date: None,
            created_at: Utc::now(),
            updated_at: None,
            is_deleted: false,
            deleted_at: None,
        }
    }

    pub fn with_names(mut self, first_name: Option<String>, last_name: Option<String>) -> Self {
        self.first_name = first_name;
        self.last_name = last_name;
        self
    }

    pub fn set_user_name(&mut self, user_name: &str) {
        self.user_name = user_name.trim().to_string();
        self.normalized_user_name = normalize(user_name);
    }

    pub fn set_email(&mut self, email: &str) {
        let email = email.trim();
        if !self.email.eq_ignore_ascii_case(email) {
            self.email_confirmed = false;
        }
        self.email = email.to_string();
        self.normalized_email = normalize(email);
    }

    pub fn full_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(f), Some(l)) => format!("{} {}", f, l),
            (Some(f), None) => f.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => self.user_name.clone(),
        }
    }

    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_enabled && self.lockout_end.is_some_and(|end| end > now)
    }

    /// Lock until `until`, or for a hundred years when `None`.
    pub fn lock(&mut self, reason: impl Into<String>, until: Option<DateTime<Utc>>) {
        self.lockout_end = Some(until.unwrap_or_else(|| Utc::now() + Duration::days(INDEFINITE_LOCK_DAYS)));
        self.lock_reason = Some(reason.into());
        self.touch();
    }

    pub fn unlock(&mut self) {
        self.lockout_end = None;
        self.lock_reason = None;
        self.access_failed_count = 0;
        self.touch();
    }

    /// Count a failed sign-in. Returns true when this failure locked the account.
    pub fn record_failed_access(&mut self, max_attempts: i32, lockout: Duration) -> bool {
        self.access_failed_count += 1;
        self.touch();
        if self.lockout_enabled && max_attempts > 0 && self.access_failed_count >= max_attempts {
            self.lockout_end = Some(Utc::now() + lockout);
            self.lock_reason = Some("Too many failed sign-in attempts".to_string());
            self.access_failed_count = 0;
            return true;
        }
        false
    }

    pub fn mark_login(&mut self) {
        let now = Utc::now();
        self.access_failed_count = 0;
        self.last_login_date = Some(now);
        if self.lockout_end.is_some_and(|end| end <= now) {
            self.lockout_end = None;
            self.lock_reason = None;
        }
        self.updated_at = Some(now);
    }

    pub fn set_password_hash(&mut self, hash: String) {
        self.password_hash = hash;
        self.rotate_security_stamp();
        self.touch();
    }

    pub fn rotate_security_stamp(&mut self) {
        self.security_stamp = new_security_stamp();
    }

    /// Flag deleted and deactivate.
    pub fn soft_delete(&mut self) {
        let now = Utc::now();
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.is_active = false;
        self.updated_at = Some(now);
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

fn new_security_stamp() -> String {
    uuid::Uuid::new_v4().simple().to_string().to_uppercase()
}

impl Entity for User {
    const TABLE: &'static str = "identity_users";
    const NAME: &'static str = "User";
    const COLUMNS: &'static [&'static str] = &[
        "user_name",
        "normalized_user_name",
        "email",
        "normalized_email",
        "email_confirmed",
        "password_hash",
        "security_stamp",
        "first_name",
        "last_name",
        "phone_number",
        "profile_picture_url",
        "is_active",
        "lockout_enabled",
        "lockout_end",
        "lock_reason",
        "access_failed_count",
        "last_login_date",
        "created_at",
        "updated_at",
        "is_deleted",
        "deleted_at",
    ];
    const SOFT_DELETE: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(&self.user_name)
            .bind(&self.normalized_user_name)
            .bind(&self.email)
            .bind(&self.normalized_email)
            .bind(self.email_confirmed)
            .bind(&self.password_hash)
            .bind(&self.security_stamp)
            .bind(&self.first_name)
            .bind(&self.last_name)
            .bind(&self.phone_number)
            .bind(&self.profile_picture_url)
            .bind(self.is_active)
            .bind(self.lockout_enabled)
            .bind(self.lockout_end)
            .bind(&self.lock_reason)
            .bind(self.access_failed_count)
            .bind(self.last_login_date)
            .bind(self.created_at)
            .bind(self.updated_at)
            .bind(self.is_deleted)
            .bind(self.deleted_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(" jdoe ", "John.Doe@Plant.example", "hash")
    }

    #[test]
    fn test_new_user_normalizes() {
        let u = user();
        assert_eq!(u.user_name, "jdoe");
        assert_eq!(u.normalized_user_name, "JDOE");
        assert_eq!(u.normalized_email, "JOHN.DOE@PLANT.EXAMPLE");
        assert_eq!(u.id.len(), 13);
        assert!(u.is_active);
        assert!(!u.is_deleted);
    }

    #[test]
    fn test_lockout_after_max_attempts() {
        let mut u = user();
        assert!(!u.record_failed_access(3, Duration::minutes(15)));
        assert!(!u.record_failed_access(3, Duration::minutes(15)));
        assert!(u.record_failed_access(3, Duration::minutes(15)));
        assert!(u.is_locked_out(Utc::now()));
        assert_eq!(u.access_failed_count, 0);

        u.unlock();
        assert!(!u.is_locked_out(Utc::now()));
    }

    #[test]
    fn test_indefinite_lock() {
        let mut u = user();
        u.lock("Left the company", None);
        assert!(u.is_locked_out(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_lockout_disabled() {
        let mut u = user();
        u.lockout_enabled = false;
        assert!(!u.record_failed_access(1, Duration::minutes(15)));
        assert!(!u.is_locked_out(Utc::now()));
    }

    #[test]
    fn test_password_change_rotates_stamp() {
        let mut u = user();
        let stamp = u.security_stamp.clone();
        u.set_password_hash("other".into());
        assert_ne!(u.security_stamp, stamp);
    }

    #[test]
    fn test_full_name() {
        let u = user().with_names(Some("John".into()), Some("Doe".into()));
        assert_eq!(u.full_name(), "John Doe");
        assert_eq!(user().full_name(), "jdoe");
    }
}
