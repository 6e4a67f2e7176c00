//! The login record model.
//!
//! A [`Login`] is split into the caller-owned content ([`LoginFields`],
//! encrypted at rest) and store-managed metadata ([`LoginMeta`]). Callers
//! never set metadata; the store assigns it on every write.

use serde::{Deserialize, Serialize};

use crate::{Guid, TypesError};

/// Caller-supplied content of a login.
///
/// This is the part of a record that is encrypted at rest and compared
/// during reconciliation.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoginFields {
    /// Origin the credential belongs to, e.g. `https://example.com`.
    pub hostname: String,
    /// Username, may be empty.
    #[serde(default)]
    pub username: String,
    /// Password, must be non-empty.
    pub password: String,
    /// Form submission URL; mutually exclusive with `http_realm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_submit_url: Option<String>,
    /// HTTP authentication realm; mutually exclusive with `form_submit_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_realm: Option<String>,
    /// Name of the username input field in the login form.
    #[serde(default)]
    pub username_field: String,
    /// Name of the password input field in the login form.
    #[serde(default)]
    pub password_field: String,
}

impl LoginFields {
    /// Fields for a credential submitted through an HTML form.
    pub fn for_form(hostname: &str, form_submit_url: &str, username: &str, password: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            form_submit_url: Some(form_submit_url.to_string()),
            ..Self::default()
        }
    }

    /// Fields for a credential used with HTTP authentication.
    pub fn for_realm(hostname: &str, http_realm: &str, username: &str, password: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            http_realm: Some(http_realm.to_string()),
            ..Self::default()
        }
    }

    /// Whether either origin-context field carries a non-empty value.
    pub fn has_origin_context(&self) -> bool {
        self.form_submit_url.as_deref().is_some_and(|s| !s.is_empty())
            || self.http_realm.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Serialize to MessagePack bytes (the plaintext of an encrypted record).
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypesError> {
        rmp_serde::to_vec(self).map_err(TypesError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        rmp_serde::from_slice(bytes).map_err(TypesError::Deserialization)
    }
}

// Don't leak the password in debug output
impl std::fmt::Debug for LoginFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginFields")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("form_submit_url", &self.form_submit_url)
            .field("http_realm", &self.http_realm)
            .field("username_field", &self.username_field)
            .field("password_field", &self.password_field)
            .finish()
    }
}

/// Store-managed metadata of a login. All times are Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoginMeta {
    /// When the record was first stored.
    #[serde(default)]
    pub time_created: i64,
    /// When the record was last used (touched).
    #[serde(default)]
    pub time_last_used: i64,
    /// Last modification; strictly increasing per record.
    #[serde(default)]
    pub time_last_modified: i64,
    /// When the password last changed.
    #[serde(default)]
    pub time_password_changed: i64,
    /// How many times the record was used.
    #[serde(default)]
    pub times_used: i64,
}

/// A stored credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    /// Record identifier. Empty on input means "assign one".
    #[serde(default)]
    pub guid: Guid,
    /// Caller-owned content.
    #[serde(flatten)]
    pub fields: LoginFields,
    /// Store-owned metadata.
    #[serde(flatten)]
    pub meta: LoginMeta,
}

impl Login {
    /// A new record with no guid and zeroed metadata.
    pub fn new(fields: LoginFields) -> Self {
        Self {
            guid: Guid::empty(),
            fields,
            meta: LoginMeta::default(),
        }
    }

    /// A new record with a caller-chosen guid.
    pub fn with_guid(guid: impl Into<Guid>, fields: LoginFields) -> Self {
        Self {
            guid: guid.into(),
            fields,
            meta: LoginMeta::default(),
        }
    }

    /// Last modification time in Unix milliseconds.
    pub fn modified(&self) -> i64 {
        self.meta.time_last_modified
    }
}

/// A partial update to a login's content.
///
/// `None` leaves a field unchanged. The origin-context fields are doubly
/// optional: `Some(None)` clears the field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginChanges {
    /// New hostname.
    pub hostname: Option<String>,
    /// New username.
    pub username: Option<String>,
    /// New password.
    pub password: Option<String>,
    /// New (or cleared) form submission URL.
    pub form_submit_url: Option<Option<String>>,
    /// New (or cleared) HTTP realm.
    pub http_realm: Option<Option<String>>,
    /// New username field name.
    pub username_field: Option<String>,
    /// New password field name.
    pub password_field: Option<String>,
}

impl LoginChanges {
    /// An empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hostname.
    pub fn hostname(mut self, hostname: &str) -> Self {
        self.hostname = Some(hostname.to_string());
        self
    }

    /// Set the username.
    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Set or clear the form submission URL.
    pub fn form_submit_url(mut self, url: Option<&str>) -> Self {
        self.form_submit_url = Some(url.map(str::to_string));
        self
    }

    /// Set or clear the HTTP realm.
    pub fn http_realm(mut self, realm: Option<&str>) -> Self {
        self.http_realm = Some(realm.map(str::to_string));
        self
    }

    /// True if applying this change set would alter nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the change set touches the password.
    pub fn changes_password(&self, current: &LoginFields) -> bool {
        self.password
            .as_ref()
            .is_some_and(|p| *p != current.password)
    }

    /// Apply the changes on top of existing content.
    pub fn apply_to(&self, current: &LoginFields) -> LoginFields {
        let mut next = current.clone();
        if let Some(hostname) = &self.hostname {
            next.hostname = hostname.clone();
        }
        if let Some(username) = &self.username {
            next.username = username.clone();
        }
        if let Some(password) = &self.password {
            next.password = password.clone();
        }
        if let Some(url) = &self.form_submit_url {
            next.form_submit_url = url.clone();
        }
        if let Some(realm) = &self.http_realm {
            next.http_realm = realm.clone();
        }
        if let Some(field) = &self.username_field {
            next.username_field = field.clone();
        }
        if let Some(field) = &self.password_field {
            next.password_field = field.clone();
        }
        next
    }
}
