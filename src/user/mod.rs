mod model;
mod service;

pub use model::*;
pub use service::*;

use chrono::{DateTime, Utc};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

const ACTIVATION_CODE_LENGTH: usize = 21;
const DEFAULT_AVATAR_URL: &str = "/avatars/x256/01.png";
const DEFAULT_LANG: &str = "en_us";
const DEFAULT_CURRENCY: &str = "USD";

/// Badge granted to every freshly registered user.
pub const STARTER_BADGE: &str = "NEW_MEMBER";

static SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\s+").expect("spaces regex"));

/// User as saved on the record store. The sole aggregate root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Stable subject identifier minted by the identity directory.
    /// Immutable, primary key of the record store.
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub email: String,
    pub name: String,
    /// Derived from `name` at creation. Not guaranteed unique.
    pub handle: String,
    /// Single-use token, present iff `status` is `UNCONFIRMED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_code: Option<String>,
    #[serde(skip)]
    pub source_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub profile_data: ProfileData,
    /// Arbitrary unstructured mapping, owner-writable.
    pub data: serde_json::Map<String, serde_json::Value>,
    /// Badge-name tokens. Set semantics, no duplicates.
    pub badges: Vec<String>,
}

impl User {
    /// Whether the current status allows authentication.
    pub fn can_login(&self) -> bool {
        self.status.can_login()
    }
}

/// Semi-structured profile attributes, freely overwritable by the owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub avatar_url: String,
    pub lang: String,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Default for ProfileData {
    fn default() -> Self {
        Self {
            avatar_url: DEFAULT_AVATAR_URL.to_owned(),
            lang: DEFAULT_LANG.to_owned(),
            currency: DEFAULT_CURRENCY.to_owned(),
            about: None,
            location: None,
        }
    }
}

/// Role of a [`User`]. Mutated only through the administrative path.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    #[default]
    User,
    Moderator,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Moderator => "MODERATOR",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(UserRole::User),
            "MODERATOR" => Ok(UserRole::Moderator),
            "ADMIN" => Ok(UserRole::Admin),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Account status. One closed vocabulary spanning business states and
/// states mirrored from the identity directory.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Unconfirmed,
    Confirmed,
    Archived,
    Compromised,
    Suspended,
    Unknown,
    ResetRequired,
    ForceChangePassword,
}

impl UserStatus {
    /// Login eligibility is a pure function of the current status.
    pub fn can_login(&self) -> bool {
        matches!(self, UserStatus::Unconfirmed | UserStatus::Confirmed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Unconfirmed => "UNCONFIRMED",
            UserStatus::Confirmed => "CONFIRMED",
            UserStatus::Archived => "ARCHIVED",
            UserStatus::Compromised => "COMPROMISED",
            UserStatus::Suspended => "SUSPENDED",
            UserStatus::Unknown => "UNKNOWN",
            UserStatus::ResetRequired => "RESET_REQUIRED",
            UserStatus::ForceChangePassword => "FORCE_CHANGE_PASSWORD",
        }
    }
}

impl FromStr for UserStatus {
    type Err = ();

    /// Case-insensitive parsing of the eight recognized tokens.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNCONFIRMED" => Ok(UserStatus::Unconfirmed),
            "CONFIRMED" => Ok(UserStatus::Confirmed),
            "ARCHIVED" => Ok(UserStatus::Archived),
            "COMPROMISED" => Ok(UserStatus::Compromised),
            "SUSPENDED" => Ok(UserStatus::Suspended),
            "UNKNOWN" => Ok(UserStatus::Unknown),
            "RESET_REQUIRED" => Ok(UserStatus::ResetRequired),
            "FORCE_CHANGE_PASSWORD" => Ok(UserStatus::ForceChangePassword),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Collapse internal whitespace runs to a single space and trim.
pub fn collapse_spaces(input: &str, lowercase: bool) -> String {
    let collapsed = SPACES.replace_all(input.trim(), " ").to_string();
    if lowercase {
        collapsed.to_lowercase()
    } else {
        collapsed
    }
}

/// Mechanically derive a handle from a display name: `@` + PascalCase.
///
/// Uniqueness is deliberately not enforced. Two users named "jane doe"
/// both end up with `@JaneDoe`, matching the accepted collision behavior.
pub fn derive_handle(name: &str) -> String {
    let pascal: String = collapse_spaces(name, false)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>()
                        + &chars.as_str().to_lowercase()
                },
                None => String::new(),
            }
        })
        .collect();

    format!("@{pascal}")
}

/// Generate a fresh single-use activation code.
pub fn generate_activation_code() -> String {
    Alphanumeric.sample_string(&mut OsRng, ACTIVATION_CODE_LENGTH)
}
