//! Client-facing reshaping of the [`User`] entity.

use serde::Serialize;

use crate::config::Configuration;
use crate::user::{ProfileData, User, UserRole, UserStatus};

/// Icon path for a recognized badge name. Unknown names are carried
/// through without an icon; the vocabulary here is presentation-only.
fn badge_icon(name: &str) -> Option<&'static str> {
    match name {
        "NEW_MEMBER" => Some("/badges/new-member.svg"),
        "CONVERSATION_STARTER" => Some("/badges/conversation-starter.svg"),
        "VERIFIED_EMAIL" => Some("/badges/verified-email.svg"),
        "COMPLETED_PROFILE" => Some("/badges/completed-profile.svg"),
        "FEATURED_AUTHOR" => Some("/badges/featured-author.svg"),
        "TOP_SELLER" => Some("/badges/top-seller.svg"),
        "RISING_STAR" => Some("/badges/rising-star.svg"),
        "FOUNDING_MEMBER" => Some("/badges/founding-member.svg"),
        "TOP_REVIEWER" => Some("/badges/top-reviewer.svg"),
        _ => None,
    }
}

/// Badge with its resolved icon URL.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeView {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// Profile block grouping the user-editable parts of the record.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub profile_data: ProfileData,
    pub badges: Vec<BadgeView>,
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// User as returned by the API. Relative asset paths are rewritten to
/// absolute URLs against the configured static assets origin.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub handle: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<chrono::DateTime<chrono::Utc>>,
    pub email: String,
    pub role: UserRole,
    pub status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
    pub profile: ProfileView,
    /// Only populated in dev mode, for automated testing.
    #[serde(rename = "$devTest", skip_serializing_if = "Option::is_none")]
    pub dev_test: Option<serde_json::Value>,
}

impl UserView {
    pub fn new(user: User, config: &Configuration) -> Self {
        let assets = config
            .static_assets_url
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/');

        let mut profile_data = user.profile_data;
        profile_data.avatar_url =
            format!("{assets}{}", profile_data.avatar_url);

        let badges = user
            .badges
            .into_iter()
            .map(|name| {
                let icon_url =
                    badge_icon(&name).map(|path| format!("{assets}{path}"));
                BadgeView { name, icon_url }
            })
            .collect();

        let dev_test = if config.dev_mode
            && user.status == UserStatus::Unconfirmed
        {
            user.activation_code.map(|code| {
                serde_json::json!({ "activationCode": code })
            })
        } else {
            None
        };

        Self {
            id: user.id,
            name: user.name,
            handle: user.handle,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login_at: user.last_login_at,
            email: user.email,
            role: user.role,
            status: user.status,
            source_system: user.source_system,
            profile: ProfileView {
                profile_data,
                badges,
                data: user.data,
            },
            dev_test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user() -> User {
        User {
            id: "2f0b9d2e".to_owned(),
            created_at: Utc::now(),
            updated_at: None,
            last_login_at: None,
            email: "jane@example.com".to_owned(),
            name: "jane doe".to_owned(),
            handle: "@JaneDoe".to_owned(),
            activation_code: Some("p2LJp0Xbz8VcPOdTngRQq".to_owned()),
            source_ip: None,
            source_system: None,
            role: UserRole::User,
            status: UserStatus::Unconfirmed,
            profile_data: ProfileData::default(),
            data: serde_json::Map::new(),
            badges: vec!["NEW_MEMBER".to_owned(), "HOMEMADE".to_owned()],
        }
    }

    fn config(dev_mode: bool) -> Configuration {
        Configuration {
            static_assets_url: Some("https://static.example.com".to_owned()),
            dev_mode,
            ..Default::default()
        }
    }

    #[test]
    fn test_asset_urls_are_absolutized() {
        let view = UserView::new(sample_user(), &config(false));

        assert_eq!(
            view.profile.profile_data.avatar_url,
            "https://static.example.com/avatars/x256/01.png"
        );
        assert_eq!(
            view.profile.badges[0].icon_url.as_deref(),
            Some("https://static.example.com/badges/new-member.svg")
        );
        // Unrecognized badge names keep their name but get no icon.
        assert_eq!(view.profile.badges[1].name, "HOMEMADE");
        assert!(view.profile.badges[1].icon_url.is_none());
    }

    #[test]
    fn test_activation_code_is_dev_mode_only() {
        let hidden = UserView::new(sample_user(), &config(false));
        assert!(hidden.dev_test.is_none());

        let shown = UserView::new(sample_user(), &config(true));
        assert_eq!(
            shown.dev_test.unwrap()["activationCode"],
            "p2LJp0Xbz8VcPOdTngRQq"
        );

        let mut confirmed = sample_user();
        confirmed.status = UserStatus::Confirmed;
        confirmed.activation_code = None;
        let view = UserView::new(confirmed, &config(true));
        assert!(view.dev_test.is_none());
    }
}
