use serde::{Deserialize, Serialize};

/// Claims read from an identity-provider session token.
///
/// `iss`, `aud` and `exp` are checked by the verifier; only the fields the
/// UI needs are kept here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: String, // Provider user ID
    pub exp: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "image_url")]
    pub picture: Option<String>,
}

/// The signed-in user, as far as the frontend needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Identity provider subject (`sub` claim).
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
}

impl AuthenticatedUser {
    /// Fixed user attached when identity verification is disabled.
    pub fn development() -> Self {
        Self {
            subject: "test_user_dev".to_string(),
            email: Some("dev@test.com".to_string()),
            name: None,
            image_url: None,
        }
    }

    /// Name to show in the UI: full name, else email, else subject.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or(&self.subject)
    }

    /// Up to two uppercase initials for the avatar fallback.
    pub fn initials(&self) -> String {
        fn lead(word: &str) -> Option<char> {
            word.chars().find(|c| c.is_alphanumeric())
        }

        let named = self.name.as_deref().is_some_and(|n| !n.trim().is_empty());
        let words: Vec<&str> = self
            .display_name()
            .split(|c: char| c.is_whitespace() || c == '@' || c == '.' || c == '_')
            .filter(|w| lead(w).is_some())
            .collect();

        let picked: String = match (named, words.as_slice()) {
            (true, [first, .., last]) => [first, last].into_iter().filter_map(|w| lead(w)).collect(),
            (_, [first, ..]) => lead(first).into_iter().collect(),
            (_, []) => "?".to_string(),
        };
        picked.to_uppercase()
    }
}

impl From<SessionClaims> for AuthenticatedUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            subject: claims.sub,
            email: claims.email,
            name: claims.name,
            image_url: claims.picture,
        }
    }
}
