use serde::{Deserialize, Serialize};

/// Draft lifecycle: `Draft` -> (`Scheduled`) -> `Published`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
}

/// An image attached to a draft.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageRef {
    /// Remote URL the destination fetches by itself.
    Url(String),
    /// Base64 payload, optionally prefixed with a `data:` URL header.
    Inline(String),
}

/// A unit of content owned by the account store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default)]
    pub status: DraftStatus,
    /// Epoch millis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl Draft {
    pub fn new(id: impl Into<String>, topic: impl Into<String>, content: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: id.into(),
            topic: topic.into(),
            title: None,
            content: content.into(),
            image_url: None,
            image_data: None,
            status: DraftStatus::Draft,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The image to send, preferring the uploaded URL over inline data.
    pub fn image(&self) -> Option<ImageRef> {
        if let Some(url) = self.image_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Some(ImageRef::Url(url.to_string()));
        }
        self.image_data
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| ImageRef::Inline(d.to_string()))
    }

    pub fn display_title(&self) -> &str {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title;
        }
        if !self.topic.trim().is_empty() {
            return &self.topic;
        }
        &self.id
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.status == DraftStatus::Scheduled && self.scheduled_at.is_some_and(|at| at <= now_ms)
    }
}

/// Destination provider tag. Only `Telegram` has a working gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Telegram,
    Facebook,
    WordPress,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Telegram => "telegram",
            ProviderKind::Facebook => "facebook",
            ProviderKind::WordPress => "wordpress",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramCredentials {
    pub bot_token: String,
    /// Numeric chat id or `@channel` username.
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i32>,
}

impl TelegramCredentials {
    pub fn is_complete(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.channel_id.trim().is_empty()
    }
}

/// Provider-specific credentials; the variant must agree with `Destination::provider`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum DestinationCredentials {
    Telegram(TelegramCredentials),
    Facebook {
        page_id: String,
        access_token: String,
    },
    WordPress {
        site_url: String,
        username: String,
        app_password: String,
    },
}

impl DestinationCredentials {
    pub fn provider(&self) -> ProviderKind {
        match self {
            DestinationCredentials::Telegram(_) => ProviderKind::Telegram,
            DestinationCredentials::Facebook { .. } => ProviderKind::Facebook,
            DestinationCredentials::WordPress { .. } => ProviderKind::WordPress,
        }
    }

    pub fn telegram(&self) -> Option<&TelegramCredentials> {
        match self {
            DestinationCredentials::Telegram(c) => Some(c),
            _ => None,
        }
    }
}

/// A configured delivery target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub provider: ProviderKind,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    pub credentials: DestinationCredentials,
}

/// Id of the ephemeral destination synthesized from legacy credentials.
pub const LEGACY_DESTINATION_ID: &str = "legacy";

impl Destination {
    pub fn telegram(
        id: impl Into<String>,
        name: impl Into<String>,
        credentials: TelegramCredentials,
    ) -> Self {
        Self {
            id: id.into(),
            provider: ProviderKind::Telegram,
            name: name.into(),
            is_active: true,
            credentials: DestinationCredentials::Telegram(credentials),
        }
    }

    /// Ephemeral destination for a single run; never persisted.
    pub fn legacy(credentials: TelegramCredentials) -> Self {
        Self::telegram(LEGACY_DESTINATION_ID, "Telegram (legacy)", credentials)
    }
}

/// Inline action button (label + URL).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

/// Options for a whole publish run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub silent: bool,
    pub buttons: Vec<LinkButton>,
}

/// Options for one `send_chunk` call. Only the last part of a run carries them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendOptions {
    pub silent: bool,
    pub buttons: Vec<LinkButton>,
}

impl SendOptions {
    pub fn is_empty(&self) -> bool {
        !self.silent && self.buttons.is_empty()
    }
}

impl From<&PublishOptions> for SendOptions {
    fn from(o: &PublishOptions) -> Self {
        Self {
            silent: o.silent,
            buttons: o.buttons.clone(),
        }
    }
}
