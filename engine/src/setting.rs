//! Process-wide settings keyed by an enumerated identifier.

use crate::{Entity, EntityId, EntityKind, Error, Timestamp};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Recognized settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettingKey {
    /// API key of the text translation service
    ApiKeyMicrosoftTextTranslate,
    /// How cards are laid out by the presentation layer
    CardsDisplayMode,
}

impl SettingKey {
    /// Every recognized key, in declaration order.
    pub const ALL: [SettingKey; 2] = [
        SettingKey::ApiKeyMicrosoftTextTranslate,
        SettingKey::CardsDisplayMode,
    ];

    /// Wire name, also used as the setting's identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::ApiKeyMicrosoftTextTranslate => "api-key-microsoft-text-translate",
            SettingKey::CardsDisplayMode => "cards-display-mode",
        }
    }
}

impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::UnknownSettingKey(s.to_string()))
    }
}

/// A key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    /// Same as `key.as_str()`
    pub id: EntityId,
    pub key: SettingKey,
    #[serde(default)]
    pub value: String,
    pub modified_at: Timestamp,
}

impl Setting {
    pub fn new(key: SettingKey, value: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: key.as_str().to_string(),
            key,
            value: value.into(),
            modified_at: timestamp,
        }
    }

    /// The value a recognized key gets when it is missing from storage.
    pub fn default_for(key: SettingKey, timestamp: Timestamp) -> Self {
        Self::new(key, "", timestamp)
    }
}

impl Entity for Setting {
    const KIND: EntityKind = EntityKind::Setting;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn modified_at(&self) -> Timestamp {
        self.modified_at
    }

    fn touch(&mut self, timestamp: Timestamp) {
        self.modified_at = timestamp;
    }
}
