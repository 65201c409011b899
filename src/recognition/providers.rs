//! Catalog of supported speech-to-text providers.

use serde::Serialize;

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub id: u32,
    pub name: &'static str,
    /// Disabled entries are listed but cannot be selected.
    pub enabled: bool,
}

/// Microsoft Bing Speech / Azure speech-to-text.
pub const BING_SPEECH: u32 = 0;
/// Google Cloud Speech, listed but without a client.
pub const GOOGLE_CLOUD_SPEECH: u32 = 1;

pub const PROVIDERS: &[Provider] = &[
    Provider {
        id: BING_SPEECH,
        name: "Microsoft Bing Speech",
        enabled: true,
    },
    Provider {
        id: GOOGLE_CLOUD_SPEECH,
        name: "Google Cloud Speech",
        enabled: false,
    },
];

pub fn find_provider(id: u32) -> Option<&'static Provider> {
    PROVIDERS.iter().find(|p| p.id == id)
}

/// Check that `id` names a selectable provider and `api_key` is usable.
pub fn validate_selection(id: u32, api_key: &str) -> Result<&'static Provider, ConfigError> {
    let provider = find_provider(id).ok_or(ConfigError::UnknownProvider(id))?;
    if !provider.enabled {
        return Err(ConfigError::ProviderDisabled(provider.name.into()));
    }
    if api_key.trim().is_empty() {
        return Err(ConfigError::MissingApiKey(provider.name.into()));
    }
    Ok(provider)
}
