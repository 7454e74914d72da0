//! # Localization Module
//!
//! Maps a language tag and message key to a user-facing string using Fluent
//! bundles. Resources are embedded at compile time and loaded once at
//! startup; the manager is passed into the message handler rather than
//! living in global state.

use anyhow::Result;
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::FluentResource;
use std::collections::HashMap;
use unic_langid::LanguageIdentifier;

/// Supported language tags with their embedded Fluent resources.
const RESOURCES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("mk", include_str!("../locales/mk/main.ftl")),
    ("sq", include_str!("../locales/sq/main.ftl")),
];

pub const FALLBACK_LANGUAGE: &str = "en";

/// Localization manager for the gallery bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a manager with bundles for every supported language.
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (tag, source) in RESOURCES {
            let locale: LanguageIdentifier = tag.parse()?;
            // Concurrent bundle: the manager is shared across async tasks.
            let mut bundle = FluentBundle::new_concurrent(vec![locale]);
            let resource = FluentResource::try_new((*source).to_string())
                .map_err(|(_, errors)| anyhow::anyhow!("invalid FTL for {tag}: {errors:?}"))?;
            bundle
                .add_resource(resource)
                .map_err(|errors| anyhow::anyhow!("duplicate FTL messages for {tag}: {errors:?}"))?;
            bundles.insert((*tag).to_string(), bundle);
        }

        Ok(Self { bundles })
    }

    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Get a localized message in the requested language, falling back to
    /// English for unsupported tags.
    pub fn get_message_in_language(&self, key: &str, language: &str) -> String {
        let bundle = self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(FALLBACK_LANGUAGE));

        let Some(bundle) = bundle else {
            return format!("Missing translation: {key}");
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {key}"),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {key}"),
        };

        let mut value = String::new();
        let _ = bundle.write_pattern(&mut value, pattern, None, &mut vec![]);
        value
    }
}
