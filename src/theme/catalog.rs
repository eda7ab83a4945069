//! Theme Catalog
//!
//! Named themes read from `themes.toml`:
//!
//! ```toml
//! [theme.default]
//! name = "Default"
//! [theme.default.vars]
//! color-bg = "#0b1120"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of the theme used when the requested one does not exist
pub const FALLBACK_THEME_KEY: &str = "default";

/// Built-in `themes.toml` written when none exists
pub const DEFAULT_THEMES_TOML: &str = r##"# herbst themes
#
# Select one with `theme = "<key or name>"` in config.toml.
# Every entry under `vars` becomes a CSS custom property (`--<key>`).

[theme.default]
name = "Default"
[theme.default.vars]
color-bg      = "#0b1120"
color-surface = "#111827"
color-text    = "#e5e7eb"
color-accent  = "#f97316"

[theme.light]
name = "Light"
[theme.light.vars]
color-bg      = "#f9fafb"
color-surface = "#ffffff"
color-text    = "#111827"
color-accent  = "#ea580c"
"##;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeCatalog {
    #[serde(default, rename = "theme")]
    pub themes: BTreeMap<String, Theme>,
}

impl ThemeCatalog {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Catalog parsed from the built-in themes
    pub fn builtin() -> Self {
        Self::from_toml(DEFAULT_THEMES_TOML).unwrap_or_default()
    }

    /// Resolve a theme by key, then by display name (case-insensitive),
    /// then fall back to `default`, then to an empty theme
    pub fn active(&self, name: &str) -> Theme {
        let name = if name.is_empty() { FALLBACK_THEME_KEY } else { name };

        if let Some(theme) = self.themes.get(name) {
            return theme.clone();
        }

        if let Some(theme) = self
            .themes
            .values()
            .find(|theme| theme.name.eq_ignore_ascii_case(name))
        {
            return theme.clone();
        }

        if let Some(theme) = self.themes.get(FALLBACK_THEME_KEY) {
            tracing::warn!(theme = %name, "Unknown theme, using default");
            return theme.clone();
        }

        tracing::warn!(theme = %name, "Unknown theme and no default theme defined");
        Theme {
            name: FALLBACK_THEME_KEY.to_string(),
            vars: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ThemeCatalog {
        ThemeCatalog::from_toml(
            r##"
[theme.default]
name = "Default"
[theme.default.vars]
color-bg = "#000"

[theme.autumn_mist]
name = "Autumn Mist"
[theme.autumn_mist.vars]
color-bg = "#3b2f2f"
"##,
        )
        .unwrap()
    }

    #[test]
    fn test_builtin_catalog_parses() {
        let catalog = ThemeCatalog::builtin();
        assert_eq!(catalog.themes.len(), 2);
        assert_eq!(catalog.active("light").name, "Light");
    }

    #[test]
    fn test_lookup_by_key() {
        assert_eq!(catalog().active("autumn_mist").vars["color-bg"], "#3b2f2f");
    }

    #[test]
    fn test_lookup_by_display_name() {
        assert_eq!(catalog().active("autumn mist").name, "Autumn Mist");
    }

    #[test]
    fn test_unknown_falls_back_to_default() {
        assert_eq!(catalog().active("Nebula").name, "Default");
        assert_eq!(catalog().active("").name, "Default");
    }

    #[test]
    fn test_empty_catalog() {
        let theme = ThemeCatalog::default().active("anything");
        assert_eq!(theme.name, "default");
        assert!(theme.vars.is_empty());
    }
}
