//! Theme Application
//!
//! Projects a flat `themeVars` mapping onto the root rendering context as
//! `--<name>` custom properties.
//!
//! The rendering root is abstracted as a [`StyleSurface`]; [`RootStyle`] is
//! the in-memory root used by headless sessions and tests. [`ThemeApplier`]
//! remembers what it set, so a later call with a different mapping removes
//! variables that are no longer present before setting the new ones.
//!
//! ```rust
//! use herbst::theme::{RootStyle, ThemeApplier};
//! use std::collections::BTreeMap;
//!
//! let mut applier = ThemeApplier::new(RootStyle::default());
//! applier.apply(&BTreeMap::from([("color-bg".to_string(), "#0b1120".to_string())]));
//! assert_eq!(applier.surface().get("--color-bg"), Some("#0b1120"));
//! ```

pub mod catalog;

pub use catalog::{Theme, ThemeCatalog, DEFAULT_THEMES_TOML};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

/// Marker prefixed to every theme variable name
pub const VAR_PREFIX: &str = "--";

/// Whether a theme variable name may be used as a custom property name
pub fn is_valid_var_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A rendering root that accepts custom properties
pub trait StyleSurface {
    fn set_property(&mut self, name: &str, value: &str);
    fn remove_property(&mut self, name: &str);
}

/// In-memory root rendering context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootStyle {
    properties: BTreeMap<String, String>,
}

impl RootStyle {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Render as a `:root` rule
    pub fn to_css(&self) -> String {
        let mut css = String::from(":root {\n");
        for (name, value) in &self.properties {
            let _ = writeln!(css, "  {}: {};", name, value);
        }
        css.push_str("}\n");
        css
    }
}

impl StyleSurface for RootStyle {
    fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }

    fn remove_property(&mut self, name: &str) {
        self.properties.remove(name);
    }
}

/// Applies theme variables to a surface with clear-then-set semantics
pub struct ThemeApplier<S: StyleSurface> {
    surface: S,
    applied: BTreeSet<String>,
}

impl<S: StyleSurface> ThemeApplier<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            applied: BTreeSet::new(),
        }
    }

    /// Apply a theme mapping
    ///
    /// Variables set by an earlier call and missing from `vars` are removed.
    /// Keys that are not valid property names are skipped.
    pub fn apply(&mut self, vars: &BTreeMap<String, String>) {
        let stale: Vec<String> = self
            .applied
            .iter()
            .filter(|key| !vars.contains_key(*key))
            .cloned()
            .collect();
        for key in stale {
            self.surface.remove_property(&property_name(&key));
            self.applied.remove(&key);
        }

        for (key, value) in vars {
            if !is_valid_var_name(key) {
                tracing::warn!(variable = %key, "Skipping invalid theme variable name");
                continue;
            }
            self.surface.set_property(&property_name(key), value);
            self.applied.insert(key.clone());
        }

        tracing::debug!(variables = self.applied.len(), "Theme applied");
    }

    /// Remove every variable this applier has set
    pub fn clear(&mut self) {
        for key in std::mem::take(&mut self.applied) {
            self.surface.remove_property(&property_name(&key));
        }
    }

    /// Variable names (without prefix) currently applied
    pub fn applied(&self) -> impl Iterator<Item = &str> {
        self.applied.iter().map(String::as_str)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}

fn property_name(key: &str) -> String {
    format!("{}{}", VAR_PREFIX, key)
}
