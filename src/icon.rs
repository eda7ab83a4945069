//! Icon Resolution
//!
//! Pass-through with explicit absence. Whether the icon actually loads is
//! left to the rendering layer.

/// Resolve an optional icon reference
///
/// Returns `None` for a missing or empty reference, otherwise the reference
/// unchanged.
pub fn resolve(src: Option<&str>) -> Option<&str> {
    src.filter(|s| !s.is_empty())
}
