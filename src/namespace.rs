//! Generation-qualified cache namespace naming
//!
//! Every namespace is named `{prefix}:{purpose}:{generation}`. Names under
//! the controller's prefix with a different generation are stale whatever
//! their purpose segment; names with a different prefix belong to someone
//! else and are never touched.

use crate::generation::GenerationTag;
use std::fmt;

/// What a namespace stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Scope root, index document and navigations
    AppShell,
    /// Scripts, stylesheets and fonts
    Static,
    /// Images
    Image,
}

impl Purpose {
    /// Name segment used in namespace identifiers
    pub fn as_segment(&self) -> &'static str {
        match self {
            Self::AppShell => "app",
            Self::Static => "static",
            Self::Image => "images",
        }
    }

    /// All purposes, one live namespace each
    pub fn all() -> &'static [Self] {
        &[Self::AppShell, Self::Static, Self::Image]
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_segment())
    }
}

/// A namespace identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceName {
    pub prefix: String,
    pub purpose: Purpose,
    pub generation: String,
}

impl NamespaceName {
    pub fn new(prefix: &str, purpose: Purpose, generation: &GenerationTag) -> Self {
        Self {
            prefix: prefix.to_string(),
            purpose,
            generation: generation.as_str().to_string(),
        }
    }
}

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.prefix, self.purpose, self.generation)
    }
}

/// Generation segment of a namespace owned by `prefix`
///
/// Ownership is decided by the prefix alone, so namespaces left behind by
/// builds that used other purpose names are still recognised.
pub fn owned_generation<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?.strip_prefix(':')?;
    let generation = rest.rsplit_once(':').map_or(rest, |(_, g)| g);
    (!generation.is_empty()).then_some(generation)
}

/// Whether `name` belongs to `prefix` but not to `generation`
pub fn is_stale(name: &str, prefix: &str, generation: &GenerationTag) -> bool {
    owned_generation(name, prefix).is_some_and(|g| g != generation.as_str())
}

/// The three namespace identifiers of one generation
#[derive(Debug, Clone)]
pub struct Namespaces {
    pub app_shell: String,
    pub static_assets: String,
    pub images: String,
}

impl Namespaces {
    pub fn new(prefix: &str, generation: &GenerationTag) -> Self {
        let name = |purpose| NamespaceName::new(prefix, purpose, generation).to_string();
        Self {
            app_shell: name(Purpose::AppShell),
            static_assets: name(Purpose::Static),
            images: name(Purpose::Image),
        }
    }

    pub fn for_purpose(&self, purpose: Purpose) -> &str {
        match purpose {
            Purpose::AppShell => &self.app_shell,
            Purpose::Static => &self.static_assets,
            Purpose::Image => &self.images,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        Purpose::all().iter().map(move |p| self.for_purpose(*p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> GenerationTag {
        GenerationTag::new(s).unwrap()
    }

    #[test]
    fn names_follow_layout() {
        let ns = Namespaces::new("erp", &tag("G2"));
        assert_eq!(ns.app_shell, "erp:app:G2");
        assert_eq!(ns.static_assets, "erp:static:G2");
        assert_eq!(ns.images, "erp:images:G2");
        assert_eq!(ns.iter().count(), 3);
    }

    #[test]
    fn owned_generation_is_prefix_scoped() {
        assert_eq!(owned_generation("erp:app:G1", "erp"), Some("G1"));
        assert_eq!(owned_generation("erp:runtime:G1", "erp"), Some("G1"));
        assert_eq!(owned_generation("erp:G1", "erp"), Some("G1"));
        assert_eq!(owned_generation("acme:admin:static:G1", "acme:admin"), Some("G1"));
        assert_eq!(owned_generation("erp-admin:app:G1", "erp"), None);
        assert_eq!(owned_generation("other:app:G1", "erp"), None);
        assert_eq!(owned_generation("erp", "erp"), None);
        assert_eq!(owned_generation("erp:app:", "erp"), None);
        assert_eq!(owned_generation("workbox-precache", "erp"), None);
    }

    #[test]
    fn staleness_ignores_purpose() {
        let g2 = tag("G2");
        assert!(is_stale("erp:app:G1", "erp", &g2));
        assert!(is_stale("erp:pages:G1", "erp", &g2));
        assert!(is_stale("erp:runtime:G1", "erp", &g2));
        assert!(!is_stale("erp:app:G2", "erp", &g2));
        assert!(!is_stale("erp:thumbnails:G2", "erp", &g2));
        assert!(!is_stale("other:app:G1", "erp", &g2));
        assert!(!is_stale("unrelated", "erp", &g2));
    }

    #[test]
    fn display_matches_layout() {
        let name = NamespaceName::new("erp", Purpose::Image, &tag("20260101120000"));
        assert_eq!(name.to_string(), "erp:images:20260101120000");
    }
}
