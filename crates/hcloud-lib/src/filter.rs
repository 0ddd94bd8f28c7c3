//! Resource category selection

use std::fmt;
use tracing::warn;

/// Resource categories a collector knows how to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    LoadBalancers,
}

impl ResourceKind {
    /// Category polled when none is configured
    pub const DEFAULT: ResourceKind = ResourceKind::LoadBalancers;

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::LoadBalancers => "load_balancers",
        }
    }

    /// Parse a configured category name; unknown names yield `None`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "load_balancers" => Some(ResourceKind::LoadBalancers),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective set of resource categories for a collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFilter {
    names: Vec<String>,
    kinds: Vec<ResourceKind>,
}

impl ResourceFilter {
    /// Build the filter from the configured `resources` list.
    ///
    /// An empty list selects [`ResourceKind::DEFAULT`]. Otherwise the list is
    /// taken as-is; names that match no known category are kept but never
    /// polled, and are reported once here.
    pub fn new(configured: &[String]) -> Self {
        if configured.is_empty() {
            return Self {
                names: vec![ResourceKind::DEFAULT.as_str().to_string()],
                kinds: vec![ResourceKind::DEFAULT],
            };
        }

        let mut kinds = Vec::new();
        let mut unknown: Vec<&str> = Vec::new();
        for name in configured {
            match ResourceKind::from_name(name) {
                Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
                Some(_) => {}
                None if !unknown.contains(&name.as_str()) => {
                    warn!(resource = %name, "Ignoring unknown hcloud resource category");
                    unknown.push(name);
                }
                None => {}
            }
        }

        Self {
            names: configured.to_vec(),
            kinds,
        }
    }

    /// Category names in effect, including unknown ones
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Known categories in effect, in configured order
    pub fn kinds(&self) -> &[ResourceKind] {
        &self.kinds
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.kinds.contains(&kind)
    }
}

impl Default for ResourceFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}
