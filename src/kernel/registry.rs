use std::collections::BTreeMap;

/// Fallback display name for badges nobody registered.
pub const UNKNOWN_BADGE: &str = "Unknown";

/// Read-only badge id -> display name table, used for log enrichment only.
/// Never sent over the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadgeRegistry {
    // Ordered so that sampling by index is stable for a given registry.
    entries: BTreeMap<String, String>,
}

impl BadgeRegistry {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The five employees the demo terminal ships with.
    pub fn demo() -> Self {
        Self::new([
            ("RFID001", "João Silva"),
            ("RFID002", "Maria Santos"),
            ("RFID003", "Carlos Lima"),
            ("RFID004", "Ana Costa"),
            ("RFID005", "Pedro Oliveira"),
        ])
    }

    pub fn display_name(&self, badge_id: &str) -> &str {
        self.entries
            .get(badge_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_BADGE)
    }

    pub fn contains(&self, badge_id: &str) -> bool {
        self.entries.contains_key(badge_id)
    }

    pub fn badge_at(&self, index: usize) -> Option<&str> {
        self.entries.keys().nth(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
