//! Feed source configuration.

use serde::{Deserialize, Serialize};

/// One configured calendar feed: where to fetch it and how to label
/// records that came from it.
///
/// Static request-scoped input; the configured list order is
/// significant for merge semantics (later sources win id collisions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// URL of the ICS document.
    pub url: String,
    /// Label used in the `ics:<label>` source tag.
    pub label: String,
}

impl Source {
    /// Creates a new source.
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_config_json() {
        let sources: Vec<Source> = serde_json::from_str(
            r#"[{"url":"https://example.com/a.ics","label":"A"},
                {"url":"https://example.com/b.ics","label":"B"}]"#,
        )
        .unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0], Source::new("https://example.com/a.ics", "A"));
        assert_eq!(sources[1].label, "B");
    }
}
