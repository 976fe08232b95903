//! Rendering configuration.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::tag::{ESCAPE_REFERENCE, TRIVIA_REFERENCE};

/// Options for [`Renderer`](crate::render::Renderer).
///
/// Deserializable so consumers can load it from a config file; missing
/// fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Reference name whose values render as trivia.
    pub trivia_reference: SmolStr,
    /// Reference name whose values render as escapes.
    pub escape_reference: SmolStr,
    /// Text shown inside a gap placeholder.
    pub gap_placeholder: SmolStr,
    /// Prefix for visual element ids (`{prefix}-n3` instead of `n3`).
    pub id_prefix: Option<SmolStr>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            trivia_reference: SmolStr::new_static(TRIVIA_REFERENCE),
            escape_reference: SmolStr::new_static(ESCAPE_REFERENCE),
            gap_placeholder: SmolStr::new_static("\u{a0}\u{a0}"),
            id_prefix: None,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trivia_reference(mut self, name: impl Into<SmolStr>) -> Self {
        self.trivia_reference = name.into();
        self
    }

    pub fn with_escape_reference(mut self, name: impl Into<SmolStr>) -> Self {
        self.escape_reference = name.into();
        self
    }

    pub fn with_gap_placeholder(mut self, text: impl Into<SmolStr>) -> Self {
        self.gap_placeholder = text.into();
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<SmolStr>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let options: RenderOptions = serde_json::from_str(r#"{ "id_prefix": "doc" }"#).unwrap();
        assert_eq!(options.id_prefix.as_deref(), Some("doc"));
        assert_eq!(options.trivia_reference, "#");
        assert_eq!(options.escape_reference, "@");
        assert_eq!(options.gap_placeholder, "\u{a0}\u{a0}");
    }
}
