use crate::shared::constants::{LABEL_LOADING, LABEL_PREFIX};

/// Holds the on-screen emotion text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelUpdater {
    text: String,
}

impl Default for LabelUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelUpdater {
    pub fn new() -> Self {
        Self {
            text: format!("{LABEL_PREFIX}{LABEL_LOADING}"),
        }
    }

    /// Replaces the text with `"Emotion: <label>"` and returns it.
    pub fn update(&mut self, label: &str) -> &str {
        self.text = format!("{LABEL_PREFIX}{label}");
        &self.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
