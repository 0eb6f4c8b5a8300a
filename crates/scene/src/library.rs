//! Placeable-object catalogue and the debug text sink.

use std::collections::BTreeSet;

use tracing::{debug, warn};
use vision::{DebugSurface, ObjectLibrary, ObjectTemplate};

/// Asset instantiated when a label is selected for placement.
pub const DEFAULT_OBJECT_ASSET: &str = "art.scnassets/ship.scn";

/// Catalogue of bundled assets and the one handed out for placement.
#[derive(Clone, Debug)]
pub struct AssetLibrary {
    bundled: BTreeSet<String>,
    placeable: String,
}

impl AssetLibrary {
    /// Library whose placeable asset is `placeable`, with nothing bundled yet.
    pub fn new(placeable: impl Into<String>) -> Self {
        Self {
            bundled: BTreeSet::new(),
            placeable: placeable.into(),
        }
    }

    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.bundled.insert(asset.into());
        self
    }

    pub fn placeable(&self) -> &str {
        &self.placeable
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.bundled.contains(asset)
    }
}

impl Default for AssetLibrary {
    fn default() -> Self {
        Self::new(DEFAULT_OBJECT_ASSET).with_asset(DEFAULT_OBJECT_ASSET)
    }
}

impl ObjectLibrary for AssetLibrary {
    fn instantiate(&self) -> Option<ObjectTemplate> {
        if !self.contains(&self.placeable) {
            warn!(asset = %self.placeable, "Placeable asset is not bundled");
            return None;
        }
        Some(ObjectTemplate::new(self.placeable.clone()))
    }
}

/// Debug text holder; keeps the text currently on screen.
#[derive(Clone, Debug, Default)]
pub struct DebugText {
    text: String,
    updates: u64,
}

impl DebugText {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// How many times the text was replaced.
    pub fn updates(&self) -> u64 {
        self.updates
    }
}

impl DebugSurface for DebugText {
    fn show(&mut self, text: &str) {
        if self.text != text {
            debug!(text, "Debug text updated");
        }
        self.text.clear();
        self.text.push_str(text);
        self.updates += 1;
    }
}
