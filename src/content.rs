use crate::store::{get_json, set_json, KeyValueStore};

pub const CONTENT_SECTIONS_KEY: &str = "content_sections";
pub const CURRENT_INDEX_KEY: &str = "current_index";

/// Segments saved from the input screen plus where the user left off
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedContent {
    pub segments: Vec<String>,
    pub index: usize,
}

impl SavedContent {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Load saved segments; an index pointing past the list restarts at 0.
pub fn load(store: &dyn KeyValueStore) -> SavedContent {
    let segments: Vec<String> = get_json(store, CONTENT_SECTIONS_KEY).unwrap_or_default();
    let index = store
        .get(CURRENT_INDEX_KEY)
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|&i| i < segments.len())
        .unwrap_or(0);
    SavedContent { segments, index }
}

pub fn save_segments(store: &dyn KeyValueStore, segments: &[String]) {
    set_json(store, CONTENT_SECTIONS_KEY, segments);
    save_index(store, 0);
}

pub fn save_index(store: &dyn KeyValueStore, index: usize) {
    store.set(CURRENT_INDEX_KEY, &index.to_string());
}

pub fn clear(store: &dyn KeyValueStore) {
    store.remove(CONTENT_SECTIONS_KEY);
    store.remove(CURRENT_INDEX_KEY);
}
