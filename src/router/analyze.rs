//! Query-shape analysis: which layers a search fans out to.

use std::collections::BTreeSet;

use crate::item::MemoryLayer;

const SESSION_MARKERS: &[&str] = &["current", "now", "todo"];
const TEMPORAL_MARKERS: &[&str] = &["history", "pattern", "trend"];
const BROAD_MARKERS: &[&str] = &["compare", "analyze", "explain", "why"];
const BROAD_TOKEN_COUNT: usize = 12;

/// `analyze(query_text)` (spec §4.4.2): returns the candidate layer set
/// before the temporal-fallback top-up, which the caller applies once it
/// knows how many results the first pass produced.
pub fn analyze(query_text: &str) -> BTreeSet<MemoryLayer> {
    let lower = query_text.to_lowercase();
    let tokens: Vec<&str> = lower.split_whitespace().collect();

    let mut layers = BTreeSet::new();

    if tokens.len() > BROAD_TOKEN_COUNT || BROAD_MARKERS.iter().any(|m| lower.contains(m)) {
        layers.extend(MemoryLayer::ALL);
        return layers;
    }

    if SESSION_MARKERS.iter().any(|m| lower.contains(m)) {
        layers.insert(MemoryLayer::Session);
    }
    if TEMPORAL_MARKERS.iter().any(|m| lower.contains(m)) {
        layers.insert(MemoryLayer::Temporal);
    }

    if layers.is_empty() {
        layers.insert(MemoryLayer::Session);
        layers.insert(MemoryLayer::Project);
        layers.insert(MemoryLayer::Global);
    }

    layers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_marker_includes_session() {
        let layers = analyze("what am I working on right now");
        assert!(layers.contains(&MemoryLayer::Session));
    }

    #[test]
    fn history_marker_includes_temporal() {
        let layers = analyze("show me the history of this project");
        assert!(layers.contains(&MemoryLayer::Temporal));
    }

    #[test]
    fn long_query_includes_all_layers() {
        let layers = analyze("one two three four five six seven eight nine ten eleven twelve thirteen");
        assert_eq!(layers.len(), MemoryLayer::ALL.len());
    }

    #[test]
    fn analyze_marker_includes_all_layers() {
        let layers = analyze("please analyze this");
        assert_eq!(layers.len(), MemoryLayer::ALL.len());
    }

    #[test]
    fn plain_query_defaults_to_session_project_global() {
        let layers = analyze("the quick brown fox");
        assert_eq!(
            layers,
            [MemoryLayer::Session, MemoryLayer::Project, MemoryLayer::Global]
                .into_iter()
                .collect()
        );
    }
}
