use crate::models::{EnrichedTrack, TrackIdentity};
use std::collections::HashMap;

/// Session-lifetime store of enriched tracks, keyed by identity.
///
/// No eviction: the number of entries is bounded by the distinct tracks
/// played in one session. The cache is owned by the aggregator and only
/// mutated through `&mut`, so enrichment runs at most once per identity.
#[derive(Debug, Default)]
pub struct TrackCache {
    entries: HashMap<TrackIdentity, EnrichedTrack>,
}

impl TrackCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &TrackIdentity) -> Option<&EnrichedTrack> {
        self.entries.get(identity)
    }

    pub fn get_mut(&mut self, identity: &TrackIdentity) -> Option<&mut EnrichedTrack> {
        self.entries.get_mut(identity)
    }

    pub fn put(&mut self, identity: TrackIdentity, track: EnrichedTrack) {
        self.entries.insert(identity, track);
    }

    pub fn has(&self, identity: &TrackIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
