//! Helpers that apply [`SearchTuning`] tables to a query

use crate::dto::CatalogTrack;
use music_rpc_core::{strip_diacritics, SearchTuning};
use std::collections::HashSet;

/// Alternative catalog spellings for an artist, from the first table entry
/// whose key occurs in the artist name. Does not include the artist itself.
pub fn table_aliases(tuning: &SearchTuning, artist: &str) -> Vec<String> {
    let lower = artist.to_lowercase();
    if lower.is_empty() {
        return Vec::new();
    }

    tuning
        .artist_aliases
        .iter()
        .find(|(key, _)| lower.contains(key.as_str()))
        .map(|(_, aliases)| aliases.clone())
        .unwrap_or_default()
}

/// The artist followed by its table aliases, without duplicates
pub fn artist_with_aliases(tuning: &SearchTuning, artist: &str) -> Vec<String> {
    let mut names = vec![artist.to_string()];
    for alias in table_aliases(tuning, artist) {
        if !names.contains(&alias) {
            names.push(alias);
        }
    }
    names
}

/// Known catalog artist ids for every table key occurring in the artist name
pub fn known_artist_ids(tuning: &SearchTuning, artist: &str) -> Vec<u64> {
    let lower = artist.to_lowercase();
    if lower.is_empty() {
        return Vec::new();
    }

    tuning
        .artist_ids
        .iter()
        .filter(|(key, _)| lower.contains(key.as_str()))
        .flat_map(|(_, ids)| ids.iter().copied())
        .collect()
}

/// First few meaningful words of a title: long enough and not a stop word
pub fn simplified_title(tuning: &SearchTuning, title: &str) -> Option<String> {
    let words: Vec<&str> = title
        .split_whitespace()
        .filter(|word| word.chars().count() >= tuning.min_word_length)
        .filter(|word| {
            let lower = word.to_lowercase();
            !tuning.stop_words.iter().any(|stop| *stop == lower)
        })
        .take(tuning.simplified_word_count)
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Word-overlap score in 0..=100 between the wanted title and a candidate.
///
/// Both sides are lowercased with diacritics stripped; an exact match is 100,
/// otherwise the share of query words found in the candidate.
pub fn match_score(wanted: &str, candidate: &str) -> f64 {
    let wanted = strip_diacritics(&wanted.to_lowercase());
    let candidate = strip_diacritics(&candidate.to_lowercase());

    if wanted == candidate {
        return 100.0;
    }

    let wanted_words: HashSet<&str> = wanted.split_whitespace().collect();
    if wanted_words.is_empty() {
        return 0.0;
    }
    let candidate_words: HashSet<&str> = candidate.split_whitespace().collect();

    let common = wanted_words.intersection(&candidate_words).count();
    common as f64 * 100.0 / wanted_words.len() as f64
}

/// Highest-scoring track; ties keep the earlier (more popular) one
pub fn best_match<'a>(title: &str, tracks: &'a [CatalogTrack]) -> Option<(&'a CatalogTrack, f64)> {
    let mut best: Option<(&CatalogTrack, f64)> = None;

    for track in tracks {
        let score = match_score(title, &track.title);
        if score > best.map(|(_, s)| s).unwrap_or(0.0) {
            best = Some((track, score));
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str) -> CatalogTrack {
        CatalogTrack {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_aliases() {
        let tuning = SearchTuning::default();

        assert_eq!(
            artist_with_aliases(&tuning, "Yzomandias"),
            vec!["Yzomandias", "Logic", "Milion+"]
        );
        assert_eq!(
            table_aliases(&tuning, "Viktor Sheen & Calin"),
            vec!["Calin", "Callin"]
        );
        assert!(table_aliases(&tuning, "Pink Floyd").is_empty());
        assert_eq!(artist_with_aliases(&tuning, "Pink Floyd"), vec!["Pink Floyd"]);
    }

    #[test]
    fn test_known_artist_ids() {
        let tuning = SearchTuning::default();

        assert_eq!(known_artist_ids(&tuning, "Yzomandias"), vec![8183745, 1483394]);
        assert_eq!(known_artist_ids(&tuning, "PIL C"), vec![15392919]);
        assert!(known_artist_ids(&tuning, "").is_empty());
        assert!(known_artist_ids(&tuning, "Daft Punk").is_empty());
    }

    #[test]
    fn test_simplified_title() {
        let tuning = SearchTuning::default();

        assert_eq!(
            simplified_title(&tuning, "The Man and the Machine Gun"),
            Some("Man Machine".to_string())
        );
        assert_eq!(
            simplified_title(&tuning, "Na se do feat Láska"),
            Some("Láska".to_string())
        );
        assert_eq!(simplified_title(&tuning, "A B C"), None);
    }

    #[test]
    fn test_match_score() {
        assert_eq!(match_score("Čau", "cau"), 100.0);
        assert_eq!(match_score("Jazz Rap", "Jazz Rap (Remix)"), 100.0);
        assert_eq!(match_score("Dlouhá noc dnes", "Dlouha noc"), 200.0 / 3.0);
        assert_eq!(match_score("Something", "Other"), 0.0);
        assert_eq!(match_score("", "Other"), 0.0);
    }

    #[test]
    fn test_best_match() {
        let tracks = vec![track("Other Song"), track("Jazz Rap"), track("Jazz Rap")];
        let (found, score) = best_match("jazz rap", &tracks).unwrap();

        assert_eq!(found.title, "Jazz Rap");
        assert_eq!(score, 100.0);
        assert!(std::ptr::eq(found, &tracks[1]));

        assert!(best_match("Nothing Alike", &tracks).is_none());
    }
}
