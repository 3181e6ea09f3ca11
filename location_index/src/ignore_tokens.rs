//! Finds the noise words of a dataset: short tokens like "St" or "De" that
//! appear in lots of region or location names but never stand alone. The
//! query-time matcher de-weights them.

use std::collections::{HashMap, HashSet};

use crate::region::Region;

const MAX_TOKEN_LEN: usize = 5;

fn analyse_string(
    string: &str,
    counts: &mut HashMap<String, usize>,
    blacklist: &mut HashSet<String>,
) {
    let tokens: Vec<&str> = string.split_whitespace().collect();

    if tokens.len() > 1 {
        for (i, token) in tokens.iter().enumerate() {
            if token.chars().count() <= MAX_TOKEN_LEN {
                *counts.entry(token.to_string()).or_insert(0) += 1;
            }
            // Adjacent short tokens also count as a composition ("Bad Tal").
            if let Some(next) = tokens.get(i + 1) {
                if next.chars().count() <= MAX_TOKEN_LEN {
                    *counts.entry(format!("{} {}", token, next)).or_insert(0) += 1;
                }
            }
        }
    }

    // A name that *is* a short token (or a pair of them) proves the token can
    // stand alone, so it must never be ignored.
    if tokens.len() == 1 && tokens[0].chars().count() <= MAX_TOKEN_LEN {
        blacklist.insert(tokens[0].to_string());
    } else if tokens.len() == 2
        && tokens[0].chars().count() <= MAX_TOKEN_LEN
        && tokens[1].chars().count() <= MAX_TOKEN_LEN
    {
        blacklist.insert(format!("{} {}", tokens[0], tokens[1]));
    }
}

fn region_names(region: &Region, counts: &mut HashMap<String, usize>, blacklist: &mut HashSet<String>) {
    analyse_string(&region.name, counts, blacklist);
    for alias in &region.aliases {
        analyse_string(&alias.name, counts, blacklist);
    }
    for child in &region.regions {
        region_names(child, counts, blacklist);
    }
}

fn location_names(
    region: &Region,
    counts: &mut HashMap<String, usize>,
    blacklist: &mut HashSet<String>,
) {
    for poi in &region.pois {
        analyse_string(&poi.name, counts, blacklist);
    }
    for name in region.locations.keys() {
        analyse_string(name, counts, blacklist);
    }
    for child in &region.regions {
        location_names(child, counts, blacklist);
    }
}

fn frequent(counts: HashMap<String, usize>, blacklist: HashSet<String>) -> Vec<String> {
    let limit = (counts.len() / 100).max(5);
    let mut tokens: Vec<String> = counts
        .into_iter()
        .filter(|(token, count)| *count >= limit && !blacklist.contains(token))
        .map(|(token, _)| token)
        .collect();
    tokens.sort();
    tokens
}

/// Returns (region tokens, location tokens).
pub fn calculate_ignore_tokens(root: &Region) -> (Vec<String>, Vec<String>) {
    let mut counts = HashMap::new();
    let mut blacklist = HashSet::new();
    region_names(root, &mut counts, &mut blacklist);
    let region_tokens = frequent(counts, blacklist);

    let mut counts = HashMap::new();
    let mut blacklist = HashSet::new();
    location_names(root, &mut counts, &mut blacklist);
    let location_tokens = frequent(counts, blacklist);

    (region_tokens, location_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::GeoCoord;
    use map_data::ObjectFileRef;

    #[test]
    fn frequent_short_tokens_are_found() {
        let mut root = Region::root();
        let ring = vec![
            GeoCoord::new(0.0, 0.0),
            GeoCoord::new(0.0, 1.0),
            GeoCoord::new(1.0, 1.0),
            GeoCoord::new(1.0, 0.0),
        ];
        let mut region = Region::new("Test".to_string(), ObjectFileRef::area(1), vec![ring]);
        for i in 0..6 {
            region
                .locations
                .entry(format!("St Street{}", i))
                .or_default();
        }
        // "Longlane" exceeds 5 chars, never counted; "St" standing alone
        // blacklists it.
        region.locations.entry("Longlane Road".to_string()).or_default();
        root.regions.push(region);

        let (_, location_tokens) = calculate_ignore_tokens(&root);
        assert!(location_tokens.contains(&"St".to_string()));
        assert!(!location_tokens.iter().any(|t| t.contains("Longlane")));

        // Now a location named just "St" appears: the token can stand alone.
        root.regions[0].locations.entry("St".to_string()).or_default();
        let (_, location_tokens) = calculate_ignore_tokens(&root);
        assert!(!location_tokens.contains(&"St".to_string()));
    }
}
