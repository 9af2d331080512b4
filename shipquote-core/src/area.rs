//! Matching of a destination area against configured area keys.
//!
//! An exact match (after case folding) wins. Otherwise the first entry, in
//! table order, whose key occurs inside the area is used, so `"las condes"`
//! matches a destination area written as `"Las Condes, Santiago"`.

use crate::model::AreaOverride;
use crate::normalize::fold;
use crate::resolver::AreaDistance;

/// Table entries keyed by an area name.
pub trait AreaKeyed {
    /// The area key as configured.
    fn area_key(&self) -> &str;
}

impl AreaKeyed for AreaOverride {
    fn area_key(&self) -> &str {
        &self.area
    }
}

impl AreaKeyed for AreaDistance {
    fn area_key(&self) -> &str {
        &self.area
    }
}

/// Find the entry for `area` in `entries`.
pub fn match_area<'entries, T: AreaKeyed>(
    entries: &'entries [T],
    area: &str,
) -> Option<&'entries T> {
    let wanted = fold(area);
    if wanted.is_empty() {
        return None;
    }

    let keyed = || {
        entries
            .iter()
            .map(|entry| (fold(entry.area_key()), entry))
            .filter(|(key, _entry)| !key.is_empty())
    };

    keyed()
        .find(|(key, _entry)| *key == wanted)
        .or_else(|| keyed().find(|(key, _entry)| wanted.contains(key.as_str())))
        .map(|(_key, entry)| entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<AreaOverride> {
        vec![
            AreaOverride::new("santiago", 3000),
            AreaOverride::new("Las Condes", 3500),
            AreaOverride::new("", 1),
            AreaOverride::new("santiago centro", 2800),
        ]
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let found = match_area(&table(), "  LAS condes ").map(|entry| entry.price);
        assert_eq!(found, Some(3500));
    }

    #[test]
    fn exact_match_beats_earlier_substring() {
        let found = match_area(&table(), "Santiago Centro").map(|entry| entry.price);
        assert_eq!(found, Some(2800));
    }

    #[test]
    fn substring_match_uses_table_order() {
        let found = match_area(&table(), "Santiago Centro Norte").map(|entry| entry.price);
        assert_eq!(found, Some(3000), "first key contained in the area wins");
    }

    #[test]
    fn blank_keys_and_areas_never_match() {
        assert!(match_area(&table(), "   ").is_none(), "blank area");
        assert!(match_area(&table(), "maipú").is_none(), "no key inside");
    }
}
