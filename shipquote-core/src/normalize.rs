//! Address normalization ahead of geocoding.
//!
//! The upstream geocoder resolves several large Santiago streets poorly unless
//! they carry their `avenida` qualifier, so bare names from the list below get
//! one prepended. Streets outside the list are left alone even if they are
//! avenues, and a listed name inside an unrelated street still gets the prefix.

use std::fmt;

/// Leading words that already name a street type.
const STREET_TYPE_PREFIXES: &[&str] = &[
    "av",
    "avda",
    "avenida",
    "autopista",
    "calle",
    "callejon",
    "callejón",
    "camino",
    "carretera",
    "costanera",
    "diagonal",
    "pasaje",
    "paseo",
    "pje",
    "psje",
    "ruta",
];

/// Streets conventionally referred to as avenues.
const AVENUE_STREETS: &[&str] = &[
    "alameda",
    "americo vespucio",
    "américo vespucio",
    "andres bello",
    "andrés bello",
    "apoquindo",
    "bilbao",
    "departamental",
    "el bosque",
    "grecia",
    "independencia",
    "irarrazaval",
    "irarrázaval",
    "kennedy",
    "las condes",
    "los leones",
    "macul",
    "manquehue",
    "matta",
    "ossa",
    "pajaritos",
    "pedro de valdivia",
    "providencia",
    "recoleta",
    "santa rosa",
    "tobalaba",
    "vicuña mackenna",
    "vicuna mackenna",
    "vitacura",
];

#[derive(Debug, Clone, PartialEq, Eq)]
/// Address rewritten for geocoding and used as the cache key.
pub struct NormalizedAddress {
    street: String,
    area: String,
}

impl NormalizedAddress {
    /// Street part after normalization.
    #[must_use]
    pub fn street(&self) -> &str {
        &self.street
    }

    /// Area part after normalization.
    #[must_use]
    pub fn area(&self) -> &str {
        &self.area
    }

    /// Geocoder query text with a trailing region suffix such as `Santiago, Chile`.
    #[must_use]
    pub fn query(&self, region_suffix: &str) -> String {
        let suffix = region_suffix.trim();
        if suffix.is_empty() {
            self.to_string()
        } else {
            format!("{self}, {suffix}")
        }
    }
}

impl fmt::Display for NormalizedAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.area.is_empty() {
            formatter.write_str(&self.street)
        } else {
            write!(formatter, "{}, {}", self.street, self.area)
        }
    }
}

/// Case-fold, trim and collapse inner whitespace.
#[must_use]
pub fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalize a raw street address within `area`.
#[must_use]
pub fn normalize(raw: &str, area: &str) -> NormalizedAddress {
    let street = fold(raw);
    let street = if needs_avenue_prefix(&street) {
        format!("avenida {street}")
    } else {
        street
    };

    NormalizedAddress {
        street,
        area: fold(area),
    }
}

fn needs_avenue_prefix(street: &str) -> bool {
    !street.is_empty()
        && !has_street_type(street)
        && AVENUE_STREETS.iter().any(|name| street.contains(name))
}

fn has_street_type(street: &str) -> bool {
    let Some(first) = street.split_whitespace().next() else {
        return false;
    };
    // "av.providencia" carries the type glued to the name
    let word = first.split('.').next().unwrap_or(first);
    STREET_TYPE_PREFIXES.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_and_whitespace() {
        let normalized = normalize("  Los   Alerces 123 ", " Ñuñoa ");
        assert_eq!(normalized.to_string(), "los alerces 123, ñuñoa");
    }

    #[test]
    fn prepends_avenue_for_known_street() {
        let normalized = normalize("Providencia 1234", "Providencia");
        assert_eq!(normalized.street(), "avenida providencia 1234");
    }

    #[test]
    fn keeps_existing_street_type() {
        for raw in ["Av. Providencia 1234", "av providencia 1234", "Calle Apoquindo 10"] {
            let normalized = normalize(raw, "Providencia");
            assert!(
                !normalized.street().starts_with("avenida av"),
                "{raw} already has a street type"
            );
            assert!(
                !normalized.street().starts_with("avenida calle"),
                "{raw} already has a street type"
            );
        }
    }

    #[test]
    fn glued_abbreviation_counts_as_street_type() {
        let normalized = normalize("Av.Providencia 99", "Providencia");
        assert_eq!(normalized.street(), "av.providencia 99");
    }

    #[test]
    fn unknown_street_is_untouched() {
        let normalized = normalize("Amapolas 3959", "Providencia");
        assert_eq!(normalized.street(), "amapolas 3959");
    }

    #[test]
    fn listed_name_inside_other_street_still_gets_prefix() {
        let normalized = normalize("Nueva Providencia 2000", "Providencia");
        assert_eq!(normalized.street(), "avenida nueva providencia 2000");
    }

    #[test]
    fn query_appends_region_suffix() {
        let normalized = normalize("Amapolas 3959", "Providencia");
        assert_eq!(
            normalized.query("Santiago, Chile"),
            "amapolas 3959, providencia, Santiago, Chile"
        );
        assert_eq!(normalized.query(" "), "amapolas 3959, providencia");
    }
}
