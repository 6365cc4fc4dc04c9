//! Rule-based noun lemmatization.
//!
//! Reduces plural nouns to their singular form using an irregular-plural table
//! and a small set of suffix rules. Words that do not look plural are returned
//! unchanged, so verbs and adjectives pass through untouched.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static IRREGULAR: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("children", "child"),
        ("men", "man"),
        ("women", "woman"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("mice", "mouse"),
        ("geese", "goose"),
        ("oxen", "ox"),
        ("leaves", "leaf"),
        ("lives", "life"),
        ("knives", "knife"),
        ("wives", "wife"),
        ("halves", "half"),
        ("shelves", "shelf"),
        ("wolves", "wolf"),
        ("loaves", "loaf"),
        ("calves", "calf"),
        ("thieves", "thief"),
        ("selves", "self"),
        ("movies", "movie"),
        ("cookies", "cookie"),
        ("pies", "pie"),
        ("ties", "tie"),
        ("lies", "lie"),
        ("series", "series"),
        ("species", "species"),
        ("news", "news"),
        ("people", "people"),
        ("buses", "bus"),
        ("gases", "gas"),
        ("lenses", "lens"),
        ("viruses", "virus"),
        ("campuses", "campus"),
        ("bonuses", "bonus"),
        ("statuses", "status"),
        ("choruses", "chorus"),
        ("circuses", "circus"),
        ("geniuses", "genius"),
        ("census", "census"),
        ("censuses", "census"),
        ("pluses", "plus"),
        ("atlases", "atlas"),
        ("canvases", "canvas"),
        ("biases", "bias"),
        ("analyses", "analysis"),
        ("crises", "crisis"),
        ("diagnoses", "diagnosis"),
        ("theses", "thesis"),
        ("oases", "oasis"),
    ]
    .into_iter()
    .collect()
});

// Singulars that keep their `e` before the plural `s`; every other `-oes` drops `es`.
static OE_SINGULARS: &[&str] = &[
    "shoe", "horseshoe", "snowshoe", "toe", "tiptoe", "mistletoe", "canoe", "foe", "hoe", "oboe",
    "floe", "sloe", "roe", "doe", "woe", "throe",
];

/// Trait for reducing a word to its dictionary form.
pub trait Lemmatizer {
    fn lemmatize(&self, word: &str) -> String;
}

/// Noun lemmatizer driven by suffix rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixLemmatizer;

impl SuffixLemmatizer {
    pub fn new() -> Self {
        Self
    }
}

impl Lemmatizer for SuffixLemmatizer {
    fn lemmatize(&self, word: &str) -> String {
        if let Some(lemma) = IRREGULAR.get(word) {
            return lemma.to_string();
        }
        if word.chars().count() <= 3 || !word.ends_with('s') {
            return word.to_string();
        }
        if ["ss", "us", "is"].iter().any(|suffix| word.ends_with(suffix)) {
            return word.to_string();
        }

        if let Some(stem) = word.strip_suffix("ies") {
            return format!("{}y", stem);
        }
        if let Some(stem) = word.strip_suffix("oes") {
            let singular = &word[..word.len() - 1];
            if OE_SINGULARS.contains(&singular) {
                return singular.to_string();
            }
            return format!("{}o", stem);
        }
        for suffix in ["sses", "ches", "shes", "xes", "zzes"] {
            if word.ends_with(suffix) {
                return word[..word.len() - 2].to_string();
            }
        }
        word[..word.len() - 1].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lemma(word: &str) -> String {
        SuffixLemmatizer::new().lemmatize(word)
    }

    #[test]
    fn regular_plurals() {
        assert_eq!(lemma("rides"), "ride");
        assert_eq!(lemma("coasters"), "coaster");
        assert_eq!(lemma("houses"), "house");
        assert_eq!(lemma("activities"), "activity");
        assert_eq!(lemma("classes"), "class");
        assert_eq!(lemma("churches"), "church");
        assert_eq!(lemma("dishes"), "dish");
        assert_eq!(lemma("boxes"), "box");
    }

    #[test]
    fn irregular_plurals() {
        assert_eq!(lemma("children"), "child");
        assert_eq!(lemma("leaves"), "leaf");
        assert_eq!(lemma("movies"), "movie");
        assert_eq!(lemma("news"), "news");
        assert_eq!(lemma("analyses"), "analysis");
    }

    #[test]
    fn oes_plurals_drop_es_unless_the_singular_ends_in_oe() {
        assert_eq!(lemma("potatoes"), "potato");
        assert_eq!(lemma("tomatoes"), "tomato");
        assert_eq!(lemma("heroes"), "hero");
        assert_eq!(lemma("goes"), "go");
        assert_eq!(lemma("shoes"), "shoe");
        assert_eq!(lemma("horseshoes"), "horseshoe");
        assert_eq!(lemma("canoes"), "canoe");
        assert_eq!(lemma("toes"), "toe");
    }

    #[test]
    fn ses_plurals_of_us_and_is_nouns() {
        assert_eq!(lemma("buses"), "bus");
        assert_eq!(lemma("viruses"), "virus");
        assert_eq!(lemma("campuses"), "campus");
        assert_eq!(lemma("gases"), "gas");
        assert_eq!(lemma("crises"), "crisis");
        // regular `-se` nouns still only drop the s
        assert_eq!(lemma("houses"), "house");
        assert_eq!(lemma("horses"), "horse");
        assert_eq!(lemma("courses"), "course");
    }

    #[test]
    fn non_plurals_are_unchanged() {
        assert_eq!(lemma("bus"), "bus");
        assert_eq!(lemma("glass"), "glass");
        assert_eq!(lemma("campus"), "campus");
        assert_eq!(lemma("analysis"), "analysis");
        assert_eq!(lemma("running"), "running");
        assert_eq!(lemma("cedar_point"), "cedar_point");
    }
}
