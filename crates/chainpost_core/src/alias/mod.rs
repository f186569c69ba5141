//! Human-memorable identifier generation.
//!
//! # Responsibility
//! - Produce `AdjectiveNoun` codenames correlating a pickup with its later
//!   dropoff, without accounts.
//! - Produce short ref codes for map pins and randomized knot titles.
//!
//! # Invariants
//! - Codename comparison is case-insensitive everywhere.
//! - `suggest_unique` never returns a codename already present in the
//!   supplied set; it gives up after a bounded number of attempts.

use rand::Rng;

/// Attempt budget when regenerating around collisions.
pub const MAX_SUGGESTION_ATTEMPTS: usize = 100;

/// Upper bound (inclusive) for the number appended to a ref code.
const MAX_REF_NUMBER: u32 = 999;

/// Exclusive upper bound for the numeric suffix on delivery knot titles.
const TITLE_SUFFIX_BOUND: u32 = 10_000;

const ADJECTIVES: [&str; 49] = [
    "Red", "Orange", "Yellow", "Green", "Blue", "Purple", "Brown", "Magenta", "Cyan", "Olive",
    "Maroon", "Navy", "Aquamarine", "Turquoise", "Silver", "Lime", "Teal", "Indigo", "Violet",
    "Pink", "Black", "White", "Gray", "Super", "Giant", "Dire", "Dreadful", "Powerful", "Happy",
    "Cheerful", "Dull", "Dreary", "Huge", "Informative", "Desperate", "Energetic", "Popular",
    "Neo", "Futuristic", "Retro", "Spirited", "Dry", "Thoughtful", "Forgetful", "Youthful",
    "Shadow", "Moonlight", "Sun", "Star",
];

const NOUNS: [&str; 25] = [
    "Memo", "Letter", "Parcel", "Origin", "Whisper", "Shout", "Message", "Note", "Page",
    "Telegram", "Conversation", "Comms", "Postcard", "Envelope", "Chat", "Ship", "Cargo",
    "Bundle", "Cache", "Container", "Tower", "Transmitter", "Signal", "Cable", "Text",
];

/// Short package words used for pickup-point ref codes.
const REF_WORDS: [&str; 9] = [
    "memo", "letter", "parcel", "origin", "whisper", "shout", "message", "note", "page",
];

/// One candidate codename in display form, e.g. `ShadowTelegram`.
pub fn random_codename<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    format!("{adjective}{noun}")
}

/// A map-pin ref code, e.g. `origin376`.
pub fn simple_ref_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let word = REF_WORDS[rng.gen_range(0..REF_WORDS.len())];
    let number = rng.gen_range(1..=MAX_REF_NUMBER);
    format!("{word}{number}")
}

/// Title for a freshly dropped knot, e.g. `redmemo4821`.
pub fn delivery_title<R: Rng + ?Sized>(codename: &str, rng: &mut R) -> String {
    format!("{codename}{}", rng.gen_range(0..TITLE_SUFFIX_BOUND))
}

/// First generated codename not present in `existing` (case-insensitive),
/// or `None` once the attempt budget runs out.
pub fn suggest_unique<R: Rng + ?Sized>(existing: &[String], rng: &mut R) -> Option<String> {
    for _ in 0..MAX_SUGGESTION_ATTEMPTS {
        let candidate = random_codename(rng);
        let lowered = candidate.to_lowercase();
        if !existing.iter().any(|used| used.to_lowercase() == lowered) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{
        random_codename, simple_ref_code, suggest_unique, ADJECTIVES, NOUNS, REF_WORDS,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn codenames_are_adjective_noun_pairs() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let name = random_codename(&mut rng);
            assert!(ADJECTIVES.iter().any(|adj| name.starts_with(adj)));
            assert!(NOUNS.iter().any(|noun| name.ends_with(noun)));
        }
    }

    #[test]
    fn ref_codes_are_word_plus_bounded_number() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let code = simple_ref_code(&mut rng);
            let word = REF_WORDS
                .iter()
                .find(|w| code.starts_with(**w))
                .expect("ref code starts with a known word");
            let number: u32 = code[word.len()..].parse().unwrap();
            assert!((1..=999).contains(&number));
        }
    }

    #[test]
    fn suggestions_avoid_the_existing_set_case_insensitively() {
        let mut rng = StdRng::seed_from_u64(3);
        let existing: Vec<String> = (0..20)
            .map(|_| random_codename(&mut rng).to_lowercase())
            .collect();

        let mut check_rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            if let Some(suggestion) = suggest_unique(&existing, &mut check_rng) {
                assert!(!existing.contains(&suggestion.to_lowercase()));
            }
        }
    }

    #[test]
    fn exhausted_namespace_yields_none() {
        let mut all = Vec::new();
        for adjective in ADJECTIVES {
            for noun in NOUNS {
                all.push(format!("{adjective}{noun}").to_lowercase());
            }
        }
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(suggest_unique(&all, &mut rng), None);
    }
}
