use tracing::debug;

use super::loader::Document;

/// Promotional boilerplate that must never reach a chunk, summary or
/// embedding. Includes variants with separator characters interleaved to
/// defeat naive matching. Longer phrases come first so that removing a
/// shorter phrase never leaves a fragment of a longer one behind.
pub const EXCLUDED_PHRASES: &[&str] = &[
    "Ricevi una favola al giorno gratuitamente: iscriviti su https://365favole.com/",
    "R i c e v i\nu n a\nf a v o l a\na l\ng i o r n o\ng r a t u i t a m e n t e",
    "i s c r i v i t i\ns u\nh t t p s : / / 3 6 5 f a v o l e . c o m ",
    "3 6 5 f a v o l e . c o m",
    "3 6 5 f a v o l e",
    "365favole.com",
];

/// Remove every occurrence of each phrase from the text. Everything that is
/// not a denylisted phrase is preserved verbatim.
pub fn strip_phrases(text: &str, phrases: &[&str]) -> String {
    phrases
        .iter()
        .fold(text.to_string(), |acc, phrase| acc.replace(phrase, ""))
}

/// Apply the fixed denylist to every document in place, before chunking.
pub fn apply_excluded_phrases(documents: &mut [Document]) {
    for document in documents {
        let filtered = strip_phrases(&document.text, EXCLUDED_PHRASES);
        if filtered.len() != document.text.len() {
            debug!("Stripped excluded phrases from {}", document.id);
        }
        document.text = filtered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_denylisted_phrase_is_removed() {
        for phrase in EXCLUDED_PHRASES {
            let text = format!("before {phrase} after");
            let filtered = strip_phrases(&text, EXCLUDED_PHRASES);
            assert!(
                !filtered.contains(phrase),
                "phrase {phrase:?} survived filtering"
            );
            assert!(filtered.contains("before"));
            assert!(filtered.contains("after"));
        }
    }

    #[test]
    fn non_denylisted_content_is_preserved_verbatim() {
        let text = "Una volta c'era un re che aveva tre figli.";
        assert_eq!(strip_phrases(text, EXCLUDED_PHRASES), text);
    }

    #[test]
    fn repeated_occurrences_are_all_removed() {
        let text = "x 365favole.com y 365favole.com z";
        assert_eq!(strip_phrases(text, EXCLUDED_PHRASES), "x  y  z");
    }

    #[test]
    fn interleaved_variant_removal_leaves_no_fragment() {
        let text = "leggi 3 6 5 f a v o l e . c o m ora";
        let filtered = strip_phrases(text, EXCLUDED_PHRASES);
        assert!(!filtered.contains(". c o m"));
        assert!(filtered.contains("leggi"));
        assert!(filtered.contains("ora"));
    }
}
