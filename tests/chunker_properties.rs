//! Property tests for sentence-aware chunking.

use proptest::prelude::*;
use ragrelay::document::chunk_text;

fn without_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Text made of short words, sentence terminals, blank runs and some multi-byte letters.
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Zéü日本 .\n\t]{0,400}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn chunks_reconstruct_the_source(text in arb_text(), max in 1usize..80) {
        let chunks = chunk_text(&text, max);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        prop_assert_eq!(without_whitespace(&joined), without_whitespace(&text));
    }

    #[test]
    fn chunks_respect_the_length_limit(text in arb_text(), max in 1usize..80) {
        for chunk in chunk_text(&text, max) {
            prop_assert!(chunk.text.chars().count() <= max);
            prop_assert!(!chunk.text.is_empty());
            prop_assert_eq!(chunk.text.trim(), chunk.text.as_str());
        }
    }

    #[test]
    fn indices_are_contiguous_and_total_is_constant(text in arb_text(), max in 1usize..80) {
        let chunks = chunk_text(&text, max);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.chunk_index, i);
            prop_assert_eq!(chunk.total_chunks, total);
        }
    }

    #[test]
    fn chunking_is_deterministic(text in arb_text(), max in 1usize..80) {
        prop_assert_eq!(chunk_text(&text, max), chunk_text(&text, max));
    }

    #[test]
    fn complete_sentences_are_never_split(
        sentences in proptest::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,3}\\.", 1..10),
    ) {
        // one extra char for the separating space at the start of a window
        let longest = sentences.iter().map(|s| s.chars().count()).max().unwrap_or(1);
        let text = sentences.join(" ");
        for chunk in chunk_text(&text, longest + 1) {
            prop_assert!(chunk.text.ends_with('.'));
        }
    }
}
