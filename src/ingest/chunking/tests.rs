use super::*;

fn sample_text(sentences: usize) -> String {
    (0..sentences)
        .map(|i| format!("Sentence number {i} talks about a topic in some detail."))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn short_text_is_a_single_chunk() {
    let config = SplitterConfig::default();
    let chunks = split_text("One sentence. Another sentence.", &config);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].chunk_index, 0);
    assert!(chunks[0].text.contains("One sentence."));
    assert!(chunks[0].text.contains("Another sentence."));
}

#[test]
fn empty_text_produces_no_chunks() {
    let config = SplitterConfig::default();
    assert!(split_text("", &config).is_empty());
    assert!(split_text("   \n\n  ", &config).is_empty());
}

#[test]
fn long_text_is_split_with_monotonic_indexes() {
    let config = SplitterConfig {
        chunk_size: 40,
        chunk_overlap: 5,
    };
    let chunks = split_text(&sample_text(40), &config);

    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert!(!chunk.text.trim().is_empty());
    }
}

#[test]
fn consecutive_chunks_share_the_configured_overlap() {
    let config = SplitterConfig {
        chunk_size: 40,
        chunk_overlap: 5,
    };
    let chunks = split_text(&sample_text(40), &config);
    assert!(chunks.len() > 1);

    for pair in chunks.windows(2) {
        let tail = overlap_tail(&pair[0].text, config.chunk_overlap);
        assert!(!tail.is_empty());
        assert!(
            pair[1].text.starts_with(&tail),
            "chunk {:?} does not start with the tail {:?} of its predecessor",
            pair[1].text,
            tail
        );
    }
}

#[test]
fn chunks_end_on_sentence_boundaries() {
    let config = SplitterConfig {
        chunk_size: 40,
        chunk_overlap: 0,
    };
    let chunks = split_text(&sample_text(40), &config);
    assert!(chunks.len() > 1);

    for chunk in &chunks {
        assert!(
            chunk.text.trim_end().ends_with(['.', '!', '?']),
            "chunk does not end at a sentence boundary: {:?}",
            chunk.text
        );
    }
}

#[test]
fn oversized_sentence_falls_back_to_word_splitting() {
    let config = SplitterConfig {
        chunk_size: 10,
        chunk_overlap: 0,
    };
    let giant = format!("{} end.", "word ".repeat(100));
    let chunks = split_text(&giant, &config);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.token_count <= 20, "chunk far exceeds budget");
    }
}

#[test]
fn overlap_tail_takes_trailing_words() {
    assert_eq!(overlap_tail("a b c d e", 2), "d e");
    assert_eq!(overlap_tail("a b", 5), "");
    assert_eq!(overlap_tail("a b c", 0), "");
}

#[test]
fn token_estimate_tracks_word_count() {
    assert_eq!(estimate_token_count(""), 0);
    assert_eq!(estimate_token_count("hello world"), 2);
    assert!(estimate_token_count("This is a test.") >= 5);
}
