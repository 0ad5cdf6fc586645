//! Tokenization for the term-frequency index
//!
//! Lower-cases, splits on anything that is not alphanumeric, then drops
//! single-character tokens and a bilingual (Indonesian/English) stop-word list.

/// Function words ignored when building vectors
pub const STOP_WORDS: &[&str] = &[
    // Indonesian
    "yang", "dan", "di", "ke", "dari", "untuk", "dengan", "ini", "itu", "pada", "adalah", "juga",
    "tidak",
    // English
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does",
];

/// Whether `word` (already lower-cased) is a stop word
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Split text into index tokens, preserving order and repeats
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 1 && !is_stop_word(word))
        .map(String::from)
        .collect()
}
