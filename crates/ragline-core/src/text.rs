//! Shared term handling for the keyword engine and the hashing embedder.

pub const STOP_WORDS: &[&str] = &[
    "a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

pub fn is_stop_word(term: &str) -> bool { STOP_WORDS.contains(&term) }

/// Lowercased alphanumeric terms of `text`, stop words removed.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !is_stop_word(t))
        .collect()
}

/// First `max_chars` characters of `text`, for log lines.
pub fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_drop_punctuation_and_stop_words() {
        assert_eq!(terms("What is Python?"), vec!["python"]);
        assert_eq!(terms("Test-driven   development"), vec!["test", "driven", "development"]);
        assert!(terms("").is_empty());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
