//! Turns a raw message body into the token string the classifier sees.
//!
//! The steps run in a fixed order: lower-case, cut quoted replies and
//! signatures, strip ASCII punctuation and digits, split on whitespace, drop
//! stopwords and short or non-alphabetic tokens, lemmatize, rejoin.

mod lemmatizer;
mod stopwords;

pub use lemmatizer::lemmatize;
pub use stopwords::is_stopword;

/// Everything after these markers is quoted history or a signature.
const CUT_MARKERS: &[&str] = &["-----original message-----", "\n-- \n", "--\n"];

/// Normalizes `text` for classification. Blank input yields an empty string.
pub fn normalize(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let mut lowered = text.to_lowercase().trim().replace("\r\n", "\n");
    for marker in CUT_MARKERS {
        if let Some(pos) = lowered.find(marker) {
            lowered.truncate(pos);
        }
    }

    let stripped: String = lowered
        .chars()
        .filter(|c| !c.is_ascii_punctuation() && !c.is_ascii_digit())
        .collect();

    stripped
        .split_whitespace()
        .filter(|token| keep_token(token))
        .map(lemmatize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn keep_token(token: &str) -> bool {
    !is_stopword(token) && token.chars().count() > 2 && token.chars().all(char::is_alphabetic)
}
