// Rule-based English lemmatizer: an irregular-form table, then suffix rules
// for plurals and -ed/-ing forms in the manner of Porter's step 1.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref IRREGULAR: HashMap<&'static str, &'static str> = [
        ("children", "child"), ("men", "man"), ("women", "woman"), ("people", "person"),
        ("mice", "mouse"), ("feet", "foot"), ("teeth", "tooth"), ("geese", "goose"),
        ("went", "go"), ("gone", "go"), ("made", "make"), ("said", "say"), ("paid", "pay"),
        ("sent", "send"), ("got", "get"), ("gotten", "get"), ("bought", "buy"),
        ("brought", "bring"), ("thought", "think"), ("taught", "teach"), ("caught", "catch"),
        ("found", "find"), ("told", "tell"), ("sold", "sell"), ("kept", "keep"), ("left", "leave"),
        ("meant", "mean"), ("met", "meet"), ("ran", "run"), ("began", "begin"), ("begun", "begin"),
        ("wrote", "write"), ("written", "write"), ("spoke", "speak"), ("spoken", "speak"),
        ("took", "take"), ("taken", "take"), ("gave", "give"), ("given", "give"), ("knew", "know"),
        ("known", "know"), ("saw", "see"), ("seen", "see"), ("came", "come"), ("became", "become"),
        ("felt", "feel"), ("held", "hold"), ("heard", "hear"), ("understood", "understand"),
        ("lost", "lose"), ("built", "build"), ("spent", "spend"), ("using", "use"), ("used", "use"),
        ("agreed", "agree"), ("freed", "free"), ("won", "win"), ("chose", "choose"),
        ("chosen", "choose"), ("forgot", "forget"), ("forgotten", "forget"), ("hung", "hang"),
    ]
    .into_iter()
    .collect();
}

/// Nouns that merely look like -ing forms.
const ING_NOUNS: &[&str] = &[
    "morning", "evening", "meeting", "building", "wedding", "nothing", "something", "anything",
    "everything", "ceiling", "pudding", "feeling", "sibling",
];

pub fn lemmatize(word: &str) -> String {
    if let Some(lemma) = IRREGULAR.get(word) {
        return (*lemma).to_string();
    }
    if ING_NOUNS.contains(&word) || !word.is_ascii() {
        return word.to_string();
    }

    let len = word.len();

    if len > 4 && (word.ends_with("ies") || word.ends_with("ied")) {
        return format!("{}y", &word[..len - 3]);
    }
    if word.ends_with("sses") || ["xes", "ches", "shes", "zzes"].iter().any(|s| word.ends_with(s)) {
        return word[..len - 2].to_string();
    }
    if word.ends_with("eed") {
        return word.to_string();
    }
    if len > 4 && word.ends_with("ing") {
        let stem = &word[..len - 3];
        if has_vowel(stem) {
            return restore_stem(stem);
        }
        return word.to_string();
    }
    if len > 4 && word.ends_with("ed") {
        let stem = &word[..len - 2];
        if has_vowel(stem) {
            return restore_stem(stem);
        }
        return word.to_string();
    }
    if len > 3
        && word.ends_with('s')
        && !["ss", "us", "is"].iter().any(|s| word.ends_with(s))
    {
        return word[..len - 1].to_string();
    }

    word.to_string()
}

/// Repairs a stem after -ed/-ing removal: `updat` -> `update`,
/// `stopp` -> `stop`, `hop` -> `hope`.
fn restore_stem(stem: &str) -> String {
    let bytes = stem.as_bytes();
    let n = bytes.len();

    if stem.ends_with("at") || stem.ends_with("bl") || stem.ends_with("iz") {
        return format!("{stem}e");
    }
    if n >= 2
        && bytes[n - 1] == bytes[n - 2]
        && is_consonant(bytes, n - 1)
        && !matches!(bytes[n - 1], b'l' | b's' | b'z')
    {
        return stem[..n - 1].to_string();
    }
    if measure(bytes) == 1 && ends_cvc(bytes) {
        return format!("{stem}e");
    }
    stem.to_string()
}

fn is_consonant(word: &[u8], i: usize) -> bool {
    match word[i] {
        b'a' | b'e' | b'i' | b'o' | b'u' => false,
        b'y' => i == 0 || !is_consonant(word, i - 1),
        _ => true,
    }
}

fn has_vowel(stem: &str) -> bool {
    let bytes = stem.as_bytes();
    (0..bytes.len()).any(|i| !is_consonant(bytes, i))
}

/// Number of vowel-consonant sequences in the word.
fn measure(word: &[u8]) -> usize {
    let mut m = 0;
    let mut previous_vowel = false;
    for i in 0..word.len() {
        let vowel = !is_consonant(word, i);
        if previous_vowel && !vowel {
            m += 1;
        }
        previous_vowel = vowel;
    }
    m
}

fn ends_cvc(word: &[u8]) -> bool {
    let n = word.len();
    n >= 3
        && is_consonant(word, n - 3)
        && !is_consonant(word, n - 2)
        && is_consonant(word, n - 1)
        && !matches!(word[n - 1], b'w' | b'x' | b'y')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plurals() {
        assert_eq!(lemmatize("companies"), "company");
        assert_eq!(lemmatize("boxes"), "box");
        assert_eq!(lemmatize("classes"), "class");
        assert_eq!(lemmatize("updates"), "update");
        assert_eq!(lemmatize("status"), "status");
        assert_eq!(lemmatize("children"), "child");
    }

    #[test]
    fn verb_forms() {
        assert_eq!(lemmatize("updated"), "update");
        assert_eq!(lemmatize("stopped"), "stop");
        assert_eq!(lemmatize("making"), "make");
        assert_eq!(lemmatize("running"), "run");
        assert_eq!(lemmatize("asked"), "ask");
        assert_eq!(lemmatize("called"), "call");
        assert_eq!(lemmatize("visited"), "visit");
        assert_eq!(lemmatize("applied"), "apply");
        assert_eq!(lemmatize("wrote"), "write");
    }

    #[test]
    fn leaves_lemmas_alone() {
        assert_eq!(lemmatize("meeting"), "meeting");
        assert_eq!(lemmatize("morning"), "morning");
        assert_eq!(lemmatize("bring"), "bring");
        assert_eq!(lemmatize("need"), "need");
        assert_eq!(lemmatize("urgent"), "urgent");
        assert_eq!(lemmatize("café"), "café");
    }
}
