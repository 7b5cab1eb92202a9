use std::collections::HashSet;

/// Black-box content acceptance predicate; the service only ever asks "is
/// this clean". Swap in a smarter implementation without touching the
/// lifecycle rules.
pub trait ContentChecker: Send + Sync {
    fn is_clean(&self, content: &str) -> bool;
}

lazy_static::lazy_static! {
    static ref DEFAULT_WORDS: HashSet<&'static str> = [
        "arse", "asshole", "bastard", "bitch", "bollocks", "bullshit",
        "crap", "cunt", "dick", "fuck", "motherfucker", "piss", "prick",
        "shit", "slut", "twat", "wanker",
    ]
    .into_iter()
    .collect();
}

/// Rejects content containing any word from a fixed list, token by token,
/// case-insensitively.
pub struct WordListChecker {
    words: HashSet<String>,
}

impl WordListChecker {
    pub fn new(words: impl IntoIterator<Item = String>) -> WordListChecker {
        WordListChecker {
            words: words.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }
}

impl Default for WordListChecker {
    fn default() -> WordListChecker {
        WordListChecker::new(DEFAULT_WORDS.iter().map(|w| String::from(*w)))
    }
}

impl ContentChecker for WordListChecker {
    fn is_clean(&self, content: &str) -> bool {
        content
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .all(|w| !self.words.contains(&w.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_list_checker_matches_whole_tokens() {
        let checker = WordListChecker::default();
        assert!(checker.is_clean("a perfectly nice comment"));
        assert!(!checker.is_clean("well SHIT, that went poorly"));
        // words embedded in longer tokens are not matched
        assert!(checker.is_clean("the Scunthorpe problem"));
    }

    #[test]
    fn custom_lists_are_honored() {
        let checker = WordListChecker::new([String::from("Voldemort")]);
        assert!(!checker.is_clean("he said voldemort!"));
        assert!(checker.is_clean("he who must not be named"));
    }
}
