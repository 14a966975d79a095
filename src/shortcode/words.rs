use rand::RngExt;

use super::random::random_alphanumeric;
use super::CodeGenerator;

const MAX_WORD_CODE_LEN: usize = 12;
const SHORT_WORD_LEN: usize = 5;
/// Collisions before the generator switches to numbered codes
const PLAIN_ATTEMPTS: u32 = 3;
const FILTER_RETRIES: usize = 10;

const ADJECTIVES: &[&str] = &[
    "blue", "red", "green", "bright", "dark", "light", "fast", "slow", "big", "small", "happy",
    "calm", "wild", "cool", "warm", "fresh", "smooth", "rough", "sharp", "soft", "quick", "lazy",
    "busy", "quiet", "loud", "deep", "high", "wide", "thin", "thick", "sweet", "sour", "hot",
    "cold", "new", "old", "young", "rich", "clean", "empty", "full", "open", "free", "easy",
    "hard", "simple", "strong", "brave", "shy", "smart", "wise", "kind", "nice", "polite",
    "funny", "lucky", "safe", "cheap", "rare", "common", "special", "golden", "silver", "tiny",
];

const NOUNS: &[&str] = &[
    "cat", "dog", "bird", "fish", "tree", "flower", "house", "car", "book", "phone", "table",
    "chair", "door", "window", "bridge", "road", "river", "mountain", "ocean", "lake", "sun",
    "moon", "star", "cloud", "rain", "snow", "fire", "water", "earth", "wind", "apple", "banana",
    "orange", "grape", "bread", "cake", "coffee", "tea", "milk", "cheese", "music", "song",
    "dance", "movie", "game", "sport", "ball", "bike", "train", "plane", "key", "box", "bag",
    "hat", "shoe", "shirt", "watch", "ring", "gift", "paper", "pen", "pencil", "brush", "paint",
    "color", "photo", "camera", "mirror", "glass", "heart", "mind", "dream", "hope", "peace",
    "joy", "smile", "laugh",
];

const VERBS: &[&str] = &[
    "run", "walk", "jump", "fly", "swim", "dance", "sing", "play", "work", "sleep", "eat",
    "drink", "read", "write", "draw", "paint", "build", "make", "create", "fix", "help", "teach",
    "learn", "think", "dream", "wish", "hope", "like", "want", "give", "take", "buy", "sell",
    "find", "win", "start", "stop", "open", "close", "push", "pull", "lift", "drop", "throw",
    "catch",
];

/// Substrings that must not appear in a generated code, even across the word boundary
const BLOCKED_SUBSTRINGS: &[&str] = &["hell", "damn", "hate", "kill", "die", "sex"];

#[derive(Debug, Clone, Copy)]
enum Pattern {
    AdjectiveNoun,
    VerbNoun,
    AdjectiveVerb,
}

/// Memorable codes built from word pairs such as `bluecat` or `quickrun`,
/// with a numeric suffix (`bluecat42`) once plain pairs start colliding.
pub struct WordCodeGenerator {
    fallback_length: usize,
}

impl WordCodeGenerator {
    pub fn new(fallback_length: usize) -> Self {
        Self {
            fallback_length: fallback_length.max(1),
        }
    }

    fn pick<'a>(words: &[&'a str], max_len: usize) -> &'a str {
        let mut rng = rand::rng();
        loop {
            let word = words[rng.random_range(0..words.len())];
            if word.len() <= max_len {
                return word;
            }
        }
    }

    fn pattern() -> Pattern {
        match rand::rng().random_range(0..3) {
            0 => Pattern::AdjectiveNoun,
            1 => Pattern::VerbNoun,
            _ => Pattern::AdjectiveVerb,
        }
    }

    fn combine(max_word_len: usize) -> String {
        let (first, second) = match Self::pattern() {
            Pattern::AdjectiveNoun => (ADJECTIVES, NOUNS),
            Pattern::VerbNoun => (VERBS, NOUNS),
            Pattern::AdjectiveVerb => (ADJECTIVES, VERBS),
        };
        format!(
            "{}{}",
            Self::pick(first, max_word_len),
            Self::pick(second, max_word_len)
        )
    }

    /// Two words, at most [`MAX_WORD_CODE_LEN`] characters
    pub fn word_code() -> String {
        let code = Self::combine(usize::MAX);
        if code.len() > MAX_WORD_CODE_LEN {
            return Self::combine(SHORT_WORD_LEN);
        }
        code
    }

    /// Two short words followed by a number in 1..=99
    pub fn numbered_code() -> String {
        let mut base = Self::word_code();
        if base.len() > 8 {
            base = Self::combine(SHORT_WORD_LEN);
        }
        let number = rand::rng().random_range(1..=99);
        format!("{base}{number}")
    }

    pub fn is_appropriate(code: &str) -> bool {
        let lower = code.to_lowercase();
        !BLOCKED_SUBSTRINGS.iter().any(|blocked| lower.contains(blocked))
    }
}

impl CodeGenerator for WordCodeGenerator {
    fn generate(&self, attempt: u32) -> String {
        for _ in 0..FILTER_RETRIES {
            let code = if attempt < PLAIN_ATTEMPTS {
                Self::word_code()
            } else {
                Self::numbered_code()
            };

            if Self::is_appropriate(&code) {
                return code;
            }
        }

        random_alphanumeric(self.fallback_length)
    }

    fn name(&self) -> &'static str {
        "words"
    }
}
