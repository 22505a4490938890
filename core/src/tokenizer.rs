use crate::config::{StopWords, WeightingConfig, DEFAULT_TOKEN_PATTERN};
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref DEFAULT_RE: Regex = Regex::new(DEFAULT_TOKEN_PATTERN).expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref ENGLISH_STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// The part of [`WeightingConfig`] that decides how text becomes terms.
/// It is stored with every fitted model so queries are analyzed exactly like
/// the corpus was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub token_pattern: String,
    pub lowercase: bool,
    pub strip_accents: bool,
    pub stem: bool,
    pub stop_words: StopWords,
    pub ngram_range: (usize, usize),
}

impl From<&WeightingConfig> for AnalyzerConfig {
    fn from(cfg: &WeightingConfig) -> Self {
        Self {
            token_pattern: cfg.token_pattern.clone(),
            lowercase: cfg.lowercase,
            strip_accents: cfg.strip_accents,
            stem: cfg.stem,
            stop_words: cfg.stop_words.clone(),
            ngram_range: cfg.ngram_range,
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::from(&WeightingConfig::default())
    }
}

/// Compiled analyzer: normalization, regex token extraction, stop words,
/// optional stemming and word n-grams.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    pattern: Regex,
    custom_stopwords: HashSet<String>,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        let pattern = if config.token_pattern == DEFAULT_TOKEN_PATTERN {
            DEFAULT_RE.clone()
        } else {
            Regex::new(&config.token_pattern)?
        };
        let custom_stopwords = match &config.stop_words {
            StopWords::List(words) => words.iter().map(|w| normalize(w, &config)).collect(),
            _ => HashSet::new(),
        };
        Ok(Self { config, pattern, custom_stopwords })
    }

    pub fn config(&self) -> &AnalyzerConfig { &self.config }

    fn is_stopword(&self, token: &str) -> bool {
        match self.config.stop_words {
            StopWords::None => false,
            StopWords::English => ENGLISH_STOPWORDS.contains(token),
            StopWords::List(_) => self.custom_stopwords.contains(token),
        }
    }

    /// Unigram tokens in document order, after stop-word removal and stemming.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let normalized = normalize(text, &self.config);
        let mut tokens = Vec::new();
        for mat in self.pattern.find_iter(&normalized) {
            let token = mat.as_str();
            if token.is_empty() || self.is_stopword(token) { continue; }
            if self.config.stem {
                tokens.push(STEMMER.stem(token).into_owned());
            } else {
                tokens.push(token.to_string());
            }
        }
        tokens
    }

    /// All terms of `text` within the configured n-gram range; n-grams are
    /// unigrams joined by a single space.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let tokens = self.tokens(text);
        let (lo, hi) = self.config.ngram_range;
        if lo == 1 && hi == 1 {
            return tokens;
        }
        let mut terms = Vec::new();
        for n in lo..=hi.min(tokens.len()) {
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }
}

fn normalize(text: &str, config: &AnalyzerConfig) -> String {
    let mut out: String = if config.strip_accents {
        text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
    } else {
        text.nfkc().collect()
    };
    if config.lowercase {
        out = out.to_lowercase();
    }
    out
}

impl Serialize for Analyzer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.config.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Analyzer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let config = AnalyzerConfig::deserialize(deserializer)?;
        Analyzer::new(config).map_err(serde::de::Error::custom)
    }
}

/// Tokenize with the default analyzer: lowercase, split on non-alphanumeric.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    DEFAULT_RE.find_iter(&normalized).map(|m| m.as_str().to_string()).collect()
}
