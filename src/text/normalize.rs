use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use super::vocab::{keyword_regex, Vocabulary};

static SPACE_BEFORE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +([.,;:!?)])").unwrap());
static SPACE_AFTER_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([({\[<]) +").unwrap());
static CLOSE_NEEDS_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.,;:!?)])([^\s.,;:!?)])").unwrap());
static OPEN_NEEDS_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\s({\[<])([({\[<])").unwrap());
// URLs pass through punctuation repair unchanged.
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b[A-Za-z][A-Za-z0-9+.\-]*://[^\s"'<>]+"#).unwrap());

const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
];

/// One phrase correction. Matches case-insensitively, only where the phrase
/// is not glued to a word character on either side.
#[derive(Debug, Clone)]
struct CorrectionRule {
    re: Regex,
    replacement: String,
}

impl CorrectionRule {
    fn new(phrase: &str, replacement: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!("(?i){}", regex::escape(phrase)))?;
        Ok(CorrectionRule {
            re,
            replacement: replacement.to_string(),
        })
    }

    fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        let mut search = 0;
        while let Some(m) = self.re.find_at(text, search) {
            if is_isolated(text, m.start(), m.end()) {
                out.push_str(&text[copied..m.start()]);
                out.push_str(&self.replacement);
                copied = m.end();
                search = m.end();
            } else {
                // retry one character further on
                search = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
            }
        }
        out.push_str(&text[copied..]);
        out
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_isolated(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

/// Post-translation cleanup: keyword capitalization, phrase corrections,
/// then whitespace, punctuation, entity and URL repair.
#[derive(Debug, Clone)]
pub struct Normalizer {
    keyword_re: Option<Regex>,
    rules: Vec<CorrectionRule>,
}

impl Normalizer {
    pub fn new(vocab: &Vocabulary) -> Result<Self, regex::Error> {
        let keyword_re = keyword_regex(&vocab.building_keywords)?;
        let rules = vocab
            .corrections
            .iter()
            .filter(|(from, _)| !from.is_empty())
            .map(|(from, to)| CorrectionRule::new(from, to))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(keywords = vocab.building_keywords.len(), rules = rules.len(), "normalizer compiled");
        Ok(Normalizer { keyword_re, rules })
    }

    /// Full normalization of one piece of translated text.
    pub fn normalize(&self, text: &str) -> String {
        let text = self.capitalize_keywords(text);
        let text = self.apply_corrections(&text);
        final_cleanup(&text)
    }

    pub fn capitalize_keywords(&self, text: &str) -> String {
        let Some(re) = &self.keyword_re else {
            return text.to_string();
        };
        re.replace_all(text, |caps: &Captures| capitalize_first(&caps[0]))
            .into_owned()
    }

    pub fn apply_corrections(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, rule| rule.apply(&acc))
    }
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whitespace, punctuation, entity and URL repair. Running it twice gives the
/// same result as running it once.
pub fn final_cleanup(text: &str) -> String {
    let text = collapse_lines(text);
    let text = fix_punctuation_spacing(&text);
    let text = decode_entities(&text);
    let text = space_after_urls(&text);
    collapse_lines(&text)
}

/// Trim every line, squeeze inner whitespace, drop empty lines.
pub fn collapse_lines(text: &str) -> String {
    text.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Source-side pre-clean applied before chunking. Same line policy as the
/// post-translation pass.
pub fn clean_source(text: &str) -> String {
    collapse_lines(&text.replace("\r\n", "\n"))
}

fn fix_punctuation_spacing(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in URL_RE.find_iter(text) {
        out.push_str(&fix_punctuation_segment(&text[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&fix_punctuation_segment(&text[last..]));
    out
}

fn fix_punctuation_segment(segment: &str) -> String {
    let s = SPACE_BEFORE_CLOSE_RE.replace_all(segment, "$1");
    let s = SPACE_AFTER_OPEN_RE.replace_all(&s, "$1");
    let s = CLOSE_NEEDS_SPACE_RE.replace_all(&s, "$1 $2");
    OPEN_NEEDS_SPACE_RE.replace_all(&s, "$1 $2").into_owned()
}

fn decode_entities(text: &str) -> String {
    HTML_ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (entity, literal)| acc.replace(entity, literal))
}

fn space_after_urls(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in URL_RE.find_iter(text) {
        out.push_str(&text[last..m.end()]);
        last = m.end();
        if let Some(next) = text[m.end()..].chars().next() {
            if !next.is_whitespace() && !".,;:!?)".contains(next) {
                out.push(' ');
            }
        }
    }
    out.push_str(&text[last..]);
    out
}
