//! In-process full-text matching.
//!
//! Understands the same query syntax as PostgreSQL's `websearch_to_tsquery`:
//! bare words must all appear, `"quoted phrases"` must appear in order,
//! `-word` must not appear, and `or` between two terms accepts either.
//! Words are compared lower-cased with a light plural fold, so `beans`
//! finds `bean`.

/// A parsed web-search query: every group must match, a group matches when
/// any of its terms does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    groups: Vec<Vec<Term>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    words: Vec<String>,
    negated: bool,
}

impl TextQuery {
    pub fn parse(input: &str) -> Self {
        let mut groups: Vec<Vec<Term>> = Vec::new();
        let mut pending_or = false;

        for (raw, quoted) in split_query(input) {
            if !quoted && raw.eq_ignore_ascii_case("or") {
                pending_or = !groups.is_empty();
                continue;
            }
            let (negated, body) = match raw.strip_prefix('-') {
                Some(rest) if !quoted => (true, rest),
                _ => (false, raw.as_str()),
            };
            let words = words(body);
            if words.is_empty() {
                continue;
            }
            let term = Term { words, negated };
            match groups.last_mut() {
                Some(group) if pending_or => group.push(term),
                _ => groups.push(vec![term]),
            }
            pending_or = false;
        }
        Self { groups }
    }

    /// Whether the query has anything to match. An empty query matches nothing.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn matches(&self, document: &str) -> bool {
        if self.is_empty() {
            return false;
        }
        let doc = words(document);
        self.groups
            .iter()
            .all(|group| group.iter().any(|term| term.matches(&doc)))
    }

    /// Relevance of `document`: occurrences of positive terms, damped by
    /// document length. Zero when nothing occurs.
    pub fn rank(&self, document: &str) -> f64 {
        let doc = words(document);
        let hits: usize = self
            .groups
            .iter()
            .flatten()
            .filter(|term| !term.negated)
            .map(|term| term.occurrences(&doc))
            .sum();
        if hits == 0 {
            return 0.0;
        }
        hits as f64 / (1.0 + ((doc.len() + 1) as f64).ln())
    }
}

impl Term {
    fn matches(&self, doc: &[String]) -> bool {
        (self.occurrences(doc) > 0) != self.negated
    }

    fn occurrences(&self, doc: &[String]) -> usize {
        if self.words.len() > doc.len() {
            return 0;
        }
        doc.windows(self.words.len())
            .filter(|window| *window == self.words.as_slice())
            .count()
    }
}

/// Split on whitespace, keeping `"..."` together. Returns `(text, quoted)`.
fn split_query(input: &str) -> Vec<(String, bool)> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                if in_quotes || !current.is_empty() {
                    out.push((std::mem::take(&mut current), in_quotes));
                }
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    out.push((std::mem::take(&mut current), false));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push((current, in_quotes));
    }
    out
}

/// Lower-cased, plural-folded words of `text`.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| fold(&w.to_lowercase()))
        .collect()
}

fn fold(word: &str) -> String {
    if word.chars().count() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// SQL `ILIKE`: `%` is any run, `_` any one character, `\` escapes.
pub fn ilike(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.to_lowercase().chars().collect();
    let pattern = compile_like(&pattern.to_lowercase());
    like_match(&value, &pattern)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    Char(char),
    One,
    Any,
}

fn compile_like(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => LikeToken::Char(chars.next().unwrap_or('\\')),
            '%' => LikeToken::Any,
            '_' => LikeToken::One,
            c => LikeToken::Char(c),
        });
    }
    tokens
}

fn like_match(value: &[char], pattern: &[LikeToken]) -> bool {
    // Greedy match with backtracking to the last `%`.
    let (mut v, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while v < value.len() {
        match pattern.get(p) {
            Some(LikeToken::Char(c)) if *c == value[v] => {
                v += 1;
                p += 1;
            }
            Some(LikeToken::One) => {
                v += 1;
                p += 1;
            }
            Some(LikeToken::Any) => {
                star = Some((p, v));
                p += 1;
            }
            _ => match star {
                Some((sp, sv)) => {
                    p = sp + 1;
                    v = sv + 1;
                    star = Some((sp, sv + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|t| *t == LikeToken::Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_words_must_match() {
        let q = TextQuery::parse("coffee beans");
        assert!(q.matches("Best coffee BEANS of 2024"));
        assert!(q.matches("a bean and some coffee"));
        assert!(!q.matches("coffee only"));
    }

    #[test]
    fn test_phrase_negation_and_or() {
        let q = TextQuery::parse("\"cold brew\" -decaf");
        assert!(q.matches("How to make cold brew at home"));
        assert!(!q.matches("brew it cold"));
        assert!(!q.matches("cold brew, decaf edition"));

        let q = TextQuery::parse("tea or coffee");
        assert!(q.matches("green tea"));
        assert!(q.matches("espresso coffee"));
        assert!(!q.matches("water"));
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let q = TextQuery::parse("  --  ");
        assert!(q.is_empty());
        assert!(!q.matches("anything"));
    }

    #[test]
    fn test_rank_prefers_more_hits() {
        let q = TextQuery::parse("coffee");
        let once = q.rank("coffee and tea and water and bread");
        let twice = q.rank("coffee and coffee and water and bread");
        assert!(twice > once);
        assert_eq!(q.rank("tea"), 0.0);
    }

    #[test]
    fn test_ilike() {
        assert!(ilike("Example.COM", "%example.com%"));
        assert!(ilike("newsletter", "news%"));
        assert!(ilike("a_b", "a\\_b"));
        assert!(!ilike("axb", "a\\_b"));
        assert!(ilike("axb", "a_b"));
        assert!(ilike("100% done", "100\\%%"));
        assert!(!ilike("news", "%letter%"));
        assert!(ilike("", "%"));
    }
}
