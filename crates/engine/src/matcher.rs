use regex::Regex;

/// Delimiters that bound a token inside a narration. Start and end of the
/// string count as boundaries too.
const TOKEN_DELIMS: &str = r"\s:/\-";

/// One configured keyword with its matcher, compiled once at rule load.
///
/// Multi-word phrases match by plain substring. Single-token terms match
/// only when delimiter-bounded, so a short indicator like `"ret"` cannot
/// fire inside `"retail"` or `"creta"`.
#[derive(Debug, Clone)]
pub struct Term {
    text: String,
    matcher: TermMatcher,
}

#[derive(Debug, Clone)]
enum TermMatcher {
    Phrase,
    Token(Regex),
}

impl Term {
    pub fn compile(raw: &str) -> Result<Term, regex::Error> {
        let text = raw.trim().to_lowercase();
        let matcher = if text.split_whitespace().count() > 1 {
            TermMatcher::Phrase
        } else {
            let pattern = format!(
                "(?:^|[{delims}]){term}(?:$|[{delims}])",
                delims = TOKEN_DELIMS,
                term = regex::escape(&text),
            );
            TermMatcher::Token(Regex::new(&pattern)?)
        };
        Ok(Term { text, matcher })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tests against an already-normalized (lower-cased) narration.
    pub fn is_match(&self, narration: &str) -> bool {
        match &self.matcher {
            TermMatcher::Phrase => narration.contains(&self.text),
            TermMatcher::Token(re) => re.is_match(narration),
        }
    }
}

pub fn contains_any(narration: &str, terms: &[Term]) -> bool {
    terms.iter().any(|t| t.is_match(narration))
}
