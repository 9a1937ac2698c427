//! Token-sequence patterns used by `token`, `has_pattern` and friends.
//!
//! A pattern is a whitespace separated list of elements. Each element is an
//! atom or a parenthesized, comma separated set of alternatives:
//! `(what, which) NOUN`. `*` matches any token.

use std::fmt;

use crate::error::ValueError;
use crate::instance::{DocToken, Document};

const POS_LABELS: &[&str] = &[
    "ADJ", "ADP", "ADV", "AUX", "CCONJ", "CONJ", "DET", "INTJ", "NOUN", "NUM", "PART", "PRON",
    "PROPN", "PUNCT", "SCONJ", "SPACE", "SYM", "VERB", "X",
];

const ENT_LABELS: &[&str] = &[
    "PERSON", "NORP", "FAC", "ORG", "GPE", "LOC", "PRODUCT", "EVENT", "WORK_OF_ART", "LAW",
    "LANGUAGE", "DATE", "TIME", "PERCENT", "MONEY", "QUANTITY", "ORDINAL", "CARDINAL",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternAtom {
    Any,
    Pos(String),
    Tag(String),
    Ent(String),
    AnyEnt,
    /// Lowercased text or lemma
    Word(String),
}

impl PatternAtom {
    fn parse(word: &str) -> Self {
        if word == "*" {
            return PatternAtom::Any;
        }
        if word == "ENT" {
            return PatternAtom::AnyEnt;
        }
        if POS_LABELS.contains(&word) {
            return PatternAtom::Pos(word.to_string());
        }
        if ENT_LABELS.contains(&word) {
            return PatternAtom::Ent(word.to_string());
        }
        let is_tag = word.chars().any(|c| c.is_ascii_uppercase())
            && word.chars().all(|c| c.is_ascii_uppercase() || c == '$');
        if is_tag {
            PatternAtom::Tag(word.to_string())
        } else {
            PatternAtom::Word(word.to_lowercase())
        }
    }

    pub fn matches(&self, token: &DocToken) -> bool {
        match self {
            PatternAtom::Any => true,
            PatternAtom::Pos(pos) => token.pos == *pos,
            PatternAtom::Tag(tag) => token.tag == *tag,
            PatternAtom::Ent(ent) => token.ent_type == *ent,
            PatternAtom::AnyEnt => !token.ent_type.is_empty(),
            PatternAtom::Word(word) => {
                token.text.to_lowercase() == *word
                    || token.feature("lemma").map_or(false, |lemma| lemma == *word)
            }
        }
    }
}

impl fmt::Display for PatternAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternAtom::Any => write!(f, "*"),
            PatternAtom::AnyEnt => write!(f, "ENT"),
            PatternAtom::Pos(s)
            | PatternAtom::Tag(s)
            | PatternAtom::Ent(s)
            | PatternAtom::Word(s) => write!(f, "{}", s),
        }
    }
}

/// Compiled pattern: one set of alternatives per matched token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPattern {
    source: String,
    elements: Vec<Vec<PatternAtom>>,
}

impl TokenPattern {
    pub fn compile(source: &str) -> Result<Self, ValueError> {
        let invalid =
            |message: &str| ValueError::invalid("pattern", format!("{}: [ {} ]", message, source));
        let mut elements = Vec::new();
        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                c if c.is_whitespace() => {}
                '(' => {
                    let mut group = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            ')' => {
                                closed = true;
                                break;
                            }
                            '(' => return Err(invalid("nested alternatives")),
                            c => group.push(c),
                        }
                    }
                    if !closed {
                        return Err(invalid("unbalanced parenthesis"));
                    }
                    let alternatives: Vec<PatternAtom> = group
                        .split(',')
                        .map(str::trim)
                        .filter(|w| !w.is_empty())
                        .map(PatternAtom::parse)
                        .collect();
                    if alternatives.is_empty() {
                        return Err(invalid("empty alternatives"));
                    }
                    elements.push(alternatives);
                }
                ')' => return Err(invalid("unbalanced parenthesis")),
                c => {
                    let mut word = c.to_string();
                    while let Some(&next) = chars.peek() {
                        if next.is_whitespace() || next == '(' || next == ')' {
                            break;
                        }
                        word.push(next);
                        chars.next();
                    }
                    elements.push(vec![PatternAtom::parse(&word)]);
                }
            }
        }
        if elements.is_empty() {
            return Err(invalid("empty pattern"));
        }
        Ok(Self {
            source: source.to_string(),
            elements,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All contiguous matches as `[start, end)` token ranges, in order.
    pub fn find_all(&self, doc: &Document) -> Vec<(usize, usize)> {
        let width = self.elements.len();
        if width > doc.len() {
            return Vec::new();
        }
        (0..=doc.len() - width)
            .filter(|&start| {
                self.elements
                    .iter()
                    .zip(&doc.tokens[start..start + width])
                    .all(|(alternatives, token)| alternatives.iter().any(|a| a.matches(token)))
            })
            .map(|start| (start, start + width))
            .collect()
    }

    pub fn is_match(&self, doc: &Document) -> bool {
        !self.find_all(doc).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new(vec![
            DocToken::new("What").with_tags("PRON", "WP"),
            DocToken::new("year").with_tags("NOUN", "NN").with_ent("DATE"),
            DocToken::new("did").with_tags("AUX", "VBD").with_lemma("do"),
            DocToken::new("Paris").with_tags("PROPN", "NNP").with_ent("GPE"),
            DocToken::new("fall").with_tags("VERB", "VB"),
            DocToken::new("?"),
        ])
    }

    #[test]
    fn test_atom_kinds() {
        assert_eq!(PatternAtom::parse("NOUN"), PatternAtom::Pos("NOUN".to_string()));
        assert_eq!(PatternAtom::parse("WP$"), PatternAtom::Tag("WP$".to_string()));
        assert_eq!(PatternAtom::parse("GPE"), PatternAtom::Ent("GPE".to_string()));
        assert_eq!(PatternAtom::parse("ENT"), PatternAtom::AnyEnt);
        assert_eq!(PatternAtom::parse("What"), PatternAtom::Word("what".to_string()));
    }

    #[test]
    fn test_find_all() {
        let doc = doc();
        let pattern = TokenPattern::compile("(what, which) NOUN").unwrap();
        assert_eq!(pattern.find_all(&doc), vec![(0, 2)]);
        let pattern = TokenPattern::compile("do ENT *").unwrap();
        assert_eq!(pattern.find_all(&doc), vec![(2, 5)]);
        let pattern = TokenPattern::compile("PUNCT").unwrap();
        assert_eq!(pattern.find_all(&doc), vec![(5, 6)]);
        let pattern = TokenPattern::compile("* * * * * * *").unwrap();
        assert!(!pattern.is_match(&doc));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(TokenPattern::compile("   ").is_err());
        assert!(TokenPattern::compile("(what, which NOUN").is_err());
        assert!(TokenPattern::compile("what) NOUN").is_err());
        assert!(TokenPattern::compile("((a))").is_err());
    }
}
