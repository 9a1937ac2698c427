//! Document and label targets as provided by the annotation and prediction
//! collaborators. The engine only reads them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::eval::Value;

fn default_whitespace() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocToken {
    pub text: String,
    #[serde(default)]
    pub lemma: String,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub ent_type: String,
    #[serde(default)]
    pub dep: String,
    /// Whether the token is followed by whitespace
    #[serde(default = "default_whitespace")]
    pub whitespace: bool,
    #[serde(default)]
    pub is_punct: bool,
    #[serde(default)]
    pub is_stop: bool,
    /// Whether the token opens a new sentence
    #[serde(default)]
    pub is_sent_start: bool,
}

impl DocToken {
    pub fn new<S: Into<String>>(text: S) -> Self {
        let text = text.into();
        let is_punct = !text.is_empty() && text.chars().all(|c| c.is_ascii_punctuation());
        Self {
            lemma: text.to_lowercase(),
            pos: if is_punct { "PUNCT".to_string() } else { String::new() },
            is_punct,
            whitespace: true,
            text,
            ..Default::default()
        }
    }

    pub fn with_tags(mut self, pos: &str, tag: &str) -> Self {
        self.pos = pos.to_string();
        self.tag = tag.to_string();
        self
    }

    pub fn with_lemma(mut self, lemma: &str) -> Self {
        self.lemma = lemma.to_string();
        self
    }

    pub fn with_ent(mut self, ent_type: &str) -> Self {
        self.ent_type = ent_type.to_string();
        self
    }

    pub fn stop(mut self) -> Self {
        self.is_stop = true;
        self
    }

    pub fn sent_start(mut self) -> Self {
        self.is_sent_start = true;
        self
    }

    /// Token feature by name. An empty lemma falls back to the lowercased text.
    pub fn feature(&self, name: &str) -> Option<String> {
        let value = match name {
            "lemma" => {
                if self.lemma.is_empty() {
                    self.text.to_lowercase()
                } else {
                    self.lemma.clone()
                }
            }
            "pos" => self.pos.clone(),
            "tag" => self.tag.clone(),
            "ent_type" => self.ent_type.clone(),
            "dep" => self.dep.clone(),
            "orth" | "text" => self.text.clone(),
            "lower" => self.text.to_lowercase(),
            _ => return None,
        };
        Some(value)
    }
}

/// Annotated token sequence. `offset` is the index of the first token within
/// the document a slice was taken from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub tokens: Vec<DocToken>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub metas: BTreeMap<String, Value>,
}

impl Document {
    pub fn new(tokens: Vec<DocToken>) -> Self {
        Self {
            tokens,
            ..Default::default()
        }
    }

    /// Whitespace-split document with lowercase lemmas. A sentence starts
    /// after every `.`, `?` or `!` token. Stands in for real annotations in
    /// tests and small tools.
    pub fn from_text(text: &str) -> Self {
        let mut tokens: Vec<DocToken> = text.split_whitespace().map(DocToken::new).collect();
        for i in 1..tokens.len() {
            if matches!(tokens[i - 1].text.as_str(), "." | "?" | "!") {
                tokens[i].is_sent_start = true;
            }
        }
        Self::new(tokens)
    }

    pub fn with_meta<S: Into<String>>(mut self, name: S, value: Value) -> Self {
        self.metas.insert(name.into(), value);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            out.push_str(&token.text);
            if token.whitespace {
                out.push(' ');
            }
        }
        out.trim_end().to_string()
    }

    /// Sub-span `[start, end)`, clamped to the document.
    pub fn slice(&self, start: usize, end: usize) -> Document {
        let end = end.min(self.tokens.len());
        let start = start.min(end);
        Document {
            tokens: self.tokens[start..end].to_vec(),
            offset: self.offset + start,
            metas: self.metas.clone(),
        }
    }

    pub fn features(&self, name: &str) -> Vec<String> {
        self.tokens
            .iter()
            .filter_map(|token| token.feature(name))
            .collect()
    }

    pub fn get_meta(&self, name: &str) -> Option<&Value> {
        self.metas.get(name)
    }

    /// Absolute token range `[start, end)` in the source document.
    pub fn span(&self) -> (usize, usize) {
        (self.offset, self.offset + self.tokens.len())
    }

    /// Sentence ranges `[start, end)` over `tokens`. The first token always
    /// opens a sentence.
    pub fn sentences(&self) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for (i, token) in self.tokens.iter().enumerate().skip(1) {
            if token.is_sent_start {
                ranges.push((start, i));
                start = i;
            }
        }
        if !self.tokens.is_empty() {
            ranges.push((start, self.tokens.len()));
        }
        ranges
    }

    /// Index of the sentence holding the absolute token `idx`.
    pub fn sentence_id(&self, idx: usize) -> Option<usize> {
        let idx = idx.checked_sub(self.offset)?;
        self.sentences()
            .iter()
            .position(|(start, end)| *start <= idx && idx < *end)
    }
}

/// A groundtruth or a model prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub model: String,
    pub text: String,
    #[serde(default)]
    pub perform: BTreeMap<String, f64>,
    #[serde(default)]
    pub doc: Option<Document>,
    #[serde(default)]
    pub metas: BTreeMap<String, Value>,
}

impl Label {
    pub fn new<M: Into<String>, T: Into<String>>(model: M, text: T) -> Self {
        Self {
            model: model.into(),
            text: text.into(),
            perform: BTreeMap::new(),
            doc: None,
            metas: BTreeMap::new(),
        }
    }

    pub fn with_perform(mut self, name: &str, score: f64) -> Self {
        self.perform.insert(name.to_string(), score);
        self
    }

    pub fn with_doc(mut self, doc: Document) -> Self {
        self.doc = Some(doc);
        self
    }

    pub fn with_meta<S: Into<String>>(mut self, name: S, value: Value) -> Self {
        self.metas.insert(name.into(), value);
        self
    }

    /// Metric by name; a metric the label does not carry reads as 0.
    pub fn get_perform(&self, name: &str) -> f64 {
        self.perform.get(name).copied().unwrap_or(0.0)
    }

    pub fn is_incorrect(&self, primary_metric: &str) -> bool {
        self.get_perform(primary_metric) < 1.0
    }

    pub fn get_meta(&self, name: &str) -> Option<&Value> {
        self.metas
            .get(name)
            .or_else(|| self.doc.as_ref().and_then(|d| d.get_meta(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_text_and_slice() {
        let doc = Document::from_text("Who wrote Hamlet ?");
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.text(), "Who wrote Hamlet ?");
        assert!(doc.tokens[3].is_punct);

        let span = doc.slice(1, 3);
        assert_eq!(span.text(), "wrote Hamlet");
        assert_eq!(span.span(), (1, 3));
        assert_eq!(doc.slice(3, 10).len(), 1);
    }

    #[test]
    fn test_token_features() {
        let token = DocToken::new("Paris").with_tags("PROPN", "NNP").with_ent("GPE");
        assert_eq!(token.feature("lemma").as_deref(), Some("paris"));
        assert_eq!(token.feature("pos").as_deref(), Some("PROPN"));
        assert_eq!(token.feature("ent_type").as_deref(), Some("GPE"));
        assert_eq!(token.feature("orth").as_deref(), Some("Paris"));
        assert_eq!(token.feature("shape"), None);
    }

    #[test]
    fn test_label_correctness() {
        let label = Label::new("bidaf", "Paris").with_perform("f1", 0.5);
        assert!(label.is_incorrect("f1"));
        assert!(label.is_incorrect("exact_match"));
        let label = label.with_perform("f1", 1.0);
        assert!(!label.is_incorrect("f1"));
    }

    #[test]
    fn test_sentences() {
        let doc = Document::from_text("Paris is big . It is in France ! Yes");
        assert_eq!(doc.sentences(), vec![(0, 4), (4, 9), (9, 10)]);
        assert_eq!(doc.sentence_id(5), Some(1));
        assert_eq!(doc.sentence_id(10), None);

        let slice = doc.slice(4, 9);
        assert_eq!(slice.sentences(), vec![(0, 5)]);
        assert_eq!(slice.sentence_id(2), None);
        assert_eq!(slice.sentence_id(6), Some(0));
        assert!(Document::new(vec![]).sentences().is_empty());
    }
}
