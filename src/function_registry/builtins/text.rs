//! Document level builtins: sizes, overlaps, token slicing and linguistic
//! features.

use std::collections::BTreeSet;

use crate::error::ValueError;
use crate::eval::Value;
use crate::function_registry::{BoundArgs, CallEnv};
use crate::instance::{DocToken, Document};

use super::{
    doc_of, is_content, label_of, match_spans, most_common, patterns, require_doc, to_list,
};

const NOT_INCLUDE_POS: &[&str] = &[
    "ADP", "IN", "RP", "RB", "DET", "CONJ", "PUNCT", "CCONJ", "PART", "SCONJ", "SYM",
];

fn doc_len(value: &Value) -> usize {
    doc_of(value).map_or(0, Document::len)
}

/// Token count; the shortest document for a list.
pub fn length(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let docs = args.get("docs");
    match docs {
        Value::Null => Err(args.invalid("no valid input")),
        Value::List(items) if !items.is_empty() => {
            Ok(Value::from(items.iter().map(doc_len).min().unwrap_or(0)))
        }
        Value::List(_) => Ok(Value::from(0usize)),
        Value::Handle(_) => Ok(Value::from(doc_len(docs))),
        other => Err(args.invalid(format!("[ {} ] is not a document", other))),
    }
}

fn docs_in<'a>(function: &str, value: &'a Value) -> Result<Vec<&'a Document>, ValueError> {
    match value {
        Value::List(items) => items.iter().map(|item| require_doc(function, item)).collect(),
        other => Ok(vec![require_doc(function, other)?]),
    }
}

/// Share of `doc_a`'s content features that also occur in `doc_b`.
pub fn overlap(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let return_list = args.flag("return_token_list");
    let (doc_a, doc_b) = (args.get("doc_a"), args.get("doc_b"));
    if !doc_a.truthy() || !doc_b.truthy() {
        return Ok(if return_list {
            Value::List(Vec::new())
        } else {
            Value::Number(0.0)
        });
    }
    let label = args.str("label")?;
    let sents_a = docs_in(args.function(), doc_a)?;
    let sents_b = docs_in(args.function(), doc_b)?;

    let content = |token: &DocToken| {
        token
            .feature(label)
            .filter(|f| !f.is_empty())
            .and_then(|_| token.feature("lemma"))
    };
    let mut best_ratio = 0.0;
    let mut best_shared: Vec<String> = Vec::new();
    for a in &sents_a {
        let query: BTreeSet<String> = a
            .tokens
            .iter()
            .filter(|t| is_content(t))
            .filter_map(content)
            .collect();
        for b in &sents_b {
            let source: BTreeSet<String> = b.tokens.iter().filter_map(content).collect();
            let shared: Vec<String> = query.intersection(&source).cloned().collect();
            if !query.is_empty() {
                let ratio = shared.len() as f64 / query.len() as f64;
                if ratio > best_ratio {
                    best_ratio = ratio;
                }
            }
            if shared.len() > best_shared.len() {
                best_shared = shared;
            }
        }
    }
    Ok(if return_list {
        Value::from(best_shared)
    } else {
        Value::Number(best_ratio)
    })
}

/// Text of a document or label; the first one for a list.
pub fn string(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let target = args.get("target");
    if !target.truthy() {
        return Err(args.invalid(format!("no valid input: {}", target)));
    }
    let first = to_list(target).into_iter().next().unwrap_or_default();
    match first {
        Value::Handle(handle) => Ok(Value::Str(handle.text())),
        Value::Str(s) => Ok(Value::Str(s)),
        other => Err(args.invalid(format!("[ {} ] has no text", other))),
    }
}

pub fn label(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let target = args.get("target");
    if !target.truthy() {
        return Err(args.invalid(format!("no valid input: {}", target)));
    }
    let first = to_list(target).into_iter().next().unwrap_or_default();
    label_of(&first)
        .map(|label| Value::Str(label.text.clone()))
        .ok_or_else(|| args.invalid(format!("[ {} ] is not a label", first)))
}

fn root_token(doc: &Document) -> Option<&DocToken> {
    doc.tokens
        .iter()
        .find(|t| t.dep == "ROOT")
        .or_else(|| doc.tokens.first())
}

fn feature_of(token: &DocToken, label: &str) -> Value {
    token.feature(label).map(Value::Str).unwrap_or_default()
}

struct Linguistic<'a> {
    label: &'a str,
    get_root: bool,
    get_most_common: bool,
}

impl Linguistic<'_> {
    fn entity(&self, doc: &Document) -> Value {
        if doc.is_empty() {
            return Value::Null;
        }
        if self.get_root || doc.len() == 1 {
            return match root_token(doc) {
                Some(token) if !token.ent_type.is_empty() => Value::Str(token.ent_type.clone()),
                _ => Value::Null,
            };
        }
        let ents: Vec<String> = doc.features("ent_type");
        if !self.get_most_common {
            return Value::from(ents);
        }
        let named: Vec<String> = ents.into_iter().filter(|e| !e.is_empty()).collect();
        match most_common(&named) {
            Some((ent, n)) if n as f64 >= doc.len() as f64 * 0.5 => Value::Str(ent),
            _ => Value::Null,
        }
    }

    fn feature(&self, doc: &Document) -> Value {
        if doc.is_empty() {
            return Value::Null;
        }
        if doc.len() == 1 || self.get_root {
            return root_token(doc).map_or(Value::Null, |t| feature_of(t, self.label));
        }
        let filtered: Vec<&DocToken> = doc
            .tokens
            .iter()
            .filter(|t| {
                !self.get_most_common
                    || (!NOT_INCLUDE_POS.contains(&t.pos.as_str())
                        && !t.is_stop
                        && t.feature(self.label).map_or(false, |f| !f.is_empty()))
            })
            .collect();
        let tokens: Vec<&DocToken> = if filtered.is_empty() {
            doc.tokens.iter().collect()
        } else {
            filtered
        };
        let features: Vec<String> = tokens
            .iter()
            .filter_map(|t| t.feature(self.label))
            .collect();
        if self.get_most_common {
            most_common(&features).map_or(Value::Null, |(f, _)| Value::Str(f))
        } else {
            Value::from(features)
        }
    }

    fn apply(&self, function: &str, span: &Value) -> Result<Value, ValueError> {
        if !span.truthy() {
            return Ok(Value::Null);
        }
        let doc = require_doc(function, span)?;
        Ok(if self.label.starts_with("ent") {
            self.entity(doc)
        } else {
            self.feature(doc)
        })
    }
}

/// Linguistic feature of spans, optionally narrowed by a pattern first.
pub fn linguistic(args: &BoundArgs, env: &CallEnv) -> Result<Value, ValueError> {
    let label = args.str("label")?;
    let extractor = Linguistic {
        label,
        get_root: args.flag("get_root"),
        get_most_common: args.flag("get_most_common"),
    };
    let pattern = args.get("pattern");
    let spans = if pattern.truthy() {
        match_spans(args.function(), args.get("spans"), &patterns(env, pattern)?)?
    } else {
        args.get("spans").clone()
    };
    match &spans {
        Value::List(items) => {
            let mut features = Vec::new();
            for item in items {
                let feature = extractor.apply(args.function(), item)?;
                if feature.truthy() {
                    features.push(feature);
                }
            }
            Ok(if features.len() == 1 {
                features.remove(0)
            } else {
                Value::List(features)
            })
        }
        single => extractor.apply(args.function(), single),
    }
}

/// Index range argument: a single index `i` means `[i, i + 1]`.
fn index_range(args: &BoundArgs) -> Result<Option<(i64, i64)>, ValueError> {
    match args.get("idxes") {
        Value::Null => Ok(None),
        Value::Number(i) => Ok(Some((*i as i64, *i as i64 + 1))),
        Value::List(items) if items.len() >= 2 => {
            let bound = |v: &Value| {
                v.as_number()
                    .map(|n| n as i64)
                    .ok_or_else(|| args.invalid(format!("[ {} ] is not an index", v)))
            };
            Ok(Some((bound(&items[0])?, bound(&items[1])?)))
        }
        other => Err(args.invalid(format!("[ {} ] is not a valid index range", other))),
    }
}

/// `[start, end)` of `doc`; negative ranges count from the end and a range
/// falling outside the document selects all of it.
fn slice_doc(doc: &Document, range: Option<(i64, i64)>) -> Document {
    let Some((mut start, mut end)) = range else {
        return doc.clone();
    };
    let len = doc.len() as i64;
    if start < 0 {
        start += len;
        end += len;
    }
    let out_of_range = [start, end].iter().any(|&i| i < 0 || i > len);
    if out_of_range {
        doc.clone()
    } else {
        doc.slice(start as usize, end as usize)
    }
}

fn slice_docs(
    function: &str,
    docs: &Value,
    range: Option<(i64, i64)>,
) -> Result<Value, ValueError> {
    match docs {
        Value::List(items) => items
            .iter()
            .map(|item| Ok(Value::doc(slice_doc(require_doc(function, item)?, range))))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other => Ok(Value::doc(slice_doc(require_doc(function, other)?, range))),
    }
}

/// Sub-span by index range, then narrowed to pattern matches.
pub fn token(args: &BoundArgs, env: &CallEnv) -> Result<Value, ValueError> {
    let docs = args.get("docs");
    if !docs.truthy() {
        return Err(args.invalid("no input"));
    }
    let sliced = slice_docs(args.function(), docs, index_range(args)?)?;
    let pattern = args.get("pattern");
    if pattern.truthy() {
        match_spans(args.function(), &sliced, &patterns(env, pattern)?)
    } else {
        Ok(sliced)
    }
}

fn pattern_found(
    args: &BoundArgs,
    env: &CallEnv,
    range: Option<(i64, i64)>,
) -> Result<Value, ValueError> {
    let pattern = args.get("pattern");
    if pattern.is_null() {
        return Err(args.invalid("[ None ] is not a valid pattern"));
    }
    let docs = args.get("docs");
    if !docs.truthy() {
        return Err(args.invalid("no input"));
    }
    let compiled = patterns(env, pattern)?;
    let sliced = slice_docs(args.function(), docs, range)?;
    let found = to_list(&sliced).iter().any(|doc| {
        doc_of(doc).map_or(false, |doc| compiled.iter().any(|p| p.is_match(doc)))
    });
    Ok(Value::Bool(found))
}

pub fn has_pattern(args: &BoundArgs, env: &CallEnv) -> Result<Value, ValueError> {
    pattern_found(args, env, index_range(args)?)
}

/// Whether the pattern sits at the start or end of the document.
pub fn boundary_with(args: &BoundArgs, env: &CallEnv) -> Result<Value, ValueError> {
    let pattern = args.get("pattern");
    if pattern.is_null() {
        return Err(args.invalid("[ None ] is not a valid pattern"));
    }
    let width = patterns(env, pattern)?
        .first()
        .map_or(0, |p| p.len()) as i64;
    let range = if args.str("direction")? == "start" {
        (0, width)
    } else {
        // one extra token so trailing punctuation is covered
        (-width - 1, 0)
    };
    pattern_found(args, env, Some(range))
}

/// Lowest training frequency among the non-punctuation lemmas.
pub fn freq(args: &BoundArgs, env: &CallEnv) -> Result<Value, ValueError> {
    let target_type = args.str("target_type")?;
    let table = env
        .registry
        .frequencies(target_type)
        .ok_or_else(|| args.invalid(format!("no training frequency for [ {} ]", target_type)))?;
    let target = args.get("target");
    if !target.truthy() {
        return Err(args.invalid(format!("unknown target [ {} ]", target)));
    }
    let lowest = |doc: &Document| {
        doc.tokens
            .iter()
            .filter(|t| !(t.is_punct || t.text == "\n"))
            .map(|t| {
                t.feature("lemma")
                    .and_then(|lemma| table.get(&lemma).copied())
                    .unwrap_or(0)
            })
            .min()
            .unwrap_or(0)
    };
    let mut result: Option<u64> = None;
    for item in to_list(target) {
        let doc = require_doc(args.function(), &item)?;
        let weight = lowest(doc);
        result = Some(result.map_or(weight, |r| r.min(weight)));
    }
    Ok(Value::Number(result.unwrap_or(0) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry_context::RegistryContext;
    use pretty_assertions::assert_eq;

    fn question() -> Document {
        Document::new(vec![
            DocToken::new("Which").with_tags("DET", "WDT").stop(),
            DocToken::new("river").with_tags("NOUN", "NN"),
            DocToken::new("flows").with_tags("VERB", "VBZ").with_lemma("flow"),
            DocToken::new("through").with_tags("ADP", "IN").stop(),
            DocToken::new("Paris").with_tags("PROPN", "NNP").with_ent("GPE"),
            DocToken::new("?"),
        ])
    }

    fn context() -> Document {
        Document::new(vec![
            DocToken::new("The").with_tags("DET", "DT").stop(),
            DocToken::new("Seine").with_tags("PROPN", "NNP"),
            DocToken::new("flowed").with_tags("VERB", "VBD").with_lemma("flow"),
            DocToken::new("past").with_tags("ADP", "IN"),
            DocToken::new("Paris").with_tags("PROPN", "NNP").with_ent("GPE"),
        ])
    }

    fn call(
        f: fn(&BoundArgs, &CallEnv) -> Result<Value, ValueError>,
        args: BoundArgs,
    ) -> Result<Value, ValueError> {
        let ctx = RegistryContext::default();
        f(&args, &CallEnv::new(&ctx))
    }

    #[test]
    fn test_length() {
        let args = BoundArgs::new("length").with("docs", Value::doc(question()));
        assert_eq!(call(length, args).unwrap(), Value::Number(6.0));
        let args = BoundArgs::new("length").with(
            "docs",
            Value::List(vec![Value::doc(question()), Value::doc(context())]),
        );
        assert_eq!(call(length, args).unwrap(), Value::Number(5.0));
        assert!(call(length, BoundArgs::new("length")).is_err());
    }

    #[test]
    fn test_overlap() {
        let args = BoundArgs::new("overlap")
            .with("doc_a", Value::doc(question()))
            .with("doc_b", Value::doc(context()))
            .with("label", "lemma")
            .with("return_token_list", false);
        // content lemmas of the question: river, flow, paris
        let ratio = call(overlap, args.clone()).unwrap().as_number().unwrap();
        assert!((ratio - 2.0 / 3.0).abs() < 1e-9);

        let args = args.with("return_token_list", true);
        assert_eq!(
            call(overlap, args).unwrap(),
            Value::from(vec!["flow", "paris"])
        );
    }

    #[test]
    fn test_string_and_label() {
        let args = BoundArgs::new("STRING").with("target", Value::doc(context()));
        assert_eq!(
            call(string, args).unwrap(),
            Value::from("The Seine flowed past Paris")
        );
        let args = BoundArgs::new("LABEL").with("target", Value::doc(context()));
        assert!(matches!(
            call(label, args),
            Err(ValueError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_linguistic() {
        let args = BoundArgs::new("linguistic")
            .with("spans", Value::doc(question()))
            .with("label", "pos")
            .with("get_root", false)
            .with("get_most_common", false);
        assert_eq!(
            call(linguistic, args.clone()).unwrap(),
            Value::from(vec!["DET", "NOUN", "VERB", "ADP", "PROPN", "PUNCT"])
        );
        let args = args.with("get_most_common", true);
        assert_eq!(call(linguistic, args).unwrap(), Value::from("NOUN"));

        let args = BoundArgs::new("linguistic")
            .with("spans", Value::doc(question()))
            .with("label", "lemma")
            .with("pattern", "VERB");
        assert_eq!(call(linguistic, args).unwrap(), Value::from("flow"));
    }

    #[test]
    fn test_token_slicing() {
        let args = BoundArgs::new("token")
            .with("docs", Value::doc(question()))
            .with("idxes", Value::from(vec![-2.0, -1.0]));
        let span = call(token, args).unwrap();
        assert_eq!(span.to_string(), "Paris");

        let args = BoundArgs::new("token")
            .with("docs", Value::doc(question()))
            .with("idxes", Value::Number(40.0));
        assert_eq!(call(token, args).unwrap().to_string(), "Which river flows through Paris ?");
    }

    #[test]
    fn test_patterns() {
        let args = BoundArgs::new("has_pattern")
            .with("docs", Value::doc(question()))
            .with("pattern", "(which, what) NOUN");
        assert_eq!(call(has_pattern, args).unwrap(), Value::Bool(true));

        let starts = BoundArgs::new("starts_with")
            .with("docs", Value::doc(question()))
            .with("pattern", "which")
            .with("direction", "start");
        assert_eq!(call(boundary_with, starts).unwrap(), Value::Bool(true));

        let ends = BoundArgs::new("ends_with")
            .with("docs", Value::doc(question()))
            .with("pattern", "GPE")
            .with("direction", "end");
        assert_eq!(call(boundary_with, ends).unwrap(), Value::Bool(true));

        let missing = BoundArgs::new("has_pattern").with("docs", Value::doc(question()));
        assert!(call(has_pattern, missing).is_err());
    }

    #[test]
    fn test_freq() {
        let ctx = RegistryContext::default();
        ctx.set_frequencies(
            "question",
            [("river".to_string(), 4), ("flow".to_string(), 9)].into_iter().collect(),
        );
        let args = BoundArgs::new("freq")
            .with("target", Value::doc(question().slice(1, 3)))
            .with("target_type", "question");
        assert_eq!(
            freq(&args, &CallEnv::new(&ctx)).unwrap(),
            Value::Number(4.0)
        );
        let args = BoundArgs::new("freq")
            .with("target", Value::doc(question()))
            .with("target_type", "context");
        assert!(freq(&args, &CallEnv::new(&ctx)).is_err());
    }
}
