//! The built-in primitive functions.

mod label;
mod logic;
mod text;

use std::sync::Arc;

use crate::error::ValueError;
use crate::eval::{Handle, Value};
use crate::instance::{DocToken, Document};

use super::{CallEnv, FunctionDef, FunctionRegistry, ParamSpec, TokenPattern};

const SKIP_POS: &[&str] = &["PUNCT", "DET"];
const SKIP_TAGS: &[&str] = &["WDT", "WP", "WP$", "WRB", "BES"];

/// Registers the whole catalogue, aliases included.
pub fn register_all(registry: &FunctionRegistry) {
    let defs = vec![
        FunctionDef::new("length", vec![ParamSpec::fallback("docs", "question")], text::length),
        FunctionDef::new(
            "overlap",
            vec![
                ParamSpec::required("doc_a"),
                ParamSpec::required("doc_b"),
                ParamSpec::optional("label", "lemma"),
                ParamSpec::optional("return_token_list", false),
            ],
            text::overlap,
        ),
        FunctionDef::new(
            "perform",
            vec![
                ParamSpec::optional("model", crate::ast::ANCHOR),
                ParamSpec::required("predictions"),
                ParamSpec::required("perform_name"),
            ],
            label::perform,
        ),
        FunctionDef::new(
            "prediction",
            vec![
                ParamSpec::optional("model", crate::ast::ANCHOR),
                ParamSpec::required("predictions"),
            ],
            label::prediction,
        ),
        FunctionDef::new(
            "apply",
            vec![
                ParamSpec::required("func"),
                ParamSpec::optional("rewrite", crate::ast::SELECTED),
            ],
            logic::apply,
        ),
        FunctionDef::new(
            "has_any",
            vec![ParamSpec::required("container"), ParamSpec::required("contained")],
            logic::has_any,
        ),
        FunctionDef::new(
            "has_all",
            vec![ParamSpec::required("container"), ParamSpec::required("contained")],
            logic::has_all,
        ),
        FunctionDef::new("count", vec![ParamSpec::required("vars")], logic::count),
        FunctionDef::new("STRING", vec![ParamSpec::required("target")], text::string),
        FunctionDef::new("LABEL", vec![ParamSpec::required("target")], text::label),
        FunctionDef::new(
            "linguistic",
            vec![
                ParamSpec::required("spans"),
                ParamSpec::optional("label", "lemma"),
                ParamSpec::optional("pattern", Value::Null),
                ParamSpec::optional("get_root", false),
                ParamSpec::optional("get_most_common", false),
            ],
            text::linguistic,
        ),
        FunctionDef::new(
            "token",
            vec![
                ParamSpec::required("docs"),
                ParamSpec::optional("idxes", Value::Null),
                ParamSpec::optional("pattern", Value::Null),
            ],
            text::token,
        ),
        FunctionDef::new(
            "has_pattern",
            vec![
                ParamSpec::required("docs"),
                ParamSpec::optional("idxes", Value::Null),
                ParamSpec::optional("pattern", Value::Null),
            ],
            text::has_pattern,
        ),
        FunctionDef::new(
            "boundary_with",
            vec![
                ParamSpec::required("docs"),
                ParamSpec::required("pattern"),
                ParamSpec::optional("direction", "start"),
            ],
            text::boundary_with,
        ),
        FunctionDef::new(
            "answer_offset",
            vec![
                ParamSpec::required("pred"),
                ParamSpec::required("groundtruths"),
                ParamSpec::required("context"),
                ParamSpec::optional("direction", "left"),
                ParamSpec::optional("get", "delta"),
            ],
            label::answer_offset,
        ),
        FunctionDef::new(
            "sentence",
            vec![
                ParamSpec::required("answer"),
                ParamSpec::required("context"),
                ParamSpec::optional("shift", 0.0),
            ],
            label::sentence,
        ),
        FunctionDef::new(
            "dep_distance",
            vec![
                ParamSpec::required("target"),
                ParamSpec::required("question"),
                ParamSpec::required("context"),
                ParamSpec::optional("pattern", Value::Null),
            ],
            label::dep_distance,
        ),
        FunctionDef::new(
            "freq",
            vec![ParamSpec::required("target"), ParamSpec::required("target_type")],
            text::freq,
        ),
        FunctionDef::new(
            "question_type",
            vec![ParamSpec::required("target")],
            label::question_type,
        ),
        FunctionDef::new("answer_type", vec![ParamSpec::required("target")], label::answer_type),
        FunctionDef::new("is_digit", vec![ParamSpec::required("target")], logic::is_digit),
        FunctionDef::new("digitize", vec![ParamSpec::required("target")], logic::digitize),
        FunctionDef::new(
            "truncate",
            vec![
                ParamSpec::required("value"),
                ParamSpec::optional("min_value", -1.0),
                ParamSpec::optional("max_value", 50.0),
            ],
            logic::truncate,
        ),
        FunctionDef::new("abs_num", vec![ParamSpec::required("number")], logic::abs_num),
        FunctionDef::new(
            "get_meta",
            vec![ParamSpec::required("target"), ParamSpec::required("meta_name")],
            label::get_meta,
        ),
    ];
    for def in defs {
        registry.register(None, def);
    }

    let aliases: Vec<(&str, &str, &str, Value)> = [
        "f1",
        "precision",
        "recall",
        "accuracy",
        "confidence",
        "exact_match",
    ]
    .into_iter()
    .map(|metric| ("perform", metric, "perform_name", Value::from(metric)))
    .chain(
        [
            ("LEMMA", "lemma"),
            ("POS", "pos"),
            ("TAG", "tag"),
            ("ENT_TYPE", "ent_type"),
            ("DEP", "dep"),
            ("ORTH", "orth"),
        ]
        .into_iter()
        .map(|(name, label)| ("linguistic", name, "label", Value::from(label))),
    )
    .chain([
        ("perform", "is_correct_sent", "perform_name", Value::from("sent")),
        ("boundary_with", "starts_with", "direction", Value::from("start")),
        ("boundary_with", "ends_with", "direction", Value::from("end")),
        ("answer_offset", "answer_offset_delta", "get", Value::from("delta")),
        ("answer_offset", "answer_offset_span", "get", Value::from("span")),
    ])
    .collect();
    for (base, name, param, value) in aliases {
        if let Err(e) = registry.alias(base, name, (param, value)) {
            tracing::warn!("failed to register alias {}: {}", name, e);
        }
    }
}

/// A list's items, nothing for null, or the value itself.
pub(crate) fn to_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::List(items) => items.clone(),
        other => vec![other.clone()],
    }
}

pub(crate) fn doc_of(value: &Value) -> Option<&Document> {
    match value {
        Value::Handle(handle) => handle.doc(),
        _ => None,
    }
}

pub(crate) fn require_doc<'a>(
    function: &str,
    value: &'a Value,
) -> Result<&'a Document, ValueError> {
    doc_of(value).ok_or_else(|| {
        ValueError::invalid(
            function,
            format!("[ {} ] is not a document", value),
        )
    })
}

/// Compiled patterns for a pattern argument: a string or a list of
/// alternatives. Null means no pattern.
pub(crate) fn patterns(env: &CallEnv, value: &Value) -> Result<Vec<Arc<TokenPattern>>, ValueError> {
    to_list(value)
        .iter()
        .map(|p| match p {
            Value::Str(text) => env.registry.pattern(text),
            other => Err(ValueError::invalid(
                "pattern",
                format!("[ {} ] is not a valid pattern", other),
            )),
        })
        .collect()
}

/// Spans matching any of `patterns` in the documents of `docs`. One match is
/// returned bare, otherwise a list.
pub(crate) fn match_spans(
    function: &str,
    docs: &Value,
    patterns: &[Arc<TokenPattern>],
) -> Result<Value, ValueError> {
    if !docs.truthy() {
        return Err(ValueError::invalid(function, "no document to match"));
    }
    let mut spans = Vec::new();
    for item in to_list(docs) {
        let doc = require_doc(function, &item)?;
        let mut ranges: Vec<(usize, usize)> = patterns
            .iter()
            .flat_map(|pattern| pattern.find_all(doc))
            .collect();
        ranges.sort_unstable();
        ranges.dedup();
        spans.extend(ranges.into_iter().map(|(start, end)| Value::doc(doc.slice(start, end))));
    }
    Ok(match spans.len() {
        1 => spans.remove(0),
        _ => Value::List(spans),
    })
}

/// The most frequent item, the earliest on ties.
pub(crate) fn most_common<T: PartialEq + Clone>(items: &[T]) -> Option<(T, usize)> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for item in items {
        match counts.iter_mut().find(|(seen, _)| seen == item) {
            Some((_, n)) => *n += 1,
            None => counts.push((item.clone(), 1)),
        }
    }
    let mut best: Option<(T, usize)> = None;
    for (item, n) in counts {
        if best.as_ref().map_or(true, |(_, b)| n > *b) {
            best = Some((item, n));
        }
    }
    best
}

/// Content words: no punctuation, determiners, wh-words or stop words.
pub(crate) fn is_content(token: &DocToken) -> bool {
    !SKIP_POS.contains(&token.pos.as_str())
        && !SKIP_TAGS.contains(&token.tag.as_str())
        && !token.is_stop
}

pub(crate) fn label_of(value: &Value) -> Option<&crate::instance::Label> {
    match value {
        Value::Handle(Handle::Label(label)) => Some(label),
        _ => None,
    }
}
