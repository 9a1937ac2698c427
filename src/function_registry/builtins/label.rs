//! Builtins over groundtruth and prediction labels.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::ValueError;
use crate::eval::{Handle, Value};
use crate::function_registry::{BoundArgs, CallEnv};
use crate::instance::{DocToken, Document, Label};

use super::{doc_of, is_content, label_of, patterns, require_doc, to_list};

fn labels(args: &BoundArgs, name: &str) -> Vec<Arc<Label>> {
    to_list(args.get(name))
        .into_iter()
        .filter_map(|item| match item {
            Value::Handle(Handle::Label(label)) => Some(label),
            _ => None,
        })
        .collect()
}

/// The prediction of the requested model, `ANCHOR` resolved first.
fn model_prediction(args: &BoundArgs, env: &CallEnv) -> Result<Arc<Label>, ValueError> {
    let model = args
        .opt_str("model")
        .and_then(|model| env.resolve_model(model))
        .ok_or_else(|| args.invalid(format!("no valid model: {}", args.get("model"))))?;
    if !args.get("predictions").truthy() {
        return Err(args.invalid("no prediction input"));
    }
    labels(args, "predictions")
        .into_iter()
        .find(|label| label.model == model)
        .ok_or_else(|| args.invalid(format!("cannot find [ model: {} ]'s predictions", model)))
}

pub fn perform(args: &BoundArgs, env: &CallEnv) -> Result<Value, ValueError> {
    let metric = args.str("perform_name")?;
    let prediction = model_prediction(args, env)?;
    Ok(Value::Number(prediction.get_perform(metric)))
}

pub fn prediction(args: &BoundArgs, env: &CallEnv) -> Result<Value, ValueError> {
    model_prediction(args, env).map(|label| Value::Handle(Handle::Label(label)))
}

/// Token span of an answer: its document's position in the context, else the
/// `span_start`/`span_end` metas.
fn answer_span(label: &Label) -> Option<(i64, i64)> {
    if let Some(doc) = &label.doc {
        if !doc.is_empty() {
            let (start, end) = doc.span();
            return Some((start as i64, end as i64));
        }
    }
    let meta = |name: &str| label.get_meta(name).and_then(Value::as_number).map(|n| n as i64);
    Some((meta("span_start")?, meta("span_end")?))
}

/// Distance between the prediction and the closest overlapping groundtruth,
/// at the left or right boundary. `get="span"` returns the tokens in between.
pub fn answer_offset(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let (pred, groundtruths, context) = (
        args.get("pred"),
        args.get("groundtruths"),
        args.get("context"),
    );
    if !pred.truthy() || !groundtruths.truthy() || !context.truthy() {
        return Err(args.invalid(format!(
            "no valid input: {}, {}, {}",
            groundtruths, pred, context
        )));
    }
    let context_doc: &Document = doc_of(context)
        .ok_or_else(|| args.invalid(format!("[ {} ] is not a document", context)))?;
    let left = args.str("direction")? == "left";
    let get_span = args.str("get")? == "span";

    let spans = |name: &str| -> Vec<(i64, i64)> {
        labels(args, name)
            .iter()
            .filter_map(|label| answer_span(label))
            .collect()
    };
    let truths = spans("groundtruths");
    let preds = spans("pred");

    let mut offsets: Vec<(i64, Option<(i64, i64)>)> = Vec::new();
    for a in &truths {
        for b in &preds {
            let no_overlap = a.1 <= b.0 || b.1 <= a.0;
            if no_overlap {
                continue;
            }
            let (idx_a, idx_b) = if left { (a.0, b.0) } else { (a.1, b.1) };
            let delta = idx_b - idx_a;
            let between = match delta {
                0 => None,
                d if d > 0 => Some((idx_a, idx_b)),
                _ => Some((idx_b, idx_a)),
            };
            offsets.push((delta, between));
        }
    }
    // stable sort keeps the first pair on ties
    offsets.sort_by_key(|(delta, _)| delta.abs());
    Ok(match offsets.first() {
        None => Value::Null,
        Some((delta, _)) if !get_span => Value::Number(*delta as f64),
        Some((_, None)) => Value::Null,
        Some((_, Some((start, end)))) => {
            let base = context_doc.offset as i64;
            let start = (start - base).max(0) as usize;
            let end = (end - base).max(0) as usize;
            Value::doc(context_doc.slice(start, end))
        }
    })
}

/// Context sentences holding the answers, moved by `shift` (a number or a
/// list). One sentence is returned bare, several as a list. Falls back to the
/// first sentence when every shifted index is out of range.
pub fn sentence(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let context = args.get("context");
    let context_doc = doc_of(context).ok_or_else(|| {
        args.invalid(format!("cannot get the sentence of an invalid context: [ {} ]", context))
    })?;
    let answers = labels(args, "answer");
    if answers.is_empty() {
        return Err(args.invalid(format!(
            "cannot get the sentence of an invalid answer: [ {} ]",
            args.get("answer")
        )));
    }
    let shifts = to_list(args.get("shift"))
        .iter()
        .map(|shift| {
            shift
                .as_number()
                .map(|n| n as i64)
                .ok_or_else(|| args.invalid(format!("[ {} ] is not a valid shift", shift)))
        })
        .collect::<Result<Vec<i64>, ValueError>>()?;

    let sentences = context_doc.sentences();
    let mut ids = BTreeSet::new();
    for answer in &answers {
        // answers outside the context sit in the first sentence
        let sid = answer_span(answer)
            .and_then(|(start, _)| usize::try_from(start).ok())
            .and_then(|start| context_doc.sentence_id(start))
            .unwrap_or(0) as i64;
        ids.extend(
            shifts
                .iter()
                .map(|shift| sid + shift)
                .filter(|id| (0..sentences.len() as i64).contains(id))
                .map(|id| id as usize),
        );
    }
    let slice = |(start, end): (usize, usize)| Value::doc(context_doc.slice(start, end));
    let mut found: Vec<Value> = ids.into_iter().map(|id| slice(sentences[id])).collect();
    Ok(match found.len() {
        0 => sentences.first().copied().map_or(Value::Null, slice),
        1 => found.remove(0),
        _ => Value::List(found),
    })
}

/// Distance from an answer to a context token sharing `lemma`.
fn lemma_distances(context: &Document, lemma: &str, (start, end): (i64, i64)) -> Vec<i64> {
    context
        .tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| token.lemma == lemma)
        .map(|(idx, _)| {
            let i = (context.offset + idx) as i64;
            if start <= i && i < end {
                0
            } else {
                (i - start).abs().min((i - end + 1).abs())
            }
        })
        .collect()
}

/// Token distance between an answer and the question's key words in the
/// context. Keys are the question's content words, or the tokens matching
/// `pattern`. Of the three keys rarest in the context, the closest one wins.
/// The minimum over all answers; null when no key occurs in the context.
pub fn dep_distance(args: &BoundArgs, env: &CallEnv) -> Result<Value, ValueError> {
    let answers = labels(args, "target");
    if answers.is_empty() {
        return Err(args.invalid(format!("[ {} ] is not an answer", args.get("target"))));
    }
    let question = require_doc(args.function(), args.get("question"))?;
    let context = require_doc(args.function(), args.get("context"))?;
    let patterns = patterns(env, args.get("pattern"))?;

    let keys: Vec<&DocToken> = if patterns.is_empty() {
        question.tokens.iter().filter(|t| is_content(t)).collect()
    } else {
        let mut ranges: Vec<(usize, usize)> =
            patterns.iter().flat_map(|p| p.find_all(question)).collect();
        ranges.sort_unstable();
        ranges
            .into_iter()
            .flat_map(|(start, end)| question.tokens.get(start..end).unwrap_or(&[]))
            .collect()
    };

    let mut best: Option<i64> = None;
    for span in answers.iter().filter_map(|answer| answer_span(answer)) {
        let mut per_key: Vec<(usize, i64)> = keys
            .iter()
            .map(|key| lemma_distances(context, &key.lemma, span))
            .filter_map(|distances| {
                let closest = distances.iter().min().copied()?;
                Some((distances.len(), closest))
            })
            .collect();
        // rarest first, then closest
        per_key.sort();
        let closest = per_key.iter().take(3).map(|(_, distance)| *distance).min();
        best = match (best, closest) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
    Ok(best.map_or(Value::Null, |distance| Value::Number(distance as f64)))
}

fn meta_of<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match value {
        Value::Handle(Handle::Label(label)) => label.get_meta(name),
        Value::Handle(Handle::Doc(doc)) => doc.get_meta(name),
        _ => None,
    }
}

pub fn question_type(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let target = args.get("target");
    meta_of(target, "question_type")
        .cloned()
        .ok_or_else(|| args.invalid(format!("[ {} ] does not have a question type", target)))
}

/// Majority answer type over all answers, each weighted by its `count` meta.
pub fn answer_type(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let target = args.get("target");
    if !target.truthy() {
        return Err(args.invalid(format!("not a valid input: {}", target)));
    }
    // (answer type, summed weight) in first-seen order
    let mut votes: Vec<(String, f64)> = Vec::new();
    for answer in to_list(target) {
        let answer_type = meta_of(&answer, "answer_type")
            .and_then(Value::as_str)
            .ok_or_else(|| args.invalid(format!("[ {} ] does not have an answer type", answer)))?;
        let weight = label_of(&answer)
            .and_then(|label| label.get_meta("count"))
            .and_then(Value::as_number)
            .map_or(1.0, |n| n.max(1.0));
        match votes.iter_mut().find(|(seen, _)| seen == answer_type) {
            Some((_, total)) => *total += weight,
            None => votes.push((answer_type.to_string(), weight)),
        }
    }
    let mut best: Option<(String, f64)> = None;
    for (answer_type, total) in votes {
        if best.as_ref().map_or(true, |(_, b)| total > *b) {
            best = Some((answer_type, total));
        }
    }
    best.map(|(answer_type, _)| Value::Str(answer_type))
        .ok_or_else(|| args.invalid("no answer type"))
}

pub fn get_meta(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let target = args.get("target");
    let name = args.str("meta_name")?;
    if !matches!(target, Value::Handle(Handle::Doc(_) | Handle::Label(_))) {
        return Err(args.invalid(format!("[ {} ] is not a target", target)));
    }
    meta_of(target, name)
        .cloned()
        .ok_or_else(|| args.invalid(format!("[ {} ] has no meta [ {} ]", target, name)))
}
