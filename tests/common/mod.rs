#![allow(dead_code)]

use errslice::eval::Value;
use errslice::instance::{Dataset, Document, Instance, Label};
use errslice::RegistryContext;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn predictions(scores: &[(&str, &str, f64)]) -> Value {
    Value::List(
        scores
            .iter()
            .map(|(model, text, f1)| {
                Value::label(
                    Label::new(*model, *text)
                        .with_perform("f1", *f1)
                        .with_doc(Document::from_text(text)),
                )
            })
            .collect(),
    )
}

fn qa(qid: &str, vid: u32, question: &str, context: &str, answer: &str) -> Instance {
    Instance::new(qid, vid)
        .with_entry("question", Value::doc(Document::from_text(question)))
        .with_entry("context", Value::doc(Document::from_text(context)))
        .with_entry(
            "groundtruths",
            Value::List(vec![Value::label(
                Label::new("groundtruth", answer).with_doc(Document::from_text(answer)),
            )]),
        )
}

/// Three questions and one rewritten variant, answered by `bert` and `bidaf`.
///
/// | qid | question tokens | bert | bidaf |
/// |-----|-----------------|------|-------|
/// | q1  | 7               | ok   | wrong |
/// | q2  | 4               | wrong| ok    |
/// | q3  | 6               | ok   | ok    |
/// | q2 (add_not, vid 1) | 6 | wrong | wrong |
pub fn qa_dataset() -> Dataset {
    Dataset::from_instances([
        qa(
            "q1",
            0,
            "what is the capital of france ?",
            "paris is the capital of france .",
            "paris",
        )
        .with_entry(
            "predictions",
            predictions(&[("bert", "paris", 1.0), ("bidaf", "france", 0.0)]),
        ),
        qa(
            "q2",
            0,
            "who wrote hamlet ?",
            "hamlet was written by shakespeare .",
            "shakespeare",
        )
        .with_entry(
            "predictions",
            predictions(&[("bert", "hamlet", 0.0), ("bidaf", "shakespeare", 1.0)]),
        ),
        qa(
            "q2",
            1,
            "who did not write hamlet ?",
            "hamlet was written by shakespeare .",
            "shakespeare",
        )
        .with_rid("add_not")
        .with_entry(
            "predictions",
            predictions(&[("bert", "hamlet", 0.0), ("bidaf", "hamlet", 0.0)]),
        ),
        qa(
            "q3",
            0,
            "when did the war end ?",
            "the war ended in 1945 .",
            "1945",
        )
        .with_entry(
            "predictions",
            predictions(&[("bert", "1945", 1.0), ("bidaf", "1945", 1.0)]),
        ),
    ])
}

pub fn context_with_model(model: &str) -> RegistryContext {
    let ctx = RegistryContext::default();
    ctx.set_default_model(Some(model.to_string()));
    ctx
}
