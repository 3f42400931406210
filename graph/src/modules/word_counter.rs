use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::data::record;
use crate::module::{InputPort, ModuleDefinition, ProcessLambda, ProcessOutput};
use crate::modules::BuiltinModule;

const TOP_WORDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
    /// Share of the input length, two decimals.
    pub percentage: String,
}

pub fn definition() -> ModuleDefinition {
    ModuleDefinition {
        type_name: BuiltinModule::WordCounter.type_name().to_string(),
        name: "Word Counter".to_string(),
        description: Some(
            "Counts space separated words and lists the most frequent ones.".to_string(),
        ),
        inputs: vec![InputPort::new("input")],
        process: ProcessLambda::new(|_node, ctx, inputs| {
            let counts = count_words(inputs.text("input"));

            Ok(ProcessOutput::new("")
                .with_auxiliary(ctx.node_id, record(json!({ "counts": counts }))))
        }),
        ..Default::default()
    }
}

/// Most frequent words first, ties in order of first appearance.
pub fn count_words(text: &str) -> Vec<WordCount> {
    let total = text.chars().count();
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for word in text.split(' ').filter(|word| !word.is_empty()) {
        match counts.iter_mut().find(|(seen, _)| *seen == word) {
            Some((_, count)) => *count += 1,
            None => counts.push((word, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .take(TOP_WORDS)
        .map(|(word, count)| WordCount {
            word: word.to_string(),
            count,
            percentage: format!("{:.2}", count as f64 / total as f64 * 100.0),
        })
        .collect()
}
