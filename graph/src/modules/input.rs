use std::sync::Arc;

use serde_json::json;

use crate::data::{record, NodeData, NodeDataExt};
use crate::module::{ModuleDefinition, OutputPort, ProcessLambda, ProcessOutput};
use crate::modules::BuiltinModule;

pub fn definition() -> ModuleDefinition {
    ModuleDefinition {
        type_name: BuiltinModule::Input.type_name().to_string(),
        name: "Input".to_string(),
        description: Some(
            "Text source. While playing it emits a growing prefix of its text, \
             one character per tick."
                .to_string(),
        ),
        outputs: vec![OutputPort::new("output")],
        default_data: record(json!({
            "value": "",
            "current_value": "",
            "is_playing": false,
            "position": 0,
        })),
        process: ProcessLambda::new(|node, _ctx, _inputs| {
            let key = if node.data.bool_or("is_playing", false) {
                "current_value"
            } else {
                "value"
            };

            Ok(ProcessOutput::new(node.data.str_or(key, "")))
        }),
        on_tick: Some(Arc::new(tick)),
        ..Default::default()
    }
}

/// Advances playback by one character, starting over after the last one.
/// Does nothing while playback is stopped.
pub fn tick(data: &NodeData) -> Option<NodeData> {
    if !data.bool_or("is_playing", false) {
        return None;
    }

    let value = data.str_or("value", "");
    let len = value.chars().count() as i64;
    let position = data.i64_or("position", 0);

    let next = if position >= len { 1 } else { position + 1 };
    let current_value: String = value.chars().take(next as usize).collect();

    Some(record(json!({
        "position": next,
        "current_value": current_value,
    })))
}
