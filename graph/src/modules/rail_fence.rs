use serde_json::json;

use crate::data::{record, NodeDataExt};
use crate::module::{InputPort, ModuleDefinition, OutputPort, ProcessLambda, ProcessOutput};
use crate::modules::BuiltinModule;

pub fn definition() -> ModuleDefinition {
    ModuleDefinition {
        type_name: BuiltinModule::RailFenceCipher.type_name().to_string(),
        name: "Rail Fence Cipher".to_string(),
        description: Some(
            "Writes the text in a zig-zag over `rails` rows and reads it row by row."
                .to_string(),
        ),
        inputs: vec![InputPort::new("input")],
        outputs: vec![OutputPort::new("output")],
        default_data: record(json!({ "rails": 3 })),
        process: ProcessLambda::new(|node, ctx, inputs| {
            let text = inputs.text("input");
            let encrypted = encrypt(text, node.data.i64_or("rails", 3))?;

            Ok(ProcessOutput::new(encrypted)
                .with_auxiliary(ctx.node_id, record(json!({ "input": text }))))
        }),
        ..Default::default()
    }
}

pub fn encrypt(text: &str, rails: i64) -> anyhow::Result<String> {
    anyhow::ensure!(rails >= 1, "Rail count must be at least 1, got {rails}");

    // more rails than characters never changes the layout
    let rails = usize::try_from(rails)?.min(text.chars().count().max(1));
    if rails == 1 {
        return Ok(text.to_string());
    }

    let mut rows = vec![String::new(); rails];
    let cycle = 2 * (rails - 1);
    for (idx, ch) in text.chars().enumerate() {
        let step = idx % cycle;
        let row = if step < rails { step } else { cycle - step };
        rows[row].push(ch);
    }

    Ok(rows.concat())
}
