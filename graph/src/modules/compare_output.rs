use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::data::record;
use crate::module::{InputPort, ModuleDefinition, ProcessLambda, ProcessOutput};
use crate::modules::BuiltinModule;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareRow {
    pub a: String,
    pub b: String,
}

pub fn definition() -> ModuleDefinition {
    ModuleDefinition {
        type_name: BuiltinModule::CompareOutput.type_name().to_string(),
        name: "Compare Output".to_string(),
        description: Some("Shows `input_A` and `input_B` side by side, line by line.".to_string()),
        inputs: vec![InputPort::new("input_A"), InputPort::new("input_B")],
        process: ProcessLambda::new(|_node, ctx, inputs| {
            let rows = pair_lines(inputs.get("input_A"), inputs.get("input_B"));

            Ok(ProcessOutput::new("")
                .with_auxiliary(ctx.node_id, record(json!({ "rows": rows }))))
        }),
        ..Default::default()
    }
}

/// One row per line of `a`. Missing lines of `b` read as empty.
pub fn pair_lines(a: Option<&str>, b: Option<&str>) -> Vec<CompareRow> {
    let Some(a) = a else {
        return Vec::new();
    };
    let b_lines: Vec<&str> = b.map(|b| b.split('\n').collect()).unwrap_or_default();

    a.split('\n')
        .enumerate()
        .map(|(idx, line)| CompareRow {
            a: line.to_string(),
            b: b_lines.get(idx).copied().unwrap_or("").to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_lines_by_index() {
        let rows = pair_lines(Some("KHOOR\nZRUOG"), Some("HELLO"));

        assert_eq!(
            rows,
            [
                CompareRow {
                    a: "KHOOR".to_string(),
                    b: "HELLO".to_string()
                },
                CompareRow {
                    a: "ZRUOG".to_string(),
                    b: String::new()
                },
            ]
        );
    }

    #[test]
    fn missing_a_side_yields_no_rows() {
        assert!(pair_lines(None, Some("dog")).is_empty());
        assert_eq!(pair_lines(Some("cat"), None)[0].b, "");
    }
}
