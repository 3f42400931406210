use serde_json::json;

use crate::data::{record, NodeDataExt};
use crate::module::{InputPort, ModuleDefinition, OutputPort, ProcessLambda, ProcessOutput};
use crate::modules::{string_shift, BuiltinModule, ALPHABET, UNKNOWN_CHARACTER};

pub fn definition() -> ModuleDefinition {
    ModuleDefinition {
        type_name: BuiltinModule::Caesar.type_name().to_string(),
        name: "Caesar Cipher".to_string(),
        description: Some(
            "Shifts every upper-case letter by a fixed number of positions, \
             e.g. with shift 3 \"HELLO\" becomes \"KHOOR\"."
                .to_string(),
        ),
        inputs: vec![InputPort::new("input")],
        outputs: vec![OutputPort::new("output")],
        default_data: record(json!({ "shift": 3 })),
        process: ProcessLambda::new(|node, _ctx, inputs| {
            let shift = node.data.i64_or("shift", 0);
            let encrypted = match inputs.get("input") {
                Some(text) => encrypt(text, shift),
                None => String::new(),
            };

            Ok(ProcessOutput::new(encrypted))
        }),
        ..Default::default()
    }
}

/// Upper-case letters are shifted, lower-case letters become
/// [`UNKNOWN_CHARACTER`] and anything else passes through.
pub fn encrypt(text: &str, shift: i64) -> String {
    let shifted: Vec<char> = string_shift(ALPHABET, shift).chars().collect();

    text.chars()
        .map(|ch| match ch {
            'A'..='Z' => shifted[(ch as u8 - b'A') as usize],
            'a'..='z' => UNKNOWN_CHARACTER,
            _ => ch,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_upper_case_letters() {
        assert_eq!(encrypt("ABC", 3), "DEF");
        assert_eq!(encrypt("HELLO", 3), "KHOOR");
        assert_eq!(encrypt("XYZ", 3), "ABC");
        assert_eq!(encrypt("DEF", -3), "ABC");
        assert_eq!(encrypt("ABC", 29), "DEF");
    }

    #[test]
    fn other_characters() {
        assert_eq!(encrypt("Hi, THERE!", 1), "I?, UIFSF!");
        assert_eq!(encrypt("", 5), "");
    }
}
