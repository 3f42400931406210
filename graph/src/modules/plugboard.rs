use crate::module::{InputPort, ModuleDefinition, OutputPort, ProcessLambda, ProcessOutput};
use crate::modules::BuiltinModule;

pub fn definition() -> ModuleDefinition {
    ModuleDefinition {
        type_name: BuiltinModule::EnigmaPlugBoard.type_name().to_string(),
        name: "Enigma Plug Board".to_string(),
        description: Some(
            "Swaps letter pairs given on `plugs` as space separated pairs, \
             e.g. plugs \"AB CD\" turns \"ABCX\" into \"BADX\"."
                .to_string(),
        ),
        inputs: vec![InputPort::new("input"), InputPort::new("plugs")],
        outputs: vec![OutputPort::new("output")],
        process: ProcessLambda::new(|_node, _ctx, inputs| {
            Ok(ProcessOutput::new(encrypt(
                inputs.text("input"),
                inputs.text("plugs"),
            )))
        }),
        ..Default::default()
    }
}

/// Tokens shorter than two characters are ignored, characters past the
/// second one are ignored. The first pair naming a letter wins.
pub fn encrypt(text: &str, plugs: &str) -> String {
    let mut swaps: Vec<(char, char)> = Vec::new();
    for token in plugs.split(' ') {
        let mut chars = token.chars().map(|ch| ch.to_ascii_uppercase());
        if let (Some(a), Some(b)) = (chars.next(), chars.next()) {
            swaps.push((a, b));
            swaps.push((b, a));
        }
    }

    text.chars()
        .map(|ch| {
            if !ch.is_ascii_alphabetic() {
                return ch;
            }
            swaps
                .iter()
                .find(|(from, _)| *from == ch)
                .map_or(ch, |(_, to)| *to)
        })
        .collect()
}
