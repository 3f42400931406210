use serde_json::json;

use crate::data::{record, NodeDataExt};
use crate::envelope;
use crate::module::{InputPort, ModuleDefinition, OutputPort, ProcessLambda, ProcessOutput};
use crate::modules::scrambler::ScramblerSnapshot;
use crate::modules::{BuiltinModule, ALPHABET};

pub fn definition() -> ModuleDefinition {
    ModuleDefinition {
        type_name: BuiltinModule::EnigmaScramblerInterface.type_name().to_string(),
        name: "Enigma Scrambler Interface".to_string(),
        description: Some(
            "Passes a signal through a scrambler. The Enigma uses each scrambler \
             twice, set `reverse` for the return path."
                .to_string(),
        ),
        inputs: vec![InputPort::new("scrambler"), InputPort::new("input")],
        outputs: vec![OutputPort::new("output")],
        default_data: record(json!({ "reverse": false })),
        process: ProcessLambda::new(|node, _ctx, inputs| {
            let (Some(scrambler), Some(text)) = (inputs.get("scrambler"), inputs.get("input"))
            else {
                return Ok(ProcessOutput::new(""));
            };

            let snapshot: ScramblerSnapshot = envelope::decode(scrambler)?;
            snapshot.validate()?;
            let reverse = node.data.bool_or("reverse", false);

            Ok(ProcessOutput::new(scramble(text, &snapshot, reverse)?))
        }),
        ..Default::default()
    }
}

pub fn scramble(text: &str, snapshot: &ScramblerSnapshot, reverse: bool) -> anyhow::Result<String> {
    anyhow::ensure!(
        text.chars().all(|ch| ch.is_ascii_uppercase()),
        "The ENIGMA cipher machine can only use uppercase letters."
    );

    let mut top: Vec<char> = snapshot.top.chars().collect();
    let mut bottom: Vec<char> = snapshot.bottom.chars().collect();
    if reverse {
        std::mem::swap(&mut top, &mut bottom);
    }
    let rotate: Vec<char> = snapshot.rotate.chars().collect();
    let alphabet: Vec<char> = ALPHABET.chars().collect();

    let mut encrypted = String::with_capacity(text.len());
    for (idx, ch) in text.chars().enumerate() {
        // the rotor steps before the key press is wired through
        if rotate.get(idx) == Some(&'1') {
            top.rotate_right(1);
            bottom.rotate_right(1);
        }

        let wired = top[(ch as u8 - b'A') as usize];
        if let Some(pos) = bottom.iter().position(|letter| *letter == wired) {
            encrypted.push(alphabet[pos]);
        }
    }

    Ok(encrypted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::scrambler::DEFAULT_WIRING;

    fn rotor_one(rotate: &str) -> ScramblerSnapshot {
        ScramblerSnapshot {
            top: DEFAULT_WIRING.to_string(),
            bottom: ALPHABET.to_string(),
            rotate: rotate.to_string(),
        }
    }

    #[test]
    fn forward_follows_wiring() -> anyhow::Result<()> {
        assert_eq!(scramble("ABC", &rotor_one(""), false)?, "EKM");
        assert_eq!(scramble("", &rotor_one(""), false)?, "");

        Ok(())
    }

    #[test]
    fn reverse_undoes_forward() -> anyhow::Result<()> {
        for rotate in ["", "1", "0101", "111111"] {
            let snapshot = rotor_one(rotate);
            let forward = scramble("ENIGMA", &snapshot, false)?;
            assert_eq!(scramble(&forward, &snapshot, true)?, "ENIGMA");
        }

        Ok(())
    }

    #[test]
    fn rotation_steps_before_each_marked_character() -> anyhow::Result<()> {
        // after one step the strips read "JEKM..." over "ZABC..."
        assert_eq!(scramble("AA", &rotor_one("01"), false)?, "EK");

        Ok(())
    }

    #[test]
    fn rejects_non_upper_case_input() {
        let err = scramble("Hello", &rotor_one(""), false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The ENIGMA cipher machine can only use uppercase letters."
        );
    }
}
