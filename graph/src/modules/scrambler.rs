use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::data::{record, NodeData, NodeDataExt};
use crate::envelope::{self, EnvelopeKind};
use crate::module::{ModuleDefinition, OutputPort, ProcessLambda, ProcessOutput};
use crate::modules::{string_shift, BuiltinModule, ALPHABET};

/// Rotor I of the Enigma I.
pub const DEFAULT_WIRING: &str = "EKMFLGDQVZNTOWYHXUSPAIBRCJ";

/// Settled rotor state handed to scrambler interfaces. `top[i]` is wired
/// to the letter of `bottom` at the same index; `rotate[i] == '1'` steps
/// both strips before the i-th character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScramblerSnapshot {
    pub top: String,
    pub bottom: String,
    #[serde(default)]
    pub rotate: String,
}

impl EnvelopeKind for ScramblerSnapshot {
    const KIND: &'static str = "scrambler";
}

impl ScramblerSnapshot {
    pub fn from_data(data: &NodeData) -> anyhow::Result<Self> {
        let wiring = data.str_or("wiring", DEFAULT_WIRING).to_ascii_uppercase();
        anyhow::ensure!(
            is_alphabet_permutation(&wiring),
            "Wiring must use every letter A-Z exactly once"
        );
        let position = data.i64_or("position", 0);

        Ok(Self {
            top: string_shift(&wiring, position),
            bottom: string_shift(ALPHABET, position),
            rotate: data.str_or("rotate", "").to_string(),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            is_alphabet_permutation(&self.top) && is_alphabet_permutation(&self.bottom),
            "Scrambler strips must use every letter A-Z exactly once"
        );

        Ok(())
    }
}

pub fn definition() -> ModuleDefinition {
    ModuleDefinition {
        type_name: BuiltinModule::EnigmaScrambler.type_name().to_string(),
        name: "Enigma Scrambler".to_string(),
        description: Some(
            "Rotor wiring. Publishes its settled configuration on the `scrambler` \
             port for scrambler interfaces."
                .to_string(),
        ),
        outputs: vec![OutputPort::snapshot("scrambler")],
        default_data: record(json!({
            "wiring": DEFAULT_WIRING,
            "position": 0,
            "rotate": "",
        })),
        process: ProcessLambda::new(|node, _ctx, _inputs| {
            Ok(ProcessOutput::new(snapshot(&node.data)?))
        }),
        snapshot: Some(Arc::new(snapshot)),
        ..Default::default()
    }
}

pub fn snapshot(data: &NodeData) -> anyhow::Result<String> {
    let snapshot = ScramblerSnapshot::from_data(data)?;
    Ok(envelope::encode(&snapshot)?)
}

fn is_alphabet_permutation(strip: &str) -> bool {
    let mut letters: Vec<char> = strip.chars().collect();
    letters.sort_unstable();

    letters.iter().copied().eq(ALPHABET.chars())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_shifts_strips_by_position() -> anyhow::Result<()> {
        let data = record(json!({ "wiring": DEFAULT_WIRING, "position": 1, "rotate": "01" }));
        let decoded: ScramblerSnapshot = envelope::decode(&snapshot(&data)?)?;

        assert_eq!(decoded.top, "KMFLGDQVZNTOWYHXUSPAIBRCJE");
        assert_eq!(decoded.bottom, "BCDEFGHIJKLMNOPQRSTUVWXYZA");
        assert_eq!(decoded.rotate, "01");
        decoded.validate()?;

        Ok(())
    }

    #[test]
    fn invalid_wiring_is_rejected() {
        let data = record(json!({ "wiring": "ABC" }));
        assert!(snapshot(&data).is_err());

        let data = record(json!({ "wiring": "AACDEFGHIJKLMNOPQRSTUVWXYZ" }));
        assert!(snapshot(&data).is_err());
    }
}
