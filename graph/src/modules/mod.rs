use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, IntoStaticStr};

use crate::module::ModuleDefinition;
use crate::registry::{self, ModuleRegistry};

pub mod caesar;
pub mod compare_output;
pub mod input;
pub mod plugboard;
pub mod rail_fence;
pub mod scrambler;
pub mod scrambler_interface;
pub mod word_counter;

pub const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Replaces characters a module cannot map.
pub const UNKNOWN_CHARACTER: char = '?';

#[derive(Debug, Display, EnumIter, IntoStaticStr, Copy, Clone, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum BuiltinModule {
    Input,
    Caesar,
    EnigmaPlugBoard,
    EnigmaScrambler,
    EnigmaScramblerInterface,
    RailFenceCipher,
    WordCounter,
    CompareOutput,
}

impl BuiltinModule {
    pub fn type_name(self) -> &'static str {
        self.into()
    }

    pub fn definition(self) -> ModuleDefinition {
        match self {
            BuiltinModule::Input => input::definition(),
            BuiltinModule::Caesar => caesar::definition(),
            BuiltinModule::EnigmaPlugBoard => plugboard::definition(),
            BuiltinModule::EnigmaScrambler => scrambler::definition(),
            BuiltinModule::EnigmaScramblerInterface => scrambler_interface::definition(),
            BuiltinModule::RailFenceCipher => rail_fence::definition(),
            BuiltinModule::WordCounter => word_counter::definition(),
            BuiltinModule::CompareOutput => compare_output::definition(),
        }
    }
}

pub fn register_builtins(registry: &mut ModuleRegistry) -> registry::Result<()> {
    for module in BuiltinModule::iter() {
        registry.register(module.definition())?;
    }

    Ok(())
}

/// Rotates `text` left by `shift` characters. Negative shifts rotate right.
pub fn string_shift(text: &str, shift: i64) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return String::new();
    }

    let start = shift.rem_euclid(chars.len() as i64) as usize;
    chars[start..].iter().chain(chars[..start].iter()).collect()
}
