use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Format version written into every envelope. Decoding any other version
/// fails with [`EnvelopeError::UnsupportedVersion`].
pub const ENVELOPE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum EnvelopeError {
    #[error("Malformed envelope: {0}")]
    Malformed(String),
    #[error("Unsupported envelope version {found}, expected {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("Envelope kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },
    #[error("Invalid envelope payload for {kind}: {message}")]
    InvalidPayload { kind: String, message: String },
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// Structured payload carried over the text channel between nodes.
pub trait EnvelopeKind: Serialize + DeserializeOwned {
    const KIND: &'static str;
}

#[derive(Debug, Serialize)]
struct EnvelopeOut<'a, T> {
    version: u32,
    kind: &'a str,
    data: &'a T,
}

#[derive(Debug, Deserialize)]
struct EnvelopeIn {
    version: u32,
    kind: String,
    data: serde_json::Value,
}

pub fn encode<T: EnvelopeKind>(payload: &T) -> Result<String> {
    let envelope = EnvelopeOut {
        version: ENVELOPE_VERSION,
        kind: T::KIND,
        data: payload,
    };

    serde_json::to_string(&envelope).map_err(|err| EnvelopeError::InvalidPayload {
        kind: T::KIND.to_string(),
        message: err.to_string(),
    })
}

pub fn decode<T: EnvelopeKind>(text: &str) -> Result<T> {
    let envelope: EnvelopeIn =
        serde_json::from_str(text).map_err(|err| EnvelopeError::Malformed(err.to_string()))?;

    if envelope.version != ENVELOPE_VERSION {
        return Err(EnvelopeError::UnsupportedVersion {
            found: envelope.version,
            supported: ENVELOPE_VERSION,
        });
    }
    if envelope.kind != T::KIND {
        return Err(EnvelopeError::KindMismatch {
            expected: T::KIND.to_string(),
            found: envelope.kind,
        });
    }

    serde_json::from_value(envelope.data).map_err(|err| EnvelopeError::InvalidPayload {
        kind: T::KIND.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        text: String,
    }

    impl EnvelopeKind for Probe {
        const KIND: &'static str = "probe";
    }

    #[test]
    fn encoded_envelope_carries_version_and_kind() -> anyhow::Result<()> {
        let encoded = encode(&Probe {
            text: "ABC".to_string(),
        })?;
        let raw: serde_json::Value = serde_json::from_str(&encoded)?;

        assert_eq!(raw["version"], 1);
        assert_eq!(raw["kind"], "probe");
        assert_eq!(raw["data"]["text"], "ABC");
        assert_eq!(decode::<Probe>(&encoded)?.text, "ABC");

        Ok(())
    }

    #[test]
    fn decode_rejects_bad_envelopes() {
        assert!(matches!(
            decode::<Probe>("not json"),
            Err(EnvelopeError::Malformed(_))
        ));
        assert!(matches!(
            decode::<Probe>(r#"{"version":2,"kind":"probe","data":{"text":""}}"#),
            Err(EnvelopeError::UnsupportedVersion { found: 2, .. })
        ));
        assert!(matches!(
            decode::<Probe>(r#"{"version":1,"kind":"other","data":{"text":""}}"#),
            Err(EnvelopeError::KindMismatch { .. })
        ));
        assert!(matches!(
            decode::<Probe>(r#"{"version":1,"kind":"probe","data":{"txt":1}}"#),
            Err(EnvelopeError::InvalidPayload { .. })
        ));
    }
}
