use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-node configuration record. Module specific fields live here, e.g. a
/// numeric `shift` for the Caesar module.
pub type NodeData = serde_json::Map<String, Value>;

/// Builds a record from a JSON object literal. Anything that is not an
/// object yields an empty record.
pub fn record(value: Value) -> NodeData {
    match value {
        Value::Object(map) => map,
        _ => NodeData::new(),
    }
}

/// Shallow merge, keys present in `patch` overwrite existing ones.
pub fn merge(data: &mut NodeData, patch: NodeData) {
    for (key, value) in patch {
        data.insert(key, value);
    }
}

pub trait NodeDataExt {
    fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str;
    fn i64_or(&self, key: &str, default: i64) -> i64;
    fn bool_or(&self, key: &str, default: bool) -> bool;
}

impl NodeDataExt for NodeData {
    fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).and_then(Value::as_str).unwrap_or(default)
    }

    fn i64_or(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_f64().map(|v| v as i64))
                .unwrap_or(default),
            None => default,
        }
    }

    fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortValue {
    pub port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Resolved values of a node's input ports, in declaration order.
/// `None` means nothing usable arrived: the port is unconnected or the
/// upstream node failed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortValues {
    values: Vec<PortValue>,
}

impl PortValues {
    pub fn get(&self, port: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|value| value.port == port)
            .and_then(|value| value.value.as_deref())
    }

    /// Value of `port` with the empty-string default applied.
    pub fn text(&self, port: &str) -> &str {
        self.get(port).unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values
            .iter()
            .map(|value| (value.port.as_str(), value.value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn insert(&mut self, port: impl Into<String>, value: Option<String>) {
        let port = port.into();
        match self.values.iter_mut().find(|existing| existing.port == port) {
            Some(existing) => existing.value = value,
            None => self.values.push(PortValue { port, value }),
        }
    }
}

impl<P, V> FromIterator<(P, Option<V>)> for PortValues
where
    P: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (P, Option<V>)>>(iter: T) -> Self {
        let mut values = PortValues::default();
        for (port, value) in iter {
            values.insert(port, value.map(Into::into));
        }
        values
    }
}
