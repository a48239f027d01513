use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub const CHECK_MARKER_KEY: &str = "_inlook_check";
pub const REGISTRY_MARKER_KEY: &str = "_PluginRegistry";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldSchema {
    String,
    Array {
        name: Box<FieldSchema>,
        options: Option<Box<FieldSchema>>,
    },
    Object {
        properties: Vec<(String, FieldSchema)>,
    },
    Registry {
        plugin_type: String,
    },
    Unknown,
}

impl FieldSchema {
    pub fn from_value(v: &Value) -> Self {
        let Some(obj) = v.as_object() else {
            return Self::Unknown;
        };

        if let Some(plugin_type) = registry_plugin_type(obj) {
            return Self::Registry {
                plugin_type: plugin_type.to_string(),
            };
        }

        match obj.get("type").and_then(Value::as_str) {
            Some("string") => Self::String,
            Some("array") => match obj.get("items") {
                Some(items) if !items.is_null() => array_from_items(items),
                _ => Self::Unknown,
            },
            Some("object") => match obj.get("properties").and_then(Value::as_object) {
                Some(props) => Self::object_from_properties(props),
                None => Self::Unknown,
            },
            _ => Self::Unknown,
        }
    }

    pub fn from_root_value(v: &Value) -> Self {
        match v.get("properties").and_then(Value::as_object) {
            Some(props) => Self::object_from_properties(props),
            None => Self::from_value(v),
        }
    }

    fn object_from_properties(props: &Map<String, Value>) -> Self {
        Self::Object {
            properties: props
                .iter()
                .map(|(k, v)| (k.clone(), Self::from_value(v)))
                .collect(),
        }
    }

    pub fn properties(&self) -> Option<&[(String, FieldSchema)]> {
        match self {
            Self::Object { properties } => Some(properties.as_slice()),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Array { .. } => "array",
            Self::Object { .. } => "object",
            Self::Registry { .. } => "registry",
            Self::Unknown => "unknown",
        }
    }
}

fn registry_plugin_type(obj: &Map<String, Value>) -> Option<&str> {
    obj.get(CHECK_MARKER_KEY)?
        .get(REGISTRY_MARKER_KEY)?
        .as_str()
        .filter(|s| !s.is_empty())
}

fn array_from_items(items: &Value) -> FieldSchema {
    let props = items.get("properties").and_then(Value::as_object);
    let name = props
        .and_then(|p| p.get("name"))
        .map(FieldSchema::from_value)
        .unwrap_or(FieldSchema::Unknown);
    let options = props
        .and_then(|p| p.get("options"))
        .filter(|v| !v.is_null())
        .map(|v| Box::new(FieldSchema::from_value(v)));
    FieldSchema::Array {
        name: Box::new(name),
        options,
    }
}

impl<'de> Deserialize<'de> for FieldSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&v))
    }
}

pub fn deserialize_root<'de, D>(deserializer: D) -> Result<Option<FieldSchema>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.filter(|v| !v.is_null())
        .map(|v| FieldSchema::from_root_value(&v)))
}
