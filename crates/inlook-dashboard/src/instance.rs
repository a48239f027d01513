use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::schema::{self, FieldSchema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceState {
    Loaded,
    Ready,
    Running,
    Failed,
    Complete,
    Unloaded,
    Other(String),
}

impl Default for InstanceState {
    fn default() -> Self {
        InstanceState::Other(String::new())
    }
}

impl InstanceState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "LOADED" => Self::Loaded,
            "READY" => Self::Ready,
            "RUNNING" => Self::Running,
            "FAILED" => Self::Failed,
            "COMPLETE" => Self::Complete,
            "UNLOADED" => Self::Unloaded,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Loaded => "LOADED",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Failed => "FAILED",
            Self::Complete => "COMPLETE",
            Self::Unloaded => "UNLOADED",
            Self::Other(s) => s.as_str(),
        }
    }

    pub fn badge(&self) -> Option<BadgeTone> {
        match self {
            Self::Loaded => Some(BadgeTone::Primary),
            Self::Ready => Some(BadgeTone::Success),
            Self::Running => Some(BadgeTone::Warning),
            Self::Failed => Some(BadgeTone::Danger),
            Self::Complete => Some(BadgeTone::Info),
            Self::Unloaded => Some(BadgeTone::Secondary),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InstanceState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| Self::parse(&s)).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTone {
    Primary,
    Success,
    Warning,
    Danger,
    Info,
    Secondary,
}

impl BadgeTone {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Primary => "bg-primary",
            Self::Success => "bg-success",
            Self::Warning => "bg-warning",
            Self::Danger => "bg-danger",
            Self::Info => "bg-info",
            Self::Secondary => "bg-secondary",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceNode {
    #[serde(rename = "instanceID", default)]
    pub instance_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub create_func: String,
    #[serde(default)]
    pub state: InstanceState,
    #[serde(default, deserialize_with = "schema::deserialize_root")]
    pub schema: Option<FieldSchema>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<InstanceNode>,
}

impl InstanceNode {
    pub fn from_json(body: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn display_name(&self) -> &str {
        self.instance_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("Root")
    }

    pub fn config_map(&self) -> Option<&Map<String, Value>> {
        self.config.as_ref().and_then(Value::as_object)
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(InstanceNode::count).sum::<usize>()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
