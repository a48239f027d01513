use serde_json::{Map, Value};

use crate::registry::{RegistryCache, RegistryStatus};
use crate::schema::FieldSchema;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    TextInput {
        label: String,
        value: String,
    },
    Select {
        label: String,
        options: Vec<SelectOption>,
        pending: bool,
    },
    ArrayBlock {
        label: String,
        items: Vec<ArrayItem>,
    },
    ObjectBlock {
        label: String,
        fields: Vec<RenderNode>,
    },
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub label: String,
    pub fields: Vec<RenderNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub fields: Vec<RenderNode>,
}

impl Form {
    pub const SUBMIT_LABEL: &'static str = "Submit (Disabled)";

    pub fn submit_enabled(&self) -> bool {
        false
    }
}

impl RenderNode {
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::TextInput { label, .. }
            | Self::Select { label, .. }
            | Self::ArrayBlock { label, .. }
            | Self::ObjectBlock { label, .. } => Some(label.as_str()),
            Self::Placeholder => None,
        }
    }

    pub fn find(&self, label: &str) -> Option<&RenderNode> {
        if self.label() == Some(label) {
            return Some(self);
        }
        match self {
            Self::ArrayBlock { items, .. } => items
                .iter()
                .flat_map(|i| i.fields.iter())
                .find_map(|f| f.find(label)),
            Self::ObjectBlock { fields, .. } => fields.iter().find_map(|f| f.find(label)),
            _ => None,
        }
    }
}

pub struct FieldRenderer<'a> {
    create_func: &'a str,
    registry: &'a mut RegistryCache,
}

impl<'a> FieldRenderer<'a> {
    pub fn new(create_func: &'a str, registry: &'a mut RegistryCache) -> Self {
        Self {
            create_func,
            registry,
        }
    }

    pub fn render_form(
        &mut self,
        properties: &[(String, FieldSchema)],
        config: &Map<String, Value>,
    ) -> Form {
        let fields = properties
            .iter()
            .map(|(key, schema)| self.render(key, schema, config.get(key)))
            .collect();
        Form { fields }
    }

    pub fn render(&mut self, key: &str, schema: &FieldSchema, value: Option<&Value>) -> RenderNode {
        match schema {
            FieldSchema::Registry { plugin_type } => self.render_registry(key, plugin_type, value),
            FieldSchema::String => RenderNode::TextInput {
                label: key.to_string(),
                value: display_value(value),
            },
            FieldSchema::Array { name, options } => {
                let elements = value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
                let items = elements
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.render_array_item(i, item, name, options.as_deref()))
                    .collect();
                RenderNode::ArrayBlock {
                    label: key.to_string(),
                    items,
                }
            }
            FieldSchema::Object { properties } => {
                let fields = properties
                    .iter()
                    .map(|(sub_key, sub_schema)| {
                        let sub_value = value.and_then(|v| v.get(sub_key.as_str()));
                        self.render(sub_key, sub_schema, sub_value)
                    })
                    .collect();
                RenderNode::ObjectBlock {
                    label: key.to_string(),
                    fields,
                }
            }
            FieldSchema::Unknown => RenderNode::Placeholder,
        }
    }

    fn render_registry(&mut self, key: &str, plugin_type: &str, value: Option<&Value>) -> RenderNode {
        self.registry.request(plugin_type, self.create_func);
        let current = value.and_then(Value::as_str);
        let options = self
            .registry
            .options(plugin_type)
            .iter()
            .map(|opt| SelectOption {
                value: opt.clone(),
                selected: current == Some(opt.as_str()),
            })
            .collect();
        RenderNode::Select {
            label: key.to_string(),
            options,
            pending: matches!(self.registry.status(plugin_type), RegistryStatus::Pending),
        }
    }

    fn render_array_item(
        &mut self,
        index: usize,
        item: &Value,
        name: &FieldSchema,
        options: Option<&FieldSchema>,
    ) -> ArrayItem {
        let mut fields = vec![self.render("name", name, item.get("name"))];
        if let Some(options_schema) = options {
            let empty = Value::Object(Map::new());
            let opts = item.get("options").filter(|v| !v.is_null()).unwrap_or(&empty);
            fields.push(self.render("options", options_schema, Some(opts)));
        }
        ArrayItem {
            label: format!("Item {}", index + 1),
            fields,
        }
    }
}

pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
