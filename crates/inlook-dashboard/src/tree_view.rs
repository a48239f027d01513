use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::form::{FieldRenderer, Form};
use crate::instance::{BadgeTone, InstanceNode};
use crate::registry::{RegistryCache, RegistrySource};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKey {
    Instance(String),
    Path(Vec<usize>),
}

impl NodeKey {
    pub fn for_node(node: &InstanceNode, path: &[usize]) -> Self {
        match node.instance_id.as_deref().filter(|s| !s.is_empty()) {
            Some(id) => Self::Instance(id.to_string()),
            None => Self::Path(path.to_vec()),
        }
    }

    /// Inverse of `Display`: `/` and `/0/2` are paths, `id:<instanceID>` is
    /// always an instance id, and any other text is an instance id too.
    pub fn parse(raw: &str) -> Self {
        if let Some(id) = raw.strip_prefix(INSTANCE_PREFIX) {
            return Self::Instance(id.to_string());
        }
        match parse_path(raw) {
            Some(path) => Self::Path(path),
            None => Self::Instance(raw.to_string()),
        }
    }
}

const INSTANCE_PREFIX: &str = "id:";

fn parse_path(raw: &str) -> Option<Vec<usize>> {
    let rest = raw.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    rest.split('/').map(|s| s.parse::<usize>().ok()).collect()
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(id) if id.starts_with(INSTANCE_PREFIX) || parse_path(id).is_some() => {
                write!(f, "{INSTANCE_PREFIX}{id}")
            }
            Self::Instance(id) => f.write_str(id),
            Self::Path(path) if path.is_empty() => f.write_str("/"),
            Self::Path(path) => {
                for idx in path {
                    write!(f, "/{idx}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeHeader {
    pub name: String,
    pub create_func: String,
    pub state: String,
    pub badge: Option<BadgeTone>,
    pub toggle_label: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigPanel {
    Form(Form),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeView {
    pub key: NodeKey,
    pub depth: usize,
    pub header: NodeHeader,
    pub expanded: bool,
    pub config: Option<ConfigPanel>,
    pub children: Vec<TreeView>,
}

impl TreeView {
    pub fn find(&self, key: &NodeKey) -> Option<&TreeView> {
        if &self.key == key {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(key))
    }

    pub fn walk(&self) -> Vec<&TreeView> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

pub const TOGGLE_SHOW: &str = "Configure";
pub const TOGGLE_HIDE: &str = "Hide Config";

pub struct TreeSession {
    source: Arc<dyn RegistrySource>,
    expanded: BTreeMap<NodeKey, bool>,
    registry: RegistryCache,
}

impl TreeSession {
    pub fn new(source: Arc<dyn RegistrySource>) -> Self {
        Self {
            registry: RegistryCache::new(Arc::clone(&source)),
            source,
            expanded: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &RegistryCache {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut RegistryCache {
        &mut self.registry
    }

    pub fn remount(&mut self) {
        self.expanded.clear();
        self.registry = RegistryCache::new(Arc::clone(&self.source));
    }

    pub fn is_expanded(&self, key: &NodeKey) -> bool {
        self.expanded.get(key).copied().unwrap_or(false)
    }

    pub fn set_expanded(&mut self, key: NodeKey, expanded: bool) {
        self.expanded.insert(key, expanded);
    }

    pub fn toggle(&mut self, key: &NodeKey) -> bool {
        let next = !self.is_expanded(key);
        self.expanded.insert(key.clone(), next);
        next
    }

    pub fn set_all(&mut self, root: &InstanceNode, expanded: bool) {
        let mut path = Vec::new();
        self.set_all_inner(root, &mut path, expanded);
    }

    fn set_all_inner(&mut self, node: &InstanceNode, path: &mut Vec<usize>, expanded: bool) {
        self.expanded.insert(NodeKey::for_node(node, path), expanded);
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            self.set_all_inner(child, path, expanded);
            path.pop();
        }
    }

    pub fn render(&mut self, root: &InstanceNode) -> TreeView {
        let mut path = Vec::new();
        self.render_node(root, &mut path)
    }

    fn render_node(&mut self, node: &InstanceNode, path: &mut Vec<usize>) -> TreeView {
        let key = NodeKey::for_node(node, path);
        let expanded = self.is_expanded(&key);

        let header = NodeHeader {
            name: node.display_name().to_string(),
            create_func: node.create_func.clone(),
            state: node.state.as_str().to_string(),
            badge: node.state.badge(),
            toggle_label: if expanded { TOGGLE_HIDE } else { TOGGLE_SHOW },
        };

        let config = expanded.then(|| self.render_config(node));

        let mut children = Vec::with_capacity(node.children.len());
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            children.push(self.render_node(child, path));
            path.pop();
        }

        TreeView {
            key,
            depth: path.len(),
            header,
            expanded,
            config,
            children,
        }
    }

    fn render_config(&mut self, node: &InstanceNode) -> ConfigPanel {
        let properties = node.schema.as_ref().and_then(|s| s.properties());
        match (properties, node.config_map()) {
            (Some(properties), Some(config)) => {
                let mut renderer = FieldRenderer::new(&node.create_func, &mut self.registry);
                ConfigPanel::Form(renderer.render_form(properties, config))
            }
            _ => ConfigPanel::Empty,
        }
    }
}
