use crate::form::{Form, RenderNode, SelectOption};
use crate::sanitize::sanitize_inline;
use crate::tree_view::{ConfigPanel, NodeHeader, NodeKey, TreeView};

const MAX_VALUE_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewLineKind {
    Header { key: NodeKey, header: NodeHeader },
    BlockLabel(String),
    ItemLabel(String),
    Input { label: String, value: String },
    Select {
        label: String,
        options: Vec<SelectOption>,
        pending: bool,
    },
    Placeholder,
    EmptyConfig,
    Submit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewLine {
    pub indent: usize,
    pub kind: ViewLineKind,
}

impl ViewLine {
    pub fn header_key(&self) -> Option<&NodeKey> {
        match &self.kind {
            ViewLineKind::Header { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn text(&self) -> String {
        match &self.kind {
            ViewLineKind::Header { header, .. } => format!(
                "{} [{}] ({})  <{}>",
                sanitize_inline(&header.name, MAX_VALUE_CHARS),
                sanitize_inline(&header.create_func, MAX_VALUE_CHARS),
                sanitize_inline(&header.state, MAX_VALUE_CHARS),
                header.toggle_label
            ),
            ViewLineKind::BlockLabel(label) => format!("{}:", sanitize_inline(label, MAX_VALUE_CHARS)),
            ViewLineKind::ItemLabel(label) => format!("{label}:"),
            ViewLineKind::Input { label, value } => format!(
                "{}: \"{}\"",
                sanitize_inline(label, MAX_VALUE_CHARS),
                sanitize_inline(value, MAX_VALUE_CHARS)
            ),
            ViewLineKind::Select {
                label,
                options,
                pending,
            } => format!(
                "{}: {}",
                sanitize_inline(label, MAX_VALUE_CHARS),
                select_summary(options, *pending)
            ),
            ViewLineKind::Placeholder => "-".to_string(),
            ViewLineKind::EmptyConfig => "(no configuration)".to_string(),
            ViewLineKind::Submit => format!("[{}]", Form::SUBMIT_LABEL),
        }
    }
}

pub fn select_summary(options: &[SelectOption], pending: bool) -> String {
    if pending {
        return "{loading...}".to_string();
    }
    let parts: Vec<String> = options
        .iter()
        .map(|o| {
            let v = sanitize_inline(&o.value, MAX_VALUE_CHARS);
            if o.selected { format!("*{v}*") } else { v }
        })
        .collect();
    format!("{{{}}}", parts.join(", "))
}

pub fn tree_lines(view: &TreeView) -> Vec<ViewLine> {
    let mut out = Vec::new();
    push_tree(view, &mut out);
    out
}

pub fn tree_to_text(view: &TreeView) -> String {
    let mut s = String::new();
    for line in tree_lines(view) {
        s.push_str(&"  ".repeat(line.indent));
        s.push_str(&line.text());
        s.push('\n');
    }
    s
}

fn push_tree(view: &TreeView, out: &mut Vec<ViewLine>) {
    let indent = view.depth * 2;
    out.push(ViewLine {
        indent,
        kind: ViewLineKind::Header {
            key: view.key.clone(),
            header: view.header.clone(),
        },
    });
    match &view.config {
        Some(ConfigPanel::Form(form)) => {
            for field in &form.fields {
                push_field(field, indent + 1, out);
            }
            out.push(ViewLine {
                indent: indent + 1,
                kind: ViewLineKind::Submit,
            });
        }
        Some(ConfigPanel::Empty) => out.push(ViewLine {
            indent: indent + 1,
            kind: ViewLineKind::EmptyConfig,
        }),
        None => {}
    }
    for child in &view.children {
        push_tree(child, out);
    }
}

fn push_field(node: &RenderNode, indent: usize, out: &mut Vec<ViewLine>) {
    let kind = match node {
        RenderNode::TextInput { label, value } => ViewLineKind::Input {
            label: label.clone(),
            value: value.clone(),
        },
        RenderNode::Select {
            label,
            options,
            pending,
        } => ViewLineKind::Select {
            label: label.clone(),
            options: options.clone(),
            pending: *pending,
        },
        RenderNode::ArrayBlock { label, items } => {
            out.push(ViewLine {
                indent,
                kind: ViewLineKind::BlockLabel(label.clone()),
            });
            for item in items {
                out.push(ViewLine {
                    indent: indent + 1,
                    kind: ViewLineKind::ItemLabel(item.label.clone()),
                });
                for f in &item.fields {
                    push_field(f, indent + 2, out);
                }
            }
            return;
        }
        RenderNode::ObjectBlock { label, fields } => {
            out.push(ViewLine {
                indent,
                kind: ViewLineKind::BlockLabel(label.clone()),
            });
            for f in fields {
                push_field(f, indent + 1, out);
            }
            return;
        }
        RenderNode::Placeholder => ViewLineKind::Placeholder,
    };
    out.push(ViewLine { indent, kind });
}
