use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::form::{Form, RenderNode};
use crate::tree_view::{ConfigPanel, TreeView};

const ROW: &str = "row mb-2 align-items-center";
const LABEL: &str = "col-sm-3 col-form-label text-end fw-bold";

pub fn tree_to_html(view: &TreeView) -> String {
    let mut out = String::new();
    push_tree(view, &mut out);
    out
}

pub fn form_to_html(form: &Form) -> String {
    let mut out = String::from("<form class=\"bg-white p-3 rounded shadow-sm\">");
    for field in &form.fields {
        push_field(field, &mut out);
    }
    out.push_str(&format!(
        "<div class=\"text-end mt-3\"><button class=\"btn btn-primary btn-sm\" disabled>{}</button></div></form>",
        Form::SUBMIT_LABEL
    ));
    out
}

fn push_tree(view: &TreeView, out: &mut String) {
    let h = &view.header;
    let badge_class = match h.badge {
        Some(tone) => format!("badge ms-2 {}", tone.css_class()),
        None => "badge ms-2".to_string(),
    };
    out.push_str("<ul class=\"list-unstyled\"><li>");
    out.push_str("<div class=\"d-flex align-items-center justify-content-between p-2 border rounded\"><div>");
    out.push_str(&format!(
        "<span class=\"fw-bold\">{}</span><span class=\"ms-2 text-muted\">[{}]</span><span class=\"{}\">({})</span>",
        encode_text(&h.name),
        encode_text(&h.create_func),
        badge_class,
        encode_text(&h.state)
    ));
    out.push_str(&format!(
        "</div><button class=\"btn btn-sm btn-outline-primary\">{}</button></div>",
        h.toggle_label
    ));

    if let Some(panel) = &view.config {
        out.push_str("<div class=\"container mt-3 p-3 border rounded shadow-sm bg-white\">");
        if let ConfigPanel::Form(form) = panel {
            out.push_str(&form_to_html(form));
        }
        out.push_str("</div>");
    }

    if !view.children.is_empty() {
        out.push_str("<ul class=\"ms-3\">");
        for child in &view.children {
            push_tree(child, out);
        }
        out.push_str("</ul>");
    }
    out.push_str("</li></ul>");
}

fn push_field(node: &RenderNode, out: &mut String) {
    match node {
        RenderNode::TextInput { label, value } => {
            out.push_str(&format!(
                "<div class=\"{ROW}\"><label class=\"{LABEL}\">{}</label><div class=\"col-sm-9\"><input type=\"text\" class=\"form-control form-control-sm\" value=\"{}\"></div></div>",
                encode_text(label),
                encode_double_quoted_attribute(value)
            ));
        }
        RenderNode::Select { label, options, .. } => {
            out.push_str(&format!(
                "<div class=\"{ROW}\"><label class=\"{LABEL}\">{}</label><div class=\"col-sm-9\"><select class=\"form-select form-select-sm\">",
                encode_text(label)
            ));
            for opt in options {
                out.push_str(&format!(
                    "<option value=\"{}\"{}>{}</option>",
                    encode_double_quoted_attribute(&opt.value),
                    if opt.selected { " selected" } else { "" },
                    encode_text(&opt.value)
                ));
            }
            out.push_str("</select></div></div>");
        }
        RenderNode::ArrayBlock { label, items } => {
            out.push_str(&format!(
                "<div class=\"mb-2\"><label class=\"fw-bold\">{}</label><div class=\"border rounded p-2\">",
                encode_text(label)
            ));
            for item in items {
                out.push_str(&format!(
                    "<div class=\"row mb-1\"><label class=\"col-sm-3 col-form-label text-end small text-muted\">{}</label><div class=\"col-sm-9\">",
                    item.label
                ));
                for f in &item.fields {
                    push_field(f, out);
                }
                out.push_str("</div></div>");
            }
            out.push_str("</div></div>");
        }
        RenderNode::ObjectBlock { label, fields } => {
            out.push_str(&format!(
                "<div class=\"border rounded p-2 mb-2\"><label class=\"fw-bold\">{}</label>",
                encode_text(label)
            ));
            for f in fields {
                push_field(f, out);
            }
            out.push_str("</div>");
        }
        RenderNode::Placeholder => out.push_str("<div></div>"),
    }
}
