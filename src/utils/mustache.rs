//! Logic-less Mustache templates over a `serde_json::Value` view.
//!
//! Covers the Mustache tags: variables (`{{x}}`, `{{{x}}}`, `{{&x}}`),
//! dotted names and `{{.}}`, sections and inverted sections, comments,
//! partials and delimiter changes. Standalone tag lines are removed.
//!
//! Nothing is HTML-escaped. Partials render nothing, since a template is
//! always a single string here.

use std::mem;

use serde_json::Value;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Variable(String),
    Section {
        name: String,
        inverted: bool,
        children: Vec<Node>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Variable,
    Section,
    Inverted,
    Close,
    Comment,
    Partial,
    Delimiters,
}

impl Tag {
    /// Tags that swallow their line when nothing else is on it.
    fn can_stand_alone(self) -> bool {
        self != Tag::Variable
    }
}

/// Nodes collected for the innermost open section.
struct Frame {
    name: Option<String>,
    inverted: bool,
    nodes: Vec<Node>,
}

impl Frame {
    fn root() -> Self {
        Self {
            name: None,
            inverted: false,
            nodes: Vec::new(),
        }
    }

    fn push_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.nodes.push(Node::Text(text.to_string()));
        }
    }
}

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

/// Parse `source` into a template.
///
/// Fails on an unclosed tag, a section that is never closed, a close tag
/// that does not match the open section, or a malformed delimiter change.
pub fn compile(source: &str) -> Result<Template> {
    let mut open = String::from("{{");
    let mut close = String::from("}}");
    let mut current = Frame::root();
    let mut parents: Vec<Frame> = Vec::new();
    let mut pos = 0;
    let mut last_tag_end = 0;

    while let Some(offset) = source[pos..].find(open.as_str()) {
        let start = pos + offset;
        let after_open = start + open.len();
        let (tag, closing, body_start) = match source[after_open..].chars().next() {
            Some('{') => (Tag::Variable, ["}", close.as_str()].concat(), after_open + 1),
            Some('&') => (Tag::Variable, close.clone(), after_open + 1),
            Some('#') => (Tag::Section, close.clone(), after_open + 1),
            Some('^') => (Tag::Inverted, close.clone(), after_open + 1),
            Some('/') => (Tag::Close, close.clone(), after_open + 1),
            Some('!') => (Tag::Comment, close.clone(), after_open + 1),
            Some('>') => (Tag::Partial, close.clone(), after_open + 1),
            Some('=') => (Tag::Delimiters, ["=", close.as_str()].concat(), after_open + 1),
            _ => (Tag::Variable, close.clone(), after_open),
        };

        let body_len = source[body_start..].find(closing.as_str()).ok_or_else(|| {
            AppError::validation(format!("unclosed tag at byte {start} of template"))
        })?;
        let name = source[body_start..body_start + body_len].trim();
        let mut end = body_start + body_len + closing.len();

        let mut text_end = start;
        if tag.can_stand_alone() {
            let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
            let line_end = source[end..].find('\n').map_or(source.len(), |i| end + i + 1);
            let alone = line_start >= last_tag_end
                && source[line_start..start].trim().is_empty()
                && source[end..line_end].trim().is_empty();
            if alone {
                text_end = line_start;
                end = line_end;
            }
        }
        current.push_text(&source[pos..text_end]);
        pos = end;
        last_tag_end = end;

        match tag {
            Tag::Variable => current.nodes.push(Node::Variable(name.to_string())),
            Tag::Comment | Tag::Partial => {}
            Tag::Section | Tag::Inverted => {
                let section = Frame {
                    name: Some(name.to_string()),
                    inverted: tag == Tag::Inverted,
                    nodes: Vec::new(),
                };
                parents.push(mem::replace(&mut current, section));
            }
            Tag::Close => {
                if current.name.as_deref() != Some(name) {
                    return Err(AppError::validation(match &current.name {
                        Some(open_name) => {
                            format!("{{{{/{name}}}}} does not close {{{{#{open_name}}}}}")
                        }
                        None => format!("{{{{/{name}}}}} has no open section"),
                    }));
                }
                let Some(parent) = parents.pop() else {
                    return Err(AppError::validation(format!(
                        "{{{{/{name}}}}} has no open section"
                    )));
                };
                let section = mem::replace(&mut current, parent);
                current.nodes.push(Node::Section {
                    name: name.to_string(),
                    inverted: section.inverted,
                    children: section.nodes,
                });
            }
            Tag::Delimiters => {
                let mut parts = name.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(o), Some(c), None) if !o.contains('=') && !c.contains('=') => {
                        open = o.to_string();
                        close = c.to_string();
                    }
                    _ => {
                        return Err(AppError::validation(format!(
                            "invalid delimiter change {name:?} in template"
                        )));
                    }
                }
            }
        }
    }
    current.push_text(&source[pos..]);

    if let Some(name) = current.name {
        return Err(AppError::validation(format!(
            "unclosed section {{{{#{name}}}}} in template"
        )));
    }
    Ok(Template {
        nodes: current.nodes,
    })
}

impl Template {
    /// Render against `view`. Missing names render as the empty string.
    pub fn render(&self, view: &Value) -> String {
        let mut out = String::new();
        let mut stack = vec![view];
        render_nodes(&self.nodes, &mut stack, &mut out);
        out
    }
}

fn render_nodes<'v>(nodes: &[Node], stack: &mut Vec<&'v Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable(name) => {
                if let Some(value) = lookup(stack, name) {
                    write_value(value, out);
                }
            }
            Node::Section {
                name,
                inverted,
                children,
            } => {
                let value = lookup(stack, name);
                let truthy = value.is_some_and(is_truthy);
                if *inverted {
                    if !truthy {
                        render_nodes(children, stack, out);
                    }
                    continue;
                }
                match value {
                    Some(Value::Array(items)) => {
                        for item in items {
                            stack.push(item);
                            render_nodes(children, stack, out);
                            stack.pop();
                        }
                    }
                    Some(value) if truthy => {
                        stack.push(value);
                        render_nodes(children, stack, out);
                        stack.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Resolve a possibly dotted name, innermost context first.
fn lookup<'v>(stack: &[&'v Value], name: &str) -> Option<&'v Value> {
    if name == "." {
        return stack.last().copied();
    }
    let mut parts = name.split('.');
    let first = parts.next()?;
    let mut value = stack.iter().rev().copied().find_map(|ctx| ctx.get(first))?;
    for part in parts {
        value = value.get(part)?;
    }
    Some(value)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(source: &str, view: Value) -> String {
        compile(source).unwrap().render(&view)
    }

    #[test]
    fn test_variables_are_never_escaped() {
        let view = json!({"x": "A & <B> \"C\""});
        assert_eq!(
            render("{{x}}|{{{x}}}|{{& x }}", view),
            "A & <B> \"C\"|A & <B> \"C\"|A & <B> \"C\""
        );
    }

    #[test]
    fn test_scalars_and_missing_names() {
        let view = json!({"n": 42, "f": false, "none": null});
        assert_eq!(render("{{n}} {{f}} [{{none}}] [{{missing}}]", view), "42 false [] []");
    }

    #[test]
    fn test_dotted_names_and_context_stack() {
        let view = json!({
            "site": {"name": "Wiki"},
            "items": [{"title": "A"}, {"title": "B", "site": {"name": "Inner"}}]
        });
        assert_eq!(
            render("{{#items}}{{title}}@{{site.name}} {{/items}}", view),
            "A@Wiki B@Inner "
        );
    }

    #[test]
    fn test_dotted_name_does_not_fall_back_after_first_part() {
        let view = json!({"a": {"b": 1}, "items": [{"a": {}}]});
        assert_eq!(render("{{#items}}[{{a.b}}]{{/items}}", view), "[]");
    }

    #[test]
    fn test_conditional_and_inverted_sections() {
        let source = "{{#on}}yes{{/on}}{{^on}}no{{/on}}";
        assert_eq!(render(source, json!({"on": true})), "yes");
        assert_eq!(render(source, json!({"on": false})), "no");
        assert_eq!(render(source, json!({})), "no");
        assert_eq!(render(source, json!({"on": 0})), "no");
        assert_eq!(render(source, json!({"on": ""})), "no");
        assert_eq!(render(source, json!({"on": []})), "no");
    }

    #[test]
    fn test_nested_sections_and_dot() {
        let view = json!({"rows": [{"cells": [1, 2]}, {"cells": [3]}]});
        assert_eq!(
            render("{{#rows}}<{{#cells}}{{.}}{{/cells}}>{{/rows}}", view),
            "<12><3>"
        );
    }

    #[test]
    fn test_object_section_pushes_context() {
        let view = json!({"site": {"lang": "en"}});
        assert_eq!(render("{{#site}}{{lang}}{{/site}}", view), "en");
    }

    #[test]
    fn test_standalone_lines_removed() {
        let source = "Begin\n  {{#items}}\n{{.}}\n  {{/items}}  \r\n{{! note }}\nEnd";
        assert_eq!(render(source, json!({"items": ["a", "b"]})), "Begin\na\nb\nEnd");
    }

    #[test]
    fn test_inline_tags_keep_their_line() {
        assert_eq!(render(" {{#x}}y{{/x}} \n", json!({"x": true})), " y \n");
        assert_eq!(render("a {{! c }} b", json!({})), "a  b");
    }

    #[test]
    fn test_delimiter_change() {
        let view = json!({"x": "v"});
        assert_eq!(render("{{=<% %>=}}<% x %> {{x}} <%={{ }}=%>{{x}}", view), "v {{x}} v");
    }

    #[test]
    fn test_partials_render_nothing() {
        assert_eq!(render("[{{> footer}}]", json!({})), "[]");
    }

    #[test]
    fn test_malformed_templates_rejected() {
        assert!(compile("{{#a}}open").is_err());
        assert!(compile("{{/a}}").is_err());
        assert!(compile("{{#a}}{{/b}}").is_err());
        assert!(compile("{{#a}}{{#b}}{{/a}}{{/b}}").is_err());
        assert!(compile("{{unclosed").is_err());
        assert!(compile("{{=<%=}}").is_err());
    }
}
