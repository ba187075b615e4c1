//! Compiles markup with interpolations into a [`ViewTemplate`].
//!
//! The input has the shape of a tagged template literal: `n + 1` literal
//! strings around `n` interpolations. Where an interpolation sits decides what
//! it becomes:
//!
//! - in text content, a content binding on a placeholder text node (or the
//!   directive's own placeholder for directives such as `repeat`);
//! - as a whole attribute value, a binding on the aspect named by the
//!   attribute: `?name` boolean attribute, `:name` property, `@name` event,
//!   anything else a plain attribute;
//! - mixed with literal text in an attribute value, an attribute binding that
//!   concatenates the pieces.
//!
//! Static interpolations are spliced into the markup before parsing.

use std::rc::Rc;

use super::behavior::{Aspect, HtmlDirective};
use super::binding::Binding;
use super::binding_behavior::BindingDirective;
use super::repeat::RepeatDirective;
use super::template::{DirectiveDescriptor, TargetPath, ViewTemplate};
use crate::dom::{Node, is_void_element};
use crate::error::{Error, Result};

const MARKER_OPEN: char = '\u{E000}';
const MARKER_CLOSE: char = '\u{E001}';

/// One interpolated value.
#[derive(Clone)]
pub enum Interpolation {
    /// Literal markup, inserted as-is.
    Static(String),
    /// A binding.
    Binding(Binding),
    /// A directive that creates its own behavior.
    Directive(Rc<dyn HtmlDirective>),
}

impl Interpolation {
    /// Wrap any directive.
    pub fn directive(directive: impl HtmlDirective + 'static) -> Self {
        Interpolation::Directive(Rc::new(directive))
    }
}

impl From<Binding> for Interpolation {
    fn from(binding: Binding) -> Self {
        Interpolation::Binding(binding)
    }
}

impl From<RepeatDirective> for Interpolation {
    fn from(directive: RepeatDirective) -> Self {
        Interpolation::directive(directive)
    }
}

impl From<&str> for Interpolation {
    fn from(text: &str) -> Self {
        Interpolation::Static(text.to_owned())
    }
}

impl From<String> for Interpolation {
    fn from(text: String) -> Self {
        Interpolation::Static(text)
    }
}

enum Dynamic {
    Binding(Binding),
    Directive(Rc<dyn HtmlDirective>),
}

/// Compile `strings` and `values` into a template.
///
/// ```ignore
/// let template = html(
///     &["<p title=\"", "\">", "</p>"],
///     [prop("title").into(), prop("body").into()],
/// )?;
/// ```
pub fn html<I>(strings: &[&str], values: I) -> Result<ViewTemplate>
where
    I: IntoIterator,
    I::Item: Into<Interpolation>,
{
    let values: Vec<Interpolation> = values.into_iter().map(Into::into).collect();
    if strings.len() != values.len() + 1 {
        return Err(Error::markup(
            0,
            format!(
                "{} literal strings cannot surround {} interpolations",
                strings.len(),
                values.len()
            ),
        ));
    }

    let mut markup = String::new();
    let mut dynamics = Vec::new();
    for (index, literal) in strings.iter().enumerate() {
        markup.push_str(literal);
        match values.get(index) {
            None => {}
            Some(Interpolation::Static(text)) => markup.push_str(text),
            Some(Interpolation::Binding(binding)) => {
                push_marker(&mut markup, dynamics.len());
                dynamics.push(Some(Dynamic::Binding(binding.clone())));
            }
            Some(Interpolation::Directive(directive)) => {
                push_marker(&mut markup, dynamics.len());
                dynamics.push(Some(Dynamic::Directive(directive.clone())));
            }
        }
    }

    let fragment = Node::fragment();
    let mut parser = Parser {
        src: &markup,
        pos: 0,
        dynamics,
        targets: Vec::new(),
    };
    parser.parse_nodes(&fragment, None)?;

    let directives = parser
        .targets
        .into_iter()
        .map(|(node, directive)| {
            let target = TargetPath::of(&node, &fragment)
                .ok_or_else(|| Error::markup(0, "directive target left the fragment"))?;
            Ok(DirectiveDescriptor { target, directive })
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::trace!(directives = directives.len(), "compiled template");
    Ok(ViewTemplate::from_parts(fragment, directives))
}

fn push_marker(markup: &mut String, index: usize) {
    markup.push(MARKER_OPEN);
    markup.push_str(&index.to_string());
    markup.push(MARKER_CLOSE);
}

enum Segment<'a> {
    Text(&'a str),
    Marker(usize),
}

fn split_markers(text: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(MARKER_OPEN) {
        if open > 0 {
            segments.push(Segment::Text(&rest[..open]));
        }
        let after = &rest[open + MARKER_OPEN.len_utf8()..];
        let close = after
            .find(MARKER_CLOSE)
            .ok_or_else(|| Error::markup(0, "corrupt interpolation marker"))?;
        let index = after[..close]
            .parse()
            .map_err(|_| Error::markup(0, "corrupt interpolation marker"))?;
        segments.push(Segment::Marker(index));
        rest = &after[close + MARKER_CLOSE.len_utf8()..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    Ok(segments)
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity.strip_prefix('#').and_then(|code| {
                    let value = match code.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => code.parse().ok(),
                    };
                    value.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

enum AttributePart {
    Text(String),
    Binding(Binding),
}

fn interpolate_attribute(parts: Vec<AttributePart>) -> Binding {
    let volatile = parts
        .iter()
        .any(|part| matches!(part, AttributePart::Binding(b) if b.is_volatile()));
    let binding = Binding::new(move |source, context| {
        let mut out = String::new();
        for part in &parts {
            match part {
                AttributePart::Text(text) => out.push_str(text),
                AttributePart::Binding(binding) => {
                    out.push_str(&binding.evaluate(source, context)?.to_display_string());
                }
            }
        }
        Ok(out.into())
    });
    if volatile { binding } else { binding.stable() }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    dynamics: Vec<Option<Dynamic>>,
    targets: Vec<(Node, Rc<dyn HtmlDirective>)>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::markup(self.pos, message)
    }

    fn take_dynamic(&mut self, index: usize) -> Result<Dynamic> {
        self.dynamics
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| Error::markup(self.pos, format!("interpolation {index} used twice")))
    }

    fn starts_tag(rest: &str) -> bool {
        let mut chars = rest.chars();
        chars.next() == Some('<')
            && chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!')
    }

    fn parse_nodes(&mut self, parent: &Node, closing: Option<&str>) -> Result<()> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return match closing {
                    Some(tag) => Err(self.error(format!("unclosed <{tag}>"))),
                    None => Ok(()),
                };
            }
            if let Some(body) = rest.strip_prefix("<!--") {
                let end = body
                    .find("-->")
                    .ok_or_else(|| self.error("unterminated comment"))?;
                parent.append_child(&Node::comment(&body[..end]));
                self.pos += 4 + end + 3;
            } else if let Some(body) = rest.strip_prefix("</") {
                let end = body
                    .find('>')
                    .ok_or_else(|| self.error("unterminated closing tag"))?;
                let tag = body[..end].trim().to_ascii_lowercase();
                if closing != Some(tag.as_str()) {
                    return Err(self.error(format!("unexpected </{tag}>")));
                }
                self.pos += 2 + end + 1;
                return Ok(());
            } else if Self::starts_tag(rest) {
                self.parse_element(parent)?;
            } else {
                let end = rest
                    .char_indices()
                    .skip(1)
                    .find(|&(i, _)| Self::starts_tag(&rest[i..]))
                    .map_or(rest.len(), |(i, _)| i);
                self.parse_text(parent, &rest[..end])?;
                self.pos += end;
            }
        }
    }

    fn parse_text(&mut self, parent: &Node, text: &str) -> Result<()> {
        for segment in split_markers(text)? {
            match segment {
                Segment::Text(text) => parent.append_child(&Node::text(&decode_entities(text))),
                Segment::Marker(index) => {
                    let directive: Rc<dyn HtmlDirective> = match self.take_dynamic(index)? {
                        Dynamic::Binding(binding) => {
                            Rc::new(BindingDirective::new(binding, Aspect::Content))
                        }
                        Dynamic::Directive(directive) => directive,
                    };
                    let placeholder = directive.create_placeholder();
                    parent.append_child(&placeholder);
                    self.targets.push((placeholder, directive));
                }
            }
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn read_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let end = rest.find(|c: char| !keep(c)).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn parse_element(&mut self, parent: &Node) -> Result<()> {
        self.pos += 1;
        let tag = self
            .read_while(|c| c.is_ascii_alphanumeric() || c == '-')
            .to_ascii_lowercase();
        let element = Node::element(&tag);
        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(format!("unterminated <{tag}>")));
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }
            self.parse_attribute(&element)?;
        };
        parent.append_child(&element);
        if self_closing || is_void_element(&tag) {
            return Ok(());
        }
        self.parse_nodes(&element, Some(&tag))
    }

    fn parse_attribute(&mut self, element: &Node) -> Result<()> {
        let start = self.pos;
        let name = self.read_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/');
        if name.is_empty() {
            // A stray '/' inside the tag.
            self.pos += 1;
            return Ok(());
        }
        self.skip_whitespace();
        let value = if self.rest().starts_with('=') {
            self.pos += 1;
            self.skip_whitespace();
            match self.rest().chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    self.pos += 1;
                    let body = self.rest();
                    let end = body
                        .find(quote)
                        .ok_or_else(|| self.error("unterminated attribute value"))?;
                    self.pos += end + 1;
                    &body[..end]
                }
                _ => self.read_while(|c| !c.is_whitespace() && c != '>'),
            }
        } else {
            ""
        };

        if name.contains(MARKER_OPEN) {
            // A bare directive in attribute position applies to the element.
            for segment in split_markers(name)? {
                match segment {
                    Segment::Marker(index) => match self.take_dynamic(index)? {
                        Dynamic::Directive(directive) => {
                            self.targets.push((element.clone(), directive))
                        }
                        Dynamic::Binding(_) => {
                            return Err(Error::markup(start, "bindings need an attribute name"));
                        }
                    },
                    Segment::Text(_) => {
                        return Err(Error::markup(start, "attribute names cannot be interpolated"));
                    }
                }
            }
            return Ok(());
        }

        let segments = split_markers(value)?;
        if !segments.iter().any(|s| matches!(s, Segment::Marker(_))) {
            element.set_attribute(name, &decode_entities(value));
            return Ok(());
        }

        let aspect = Aspect::from_attribute(name);
        if let [Segment::Marker(index)] = segments[..] {
            let directive: Rc<dyn HtmlDirective> = match self.take_dynamic(index)? {
                Dynamic::Binding(binding) => Rc::new(BindingDirective::new(binding, aspect)),
                Dynamic::Directive(directive) => directive,
            };
            self.targets.push((element.clone(), directive));
            return Ok(());
        }

        if matches!(aspect, Aspect::Event(_)) {
            return Err(Error::markup(start, "event bindings cannot be mixed with text"));
        }
        let mut parts = Vec::with_capacity(segments.len());
        for segment in segments {
            parts.push(match segment {
                Segment::Text(text) => AttributePart::Text(decode_entities(text)),
                Segment::Marker(index) => match self.take_dynamic(index)? {
                    Dynamic::Binding(binding) => AttributePart::Binding(binding),
                    Dynamic::Directive(_) => {
                        return Err(Error::markup(start, "directives cannot be mixed with text"));
                    }
                },
            });
        }
        let directive = BindingDirective::new(interpolate_attribute(parts), aspect);
        self.targets.push((element.clone(), Rc::new(directive)));
        Ok(())
    }
}
