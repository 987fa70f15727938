use std::{borrow::Cow, fmt::Write as _};

use anyhow::Context;
use roxmltree::{Document, NS_XML_URI};

use crate::document::{LinkDocument, ReadyState};

/// HTML entities XML does not know about, with the text they stand for.
/// `roxmltree` has no way to inject DTD entity definitions, so these are
/// substituted before parsing.
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", "\u{a0}"),
    ("&copy;", "\u{a9}"),
    ("&reg;", "\u{ae}"),
    ("&ndash;", "\u{2013}"),
    ("&mdash;", "\u{2014}"),
    ("&hellip;", "\u{2026}"),
    ("&laquo;", "\u{ab}"),
    ("&raquo;", "\u{bb}"),
];

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Clone)]
struct Attribute {
    namespace: Option<String>,
    prefix: Option<String>,
    name: String,
    value: String,
}

#[derive(Debug, Clone)]
enum Kind {
    Element {
        namespace: Option<String>,
        prefix: Option<String>,
        name: String,
        /// `xmlns` declarations made on this element, as `(prefix, uri)`.
        declarations: Vec<(Option<String>, String)>,
        attributes: Vec<Attribute>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: Kind,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// An XHTML document held in memory, for running the matcher outside a
/// browser. Elements are addressed by their index in document order.
#[derive(Debug, Clone)]
pub struct StaticDocument {
    location: String,
    ready_state: ReadyState,
    nodes: Vec<Node>,
}

impl StaticDocument {
    /// Parse an XHTML document served from `location`. Comments and
    /// processing instructions are dropped.
    pub fn parse(markup: &str, location: &str) -> anyhow::Result<Self> {
        let mut data = Cow::Borrowed(markup);
        for &(entity, replacement) in HTML_ENTITIES {
            if data.contains(entity) {
                data = Cow::Owned(data.replace(entity, replacement));
            }
        }

        let xml = match Document::parse(&data) {
            Err(roxmltree::Error::UnknownEntityReference(name, _)) => {
                anyhow::bail!("entity needs adding ({name})")
            }
            x => x,
        }
        .context("invalid xhtml")?;

        let mut doc = Self {
            location: location.to_owned(),
            ready_state: ReadyState::Complete,
            nodes: Vec::new(),
        };
        doc.push_node(xml.root_element(), None);
        Ok(doc)
    }

    fn push_node(&mut self, node: roxmltree::Node, parent: Option<usize>) {
        let kind = if node.is_element() {
            let namespace = node.tag_name().namespace();
            let prefix = namespace
                .filter(|&ns| node.lookup_namespace_uri(None) != Some(ns))
                .and_then(|ns| named_prefix(node, ns));
            let inherited: Vec<_> = node
                .parent_element()
                .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
                .unwrap_or_default();
            Kind::Element {
                namespace: namespace.map(ToOwned::to_owned),
                prefix,
                name: node.tag_name().name().to_owned(),
                declarations: node
                    .namespaces()
                    .filter(|ns| ns.uri() != NS_XML_URI)
                    .filter(|ns| !inherited.contains(&(ns.name(), ns.uri())))
                    .map(|ns| (ns.name().map(ToOwned::to_owned), ns.uri().to_owned()))
                    .collect(),
                attributes: node
                    .attributes()
                    .map(|a| Attribute {
                        namespace: a.namespace().map(ToOwned::to_owned),
                        prefix: a.namespace().and_then(|ns| named_prefix(node, ns)),
                        name: a.name().to_owned(),
                        value: a.value().to_owned(),
                    })
                    .collect(),
            }
        } else if let Some(text) = node.text().filter(|_| node.is_text()) {
            Kind::Text(text.to_owned())
        } else {
            return;
        };

        let idx = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(idx);
        }
        for child in node.children() {
            self.push_node(child, Some(idx));
        }
    }

    /// Point the document at a new location, as a history push or replace
    /// would. The links are left as they are.
    pub fn navigate(&mut self, location: &str) {
        self.location = location.to_owned();
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }

    /// Indices of all elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&i| matches!(self.nodes[i].kind, Kind::Element { .. }))
    }

    /// Namespace URI of an element, `None` for markup without namespaces.
    pub fn namespace(&self, element: usize) -> Option<&str> {
        match &self.nodes.get(element)?.kind {
            Kind::Element { namespace, .. } => namespace.as_deref(),
            Kind::Text(_) => None,
        }
    }

    /// Local name of an element.
    pub fn tag_name(&self, element: usize) -> Option<&str> {
        match &self.nodes.get(element)?.kind {
            Kind::Element { name, .. } => Some(name),
            Kind::Text(_) => None,
        }
    }

    /// Value of an attribute without a namespace, like `href` or `class`.
    pub fn attribute(&self, element: usize, name: &str) -> Option<&str> {
        self.find_attribute(element, None, name)
    }

    /// Value of a namespaced attribute, e.g. `xlink:href` is
    /// `("http://www.w3.org/1999/xlink", "href")`.
    pub fn attribute_ns(&self, element: usize, namespace: &str, name: &str) -> Option<&str> {
        self.find_attribute(element, Some(namespace), name)
    }

    fn find_attribute(&self, element: usize, namespace: Option<&str>, name: &str) -> Option<&str> {
        match &self.nodes.get(element)?.kind {
            Kind::Element { attributes, .. } => attributes
                .iter()
                .find(|a| a.name == name && a.namespace.as_deref() == namespace)
                .map(|a| a.value.as_str()),
            Kind::Text(_) => None,
        }
    }

    pub fn element_by_id(&self, id: &str) -> Option<usize> {
        self.elements().find(|&e| self.attribute(e, "id") == Some(id))
    }

    pub fn classes(&self, element: usize) -> Vec<&str> {
        self.attribute(element, "class")
            .map(|c| c.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, element: usize, class: &str) -> bool {
        self.classes(element).contains(&class)
    }

    fn set_class_attribute(&mut self, element: usize, value: String) {
        let Some(Kind::Element { attributes, .. }) = self.nodes.get_mut(element).map(|n| &mut n.kind)
        else {
            return;
        };
        match attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.name == "class")
        {
            Some(class) => class.value = value,
            None => attributes.push(Attribute {
                namespace: None,
                prefix: None,
                name: "class".to_owned(),
                value,
            }),
        }
    }

    /// Serialize back to XHTML, classes included.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        if !self.nodes.is_empty() {
            self.write_node(0, &mut out);
        }
        out
    }

    fn write_node(&self, idx: usize, out: &mut String) {
        let node = &self.nodes[idx];
        match &node.kind {
            Kind::Text(text) => escape_into(text, false, out),
            Kind::Element {
                prefix,
                name,
                declarations,
                attributes,
                ..
            } => {
                let name = match prefix {
                    Some(prefix) => format!("{prefix}:{name}"),
                    None => name.clone(),
                };
                let _ = write!(out, "<{name}");
                for (prefix, uri) in declarations {
                    match prefix {
                        Some(prefix) => {
                            let _ = write!(out, " xmlns:{prefix}=\"");
                        }
                        None => out.push_str(" xmlns=\""),
                    }
                    escape_into(uri, true, out);
                    out.push('"');
                }
                for attr in attributes {
                    out.push(' ');
                    if let Some(prefix) = &attr.prefix {
                        let _ = write!(out, "{prefix}:");
                    }
                    let _ = write!(out, "{}=\"", attr.name);
                    escape_into(&attr.value, true, out);
                    out.push('"');
                }
                if node.children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for &child in &node.children {
                    self.write_node(child, out);
                }
                let _ = write!(out, "</{name}>");
            }
        }
    }
}

/// A prefix bound to `uri` in scope at `node`. Namespaced attributes always
/// carry one, so a default-namespace binding of the same URI is skipped.
fn named_prefix(node: roxmltree::Node, uri: &str) -> Option<String> {
    node.lookup_prefix(uri)
        .or_else(|| {
            node.namespaces()
                .filter(|ns| ns.uri() == uri)
                .find_map(|ns| ns.name())
        })
        .map(ToOwned::to_owned)
}

fn escape_into(s: &str, attribute: bool, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

impl LinkDocument for StaticDocument {
    type Element = usize;

    fn location(&self) -> String {
        self.location.clone()
    }

    fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    fn links(&self) -> Vec<usize> {
        self.elements()
            .filter(|&e| matches!(self.namespace(e), None | Some(XHTML_NS)))
            .filter(|&e| matches!(self.tag_name(e), Some("a" | "area")))
            .filter(|&e| self.attribute(e, "href").is_some())
            .collect()
    }

    fn href(&self, link: &usize) -> Option<String> {
        self.attribute(*link, "href").map(ToOwned::to_owned)
    }

    fn query_selector_all(&self, selectors: &str) -> Vec<usize> {
        let selectors: Vec<_> = selectors
            .split(',')
            .map(str::trim)
            .filter_map(|s| {
                let selector = simplecss::Selector::parse(s);
                if selector.is_none() {
                    tracing::warn!(selector = s, "ignoring unparsable selector");
                }
                selector
            })
            .collect();

        self.elements()
            .filter(|&idx| {
                let node = ElementRef { doc: self, idx };
                selectors.iter().any(|s| s.matches(&node))
            })
            .collect()
    }

    fn add_class(&mut self, element: &usize, class: &str) {
        if self.has_class(*element, class) {
            return;
        }
        let mut value = self.attribute(*element, "class").unwrap_or("").trim().to_owned();
        if !value.is_empty() {
            value.push(' ');
        }
        value.push_str(class);
        self.set_class_attribute(*element, value);
    }

    fn remove_classes(&mut self, element: &usize, classes: &[&str]) {
        let Some(current) = self.attribute(*element, "class") else {
            return;
        };
        let value = current
            .split_ascii_whitespace()
            .filter(|c| !classes.contains(c))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_class_attribute(*element, value);
    }
}

#[derive(Clone, Copy)]
struct ElementRef<'a> {
    doc: &'a StaticDocument,
    idx: usize,
}

impl simplecss::Element for ElementRef<'_> {
    fn parent_element(&self) -> Option<Self> {
        let parent = self.doc.nodes[self.idx].parent?;
        Some(Self { idx: parent, ..*self })
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let parent = self.doc.nodes[self.idx].parent?;
        let siblings = &self.doc.nodes[parent].children;
        let pos = siblings.iter().position(|&s| s == self.idx)?;
        siblings[..pos]
            .iter()
            .rev()
            .find(|&&s| self.doc.tag_name(s).is_some())
            .map(|&idx| Self { idx, ..*self })
    }

    fn has_local_name(&self, local_name: &str) -> bool {
        self.doc.tag_name(self.idx) == Some(local_name)
    }

    fn attribute_matches(&self, local_name: &str, operator: simplecss::AttributeOperator) -> bool {
        self.doc
            .attribute(self.idx, local_name)
            .map_or(false, |v| operator.matches(v))
    }

    fn pseudo_class_matches(&self, class: simplecss::PseudoClass) -> bool {
        match class {
            simplecss::PseudoClass::FirstChild => {
                simplecss::Element::prev_sibling_element(self).is_none()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAV: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>Docs&nbsp;home</title></head>
<body>
  <nav id="nav">
    <a id="home" href="/">Home</a>
    <a id="docs" class="nav-link" href="/docs/">Docs</a>
    <a id="intro" class="nav-link is-active" href="intro">Intro</a>
    <a id="anchor">No href</a>
    <map><area id="area" href="/docs/intro/" /></map>
  </nav>
  <p class="is-ancestor">stale</p>
</body>
</html>"#;

    #[test]
    fn parses_links_in_document_order() -> anyhow::Result<()> {
        let doc = StaticDocument::parse(NAV, "https://x.com/docs/intro")?;
        let ids: Vec<_> = doc
            .links()
            .into_iter()
            .filter_map(|l| doc.attribute(l, "id"))
            .collect();
        assert_eq!(ids, ["home", "docs", "intro", "area"]);
        Ok(())
    }

    #[test]
    fn selector_list() -> anyhow::Result<()> {
        let doc = StaticDocument::parse(NAV, "https://x.com/")?;
        let found: Vec<_> = doc
            .query_selector_all(".is-active, .is-ancestor")
            .into_iter()
            .map(|e| doc.tag_name(e).unwrap_or_default())
            .collect();
        assert_eq!(found, ["a", "p"]);
        assert_eq!(doc.query_selector_all("nav > a:first-child").len(), 1);
        Ok(())
    }

    #[test]
    fn class_edits() -> anyhow::Result<()> {
        let mut doc = StaticDocument::parse(NAV, "https://x.com/")?;
        let intro = doc.element_by_id("intro").context("intro")?;
        let home = doc.element_by_id("home").context("home")?;

        doc.add_class(&intro, "is-active");
        assert_eq!(doc.classes(intro), ["nav-link", "is-active"]);

        doc.remove_classes(&intro, &["is-active", "is-ancestor"]);
        assert_eq!(doc.classes(intro), ["nav-link"]);

        doc.add_class(&home, "is-ancestor");
        assert_eq!(doc.attribute(home, "class"), Some("is-ancestor"));
        Ok(())
    }

    #[test]
    fn markup_round_trip_keeps_classes() -> anyhow::Result<()> {
        let mut doc = StaticDocument::parse(NAV, "https://x.com/")?;
        let home = doc.element_by_id("home").context("home")?;
        doc.add_class(&home, "is-active");

        let markup = doc.to_markup();
        assert!(markup.contains(r#"<a id="home" href="/" class="is-active">Home</a>"#));
        assert!(markup.contains("Docs\u{a0}home"));

        let reparsed = StaticDocument::parse(&markup, "https://x.com/")?;
        assert_eq!(reparsed.links().len(), doc.links().len());
        Ok(())
    }

    const ICONS: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en">
<body>
  <a id="docs" href="/docs">Docs</a>
  <svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
    <a id="icon" xlink:href="/docs"><circle r="4"/></a>
  </svg>
</body>
</html>"#;

    #[test]
    fn svg_anchors_are_not_links() -> anyhow::Result<()> {
        let mut doc = StaticDocument::parse(ICONS, "https://x.com/docs")?;
        let icon = doc.element_by_id("icon").context("icon")?;
        assert_eq!(doc.namespace(icon), Some("http://www.w3.org/2000/svg"));
        assert_eq!(doc.attribute(icon, "href"), None);
        assert_eq!(
            doc.attribute_ns(icon, "http://www.w3.org/1999/xlink", "href"),
            Some("/docs")
        );

        let links = doc.links();
        assert_eq!(links.len(), 1);
        assert_eq!(doc.attribute(links[0], "id"), Some("docs"));

        let location = doc.location();
        crate::apply_active_state(&mut doc, &location);
        assert!(doc.classes(icon).is_empty());
        assert_eq!(doc.attribute(icon, "class"), None);
        Ok(())
    }

    #[test]
    fn markup_round_trip_keeps_namespaces() -> anyhow::Result<()> {
        let mut doc = StaticDocument::parse(ICONS, "https://x.com/docs")?;
        let location = doc.location();
        crate::apply_active_state(&mut doc, &location);

        let markup = doc.to_markup();
        assert!(
            markup.starts_with(r#"<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en">"#),
            "{markup}"
        );
        assert!(markup.contains(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#
        ));
        assert!(markup.contains(r#"<a id="icon" xlink:href="/docs">"#));

        let reparsed = StaticDocument::parse(&markup, "https://x.com/docs")?;
        let icon = reparsed.element_by_id("icon").context("icon")?;
        assert_eq!(reparsed.namespace(icon), Some("http://www.w3.org/2000/svg"));
        assert_eq!(
            reparsed.attribute_ns(icon, "http://www.w3.org/1999/xlink", "href"),
            Some("/docs")
        );
        let html = reparsed.elements().next().context("root")?;
        assert_eq!(reparsed.attribute_ns(html, NS_XML_URI, "lang"), Some("en"));
        assert_eq!(reparsed.to_markup(), markup);
        Ok(())
    }

    #[test]
    fn unknown_entity() {
        let err = StaticDocument::parse("<p>&trade;</p>", "https://x.com/").unwrap_err();
        assert!(err.to_string().contains("trade"), "{err}");
    }
}
