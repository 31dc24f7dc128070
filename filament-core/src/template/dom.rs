//! Host tree helpers.
//!
//! Templates render into an `rcdom` tree. These helpers cover the
//! handful of mutations the binder and reconciler need: moving nodes
//! between parents, reading and writing attributes and text, and
//! serializing subtrees back to markup.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{Attribute, LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Parse markup in a `<body>` context and return a detached container
/// holding the top-level nodes.
pub fn parse_fragment(markup: &str) -> Handle {
    let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"));
    let dom = html5ever::parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
        .one(markup);

    let container = create_container();
    let html = dom.document.children.borrow().first().cloned();
    if let Some(html) = html {
        let children = std::mem::take(&mut *html.children.borrow_mut());
        for child in children {
            child.parent.set(Some(Rc::downgrade(&container)));
            container.children.borrow_mut().push(child);
        }
    }
    container
}

/// An empty detached container.
pub fn create_container() -> Handle {
    Node::new(NodeData::Document)
}

/// Identity of a node, stable while the node is alive.
pub(crate) fn node_key(node: &Handle) -> usize {
    Rc::as_ptr(node) as usize
}

/// Nodes merged away by a morph, mapped to the nodes that absorbed them.
pub(crate) type NodeMap = HashMap<usize, Handle>;

/// Point `node` at the node that absorbed it, if any.
pub(crate) fn retarget(node: &mut Handle, map: &NodeMap) {
    if let Some(target) = map.get(&node_key(node)) {
        *node = target.clone();
    }
}

pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

pub fn create_comment(text: &str) -> Handle {
    Node::new(NodeData::Comment {
        contents: StrTendril::from_slice(text),
    })
}

// ---- Structure ----

pub fn parent(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(Weak::upgrade);
    node.parent.set(weak);
    parent
}

/// The parent and this node's index among its children.
fn position(node: &Handle) -> Option<(Handle, usize)> {
    let parent = parent(node)?;
    let index = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, node))?;
    Some((parent, index))
}

pub fn children(node: &Handle) -> Vec<Handle> {
    node.children.borrow().clone()
}

pub fn next_sibling(node: &Handle) -> Option<Handle> {
    let (parent, index) = position(node)?;
    let sibling = parent.children.borrow().get(index + 1).cloned();
    sibling
}

/// Remove a node from its parent. No-op for detached nodes.
pub fn detach(node: &Handle) {
    if let Some((parent, index)) = position(node) {
        parent.children.borrow_mut().remove(index);
    }
    node.parent.set(None);
}

pub fn append(parent: &Handle, child: Handle) {
    detach(&child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Move `node` directly before `anchor`.
pub fn insert_before(anchor: &Handle, node: Handle) {
    if Rc::ptr_eq(anchor, &node) {
        return;
    }
    detach(&node);
    let Some((parent, index)) = position(anchor) else {
        tracing::warn!("insert_before called with a detached anchor");
        return;
    };
    node.parent.set(Some(Rc::downgrade(&parent)));
    parent.children.borrow_mut().insert(index, node);
}

/// Replace `old` with `nodes`, in order.
pub fn replace_with(old: &Handle, nodes: Vec<Handle>) {
    for node in &nodes {
        if !Rc::ptr_eq(node, old) {
            detach(node);
        }
    }
    let Some((parent, index)) = position(old) else {
        return;
    };
    let mut children = parent.children.borrow_mut();
    children.remove(index);
    old.parent.set(None);
    for (offset, node) in nodes.into_iter().enumerate() {
        node.parent.set(Some(Rc::downgrade(&parent)));
        children.insert(index + offset, node);
    }
}

// ---- Elements and attributes ----

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

pub fn tag_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

pub fn attr(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// All attributes as `(name, value)` pairs, in document order.
pub fn attributes(node: &Handle) -> Vec<(String, String)> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn set_attr(node: &Handle, name: &str, value: &str) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();
    match attrs.iter_mut().find(|attr| &*attr.name.local == name) {
        Some(attr) => {
            if &*attr.value != value {
                attr.value = StrTendril::from_slice(value);
            }
        }
        None => attrs.push(Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
            value: StrTendril::from_slice(value),
        }),
    }
}

/// Remove an attribute. Returns whether it was present.
pub fn remove_attr(node: &Handle, name: &str) -> bool {
    let NodeData::Element { attrs, .. } = &node.data else {
        return false;
    };
    let mut attrs = attrs.borrow_mut();
    let before = attrs.len();
    attrs.retain(|attr| &*attr.name.local != name);
    attrs.len() != before
}

/// Depth-first search for elements with the given tag name.
pub fn find_all(root: &Handle, tag: &str) -> Vec<Handle> {
    let mut found = Vec::new();
    collect(root, &mut |node| tag_name(node).as_deref() == Some(tag), &mut found);
    found
}

pub fn find_first(root: &Handle, tag: &str) -> Option<Handle> {
    find_all(root, tag).into_iter().next()
}

/// Elements whose attribute `name` equals `value`.
pub fn find_by_attr(root: &Handle, name: &str, value: &str) -> Vec<Handle> {
    let mut found = Vec::new();
    collect(root, &mut |node| attr(node, name).as_deref() == Some(value), &mut found);
    found
}

fn collect(node: &Handle, matches: &mut dyn FnMut(&Handle) -> bool, found: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if matches(child) {
            found.push(child.clone());
        }
        collect(child, matches, found);
    }
}

// ---- Text ----

pub fn is_text(node: &Handle) -> bool {
    matches!(node.data, NodeData::Text { .. })
}

/// Whitespace-only text.
pub fn is_blank_text(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { contents } => contents.borrow().trim().is_empty(),
        _ => false,
    }
}

pub fn text(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// Overwrite a text node's contents. Unchanged text is left alone.
pub fn set_text(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        let mut contents = contents.borrow_mut();
        if &**contents != text {
            *contents = StrTendril::from_slice(text);
        }
    }
}

/// Concatenated text of every descendant text node.
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    push_text(node, &mut out);
    out
}

fn push_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        push_text(child, out);
    }
}

// ---- Serialization ----

pub fn inner_html(node: &Handle) -> String {
    serialize_node(node, TraversalScope::ChildrenOnly(None))
}

pub fn outer_html(node: &Handle) -> String {
    match node.data {
        NodeData::Document => inner_html(node),
        _ => serialize_node(node, TraversalScope::IncludeNode),
    }
}

fn serialize_node(node: &Handle, scope: TraversalScope) -> String {
    let mut out = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };
    if let Err(error) = serialize(&mut out, &handle, opts) {
        tracing::error!(%error, "Failed to serialize node tree");
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
