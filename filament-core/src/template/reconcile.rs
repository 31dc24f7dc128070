//! Content slots and keyed reconciliation.
//!
//! A getter interpolated in text position drives a [`Slot`]. The first
//! non-null value it produces decides the slot's shape: primitive values
//! render into a single text node, fragments and lists render as a keyed
//! node list terminated by an empty comment. The shape is fixed from then
//! on. Null renders nothing and leaves the shape open.
//!
//! # How Reconciliation Works
//!
//! Each update collects the new top-level nodes along with their key
//! attribute. A node whose key was already rendered is morphed into the
//! existing node, which keeps its identity, so elements whose key
//! persists are never recreated. The new fragment's bindings are then
//! retargeted onto the existing nodes and the old fragment is disposed,
//! so the surviving node follows whatever the new render reads. New keys
//! insert fresh nodes, vanished
//! keys remove theirs. Finally nodes are moved into order, walking
//! backwards from the end marker and moving only nodes that are out of
//! place.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use super::dom::{self, NodeMap};
use super::events;
use super::fragment::Fragment;
use super::value::{report_invalid, Value};
use crate::error::{BindingKind, TemplateError};

/// A rendered node in a keyed list.
struct Item {
    key: String,
    node: Handle,
    owner: Option<Fragment>,
}

/// A keyed node list rendered before an end marker.
pub(crate) struct KeyedList {
    end: Handle,
    items: Vec<Item>,
    key_attribute: String,
}

impl KeyedList {
    fn mount(anchor: &Handle, key_attribute: String) -> Self {
        let end = dom::create_comment("");
        dom::replace_with(anchor, vec![end.clone()]);
        Self {
            end,
            items: Vec::new(),
            key_attribute,
        }
    }

    pub(crate) fn reconcile(&mut self, value: Value) {
        let fresh = self.collect(value);
        let mut previous: HashMap<String, Item> = self
            .items
            .drain(..)
            .map(|item| (item.key.clone(), item))
            .collect();

        let mut retired: Vec<Fragment> = Vec::new();
        let mut next = Vec::with_capacity(fresh.len());
        for item in fresh {
            let Some(existing) = previous.remove(&item.key) else {
                next.push(item);
                continue;
            };
            let mut absorbed = NodeMap::new();
            if morph(&existing.node, &item.node, &mut absorbed) {
                if let Some(owner) = &item.owner {
                    owner.retarget(&absorbed);
                }
                if !Rc::ptr_eq(&existing.node, &item.node) {
                    dom::detach(&item.node);
                }
                retired.extend(existing.owner);
                next.push(Item {
                    key: item.key,
                    node: existing.node,
                    owner: item.owner,
                });
            } else {
                tracing::debug!(key = %item.key, "Keyed node changed shape, replacing it");
                dom::replace_with(&existing.node, vec![item.node.clone()]);
                retired.extend(existing.owner);
                next.push(item);
            }
        }

        for stale in previous.into_values() {
            dom::detach(&stale.node);
            retired.extend(stale.owner);
        }

        let mut cursor = self.end.clone();
        for item in next.iter().rev() {
            let in_place = dom::next_sibling(&item.node).is_some_and(|after| Rc::ptr_eq(&after, &cursor));
            if !in_place {
                dom::insert_before(&cursor, item.node.clone());
            }
            cursor = item.node.clone();
        }

        let live: Vec<&Fragment> = next.iter().filter_map(|item| item.owner.as_ref()).collect();
        for fragment in retired {
            if !live.iter().any(|owner| owner.ptr_eq(&fragment)) {
                fragment.dispose();
            }
        }

        tracing::trace!(items = next.len(), "Reconciled keyed list");
        self.items = next;
    }

    fn collect(&self, value: Value) -> Vec<Item> {
        let mut items = Vec::new();
        self.visit(value, &mut items);

        let mut seen = HashSet::with_capacity(items.len());
        for (index, item) in items.iter_mut().enumerate() {
            if item.key.is_empty() {
                tracing::warn!(
                    index,
                    attribute = %self.key_attribute,
                    "List item has no key, falling back to its position"
                );
                item.key = format!("\u{1}{index}");
            } else if !seen.insert(item.key.clone()) {
                tracing::warn!(
                    index,
                    key = %item.key,
                    "Duplicate key in list, falling back to its position"
                );
                item.key = format!("\u{1}{index}");
            }
        }
        items
    }

    fn visit(&self, value: Value, items: &mut Vec<Item>) {
        match value {
            Value::Null | Value::Callback(_) => {}
            Value::Getter(getter) => self.visit(getter.call(), items),
            Value::List(values) => {
                for value in values {
                    self.visit(value, items);
                }
            }
            Value::Fragment(fragment) => {
                for node in fragment.nodes() {
                    let keep = dom::is_element(&node) || (dom::is_text(&node) && !dom::is_blank_text(&node));
                    if keep {
                        items.push(Item {
                            key: dom::attr(&node, &self.key_attribute).unwrap_or_default(),
                            node,
                            owner: Some(fragment.clone()),
                        });
                    }
                }
            }
            Value::Object(object) => report_invalid(&object),
            primitive => {
                let text = primitive.to_text();
                items.push(Item {
                    key: String::new(),
                    node: dom::create_text(&text),
                    owner: None,
                });
            }
        }
    }

    fn retarget(&mut self, map: &NodeMap) {
        dom::retarget(&mut self.end, map);
        for item in &mut self.items {
            dom::retarget(&mut item.node, map);
            if let Some(owner) = &item.owner {
                owner.retarget(map);
            }
        }
    }

    fn dispose(&mut self) {
        for item in self.items.drain(..) {
            if let Some(owner) = item.owner {
                owner.dispose();
            }
        }
    }
}

/// Make `existing` match `fresh` without replacing it. Returns `false`
/// when the two nodes cannot be merged. Every node merged away is
/// recorded in `absorbed` against the node that took its place.
fn morph(existing: &Handle, fresh: &Handle, absorbed: &mut NodeMap) -> bool {
    if Rc::ptr_eq(existing, fresh) {
        return true;
    }
    match (&existing.data, &fresh.data) {
        (
            NodeData::Element {
                name: old_name,
                attrs: old_attrs,
                ..
            },
            NodeData::Element {
                name: new_name,
                attrs: new_attrs,
                ..
            },
        ) if old_name == new_name => {
            let attrs = new_attrs.borrow().clone();
            *old_attrs.borrow_mut() = attrs;
            events::transfer(fresh, existing);
            morph_children(existing, fresh, absorbed);
        }
        (NodeData::Text { contents: old }, NodeData::Text { contents: new }) => {
            let text = new.borrow().clone();
            if *old.borrow() != text {
                *old.borrow_mut() = text;
            }
        }
        (NodeData::Comment { contents: old }, NodeData::Comment { contents: new }) if old == new => {}
        _ => return false,
    }
    absorbed.insert(dom::node_key(fresh), existing.clone());
    true
}

fn morph_children(existing: &Handle, fresh: &Handle, absorbed: &mut NodeMap) {
    let old = dom::children(existing);
    let new = dom::children(fresh);
    for (index, new_child) in new.iter().enumerate() {
        match old.get(index) {
            Some(old_child) => {
                if !morph(old_child, new_child, absorbed) {
                    dom::replace_with(old_child, vec![new_child.clone()]);
                }
            }
            None => dom::append(existing, new_child.clone()),
        }
    }
    for extra in old.iter().skip(new.len()) {
        dom::detach(extra);
    }
}

/// The render state behind a getter in content position.
pub(crate) enum Slot {
    /// Not rendered yet; holds the placeholder text node.
    Pending(Handle),
    Text(Handle),
    List(KeyedList),
}

impl Slot {
    pub(crate) fn new(anchor: Handle) -> Self {
        Slot::Pending(anchor)
    }

    #[cfg(test)]
    fn kind(&self) -> Option<BindingKind> {
        match self {
            Slot::Pending(_) => None,
            Slot::Text(_) => Some(BindingKind::Text),
            Slot::List(_) => Some(BindingKind::Nodes),
        }
    }

    /// Render `value` into the slot.
    ///
    /// # Panics
    ///
    /// Raises [`TemplateError::StructuralMismatch`] when a slot that
    /// rendered text is given nodes, or the reverse.
    pub(crate) fn apply(&mut self, value: Value, key_attribute: &str) {
        let value = value.resolve();
        let found = value.binding_kind();
        match self {
            Slot::Pending(anchor) => {
                let anchor = anchor.clone();
                match found {
                    None => dom::set_text(&anchor, ""),
                    Some(BindingKind::Nodes) => {
                        let mut list = KeyedList::mount(&anchor, key_attribute.to_string());
                        list.reconcile(value);
                        *self = Slot::List(list);
                    }
                    Some(BindingKind::Text) => {
                        dom::set_text(&anchor, &value.to_text());
                        *self = Slot::Text(anchor);
                    }
                }
            }
            Slot::Text(node) => match found {
                Some(BindingKind::Nodes) => TemplateError::StructuralMismatch {
                    expected: BindingKind::Text,
                    found: BindingKind::Nodes,
                }
                .raise(),
                _ => dom::set_text(node, &value.to_text()),
            },
            Slot::List(list) => match found {
                Some(BindingKind::Text) => TemplateError::StructuralMismatch {
                    expected: BindingKind::Nodes,
                    found: BindingKind::Text,
                }
                .raise(),
                _ => list.reconcile(value),
            },
        }
    }

    /// Follow the slot's nodes after a keyed morph absorbed them.
    pub(crate) fn retarget(&mut self, map: &NodeMap) {
        match self {
            Slot::Pending(node) | Slot::Text(node) => dom::retarget(node, map),
            Slot::List(list) => list.retarget(map),
        }
    }

    /// Dispose the fragments a list slot keeps alive.
    pub(crate) fn dispose(&mut self) {
        if let Slot::List(list) = self {
            list.dispose();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(keys: &[&str]) -> Value {
        let markup: String = keys
            .iter()
            .map(|key| format!(r#"<li key="{key}">{key}</li>"#))
            .collect();
        let root = dom::parse_fragment(&markup);
        Value::Fragment(Fragment::from_scope(root, Default::default()))
    }

    fn mounted() -> (Handle, Handle, Slot) {
        let root = dom::parse_fragment("<ul></ul>");
        let ul = dom::find_first(&root, "ul").unwrap();
        let anchor = dom::create_text("");
        dom::append(&ul, anchor.clone());
        (root, ul, Slot::new(anchor))
    }

    #[test]
    fn first_value_fixes_shape() {
        let (_root, ul, mut slot) = mounted();
        slot.apply(Value::from("plain"), "key");
        assert_eq!(slot.kind(), Some(BindingKind::Text));
        assert_eq!(dom::text_content(&ul), "plain");
    }

    #[test]
    fn reorder_keeps_identity() {
        let (_root, ul, mut slot) = mounted();
        slot.apply(keyed(&["a", "b", "c"]), "key");
        let before = dom::find_all(&ul, "li");

        slot.apply(keyed(&["c", "a", "b"]), "key");
        let after = dom::find_all(&ul, "li");
        assert_eq!(dom::text_content(&ul), "cab");
        assert!(Rc::ptr_eq(&before[2], &after[0]));
        assert!(Rc::ptr_eq(&before[0], &after[1]));
        assert!(Rc::ptr_eq(&before[1], &after[2]));
    }

    #[test]
    fn morph_updates_attributes_in_place() {
        let (_root, ul, mut slot) = mounted();
        let first = Value::Fragment(Fragment::from_scope(
            dom::parse_fragment(r#"<li key="a" class="old">x</li>"#),
            Default::default(),
        ));
        slot.apply(first, "key");
        let li = dom::find_first(&ul, "li").unwrap();

        let second = Value::Fragment(Fragment::from_scope(
            dom::parse_fragment(r#"<li key="a" class="new">y</li>"#),
            Default::default(),
        ));
        slot.apply(second, "key");
        assert!(Rc::ptr_eq(&li, &dom::find_first(&ul, "li").unwrap()));
        assert_eq!(dom::attr(&li, "class").as_deref(), Some("new"));
        assert_eq!(dom::text_content(&li), "y");
    }

    #[test]
    fn empty_list_clears_items() {
        let (_root, ul, mut slot) = mounted();
        slot.apply(keyed(&["a", "b"]), "key");
        slot.apply(Value::List(Vec::new()), "key");
        assert!(dom::find_all(&ul, "li").is_empty());
        assert_eq!(slot.kind(), Some(BindingKind::Nodes));
        assert_eq!(dom::children(&ul).len(), 1);
    }

    #[test]
    fn null_leaves_shape_open() {
        let (_root, ul, mut slot) = mounted();
        slot.apply(Value::Null, "key");
        assert_eq!(slot.kind(), None);
        assert_eq!(dom::text_content(&ul), "");

        slot.apply(keyed(&["a", "b"]), "key");
        assert_eq!(slot.kind(), Some(BindingKind::Nodes));
        assert_eq!(dom::text_content(&ul), "ab");
    }

    #[test]
    fn morph_records_absorbed_nodes() {
        let old = dom::parse_fragment("<li><b>x</b>y</li>");
        let new = dom::parse_fragment("<li><b>z</b>w</li>");
        let old_li = dom::find_first(&old, "li").unwrap();
        let new_li = dom::find_first(&new, "li").unwrap();
        let new_bold = dom::find_first(&new, "b").unwrap();

        let mut absorbed = NodeMap::new();
        assert!(morph(&old_li, &new_li, &mut absorbed));
        assert_eq!(dom::text_content(&old_li), "zw");
        assert_eq!(absorbed.len(), 4);
        assert!(Rc::ptr_eq(
            &absorbed[&dom::node_key(&new_bold)],
            &dom::find_first(&old, "b").unwrap()
        ));
    }

    #[test]
    fn retarget_follows_absorbed_anchor() {
        let (_root, _ul, mut slot) = mounted();
        slot.apply(Value::from("one"), "key");
        let Slot::Text(anchor) = &slot else {
            panic!("expected a text slot");
        };
        let replacement = dom::create_text("one");
        let mut absorbed = NodeMap::new();
        absorbed.insert(dom::node_key(anchor), replacement.clone());

        slot.retarget(&absorbed);
        slot.apply(Value::from("two"), "key");
        assert_eq!(dom::text(&replacement).as_deref(), Some("two"));
    }

    #[test]
    #[should_panic]
    fn text_slot_rejects_nodes() {
        let (_root, _ul, mut slot) = mounted();
        slot.apply(Value::from("plain"), "key");
        slot.apply(keyed(&["a"]), "key");
    }
}
