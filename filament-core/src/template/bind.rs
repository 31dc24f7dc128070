//! The bind walk.
//!
//! After a pass's markup is parsed, the walk visits every text node and
//! element attribute looking for the pass's placeholders and replaces
//! each with a live binding:
//!
//! - signal tokens in text become content slots driven by an effect,
//! - signal tokens in attribute values become attribute effects,
//! - an attribute whose whole value is a callback token binds an event
//!   handler and is removed,
//! - fragment markers are swapped for the nested fragment's nodes.
//!
//! Nested fragments are spliced, not walked; their bindings already exist.

use std::cell::RefCell;
use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};
use smallvec::SmallVec;

use super::dom;
use super::events;
use super::fragment::{BindScope, Fragment};
use super::pass::{callback_id, signal_placeholder, split_signals, RenderPass, Segment, FRAGMENT_MARKER};
use super::reconcile::Slot;
use super::value::Getter;
use crate::config::with_template_config;
use crate::reactive::{Effect, EffectKind};

enum AttrPart {
    Literal(String),
    Getter(Getter),
}

struct Binder {
    pass: RenderPass,
    scope: BindScope,
    key_attribute: String,
    event_prefix: String,
}

/// Install bindings for `pass` into the tree under `root`.
pub(crate) fn bind(root: Handle, pass: RenderPass) -> Fragment {
    let (key_attribute, event_prefix) = with_template_config(|config| {
        (config.key_attribute.clone(), config.event_prefix.clone())
    });
    let mut binder = Binder {
        pass,
        scope: BindScope::default(),
        key_attribute,
        event_prefix,
    };
    binder.walk(&root);
    binder.report_unbound();
    Fragment::from_scope(root, binder.scope)
}

fn unresolved(kind: &'static str, id: &str) {
    tracing::error!(kind, placeholder = %id, "Unknown placeholder in template output");
}

impl Binder {
    fn walk(&mut self, parent: &Handle) {
        for child in dom::children(parent) {
            match &child.data {
                NodeData::Text { contents } => {
                    let text = contents.borrow().to_string();
                    if super::pass::contains_signal(&text) {
                        self.bind_text(&child, &text);
                    }
                }
                NodeData::Element { .. } => {
                    if let Some(id) = dom::attr(&child, FRAGMENT_MARKER) {
                        self.splice_fragment(&child, &id);
                        continue;
                    }
                    self.bind_attributes(&child);
                    self.walk(&child);
                }
                _ => {}
            }
        }
    }

    fn bind_text(&mut self, node: &Handle, text: &str) {
        let mut replacement = Vec::new();
        let mut slots = Vec::new();
        for segment in split_signals(text) {
            match segment {
                Segment::Literal(literal) => replacement.push(dom::create_text(literal)),
                Segment::Signal(id) => match self.pass.signals.remove(id) {
                    Some(getter) => {
                        let anchor = dom::create_text("");
                        replacement.push(anchor.clone());
                        slots.push((anchor, getter));
                    }
                    None => {
                        unresolved("signal", id);
                        replacement.push(dom::create_text(&signal_placeholder(id)));
                    }
                },
            }
        }
        dom::replace_with(node, replacement);
        for (anchor, getter) in slots {
            self.bind_slot(anchor, getter);
        }
    }

    fn bind_slot(&mut self, anchor: Handle, getter: Getter) {
        let slot = Rc::new(RefCell::new(Slot::new(anchor)));
        let state = slot.clone();
        let key_attribute = self.key_attribute.clone();
        let binding = Effect::with_kind(EffectKind::Binding, move || {
            let value = getter.call();
            state.borrow_mut().apply(value, &key_attribute);
        });
        self.scope.bindings.push(binding);
        let target = slot.clone();
        self.scope.retargeters.push(Box::new(move |map| {
            if let Ok(mut slot) = target.try_borrow_mut() {
                slot.retarget(map);
            }
        }));
        self.scope.disposers.push(Box::new(move || {
            if let Ok(mut slot) = slot.try_borrow_mut() {
                slot.dispose();
            }
        }));
    }

    fn bind_attributes(&mut self, element: &Handle) {
        for (name, value) in dom::attributes(element) {
            if let Some(id) = callback_id(&value) {
                self.bind_callback(element, &name, id);
            } else if super::pass::contains_signal(&value) {
                self.bind_attribute(element, name, &value);
            }
        }
    }

    fn bind_callback(&mut self, element: &Handle, name: &str, id: &str) {
        let Some(callback) = self.pass.callbacks.remove(id) else {
            unresolved("callback", id);
            return;
        };
        dom::remove_attr(element, name);
        let event = name
            .strip_prefix(self.event_prefix.as_str())
            .filter(|event| !event.is_empty())
            .unwrap_or(name);
        events::bind(element, event, callback);
    }

    fn bind_attribute(&mut self, element: &Handle, name: String, template: &str) {
        let parts: SmallVec<[AttrPart; 4]> = split_signals(template)
            .into_iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => AttrPart::Literal(literal.to_string()),
                Segment::Signal(id) => match self.pass.signals.remove(id) {
                    Some(getter) => AttrPart::Getter(getter),
                    None => {
                        unresolved("signal", id);
                        AttrPart::Literal(signal_placeholder(id))
                    }
                },
            })
            .collect();

        let target = Rc::new(RefCell::new(element.clone()));
        let node = target.clone();
        let binding = Effect::with_kind(EffectKind::Binding, move || {
            let mut text = String::new();
            let mut cleared = true;
            for part in &parts {
                match part {
                    AttrPart::Literal(literal) => {
                        if !literal.trim().is_empty() {
                            cleared = false;
                        }
                        text.push_str(literal);
                    }
                    AttrPart::Getter(getter) => {
                        let value = getter.call().resolve();
                        if !value.is_null() {
                            cleared = false;
                        }
                        text.push_str(&value.to_text());
                    }
                }
            }
            let node = node.borrow().clone();
            if cleared {
                dom::remove_attr(&node, &name);
            } else {
                dom::set_attr(&node, &name, &text);
            }
        });
        self.scope.bindings.push(binding);
        self.scope.retargeters.push(Box::new(move |map| {
            dom::retarget(&mut target.borrow_mut(), map);
        }));
    }

    fn splice_fragment(&mut self, marker: &Handle, id: &str) {
        let Some(fragment) = self.pass.fragments.remove(id) else {
            unresolved("fragment", id);
            dom::detach(marker);
            return;
        };
        let nodes = if fragment.root().children.borrow().is_empty() {
            fragment.nodes()
        } else {
            dom::children(fragment.root())
        };
        dom::replace_with(marker, nodes);
        self.scope.children.push(fragment);
    }

    /// Anything still in the pass maps ended up somewhere the walk does
    /// not bind, such as a comment or a partial attribute value.
    fn report_unbound(&self) {
        let leftovers = [
            ("signal", self.pass.signals.len()),
            ("callback", self.pass.callbacks.len()),
            ("fragment", self.pass.fragments.len()),
        ];
        for (kind, count) in leftovers {
            if count > 0 {
                tracing::error!(kind, count, "Placeholders were not bound and are left in the output");
            }
        }
    }
}
