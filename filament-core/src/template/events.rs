//! Event handler table.
//!
//! Handlers bound through `on*` attributes live in a thread-local table
//! keyed by node. Entries hold a weak reference to their node, so a node
//! that has been dropped never matches a later node that reuses its
//! address.
//!
//! # How Dispatch Works
//!
//! [`dispatch`] invokes the handler on the target, then walks up through
//! the parents invoking each matching handler, until the root is reached
//! or a handler calls [`Event::stop_propagation`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use markup5ever_rcdom::{Handle, Node};

use super::dom;
use super::value::Callback;

/// Entries are swept for dead nodes whenever the table grows past a
/// multiple of this size.
const SWEEP_INTERVAL: usize = 256;

struct NodeHandlers {
    node: Weak<Node>,
    handlers: IndexMap<String, Callback>,
}

thread_local! {
    static EVENT_TABLE: RefCell<HashMap<usize, NodeHandlers>> = RefCell::new(HashMap::new());
}

fn key(node: &Handle) -> usize {
    dom::node_key(node)
}

fn is_live(entry: &NodeHandlers, node: &Handle) -> bool {
    entry
        .node
        .upgrade()
        .is_some_and(|live| Rc::ptr_eq(&live, node))
}

/// An event delivered to bound handlers.
#[derive(Debug)]
pub struct Event {
    name: String,
    target: Handle,
    current_target: RefCell<Handle>,
    stopped: Cell<bool>,
}

impl Event {
    pub fn new(name: impl Into<String>, target: Handle) -> Self {
        Self {
            name: name.into(),
            current_target: RefCell::new(target.clone()),
            target,
            stopped: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> &Handle {
        &self.target
    }

    /// The node whose handler is currently running.
    pub fn current_target(&self) -> Handle {
        self.current_target.borrow().clone()
    }

    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }
}

/// Bind `callback` as the `event` handler of `node`, replacing any
/// previous handler for that event.
pub fn bind(node: &Handle, event: &str, callback: Callback) {
    let swept = EVENT_TABLE.with(|table| {
        let mut table = table.borrow_mut();
        let swept = if table.len() % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            sweep(&mut table)
        } else {
            Vec::new()
        };

        let entry = table.entry(key(node)).or_insert_with(|| NodeHandlers {
            node: Rc::downgrade(node),
            handlers: IndexMap::new(),
        });
        if !is_live(entry, node) {
            entry.node = Rc::downgrade(node);
            entry.handlers.clear();
        }
        entry.handlers.insert(event.to_string(), callback);
        swept
    });
    drop(swept);
    tracing::trace!(event, "Bound event handler");
}

fn sweep(table: &mut HashMap<usize, NodeHandlers>) -> Vec<IndexMap<String, Callback>> {
    let mut removed = Vec::new();
    table.retain(|_, entry| {
        if entry.node.strong_count() > 0 {
            true
        } else {
            removed.push(std::mem::take(&mut entry.handlers));
            false
        }
    });
    removed
}

/// Remove the `event` handler of `node`. Returns whether one was bound.
pub fn unbind(node: &Handle, event: &str) -> bool {
    let removed = EVENT_TABLE.with(|table| {
        let mut table = table.borrow_mut();
        match table.get_mut(&key(node)) {
            Some(entry) if is_live(entry, node) => entry.handlers.shift_remove(event),
            _ => None,
        }
    });
    removed.is_some()
}

pub fn handler(node: &Handle, event: &str) -> Option<Callback> {
    EVENT_TABLE.with(|table| {
        let table = table.borrow();
        let entry = table.get(&key(node))?;
        if !is_live(entry, node) {
            return None;
        }
        entry.handlers.get(event).cloned()
    })
}

/// Number of handlers bound on `node`.
pub fn handler_count(node: &Handle) -> usize {
    EVENT_TABLE.with(|table| {
        table
            .borrow()
            .get(&key(node))
            .filter(|entry| is_live(entry, node))
            .map_or(0, |entry| entry.handlers.len())
    })
}

/// Move every handler bound on `from` onto `to`, replacing what `to` had.
pub(crate) fn transfer(from: &Handle, to: &Handle) {
    if Rc::ptr_eq(from, to) {
        return;
    }
    let replaced = EVENT_TABLE.with(|table| {
        let mut table = table.borrow_mut();
        let handlers = match table.remove(&key(from)) {
            Some(entry) if is_live(&entry, from) => entry.handlers,
            _ => IndexMap::new(),
        };
        if handlers.is_empty() {
            return table.remove(&key(to));
        }
        table.insert(
            key(to),
            NodeHandlers {
                node: Rc::downgrade(to),
                handlers,
            },
        )
    });
    drop(replaced);
}

/// Dispatch `event` at `target`, bubbling to its ancestors. Returns the
/// number of handlers invoked.
pub fn dispatch(target: &Handle, event: &str) -> usize {
    dispatch_event(&Event::new(event, target.clone()))
}

pub fn dispatch_event(event: &Event) -> usize {
    let mut invoked = 0;
    let mut current = Some(event.target().clone());
    while let Some(node) = current {
        if let Some(callback) = handler(&node, event.name()) {
            *event.current_target.borrow_mut() = node.clone();
            callback.call(event);
            invoked += 1;
            if event.is_propagation_stopped() {
                break;
            }
        }
        current = dom::parent(&node);
    }
    tracing::trace!(event = event.name(), invoked, "Dispatched event");
    invoked
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
