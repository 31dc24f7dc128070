//! Rendered fragments.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use markup5ever_rcdom::Handle;

use super::dom::{self, NodeMap};
use crate::reactive::Effect;

/// Moves a binding's target nodes onto the nodes that absorbed them.
pub(crate) type Retargeter = Box<dyn Fn(&NodeMap)>;

/// Everything a bind walk installed, owned by the fragment it produced.
#[derive(Default)]
pub(crate) struct BindScope {
    pub(crate) bindings: Vec<Effect>,
    pub(crate) children: Vec<Fragment>,
    pub(crate) disposers: Vec<Box<dyn FnOnce()>>,
    pub(crate) retargeters: Vec<Retargeter>,
}

struct FragmentInner {
    root: Handle,
    nodes: RefCell<Vec<Handle>>,
    bindings: Vec<Effect>,
    children: Vec<Fragment>,
    disposers: RefCell<Vec<Box<dyn FnOnce()>>>,
    retargeters: Vec<Retargeter>,
    disposed: Cell<bool>,
}

/// The live result of evaluating a template.
///
/// A fragment owns a detached container with the rendered nodes, plus the
/// binding effects that keep them current. Mounting moves the nodes out
/// of the container; the fragment still tracks them through [`nodes`].
///
/// Cloning is cheap and shares identity.
///
/// [`nodes`]: Fragment::nodes
#[derive(Clone)]
pub struct Fragment {
    inner: Rc<FragmentInner>,
}

impl Fragment {
    pub(crate) fn from_scope(root: Handle, scope: BindScope) -> Self {
        let nodes = dom::children(&root);
        Self {
            inner: Rc::new(FragmentInner {
                root,
                nodes: RefCell::new(nodes),
                bindings: scope.bindings,
                children: scope.children,
                disposers: RefCell::new(scope.disposers),
                retargeters: scope.retargeters,
                disposed: Cell::new(false),
            }),
        }
    }

    /// The container the template was parsed into.
    pub fn root(&self) -> &Handle {
        &self.inner.root
    }

    /// Top-level nodes as they were after binding, or the nodes that
    /// absorbed them during keyed reconciliation.
    pub fn nodes(&self) -> Vec<Handle> {
        self.inner.nodes.borrow().clone()
    }

    /// First top-level element, if any.
    pub fn first_element(&self) -> Option<Handle> {
        self.inner.nodes.borrow().iter().find(|node| dom::is_element(node)).cloned()
    }

    /// Serialize the current state of the fragment's nodes.
    pub fn to_html(&self) -> String {
        if !self.inner.root.children.borrow().is_empty() {
            return dom::inner_html(&self.inner.root);
        }
        self.inner.nodes.borrow().iter().map(dom::outer_html).collect()
    }

    /// Serialized text content of the fragment's nodes.
    pub fn text_content(&self) -> String {
        self.inner.nodes.borrow().iter().map(dom::text_content).collect()
    }

    /// Append the fragment's nodes to `parent`. Nodes still in the
    /// container are moved in their current order, which includes list
    /// items rendered since binding.
    pub fn mount(&self, parent: &Handle) {
        let nodes = if self.inner.root.children.borrow().is_empty() {
            self.nodes()
        } else {
            dom::children(&self.inner.root)
        };
        for node in nodes {
            dom::append(parent, node);
        }
    }

    /// Stop every binding this fragment and its nested fragments own.
    /// The nodes keep their last rendered state.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        for binding in &self.inner.bindings {
            binding.dispose();
        }
        for child in &self.inner.children {
            child.dispose();
        }
        let disposers = std::mem::take(&mut *self.inner.disposers.borrow_mut());
        for disposer in disposers {
            disposer();
        }
        tracing::trace!(bindings = self.inner.bindings.len(), "Disposed fragment");
    }

    /// Move every binding onto the nodes recorded in `map`. Used when a
    /// keyed list morphs this fragment's nodes into nodes already on
    /// screen, so the surviving nodes follow this fragment's signals.
    pub(crate) fn retarget(&self, map: &NodeMap) {
        if map.is_empty() || self.is_disposed() {
            return;
        }
        for node in self.inner.nodes.borrow_mut().iter_mut() {
            dom::retarget(node, map);
        }
        for retargeter in &self.inner.retargeters {
            retargeter(map);
        }
        for child in &self.inner.children {
            child.retarget(map);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of binding effects owned directly by this fragment.
    pub fn binding_count(&self) -> usize {
        self.inner.bindings.len()
    }

    pub fn bindings(&self) -> &[Effect] {
        &self.inner.bindings
    }

    pub fn ptr_eq(&self, other: &Fragment) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("nodes", &self.inner.nodes.borrow().len())
            .field("bindings", &self.inner.bindings.len())
            .field("children", &self.inner.children.len())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}
