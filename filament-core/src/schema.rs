//! Attribute schemas.
//!
//! A component declares up front which attributes it reflects as
//! properties. Each declared attribute gets a coercion function and a
//! backing signal, so property reads are tracked like any other signal
//! read and attribute changes flow into the component's bindings.
//!
//! # How Reflection Works
//!
//! - [`AttributeSchema::attribute_changed`] takes a raw attribute value
//!   from the host, coerces it and stores it in the attribute's signal.
//!   A removed attribute (`None`) stores [`Value::Null`].
//! - [`AttributeSchema::reflect`] installs an effect that writes every
//!   signal back to a node's attributes. `Null` and `false` remove the
//!   attribute, `true` writes it empty, anything else writes its text.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use markup5ever_rcdom::Handle;

use crate::reactive::{Effect, Signal};
use crate::template::{dom, Value};

/// Converts a raw attribute value into a property value.
pub type Coerce = fn(&str) -> Value;

/// Listener invoked with `(name, old, new)` raw values.
type ChangeListener = Rc<dyn Fn(&str, Option<&str>, Option<&str>)>;

/// Stock coercions.
pub mod coerce {
    use super::Value;

    pub fn string(raw: &str) -> Value {
        Value::Text(raw.to_string())
    }

    /// Parse a number; unparsable input is `Null`.
    pub fn number(raw: &str) -> Value {
        let raw = raw.trim();
        if let Ok(int) = raw.parse::<i64>() {
            return Value::Int(int);
        }
        raw.parse::<f64>().map_or(Value::Null, Value::Float)
    }

    /// Presence means `true`, except for the literal `"false"`.
    pub fn boolean(raw: &str) -> Value {
        Value::Bool(raw != "false")
    }
}

struct Attribute {
    property: String,
    coerce: Coerce,
    raw: Signal<Option<String>>,
    value: Signal<Value>,
}

/// Convert an attribute name to its property name: `max-count` becomes
/// `maxCount`, a leading uppercase run is lowered.
pub fn property_name(attribute: &str) -> String {
    let rest = attribute.trim_start_matches(|ch: char| ch.is_ascii_uppercase());
    let mut out = attribute[..attribute.len() - rest.len()].to_ascii_lowercase();
    let mut chars = rest.chars().peekable();
    while let Some(ch) = chars.next() {
        if matches!(ch, '-' | '_' | ' ') {
            if let Some(next) = chars.next_if(|next| next.is_ascii_alphabetic()) {
                out.push(next.to_ascii_uppercase());
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Builder for [`AttributeSchema`].
#[derive(Default)]
pub struct AttributeSchemaBuilder {
    attributes: IndexMap<String, Coerce>,
}

impl AttributeSchemaBuilder {
    /// Declare an attribute. Declaring a name twice keeps the last
    /// coercion.
    pub fn attribute(mut self, name: impl Into<String>, coerce: Coerce) -> Self {
        self.attributes.insert(name.into(), coerce);
        self
    }

    pub fn build(self) -> AttributeSchema {
        let attributes = self
            .attributes
            .into_iter()
            .map(|(name, coerce)| {
                let attribute = Attribute {
                    property: property_name(&name),
                    coerce,
                    raw: Signal::new(None),
                    value: Signal::new(Value::Null),
                };
                (name, attribute)
            })
            .collect();
        AttributeSchema {
            attributes,
            listeners: Vec::new(),
        }
    }
}

/// Declared attributes and their backing signals.
pub struct AttributeSchema {
    attributes: IndexMap<String, Attribute>,
    listeners: Vec<ChangeListener>,
}

impl AttributeSchema {
    pub fn builder() -> AttributeSchemaBuilder {
        AttributeSchemaBuilder::default()
    }

    /// Declared attribute names, in declaration order.
    pub fn observed_attributes(&self) -> Vec<&str> {
        self.attributes.keys().map(String::as_str).collect()
    }

    /// The property name for a declared attribute.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|attr| attr.property.as_str())
    }

    /// Register a listener for every call to
    /// [`attribute_changed`](Self::attribute_changed).
    pub fn on_attribute_changed(&mut self, listener: impl Fn(&str, Option<&str>, Option<&str>) + 'static) {
        self.listeners.push(Rc::new(listener));
    }

    /// Record a new raw value for `name`. Returns `false` for undeclared
    /// names, which are logged.
    pub fn attribute_changed(&self, name: &str, raw: Option<&str>) -> bool {
        let Some(attr) = self.attributes.get(name) else {
            tracing::error!(attribute = name, "Attribute is not declared in the schema");
            return false;
        };
        let old = attr.raw.get_untracked();
        attr.raw.set(raw.map(str::to_string));
        attr.value.set(raw.map_or(Value::Null, attr.coerce));
        for listener in &self.listeners {
            listener(name, old.as_deref(), raw);
        }
        true
    }

    /// The backing signal for `name`.
    pub fn signal(&self, name: &str) -> Option<Signal<Value>> {
        self.attributes.get(name).map(|attr| attr.value.clone())
    }

    /// The last raw value recorded for `name`.
    pub fn raw(&self, name: &str) -> Option<String> {
        self.attributes.get(name).and_then(|attr| attr.raw.get())
    }

    /// Current property value. Tracked.
    pub fn get(&self, name: &str) -> Value {
        self.attributes
            .get(name)
            .map_or(Value::Null, |attr| attr.value.get())
    }

    /// Set a property directly. The raw value follows the property's text.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        let Some(attr) = self.attributes.get(name) else {
            tracing::error!(attribute = name, "Attribute is not declared in the schema");
            return false;
        };
        let value = value.into();
        let raw = if value.is_null() { None } else { Some(value.to_text()) };
        attr.raw.set(raw);
        attr.value.set(value);
        true
    }

    /// Seed every declared attribute from `node`'s current attributes.
    pub fn read_from(&self, node: &Handle) {
        for name in self.attributes.keys() {
            self.attribute_changed(name, dom::attr(node, name).as_deref());
        }
    }

    /// Keep `node`'s attributes in sync with the schema's signals.
    pub fn reflect(&self, node: &Handle) -> Effect {
        let node = node.clone();
        let signals: Vec<(String, Signal<Value>)> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.value.clone()))
            .collect();
        Effect::new(move || {
            for (name, signal) in &signals {
                match signal.get() {
                    Value::Null | Value::Bool(false) => {
                        dom::remove_attr(&node, name);
                    }
                    Value::Bool(true) => dom::set_attr(&node, name, ""),
                    value => dom::set_attr(&node, name, &value.to_text()),
                }
            }
        })
    }
}

impl fmt::Debug for AttributeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeSchema")
            .field("attributes", &self.observed_attributes())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
