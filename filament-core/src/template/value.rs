//! Interpolated values.
//!
//! Everything a template can embed is a [`Value`]. Primitives are
//! stringified inline; getters, callbacks and nested fragments become
//! placeholders that the bind walk resolves; anything else is an
//! [`Value::Object`], which is a usage error when interpolated.

use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::events::Event;
use super::fragment::Fragment;
use crate::error::BindingKind;
use crate::reactive::{ReadSignal, Signal, SignalValue};

/// A value interpolated into a template.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent. Renders as empty content; clears a bound attribute.
    #[default]
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A reactive getter, re-read whenever its dependencies change.
    Getter(Getter),
    /// An event handler.
    Callback(Callback),
    /// A live node tree from an earlier evaluation.
    Fragment(Fragment),
    /// A sequence of values, rendered in order.
    List(Vec<Value>),
    /// Any other object. Never rendered.
    Object(Rc<dyn Debug>),
}

/// A tagged reactive getter.
#[derive(Clone)]
pub struct Getter(Rc<dyn Fn() -> Value>);

impl Getter {
    pub fn new<V, F>(f: F) -> Self
    where
        V: Into<Value>,
        F: Fn() -> V + 'static,
    {
        Getter(Rc::new(move || f().into()))
    }

    /// Read the current value, tracking dependencies if inside an effect.
    pub fn call(&self) -> Value {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &Getter) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Getter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Getter(..)")
    }
}

/// An event handler bound through an `on*` attribute.
///
/// The return value is ignored when handling events. Static rendering
/// invokes the callback once and inlines what it returns.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&Event) -> Value>);

impl Callback {
    pub fn new<R, F>(f: F) -> Self
    where
        R: Into<Value>,
        F: Fn(&Event) -> R + 'static,
    {
        Callback(Rc::new(move |event| f(event).into()))
    }

    pub fn call(&self, event: &Event) -> Value {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

pub(crate) const INVALID_VALUE_MESSAGE: &str =
    "An invalid value was passed to a template function. Non-primitive values are not supported.";

/// Log a usage error for a value that cannot be rendered.
pub(crate) fn report_invalid(value: &dyn Debug) {
    tracing::error!(value = ?value, "{}", INVALID_VALUE_MESSAGE);
}

impl Value {
    /// A reactive getter.
    pub fn reactive<V, F>(f: F) -> Self
    where
        V: Into<Value>,
        F: Fn() -> V + 'static,
    {
        Value::Getter(Getter::new(f))
    }

    /// An event handler. See [`Callback`] for how its return value is used.
    pub fn callback<R, F>(f: F) -> Self
    where
        R: Into<Value>,
        F: Fn(&Event) -> R + 'static,
    {
        Value::Callback(Callback::new(f))
    }

    /// An arbitrary object. Interpolating it is a usage error.
    pub fn object(value: impl Debug + 'static) -> Self {
        Value::Object(Rc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Replace getters with their current values, recursively.
    pub fn resolve(self) -> Value {
        match self {
            Value::Getter(getter) => getter.call().resolve(),
            Value::List(items) => Value::List(items.into_iter().map(Value::resolve).collect()),
            other => other,
        }
    }

    /// The kind of binding this value needs, or `None` for `Null`, which
    /// fits either.
    ///
    /// Getters must be resolved first.
    pub(crate) fn binding_kind(&self) -> Option<BindingKind> {
        match self {
            Value::Null => None,
            Value::Fragment(_) => Some(BindingKind::Nodes),
            Value::List(items) if items.is_empty() => Some(BindingKind::Nodes),
            Value::List(items) => {
                if items.iter().any(|item| item.binding_kind() == Some(BindingKind::Nodes)) {
                    Some(BindingKind::Nodes)
                } else {
                    Some(BindingKind::Text)
                }
            }
            _ => Some(BindingKind::Text),
        }
    }

    /// Text for a primitive value; `None` for anything else.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Text(s) => Some(Cow::Borrowed(s)),
            Value::Int(n) => Some(Cow::Owned(n.to_string())),
            Value::Float(n) => Some(Cow::Owned(n.to_string())),
            Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            _ => None,
        }
    }

    /// Render as text content, reporting values that have no text form.
    ///
    /// Lists are joined; getters are read.
    pub(crate) fn to_text(&self) -> String {
        match self {
            Value::Null | Value::Callback(_) => String::new(),
            Value::Getter(getter) => getter.call().to_text(),
            Value::List(items) => items.iter().map(Value::to_text).collect(),
            Value::Fragment(fragment) => {
                report_invalid(fragment);
                String::new()
            }
            Value::Object(object) => {
                report_invalid(object);
                String::new()
            }
            primitive => primitive.as_text().map(Cow::into_owned).unwrap_or_default(),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Value::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Value::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Getter(g) => g.fmt(f),
            Value::Callback(c) => c.fmt(f),
            Value::Fragment(fragment) => fragment.fmt(f),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Object(object) => f.debug_tuple("Object").field(object).finish(),
        }
    }
}

impl SignalValue for Value {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Fragment(a), Value::Fragment(b)) => a.ptr_eq(b),
            (Value::Getter(a), Value::Getter(b)) => a.ptr_eq(b),
            (Value::Callback(a), Value::Callback(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! int_values {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

int_values!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(Value::Float(value as f64), Value::Int)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Value::Float(value as f64), Value::Int)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Fragment> for Value {
    fn from(value: Fragment) -> Self {
        Value::Fragment(value)
    }
}

impl From<Getter> for Value {
    fn from(value: Getter) -> Self {
        Value::Getter(value)
    }
}

impl From<Callback> for Value {
    fn from(value: Callback) -> Self {
        Value::Callback(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

/// Signals interpolate as reactive getters.
impl<T: SignalValue + Into<Value>> From<Signal<T>> for Value {
    fn from(signal: Signal<T>) -> Self {
        Value::reactive(move || signal.get())
    }
}

impl<T: SignalValue + Into<Value>> From<&Signal<T>> for Value {
    fn from(signal: &Signal<T>) -> Self {
        Value::from(signal.clone())
    }
}

impl<T: SignalValue + Into<Value>> From<ReadSignal<T>> for Value {
    fn from(signal: ReadSignal<T>) -> Self {
        Value::reactive(move || signal.get())
    }
}

impl<T: SignalValue + Into<Value>> From<&ReadSignal<T>> for Value {
    fn from(signal: &ReadSignal<T>) -> Self {
        Value::from(signal.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_render_as_text() {
        assert_eq!(Value::from("hi").as_text().as_deref(), Some("hi"));
        assert_eq!(Value::from(1).as_text().as_deref(), Some("1"));
        assert_eq!(Value::from(1.5).as_text().as_deref(), Some("1.5"));
        assert_eq!(Value::from(true).as_text().as_deref(), Some("true"));
        assert!(Value::Null.as_text().is_none());
    }

    #[test]
    fn options_map_to_null() {
        assert!(Value::from(None::<i32>).is_null());
        assert!(matches!(Value::from(Some(3)), Value::Int(3)));
    }

    #[test]
    fn binding_kinds() {
        assert_eq!(Value::Null.binding_kind(), None);
        assert_eq!(Value::from("a").binding_kind(), Some(BindingKind::Text));
        assert_eq!(Value::List(Vec::new()).binding_kind(), Some(BindingKind::Nodes));
        assert_eq!(
            Value::from(vec!["a", "b"]).binding_kind(),
            Some(BindingKind::Text)
        );
    }

    #[test]
    fn resolve_reads_nested_getters() {
        let value = Value::List(vec![Value::reactive(|| "a"), Value::from("b")]).resolve();
        assert_eq!(value.to_text(), "ab");
    }

    #[test]
    fn signals_become_getters() {
        let signal = Signal::new(4);
        let value = Value::from(&signal);
        assert!(matches!(value, Value::Getter(_)));
        signal.set(5);
        assert_eq!(value.resolve().to_text(), "5");
    }

    #[test]
    fn same_follows_primitive_equality() {
        assert!(Value::from("x").same(&Value::from("x")));
        assert!(!Value::from(vec![1]).same(&Value::from(vec![1])));
        assert!(!Value::object(()).same(&Value::object(())));
    }
}
