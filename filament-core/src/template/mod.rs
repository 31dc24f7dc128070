//! Template Binding Engine
//!
//! Templates are markup with interpolated [`Value`]s. Evaluating one
//! produces a [`Fragment`]: parsed host nodes whose dynamic parts are kept
//! current by binding effects.
//!
//! # How Evaluation Works
//!
//! 1. A [`RenderMode::Interactive`] pass serializes the values into the
//!    markup, leaving placeholders for getters, callbacks and fragments.
//! 2. The markup is parsed with `html5ever` in a `<body>` context.
//! 3. The bind walk replaces each placeholder with a live binding.
//!
//! Getters in content position may produce text, or fragments and lists
//! of fragments; lists are reconciled by key so persisting items keep
//! their nodes.
//!
//! [`render_static`] runs the same serialization in
//! [`RenderMode::Static`] and returns a string instead.
//!
//! # Example
//!
//! ```rust,ignore
//! use filament_core::html;
//! use filament_core::reactive::{tick, Signal};
//!
//! let count = Signal::new(0);
//! let view = html!("<p>Count: {}</p>", &count);
//! count.set(1);
//! tick();
//! assert_eq!(view.to_html(), "<p>Count: 1</p>");
//! ```

mod bind;
pub mod dom;
pub mod events;
mod fragment;
mod pass;
mod reconcile;
mod value;

pub use events::{dispatch, Event};
pub use fragment::Fragment;
pub use pass::RenderMode;
pub use value::{Callback, Getter, Value};

use pass::RenderPass;

/// Evaluate a template into a live fragment.
///
/// `strings` holds the literal pieces around each value and is expected
/// to be one longer than `values`.
pub fn html(strings: &[&str], values: Vec<Value>) -> Fragment {
    let mut pass = RenderPass::new(RenderMode::Interactive);
    pass.assemble(strings, values);
    tracing::trace!(
        signals = pass.signals.len(),
        callbacks = pass.callbacks.len(),
        fragments = pass.fragments.len(),
        "Parsing template"
    );
    let root = dom::parse_fragment(pass.markup());
    bind::bind(root, pass)
}

/// Render a template to markup. Getters are read once without tracking,
/// nested fragments are serialized, callbacks are invoked once and their
/// return values inlined.
pub fn render_static(strings: &[&str], values: Vec<Value>) -> String {
    let mut pass = RenderPass::new(RenderMode::Static);
    pass.assemble(strings, values);
    pass.into_markup()
}

/// Evaluate with `mode`, returning markup in either case.
pub fn render(mode: RenderMode, strings: &[&str], values: Vec<Value>) -> String {
    match mode {
        RenderMode::Interactive => html(strings, values).to_html(),
        RenderMode::Static => render_static(strings, values),
    }
}

/// Evaluate a template whose value slots are written `{}`.
pub fn html_template(template: &str, values: Vec<Value>) -> Fragment {
    let strings: Vec<&str> = template.split("{}").collect();
    html(&strings, values)
}

/// Static counterpart of [`html_template`].
pub fn static_template(template: &str, values: Vec<Value>) -> String {
    let strings: Vec<&str> = template.split("{}").collect();
    render_static(&strings, values)
}

/// Evaluate a template literal into a [`Fragment`].
///
/// Each `{}` in the literal is a slot for the next value; values are
/// converted with [`Value::from`].
#[macro_export]
macro_rules! html {
    ($template:literal $(, $value:expr)* $(,)?) => {
        $crate::template::html_template(
            $template,
            ::std::vec![$($crate::template::Value::from($value)),*],
        )
    };
}

/// Render a template literal to a string without bindings.
#[macro_export]
macro_rules! html_static {
    ($template:literal $(, $value:expr)* $(,)?) => {
        $crate::template::static_template(
            $template,
            ::std::vec![$($crate::template::Value::from($value)),*],
        )
    };
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{tick, Signal};
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn primitives_render_inline() {
        let view = crate::html!("<p>{}, {}! {} {}</p>", "Hello", "world", 1, true);
        assert_eq!(view.to_html(), "<p>Hello, world! 1 true</p>");
        assert_eq!(view.binding_count(), 0);
    }

    #[test]
    fn text_binding_follows_signal() {
        let name = Signal::new("a".to_string());
        let view = crate::html!("<b>{}</b>", &name);
        assert_eq!(view.to_html(), "<b>a</b>");

        name.set("b".to_string());
        tick();
        assert_eq!(view.to_html(), "<b>b</b>");
    }

    #[test]
    fn attribute_binding_mixes_literals() {
        let color = Signal::new("red");
        let view = crate::html!(r#"<div class="box {}"></div>"#, &color);
        assert_eq!(view.to_html(), r#"<div class="box red"></div>"#);

        color.set("blue");
        tick();
        assert_eq!(view.to_html(), r#"<div class="box blue"></div>"#);
    }

    #[test]
    fn callbacks_bind_handlers() {
        let clicks = Rc::new(Cell::new(0));
        let c = clicks.clone();
        let view = crate::html!(
            "<button onclick={}>go</button>",
            Value::callback(move |_| c.set(c.get() + 1))
        );
        assert_eq!(view.to_html(), "<button>go</button>");

        let button = view.first_element().unwrap();
        dispatch(&button, "click");
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn nested_fragments_are_spliced() {
        let inner = crate::html!("<em>{}</em>", "x");
        let outer = crate::html!("<p>{}</p>", inner.clone());
        assert_eq!(outer.to_html(), "<p><em>x</em></p>");
        assert!(Rc::ptr_eq(
            &inner.nodes()[0],
            &dom::find_first(outer.root(), "em").unwrap()
        ));
    }

    #[test]
    fn static_render_has_no_placeholders() {
        let count = Signal::new(3);
        let out = crate::html_static!(
            "<p title={}>{}</p>{}{}",
            Value::callback(|_| "tip"),
            &count,
            crate::html!("<i>{}</i>", "n"),
            Value::callback(|_| {})
        );
        assert_eq!(out, "<p title=tip>3</p><i>n</i>");
        assert_eq!(count.subscriber_count(), 0);
    }

    #[test]
    fn dispose_stops_bindings() {
        let count = Signal::new(1);
        let view = crate::html!("<p>{}</p>", &count);
        view.dispose();
        count.set(2);
        tick();
        assert_eq!(view.to_html(), "<p>1</p>");
        assert!(view.is_disposed());
    }

    #[test]
    fn render_modes_agree_on_static_content() {
        let strings = ["<p>", "</p>"];
        assert_eq!(
            render(RenderMode::Interactive, &strings, vec![Value::from(2)]),
            render(RenderMode::Static, &strings, vec![Value::from(2)])
        );
    }
}
