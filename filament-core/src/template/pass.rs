//! Serialization of interpolated values into markup.
//!
//! # How a Render Pass Works
//!
//! A pass concatenates the template's literal strings with a textual form
//! of each value. Primitives are written inline. In interactive mode,
//! getters and callbacks are written as `{{signal:ID}}` and
//! `{{callback:ID}}` tokens and fragments as marker elements; each ID is a
//! fresh UUID recorded in a per-pass map so the bind walk can find the
//! original value again. Static mode resolves everything to plain markup:
//! getters are read and callbacks are invoked once, with their results
//! inlined.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use smallvec::SmallVec;
use uuid::Uuid;

use super::dom;
use super::events::Event;
use super::fragment::Fragment;
use super::value::{report_invalid, Callback, Getter, Value};
use crate::reactive::untrack;

/// Event name seen by callbacks invoked during static rendering.
pub const STATIC_RENDER_EVENT: &str = "render";

/// Attribute naming the pass ID of a spliced fragment.
pub(crate) const FRAGMENT_MARKER: &str = "data-filament-fragment";

/// How a template is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Live nodes with reactive bindings.
    Interactive,
    /// A markup string. Getters are read once; callbacks are invoked once
    /// and their return values inlined.
    Static,
}

fn signal_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"\{\{signal:([0-9a-f]{32})\}\}").expect("signal token pattern is valid")
    })
}

fn callback_token() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"^\s*\{\{callback:([0-9a-f]{32})\}\}\s*$")
            .expect("callback token pattern is valid")
    })
}

/// A piece of text split around signal tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Literal(&'a str),
    Signal(&'a str),
}

pub(crate) fn contains_signal(text: &str) -> bool {
    signal_token().is_match(text)
}

/// Split `text` into literal runs and signal IDs, in order. Empty
/// literals are omitted.
pub(crate) fn split_signals(text: &str) -> SmallVec<[Segment<'_>; 4]> {
    let mut segments = SmallVec::new();
    let mut last = 0;
    for captures in signal_token().captures_iter(text) {
        let (Some(whole), Some(id)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Literal(&text[last..whole.start()]));
        }
        segments.push(Segment::Signal(id.as_str()));
        last = whole.end();
    }
    if last < text.len() {
        segments.push(Segment::Literal(&text[last..]));
    }
    segments
}

/// The callback ID if `value` is exactly one callback token.
pub(crate) fn callback_id(value: &str) -> Option<&str> {
    callback_token()
        .captures(value)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str())
}

pub(crate) fn signal_placeholder(id: &str) -> String {
    format!("{{{{signal:{id}}}}}")
}

/// One evaluation of a template.
pub(crate) struct RenderPass {
    mode: RenderMode,
    markup: String,
    pub(crate) signals: HashMap<String, Getter>,
    pub(crate) callbacks: HashMap<String, Callback>,
    pub(crate) fragments: HashMap<String, Fragment>,
}

impl RenderPass {
    pub(crate) fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            markup: String::new(),
            signals: HashMap::new(),
            callbacks: HashMap::new(),
            fragments: HashMap::new(),
        }
    }

    fn fresh_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    pub(crate) fn markup(&self) -> &str {
        &self.markup
    }

    pub(crate) fn into_markup(self) -> String {
        self.markup
    }

    /// Interleave `strings` with `values`. Expects one more string than
    /// values; extras on either side are reported.
    pub(crate) fn assemble(&mut self, strings: &[&str], values: Vec<Value>) {
        if strings.len() != values.len() + 1 {
            tracing::warn!(
                strings = strings.len(),
                values = values.len(),
                "Template strings and values do not line up"
            );
        }
        let mut values = values.into_iter();
        for (index, literal) in strings.iter().enumerate() {
            self.markup.push_str(literal);
            if index + 1 < strings.len() {
                if let Some(value) = values.next() {
                    self.push_value(value);
                }
            }
        }
        let extra = values.count();
        if extra > 0 {
            tracing::error!(extra, "Template values without a slot were dropped");
        }
    }

    pub(crate) fn push_value(&mut self, value: Value) {
        match value {
            Value::Null => {}
            Value::Text(text) => self.markup.push_str(&text),
            Value::List(items) => {
                for item in items {
                    self.push_value(item);
                }
            }
            Value::Object(object) => report_invalid(&object),
            Value::Getter(getter) => match self.mode {
                RenderMode::Interactive => {
                    let id = Self::fresh_id();
                    self.markup.push_str(&signal_placeholder(&id));
                    self.signals.insert(id, getter);
                }
                RenderMode::Static => {
                    let value = untrack(|| getter.call());
                    self.push_value(value);
                }
            },
            Value::Callback(callback) => match self.mode {
                RenderMode::Interactive => {
                    let id = Self::fresh_id();
                    self.markup.push_str(&format!("{{{{callback:{id}}}}}"));
                    self.callbacks.insert(id, callback);
                }
                RenderMode::Static => {
                    let event = Event::new(STATIC_RENDER_EVENT, dom::create_container());
                    let value = untrack(|| callback.call(&event));
                    self.push_value(value);
                }
            },
            Value::Fragment(fragment) => match self.mode {
                RenderMode::Interactive => {
                    let id = Self::fresh_id();
                    self.markup
                        .push_str(&format!(r#"<template {FRAGMENT_MARKER}="{id}"></template>"#));
                    self.fragments.insert(id, fragment);
                }
                RenderMode::Static => self.markup.push_str(&fragment.to_html()),
            },
            primitive => {
                if let Some(text) = primitive.as_text() {
                    self.markup.push_str(&text);
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
