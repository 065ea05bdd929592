//! Element store
//!
//! The replay engine never owns elements: it looks them up and books them
//! through [`ElementStore`], addressing them by full path-qualified name.
//! [`DqmStore`] is the in-memory implementation used by the CLI and tests.

use crate::element::types::{join_name, normalize_name, MonitorElement, Payload};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Interface of an accumulator store that owns named monitor elements
pub trait ElementStore {
    /// Look up an element by full name
    fn get(&self, full_name: &str) -> Option<&MonitorElement>;

    fn get_mut(&mut self, full_name: &str) -> Option<&mut MonitorElement>;

    /// Set the current scope used by [`ElementStore::book`]
    fn cd(&mut self, path: &str);

    /// Current scope
    fn pwd(&self) -> &str;

    /// Create an element named `name` in the current scope
    fn book(&mut self, name: &str, payload: Payload) -> &mut MonitorElement;

    /// Attach a tag id to an element; returns false if no such element
    fn tag(&mut self, full_name: &str, tag: u32) -> bool;
}

/// Ordered in-memory element store
#[derive(Debug, Default)]
pub struct DqmStore {
    elements: BTreeMap<String, MonitorElement>,
    cwd: String,
}

impl DqmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in full-name order
    pub fn iter(&self) -> impl Iterator<Item = &MonitorElement> {
        self.elements.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }
}

impl ElementStore for DqmStore {
    fn get(&self, full_name: &str) -> Option<&MonitorElement> {
        self.elements.get(full_name)
    }

    fn get_mut(&mut self, full_name: &str) -> Option<&mut MonitorElement> {
        self.elements.get_mut(full_name)
    }

    fn cd(&mut self, path: &str) {
        self.cwd = normalize_name(path);
    }

    fn pwd(&self) -> &str {
        &self.cwd
    }

    fn book(&mut self, name: &str, payload: Payload) -> &mut MonitorElement {
        let element = MonitorElement::new(self.cwd.clone(), name, payload);
        match self.elements.entry(join_name(&self.cwd, name)) {
            Entry::Occupied(mut slot) => {
                tracing::warn!(name = %slot.key(), "re-booking existing element");
                slot.insert(element);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(element),
        }
    }

    fn tag(&mut self, full_name: &str, tag: u32) -> bool {
        match self.elements.get_mut(full_name) {
            Some(element) => {
                element.set_tag(tag);
                true
            }
            None => false,
        }
    }
}
