//! Name index over the sequence items.

use crate::{Error, Result, SequenceItem};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Script {
    items: Vec<SequenceItem>,
    index: HashMap<String, usize>,
}

impl Script {
    pub fn new(items: Vec<SequenceItem>) -> Result<Self> {
        let mut index = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if index.insert(item.name().to_string(), i).is_some() {
                return Err(Error::DuplicateItem(item.name().to_string()));
            }
        }
        let script = Self { items, index };
        for (from, to) in script.dangling_links() {
            tracing::warn!("Sequence item {from} refers to missing item {to}");
        }
        Ok(script)
    }

    pub fn get(&self, name: &str) -> Option<&SequenceItem> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    /// Name of the first Start Sequence item.
    pub fn start_name(&self) -> Option<&str> {
        self.items
            .iter()
            .find(|item| matches!(item, SequenceItem::StartSequence { .. }))
            .map(SequenceItem::name)
    }

    /// Name of the Start Sound item carrying cue number `cue`.
    pub fn cue_item(&self, cue: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|item| match item {
                SequenceItem::StartSound(start) => start.q_number.as_deref() == Some(cue),
                _ => false,
            })
            .map(SequenceItem::name)
    }

    /// `(item, missing target)` for every link that names nothing.
    pub fn dangling_links(&self) -> Vec<(&str, &str)> {
        let index = &self.index;
        self.items
            .iter()
            .flat_map(move |item| {
                item.links()
                    .into_iter()
                    .filter(move |to| !index.contains_key(*to))
                    .map(move |to| (item.name(), to))
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SequenceItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
