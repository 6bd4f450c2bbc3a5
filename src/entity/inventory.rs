//! Bounded item carry

use crate::world::items::Item;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    items: Vec<Item>,
    capacity: usize,
}

impl Inventory {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Hands the item back when there is no room
    pub fn push(&mut self, item: Item) -> Result<(), Item> {
        if self.is_full() {
            return Err(item);
        }
        self.items.push(item);
        Ok(())
    }

    /// Index of the first item matching `name` (case-insensitive)
    pub fn find(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|i| i.matches(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn take(&mut self, name: &str) -> Option<Item> {
        self.find(name).map(|idx| self.items.remove(idx))
    }

    pub fn take_at(&mut self, idx: usize) -> Option<Item> {
        (idx < self.items.len()).then(|| self.items.remove(idx))
    }

    pub fn first_where(&self, pred: impl Fn(&Item) -> bool) -> Option<usize> {
        self.items.iter().position(pred)
    }

    pub fn get(&self, idx: usize) -> Option<&Item> {
        self.items.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Item> {
        self.items.iter_mut()
    }

    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|i| i.name.clone()).collect()
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(12)
    }
}
