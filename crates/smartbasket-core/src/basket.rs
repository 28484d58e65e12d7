// The in-progress basket used as prediction input.

/// Ordered list of item names. Append and remove only; duplicates allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Basket {
    items: Vec<String>,
}

impl Basket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append `raw` after trimming. Returns `false` (and leaves the basket
    /// untouched) when the trimmed name is empty.
    pub fn add(&mut self, raw: &str) -> bool {
        let name = raw.trim();
        if name.is_empty() {
            return false;
        }
        self.items.push(name.to_string());
        true
    }

    /// Remove the item at `index`, returning it. Out-of-range is a no-op.
    pub fn remove(&mut self, index: usize) -> Option<String> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
