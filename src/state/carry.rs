use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub usize);

/// What an actor is holding. Holding an item and "is carrying" are the same
/// fact, so they cannot disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CarryState {
    held: Option<ItemId>,
}

impl CarryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_carrying(&self) -> bool {
        self.held.is_some()
    }

    pub fn held_item(&self) -> Option<ItemId> {
        self.held
    }

    /// Takes hold of `item`. Returns `false` (and changes nothing) when
    /// something is already held.
    pub fn pick(&mut self, item: ItemId) -> bool {
        if self.held.is_some() {
            return false;
        }
        self.held = Some(item);
        true
    }

    /// Lets go of the held item, if any.
    pub fn release(&mut self) -> Option<ItemId> {
        self.held.take()
    }
}
