//! Slot selection: at most one slot per game.
//!
//! Each game is its own little state machine, `Unselected → Selected(slot)`.
//! Toggling a slot either removes it, replaces the sibling slot of the same
//! game, or adds it. Capacity is checked by the caller before `toggle` runs.

use crate::types::{GameId, Slot, SlotId};
use serde::{Deserialize, Serialize};

/// One `(game, slot)` pair in the cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SelectedSlot {
    /// The game
    pub game_id: GameId,
    /// The chosen slot of that game
    pub slot_id: SlotId,
}

/// What a toggle did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Slot was selected for a game that had no selection
    Added,
    /// Slot replaced the previously selected sibling
    Replaced {
        /// The slot that was deselected
        previous: SlotId,
    },
    /// Slot was already selected and is now removed
    Removed,
}

/// The set of selected slots, unique per game and ordered by game id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SelectedSlot>", into = "Vec<SelectedSlot>")]
pub struct SlotSelection {
    selections: Vec<SelectedSlot>,
}

impl From<Vec<SelectedSlot>> for SlotSelection {
    /// Restores the per-game invariant on untrusted input: the last entry
    /// for a game wins.
    fn from(mut selections: Vec<SelectedSlot>) -> Self {
        selections.reverse();
        selections.sort_by_key(|s| s.game_id);
        selections.dedup_by_key(|s| s.game_id);
        Self { selections }
    }
}

impl From<SlotSelection> for Vec<SelectedSlot> {
    fn from(selection: SlotSelection) -> Self {
        selection.selections
    }
}

impl SlotSelection {
    /// Creates an empty selection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            selections: Vec::new(),
        }
    }

    /// Toggles `slot` following the single-active-slot-per-game rule.
    pub fn toggle(&mut self, slot: &Slot) -> ToggleOutcome {
        match self
            .selections
            .binary_search_by_key(&slot.game_id, |s| s.game_id)
        {
            Ok(index) if self.selections[index].slot_id == slot.slot_id => {
                self.selections.remove(index);
                ToggleOutcome::Removed
            }
            Ok(index) => {
                let previous = self.selections[index].slot_id;
                self.selections[index].slot_id = slot.slot_id;
                ToggleOutcome::Replaced { previous }
            }
            Err(index) => {
                self.selections.insert(
                    index,
                    SelectedSlot {
                        game_id: slot.game_id,
                        slot_id: slot.slot_id,
                    },
                );
                ToggleOutcome::Added
            }
        }
    }

    /// Keeps only selections whose slot is present in `available` and still open.
    ///
    /// Returns the slots that were dropped.
    pub fn retain_available(&mut self, available: &[Slot]) -> Vec<SlotId> {
        let mut dropped = Vec::new();
        self.selections.retain(|selected| {
            let keep = available
                .iter()
                .any(|s| s.slot_id == selected.slot_id && s.game_id == selected.game_id && s.is_open());
            if !keep {
                dropped.push(selected.slot_id);
            }
            keep
        });
        dropped
    }

    /// Selected slot for `game_id`, if any.
    #[must_use]
    pub fn slot_for(&self, game_id: GameId) -> Option<SlotId> {
        self.selections
            .binary_search_by_key(&game_id, |s| s.game_id)
            .ok()
            .map(|index| self.selections[index].slot_id)
    }

    /// `true` when `slot_id` is selected.
    #[must_use]
    pub fn contains(&self, slot_id: SlotId) -> bool {
        self.selections.iter().any(|s| s.slot_id == slot_id)
    }

    /// Game ids with a selection, ascending.
    #[must_use]
    pub fn game_ids(&self) -> Vec<GameId> {
        self.selections.iter().map(|s| s.game_id).collect()
    }

    /// Iterates the selections in game order.
    pub fn iter(&self) -> impl Iterator<Item = &SelectedSlot> {
        self.selections.iter()
    }

    /// Number of selected games.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    /// `true` when nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Drops every selection.
    pub fn clear(&mut self) {
        self.selections.clear();
    }
}
