//! Tile selection model for the labeling view
//!
//! Each candidate tile is in one of three states. Left-click toggles
//! positive, right-click toggles negative:
//!
//! | state      | left click | right click |
//! |------------|------------|-------------|
//! | unselected | positive   | negative    |
//! | positive   | unselected | negative    |
//! | negative   | positive   | unselected  |
//!
//! The browser UI (`labeler-server/src/ui/app.js`) implements the same table.
//! Saving is a pure derivation: filter tiles by state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::SaveLabelsRequest;

/// Selection state of a single tile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileState {
    #[default]
    Unselected,
    Positive,
    Negative,
}

/// Mouse button that clicked a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    Left,
    Right,
}

impl TileState {
    /// Next state after a click
    pub fn on_click(self, click: Click) -> Self {
        match (self, click) {
            (TileState::Positive, Click::Left) => TileState::Unselected,
            (_, Click::Left) => TileState::Positive,
            (TileState::Negative, Click::Right) => TileState::Unselected,
            (_, Click::Right) => TileState::Negative,
        }
    }
}

/// Per-tile state for one rendered session
#[derive(Debug, Clone, Default)]
pub struct Selection {
    query_image: String,
    order: Vec<String>,
    states: HashMap<String, TileState>,
}

impl Selection {
    /// Start a selection with every candidate unselected
    pub fn new(query_image: impl Into<String>, candidates: &[String]) -> Self {
        let mut order = Vec::with_capacity(candidates.len());
        let mut states = HashMap::with_capacity(candidates.len());
        for id in candidates {
            if states.insert(id.clone(), TileState::Unselected).is_none() {
                order.push(id.clone());
            }
        }
        Self {
            query_image: query_image.into(),
            order,
            states,
        }
    }

    /// Apply a click to a tile; unknown tiles are ignored
    pub fn click(&mut self, id: &str, click: Click) -> Option<TileState> {
        let state = self.states.get_mut(id)?;
        *state = state.on_click(click);
        Some(*state)
    }

    pub fn state(&self, id: &str) -> Option<TileState> {
        self.states.get(id).copied()
    }

    fn ids_in(&self, wanted: TileState) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.states.get(*id) == Some(&wanted))
            .cloned()
            .collect()
    }

    /// Build the save request from the current states, in display order
    pub fn to_request(&self) -> SaveLabelsRequest {
        SaveLabelsRequest {
            query_image: Some(self.query_image.clone()),
            positives: self.ids_in(TileState::Positive),
            negatives: self.ids_in(TileState::Negative),
        }
    }
}
