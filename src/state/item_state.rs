//! Item state definitions for tracking harvest progress
//!
//! Each scrape walks `Start -> MetadataFetched -> MetadataParsed ->
//! MetadataPersisted -> FirstImageLocated -> ImagesDownloaded -> Done`, or
//! leaves early to `Skipped` (directory already present) or `Failed`.

use crate::HarvestError;
use std::fmt;

/// Represents the current state of an item in the harvest process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    // ===== Active States =====
    /// Nothing fetched yet
    Start,

    /// Metadata page fetched with a success status
    MetadataFetched,

    /// Metadata extracted, page count known
    MetadataParsed,

    /// Metadata document written to the item directory
    MetadataPersisted,

    /// Direct URL of the first image extracted
    FirstImageLocated,

    /// Image set download finished (possibly with missing pages)
    ImagesDownloaded,

    // ===== Terminal States =====
    /// Item fully processed
    Done,

    /// Item directory already existed; nothing fetched
    Skipped,

    /// Item aborted; partial artifacts stay on disk
    Failed,
}

impl ItemState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Failed)
    }

    /// Returns the state that follows this one on the success path
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::MetadataFetched),
            Self::MetadataFetched => Some(Self::MetadataParsed),
            Self::MetadataParsed => Some(Self::MetadataPersisted),
            Self::MetadataPersisted => Some(Self::FirstImageLocated),
            Self::FirstImageLocated => Some(Self::ImagesDownloaded),
            Self::ImagesDownloaded => Some(Self::Done),
            Self::Done | Self::Skipped | Self::Failed => None,
        }
    }

    /// Returns true if moving from `self` to `to` is allowed
    ///
    /// Only the next success state, `Failed` from any active state, and
    /// `Skipped` from `Start` are allowed.
    pub fn can_transition_to(&self, to: ItemState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            Self::Failed => true,
            Self::Skipped => *self == Self::Start,
            other => self.next() == Some(other),
        }
    }

    /// Short lowercase name used in logs and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::MetadataFetched => "metadata_fetched",
            Self::MetadataParsed => "metadata_parsed",
            Self::MetadataPersisted => "metadata_persisted",
            Self::FirstImageLocated => "first_image_located",
            Self::ImagesDownloaded => "images_downloaded",
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible item states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Start,
            Self::MetadataFetched,
            Self::MetadataParsed,
            Self::MetadataPersisted,
            Self::FirstImageLocated,
            Self::ImagesDownloaded,
            Self::Done,
            Self::Skipped,
            Self::Failed,
        ]
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks one item's walk through [`ItemState`]
///
/// No state is ever revisited; an invalid move is reported as
/// [`HarvestError::InvalidTransition`] and leaves the tracker unchanged.
#[derive(Debug, Clone)]
pub struct ItemProgress {
    state: ItemState,
}

impl ItemProgress {
    pub fn new() -> Self {
        Self {
            state: ItemState::Start,
        }
    }

    /// The state reached so far
    pub fn state(&self) -> ItemState {
        self.state
    }

    /// Moves to `to` if the transition is allowed
    pub fn advance(&mut self, to: ItemState) -> Result<(), HarvestError> {
        if !self.state.can_transition_to(to) {
            return Err(HarvestError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

impl Default for ItemProgress {
    fn default() -> Self {
        Self::new()
    }
}
