//! Capabilities the resolver drives on every card.

use crate::coords::{Coord, Transform};
use crate::collection::{Card, Handle};
use crate::error::StructuralError;
use crate::model::Model;

/// A card whose symbolic IDs can be linked against the rest of the model.
///
/// Resolution is split in two so the resolver can compute links while the
/// model is shared (cards may reference siblings in their own collection)
/// and attach them afterwards under an exclusive borrow. A card whose
/// `resolve` fails is unlinked and keeps only its symbolic IDs, even if an
/// earlier pass had linked it.
pub trait Resolvable: Card {
    type Links;

    fn resolve(&self, model: &Model) -> Result<Self::Links, StructuralError>;

    fn link(&mut self, links: Self::Links);

    /// Drop links from a previous pass
    fn unlink(&mut self);

    fn is_cross_referenced(&self) -> bool;
}

/// Post-link geometry pass for coordinate systems.
///
/// `setup` runs only once every dependency returned by
/// `setup_dependencies` has a transform in `frames`.
pub trait FinalizeGeometry {
    fn setup_dependencies(&self, model: &Model) -> Result<Vec<Handle<Coord>>, StructuralError>;

    fn setup(&self, model: &Model, frames: &FrameTable) -> Result<Transform, StructuralError>;
}

/// Transforms computed so far during the coordinate setup pass.
#[derive(Debug, Clone, Default)]
pub struct FrameTable {
    frames: Vec<Option<Transform>>,
}

impl FrameTable {
    pub fn with_capacity(len: usize) -> Self {
        Self {
            frames: vec![None; len],
        }
    }

    pub fn get(&self, handle: Handle<Coord>) -> Option<&Transform> {
        self.frames.get(handle.index()).and_then(Option::as_ref)
    }

    pub fn insert(&mut self, handle: Handle<Coord>, transform: Transform) {
        if let Some(slot) = self.frames.get_mut(handle.index()) {
            *slot = Some(transform);
        }
    }

    pub fn take(&mut self, handle: Handle<Coord>) -> Option<Transform> {
        self.frames.get_mut(handle.index()).and_then(Option::take)
    }
}
