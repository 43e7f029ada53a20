//! Nastran bulk-data model and cross-reference resolver.
//!
//! This crate provides:
//! - **Model container** holding every supported card by category, with
//!   ID-keyed arenas ([`Collection`]) and multi-card sets ([`FanOut`])
//! - **Cross-referencing** ([`cross_reference`]): staged linking of
//!   symbolic IDs into typed [`Handle`]s, with per-stage failure policy and
//!   a bounded log of tolerated errors
//! - **Coordinate systems** set up in dependency order, with cycle detection
//! - **Constraint aggregation** of SPC/SPCADD and MPC/MPCADD sets
//! - **JSON persistence** of unresolved models

pub mod aero;
pub mod collection;
pub mod constraints;
pub mod coords;
pub mod elements;
pub mod error;
pub mod loads;
pub mod masses;
pub mod materials;
mod model;
pub mod nodes;
pub mod optimization;
pub mod properties;
mod resolvable;
pub mod sets;
mod summary;
pub mod xref;

pub use collection::{Arena, Card, Collection, FanOut, Handle, Keyed, SetKey};
pub use coords::{Coord, CoordFamily, Transform};
pub use elements::{Element, ElementFamily, ElementKind};
pub use error::{EntityKey, EntityRef, ModelError, StructuralError};
pub use model::Model;
pub use nodes::{Grid, GridSet, NodeRef};
pub use resolvable::{FinalizeGeometry, FrameTable, Resolvable};
pub use summary::ModelSummary;
pub use xref::{
    OverflowPolicy, Stage, XrefError, XrefErrorLog, XrefErrorRecord, XrefOptions, cross_reference,
};
