//! Complex stress/strain (OES) record decoding for Nastran OP2 result tables.
//!
//! This crate provides:
//! - **Table context** ([`TableHeader`]): element type, declared record
//!   width, device code, real/imaginary vs magnitude/phase, sort order and
//!   byte order
//! - **Layout catalogue** ([`RecordLayout`]) of the supported element record
//!   shapes (rods, springs, bars, plates with and without corner output,
//!   bushes, nonlinear quads)
//! - **Decoding** ([`decode_complex_table`]) of whole records into any
//!   [`ComplexAccumulator`], leaving trailing partial records in place
//! - **Parallel decoding** of independent tables with rayon

pub mod accumulator;
pub mod complex;
pub mod decoder;
pub mod error;
pub mod header;
pub mod layout;
mod parallel;

pub use accumulator::{
    ComplexAccumulator, ComplexElementResults, LocatedSample, Location, ResultStep, Sample,
};
pub use complex::{polar_to_real_imag, to_complex};
pub use decoder::decode_complex_table;
pub use error::DecodeError;
pub use header::{Endian, FormatStart, LeadingField, RecordKey, ResultKind, Sort, TableHeader};
pub use layout::{Family, RecordLayout};
pub use nalgebra::Complex;
pub use parallel::{DecodedTable, decode_tables_parallel};
