//! Decoding of independent tables on the rayon pool.

use rayon::prelude::*;
use serde::Serialize;

use crate::accumulator::ComplexElementResults;
use crate::decoder::decode_complex_table;
use crate::error::Result;
use crate::header::TableHeader;

/// Outcome of decoding one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedTable {
    pub records: usize,
    /// Trailing bytes shorter than one record
    pub residual: usize,
    pub results: ComplexElementResults,
}

/// Decode each (header, buffer) pair into its own result container.
///
/// Tables share nothing, so they run in parallel; results come back in input
/// order, one `Result` per table.
pub fn decode_tables_parallel(tables: &[(TableHeader, &[u8])]) -> Vec<Result<DecodedTable>> {
    tables
        .par_iter()
        .map(|(header, buffer)| {
            let mut data = *buffer;
            let mut results = ComplexElementResults::new();
            let records = decode_complex_table(header, &mut data, &mut results)?;
            Ok(DecodedTable {
                records,
                residual: data.len(),
                results,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[test]
    fn failures_stay_with_their_table() {
        let rod: Vec<u8> = [
            11i32.to_le_bytes(),
            1.0f32.to_le_bytes(),
            0.0f32.to_le_bytes(),
            2.0f32.to_le_bytes(),
            0.0f32.to_le_bytes(),
        ]
        .concat();
        let tables = vec![
            (TableHeader::new(1, 5).with_device_code(1), rod.as_slice()),
            (TableHeader::new(999, 5), rod.as_slice()),
        ];
        let out = decode_tables_parallel(&tables);
        assert_eq!(out.len(), 2);
        let first = out[0].as_ref().unwrap();
        assert_eq!((first.records, first.residual), (1, 0));
        assert_eq!(
            out[1],
            Err(DecodeError::UnsupportedElement { element_type: 999 })
        );
    }
}
