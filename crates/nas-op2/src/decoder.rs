//! Fixed-width record decoding of complex stress/strain tables.

use nalgebra::Complex;
use tracing::debug;

use crate::accumulator::{ComplexAccumulator, Location, Sample};
use crate::complex::to_complex;
use crate::error::Result;
use crate::header::{FormatStart, TableHeader};
use crate::layout::{CORNER_HEADER_WORDS, Family, PLATE_BLOCK_WORDS, PLATE_FIBERS, RecordLayout};

/// One record viewed as 4-byte words
struct Words<'a> {
    bytes: &'a [u8],
    start: &'a FormatStart,
}

impl<'a> Words<'a> {
    fn word(&self, i: usize) -> [u8; 4] {
        let b = &self.bytes[4 * i..4 * i + 4];
        [b[0], b[1], b[2], b[3]]
    }

    fn int(&self, i: usize) -> i32 {
        self.start.int(self.word(i))
    }

    fn float(&self, i: usize) -> f32 {
        self.start.float(self.word(i))
    }

    fn pair(&self, (a, b): (usize, usize), magnitude_phase: bool) -> Complex<f64> {
        to_complex(self.float(a), self.float(b), magnitude_phase)
    }

    /// Words `offset..offset + len` as a sub-view
    fn block(&self, offset: usize, len: usize) -> Words<'a> {
        Words {
            bytes: &self.bytes[4 * offset..4 * (offset + len)],
            start: self.start,
        }
    }
}

/// Decode every whole record at the front of `data` into `acc`.
///
/// The declared `num_wide` is checked against the element type's layout
/// before anything is read. Bytes after the last whole record are left in
/// `data` for the next table. Returns the number of element records decoded.
pub fn decode_complex_table<A: ComplexAccumulator + ?Sized>(
    header: &TableHeader,
    data: &mut &[u8],
    acc: &mut A,
) -> Result<usize> {
    let layout = RecordLayout::lookup(header.element_type)?;
    layout.check_width(header.num_wide)?;

    let width = layout.record_bytes();
    let start = header.format_start();
    let magnitude_phase = header.is_magnitude_phase();

    let mut decoded = 0;
    while data.len() >= width {
        let (record, rest) = data.split_at(width);
        let words = Words {
            bytes: record,
            start: &start,
        };
        decode_record(layout, &words, magnitude_phase, acc);
        *data = rest;
        decoded += 1;
    }

    debug!(
        element = layout.name,
        element_type = layout.element_type,
        records = decoded,
        residual = data.len(),
        "decoded complex stress/strain table"
    );
    Ok(decoded)
}

fn decode_record<A: ComplexAccumulator + ?Sized>(
    layout: &RecordLayout,
    words: &Words<'_>,
    magnitude_phase: bool,
    acc: &mut A,
) {
    let key = words.start.extract(words.word(0));
    match layout.family {
        Family::Scalar => {
            let values = layout
                .pairs
                .iter()
                .map(|&pair| words.pair(pair, magnitude_phase))
                .collect();
            acc.add_new_eid(
                layout.name,
                key.dt,
                key.eid,
                Location::Element,
                Sample::Values { values },
            );
        }
        Family::PlateCentroid => {
            let centroid = Location::Centroid(layout.centroid_label.unwrap_or("CEN/4"));
            let [first, second] = fibers(words, magnitude_phase);
            acc.add_new_eid(layout.name, key.dt, key.eid, centroid, first);
            acc.add(key.dt, key.eid, centroid, second);
        }
        Family::PlateCorner => {
            // word 1 holds the literal "CEN/"
            let centroid = Location::Centroid(layout.centroid_label.unwrap_or("CEN/4"));
            let block = words.block(CORNER_HEADER_WORDS, PLATE_BLOCK_WORDS);
            let [first, second] = fibers(&block, magnitude_phase);
            acc.add_new_eid(layout.name, key.dt, key.eid, centroid, first);
            acc.add(key.dt, key.eid, centroid, second);

            for corner in 1..=layout.corners {
                let offset = CORNER_HEADER_WORDS + corner * PLATE_BLOCK_WORDS;
                let block = words.block(offset, PLATE_BLOCK_WORDS);
                let grid = Location::Grid(block.int(0));
                let [first, second] = fibers(&block, magnitude_phase);
                acc.add_new_node(key.dt, key.eid, grid, first);
                acc.add(key.dt, key.eid, grid, second);
            }
        }
        Family::NonlinearPlate => {
            let fiber = |offset: usize| Sample::Real {
                fiber_distance: f64::from(words.float(offset)),
                values: (offset + 1..offset + 12)
                    .map(|i| f64::from(words.float(i)))
                    .collect(),
            };
            acc.add_new_eid(layout.name, key.dt, key.eid, Location::Element, fiber(1));
            acc.add(key.dt, key.eid, Location::Element, fiber(13));
        }
    }
}

/// Both fibers of a 15-word plate block
fn fibers(block: &Words<'_>, magnitude_phase: bool) -> [Sample; 2] {
    PLATE_FIBERS.map(|(distance, pairs)| Sample::Fiber {
        fiber_distance: f64::from(block.float(distance)),
        values: pairs
            .iter()
            .map(|&pair| block.pair(pair, magnitude_phase))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::ComplexElementResults;
    use crate::error::DecodeError;

    fn words(values: &[f32], packed_id: i32) -> Vec<u8> {
        let mut bytes = packed_id.to_le_bytes().to_vec();
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn spring_records_chunk_exactly() {
        let header = TableHeader::new(12, 3).with_device_code(1);
        let mut bytes = words(&[1.0, 2.0], 71);
        bytes.extend(words(&[3.0, 4.0], 81));
        let mut data = bytes.as_slice();
        let mut results = ComplexElementResults::new();

        let n = decode_complex_table(&header, &mut data, &mut results).unwrap();
        assert_eq!(n, 2);
        assert!(data.is_empty());
        assert_eq!(
            results.samples(None, 8)[0].sample,
            Sample::Values {
                values: vec![Complex::new(3.0, 4.0)]
            }
        );
        assert_eq!(results.element_names.get(&7), Some(&"CELAS2"));
    }

    #[test]
    fn width_mismatch_consumes_nothing() {
        let header = TableHeader::new(1, 6);
        let bytes = words(&[1.0, 2.0, 3.0, 4.0], 10);
        let mut data = bytes.as_slice();
        let mut results = ComplexElementResults::new();

        let err = decode_complex_table(&header, &mut data, &mut results).unwrap_err();
        assert!(matches!(err, DecodeError::WidthMismatch { expected: 5, .. }));
        assert_eq!(data.len(), bytes.len());
        assert!(results.is_empty());
    }

    #[test]
    fn nonlinear_plate_keeps_real_values() {
        let header = TableHeader::new(90, 25);
        let values: Vec<f32> = (1..=24).map(|v| v as f32).collect();
        let bytes = words(&values, 30);
        let mut data = bytes.as_slice();
        let mut results = ComplexElementResults::new();

        decode_complex_table(&header, &mut data, &mut results).unwrap();
        let samples = results.samples(None, 3);
        assert_eq!(samples.len(), 2);
        match &samples[1].sample {
            Sample::Real {
                fiber_distance,
                values,
            } => {
                assert_eq!(*fiber_distance, 13.0);
                assert_eq!(values.len(), 11);
                assert_eq!(values[10], 24.0);
            }
            other => panic!("unexpected sample {other:?}"),
        }
    }
}
