//! Record shapes of the complex stress/strain tables, by element type.
//!
//! Word indices count from the start of a record (word 0 is the leading
//! ID field). Plate records are built from 15-word fiber blocks: a leading
//! word, then for each of the two fibers a distance followed by three
//! (real, imag) pairs.

use crate::error::{DecodeError, Result};

/// Words in one plate fiber block
pub const PLATE_BLOCK_WORDS: usize = 15;
/// Words before the first block of a corner-output plate record
pub const CORNER_HEADER_WORDS: usize = 2;

/// Fiber distance word and component pairs of the two fibers in a plate block
pub const PLATE_FIBERS: [(usize, [(usize, usize); 3]); 2] = [
    (1, [(2, 3), (4, 5), (6, 7)]),
    (8, [(9, 10), (11, 12), (13, 14)]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// One sample of complex pairs per element
    Scalar,
    /// Two fibers at the centroid
    PlateCentroid,
    /// Two fibers at the centroid, then two per corner grid
    PlateCorner,
    /// Two fibers of real values per element
    NonlinearPlate,
}

/// Shape of one element record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub element_type: u32,
    pub name: &'static str,
    pub num_wide: usize,
    pub family: Family,
    /// Corner grids after the centroid block
    pub corners: usize,
    /// (real|magnitude, imag|phase) word indices, scalar family only
    pub pairs: &'static [(usize, usize)],
    /// Names of the decoded values, in sample order
    pub fields: &'static [&'static str],
    /// Pseudo-grid label of centroid samples
    pub centroid_label: Option<&'static str>,
}

const PLATE_FIELDS: &[&str] = &["oxx", "oyy", "txy"];

const NONLINEAR_PLATE_FIELDS: &[&str] = &[
    "oxx",
    "oyy",
    "ozz",
    "txy",
    "effective_stress",
    "effective_plastic_strain",
    "effective_creep_strain",
    "exx",
    "eyy",
    "ezz",
    "exy",
];

const fn scalar(
    element_type: u32,
    name: &'static str,
    num_wide: usize,
    pairs: &'static [(usize, usize)],
    fields: &'static [&'static str],
) -> RecordLayout {
    RecordLayout {
        element_type,
        name,
        num_wide,
        family: Family::Scalar,
        corners: 0,
        pairs,
        fields,
        centroid_label: None,
    }
}

const fn plate(element_type: u32, name: &'static str, corners: usize) -> RecordLayout {
    let centroid_label = if element_type == 74 { "CEN/3" } else { "CEN/4" };
    let (family, num_wide, label) = match corners {
        0 => (Family::PlateCentroid, PLATE_BLOCK_WORDS, centroid_label),
        3 => (
            Family::PlateCorner,
            CORNER_HEADER_WORDS + 4 * PLATE_BLOCK_WORDS,
            "CEN/3",
        ),
        _ => (
            Family::PlateCorner,
            CORNER_HEADER_WORDS + 5 * PLATE_BLOCK_WORDS,
            "CEN/4",
        ),
    };
    RecordLayout {
        element_type,
        name,
        num_wide,
        family,
        corners,
        pairs: &[],
        fields: PLATE_FIELDS,
        centroid_label: Some(label),
    }
}

const ROD_PAIRS: &[(usize, usize)] = &[(1, 2), (3, 4)];
const ROD_FIELDS: &[&str] = &["axial", "torsion"];
const SPRING_PAIRS: &[(usize, usize)] = &[(1, 2)];
const SPRING_FIELDS: &[&str] = &["value"];

/// Every supported layout
pub const LAYOUTS: &[RecordLayout] = &[
    scalar(1, "CROD", 5, ROD_PAIRS, ROD_FIELDS),
    scalar(3, "CTUBE", 5, ROD_PAIRS, ROD_FIELDS),
    scalar(10, "CONROD", 5, ROD_PAIRS, ROD_FIELDS),
    scalar(11, "CELAS1", 3, SPRING_PAIRS, SPRING_FIELDS),
    scalar(12, "CELAS2", 3, SPRING_PAIRS, SPRING_FIELDS),
    scalar(13, "CELAS3", 3, SPRING_PAIRS, SPRING_FIELDS),
    scalar(14, "CELAS4", 3, SPRING_PAIRS, SPRING_FIELDS),
    scalar(
        34,
        "CBAR",
        19,
        &[
            (1, 6),
            (2, 7),
            (3, 8),
            (4, 9),
            (5, 10),
            (11, 15),
            (12, 16),
            (13, 17),
            (14, 18),
        ],
        &["s1a", "s2a", "s3a", "s4a", "axial", "s1b", "s2b", "s3b", "s4b"],
    ),
    plate(33, "CQUAD4", 0),
    plate(74, "CTRIA3", 0),
    plate(144, "CQUAD4", 4),
    plate(64, "CQUAD8", 4),
    plate(82, "CQUADR", 4),
    plate(75, "CTRIA6", 3),
    plate(70, "CTRIAR", 3),
    scalar(
        40,
        "CBUSH1D",
        9,
        &[(1, 5), (2, 6), (3, 7), (4, 8)],
        &["element_force", "axial_displacement", "axial_velocity", "axial_stress"],
    ),
    scalar(
        102,
        "CBUSH",
        13,
        &[(1, 7), (2, 8), (3, 9), (4, 10), (5, 11), (6, 12)],
        &["tx", "ty", "tz", "rx", "ry", "rz"],
    ),
    RecordLayout {
        element_type: 90,
        name: "CQUAD4NL",
        num_wide: 25,
        family: Family::NonlinearPlate,
        corners: 0,
        pairs: &[],
        fields: NONLINEAR_PLATE_FIELDS,
        centroid_label: None,
    },
];

impl RecordLayout {
    pub fn lookup(element_type: u32) -> Result<&'static RecordLayout> {
        LAYOUTS
            .iter()
            .find(|layout| layout.element_type == element_type)
            .ok_or(DecodeError::UnsupportedElement { element_type })
    }

    /// Words of one record as laid out by the family
    pub fn words(&self) -> usize {
        match self.family {
            Family::Scalar => 1 + self.pairs.len() * 2,
            Family::PlateCentroid => PLATE_BLOCK_WORDS,
            Family::PlateCorner => CORNER_HEADER_WORDS + (self.corners + 1) * PLATE_BLOCK_WORDS,
            Family::NonlinearPlate => 1 + 2 * 12,
        }
    }

    pub fn record_bytes(&self) -> usize {
        4 * self.words()
    }

    /// Reject a table whose declared width does not match this layout
    pub fn check_width(&self, num_wide: usize) -> Result<()> {
        if self.record_bytes() != 4 * num_wide || self.num_wide != num_wide {
            return Err(DecodeError::WidthMismatch {
                element_type: self.element_type,
                name: self.name,
                num_wide,
                expected: self.words(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogued_widths_match_family_shapes() {
        for layout in LAYOUTS {
            assert_eq!(layout.words(), layout.num_wide, "{}", layout.name);
            if layout.family == Family::Scalar {
                assert_eq!(layout.fields.len(), layout.pairs.len(), "{}", layout.name);
            }
        }
    }

    #[test]
    fn corner_layouts() {
        let quad = RecordLayout::lookup(144).unwrap();
        assert_eq!((quad.num_wide, quad.corners), (77, 4));
        assert_eq!(quad.centroid_label, Some("CEN/4"));
        let tria = RecordLayout::lookup(75).unwrap();
        assert_eq!((tria.num_wide, tria.record_bytes()), (62, 248));
        assert_eq!(tria.centroid_label, Some("CEN/3"));
        assert_eq!(RecordLayout::lookup(74).unwrap().centroid_label, Some("CEN/3"));
        assert_eq!(RecordLayout::lookup(33).unwrap().centroid_label, Some("CEN/4"));
    }

    #[test]
    fn unknown_type_and_wrong_width_are_errors() {
        assert_eq!(
            RecordLayout::lookup(999),
            Err(DecodeError::UnsupportedElement { element_type: 999 })
        );
        let bar = RecordLayout::lookup(34).unwrap();
        assert!(bar.check_width(19).is_ok());
        assert_eq!(
            bar.check_width(18),
            Err(DecodeError::WidthMismatch {
                element_type: 34,
                name: "CBAR",
                num_wide: 18,
                expected: 19,
            })
        );
    }
}
