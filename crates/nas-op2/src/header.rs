//! Per-table decoding context.

use serde::{Deserialize, Serialize};

/// Byte order of the result file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    #[default]
    Stress,
    Strain,
}

/// Record ordering of the table.
///
/// SORT1 records lead with a packed element ID and share the table's time or
/// frequency. SORT2 tables hold one element, and each record leads with its
/// own time or frequency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    #[default]
    Sort1,
    Sort2 { element_id: i32 },
}

/// Table identification record fields the decoder needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHeader {
    pub element_type: u32,
    pub num_wide: usize,
    #[serde(default)]
    pub device_code: i32,
    /// 1 real, 2 real/imaginary, 3 magnitude/phase
    #[serde(default = "default_format_code")]
    pub format_code: i32,
    #[serde(default)]
    pub sort: Sort,
    /// Time, frequency or mode of the current SORT1 table
    #[serde(default)]
    pub nonlinear_factor: Option<f64>,
    #[serde(default)]
    pub result_kind: ResultKind,
    #[serde(default)]
    pub endian: Endian,
}

fn default_format_code() -> i32 {
    2
}

impl TableHeader {
    pub fn new(element_type: u32, num_wide: usize) -> Self {
        Self {
            element_type,
            num_wide,
            device_code: 0,
            format_code: default_format_code(),
            sort: Sort::Sort1,
            nonlinear_factor: None,
            result_kind: ResultKind::Stress,
            endian: Endian::Little,
        }
    }

    pub fn with_device_code(mut self, device_code: i32) -> Self {
        self.device_code = device_code;
        self
    }

    pub fn with_magnitude_phase(mut self, magnitude_phase: bool) -> Self {
        self.format_code = if magnitude_phase { 3 } else { 2 };
        self
    }

    pub fn with_nonlinear_factor(mut self, dt: f64) -> Self {
        self.nonlinear_factor = Some(dt);
        self
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn is_magnitude_phase(&self) -> bool {
        self.format_code == 3
    }

    pub fn is_sort1(&self) -> bool {
        matches!(self.sort, Sort::Sort1)
    }

    /// Interpretation of the leading word of each record
    pub fn format_start(&self) -> FormatStart {
        let leading = match self.sort {
            Sort::Sort1 => LeadingField::PackedId {
                device_code: self.device_code,
                dt: self.nonlinear_factor,
            },
            Sort::Sort2 { element_id } => LeadingField::TimeFrequency { element_id },
        };
        FormatStart {
            leading,
            endian: self.endian,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeadingField {
    /// `10 * eid + device_code`
    PackedId { device_code: i32, dt: Option<f64> },
    /// Float time/frequency; the element is fixed by the table
    TimeFrequency { element_id: i32 },
}

/// Element and time/frequency a record belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordKey {
    pub dt: Option<f64>,
    pub eid: i32,
}

/// Leading-field format plus the ID extractor for one table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatStart {
    pub leading: LeadingField,
    pub endian: Endian,
}

impl FormatStart {
    /// Split the leading word of a record into its element ID and `dt`
    pub fn extract(&self, word: [u8; 4]) -> RecordKey {
        match self.leading {
            LeadingField::PackedId { device_code, dt } => RecordKey {
                dt,
                eid: (self.int(word) - device_code) / 10,
            },
            LeadingField::TimeFrequency { element_id } => RecordKey {
                dt: Some(f64::from(self.float(word))),
                eid: element_id,
            },
        }
    }

    pub fn int(&self, word: [u8; 4]) -> i32 {
        match self.endian {
            Endian::Little => i32::from_le_bytes(word),
            Endian::Big => i32::from_be_bytes(word),
        }
    }

    pub fn float(&self, word: [u8; 4]) -> f32 {
        match self.endian {
            Endian::Little => f32::from_le_bytes(word),
            Endian::Big => f32::from_be_bytes(word),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort1_strips_device_code() {
        let header = TableHeader::new(1, 5)
            .with_device_code(1)
            .with_nonlinear_factor(12.5);
        let start = header.format_start();
        let key = start.extract((10 * 42 + 1i32).to_le_bytes());
        assert_eq!(key.eid, 42);
        assert_eq!(key.dt, Some(12.5));
    }

    #[test]
    fn sort2_reads_time_from_record() {
        let mut header = TableHeader::new(1, 5).with_endian(Endian::Big);
        header.sort = Sort::Sort2 { element_id: 7 };
        let key = header.format_start().extract(3.0f32.to_be_bytes());
        assert_eq!(key, RecordKey { dt: Some(3.0), eid: 7 });
    }

    #[test]
    fn header_json_defaults() {
        let header: TableHeader =
            serde_json::from_str(r#"{"element_type": 33, "num_wide": 15, "format_code": 3}"#)
                .unwrap();
        assert!(header.is_magnitude_phase());
        assert!(header.is_sort1());
        assert_eq!(header.endian, Endian::Little);
    }
}
