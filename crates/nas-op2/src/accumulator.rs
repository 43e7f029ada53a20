//! Insertion protocol for decoded samples and the default result container.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::Complex;
use serde::{Serialize, Serializer};

/// Where within an element a sample was recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Whole-element quantity (rods, springs, bars, bushes)
    Element,
    /// Centroid pseudo-grid, `CEN/4` or `CEN/3`
    Centroid(&'static str),
    Grid(i32),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Element => f.write_str("ELEM"),
            Location::Centroid(label) => f.write_str(label),
            Location::Grid(nid) => write!(f, "{nid}"),
        }
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Location::Grid(nid) => serializer.serialize_i32(*nid),
            other => serializer.collect_str(other),
        }
    }
}

/// Decoded values of one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Sample {
    Values { values: Vec<Complex<f64>> },
    /// Plate fiber: distance from the mid-plane plus complex components
    Fiber {
        fiber_distance: f64,
        values: Vec<Complex<f64>>,
    },
    /// Real values, with the fiber distance for nonlinear plates
    Real {
        fiber_distance: f64,
        values: Vec<f64>,
    },
}

/// Receiver of decoded element records.
///
/// `add_new_eid` opens the record of an element for a given `dt`; `add`
/// appends a further sample (second fiber, second point) to it, and
/// `add_new_node` appends the first sample of the next corner grid.
pub trait ComplexAccumulator {
    fn add_new_eid(
        &mut self,
        element: &'static str,
        dt: Option<f64>,
        eid: i32,
        location: Location,
        sample: Sample,
    );

    fn add(&mut self, dt: Option<f64>, eid: i32, location: Location, sample: Sample);

    fn add_new_node(&mut self, dt: Option<f64>, eid: i32, location: Location, sample: Sample);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedSample {
    pub location: Location,
    #[serde(flatten)]
    pub sample: Sample,
}

/// Samples of every element at one time/frequency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultStep {
    pub dt: Option<f64>,
    pub elements: BTreeMap<i32, Vec<LocatedSample>>,
}

/// Complex element results grouped by `dt`, then element ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplexElementResults {
    pub element_names: BTreeMap<i32, &'static str>,
    pub steps: Vec<ResultStep>,
}

impl ComplexElementResults {
    pub fn new() -> Self {
        Self::default()
    }

    fn step_mut(&mut self, dt: Option<f64>) -> &mut ResultStep {
        let position = self
            .steps
            .iter()
            .position(|s| s.dt.map(f64::to_bits) == dt.map(f64::to_bits));
        let index = match position {
            Some(index) => index,
            None => {
                self.steps.push(ResultStep {
                    dt,
                    elements: BTreeMap::new(),
                });
                self.steps.len() - 1
            }
        };
        &mut self.steps[index]
    }

    pub fn step(&self, dt: Option<f64>) -> Option<&ResultStep> {
        self.steps
            .iter()
            .find(|s| s.dt.map(f64::to_bits) == dt.map(f64::to_bits))
    }

    /// Samples of one element at `dt`, in decode order
    pub fn samples(&self, dt: Option<f64>, eid: i32) -> &[LocatedSample] {
        self.step(dt)
            .and_then(|s| s.elements.get(&eid))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Distinct elements over all steps
    pub fn element_count(&self) -> usize {
        self.element_names.len()
    }

    pub fn sample_count(&self) -> usize {
        self.steps
            .iter()
            .flat_map(|s| s.elements.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl ComplexAccumulator for ComplexElementResults {
    fn add_new_eid(
        &mut self,
        element: &'static str,
        dt: Option<f64>,
        eid: i32,
        location: Location,
        sample: Sample,
    ) {
        self.element_names.insert(eid, element);
        // a repeated element restarts its record
        self.step_mut(dt)
            .elements
            .insert(eid, vec![LocatedSample { location, sample }]);
    }

    fn add(&mut self, dt: Option<f64>, eid: i32, location: Location, sample: Sample) {
        self.step_mut(dt)
            .elements
            .entry(eid)
            .or_default()
            .push(LocatedSample { location, sample });
    }

    fn add_new_node(&mut self, dt: Option<f64>, eid: i32, location: Location, sample: Sample) {
        self.add(dt, eid, location, sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(re: f64) -> Sample {
        Sample::Values {
            values: vec![Complex::new(re, 0.0)],
        }
    }

    #[test]
    fn groups_by_dt_then_element() {
        let mut results = ComplexElementResults::new();
        results.add_new_eid("CROD", Some(1.0), 10, Location::Element, sample(1.0));
        results.add_new_eid("CROD", Some(2.0), 10, Location::Element, sample(2.0));
        results.add_new_eid("CROD", Some(1.0), 11, Location::Element, sample(3.0));

        assert_eq!(results.steps.len(), 2);
        assert_eq!(results.samples(Some(1.0), 10)[0].sample, sample(1.0));
        assert_eq!(results.samples(Some(2.0), 10)[0].sample, sample(2.0));
        assert_eq!(results.element_count(), 2);
        assert_eq!(results.sample_count(), 3);
    }

    #[test]
    fn appends_keep_order_and_labels() {
        let mut results = ComplexElementResults::new();
        let cen = Location::Centroid("CEN/4");
        results.add_new_eid("CQUAD4", None, 5, cen, sample(1.0));
        results.add(None, 5, cen, sample(2.0));
        results.add_new_node(None, 5, Location::Grid(101), sample(3.0));
        results.add(None, 5, Location::Grid(101), sample(4.0));

        let labels: Vec<String> = results
            .samples(None, 5)
            .iter()
            .map(|s| s.location.to_string())
            .collect();
        assert_eq!(labels, ["CEN/4", "CEN/4", "101", "101"]);
    }

    #[test]
    fn serializes_locations_as_labels() {
        let mut results = ComplexElementResults::new();
        results.add_new_eid("CTRIA3", None, 1, Location::Centroid("CEN/3"), sample(1.0));
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["steps"][0]["elements"]["1"][0]["location"], "CEN/3");
        assert_eq!(json["element_names"]["1"], "CTRIA3");
    }
}
