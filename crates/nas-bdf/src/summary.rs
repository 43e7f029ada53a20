//! Card census of a model.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::collection::Card;
use crate::model::Model;
use crate::resolvable::Resolvable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub total_cards: usize,
    /// Cards per bulk-data name (`GRID`, `CQUAD4`, ...)
    pub card_counts: BTreeMap<String, usize>,
    /// Resolvable cards that currently carry links
    pub cross_referenced: usize,
    /// Resolvable cards without links, per card name
    pub unresolved: BTreeMap<String, usize>,
    pub spoints: usize,
    pub xref_errors: usize,
    pub has_aero: bool,
    pub has_optimization: bool,
}

#[derive(Default)]
struct Census {
    card_counts: BTreeMap<String, usize>,
    cross_referenced: usize,
    unresolved: BTreeMap<String, usize>,
}

impl Census {
    fn count<'a, T: Card + 'a>(&mut self, cards: impl IntoIterator<Item = &'a T>) {
        for card in cards {
            *self.card_counts.entry(card.card().to_string()).or_insert(0) += 1;
        }
    }

    fn count_linked<'a, T: Resolvable + 'a>(&mut self, cards: impl IntoIterator<Item = &'a T>) {
        for card in cards {
            *self.card_counts.entry(card.card().to_string()).or_insert(0) += 1;
            if card.is_cross_referenced() {
                self.cross_referenced += 1;
            } else {
                *self.unresolved.entry(card.card().to_string()).or_insert(0) += 1;
            }
        }
    }
}

impl ModelSummary {
    pub fn from_model(model: &Model) -> Self {
        let mut census = Census::default();

        // the basic frame is implicit, not a card
        census.count_linked(model.coords.iter().filter(|c| c.cid != 0));
        census.count_linked(model.nodes.iter());
        census.count_linked(model.elements.iter());
        census.count_linked(model.rigid_elements.iter());
        census.count_linked(model.properties.iter());
        census.count_linked(model.masses.iter());
        census.count_linked(model.mass_properties.iter());
        census.count_linked(model.materials.iter());
        census.count(model.tables.iter());
        census.count_linked(model.material_deps.iter());

        census.count_linked(model.loads.values());
        census.count_linked(model.dloads.values());
        census.count_linked(model.dload_entries.values());

        census.count_linked(model.spcs.values());
        census.count_linked(model.spcadds.iter());
        census.count_linked(model.mpcs.values());
        census.count_linked(model.mpcadds.iter());
        census.count_linked(model.suports.iter());
        census.count_linked(model.suport1s.iter());
        census.count_linked(model.se_suports.iter());

        census.count_linked(model.caeros.iter());
        census.count_linked(model.paeros.iter());
        census.count_linked(model.splines.iter());
        census.count_linked(model.aecomps.values());
        census.count_linked(model.aelists.iter());
        census.count_linked(model.aeparams.iter());
        census.count_linked(model.aestats.iter());
        census.count_linked(model.aesurf.iter());
        census.count_linked(model.aesurfs.iter());
        census.count(model.aefacts.iter());
        census.count(model.set1s.iter());

        for sets in [
            &model.asets,
            &model.bsets,
            &model.csets,
            &model.qsets,
            &model.se_bsets,
            &model.se_csets,
            &model.se_qsets,
            &model.se_usets,
        ] {
            census.count_linked(sets.iter());
        }
        census.count_linked(model.usets.values());
        census.count_linked(model.se_sets.values());

        census.count(model.desvars.iter());
        census.count(model.deqatns.iter());
        census.count_linked(model.dresps.iter());
        census.count_linked(model.dconstrs.values());

        let mut card_counts = census.card_counts;
        if model.grid_set.is_some() {
            card_counts.insert("GRDSET".to_string(), 1);
        }
        if model.dtable.is_some() {
            card_counts.insert("DTABLE".to_string(), 1);
        }

        let has_aero = !model.caeros.is_empty() || !model.splines.is_empty();
        let has_optimization = !model.desvars.is_empty() || !model.dresps.is_empty();

        Self {
            total_cards: card_counts.values().sum(),
            card_counts,
            cross_referenced: census.cross_referenced,
            unresolved: census.unresolved,
            spoints: model.spoints.len(),
            xref_errors: model.xref_errors.total(),
            has_aero,
            has_optimization,
        }
    }

    /// Count for one card name, zero when absent
    pub fn count(&self, card: &str) -> usize {
        self.card_counts.get(card).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::ModelSummary;
    use crate::elements::{Element, ElementKind};
    use crate::model::Model;
    use crate::nodes::Grid;

    #[test]
    fn counts_cards_by_name() {
        let mut model = Model::new();
        for nid in 1..=4 {
            model.add_grid(Grid::new(nid, [nid as f64, 0.0, 0.0])).unwrap();
        }
        model
            .add_element(Element::new(10, ElementKind::Crod, Some(1), &[1, 2]))
            .unwrap();
        model
            .add_element(Element::new(11, ElementKind::Crod, Some(1), &[3, 4]))
            .unwrap();

        let s = ModelSummary::from_model(&model);
        assert_eq!(s.count("GRID"), 4);
        assert_eq!(s.count("CROD"), 2);
        assert_eq!(s.count("CORD2R"), 0);
        assert_eq!(s.total_cards, 6);
        assert_eq!(s.cross_referenced, 0);
        assert_eq!(s.unresolved.get("GRID"), Some(&4));
        assert!(!s.has_aero);
    }
}
