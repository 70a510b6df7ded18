//! Per-family responsibility distribution.

use crate::model::catalog::{Catalog, Family};
use crate::model::entry::{EntryLookup, Responsibility, Revision};
use serde::Serialize;

/// Percentage breakdown of one family's objectives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyStat {
    pub id: String,
    pub title: String,
    pub label: String,
    pub customer_pct: f64,
    pub provider_pct: f64,
    pub shared_pct: f64,
    pub total: usize,
}

impl FamilyStat {
    /// Last dotted segment of the family id, used as the row label.
    pub fn short_id(&self) -> &str {
        self.id.rsplit('.').next().unwrap_or(self.id.as_str())
    }

    pub fn pct(&self, responsibility: Responsibility) -> f64 {
        match responsibility {
            Responsibility::Customer => self.customer_pct,
            Responsibility::Provider => self.provider_pct,
            Responsibility::Shared => self.shared_pct,
        }
    }
}

/// Input model for the responsibility graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphModel {
    pub revision: Revision,
    pub revision_label: &'static str,
    pub stats: Vec<FamilyStat>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    customer: usize,
    provider: usize,
    shared: usize,
    total: usize,
}

impl Counts {
    fn add(&mut self, responsibility: Responsibility) {
        match responsibility {
            Responsibility::Customer => self.customer += 1,
            Responsibility::Provider => self.provider += 1,
            Responsibility::Shared => self.shared += 1,
        }
        self.total += 1;
    }

    fn pct(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * count as f64 / self.total as f64
        }
    }
}

/// Computes the responsibility distribution of every family, in catalog order.
///
/// Objectives without an entry count as `Customer`.
pub fn compute_family_stats(catalog: &Catalog, entries: &impl EntryLookup) -> Vec<FamilyStat> {
    catalog
        .families
        .iter()
        .map(|family| family_stat(family, entries))
        .collect()
}

/// Builds the graph model for the active revision.
pub fn build_graph(catalog: &Catalog, entries: &impl EntryLookup, revision: Revision) -> GraphModel {
    GraphModel {
        revision,
        revision_label: revision.label(),
        stats: compute_family_stats(catalog, entries),
    }
}

fn family_stat(family: &Family, entries: &impl EntryLookup) -> FamilyStat {
    let mut counts = Counts::default();
    for objective in family.objectives() {
        counts.add(entries.effective_responsibility(&objective.id));
    }

    FamilyStat {
        id: family.id.clone(),
        title: family.title.clone(),
        label: family.label.clone(),
        customer_pct: counts.pct(counts.customer),
        provider_pct: counts.pct(counts.provider),
        shared_pct: counts.pct(counts.shared),
        total: counts.total,
    }
}

#[cfg(test)]
mod tests {
    use super::compute_family_stats;
    use crate::model::catalog::{Catalog, Control, Family, Objective};
    use crate::model::entry::{Entry, EntryMap, Responsibility};

    fn catalog(objective_ids: &[&str]) -> Catalog {
        Catalog {
            families: vec![Family {
                id: "03.01".to_string(),
                title: "Access Control".to_string(),
                label: "AC".to_string(),
                controls: vec![Control {
                    id: "03.01.01".to_string(),
                    title: "Account Management".to_string(),
                    label: "AC.L2-3.1.1".to_string(),
                    statement: String::new(),
                    objectives: objective_ids
                        .iter()
                        .map(|id| Objective {
                            id: id.to_string(),
                            prose: String::new(),
                            label: String::new(),
                        })
                        .collect(),
                }],
            }],
        }
    }

    #[test]
    fn thirds_sum_to_one_hundred() {
        let mut entries = EntryMap::new();
        entries.insert("b".into(), Entry::new(Responsibility::Provider, ""));
        entries.insert("c".into(), Entry::new(Responsibility::Shared, ""));

        let stats = compute_family_stats(&catalog(&["a", "b", "c"]), &entries);
        let stat = &stats[0];
        let sum = stat.customer_pct + stat.provider_pct + stat.shared_pct;
        assert!((sum - 100.0).abs() < 1e-9);
        assert_eq!(stat.total, 3);
    }

    #[test]
    fn one_provider_of_two_splits_evenly() {
        let mut entries = EntryMap::new();
        entries.insert("o1".into(), Entry::new(Responsibility::Provider, ""));

        let stats = compute_family_stats(&catalog(&["o1", "o2"]), &entries);
        assert_eq!(stats[0].customer_pct, 50.0);
        assert_eq!(stats[0].provider_pct, 50.0);
        assert_eq!(stats[0].shared_pct, 0.0);
        assert_eq!(stats[0].total, 2);
        let by_column: Vec<f64> = Responsibility::ALL
            .iter()
            .map(|responsibility| stats[0].pct(*responsibility))
            .collect();
        assert_eq!(by_column, vec![50.0, 50.0, 0.0]);
    }

    #[test]
    fn empty_family_is_all_zero() {
        let stats = compute_family_stats(&catalog(&[]), &EntryMap::new());
        let stat = &stats[0];
        assert_eq!(stat.total, 0);
        assert_eq!(stat.customer_pct, 0.0);
        assert_eq!(stat.provider_pct, 0.0);
        assert_eq!(stat.shared_pct, 0.0);
    }

    #[test]
    fn unmatched_keys_are_ignored() {
        let mut entries = EntryMap::new();
        entries.insert("rev2-only".into(), Entry::new(Responsibility::Shared, ""));

        let stats = compute_family_stats(&catalog(&["a"]), &entries);
        assert_eq!(stats[0].customer_pct, 100.0);
        assert_eq!(stats[0].shared_pct, 0.0);
        assert_eq!(stats[0].short_id(), "01");
    }
}
