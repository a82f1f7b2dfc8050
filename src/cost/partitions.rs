use std::collections::{BTreeMap, BTreeSet};

use crate::layout::{PartitionsMap, SelectionPlan};
use crate::workload::WorkloadSnapshot;

use super::disk::{DiskCostModel, DiskParams};
use super::memory::MemCostModel;
use super::partitioning::{PartitioningCostCalculator, SelectivityDiskPartitioningCalculator};
use super::{CostModelKind, IoCost};

/// Workload cost of a possibly overlapping layout. Because an attribute may
/// be stored in several partitions, each query needs a selection plan naming
/// the partitions it reads; [`find_partitions_cost`] solves for the cheapest
/// plan and returns it alongside the cost.
///
/// [`find_partitions_cost`]: PartitionsCostCalculator::find_partitions_cost
pub trait PartitionsCostCalculator {
    fn workload(&self) -> &WorkloadSnapshot;

    /// Cost of the layout under a fixed selection plan.
    fn partitions_cost(&self, partitions: &PartitionsMap, plan: &SelectionPlan) -> f64;

    /// Find the cheapest selection plan for every query and return the total
    /// cost together with the plan. Queries referencing no attribute get an
    /// empty selection at zero cost.
    fn find_partitions_cost(&self, partitions: &PartitionsMap) -> (f64, SelectionPlan);

    /// Cost of reading the current partitions and writing the new ones. Zero
    /// for models without a write path.
    fn layout_creation_cost(&self, _source: &PartitionsMap, _target: &PartitionsMap) -> f64 {
        0.0
    }
}

fn partition_row_sizes(w: &WorkloadSnapshot, partitions: &PartitionsMap) -> BTreeMap<usize, u32> {
    partitions
        .iter()
        .map(|(&p, attrs)| (p, attrs.iter().map(|&a| w.attribute_sizes[a]).sum()))
        .collect()
}

/// For each referenced attribute, the partitions that could serve it.
fn candidate_partitions(
    partitions: &PartitionsMap,
    access_set: &[usize],
) -> BTreeMap<usize, BTreeSet<usize>> {
    access_set
        .iter()
        .map(|&a| {
            let candidates = partitions
                .iter()
                .filter(|(_, attrs)| attrs.contains(&a))
                .map(|(&p, _)| p)
                .collect();
            (a, candidates)
        })
        .collect()
}

/// Exhaustive search for the cheapest set of partitions covering a query's
/// access set. Walks the referenced attributes in order, trying every
/// candidate partition for each, and prunes branches whose partition adds no
/// newly covered attribute.
struct SelectionPlanSolver<'a, F: Fn(&BTreeSet<usize>) -> f64> {
    partitions: &'a PartitionsMap,
    query_access_set: &'a [usize],
    candidate_partitions: &'a BTreeMap<usize, BTreeSet<usize>>,
    cost_of: F,
    best_cost: f64,
    best_solution: Option<BTreeSet<usize>>,
}

impl<'a, F: Fn(&BTreeSet<usize>) -> f64> SelectionPlanSolver<'a, F> {
    fn new(
        partitions: &'a PartitionsMap,
        query_access_set: &'a [usize],
        candidate_partitions: &'a BTreeMap<usize, BTreeSet<usize>>,
        cost_of: F,
    ) -> Self {
        SelectionPlanSolver {
            partitions,
            query_access_set,
            candidate_partitions,
            cost_of,
            best_cost: f64::MAX,
            best_solution: None,
        }
    }

    fn solve(mut self) -> (f64, BTreeSet<usize>) {
        self.search(0, &BTreeSet::new(), &BTreeSet::new());
        match self.best_solution {
            Some(solution) => (self.best_cost, solution),
            // some attribute has no candidate partition
            None => (f64::INFINITY, BTreeSet::new()),
        }
    }

    fn search(
        &mut self,
        index: usize,
        already_covered: &BTreeSet<usize>,
        current_solution: &BTreeSet<usize>,
    ) {
        let attribute = self.query_access_set[index];

        for &p in &self.candidate_partitions[&attribute] {
            let intersection: BTreeSet<usize> = self.partitions[&p]
                .iter()
                .copied()
                .filter(|a| self.query_access_set.contains(a))
                .collect();

            let mut new_covered = already_covered.clone();
            let mut new_solution = current_solution.clone();

            // skip partitions covering nothing new
            if !intersection.is_subset(already_covered) {
                new_covered.extend(intersection.iter().copied());
                new_solution.insert(p);
            }

            if index == self.query_access_set.len() - 1
                || new_covered.len() == self.query_access_set.len()
            {
                let cost = (self.cost_of)(&new_solution);
                if cost < self.best_cost {
                    self.best_cost = cost;
                    self.best_solution = Some(new_solution);
                }
            } else {
                self.search(index + 1, &new_covered, &new_solution);
            }
        }
    }
}

/// Disk seek and scan time for overlapping layouts.
pub struct DiskPartitionsCalculator {
    w: WorkloadSnapshot,
    cm: DiskCostModel,
}

impl DiskPartitionsCalculator {
    pub fn new(w: &WorkloadSnapshot, cm: DiskCostModel) -> Self {
        DiskPartitionsCalculator { w: w.clone(), cm }
    }

    fn cost_for_query(&self, row_sizes: &BTreeMap<usize, u32>, solution: &BTreeSet<usize>) -> f64 {
        let referenced_row_size: u32 = solution.iter().map(|p| row_sizes[p]).sum();
        solution
            .iter()
            .map(|p| self.cm.cost(row_sizes[p], referenced_row_size))
            .sum()
    }
}

impl PartitionsCostCalculator for DiskPartitionsCalculator {
    fn workload(&self) -> &WorkloadSnapshot {
        &self.w
    }

    fn partitions_cost(&self, partitions: &PartitionsMap, plan: &SelectionPlan) -> f64 {
        let row_sizes = partition_row_sizes(&self.w, partitions);
        let empty = BTreeSet::new();

        (0..self.w.query_count)
            .map(|q| self.cost_for_query(&row_sizes, plan.get(&q).unwrap_or(&empty)))
            .sum()
    }

    fn find_partitions_cost(&self, partitions: &PartitionsMap) -> (f64, SelectionPlan) {
        let row_sizes = partition_row_sizes(&self.w, partitions);

        let mut total = 0.0;
        let mut plan = SelectionPlan::new();

        for q in 0..self.w.query_count {
            let access_set = self.w.query_access_set(q);
            if access_set.is_empty() {
                plan.insert(q, BTreeSet::new());
                continue;
            }

            let candidates = candidate_partitions(partitions, &access_set);
            let solver = SelectionPlanSolver::new(partitions, &access_set, &candidates, |s| {
                self.cost_for_query(&row_sizes, s)
            });
            let (cost, solution) = solver.solve();

            total += cost;
            plan.insert(q, solution);
        }

        (total, plan)
    }

    fn layout_creation_cost(&self, source: &PartitionsMap, target: &PartitionsMap) -> f64 {
        let mut cost = 0.0;

        let row_sizes = partition_row_sizes(&self.w, source);
        let total_row_size: u32 = row_sizes.values().sum();
        for &row_size in row_sizes.values() {
            cost += self.cm.cost(row_size, total_row_size);
        }

        let row_sizes = partition_row_sizes(&self.w, target);
        let total_row_size: u32 = row_sizes.values().sum();
        let write_cm = self.cm.for_writing();
        for &row_size in row_sizes.values() {
            cost += write_cm.cost(row_size, total_row_size);
        }

        cost
    }
}

/// Selectivity-aware disk costing for overlapping layouts. Falls back to the
/// non-overlapping selectivity calculator over the exploded partition list,
/// with each query reading every partition that holds one of its attributes.
pub struct SelectivityDiskPartitionsCalculator {
    w: WorkloadSnapshot,
    inner: SelectivityDiskPartitioningCalculator,
}

impl SelectivityDiskPartitionsCalculator {
    pub fn new(w: &WorkloadSnapshot, cm: DiskCostModel) -> Self {
        SelectivityDiskPartitionsCalculator {
            w: w.clone(),
            inner: SelectivityDiskPartitioningCalculator::new(w, cm),
        }
    }

    fn exploded(partitions: &PartitionsMap) -> Vec<Vec<usize>> {
        partitions
            .values()
            .map(|attrs| attrs.iter().copied().collect())
            .collect()
    }
}

impl PartitionsCostCalculator for SelectivityDiskPartitionsCalculator {
    fn workload(&self) -> &WorkloadSnapshot {
        &self.w
    }

    fn partitions_cost(&self, partitions: &PartitionsMap, _plan: &SelectionPlan) -> f64 {
        let all: Vec<usize> = (0..self.w.query_count).collect();
        self.inner.partitions_cost(&Self::exploded(partitions), &all)
    }

    fn find_partitions_cost(&self, partitions: &PartitionsMap) -> (f64, SelectionPlan) {
        let mut plan = SelectionPlan::new();
        for q in 0..self.w.query_count {
            let selected = partitions
                .iter()
                .filter(|(_, attrs)| attrs.iter().any(|&a| self.w.usage_matrix[q][a] == 1))
                .map(|(&p, _)| p)
                .collect();
            plan.insert(q, selected);
        }

        (self.partitions_cost(partitions, &plan), plan)
    }
}

/// Cache-miss costing for overlapping layouts.
pub struct MemPartitionsCalculator {
    w: WorkloadSnapshot,
    cm: MemCostModel,
}

impl MemPartitionsCalculator {
    pub fn new(w: &WorkloadSnapshot) -> Self {
        MemPartitionsCalculator {
            w: w.clone(),
            cm: MemCostModel::new(w),
        }
    }

    fn cost_for_query(
        &self,
        partitions: &PartitionsMap,
        solution: &BTreeSet<usize>,
        query: usize,
    ) -> f64 {
        solution
            .iter()
            .map(|p| {
                let attrs: Vec<usize> = partitions[p].iter().copied().collect();
                self.cm.cache_misses(&attrs, query)
            })
            .sum::<u64>() as f64
    }
}

impl PartitionsCostCalculator for MemPartitionsCalculator {
    fn workload(&self) -> &WorkloadSnapshot {
        &self.w
    }

    fn partitions_cost(&self, partitions: &PartitionsMap, plan: &SelectionPlan) -> f64 {
        let empty = BTreeSet::new();

        (0..self.w.query_count)
            .map(|q| self.cost_for_query(partitions, plan.get(&q).unwrap_or(&empty), q))
            .sum()
    }

    fn find_partitions_cost(&self, partitions: &PartitionsMap) -> (f64, SelectionPlan) {
        let mut total = 0.0;
        let mut plan = SelectionPlan::new();

        for q in 0..self.w.query_count {
            let access_set = self.w.query_access_set(q);
            if access_set.is_empty() {
                plan.insert(q, BTreeSet::new());
                continue;
            }

            let candidates = candidate_partitions(partitions, &access_set);
            let solver = SelectionPlanSolver::new(partitions, &access_set, &candidates, |s| {
                self.cost_for_query(partitions, s, q)
            });
            let (cost, solution) = solver.solve();

            total += cost;
            plan.insert(q, solution);
        }

        (total, plan)
    }
}

pub fn create_partitions_calculator(
    kind: CostModelKind,
    w: &WorkloadSnapshot,
    params: DiskParams,
) -> Box<dyn PartitionsCostCalculator> {
    let cm = DiskCostModel::new(params, w.num_rows);
    match kind {
        CostModelKind::Disk => Box::new(DiskPartitionsCalculator::new(w, cm)),
        CostModelKind::DiskSelectivity => Box::new(SelectivityDiskPartitionsCalculator::new(w, cm)),
        CostModelKind::Mem => Box::new(MemPartitionsCalculator::new(w)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::Table;

    fn overlapping_partitions() -> PartitionsMap {
        let mut partitions = PartitionsMap::new();
        partitions.insert(0, BTreeSet::from([0, 1]));
        partitions.insert(1, BTreeSet::from([1, 2]));
        partitions.insert(2, BTreeSet::from([2, 3]));
        partitions.insert(3, BTreeSet::from([0, 1, 2, 3]));
        partitions
    }

    fn snapshot() -> WorkloadSnapshot {
        let mut t = Table::simple(4, 1_000_000);
        t.add_projection_query("q0", 1, vec![0, 3]);
        t.add_projection_query("q1", 1, vec![1]);
        WorkloadSnapshot::of_table(&t)
    }

    #[test]
    fn test_plan_covers_each_query() {
        let w = snapshot();
        let calc = create_partitions_calculator(CostModelKind::Disk, &w, DiskParams::default());
        let partitions = overlapping_partitions();

        let (cost, plan) = calc.find_partitions_cost(&partitions);
        assert!(cost.is_finite());

        for q in 0..w.query_count {
            let covered: BTreeSet<usize> = plan[&q]
                .iter()
                .flat_map(|p| partitions[p].iter().copied())
                .collect();
            for a in w.query_access_set(q) {
                assert!(covered.contains(&a), "query {q} missing attribute {a}");
            }
        }
    }

    #[test]
    fn test_plan_cost_matches_fixed_plan_cost() {
        let w = snapshot();
        let calc = create_partitions_calculator(CostModelKind::Disk, &w, DiskParams::default());
        let partitions = overlapping_partitions();

        let (cost, plan) = calc.find_partitions_cost(&partitions);
        assert_eq!(cost, calc.partitions_cost(&partitions, &plan));
    }

    #[test]
    fn test_query_without_attributes_costs_nothing() {
        let mut t = Table::simple(2, 1000);
        t.add_projection_query("q0", 1, vec![]);
        let w = WorkloadSnapshot::of_table(&t);
        let calc = create_partitions_calculator(CostModelKind::Disk, &w, DiskParams::default());

        let mut partitions = PartitionsMap::new();
        partitions.insert(0, BTreeSet::from([0, 1]));

        let (cost, plan) = calc.find_partitions_cost(&partitions);
        assert_eq!(cost, 0.0);
        assert!(plan[&0].is_empty());
    }

    #[test]
    fn test_mem_solver_picks_narrow_partitions() {
        let w = snapshot();
        let calc = create_partitions_calculator(CostModelKind::Mem, &w, DiskParams::default());
        let partitions = overlapping_partitions();

        let (_, plan) = calc.find_partitions_cost(&partitions);
        // q1 projects only attribute 1; a two-attribute partition beats the
        // full-width one
        assert!(!plan[&1].contains(&3));
    }
}
