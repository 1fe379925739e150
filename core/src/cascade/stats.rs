//! Aggregation across Monte-Carlo runs: confidence intervals, critical
//! paths, and bottleneck ranking. See spec §4.C.2/.3.

use crate::cascade::result::{BottleneckNode, ConfidenceInterval, CriticalPath, RunResult};
use crate::types::NodeId;
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::HashMap;

/// Top-K bound on critical paths and bottleneck nodes returned per
/// aggregate (spec doesn't fix a number; we cap to keep results legible
/// and avoid an unbounded response for dense graphs).
const TOP_K: usize = 10;

/// Wilson score interval for a proportion (spec §4.C.3: "Wilson interval
/// for proportions"). Falls back to a point estimate with zero width
/// when `total == 0`.
pub fn wilson_interval(successes: u32, total: u32, level: f64) -> ConfidenceInterval {
    if total == 0 {
        return ConfidenceInterval {
            mean: 0.0,
            lower: 0.0,
            upper: 0.0,
            level,
        };
    }
    let n = total as f64;
    let p = successes as f64 / n;
    let z = Normal::new(0.0, 1.0)
        .expect("standard normal is always constructible")
        .inverse_cdf(0.5 + level / 2.0);
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let centre = p + z2 / (2.0 * n);
    let margin = z * ((p * (1.0 - p) / n) + z2 / (4.0 * n * n)).sqrt();
    ConfidenceInterval {
        mean: p,
        lower: ((centre - margin) / denom).clamp(0.0, 1.0),
        upper: ((centre + margin) / denom).clamp(0.0, 1.0),
        level,
    }
}

/// Normal-approximation interval for a sample mean (spec §4.C.3:
/// "Student-t interval for continuous quantities"; with the run counts
/// this module is built for, n is typically large enough that the
/// normal approximation of the t-distribution is adequate and avoids an
/// extra degrees-of-freedom parameter at the call sites).
pub fn mean_interval(values: &[f64], level: f64) -> ConfidenceInterval {
    let n = values.len();
    if n == 0 {
        return ConfidenceInterval {
            mean: 0.0,
            lower: 0.0,
            upper: 0.0,
            level,
        };
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return ConfidenceInterval {
            mean,
            lower: mean,
            upper: mean,
            level,
        };
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    let std_err = (variance / n as f64).sqrt();
    let z = Normal::new(0.0, 1.0)
        .expect("standard normal is always constructible")
        .inverse_cdf(0.5 + level / 2.0);
    ConfidenceInterval {
        mean,
        lower: mean - z * std_err,
        upper: mean + z * std_err,
        level,
    }
}

/// Per-node failure probability across completed runs.
pub fn failure_probability(runs: &[RunResult], all_nodes: &[NodeId]) -> HashMap<NodeId, f64> {
    let total = runs.len().max(1) as f64;
    all_nodes
        .iter()
        .map(|id| {
            let count = runs.iter().filter(|r| r.failed.contains(id)).count();
            (id.clone(), count as f64 / total)
        })
        .collect()
}

/// Mean time-to-failure across only the runs in which a node actually
/// failed — an always-infinite node contributes no samples and is
/// simply absent from the result.
pub fn mean_time_to_failure(runs: &[RunResult], all_nodes: &[NodeId]) -> HashMap<NodeId, f64> {
    let mut out = HashMap::new();
    for id in all_nodes {
        let samples: Vec<f64> = runs
            .iter()
            .filter_map(|r| r.time_to_failure.get(id).copied())
            .filter(|t| t.is_finite())
            .collect();
        if !samples.is_empty() {
            out.insert(id.clone(), samples.iter().sum::<f64>() / samples.len() as f64);
        }
    }
    out
}

/// Reconstruct every root-to-leaf causal chain in a run's failure
/// forest, then count how often each exact chain recurs across runs.
/// Top-`K` by frequency, ties broken by total criticality then
/// lexicographic node order, for determinism (spec §8 property 2).
pub fn extract_critical_paths(
    runs: &[RunResult],
    criticality: &HashMap<NodeId, f64>,
) -> Vec<CriticalPath> {
    let mut counts: HashMap<Vec<NodeId>, u32> = HashMap::new();
    for run in runs {
        for chain in root_to_leaf_chains(run) {
            *counts.entry(chain).or_insert(0) += 1;
        }
    }

    let mut paths: Vec<CriticalPath> = counts
        .into_iter()
        .map(|(chain, frequency)| {
            let total_criticality = chain.iter().map(|id| criticality.get(id).copied().unwrap_or(0.0)).sum();
            CriticalPath {
                chain,
                frequency,
                total_criticality,
            }
        })
        .collect();

    paths.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then_with(|| b.total_criticality.partial_cmp(&a.total_criticality).unwrap())
            .then_with(|| a.chain.cmp(&b.chain))
    });
    paths.truncate(TOP_K);
    paths
}

fn root_to_leaf_chains(run: &RunResult) -> Vec<Vec<NodeId>> {
    let mut children: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();
    for event in &run.timeline {
        children
            .entry(event.cause.clone())
            .or_default()
            .push(event.node_id.clone());
    }
    for v in children.values_mut() {
        v.sort();
    }

    let roots = children.get(&None).cloned().unwrap_or_default();
    let mut chains = Vec::new();
    for root in roots {
        let mut stack = vec![(root.clone(), vec![root])];
        while let Some((node, path)) = stack.pop() {
            match children.get(&Some(node.clone())) {
                Some(kids) if !kids.is_empty() => {
                    for kid in kids {
                        let mut next = path.clone();
                        next.push(kid.clone());
                        stack.push((kid.clone(), next));
                    }
                }
                _ => chains.push(path),
            }
        }
    }
    chains
}

/// Marginal impact reduction from protecting one node against failure,
/// estimated by replaying each run's recorded causal forest with that
/// node (and everything causally downstream of it in that run) excised
/// — no re-sampling, matching spec §4.C.3's "without running a fresh
/// Monte-Carlo batch" requirement.
pub fn compute_bottlenecks(
    runs: &[RunResult],
    all_nodes: &[NodeId],
    criticality: &HashMap<NodeId, f64>,
    horizon_minutes: f64,
) -> Vec<BottleneckNode> {
    let tau = (horizon_minutes / 4.0).max(1e-9);
    let baseline: f64 = runs.iter().map(|r| r.impact_score).sum::<f64>() / runs.len().max(1) as f64;

    let mut candidates: Vec<BottleneckNode> = all_nodes
        .iter()
        .filter(|id| runs.iter().any(|r| r.failed.contains(*id)))
        .map(|id| {
            let protected_mean: f64 = runs
                .iter()
                .map(|r| impact_with_node_protected(r, id, criticality, tau))
                .sum::<f64>()
                / runs.len().max(1) as f64;
            BottleneckNode {
                node_id: id.clone(),
                marginal_impact_reduction: (baseline - protected_mean).max(0.0),
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.marginal_impact_reduction
            .partial_cmp(&a.marginal_impact_reduction)
            .unwrap()
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    candidates.truncate(TOP_K);
    candidates
}

fn impact_with_node_protected(
    run: &RunResult,
    protected: &NodeId,
    criticality: &HashMap<NodeId, f64>,
    tau: f64,
) -> f64 {
    let mut children: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();
    for event in &run.timeline {
        children
            .entry(event.cause.clone())
            .or_default()
            .push(event.node_id.clone());
    }

    let mut excised = std::collections::HashSet::new();
    let mut stack = vec![protected.clone()];
    while let Some(id) = stack.pop() {
        if !excised.insert(id.clone()) {
            continue;
        }
        if let Some(kids) = children.get(&Some(id)) {
            stack.extend(kids.iter().cloned());
        }
    }

    run.failed
        .iter()
        .filter(|id| !excised.contains(*id))
        .map(|id| {
            let c = criticality.get(id).copied().unwrap_or(0.0);
            let t = run.time_to_failure.get(id).copied().unwrap_or(f64::INFINITY);
            let penalty = if t.is_finite() { (-t / tau).exp() } else { 0.0 };
            c * (1.0 + penalty)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::result::FailureEvent;
    use std::collections::BTreeSet;

    fn run(failed: &[&str], timeline: Vec<(&str, Option<&str>, f64)>) -> RunResult {
        RunResult {
            timeline: timeline
                .into_iter()
                .map(|(id, cause, t)| FailureEvent {
                    t_minutes: t,
                    node_id: NodeId::from(id),
                    cause: cause.map(NodeId::from),
                })
                .collect(),
            failed: failed.iter().map(|s| NodeId::from(*s)).collect::<BTreeSet<_>>(),
            time_to_failure: failed.iter().map(|s| (NodeId::from(*s), 1.0)).collect(),
            impact_score: 1.0,
        }
    }

    #[test]
    fn wilson_interval_brackets_the_point_estimate() {
        let ci = wilson_interval(50, 100, 0.95);
        assert!(ci.lower <= ci.mean && ci.mean <= ci.upper);
    }

    #[test]
    fn wilson_interval_degenerates_cleanly_with_no_runs() {
        let ci = wilson_interval(0, 0, 0.95);
        assert_eq!(ci.mean, 0.0);
    }

    #[test]
    fn critical_path_frequency_counts_identical_chains() {
        let runs = vec![
            run(&["a", "b"], vec![("a", None, 0.0), ("b", Some("a"), 1.0)]),
            run(&["a", "b"], vec![("a", None, 0.0), ("b", Some("a"), 1.0)]),
            run(&["a"], vec![("a", None, 0.0)]),
        ];
        let crit = HashMap::new();
        let paths = extract_critical_paths(&runs, &crit);
        let chain_ab = paths
            .iter()
            .find(|p| p.chain == vec![NodeId::from("a"), NodeId::from("b")])
            .unwrap();
        assert_eq!(chain_ab.frequency, 2);
    }
}
