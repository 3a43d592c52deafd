//! Probe-and-select: one healthy node per inbound request.

use crate::error::{BalancerError, BalancerResult};
use crate::health::prober::{HealthRecord, NodeProber};
use crate::load_balancer::node::NodePool;
use crate::load_balancer::racer::first_k;
use crate::load_balancer::strategy::Strategy;

/// Winner plus every candidate that survived probing, fastest first.
#[derive(Debug, Clone)]
pub struct Selection {
    pub selected: HealthRecord,
    pub candidates: Vec<HealthRecord>,
}

/// Probe every node in random order, at most `concurrency` at a time, then
/// apply `strategy` to the survivors.
pub async fn probe_and_select(
    pool: &NodePool,
    prober: &NodeProber,
    strategy: Strategy,
    concurrency: usize,
) -> BalancerResult<Selection> {
    let order = pool.shuffled();
    let probes = order.iter().map(|node| prober.probe(node));

    let candidates: Vec<HealthRecord> = first_k(probes, pool.len(), Some(concurrency))
        .await
        .into_iter()
        .map(|raced| HealthRecord {
            latency: raced.latency,
            ..raced.value
        })
        .collect();

    tracing::debug!(
        strategy = %strategy,
        candidates = candidates.len(),
        pool = pool.len(),
        high_water = prober.staleness().current(),
        "Probing finished"
    );

    let selected = strategy
        .select(&candidates)
        .cloned()
        .ok_or(BalancerError::NoHealthyNode)?;

    Ok(Selection {
        selected,
        candidates,
    })
}
