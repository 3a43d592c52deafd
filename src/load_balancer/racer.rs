//! First-K racing over concurrently running operations.
//!
//! # Responsibilities
//! - Drive N fallible operations concurrently, optionally under a ceiling
//! - Resolve as soon as K have succeeded, or once all have settled
//! - Report each success with the latency measured from its own start
//!
//! # Design Decisions
//! - Fan-in through `FuturesUnordered`; completion order drives collection
//! - Failures are absorbed and only count toward "all settled"
//! - Stragglers are cancelled by dropping the set once K is reached
//! - The ceiling is a per-race semaphore: an operation's clock starts only
//!   after it holds a permit, so queueing does not inflate its latency

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

/// A successful operation and how long it ran.
#[derive(Debug, Clone, PartialEq)]
pub struct Raced<T> {
    pub value: T,
    pub latency: Duration,
}

/// Run `operations`, returning up to `k` successes sorted by ascending latency.
///
/// `concurrency` bounds how many operations run at once; `None` runs all.
pub async fn first_k<I, F, T, E>(operations: I, k: usize, concurrency: Option<usize>) -> Vec<Raced<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    if k == 0 {
        return Vec::new();
    }

    let limiter = concurrency.map(|n| Arc::new(Semaphore::new(n.max(1))));
    let mut pending: FuturesUnordered<_> = operations
        .into_iter()
        .map(|op| {
            let limiter = limiter.clone();
            async move {
                // held until this operation settles
                let _permit = match &limiter {
                    Some(sem) => sem.clone().acquire_owned().await.ok(),
                    None => None,
                };
                let start = Instant::now();
                let result = op.await;
                (result, start.elapsed())
            }
        })
        .collect();

    let total = pending.len();
    let mut fulfilled = Vec::with_capacity(k.min(total));
    let mut settled = 0;

    while let Some((result, latency)) = pending.next().await {
        settled += 1;
        if let Ok(value) = result {
            fulfilled.push(Raced { value, latency });
            if fulfilled.len() == k {
                tracing::trace!(k, settled, total, "First-k reached, dropping stragglers");
                break;
            }
        }
    }

    fulfilled.sort_by_key(|r| r.latency);
    fulfilled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Op = Pin<Box<dyn Future<Output = Result<&'static str, &'static str>> + Send>>;

    fn delayed(value: &'static str, ms: u64, fail: bool) -> Op {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            if fail {
                Err(value)
            } else {
                Ok(value)
            }
        })
    }

    fn values(out: &[Raced<&'static str>]) -> Vec<&'static str> {
        out.iter().map(|r| r.value).collect()
    }

    #[tokio::test]
    async fn zero_k_resolves_empty() {
        let out = first_k(vec![delayed("a", 10, false)], 0, None).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn empty_input_resolves_empty() {
        let out = first_k(Vec::<Op>::new(), 3, None).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn resolves_after_k_without_waiting_for_rest() {
        let ops = vec![
            delayed("slow", 2_000, false),
            delayed("b", 60, false),
            delayed("a", 20, false),
        ];
        let start = Instant::now();
        let out = first_k(ops, 2, None).await;
        assert_eq!(values(&out), vec!["a", "b"]);
        assert!(start.elapsed() < Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn failures_are_absorbed() {
        let ops = vec![
            delayed("x", 10, true),
            delayed("b", 40, false),
            delayed("y", 20, true),
            delayed("a", 30, false),
        ];
        let out = first_k(ops, 4, None).await;
        assert_eq!(values(&out), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn all_failures_give_empty() {
        let ops = vec![delayed("x", 5, true), delayed("y", 5, true)];
        let out = first_k(ops, 2, None).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn output_sorted_by_latency() {
        let ops = vec![
            delayed("c", 90, false),
            delayed("a", 10, false),
            delayed("b", 50, false),
        ];
        let out = first_k(ops, 3, None).await;
        assert_eq!(values(&out), vec!["a", "b", "c"]);
        assert!(out.windows(2).all(|w| w[0].latency <= w[1].latency));
    }

    #[tokio::test]
    async fn concurrency_ceiling_is_respected() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let ops: Vec<_> = (0..6)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ()>(i)
                }
            })
            .collect();

        let out = first_k(ops, 6, Some(2)).await;
        assert_eq!(out.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
