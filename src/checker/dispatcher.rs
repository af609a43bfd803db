use log::{error, info};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{self, JoinHandle};

use crate::checker::candidate::AliveRecord;
use crate::checker::evaluator::{Classification, Evaluator};
use crate::checker::CheckError;
use crate::probe::Probe;

/// Outcome of one full pass over the candidate list.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// In completion order
    pub alive: Vec<AliveRecord>,
    pub dead: usize,
    pub invalid: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.alive.len() + self.dead + self.invalid + self.failed
    }
}

/// Fixed-size worker pool: every line becomes a task up front, at most
/// `workers` of them evaluate at once.
pub struct Dispatcher<P> {
    evaluator: Arc<Evaluator<P>>,
    workers: usize,
}

impl<P: Probe + 'static> Dispatcher<P> {
    pub fn new(probe: P, workers: usize) -> Self {
        Dispatcher {
            evaluator: Arc::new(Evaluator::new(probe)),
            workers,
        }
    }

    pub async fn run(&self, lines: Vec<String>) -> DispatchReport {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let alive: Arc<Mutex<Vec<AliveRecord>>> = Arc::new(Mutex::new(Vec::new()));

        info!(
            "Checking {} candidates with {} workers",
            lines.len(),
            self.workers
        );

        let handles: Vec<(String, JoinHandle<Result<bool, CheckError>>)> = lines
            .into_iter()
            .map(|line| {
                let semaphore = semaphore.clone();
                let evaluator = self.evaluator.clone();
                let alive = alive.clone();
                let task_line = line.clone();
                let handle = task::spawn(async move {
                    // the semaphore is never closed, so acquiring only waits
                    let _permit = semaphore.acquire_owned().await.ok();
                    match evaluator.evaluate(&task_line).await? {
                        Classification::Alive(record) => {
                            alive.lock().await.push(record);
                            Ok(true)
                        }
                        Classification::Dead(_) => Ok(false),
                    }
                });
                (line, handle)
            })
            .collect();

        let mut report = DispatchReport::default();
        for (line, handle) in handles {
            match handle.await {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => report.dead += 1,
                Ok(Err(CheckError::InvalidFormat(_))) => report.invalid += 1,
                Err(e) => {
                    error!("Error while processing proxy {}: {}", line.trim(), e);
                    report.failed += 1;
                }
            }
        }

        report.alive = std::mem::take(&mut *alive.lock().await);
        info!(
            "Checked {} candidates: {} alive, {} dead, {} invalid, {} failed",
            report.total(),
            report.alive.len(),
            report.dead,
            report.invalid,
            report.failed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::evaluator::tests::{Fixture, MockProbe};
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_malformed_lines_do_not_affect_others() {
        let probe = MockProbe::new(Fixture::Identity("198.51.100.1", "Home"))
            .with_proxy("1.1.1.1", Fixture::Identity("104.16.0.1", "Cloudflare"))
            .with_proxy("8.8.8.8", Fixture::Identity("8.8.8.8", "Google LLC"));
        let dispatcher = Dispatcher::new(probe, 4);

        let report = dispatcher
            .run(lines(&[
                "1.2.3.4,80",
                "1.1.1.1,443,US,Cloudflare",
                "not a proxy line",
                "8.8.8.8,443,US,Google",
                "9.9.9.9,53,US,Quad9",
            ]))
            .await;

        assert_eq!(report.invalid, 2);
        assert_eq!(report.dead, 1);
        assert_eq!(report.failed, 0);
        let mut rendered: Vec<String> = report.alive.iter().map(|r| r.to_string()).collect();
        rendered.sort();
        assert_eq!(
            rendered,
            vec!["1.1.1.1,443,US,Cloudflare", "8.8.8.8,443,US,Google LLC"]
        );
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_record() {
        const N: usize = 200;
        let mut probe = MockProbe::new(Fixture::Identity("198.51.100.1", "Home"))
            .with_delay(Duration::from_millis(5));
        let addresses: Vec<String> = (0..N).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();
        for address in &addresses {
            probe = probe.with_proxy(address, Fixture::Identity("203.0.113.9", "Exit"));
        }

        let dispatcher = Dispatcher::new(probe, 40);
        let input = addresses
            .iter()
            .map(|a| format!("{},443,US,Exit", a))
            .collect();
        let report = dispatcher.run(input).await;

        assert_eq!(report.alive.len(), N);
        let unique: HashSet<&str> = report.alive.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(unique.len(), N);
        for address in &addresses {
            assert!(unique.contains(address.as_str()));
        }
    }

    #[tokio::test]
    async fn test_worker_limit_is_respected() {
        let probe = Arc::new(
            MockProbe::new(Fixture::Identity("198.51.100.1", "Home"))
                .with_delay(Duration::from_millis(20)),
        );
        let dispatcher = Dispatcher::new(probe.clone(), 3);
        let input = (0..20).map(|i| format!("10.1.0.{},443,US,X", i)).collect();

        let report = dispatcher.run(input).await;
        assert_eq!(report.dead, 20);

        // two probes per evaluation run side by side
        let peak = probe.peak.load(Ordering::SeqCst);
        assert!(peak <= 3 * 2, "peak in-flight probes was {}", peak);
        assert!(peak >= 2);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let dispatcher = Dispatcher::new(MockProbe::new(Fixture::Empty), 40);
        let report = dispatcher.run(Vec::new()).await;
        assert!(report.alive.is_empty());
        assert_eq!(report.total(), 0);
    }
}
