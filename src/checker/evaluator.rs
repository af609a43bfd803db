use log::{debug, info, warn};
use std::fmt;

use crate::checker::candidate::{AliveRecord, ProxyCandidate};
use crate::checker::CheckError;
use crate::probe::{Probe, ProbeError, ProbeResult};

/// Why a candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadReason {
    BaselineFailed(String),
    ProxyFailed(String),
    SameIdentity,
}

impl fmt::Display for DeadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadReason::BaselineFailed(e) => write!(f, "baseline probe failed: {}", e),
            DeadReason::ProxyFailed(e) => write!(f, "proxied probe failed: {}", e),
            DeadReason::SameIdentity => write!(f, "same client identity"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Alive(AliveRecord),
    Dead(DeadReason),
}

fn usable(outcome: &Result<ProbeResult, ProbeError>) -> Result<&ProbeResult, String> {
    match outcome {
        Ok(result) if result.is_empty() => Err("empty response".to_string()),
        Ok(result) => Ok(result),
        Err(e) => Err(e.to_string()),
    }
}

/// Alive iff both probes produced a non-empty result and the client
/// identities differ. Anything else is dead.
pub fn classify(
    candidate: &ProxyCandidate,
    baseline: &Result<ProbeResult, ProbeError>,
    proxied: &Result<ProbeResult, ProbeError>,
) -> Classification {
    let baseline = match usable(baseline) {
        Ok(result) => result,
        Err(e) => return Classification::Dead(DeadReason::BaselineFailed(e)),
    };
    let proxied = match usable(proxied) {
        Ok(result) => result,
        Err(e) => return Classification::Dead(DeadReason::ProxyFailed(e)),
    };

    if baseline.client_ip() == proxied.client_ip() {
        return Classification::Dead(DeadReason::SameIdentity);
    }

    Classification::Alive(AliveRecord::new(candidate, proxied.organization()))
}

/// Runs the baseline/proxied probe pair for one input line.
pub struct Evaluator<P> {
    probe: P,
}

impl<P: Probe> Evaluator<P> {
    pub fn new(probe: P) -> Self {
        Evaluator { probe }
    }

    pub async fn evaluate(&self, line: &str) -> Result<Classification, CheckError> {
        let candidate = match ProxyCandidate::parse(line) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(
                    "Invalid proxy line format: {}. Expected ip,port,country,org",
                    line.trim()
                );
                return Err(e);
            }
        };

        let endpoint = candidate.endpoint();
        let (baseline, proxied) =
            tokio::join!(self.probe.probe(None), self.probe.probe(Some(&endpoint)));

        let classification = classify(&candidate, &baseline, &proxied);
        match &classification {
            Classification::Alive(record) => {
                info!("CF PROXY LIVE!: {}", record);
                if let Ok(result) = &proxied {
                    debug!("{} exit: {}", endpoint, result);
                }
            }
            Classification::Dead(reason) => {
                info!("CF PROXY DEAD!: {} ({})", endpoint, reason);
            }
        }
        Ok(classification)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::net::conn::ConnError;
    use crate::probe::ProxyEndpoint;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Canned probe answers.
    #[derive(Debug, Clone)]
    pub enum Fixture {
        Identity(&'static str, &'static str),
        Empty,
        Timeout,
        BadJson,
    }

    impl Fixture {
        pub fn outcome(&self) -> Result<ProbeResult, ProbeError> {
            match self {
                Fixture::Identity(ip, org) => {
                    let value = json!({"clientIp": ip, "asOrganization": org, "country": "US"});
                    Ok(ProbeResult::from_body(&value.to_string()).unwrap())
                }
                Fixture::Empty => Ok(ProbeResult::default()),
                Fixture::Timeout => Err(ProbeError::Connection(ConnError::ConnectionTimeout)),
                Fixture::BadJson => Err(ProbeError::UnexpectedJson("array")),
            }
        }
    }

    /// Baseline answers with `baseline`; proxied probes answer by address,
    /// defaulting to the baseline fixture.
    pub struct MockProbe {
        pub baseline: Fixture,
        pub proxies: HashMap<String, Fixture>,
        pub delay: Duration,
        pub in_flight: AtomicUsize,
        pub peak: AtomicUsize,
        pub calls: AtomicUsize,
    }

    impl MockProbe {
        pub fn new(baseline: Fixture) -> Self {
            MockProbe {
                baseline,
                proxies: HashMap::new(),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_proxy(mut self, address: &str, fixture: Fixture) -> Self {
            self.proxies.insert(address.to_string(), fixture);
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Probe for MockProbe {
        async fn probe(&self, proxy: Option<&ProxyEndpoint>) -> Result<ProbeResult, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let fixture = match proxy {
                None => &self.baseline,
                Some(endpoint) => self.proxies.get(&endpoint.address).unwrap_or(&self.baseline),
            };
            fixture.outcome()
        }
    }

    fn candidate() -> ProxyCandidate {
        ProxyCandidate::parse("1.1.1.1,443,US,Cloudflare").unwrap()
    }

    #[test]
    fn test_classify_table() {
        let home = Fixture::Identity("198.51.100.1", "Home ISP");
        let exit = Fixture::Identity("104.16.0.1", "Cloudflare, Inc.");
        let c = candidate();

        let alive = classify(&c, &home.outcome(), &exit.outcome());
        assert_eq!(
            alive,
            Classification::Alive(AliveRecord {
                address: "1.1.1.1".into(),
                port: 443,
                country_label: "US".into(),
                organization: "Cloudflare Inc".into(),
            })
        );

        assert_eq!(
            classify(&c, &home.outcome(), &home.outcome()),
            Classification::Dead(DeadReason::SameIdentity)
        );
        assert!(matches!(
            classify(&c, &home.outcome(), &Fixture::Empty.outcome()),
            Classification::Dead(DeadReason::ProxyFailed(_))
        ));
        assert!(matches!(
            classify(&c, &Fixture::Empty.outcome(), &exit.outcome()),
            Classification::Dead(DeadReason::BaselineFailed(_))
        ));
        assert!(matches!(
            classify(&c, &Fixture::Empty.outcome(), &Fixture::Empty.outcome()),
            Classification::Dead(_)
        ));
        assert!(matches!(
            classify(&c, &home.outcome(), &Fixture::Timeout.outcome()),
            Classification::Dead(DeadReason::ProxyFailed(_))
        ));
        assert!(matches!(
            classify(&c, &Fixture::BadJson.outcome(), &exit.outcome()),
            Classification::Dead(DeadReason::BaselineFailed(_))
        ));
    }

    #[test]
    fn test_classify_missing_identity_on_both_sides_is_dead() {
        let c = candidate();
        let a = ProbeResult::from_body(r#"{"colo":"AMS"}"#);
        let b = ProbeResult::from_body(r#"{"colo":"FRA"}"#);
        assert_eq!(
            classify(&c, &a, &b),
            Classification::Dead(DeadReason::SameIdentity)
        );
    }

    #[tokio::test]
    async fn test_evaluate_alive_and_dead() {
        let probe = MockProbe::new(Fixture::Identity("198.51.100.1", "Home"))
            .with_proxy("1.1.1.1", Fixture::Identity("104.16.0.1", "Cloudflare!"));
        let evaluator = Evaluator::new(probe);

        let alive = evaluator.evaluate("1.1.1.1,443,US,Cloudflare").await.unwrap();
        assert!(matches!(alive, Classification::Alive(_)));

        let dead = evaluator.evaluate("9.9.9.9,53,US,Quad9").await.unwrap();
        assert_eq!(dead, Classification::Dead(DeadReason::SameIdentity));
        assert_eq!(evaluator.probe.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_evaluate_invalid_line_skips_probing() {
        let evaluator = Evaluator::new(MockProbe::new(Fixture::Empty));
        let err = evaluator.evaluate("1.2.3.4,80").await.unwrap_err();
        assert!(matches!(err, CheckError::InvalidFormat(_)));
        assert_eq!(evaluator.probe.calls.load(Ordering::SeqCst), 0);
    }
}
