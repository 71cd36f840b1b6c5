use crate::{
    relay::{Occurrence, PublishError},
    Event, Filter, Relay, SubscriptionOptions,
};
use dashmap::DashSet;
use std::{fmt, sync::Arc, time::Duration};
use tokio::{sync::mpsc, time::Instant};
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum PoolError {
    #[error("relays didn't answer within {0:?}")]
    Timeout(Duration),

    #[error("no relay could be reached")]
    Unavailable,

    #[error("no relay accepted the event: {0}")]
    PublishFailed(PublishReport),
}

/// how [`Pool::query`] treats relays that haven't finished when the deadline hits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryPolicy {
    /// every relay must reach EOSE or fail before the deadline, otherwise the whole query times out
    #[default]
    AllOrTimeout,
    /// whatever arrived before the deadline is the result
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// applies to each relay separately, connection included
    pub publish_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_secs(10),
        }
    }
}

/// runs queries and publishes against a set of relays in parallel.
///
/// every call opens its own connections and releases them before returning,
/// so a pool holds no state besides its options and can be shared freely.
#[derive(Debug, Clone, Default)]
pub struct Pool {
    options: PoolOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    Accepted,
    Rejected(String),
    Unreachable(String),
}

#[derive(Debug, Clone)]
pub struct PublishResult {
    pub relay_url: Url,
    pub status: PublishStatus,
}

/// per-relay outcome of a publish
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub results: Vec<PublishResult>,
}

impl PublishReport {
    pub fn accepted(&self) -> usize {
        self.count(|s| matches!(s, PublishStatus::Accepted))
    }

    pub fn rejected(&self) -> usize {
        self.count(|s| matches!(s, PublishStatus::Rejected(_)))
    }

    pub fn unreachable(&self) -> usize {
        self.count(|s| matches!(s, PublishStatus::Unreachable(_)))
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    fn count(&self, pred: impl Fn(&PublishStatus) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.status)).count()
    }
}

impl fmt::Display for PublishReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted by {}/{} relays ({} rejected, {} unreachable)",
            self.accepted(),
            self.total(),
            self.rejected(),
            self.unreachable()
        )
    }
}

enum EndpointOutcome {
    Event(Event),
    Settled,
    Failed(Url, String),
}

impl Pool {
    pub fn new(options: PoolOptions) -> Self {
        Self { options }
    }

    /// subscribe to every relay, stop on EOSE, return the deduplicated union sorted newest-first
    pub async fn query(
        &self,
        urls: &[Url],
        filter: Filter,
        policy: QueryPolicy,
        timeout: Duration,
    ) -> Result<Vec<Event>, PoolError> {
        if urls.is_empty() {
            return Err(PoolError::Unavailable);
        }

        let deadline = Instant::now() + timeout;
        let (tx, mut rx) = mpsc::channel(256);
        let skip_ids = Arc::new(DashSet::new());

        let handles: Vec<_> = urls
            .iter()
            .map(|url| {
                let opts = SubscriptionOptions {
                    label: Some("q".to_string()),
                    skip_ids: Some(skip_ids.clone()),
                };
                tokio::spawn(query_endpoint(url.clone(), filter.clone(), opts, tx.clone()))
            })
            .collect();
        drop(tx);

        let mut events = Vec::with_capacity(filter.limit.unwrap_or(50).min(500));
        let mut settled = 0;
        let mut failed = 0;
        let mut timed_out = false;
        while settled + failed < urls.len() {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(EndpointOutcome::Event(event))) => events.push(event),
                Ok(Some(EndpointOutcome::Settled)) => settled += 1,
                Ok(Some(EndpointOutcome::Failed(url, reason))) => {
                    log::info!("[{}] query failed: {}", url, reason);
                    failed += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        // drop whatever is still pending, this closes their connections
        for handle in handles {
            handle.abort();
        }

        if timed_out {
            log::debug!(
                "query timed out after {:?} with {}/{} relays done and {} events",
                timeout,
                settled + failed,
                urls.len(),
                events.len()
            );
            match policy {
                QueryPolicy::AllOrTimeout => return Err(PoolError::Timeout(timeout)),
                QueryPolicy::BestEffort if settled == 0 && events.is_empty() => {
                    return Err(PoolError::Timeout(timeout))
                }
                QueryPolicy::BestEffort => {}
            }
        } else if settled == 0 {
            return Err(PoolError::Unavailable);
        }

        glidesort::sort_by_key(&mut events, |event| (u32::MAX - event.created_at.0, event.id));
        Ok(events)
    }

    /// publish an event to multiple relays, results arrive as each relay answers
    pub fn publish_many(
        &self,
        urls: &[Url],
        event: Event,
    ) -> mpsc::UnboundedReceiver<PublishResult> {
        let (tx, rx) = mpsc::unbounded_channel();

        for url in urls {
            let tx = tx.clone();
            let event = event.clone();
            let url = url.clone();
            let publish_timeout = self.options.publish_timeout;

            tokio::spawn(async move {
                let status = match tokio::time::timeout(
                    publish_timeout,
                    publish_endpoint(url.clone(), event),
                )
                .await
                {
                    Ok(status) => status,
                    Err(_) => PublishStatus::Unreachable(format!(
                        "no answer within {:?}",
                        publish_timeout
                    )),
                };

                let _ = tx.send(PublishResult {
                    relay_url: url,
                    status,
                });
            });
        }

        rx
    }

    /// publish to every relay and wait for all of them, succeeds if at least one accepted
    pub async fn publish(&self, urls: &[Url], event: Event) -> Result<PublishReport, PoolError> {
        let event_id = event.id;
        let mut results = self.publish_many(urls, event);

        let mut report = PublishReport {
            results: Vec::with_capacity(urls.len()),
        };
        while let Some(result) = results.recv().await {
            match &result.status {
                PublishStatus::Accepted => log::debug!("[{}] accepted {}", result.relay_url, event_id),
                PublishStatus::Rejected(reason) | PublishStatus::Unreachable(reason) => {
                    log::info!("[{}] didn't take {}: {}", result.relay_url, event_id, reason)
                }
            }
            report.results.push(result);
        }

        log::info!("event {} {}", event_id, report);

        if report.accepted() == 0 {
            return Err(PoolError::PublishFailed(report));
        }
        Ok(report)
    }
}

async fn query_endpoint(
    url: Url,
    filter: Filter,
    opts: SubscriptionOptions,
    tx: mpsc::Sender<EndpointOutcome>,
) {
    let relay = match Relay::connect(url.clone()).await {
        Ok(relay) => relay,
        Err(err) => {
            let _ = tx.send(EndpointOutcome::Failed(url, err.to_string())).await;
            return;
        }
    };

    let mut sub = relay.subscribe(filter, opts).await;
    while let Some(occ) = sub.recv().await {
        match occ {
            Occurrence::Event(event) => {
                if tx.send(EndpointOutcome::Event(event)).await.is_err() {
                    // aggregator is gone
                    return;
                }
            }
            Occurrence::EOSE => {
                let _ = tx.send(EndpointOutcome::Settled).await;
                drop(sub);
                relay.close().await;
                return;
            }
            Occurrence::Close(reason) => {
                let _ = tx
                    .send(EndpointOutcome::Failed(url, reason.to_string()))
                    .await;
                return;
            }
        }
    }
}

async fn publish_endpoint(url: Url, event: Event) -> PublishStatus {
    let relay = match Relay::connect(url).await {
        Ok(relay) => relay,
        Err(err) => return PublishStatus::Unreachable(err.to_string()),
    };

    let status = match relay.publish(event).await {
        Ok(()) => PublishStatus::Accepted,
        Err(PublishError::NotOK(reason)) => {
            PublishStatus::Rejected(crate::normalize_ok_message(&reason, "error"))
        }
        Err(err @ PublishError::Channel) => PublishStatus::Unreachable(err.to_string()),
    };
    relay.close().await;
    status
}
