use chrono::Utc;
use serde_json::Value;

use crate::error::AppError;
use crate::extract::extract;
use crate::models::{BuildSnapshot, JobResultRecord};
use crate::planner::{ScanRange, plan_range};
use crate::server::{RemoteServer, ServerRegistry};
use crate::traits::{RemoteApi, ResultStore, ResultStoreFactory};
use crate::trigger::{Decision, VetoReason, evaluate};
use crate::watch::RemoteJobWatch;

/// What happened to one watch during a cycle.
#[derive(Debug)]
pub enum WatchStatus {
    /// A build satisfied the policy and was persisted.
    Fired { number: u64 },
    /// Every new build was inspected and none qualified.
    NoMatch,
    /// The newest unchecked build is still running.
    Deferred { number: u64 },
    /// The remote job has no builds yet.
    NoBuilds,
    /// Transport or HTTP failure; retried next cycle.
    Failed(AppError),
    /// The remote job itself is gone (404 on the job document).
    JobMissing(AppError),
    /// The watch references an unknown server.
    Misconfigured(AppError),
    /// The remote broke its response contract.
    Malformed(AppError),
}

impl WatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchStatus::Fired { .. } => "fired",
            WatchStatus::NoMatch => "no_match",
            WatchStatus::Deferred { .. } => "deferred",
            WatchStatus::NoBuilds => "no_builds",
            WatchStatus::Failed(_) => "failed",
            WatchStatus::JobMissing(_) => "job_missing",
            WatchStatus::Misconfigured(_) => "misconfigured",
            WatchStatus::Malformed(_) => "malformed",
        }
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            WatchStatus::Failed(e)
            | WatchStatus::JobMissing(e)
            | WatchStatus::Misconfigured(e)
            | WatchStatus::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct WatchReport {
    pub watch_id: String,
    pub uid: String,
    pub job: String,
    pub status: WatchStatus,
}

/// Result of one polling cycle for one owner.
#[derive(Debug)]
pub struct CycleReport {
    pub owner_id: String,
    /// True if at least one watch fired.
    pub changed: bool,
    /// Stale records removed before scanning.
    pub pruned: usize,
    /// One entry per watch, in configuration order.
    pub watches: Vec<WatchReport>,
}

impl CycleReport {
    /// First malformed-response error, if the remote broke its contract.
    pub fn contract_violation(&self) -> Option<&AppError> {
        self.watches.iter().find_map(|w| match &w.status {
            WatchStatus::Malformed(e) => Some(e),
            _ => None,
        })
    }

    pub fn fired(&self) -> impl Iterator<Item = &WatchReport> {
        self.watches
            .iter()
            .filter(|w| matches!(w.status, WatchStatus::Fired { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &WatchReport> {
        self.watches.iter().filter(|w| w.status.error().is_some())
    }
}

/// Events emitted during a cycle for monitoring/logging.
#[derive(Debug, Clone)]
pub enum ScanEvent<'a> {
    CycleStarted {
        owner_id: &'a str,
        watches: usize,
    },
    Pruned {
        owner_id: &'a str,
        removed: usize,
    },
    Planned {
        watch: &'a RemoteJobWatch,
        job_url: &'a str,
        range: ScanRange,
    },
    BuildMissing {
        watch: &'a RemoteJobWatch,
        number: u64,
    },
    BuildVetoed {
        watch: &'a RemoteJobWatch,
        number: u64,
        reason: &'a VetoReason,
    },
    WatchFinished {
        watch: &'a RemoteJobWatch,
        status: &'a WatchStatus,
    },
    CycleFinished {
        owner_id: &'a str,
        changed: bool,
    },
}

/// Trait for receiving scan events (decoupled logging).
pub trait ScanReporter: Send + Sync {
    fn report(&self, event: ScanEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingScanReporter;

impl ScanReporter for TracingScanReporter {
    fn report(&self, event: ScanEvent<'_>) {
        match event {
            ScanEvent::CycleStarted { owner_id, watches } => {
                tracing::info!(%owner_id, %watches, "Scan cycle started");
            }
            ScanEvent::Pruned { owner_id, removed } => {
                tracing::info!(%owner_id, %removed, "Pruned records of removed watches");
            }
            ScanEvent::Planned {
                watch,
                job_url,
                range,
            } => {
                tracing::debug!(
                    uid = %watch.uid,
                    %job_url,
                    from = range.from,
                    floor = range.floor,
                    "Planned scan"
                );
            }
            ScanEvent::BuildMissing { watch, number } => {
                tracing::debug!(uid = %watch.uid, %number, "Build no longer exists remotely");
            }
            ScanEvent::BuildVetoed {
                watch,
                number,
                reason,
            } => {
                tracing::debug!(uid = %watch.uid, %number, %reason, "Build does not qualify");
            }
            ScanEvent::WatchFinished { watch, status } => match status {
                WatchStatus::Fired { number } => {
                    tracing::info!(uid = %watch.uid, job = %watch.job, %number, "Remote build triggered");
                }
                WatchStatus::Deferred { number } => {
                    tracing::info!(uid = %watch.uid, %number, "Remote build still running, deferring");
                }
                WatchStatus::NoMatch | WatchStatus::NoBuilds => {
                    tracing::debug!(uid = %watch.uid, status = status.as_str(), "Nothing to trigger");
                }
                WatchStatus::Failed(error) | WatchStatus::JobMissing(error) => {
                    tracing::warn!(
                        uid = %watch.uid,
                        watch_id = %watch.id(),
                        status = status.as_str(),
                        %error,
                        "Watch skipped for this cycle"
                    );
                }
                WatchStatus::Misconfigured(error) | WatchStatus::Malformed(error) => {
                    tracing::error!(
                        uid = %watch.uid,
                        watch_id = %watch.id(),
                        status = status.as_str(),
                        %error,
                        "Watch cannot be scanned"
                    );
                }
            },
            ScanEvent::CycleFinished { owner_id, changed } => {
                tracing::info!(%owner_id, %changed, "Scan cycle finished");
            }
        }
    }
}

/// Drives polling cycles: plan → fetch → extract → evaluate → persist.
///
/// Generic over the remote API and the store factory, so tests run without
/// real HTTP or disk.
#[derive(Clone)]
pub struct ScanService<A, SF>
where
    A: RemoteApi,
    SF: ResultStoreFactory,
{
    api: A,
    stores: SF,
}

impl<A, SF> ScanService<A, SF>
where
    A: RemoteApi,
    SF: ResultStoreFactory,
{
    pub fn new(api: A, stores: SF) -> Self {
        Self { api, stores }
    }

    pub fn stores(&self) -> &SF {
        &self.stores
    }

    /// Run one cycle for `owner_id`, logging through `tracing`.
    pub async fn run_cycle(
        &self,
        owner_id: &str,
        registry: &ServerRegistry,
        watches: &[RemoteJobWatch],
    ) -> Result<CycleReport, AppError> {
        self.run_cycle_with(owner_id, registry, watches, &TracingScanReporter)
            .await
    }

    /// Run one cycle for `owner_id`.
    ///
    /// Per-watch failures are isolated into the report; only store failures
    /// abort the cycle.
    pub async fn run_cycle_with<R: ScanReporter>(
        &self,
        owner_id: &str,
        registry: &ServerRegistry,
        watches: &[RemoteJobWatch],
        reporter: &R,
    ) -> Result<CycleReport, AppError> {
        reporter.report(ScanEvent::CycleStarted {
            owner_id,
            watches: watches.len(),
        });

        let store = self.stores.open(owner_id)?;

        let ids: Vec<String> = watches.iter().map(RemoteJobWatch::id).collect();
        let pruned = store.prune_missing(&ids).await?;
        if pruned > 0 {
            reporter.report(ScanEvent::Pruned {
                owner_id,
                removed: pruned,
            });
        }

        let mut reports = Vec::with_capacity(watches.len());
        for (watch, watch_id) in watches.iter().zip(ids) {
            let status = self
                .scan_watch(&store, registry, watch, &watch_id, reporter)
                .await?;
            reporter.report(ScanEvent::WatchFinished {
                watch,
                status: &status,
            });
            reports.push(WatchReport {
                watch_id,
                uid: watch.uid.clone(),
                job: watch.job.clone(),
                status,
            });
        }

        let changed = reports
            .iter()
            .any(|w| matches!(w.status, WatchStatus::Fired { .. }));
        reporter.report(ScanEvent::CycleFinished { owner_id, changed });

        Ok(CycleReport {
            owner_id: owner_id.to_string(),
            changed,
            pruned,
            watches: reports,
        })
    }

    async fn scan_watch<S: ResultStore, R: ScanReporter>(
        &self,
        store: &S,
        registry: &ServerRegistry,
        watch: &RemoteJobWatch,
        watch_id: &str,
        reporter: &R,
    ) -> Result<WatchStatus, AppError> {
        let server = match registry.resolve(&watch.server) {
            Ok(server) => server,
            Err(e) => return Ok(WatchStatus::Misconfigured(e)),
        };
        let job_url = server.url_for(&server.api.job_page(&watch.job));

        let last_checked = store
            .get(watch_id)
            .await?
            .map(|r| r.checked_number)
            .unwrap_or(0);

        let job_info = match self
            .api
            .get_json(server, &server.api.job_info(&watch.job))
            .await
        {
            Ok(info) => info,
            Err(e) if e.is_not_found() => return Ok(WatchStatus::JobMissing(e)),
            Err(e) if e.is_contract_violation() => return Ok(WatchStatus::Malformed(e)),
            Err(e) => return Ok(WatchStatus::Failed(e)),
        };

        let remote_last = match self.last_build_number(server, watch, &job_info).await {
            Ok(last) => last,
            Err(e) if e.is_contract_violation() => return Ok(WatchStatus::Malformed(e)),
            Err(e) => return Ok(WatchStatus::Failed(e)),
        };
        let Some(remote_last) = remote_last else {
            return Ok(WatchStatus::NoBuilds);
        };
        let remote_first = job_info.pointer("/firstBuild/number").and_then(Value::as_u64);

        let range = plan_range(last_checked, Some(remote_last), remote_first);
        reporter.report(ScanEvent::Planned {
            watch,
            job_url: &job_url,
            range,
        });

        for number in range.numbers() {
            let path = server.api.build_info(&watch.job, number);
            let raw = match self.api.get_json(server, &path).await {
                Ok(raw) => raw,
                Err(e) if e.is_not_found() => {
                    reporter.report(ScanEvent::BuildMissing { watch, number });
                    continue;
                }
                Err(e) if e.is_contract_violation() => return Ok(WatchStatus::Malformed(e)),
                Err(e) => return Ok(WatchStatus::Failed(e)),
            };
            let snapshot = match extract(&raw, &server.url_for(&path)) {
                Ok(snapshot) => snapshot,
                Err(e) => return Ok(WatchStatus::Malformed(e)),
            };

            match evaluate(watch, &snapshot) {
                Decision::Defer => return Ok(WatchStatus::Deferred { number }),
                Decision::Veto(reason) => {
                    reporter.report(ScanEvent::BuildVetoed {
                        watch,
                        number,
                        reason: &reason,
                    });
                }
                Decision::Fire => {
                    let checked = range.checked_mark();
                    store
                        .upsert(watch_id, |record| {
                            record_fire(record, watch, &job_url, snapshot, checked);
                        })
                        .await?;
                    return Ok(WatchStatus::Fired { number });
                }
            }
        }

        let checked = range.checked_mark();
        if checked > last_checked {
            store
                .upsert(watch_id, |record| {
                    describe(record, watch, &job_url);
                    if record.advance_checked(checked) {
                        record.updated_at = Some(Utc::now());
                    }
                })
                .await?;
        }
        Ok(WatchStatus::NoMatch)
    }

    /// The remote's current last build number, or `None` if it has no builds.
    async fn last_build_number(
        &self,
        server: &RemoteServer,
        watch: &RemoteJobWatch,
        job_info: &Value,
    ) -> Result<Option<u64>, AppError> {
        let path = server.api.last_build_number(&watch.job);
        match self.api.get_text(server, &path).await {
            Ok(text) => {
                let number =
                    text.trim()
                        .parse::<u64>()
                        .map_err(|_| AppError::Transport {
                            url: server.url_for(&path),
                            message: format!("Unexpected body '{}'", text.trim()),
                        })?;
                Ok(Some(number))
            }
            Err(e) if e.is_not_found() => Ok(last_build_from_job_info(job_info)),
            Err(e) => Err(e),
        }
    }
}

/// Fallback when the plain-text endpoint is unavailable.
fn last_build_from_job_info(job_info: &Value) -> Option<u64> {
    job_info
        .pointer("/lastBuild/number")
        .and_then(Value::as_u64)
        .or_else(|| {
            job_info
                .get("nextBuildNumber")
                .and_then(Value::as_u64)
                .map(|next| next.saturating_sub(1))
        })
        .filter(|n| *n > 0)
}

fn describe(record: &mut JobResultRecord, watch: &RemoteJobWatch, job_url: &str) {
    record.server = watch.server.clone();
    record.job_url = job_url.to_string();
    record.uid = watch.uid.clone();
}

/// Apply a fire in order: snapshot, published result, triggered, checked.
fn record_fire(
    record: &mut JobResultRecord,
    watch: &RemoteJobWatch,
    job_url: &str,
    snapshot: BuildSnapshot,
    checked: u64,
) {
    describe(record, watch, job_url);
    let number = snapshot.number;
    record.published_result = snapshot.published_result.clone();
    record.build = Some(snapshot);
    record.advance_triggered(number);
    record.advance_checked(checked);
    record.updated_at = Some(Utc::now());
}
