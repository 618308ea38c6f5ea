// ── Engine facade ──
//
// Owns the policy source, the versioned DataStore and the cached policy
// graph. Queries run against an immutable `Arc<PolicyGraph>` snapshot
// swapped in lock-free; a store write bumps the store version, and the
// next query rebuilds. An invalidation (upstream mutation) marks the
// source stale so the next query re-reads it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fwgraph_api::ApiClient;
use fwgraph_api::types::{RuleCreateUpdate, SegmentCreateUpdate};

use crate::command::import::parse_segment_csv;
use crate::command::{Command, CommandResult, ImportReport};
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::graph::PolicyGraph;
use crate::graph::deadline::Deadline;
use crate::graph::impact::{ImpactLimits, ImpactReport, SegmentRef, analyze_impact};
use crate::graph::path::{PathQuery, PathResult, find_path};
use crate::model::{Firewall, Rule, RuleId, Segment, SegmentId};
use crate::search::{SearchKind, SearchResults, search};
use crate::source::PolicySource;
use crate::store::DataStore;
use crate::store::mutate::{validate_rule_fields, validate_segment_fields};
use crate::topology::{TopologyFilter, TopologyView};

// ── Engine ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Nothing is read from the
/// source until the first query (or an explicit [`refresh`](Self::refresh)).
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    source: PolicySource,
    store: Arc<DataStore>,
    graph: ArcSwapOption<PolicyGraph>,
    /// Bumped by `invalidate()`. The source is stale while this is
    /// ahead of `loaded_generation`.
    invalidations: AtomicU64,
    loaded_generation: AtomicU64,
    /// Serializes source reads so concurrent stale queries load once.
    refresh_lock: Mutex<()>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(source: PolicySource, config: EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                source,
                store: Arc::new(DataStore::new()),
                graph: ArcSwapOption::empty(),
                invalidations: AtomicU64::new(1),
                loaded_generation: AtomicU64::new(0),
                refresh_lock: Mutex::new(()),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// One-shot: build, load, run closure, shut down.
    pub async fn oneshot<F, Fut, T>(
        source: PolicySource,
        config: EngineConfig,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Engine) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let engine = Engine::new(source, config);
        engine.refresh().await?;
        let result = f(engine.clone()).await;
        engine.shutdown().await;
        result
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn source(&self) -> &PolicySource {
        &self.inner.source
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.inner.store
    }

    // ── Loading & invalidation ───────────────────────────────────

    /// Whether the next query will re-read the source.
    pub fn is_stale(&self) -> bool {
        self.inner.invalidations.load(Ordering::Acquire)
            > self.inner.loaded_generation.load(Ordering::Acquire)
    }

    /// Mark the source stale. Cheap; the reload happens on the next query.
    pub fn invalidate(&self) {
        let generation = self.inner.invalidations.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "policy data invalidated");
    }

    /// Read the source into the store, retrying transient failures with
    /// exponential backoff. Exhausting the retries is `StoreUnavailable`.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<(), CoreError> {
        let generation = self.inner.invalidations.load(Ordering::Acquire);
        let policy = &self.inner.config.retry;
        let attempts = policy.attempts.max(1);

        let mut attempt = 0;
        let snapshot = loop {
            attempt += 1;
            match self.inner.source.load().await {
                Ok(snapshot) => break snapshot,
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = policy.backoff_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "policy source read failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = self.inner.cancel.cancelled() => {
                            return Err(CoreError::StoreUnavailable {
                                attempts: attempt,
                                message: "engine shut down while retrying".into(),
                            });
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) if e.is_transient() => {
                    return Err(CoreError::StoreUnavailable {
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        };

        let (segments, rules) = (snapshot.segments.len(), snapshot.rules.len());
        self.inner.store.apply_snapshot(snapshot);
        self.inner
            .loaded_generation
            .fetch_max(generation, Ordering::AcqRel);

        info!(
            source = %self.inner.source,
            segments,
            rules,
            attempts = attempt,
            "policy data loaded"
        );
        Ok(())
    }

    async fn ensure_fresh(&self) -> Result<(), CoreError> {
        if !self.is_stale() {
            return Ok(());
        }
        let _guard = self.inner.refresh_lock.lock().await;
        // Another caller may have loaded while we waited.
        if self.is_stale() {
            self.refresh_locked().await?;
        }
        Ok(())
    }

    /// Invalidate whenever `signal` changes, until shutdown or until the
    /// sender is dropped.
    pub async fn watch_invalidations<T>(&self, mut signal: watch::Receiver<T>)
    where
        T: Send + Sync + 'static,
    {
        let engine = self.clone();
        let cancel = self.inner.cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    changed = signal.changed() => {
                        if changed.is_err() {
                            debug!("invalidation signal closed");
                            break;
                        }
                        engine.invalidate();
                    }
                }
            }
        });

        self.inner.task_handles.lock().await.push(handle);
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("engine shut down");
    }

    // ── Graph cache ──────────────────────────────────────────────

    /// The graph for the store's current version, rebuilding if needed.
    pub async fn graph(&self) -> Result<Arc<PolicyGraph>, CoreError> {
        self.ensure_fresh().await?;

        let version = self.inner.store.version();
        if let Some(graph) = self.inner.graph.load_full() {
            if graph.version() == version {
                return Ok(graph);
            }
        }

        let graph = Arc::new(PolicyGraph::from_store(&self.inner.store));
        debug!(
            version = graph.version(),
            segments = graph.segment_count(),
            edges = graph.edge_count(),
            "policy graph rebuilt"
        );
        self.inner.graph.store(Some(Arc::clone(&graph)));
        Ok(graph)
    }

    /// The cached graph without touching the source, if one exists.
    pub fn cached_graph(&self) -> Option<Arc<PolicyGraph>> {
        self.inner.graph.load_full()
    }

    // ── Queries ──────────────────────────────────────────────────

    pub async fn find_path(&self, query: PathQuery) -> Result<PathResult, CoreError> {
        let graph = self.graph().await?;
        let deadline = Deadline::from_timeout(self.inner.config.query_timeout);
        run_blocking(move || find_path(&graph, &query, &deadline)).await
    }

    pub async fn analyze_impact(&self, rule_id: RuleId) -> Result<ImpactReport, CoreError> {
        let graph = self.graph().await?;

        if graph.rule(rule_id).is_none() {
            let rule = self
                .inner
                .store
                .rule_by_id(rule_id)
                .ok_or_else(|| CoreError::not_found("rule", rule_id))?;
            let reason = graph
                .warnings()
                .iter()
                .find(|w| w.rule_id() == rule_id)
                .map_or_else(|| "excluded from the graph".to_owned(), ToString::to_string);
            return Ok(ImpactReport::for_unused_rule(
                &rule,
                self.segment_ref(rule.source_segment_id),
                self.segment_ref(rule.destination_segment_id),
                &reason,
            ));
        }

        let limits = ImpactLimits {
            max_segments: self.inner.config.max_impact_segments,
        };
        let deadline = Deadline::from_timeout(self.inner.config.query_timeout);
        run_blocking(move || analyze_impact(&graph, rule_id, limits, &deadline)).await
    }

    fn segment_ref(&self, id: SegmentId) -> SegmentRef {
        SegmentRef {
            id,
            name: self
                .inner
                .store
                .segment_by_id(id)
                .map_or_else(|| format!("segment {id}"), |s| s.name.clone()),
        }
    }

    pub async fn topology(&self, filter: &TopologyFilter) -> Result<TopologyView, CoreError> {
        self.ensure_fresh().await?;
        let store = &self.inner.store;
        Ok(TopologyView::build(
            &store.segments_snapshot(),
            &store.rules_snapshot(),
            filter,
        ))
    }

    pub async fn search(&self, query: &str, kind: SearchKind) -> Result<SearchResults, CoreError> {
        self.ensure_fresh().await?;
        let store = &self.inner.store;
        Ok(search(
            &store.segments_snapshot(),
            &store.rules_snapshot(),
            query,
            kind,
        ))
    }

    // ── Snapshot accessors ───────────────────────────────────────

    pub async fn segments(&self) -> Result<Arc<Vec<Arc<Segment>>>, CoreError> {
        self.ensure_fresh().await?;
        Ok(self.inner.store.segments_snapshot())
    }

    pub async fn rules(&self) -> Result<Arc<Vec<Arc<Rule>>>, CoreError> {
        self.ensure_fresh().await?;
        Ok(self.inner.store.rules_snapshot())
    }

    pub async fn firewalls(&self) -> Result<Arc<Vec<Arc<Firewall>>>, CoreError> {
        self.ensure_fresh().await?;
        Ok(self.inner.store.firewalls_snapshot())
    }

    pub async fn segment(&self, id: SegmentId) -> Result<Arc<Segment>, CoreError> {
        self.ensure_fresh().await?;
        self.inner
            .store
            .segment_by_id(id)
            .ok_or_else(|| CoreError::not_found("segment", id))
    }

    pub async fn rule(&self, id: RuleId) -> Result<Arc<Rule>, CoreError> {
        self.ensure_fresh().await?;
        self.inner
            .store
            .rule_by_id(id)
            .ok_or_else(|| CoreError::not_found("rule", id))
    }

    /// Segment by id, or by case-insensitive name.
    pub async fn resolve_segment(&self, key: &str) -> Result<Arc<Segment>, CoreError> {
        self.ensure_fresh().await?;
        let store = &self.inner.store;
        key.parse::<SegmentId>()
            .ok()
            .and_then(|id| store.segment_by_id(id))
            .or_else(|| store.segment_by_name(key))
            .ok_or_else(|| CoreError::not_found("segment", key))
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Execute a write. API sources forward it and invalidate; file and
    /// static sources apply it to the store (files are written back).
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        let name = cmd.name();
        debug!(command = name, "executing command");

        let result = if let PolicySource::Api(client) = &self.inner.source {
            let result = route_to_api(client, cmd).await;
            // Invalidate even on failure: the backend may have applied part.
            self.invalidate();
            result?
        } else {
            // Held through write-back: a reload between the store change and
            // the file write would drop the change from both.
            let _guard = self.inner.refresh_lock.lock().await;
            if self.is_stale() {
                self.refresh_locked().await?;
            }
            let result = apply_to_store(&self.inner.store, cmd)?;
            if let Err(e) = self
                .inner
                .source
                .write_back(&self.inner.store.to_snapshot())
                .await
            {
                // The store is ahead of the file; reload to match disk.
                self.invalidate();
                return Err(e);
            }
            result
        };

        info!(command = name, "command applied");
        Ok(result)
    }
}

/// Run CPU-bound graph work off the async worker threads.
async fn run_blocking<T, F>(f: F) -> Result<T, CoreError>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::Internal(format!("query task failed: {e}")))?
}

// ── Command routing ──────────────────────────────────────────────

fn apply_to_store(store: &DataStore, cmd: Command) -> Result<CommandResult, CoreError> {
    Ok(match cmd {
        Command::CreateSegment(req) => {
            CommandResult::Segment((*store.create_segment(req)?).clone())
        }
        Command::UpdateSegment { id, update } => {
            CommandResult::Segment((*store.update_segment(id, &update)?).clone())
        }
        Command::DeleteSegment { id } => {
            store.delete_segment(id)?;
            CommandResult::Ok
        }
        Command::ImportSegments { csv, .. } => {
            let mut report = ImportReport::default();
            for row in parse_segment_csv(&csv)? {
                match row.request {
                    Ok(req) => match store.create_segment(req) {
                        Ok(_) => report.created += 1,
                        Err(e) => report.errors.push(format!("row {}: {e}", row.row)),
                    },
                    Err(reason) => report.errors.push(format!("row {}: {reason}", row.row)),
                }
            }
            CommandResult::Imported(report)
        }
        Command::CreateRule(req) => CommandResult::Rule((*store.create_rule(req)?).clone()),
        Command::UpdateRule { id, update } => {
            CommandResult::Rule((*store.update_rule(id, &update)?).clone())
        }
        Command::DeleteRules { ids } => CommandResult::Deleted {
            count: store.delete_rules(&ids),
        },
    })
}

async fn route_to_api(client: &ApiClient, cmd: Command) -> Result<CommandResult, CoreError> {
    let now = Utc::now();

    match cmd {
        Command::CreateSegment(req) => {
            // Placeholder id; the backend assigns the real one.
            let segment = req.into_segment(SegmentId(0), now);
            validate_segment_fields(&segment)?;
            let created = client
                .create_segment(&SegmentCreateUpdate::from(&segment))
                .await?;
            Ok(CommandResult::Segment(Segment::try_from(created)?))
        }
        Command::UpdateSegment { id, update } => {
            let current = Segment::try_from(client.get_segment(id.get()).await?)?;
            let segment = update.merge(&current, now);
            validate_segment_fields(&segment)?;
            let updated = client
                .update_segment(id.get(), &SegmentCreateUpdate::from(&segment))
                .await?;
            Ok(CommandResult::Segment(Segment::try_from(updated)?))
        }
        Command::DeleteSegment { id } => {
            client.delete_segment(id.get()).await?;
            Ok(CommandResult::Ok)
        }
        Command::ImportSegments { file_name, csv } => {
            let response = client
                .import_segments_csv(&file_name, csv.into_bytes())
                .await?;
            if !response.success {
                let mut message = response
                    .message
                    .unwrap_or_else(|| "backend rejected the import".into());
                if !response.errors.is_empty() {
                    message = format!("{message} ({})", response.errors.join("; "));
                }
                return Err(CoreError::ValidationFailed { message });
            }
            Ok(CommandResult::Imported(ImportReport {
                created: usize::try_from(response.created).unwrap_or(usize::MAX),
                errors: response.errors,
            }))
        }
        Command::CreateRule(req) => {
            let rule = req.into_rule(RuleId(0), now);
            validate_rule_fields(&rule)?;
            let created = client.create_rule(&RuleCreateUpdate::from(&rule)).await?;
            Ok(CommandResult::Rule(Rule::try_from(created)?))
        }
        Command::UpdateRule { id, update } => {
            let current = Rule::try_from(client.get_rule(id.get()).await?)?;
            let rule = update.merge(&current, now);
            validate_rule_fields(&rule)?;
            let updated = client
                .update_rule(id.get(), &RuleCreateUpdate::from(&rule))
                .await?;
            Ok(CommandResult::Rule(Rule::try_from(updated)?))
        }
        Command::DeleteRules { ids } => {
            if let [id] = ids.as_slice() {
                let count = match client.delete_rule(id.get()).await {
                    Ok(()) => 1,
                    Err(e) if e.is_not_found() => 0,
                    Err(e) => return Err(e.into()),
                };
                return Ok(CommandResult::Deleted { count });
            }
            let raw: Vec<u64> = ids.iter().map(|id| id.get()).collect();
            let response = client.bulk_delete_rules(&raw).await?;
            Ok(CommandResult::Deleted {
                count: usize::try_from(response.deleted).unwrap_or(usize::MAX),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::command::{CreateRuleRequest, CreateSegmentRequest};
    use crate::config::RetryPolicy;
    use crate::graph::fixtures::{abc, allow, deny};
    use crate::graph::impact::ImpactStatus;
    use crate::model::{FirewallId, Protocol, RuleAction, ZoneType};
    use crate::source::PolicySnapshot;

    fn snapshot(rules: &[Arc<Rule>]) -> PolicySnapshot {
        PolicySnapshot {
            segments: abc().iter().map(|s| (**s).clone()).collect(),
            firewalls: Vec::new(),
            rules: rules.iter().map(|r| (**r).clone()).collect(),
        }
    }

    fn static_engine(rules: &[Arc<Rule>]) -> Engine {
        Engine::new(
            PolicySource::Static(snapshot(rules)),
            EngineConfig::default(),
        )
    }

    fn tcp(src: u64, dst: u64, port: u16) -> PathQuery {
        PathQuery::new(SegmentId(src), SegmentId(dst))
            .with_protocol(Protocol::Tcp)
            .with_port(port)
    }

    fn rule_req(src: u64, dst: u64, action: RuleAction) -> CreateRuleRequest {
        CreateRuleRequest {
            firewall_id: FirewallId(1),
            rule_name: "added".into(),
            source_segment_id: SegmentId(src),
            destination_segment_id: SegmentId(dst),
            protocol: Protocol::Tcp,
            port_range: Some("443".into()),
            action,
            description: None,
        }
    }

    fn fast_retry(attempts: u32) -> EngineConfig {
        EngineConfig {
            retry: RetryPolicy {
                attempts,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            },
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn first_query_loads_source() {
        let engine = static_engine(&[allow(1, 1, 2, "443"), allow(2, 2, 3, "443")]);
        assert!(engine.is_stale());

        let result = engine.find_path(tcp(1, 3, 443)).await.unwrap();
        assert!(result.reachable);
        assert_eq!(result.path.len(), 3);
        assert!(!engine.is_stale());
        assert!(engine.store().last_full_refresh().is_some());
    }

    #[tokio::test]
    async fn graph_is_cached_until_store_changes() {
        let engine = static_engine(&[allow(1, 1, 2, "443")]);
        let first = engine.graph().await.unwrap();
        let second = engine.graph().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(!engine.find_path(tcp(1, 3, 443)).await.unwrap().reachable);

        engine
            .execute(Command::CreateRule(rule_req(2, 3, RuleAction::Allow)))
            .await
            .unwrap();

        let third = engine.graph().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert!(third.version() > first.version());
        assert!(engine.find_path(tcp(1, 3, 443)).await.unwrap().reachable);
    }

    #[tokio::test]
    async fn added_deny_blocks_existing_path() {
        let engine = static_engine(&[allow(1, 1, 2, "443"), allow(2, 2, 3, "443")]);
        assert!(engine.find_path(tcp(1, 3, 443)).await.unwrap().reachable);

        engine
            .execute(Command::CreateRule(rule_req(1, 2, RuleAction::Deny)))
            .await
            .unwrap();
        let result = engine.find_path(tcp(1, 3, 443)).await.unwrap();
        assert_eq!(result, PathResult::unreachable());
    }

    #[tokio::test]
    async fn invalidation_signal_triggers_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("policy.json");
        std::fs::write(
            &file,
            serde_json::to_string(&snapshot(&[allow(1, 1, 2, "443")])).unwrap(),
        )
        .unwrap();

        let engine = Engine::new(PolicySource::file(&file).unwrap(), EngineConfig::default());
        assert!(!engine.find_path(tcp(1, 3, 443)).await.unwrap().reachable);

        // Upstream edits the file and signals.
        std::fs::write(
            &file,
            serde_json::to_string(&snapshot(&[allow(1, 1, 2, "443"), allow(2, 2, 3, "443")]))
                .unwrap(),
        )
        .unwrap();
        let (tx, rx) = watch::channel(0u32);
        engine.watch_invalidations(rx).await;
        tx.send(1).unwrap();

        for _ in 0..100 {
            if engine.is_stale() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(engine.is_stale());
        assert!(engine.find_path(tcp(1, 3, 443)).await.unwrap().reachable);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn file_source_writes_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("policy.yaml");
        std::fs::write(&file, serde_yaml::to_string(&snapshot(&[])).unwrap()).unwrap();

        let engine = Engine::new(PolicySource::file(&file).unwrap(), EngineConfig::default());
        let result = engine
            .execute(Command::CreateSegment(CreateSegmentRequest {
                name: "Payments".into(),
                ip_range: "10.0.50.0/24".into(),
                zone_type: ZoneType::Internal,
                color: None,
                description: None,
            }))
            .await
            .unwrap();
        let CommandResult::Segment(created) = result else {
            panic!("expected a segment");
        };
        assert_eq!(created.id, SegmentId(4));

        let on_disk = PolicySource::file(&file).unwrap().load().await.unwrap();
        assert!(on_disk.segments.iter().any(|s| s.name == "Payments"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reloads_during_file_writes_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("policy.json");
        std::fs::write(&file, serde_json::to_string(&snapshot(&[])).unwrap()).unwrap();
        let engine = Engine::new(PolicySource::file(&file).unwrap(), EngineConfig::default());

        let mut tasks = Vec::new();
        for i in 0..16 {
            let writer = engine.clone();
            tasks.push(tokio::spawn(async move {
                writer
                    .execute(Command::CreateSegment(CreateSegmentRequest {
                        name: format!("Zone {i}"),
                        ip_range: format!("10.1.{i}.0/24"),
                        zone_type: ZoneType::Internal,
                        color: None,
                        description: None,
                    }))
                    .await
                    .map(|_| ())
            }));
            let reader = engine.clone();
            tasks.push(tokio::spawn(async move {
                reader.invalidate();
                reader.segments().await.map(|_| ())
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let on_disk = PolicySource::file(&file).unwrap().load().await.unwrap();
        assert_eq!(on_disk.segments.len(), 3 + 16);
        engine.invalidate();
        assert_eq!(engine.segments().await.unwrap().len(), 3 + 16);
    }

    #[tokio::test]
    async fn referenced_segment_delete_conflicts() {
        let engine = static_engine(&[allow(1, 1, 2, "443")]);
        let err = engine
            .execute(Command::DeleteSegment { id: SegmentId(2) })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));

        let ok = engine
            .execute(Command::DeleteSegment { id: SegmentId(3) })
            .await
            .unwrap();
        assert!(matches!(ok, CommandResult::Ok));
        assert_eq!(engine.segments().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn impact_through_engine() {
        let engine = static_engine(&[allow(1, 1, 2, "443"), allow(2, 2, 3, "443")]);
        let report = engine.analyze_impact(RuleId(2)).await.unwrap();
        let response = report.to_response();

        assert!(
            response
                .affected_connections
                .iter()
                .any(|c| c.source_segment == "A" && c.destination_segment == "C")
        );
        assert!(response.dependent_paths.is_empty());
        assert!(!response.warning.is_empty());
        assert!(
            report
                .affected
                .iter()
                .all(|a| a.status == ImpactStatus::Blocked)
        );
    }

    #[tokio::test]
    async fn impact_of_unusable_rule_is_reported_not_failed() {
        let engine = static_engine(&[allow(1, 1, 2, "443"), allow(2, 2, 3, "abc")]);
        let report = engine.analyze_impact(RuleId(2)).await.unwrap();
        assert!(report.affected.is_empty());
        assert!(report.warning.contains("malformed"));

        let err = engine.analyze_impact(RuleId(99)).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn impact_respects_scale_limit() {
        let engine = Engine::new(
            PolicySource::Static(snapshot(&[allow(1, 1, 2, "443")])),
            EngineConfig {
                max_impact_segments: 2,
                ..EngineConfig::default()
            },
        );
        let err = engine.analyze_impact(RuleId(1)).await.unwrap_err();
        assert!(matches!(err, CoreError::ScaleLimitExceeded { limit: 2, .. }));
    }

    #[tokio::test]
    async fn zero_timeout_expires_queries() {
        let engine = Engine::new(
            PolicySource::Static(snapshot(&[deny(1, 1, 2, "443")])),
            EngineConfig {
                query_timeout: Some(Duration::ZERO),
                ..EngineConfig::default()
            },
        );
        let err = engine.find_path(tcp(1, 2, 443)).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout { .. }));
    }

    #[tokio::test]
    async fn transient_failures_exhaust_into_store_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/network-segments/"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), &fwgraph_api::TransportConfig::default()).unwrap();
        let engine = Engine::new(PolicySource::Api(client), fast_retry(3));

        let err = engine.refresh().await.unwrap_err();
        assert!(matches!(err, CoreError::StoreUnavailable { attempts: 3, .. }));
        assert!(engine.is_stale());
    }

    #[tokio::test]
    async fn transient_failure_then_success_loads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/network-segments/"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/network-segments/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "name": "A", "ip_range": "10.0.1.0/24",
                 "zone_type": "Internal", "color": "#4ECDC4"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), &fwgraph_api::TransportConfig::default()).unwrap();
        let engine = Engine::new(PolicySource::Api(client), fast_retry(3));

        engine.refresh().await.unwrap();
        assert_eq!(engine.store().segment_count(), 1);
    }

    #[tokio::test]
    async fn api_writes_are_forwarded_and_invalidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/firewall-rules/bulk-delete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "deleted": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), &fwgraph_api::TransportConfig::default()).unwrap();
        let engine = Engine::new(PolicySource::Api(client), EngineConfig::default());
        engine.invalidate();

        let before = engine.inner.invalidations.load(Ordering::Acquire);
        let result = engine
            .execute(Command::DeleteRules {
                ids: vec![RuleId(1), RuleId(2)],
            })
            .await
            .unwrap();
        assert!(matches!(result, CommandResult::Deleted { count: 2 }));
        assert!(engine.inner.invalidations.load(Ordering::Acquire) > before);
    }

    #[tokio::test]
    async fn single_rule_delete_uses_item_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/firewall-rules/7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/firewall-rules/8"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "detail": "Firewall rule not found"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/firewall-rules/bulk-delete"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), &fwgraph_api::TransportConfig::default()).unwrap();
        let engine = Engine::new(PolicySource::Api(client), EngineConfig::default());

        let deleted = engine
            .execute(Command::DeleteRules { ids: vec![RuleId(7)] })
            .await
            .unwrap();
        assert!(matches!(deleted, CommandResult::Deleted { count: 1 }));

        let missing = engine
            .execute(Command::DeleteRules { ids: vec![RuleId(8)] })
            .await
            .unwrap();
        assert!(matches!(missing, CommandResult::Deleted { count: 0 }));
    }

    #[tokio::test]
    async fn csv_import_creates_valid_rows_and_reports_the_rest() {
        let engine = static_engine(&[]);
        let csv = "name,ip_range,zone_type,description\n\
                   Payments,10.0.50.0/24,Internal,\"Cards, PCI\"\n\
                   A,10.0.9.0/24,DMZ,\n\
                   Bad,not-a-cidr,DMZ,\n";
        let result = engine
            .execute(Command::ImportSegments {
                file_name: "zones.csv".into(),
                csv: csv.into(),
            })
            .await
            .unwrap();

        let CommandResult::Imported(report) = result else {
            panic!("expected an import report");
        };
        assert_eq!(report.created, 1);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].starts_with("row 3:"));
        assert!(report.errors[1].starts_with("row 4:"));

        let payments = engine.resolve_segment("payments").await.unwrap();
        assert_eq!(payments.description.as_deref(), Some("Cards, PCI"));
    }

    #[tokio::test]
    async fn csv_import_is_forwarded_to_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/network-segments/import/csv"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "created": 2, "errors": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), &fwgraph_api::TransportConfig::default()).unwrap();
        let engine = Engine::new(PolicySource::Api(client), EngineConfig::default());
        let before = engine.inner.invalidations.load(Ordering::Acquire);

        let result = engine
            .execute(Command::ImportSegments {
                file_name: "zones.csv".into(),
                csv: "name,ip_range,zone_type\nX,10.9.0.0/24,DMZ\nY,10.9.1.0/24,DMZ\n".into(),
            })
            .await
            .unwrap();
        let CommandResult::Imported(report) = result else {
            panic!("expected an import report");
        };
        assert_eq!(report.created, 2);
        assert!(engine.inner.invalidations.load(Ordering::Acquire) > before);
    }

    #[tokio::test]
    async fn failed_api_import_commit_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/network-segments/import/csv"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "message": "Failed to commit: UNIQUE constraint failed",
                "created": 0,
                "errors": []
            })))
            .mount(&server)
            .await;

        let client =
            ApiClient::new(&server.uri(), &fwgraph_api::TransportConfig::default()).unwrap();
        let engine = Engine::new(PolicySource::Api(client), EngineConfig::default());
        let err = engine
            .execute(Command::ImportSegments {
                file_name: "zones.csv".into(),
                csv: "name,ip_range,zone_type\nX,10.9.0.0/24,DMZ\n".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { ref message } if message.contains("UNIQUE")));
    }
}
