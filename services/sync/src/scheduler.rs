use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use hubwatch_db::accounts::repositories::AccountRepository;
use hubwatch_db::snapshots::repositories::SnapshotRepository;

use crate::source::FollowerPageSource;
use crate::worker::{SyncError, SyncOutcome, SyncWorker};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cadence between sync rounds.
    pub interval: Duration,
    /// Max accounts synced concurrently within one round.
    pub concurrency: usize,
}

/// Drives periodic follower sync rounds over all registered accounts.
///
/// Lifecycle is `start()`/`stop()`, both idempotent: a second `start()`
/// while running and a `stop()` while stopped are no-ops, so there is never
/// more than one timer loop alive.
pub struct Scheduler<A, F, S> {
    config: SchedulerConfig,
    accounts: A,
    worker: Arc<SyncWorker<F, S>>,
    outcome_tx: Option<mpsc::UnboundedSender<SyncOutcome>>,
    running: Mutex<Option<RunningLoop>>,
}

struct RunningLoop {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl<A, F, S> Scheduler<A, F, S>
where
    A: AccountRepository + Clone + 'static,
    F: FollowerPageSource + 'static,
    S: SnapshotRepository + 'static,
{
    pub fn new(config: SchedulerConfig, accounts: A, worker: SyncWorker<F, S>) -> Self {
        Self {
            config,
            accounts,
            worker: Arc::new(worker),
            outcome_tx: None,
            running: Mutex::new(None),
        }
    }

    /// Forward every per-account outcome to `tx` in addition to logging it.
    pub fn with_outcomes(mut self, tx: mpsc::UnboundedSender<SyncOutcome>) -> Self {
        self.outcome_tx = Some(tx);
        self
    }

    /// Begin periodic sync rounds. The first round fires immediately.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            tracing::debug!("scheduler already running");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let config = self.config.clone();
        let accounts = self.accounts.clone();
        let worker = self.worker.clone();
        let outcome_tx = self.outcome_tx.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = config.interval.as_secs(), "scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_round(&config, &accounts, &worker, outcome_tx.as_ref()).await;
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("scheduler stopped");
                        break;
                    }
                }
            }
        });

        *running = Some(RunningLoop {
            shutdown_tx,
            handle,
        });
    }

    /// Suppress further ticks and wait for an in-flight round to finish.
    /// Issued network calls are not interrupted.
    pub async fn stop(&self) {
        let running = {
            let mut guard = self.running.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        let Some(running) = running else {
            tracing::debug!("scheduler not running");
            return;
        };

        let _ = running.shutdown_tx.send(true);
        if let Err(err) = running.handle.await {
            tracing::warn!(error = %err, "scheduler loop task panicked");
        }
    }

    /// Run a single sync round immediately, outside the timer.
    pub async fn run_once(&self) -> Vec<SyncOutcome> {
        run_round(
            &self.config,
            &self.accounts,
            &self.worker,
            self.outcome_tx.as_ref(),
        )
        .await
    }
}

/// One full pass over all registered accounts.
///
/// An account failing only marks its own outcome; a listing failure skips
/// the whole round and the process waits for the next tick.
async fn run_round<A, F, S>(
    config: &SchedulerConfig,
    accounts: &A,
    worker: &Arc<SyncWorker<F, S>>,
    outcome_tx: Option<&mpsc::UnboundedSender<SyncOutcome>>,
) -> Vec<SyncOutcome>
where
    A: AccountRepository,
    F: FollowerPageSource + 'static,
    S: SnapshotRepository + 'static,
{
    let accounts = match accounts.list_accounts().await {
        Ok(accounts) => accounts,
        Err(err) => {
            tracing::error!(error = %err, "account listing failed, skipping round");
            return Vec::new();
        }
    };

    if accounts.is_empty() {
        tracing::debug!("no accounts registered, nothing to sync");
        return Vec::new();
    }

    tracing::info!(accounts = accounts.len(), "sync round started");

    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for account in accounts {
        let worker = worker.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return SyncOutcome::failed(&account, &SyncError::Canceled),
            };
            worker.sync(&account).await
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => {
                match &outcome.error {
                    Some(err) => {
                        tracing::warn!(account = %outcome.login, error = %err, "account sync failed");
                    }
                    None => {
                        tracing::debug!(
                            account = %outcome.login,
                            added = outcome.added.len(),
                            removed = outcome.removed.len(),
                            "account sync completed"
                        );
                    }
                }
                if let Some(tx) = outcome_tx {
                    let _ = tx.send(outcome.clone());
                }
                outcomes.push(outcome);
            }
            Err(err) => {
                tracing::error!(error = %err, "sync task panicked");
            }
        }
    }

    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    tracing::info!(
        accounts = outcomes.len(),
        failed,
        "sync round completed"
    );

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::GitHubClientError;
    use crate::github::models::GitHubUser;
    use crate::source::FollowerPage;
    use async_trait::async_trait;
    use chrono::Utc;
    use hubwatch_common::error::{HubwatchError, HubwatchResult};
    use hubwatch_db::accounts::models::Account;
    use hubwatch_db::snapshots::models::FollowerSnapshot;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    // -- Test doubles --

    #[derive(Clone)]
    struct MockAccountRepo {
        accounts: Arc<Mutex<Vec<Account>>>,
        fail_listing: bool,
        list_calls: Arc<AtomicUsize>,
    }

    impl MockAccountRepo {
        fn new(accounts: Vec<Account>) -> Self {
            Self {
                accounts: Arc::new(Mutex::new(accounts)),
                fail_listing: false,
                list_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing() -> Self {
            Self {
                fail_listing: true,
                ..Self::new(Vec::new())
            }
        }

        fn list_count(&self) -> usize {
            self.list_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AccountRepository for MockAccountRepo {
        async fn list_accounts(&self) -> HubwatchResult<Vec<Account>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listing {
                return Err(HubwatchError::Database("listing exploded".to_string()));
            }
            Ok(self.accounts.lock().expect("accounts lock").clone())
        }

        async fn upsert_by_github_id(&self, account: Account) -> HubwatchResult<Account> {
            Ok(account)
        }
    }

    #[derive(Clone)]
    struct MockSnapshotRepo {
        stored: Arc<Mutex<HashMap<Uuid, FollowerSnapshot>>>,
    }

    impl MockSnapshotRepo {
        fn new() -> Self {
            Self {
                stored: Arc::new(Mutex::new(HashMap::new())),
            }
        }
    }

    #[async_trait]
    impl SnapshotRepository for MockSnapshotRepo {
        async fn get(&self, account_id: Uuid) -> HubwatchResult<Option<FollowerSnapshot>> {
            Ok(self
                .stored
                .lock()
                .expect("stored lock")
                .get(&account_id)
                .cloned())
        }

        async fn put(
            &self,
            account_id: Uuid,
            snapshot: &FollowerSnapshot,
        ) -> HubwatchResult<()> {
            self.stored
                .lock()
                .expect("stored lock")
                .insert(account_id, snapshot.clone());
            Ok(())
        }
    }

    /// Serves a fixed follower list per token; unknown tokens are rejected.
    struct TokenSource {
        users_by_token: HashMap<String, Vec<GitHubUser>>,
    }

    #[async_trait]
    impl FollowerPageSource for TokenSource {
        async fn fetch_page(
            &self,
            token: &str,
            _page: Option<u32>,
        ) -> Result<FollowerPage, GitHubClientError> {
            match self.users_by_token.get(token) {
                Some(users) => Ok(FollowerPage {
                    followers: users.clone(),
                    next_page: None,
                }),
                None => Err(GitHubClientError::AuthRejected {
                    status: StatusCode::UNAUTHORIZED,
                }),
            }
        }
    }

    /// Tracks the peak number of concurrently in-flight fetches.
    struct GaugeSource {
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl GaugeSource {
        fn new() -> (Self, Arc<AtomicUsize>) {
            let peak = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    current: Arc::new(AtomicUsize::new(0)),
                    peak: peak.clone(),
                },
                peak,
            )
        }
    }

    #[async_trait]
    impl FollowerPageSource for GaugeSource {
        async fn fetch_page(
            &self,
            _token: &str,
            _page: Option<u32>,
        ) -> Result<FollowerPage, GitHubClientError> {
            let in_flight = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(in_flight, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(FollowerPage {
                followers: Vec::new(),
                next_page: None,
            })
        }
    }

    fn user(id: i64, login: &str) -> GitHubUser {
        GitHubUser {
            id,
            login: login.to_string(),
            name: None,
            avatar_url: None,
        }
    }

    fn make_account(login: &str, token: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            github_id: 1,
            login: login.to_string(),
            access_token: token.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_config(concurrency: usize) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(3600),
            concurrency,
        }
    }

    fn make_worker<F: FollowerPageSource>(source: F) -> SyncWorker<F, MockSnapshotRepo> {
        SyncWorker::new(source, MockSnapshotRepo::new(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn one_account_failing_does_not_block_others() {
        let good = make_account("good", "tok-good");
        let bad = make_account("bad", "tok-revoked");
        let repo = MockAccountRepo::new(vec![bad.clone(), good.clone()]);

        let source = TokenSource {
            users_by_token: HashMap::from([(
                "tok-good".to_string(),
                vec![user(1, "alice")],
            )]),
        };
        let scheduler = Scheduler::new(test_config(4), repo, make_worker(source));

        let outcomes = scheduler.run_once().await;

        assert_eq!(outcomes.len(), 2);
        let bad_outcome = outcomes.iter().find(|o| o.login == "bad").unwrap();
        assert!(bad_outcome.is_err());
        let good_outcome = outcomes.iter().find(|o| o.login == "good").unwrap();
        assert!(!good_outcome.is_err());
        assert_eq!(good_outcome.added.len(), 1);
    }

    #[tokio::test]
    async fn in_flight_syncs_stay_under_the_concurrency_bound() {
        let accounts: Vec<Account> = (0..8)
            .map(|i| make_account(&format!("acct_{i}"), "tok"))
            .collect();
        let repo = MockAccountRepo::new(accounts);

        let (source, peak) = GaugeSource::new();
        let scheduler = Scheduler::new(test_config(2), repo, make_worker(source));

        let outcomes = scheduler.run_once().await;

        assert_eq!(outcomes.len(), 8);
        assert!(
            peak.load(Ordering::SeqCst) <= 2,
            "peak concurrency was {}",
            peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn listing_failure_skips_the_round() {
        let repo = MockAccountRepo::failing();
        let source = TokenSource {
            users_by_token: HashMap::new(),
        };
        let scheduler = Scheduler::new(test_config(4), repo.clone(), make_worker(source));

        let outcomes = scheduler.run_once().await;

        assert!(outcomes.is_empty());
        assert_eq!(repo.list_count(), 1);
    }

    #[tokio::test]
    async fn outcomes_are_forwarded_to_the_channel() {
        let accounts = vec![
            make_account("one", "tok"),
            make_account("two", "tok"),
        ];
        let repo = MockAccountRepo::new(accounts);
        let source = TokenSource {
            users_by_token: HashMap::from([("tok".to_string(), vec![user(1, "alice")])]),
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler::new(test_config(4), repo, make_worker(source)).with_outcomes(tx);

        let outcomes = scheduler.run_once().await;
        assert_eq!(outcomes.len(), 2);

        let mut forwarded = 0;
        while rx.try_recv().is_ok() {
            forwarded += 1;
        }
        assert_eq!(forwarded, 2);
    }

    #[tokio::test]
    async fn stop_halts_ticking_and_start_resumes() {
        let repo = MockAccountRepo::new(Vec::new());
        let source = TokenSource {
            users_by_token: HashMap::new(),
        };
        let scheduler = Scheduler::new(
            SchedulerConfig {
                interval: Duration::from_millis(50),
                concurrency: 2,
            },
            repo.clone(),
            make_worker(source),
        );

        scheduler.start();
        scheduler.start(); // idempotent: must not spawn a second timer

        tokio::time::sleep(Duration::from_millis(130)).await;
        scheduler.stop().await;
        let after_stop = repo.list_count();
        assert!(after_stop >= 1, "scheduler never ticked");

        // A leaked duplicate timer would keep ticking past stop().
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(repo.list_count(), after_stop);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(130)).await;
        scheduler.stop().await;
        assert!(repo.list_count() > after_stop, "scheduler did not resume");
    }

    #[tokio::test]
    async fn stop_while_stopped_is_a_noop() {
        let repo = MockAccountRepo::new(Vec::new());
        let source = TokenSource {
            users_by_token: HashMap::new(),
        };
        let scheduler = Scheduler::new(test_config(2), repo, make_worker(source));

        scheduler.stop().await;
        scheduler.stop().await;
    }
}
