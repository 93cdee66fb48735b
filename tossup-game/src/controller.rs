//! Drives a [`GameLifecycle`] against a real backend and clock.
//!
//! One task owns the state machine. Ticks, refreshes, finished requests and
//! timers all reach it through `tokio::select!`, and the effects it returns
//! are carried out as child tasks on a `JoinSet`. Timers belong to the
//! current game and are aborted when the machine leaves it; dropping the
//! controller aborts everything still outstanding.

use crate::clock::Clock;
use crate::config::LifecycleConfig;
use crate::error::{GameError, Result};
use crate::history::{player_history, recent_results, HistoryRow, HISTORY_LIMIT, RECENT_RESULTS_LIMIT};
use crate::lifecycle::{Effect, Event, GameLifecycle, LifecycleSnapshot, TimerKind};
use crate::slip::BetEntry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tossup_core::{CoinSide, EntrySubmission, GameBackend, Session};

/// Everything a front end needs to draw the game screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerView {
    pub lifecycle: LifecycleSnapshot,
    pub points: Option<i64>,
    pub history: Vec<HistoryRow>,
    pub recent_results: Vec<CoinSide>,
}

enum Command {
    PlaceBet {
        side: CoinSide,
        amount: u64,
        reply: oneshot::Sender<Result<BetEntry>>,
    },
    Shutdown,
}

enum Internal {
    Lifecycle(Event),
    Points(i64),
    History {
        rows: Vec<HistoryRow>,
        results: Vec<CoinSide>,
    },
}

/// Abort handles for the pending timer of each kind.
#[derive(Default)]
struct Timers {
    pending: HashMap<TimerKind, AbortHandle>,
}

impl Timers {
    fn schedule(
        &mut self,
        tasks: &mut JoinSet<()>,
        tx: &mpsc::UnboundedSender<Internal>,
        epoch: u64,
        kind: TimerKind,
        after: Duration,
    ) {
        let tx = tx.clone();
        let handle = tasks.spawn(async move {
            time::sleep(after).await;
            let _ = tx.send(Internal::Lifecycle(Event::TimerFired { epoch, kind }));
        });

        if let Some(previous) = self.pending.insert(kind, handle) {
            previous.abort();
        }
    }

    fn cancel_all(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}

pub struct GameController<B, C> {
    backend: Arc<B>,
    session: Arc<Session>,
    clock: Arc<C>,
    config: LifecycleConfig,
}

impl<B, C> GameController<B, C>
where
    B: GameBackend + 'static,
    C: Clock,
{
    pub fn new(
        backend: Arc<B>,
        session: Arc<Session>,
        clock: Arc<C>,
        config: LifecycleConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            backend,
            session,
            clock,
            config,
        })
    }

    /// Start the controller task.
    pub fn spawn(self) -> (ControllerHandle, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(32);

        let initial = ControllerView {
            points: self.session.user().map(|user| user.points),
            ..ControllerView::default()
        };
        let (view_tx, view_rx) = watch::channel(initial);

        let task = tokio::spawn(self.run(commands_rx, view_tx));
        let handle = ControllerHandle {
            commands: commands_tx,
            view: view_rx,
        };

        (handle, task)
    }

    async fn run(self, mut commands: mpsc::Receiver<Command>, view_tx: watch::Sender<ControllerView>) {
        tracing::info!("Game controller started");

        let mut machine = GameLifecycle::new(self.config.clone());
        let (internal_tx, mut internal_rx) = mpsc::unbounded_channel::<Internal>();
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut timers = Timers::default();
        let mut view = view_tx.borrow().clone();

        let mut ticker = time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refresher = time::interval(self.config.refresh_interval);
        refresher.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for effect in [Effect::RefreshPoints, Effect::RefreshHistory] {
            self.apply(effect, &mut tasks, &mut timers, &internal_tx);
        }

        loop {
            let effects = tokio::select! {
                _ = ticker.tick() => {
                    machine.handle(Event::Tick { now: self.clock.now() })
                }
                _ = refresher.tick() => {
                    machine.handle(Event::RefreshDue)
                }
                Some(message) = internal_rx.recv() => match message {
                    Internal::Lifecycle(event) => machine.handle(event),
                    Internal::Points(points) => {
                        view.points = Some(points);
                        Vec::new()
                    }
                    Internal::History { rows, results } => {
                        view.history = rows;
                        view.recent_results = results;
                        Vec::new()
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::PlaceBet { side, amount, reply }) => {
                        let result = machine.place_bet(side, amount, self.clock.now());
                        if let Err(e) = &result {
                            tracing::debug!("Bet rejected: {}", e);
                        }
                        let _ = reply.send(result);
                        Vec::new()
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(joined) = tasks.join_next() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!("Controller task panicked: {}", e);
                        }
                    }
                    Vec::new()
                }
            };

            for effect in effects {
                self.apply(effect, &mut tasks, &mut timers, &internal_tx);
            }

            view.lifecycle = machine.snapshot();
            view_tx.send_if_modified(|current| {
                if *current == view {
                    return false;
                }
                *current = view.clone();
                true
            });
        }

        timers.cancel_all();
        tasks.abort_all();
        tracing::info!("Game controller stopped");
    }

    fn apply(
        &self,
        effect: Effect,
        tasks: &mut JoinSet<()>,
        timers: &mut Timers,
        tx: &mpsc::UnboundedSender<Internal>,
    ) {
        match effect {
            Effect::FetchGames => {
                let backend = self.backend.clone();
                let clock = self.clock.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    let result = backend.list_games().await;
                    let now = clock.now();
                    let _ = tx.send(Internal::Lifecycle(Event::GamesFetched { now, result }));
                });
            }
            Effect::Submit {
                epoch,
                game_id,
                entries,
            } => {
                let backend = self.backend.clone();
                let session = self.session.clone();
                let clock = self.clock.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    let result = match session.require() {
                        Ok(identity) => {
                            let submissions: Vec<EntrySubmission> = entries
                                .iter()
                                .map(|entry| entry.to_submission(&identity.user.id))
                                .collect();
                            backend.submit_entries(&game_id, &submissions).await
                        }
                        Err(e) => Err(e),
                    };
                    let now = clock.now();
                    let _ = tx.send(Internal::Lifecycle(Event::SubmitFinished { epoch, now, result }));
                });
            }
            Effect::Schedule { epoch, kind, after } => {
                timers.schedule(tasks, tx, epoch, kind, after);
            }
            Effect::CancelTimers => timers.cancel_all(),
            Effect::PollResult { epoch, game_id } => {
                let backend = self.backend.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    let result = backend.get_game(&game_id).await;
                    let _ = tx.send(Internal::Lifecycle(Event::PollFinished { epoch, result }));
                });
            }
            Effect::RefreshPoints => {
                let Some(user) = self.session.user() else {
                    return;
                };
                let backend = self.backend.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    match backend.points(&user.id).await {
                        Ok(points) => {
                            let _ = tx.send(Internal::Points(points));
                        }
                        Err(e) => tracing::warn!("Failed to refresh points: {}", e),
                    }
                });
            }
            Effect::RefreshHistory => {
                let Some(user) = self.session.user() else {
                    return;
                };
                let backend = self.backend.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    match backend.user_games(&user.id).await {
                        Ok(games) => {
                            let _ = tx.send(Internal::History {
                                rows: player_history(&games, &user.id, HISTORY_LIMIT),
                                results: recent_results(&games, RECENT_RESULTS_LIMIT),
                            });
                        }
                        Err(e) => tracing::warn!("Failed to load game history: {}", e),
                    }
                });
            }
        }
    }
}

/// Cheap, cloneable access to a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ControllerView>,
}

impl ControllerHandle {
    pub async fn place_bet(&self, side: CoinSide, amount: u64) -> Result<BetEntry> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::PlaceBet {
                side,
                amount,
                reply,
            })
            .await
            .map_err(|_| GameError::ControllerStopped)?;

        response.await.map_err(|_| GameError::ControllerStopped)?
    }

    pub fn view(&self) -> ControllerView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerView> {
        self.view.clone()
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::lifecycle::Phase;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tossup_core::storage::Storage;
    use tossup_core::{Game, GameEntry, User};

    struct FakeBackend {
        start: DateTime<Utc>,
        resolve_on_poll: u32,
        lists: AtomicU32,
        polls: AtomicU32,
        submits: Mutex<Vec<(String, Vec<EntrySubmission>)>>,
    }

    impl FakeBackend {
        fn new(start: DateTime<Utc>, resolve_on_poll: u32) -> Self {
            Self {
                start,
                resolve_on_poll,
                lists: AtomicU32::new(0),
                polls: AtomicU32::new(0),
                submits: Mutex::new(Vec::new()),
            }
        }

        fn game(&self) -> Game {
            Game {
                id: "g1".to_string(),
                start_time: Some(self.start),
                created_at: Some(self.start),
                total_pool: 0,
                result: None,
                entries: Vec::new(),
            }
        }
    }

    fn entry(label: &str, center: &str, bet: &str, amount: u64) -> GameEntry {
        GameEntry {
            id: label.to_string(),
            center_id: center.to_string(),
            amount,
            bet: bet.to_string(),
        }
    }

    #[async_trait]
    impl GameBackend for FakeBackend {
        async fn list_games(&self) -> tossup_core::Result<Vec<Game>> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.game()])
        }

        async fn get_game(&self, _game_id: &str) -> tossup_core::Result<Game> {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            let mut game = self.game();
            if polls >= self.resolve_on_poll {
                game.result = Some(CoinSide::Tails);
                game.total_pool = 600;
                game.entries = vec![
                    entry("#1001", "other", "tails", 300),
                    entry("#1002", "other", "heads", 200),
                    entry("#1001", "me", "heads", 100),
                ];
            }
            Ok(game)
        }

        async fn submit_entries(
            &self,
            game_id: &str,
            entries: &[EntrySubmission],
        ) -> tossup_core::Result<()> {
            self.submits
                .lock()
                .push((game_id.to_string(), entries.to_vec()));
            Ok(())
        }

        async fn points(&self, _center_id: &str) -> tossup_core::Result<i64> {
            Ok(900)
        }

        async fn user_games(&self, _user_id: &str) -> tossup_core::Result<Vec<Game>> {
            Ok(Vec::new())
        }
    }

    async fn logged_in_session() -> Arc<Session> {
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let session = Session::hydrate(storage).await.unwrap();
        session
            .establish(
                "token".to_string(),
                User {
                    id: "me".to_string(),
                    phone: "5550100".to_string(),
                    points: 1000,
                    name: None,
                },
            )
            .await
            .unwrap();
        Arc::new(session)
    }

    async fn wait_for<F>(handle: &ControllerHandle, pred: F) -> ControllerView
    where
        F: Fn(&ControllerView) -> bool,
    {
        let mut rx = handle.subscribe();
        time::timeout(Duration::from_secs(300), async {
            loop {
                {
                    let view = rx.borrow_and_update();
                    if pred(&view) {
                        return view.clone();
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("controller did not reach the expected view")
    }

    async fn start(
        backend: Arc<FakeBackend>,
        origin: DateTime<Utc>,
        config: LifecycleConfig,
    ) -> (ControllerHandle, JoinHandle<()>) {
        let session = logged_in_session().await;
        let clock = Arc::new(TokioClock::starting_at(origin));
        GameController::new(backend, session, clock, config)
            .unwrap()
            .spawn()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_round_submits_once_and_settles() {
        let origin = Utc::now();
        let backend = Arc::new(FakeBackend::new(origin + chrono::Duration::seconds(15), 1));
        let (handle, task) = start(backend.clone(), origin, LifecycleConfig::default()).await;

        wait_for(&handle, |view| view.lifecycle.phase == Phase::Timer).await;
        let placed = handle.place_bet(CoinSide::Heads, 100).await.unwrap();
        assert_eq!(placed.id, "#1001");

        let view = wait_for(&handle, |view| view.lifecycle.phase == Phase::Result).await;
        let outcome = view.lifecycle.outcome.unwrap();
        assert_eq!(outcome.result, CoinSide::Tails);
        assert_eq!(outcome.settlement.winners.len(), 1);
        assert_eq!(outcome.settlement.winners[0].payout, 570);
        assert_eq!(outcome.settlement.outcome_for("me").net(), -100);

        {
            let submits = backend.submits.lock();
            assert_eq!(submits.len(), 1);
            let (game_id, entries) = &submits[0];
            assert_eq!(game_id, "g1");
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].center_id, "me");
            assert_eq!(entries[0].amount, "100");
            assert_eq!(entries[0].bet, "heads");
        }

        let view = wait_for(&handle, |view| view.points == Some(900)).await;
        assert!(view.lifecycle.entries.is_empty());

        // dwell ends; the only known game is in the past
        wait_for(&handle, |view| view.lifecycle.phase == Phase::Idle).await;
        assert!(matches!(
            handle.place_bet(CoinSide::Tails, 10).await,
            Err(GameError::NoActiveGame)
        ));

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_polling_and_looks_for_next_game() {
        let origin = Utc::now();
        let backend = Arc::new(FakeBackend::new(origin + chrono::Duration::seconds(5), u32::MAX));
        let config = LifecycleConfig {
            max_poll_attempts: 3,
            ..LifecycleConfig::default()
        };
        let (handle, task) = start(backend.clone(), origin, config).await;

        wait_for(&handle, |view| view.lifecycle.phase == Phase::Flipping).await;
        let lists_before = backend.lists.load(Ordering::SeqCst);

        wait_for(&handle, |view| view.lifecycle.phase == Phase::Idle).await;
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);

        time::sleep(Duration::from_millis(10)).await;
        assert!(backend.lists.load(Ordering::SeqCst) > lists_before);
        assert!(backend.submits.lock().is_empty());

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let session = logged_in_session().await;
        let backend = Arc::new(FakeBackend::new(Utc::now(), 1));
        let config = LifecycleConfig {
            poll_interval: Duration::ZERO,
            ..LifecycleConfig::default()
        };

        let result = GameController::new(backend, session, Arc::new(crate::clock::SystemClock), config);
        assert!(matches!(result, Err(GameError::Config(_))));
    }
}
