//! Runs a match in real time on behalf of connected players.
//!
//! A single worker thread plays one timestep of the match every tick. Player and administrator
//! commands can arrive at any time from other threads; they take the same lock as the worker, so
//! a plan submitted before a tick begins is applied in that tick and one submitted afterwards is
//! applied in the next. After every tick each player's [`UpdateSignal`] is raised so that whoever
//! is serving that player knows a new snapshot is ready.
use crate::game::state::{PlayerFullState, PlayerTimestepState, Scoreboard};
use crate::game::{CommandError, Game, GameStatus, PlayerID};
use crate::model::Model;
use crate::settings::ServerSettings;
use anyhow::{Context, Result};
use log::{error, info};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A one-shot wake-up call for a single player.
///
/// The signal carries no data. It is raised whenever a new snapshot is available and lowered
/// again when the waiting player wakes up.
#[derive(Debug, Default)]
pub struct UpdateSignal {
    raised: Mutex<bool>,
    condvar: Condvar,
}

impl UpdateSignal {
    /// Raise the signal, waking anyone waiting on it
    pub fn raise(&self) {
        *lock(&self.raised) = true;
        self.condvar.notify_all();
    }

    /// Whether the signal is currently raised
    pub fn is_raised(&self) -> bool {
        *lock(&self.raised)
    }

    /// Block until the signal is raised, then lower it
    pub fn wait(&self) {
        let mut raised = self
            .condvar
            .wait_while(lock(&self.raised), |raised| !*raised)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *raised = false;
    }

    /// Block until the signal is raised or the timeout expires.
    ///
    /// # Returns
    ///
    /// Whether the signal was raised. If so, it is lowered again.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (mut raised, _) = self
            .condvar
            .wait_timeout_while(lock(&self.raised), timeout, |raised| !*raised)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let was_raised = *raised;
        *raised = false;
        was_raised
    }
}

/// Summary of a match, for the administrator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchInfo {
    /// The match's identifier
    pub match_id: String,
    /// The stage the match has reached
    pub status: GameStatus,
    /// The number of players who have joined
    pub n_players: usize,
    /// The number of players currently connected
    pub n_connected: usize,
    /// The number of timesteps played so far
    pub timestep: usize,
    /// The length of the match, once it has started
    pub n_timesteps: Option<usize>,
}

/// Everything shared between the worker thread and command handlers
#[derive(Debug)]
struct MatchState {
    game: Game,
    /// Incremented every time the match is reset
    generation: u64,
    signals: HashMap<PlayerID, Arc<UpdateSignal>>,
    connected: HashSet<PlayerID>,
    stopped: bool,
}

impl MatchState {
    fn new(model: Arc<Model>) -> Self {
        Self {
            game: Game::new(model),
            generation: 0,
            signals: HashMap::new(),
            connected: HashSet::new(),
            stopped: false,
        }
    }

    /// Wake every waiting player
    fn raise_all(&self) {
        for signal in self.signals.values() {
            signal.raise();
        }
    }

    /// Play a timestep if the match is running
    fn tick(&mut self) {
        if self.game.process_timestep().is_ok() {
            self.raise_all();
        }
    }
}

/// Lock a mutex, recovering the data if another thread panicked while holding it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A match played in real time
#[derive(Debug)]
pub struct MatchServer {
    settings: ServerSettings,
    model: Arc<Model>,
    state: Arc<Mutex<MatchState>>,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl MatchServer {
    /// Start serving a new match.
    ///
    /// This spawns the worker thread which plays the match. Timesteps are only played once the
    /// administrator has started the match.
    pub fn start(model: Arc<Model>, settings: ServerSettings) -> Result<Self> {
        let state = Arc::new(Mutex::new(MatchState::new(model.clone())));
        let tick_interval = settings.tick_interval();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name(format!("match-{}", settings.match_id))
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(tick_interval) {
                        Err(mpsc::RecvTimeoutError::Timeout) => lock(&worker_state).tick(),
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .context("Failed to spawn match thread")?;

        info!(
            "Serving match {} with a tick interval of {} ms",
            settings.match_id, settings.tick_interval_ms
        );

        Ok(Self {
            settings,
            model,
            state,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })
    }

    /// The match's identifier
    pub fn match_id(&self) -> &str {
        &self.settings.match_id
    }

    /// Lock the shared state, failing if the server has been shut down
    fn lock_running(&self) -> Result<MutexGuard<'_, MatchState>, CommandError> {
        let state = lock(&self.state);
        if state.stopped {
            return Err(CommandError::ServerStopped);
        }

        Ok(state)
    }

    fn check_admin_password(&self, password: &str) -> Result<(), CommandError> {
        if password != self.settings.admin_password {
            return Err(CommandError::BadCredential);
        }

        Ok(())
    }

    /// Join the match, or rejoin it after disconnecting.
    ///
    /// A player who rejoins with the same ID carries on where they left off.
    ///
    /// # Returns
    ///
    /// The full state of the player's network
    pub fn join(
        &self,
        match_id: &str,
        player_id: &str,
        player_name: &str,
        password: &str,
    ) -> Result<PlayerFullState, CommandError> {
        if match_id != self.settings.match_id {
            return Err(CommandError::WrongMatch(match_id.to_string()));
        }
        if password != self.settings.player_password {
            return Err(CommandError::BadCredential);
        }

        let mut state = self.lock_running()?;
        let player_id = PlayerID::from(player_id);
        if state.game.has_player(player_id.as_str()) {
            info!("Player {player_id} reconnected");

            // Release anyone still waiting on behalf of the old connection
            if let Some(old_signal) = state.signals.get(&player_id) {
                old_signal.raise();
            }
        } else {
            state.game.add_player(player_id.clone(), player_name)?;
        }

        state
            .signals
            .insert(player_id.clone(), Arc::new(UpdateSignal::default()));
        state.connected.insert(player_id.clone());
        info!(
            "{} of {} players connected",
            state.connected.len(),
            state.game.player_ids().count()
        );

        state.game.full_state(player_id.as_str())
    }

    /// Mark a player as disconnected. Their place in the match is kept.
    pub fn disconnect(&self, player_id: &str) {
        let mut state = lock(&self.state);
        if state.connected.remove(player_id) {
            info!("Player {player_id} disconnected");
        }
    }

    /// Submit a player's plan for the next timestep
    pub fn submit_plan<I, S>(
        &self,
        player_id: &str,
        reservoir_ids: I,
        power_price: f64,
    ) -> Result<(), CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.lock_running()?;
        state
            .game
            .set_production(player_id, reservoir_ids, power_price)
    }

    /// Start the match, for the given number of timesteps
    pub fn start_match(&self, admin_password: &str, n_timesteps: usize) -> Result<(), CommandError> {
        self.check_admin_password(admin_password)?;
        let mut state = self.lock_running()?;
        state.game.start(n_timesteps)
    }

    /// Throw away the current match and start again with no players.
    ///
    /// Anyone waiting for the next timestep is woken up.
    pub fn reset(&self, admin_password: &str) -> Result<(), CommandError> {
        self.check_admin_password(admin_password)?;
        let mut state = self.lock_running()?;

        info!("Resetting match {}", self.settings.match_id);
        state.game = Game::new(self.model.clone());
        state.generation += 1;
        state.raise_all();
        state.signals.clear();
        state.connected.clear();

        Ok(())
    }

    /// A player's current view of the match
    pub fn timestep_state(&self, player_id: &str) -> Result<PlayerTimestepState, CommandError> {
        self.lock_running()?.game.timestep_state(player_id)
    }

    /// Block until the next timestep has been played, then return the player's view of the match.
    ///
    /// Fails if the match is reset or the server shuts down while waiting.
    pub fn wait_for_update(&self, player_id: &str) -> Result<PlayerTimestepState, CommandError> {
        let (signal, generation) = self.signal_for(player_id)?;
        signal.wait();
        self.state_after_wake(player_id, generation)
    }

    /// Like [`MatchServer::wait_for_update`], but give up after `timeout`.
    ///
    /// # Returns
    ///
    /// The player's view of the match, or `None` if no timestep was played in time
    pub fn wait_for_update_timeout(
        &self,
        player_id: &str,
        timeout: Duration,
    ) -> Result<Option<PlayerTimestepState>, CommandError> {
        let (signal, generation) = self.signal_for(player_id)?;
        if !signal.wait_timeout(timeout) {
            return Ok(None);
        }

        self.state_after_wake(player_id, generation).map(Some)
    }

    fn signal_for(&self, player_id: &str) -> Result<(Arc<UpdateSignal>, u64), CommandError> {
        let state = self.lock_running()?;
        let signal = state
            .signals
            .get(player_id)
            .cloned()
            .ok_or_else(|| CommandError::UnknownPlayer(player_id.into()))?;

        Ok((signal, state.generation))
    }

    fn state_after_wake(
        &self,
        player_id: &str,
        generation: u64,
    ) -> Result<PlayerTimestepState, CommandError> {
        let state = self.lock_running()?;
        if state.generation != generation {
            return Err(CommandError::MatchReset);
        }

        state.game.timestep_state(player_id)
    }

    /// Players ranked by cash
    pub fn scoreboard(&self) -> Result<Scoreboard, CommandError> {
        Ok(self.lock_running()?.game.scoreboard())
    }

    /// Summary of the match
    pub fn info(&self) -> Result<MatchInfo, CommandError> {
        let state = self.lock_running()?;
        Ok(MatchInfo {
            match_id: self.settings.match_id.clone(),
            status: state.game.status(),
            n_players: state.game.player_ids().count(),
            n_connected: state.connected.len(),
            timestep: state.game.timestep(),
            n_timesteps: state.game.n_timesteps(),
        })
    }

    /// Stop the worker thread and wake every waiting player.
    ///
    /// Any further commands will fail with [`CommandError::ServerStopped`].
    pub fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Match thread panicked");
            }
        }

        let mut state = lock(&self.state);
        if !state.stopped {
            info!("Match server for {} stopped", self.settings.match_id);
            state.stopped = true;
            state.raise_all();
        }
    }
}

impl Drop for MatchServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
