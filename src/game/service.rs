use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tracing::{debug, error, info, instrument, warn, Span};

use crate::agreement::{self, AgreementError, LocalAgreement, RandomAgreement};
use crate::config::GameConfig;
use crate::ledger::{InMemoryPlayerLedger, LedgerError, PlayerLedger};
use crate::scenario::{Scenario, ScenarioCatalog, ScenarioId, StaticScenarioCatalog};

use super::error::GameError;
use super::leaderboard::Leaderboard;
use super::outcome::{self, OutcomeResolver};
use super::roles::RoleAssigner;
use super::session_store::SessionStore;
use super::types::{
    Address, Amount, ArchivedGame, GameResult, GameStats, Phase, Player, Session, SessionId,
    SessionMember,
};
use super::validation::{
    ensure_balance, ensure_capacity, ensure_member, ensure_min_players, ensure_not_member,
    ensure_phase,
};

const LOG_TARGET: &str = "chain_audit::game::service";

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total_games: u64,
    total_rewards: Amount,
}

/// Front door of the game core: drives sessions through their lifecycle and
/// answers read-only queries. Mutations on one session are serialized by the
/// session's own lock; different sessions never contend.
pub struct GameEngine {
    config: GameConfig,
    ledger: Arc<dyn PlayerLedger>,
    catalog: Arc<dyn ScenarioCatalog>,
    agreement: Arc<dyn RandomAgreement>,
    sessions: SessionStore,
    archive: RwLock<BTreeMap<SessionId, ArchivedGame>>,
    counters: Mutex<Counters>,
    leaderboard: Leaderboard,
}

impl GameEngine {
    pub fn new(
        config: GameConfig,
        ledger: Arc<dyn PlayerLedger>,
        catalog: Arc<dyn ScenarioCatalog>,
        agreement: Arc<dyn RandomAgreement>,
    ) -> Result<Self, GameError> {
        config.validate()?;
        if catalog.all().is_empty() {
            return Err(GameError::configuration("scenario catalog is empty"));
        }
        info!(
            target: LOG_TARGET,
            entry_fee = config.entry_fee,
            min_players = config.min_players,
            max_players = config.max_players,
            "game engine ready"
        );
        Ok(Self {
            leaderboard: Leaderboard::new(config.leaderboard_size),
            config,
            ledger,
            catalog,
            agreement,
            sessions: SessionStore::new(),
            archive: RwLock::new(BTreeMap::new()),
            counters: Mutex::new(Counters::default()),
        })
    }

    /// In-memory ledger and the built-in scenarios.
    pub fn in_memory(
        config: GameConfig,
        agreement: Arc<dyn RandomAgreement>,
    ) -> Result<Self, GameError> {
        Self::new(
            config,
            Arc::new(InMemoryPlayerLedger::new()),
            Arc::new(StaticScenarioCatalog::builtin()),
            agreement,
        )
    }

    pub fn with_defaults() -> Result<Self, GameError> {
        Self::in_memory(GameConfig::default(), Arc::new(LocalAgreement::from_entropy()))
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    // ---- player registry ----

    /// Returns `false` if the address is already registered.
    #[instrument(skip(self, address, name), level = "info", target = LOG_TARGET, fields(address = %address))]
    pub async fn register_player(
        &self,
        address: Address,
        name: impl Into<String>,
    ) -> Result<bool, GameError> {
        let player = Player::new(address, name, self.config.starting_balance);
        match self.ledger.register(player).await {
            Ok(()) => {
                info!(target: LOG_TARGET, "player registered");
                Ok(true)
            }
            Err(LedgerError::AlreadyRegistered(_)) => {
                debug!(target: LOG_TARGET, "player already registered");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns `false` if the address is not registered.
    #[instrument(skip(self, address), level = "info", target = LOG_TARGET, fields(address = %address))]
    pub async fn add_tokens(&self, address: &Address, amount: Amount) -> Result<bool, GameError> {
        match self.ledger.credit(address, amount).await {
            Ok(balance) => {
                info!(target: LOG_TARGET, amount, balance, "tokens added");
                Ok(true)
            }
            Err(LedgerError::NotFound(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn player(&self, address: &Address) -> Result<Option<Player>, GameError> {
        Ok(self.ledger.player(address).await?)
    }

    /// Zero for unknown addresses.
    pub async fn balance(&self, address: &Address) -> Result<Amount, GameError> {
        Ok(self
            .ledger
            .player(address)
            .await?
            .map_or(0, |player| player.balance))
    }

    async fn registered(&self, address: &Address) -> Result<Player, GameError> {
        self.ledger
            .player(address)
            .await?
            .ok_or_else(|| GameError::NotRegistered(address.clone()))
    }

    // ---- session lifecycle ----

    /// Takes the creator's stake, draws a scenario and opens a session in
    /// matching with the creator as its only member.
    #[instrument(
        skip(self, creator),
        level = "info",
        target = LOG_TARGET,
        fields(creator = %creator, session_id = tracing::field::Empty)
    )]
    pub async fn create_session(&self, creator: &Address) -> Result<SessionId, GameError> {
        let fee = self.config.entry_fee;
        let player = self.registered(creator).await?;
        ensure_balance(player.balance, fee)?;

        let session_id = self.sessions.allocate_id();
        Span::current().record("session_id", session_id);

        let mut txn = self.ledger.begin().await?;
        let staged = async {
            txn.debit(creator, fee).await?;
            self.draw_scenario(session_id).await
        }
        .await;
        let scenario = match staged {
            Ok(scenario) => scenario,
            Err(err) => {
                warn!(target: LOG_TARGET, error = %err, "create aborted, rolling back stake");
                txn.rollback().await;
                return Err(err);
            }
        };
        txn.commit().await?;

        let creator_member = SessionMember::joined(creator.clone(), player.name);
        self.sessions
            .insert(Session::new(session_id, scenario.id, creator_member, Utc::now()));
        info!(
            target: LOG_TARGET,
            scenario_id = scenario.id,
            stake = fee,
            "session created"
        );
        Ok(session_id)
    }

    async fn draw_scenario(&self, session_id: SessionId) -> Result<Scenario, GameError> {
        let scenarios = self.catalog.all();
        let count = scenarios.len();
        let label = format!("session/{session_id}/scenario");
        let index: usize =
            agreement::resolve(self.agreement.as_ref(), &label, |rng| rng.gen_range(0..count))
                .await?;
        let scenario = scenarios.into_iter().nth(index).ok_or_else(|| {
            AgreementError::Rejected(format!("scenario index {index} out of range 0..{count}"))
        })?;
        debug!(target: LOG_TARGET, index, scenario_id = scenario.id, "scenario agreed");
        Ok(scenario)
    }

    /// Every check and the stake debit happen under the session lock, so two
    /// racing joins can never both pass the capacity check.
    #[instrument(skip(self, player), level = "info", target = LOG_TARGET, fields(player = %player))]
    pub async fn join_session(
        &self,
        session_id: SessionId,
        player: &Address,
    ) -> Result<(), GameError> {
        let mut session = self.sessions.lock(session_id).await?;
        let record = self.registered(player).await?;
        ensure_balance(record.balance, self.config.entry_fee)?;
        ensure_phase(&session, Phase::Matching)?;
        ensure_capacity(&session, self.config.max_players)?;
        ensure_not_member(&session, player)?;

        self.ledger.debit(player, self.config.entry_fee).await?;
        session
            .members
            .push(SessionMember::joined(player.clone(), record.name));
        info!(
            target: LOG_TARGET,
            members = session.members.len(),
            "player joined"
        );
        Ok(())
    }

    #[instrument(skip(self), level = "info", target = LOG_TARGET)]
    pub async fn start_session(&self, session_id: SessionId) -> Result<(), GameError> {
        let mut session = self.sessions.lock(session_id).await?;
        ensure_phase(&session, Phase::Matching)?;
        ensure_min_players(&session, self.config.min_players)?;

        let roles = RoleAssigner::new(self.agreement.as_ref())
            .assign(session_id, session.members.len())
            .await?;
        for (member, role) in session.members.iter_mut().zip(roles) {
            member.role = Some(role);
        }
        session.phase = Phase::Playing;
        session.started_at = Some(Utc::now());
        info!(
            target: LOG_TARGET,
            members = session.members.len(),
            "roles assigned, session playing"
        );
        Ok(())
    }

    #[instrument(skip(self), level = "info", target = LOG_TARGET)]
    pub async fn start_voting(&self, session_id: SessionId) -> Result<(), GameError> {
        let mut session = self.sessions.lock(session_id).await?;
        ensure_phase(&session, Phase::Playing)?;
        session.phase = Phase::Voting;
        info!(target: LOG_TARGET, "voting opened");
        Ok(())
    }

    /// Self-votes and votes for non-members are accepted.
    #[instrument(
        skip(self, voter, target),
        level = "info",
        target = LOG_TARGET,
        fields(voter = %voter, target = %target)
    )]
    pub async fn submit_vote(
        &self,
        session_id: SessionId,
        voter: &Address,
        target: &Address,
    ) -> Result<(), GameError> {
        let mut session = self.sessions.lock(session_id).await?;
        ensure_phase(&session, Phase::Voting)?;
        ensure_member(&session, voter)?;
        session.ballots.cast(voter.clone(), target.clone());
        debug!(target: LOG_TARGET, ballots = session.ballots.len(), "vote recorded");
        Ok(())
    }

    /// Settles the session and moves it to the archive. If the ledger
    /// settlement fails nothing is applied and the session stays in voting.
    ///
    /// The leaderboard is rebuilt after settlement commits. A failed rebuild
    /// is logged, not returned, so the ranking can lag until the next
    /// finalize succeeds in rebuilding it.
    #[instrument(skip(self), level = "info", target = LOG_TARGET)]
    pub async fn finalize_session(&self, session_id: SessionId) -> Result<GameResult, GameError> {
        let mut session = self.sessions.lock(session_id).await?;
        ensure_phase(&session, Phase::Voting)?;
        let scenario = self
            .catalog
            .get(session.scenario_id)
            .ok_or(GameError::ScenarioNotFound(session.scenario_id))?;

        let resolution = outcome::resolve_session(&session, self.config.entry_fee)?;
        if let Err(err) = OutcomeResolver::new(self.ledger.as_ref())
            .settle(&resolution)
            .await
        {
            error!(target: LOG_TARGET, error = %err, "finalize rolled back");
            return Err(err);
        }

        let ended_at = Utc::now();
        session.members = resolution.members.clone();
        session.ended_at = Some(ended_at);
        let record = outcome::archive(&session, &scenario, &resolution, ended_at);
        self.archive.write().insert(session_id, record);
        {
            let mut counters = self.counters.lock();
            counters.total_games += 1;
            counters.total_rewards = counters.total_rewards.saturating_add(resolution.pool);
        }
        session.retire();

        if let Err(err) = self.leaderboard.recompute(self.ledger.as_ref()).await {
            // Derived state only; the next finalize rebuilds it.
            warn!(target: LOG_TARGET, error = %err, "leaderboard recompute failed");
        }
        info!(
            target: LOG_TARGET,
            result = %resolution.result,
            pool = resolution.pool,
            distributed = resolution.distributed(),
            "session finalized"
        );
        Ok(resolution.result)
    }

    // ---- queries ----

    /// Ids of unresolved sessions, ascending.
    pub fn list_active_sessions(&self) -> Vec<SessionId> {
        self.sessions.ids()
    }

    pub async fn session(&self, session_id: SessionId) -> Option<Session> {
        self.sessions.snapshot(session_id).await
    }

    pub fn archived_game(&self, session_id: SessionId) -> Option<ArchivedGame> {
        self.archive.read().get(&session_id).cloned()
    }

    /// Player records in rank order.
    pub async fn leaderboard(&self) -> Result<Vec<Player>, GameError> {
        let mut players = Vec::new();
        for address in self.leaderboard.ranking().await {
            if let Some(player) = self.ledger.player(&address).await? {
                players.push(player);
            }
        }
        Ok(players)
    }

    pub fn player_history(&self, address: &Address) -> Vec<ArchivedGame> {
        self.archive
            .read()
            .values()
            .filter(|game| game.includes(address))
            .cloned()
            .collect()
    }

    pub fn scenario(&self, scenario_id: ScenarioId) -> Option<Scenario> {
        self.catalog.get(scenario_id)
    }

    pub async fn stats(&self) -> Result<GameStats, GameError> {
        let counters = *self.counters.lock();
        Ok(GameStats {
            total_players: self.ledger.player_count().await?,
            total_games: counters.total_games,
            total_rewards: counters.total_rewards,
            active_sessions: self.sessions.len(),
            entry_fee: self.config.entry_fee,
        })
    }
}
