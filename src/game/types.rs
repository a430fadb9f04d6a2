use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scenario::ScenarioId;

pub type SessionId = u64;
pub type Amount = u64;

/// Player identity as handed to us by the caller. Opaque beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Auditor,
    Saboteur,
    Supervisor,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Auditor => "AUDITOR",
            Role::Saboteur => "SABOTEUR",
            Role::Supervisor => "SUPERVISOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle position of a live session. Resolution removes the session, so
/// there is no terminal variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Matching,
    Playing,
    Voting,
}

impl Phase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Phase::Matching => "matching",
            Phase::Playing => "playing",
            Phase::Voting => "voting",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    #[serde(rename = "Audit Success")]
    AuditSuccess,
    #[serde(rename = "Saboteur Victory")]
    SaboteurVictory,
}

impl GameResult {
    pub const fn label(&self) -> &'static str {
        match self {
            GameResult::AuditSuccess => "Audit Success",
            GameResult::SaboteurVictory => "Saboteur Victory",
        }
    }

    pub const fn saboteur_caught(&self) -> bool {
        matches!(self, GameResult::AuditSuccess)
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Registry entry owned by the player ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub address: Address,
    pub name: String,
    pub balance: Amount,
    pub games_played: u64,
    pub total_rewards: Amount,
    pub wins: u64,
}

impl Player {
    pub fn new(address: Address, name: impl Into<String>, balance: Amount) -> Self {
        Self {
            address,
            name: name.into(),
            balance,
            games_played: 0,
            total_rewards: 0,
            wins: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMember {
    pub address: Address,
    pub name: String,
    pub role: Option<Role>,
    pub votes_received: u32,
    pub reward: Amount,
    pub is_winner: bool,
}

impl SessionMember {
    pub fn joined(address: Address, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            role: None,
            votes_received: 0,
            reward: 0,
            is_winner: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub voter: Address,
    pub target: Address,
}

/// One ballot per voter. A re-vote replaces the target but keeps the voter's
/// original position, which is what the tally iterates in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BallotBox(Vec<Ballot>);

impl BallotBox {
    pub fn cast(&mut self, voter: Address, target: Address) {
        match self.0.iter_mut().find(|ballot| ballot.voter == voter) {
            Some(ballot) => ballot.target = target,
            None => self.0.push(Ballot { voter, target }),
        }
    }

    pub fn target_of(&self, voter: &Address) -> Option<&Address> {
        self.0
            .iter()
            .find(|ballot| &ballot.voter == voter)
            .map(|ballot| &ballot.target)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ballot> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub scenario_id: ScenarioId,
    pub phase: Phase,
    pub members: Vec<SessionMember>,
    pub ballots: BallotBox,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        session_id: SessionId,
        scenario_id: ScenarioId,
        creator: SessionMember,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            scenario_id,
            phase: Phase::Matching,
            members: vec![creator],
            ballots: BallotBox::default(),
            created_at,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn is_member(&self, address: &Address) -> bool {
        self.members.iter().any(|member| &member.address == address)
    }

    pub fn member_with_role(&self, role: Role) -> Option<&SessionMember> {
        self.members.iter().find(|member| member.role == Some(role))
    }
}

/// Frozen record of a resolved session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedGame {
    pub session_id: SessionId,
    pub scenario_id: ScenarioId,
    pub scenario_title: String,
    pub category: String,
    pub vulnerability_type: String,
    pub hidden_anomaly: String,
    pub result: GameResult,
    pub pool: Amount,
    pub timestamp: DateTime<Utc>,
    pub players: Vec<SessionMember>,
}

impl ArchivedGame {
    pub fn includes(&self, address: &Address) -> bool {
        self.players.iter().any(|player| &player.address == address)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameStats {
    pub total_players: usize,
    pub total_games: u64,
    pub total_rewards: Amount,
    pub active_sessions: usize,
    pub entry_fee: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revote_keeps_original_ballot_position() {
        let mut ballots = BallotBox::default();
        ballots.cast("a".into(), "x".into());
        ballots.cast("b".into(), "y".into());
        ballots.cast("a".into(), "z".into());

        let order: Vec<_> = ballots
            .iter()
            .map(|ballot| (ballot.voter.as_str(), ballot.target.as_str()))
            .collect();
        assert_eq!(order, vec![("a", "z"), ("b", "y")]);
        assert_eq!(ballots.len(), 2);
    }

    #[test]
    fn roles_and_results_use_wire_labels() {
        assert_eq!(serde_json::to_string(&Role::Saboteur).unwrap(), "\"SABOTEUR\"");
        assert_eq!(
            serde_json::to_string(&GameResult::SaboteurVictory).unwrap(),
            "\"Saboteur Victory\""
        );
        assert_eq!(serde_json::to_string(&Phase::Voting).unwrap(), "\"voting\"");
        assert_eq!(GameResult::AuditSuccess.to_string(), "Audit Success");
    }

    #[test]
    fn session_snapshot_survives_json() {
        let mut session = Session::new(
            7,
            2,
            SessionMember::joined("alice".into(), "Alice"),
            Utc::now(),
        );
        session.members[0].role = Some(Role::Supervisor);
        session.ballots.cast("alice".into(), "bob".into());
        crate::test_utils::serde::assert_round_trip_eq(&session);
    }
}
