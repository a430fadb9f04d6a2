//! Vote tallying, reward computation and settlement of a session in voting.

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::ledger::PlayerLedger;
use crate::scenario::Scenario;

use super::error::GameError;
use super::types::{
    Address, Amount, ArchivedGame, BallotBox, GameResult, Role, Session, SessionMember,
};

const LOG_TARGET: &str = "chain_audit::game::outcome";

/// Vote counts per target, in the order targets first appear among ballots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally(Vec<(Address, u32)>);

impl Tally {
    pub fn from_ballots(ballots: &BallotBox) -> Self {
        let mut counts: Vec<(Address, u32)> = Vec::new();
        for ballot in ballots.iter() {
            match counts.iter_mut().find(|(target, _)| *target == ballot.target) {
                Some((_, count)) => *count += 1,
                None => counts.push((ballot.target.clone(), 1)),
            }
        }
        Self(counts)
    }

    pub fn count(&self, address: &Address) -> u32 {
        self.0
            .iter()
            .find(|(target, _)| target == address)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Strictly highest count; on a tie the target seen first keeps the lead.
    pub fn leader(&self) -> Option<&Address> {
        let mut leader: Option<(&Address, u32)> = None;
        for (target, count) in &self.0 {
            if leader.map_or(true, |(_, best)| *count > best) {
                leader = Some((target, *count));
            }
        }
        leader.map(|(target, _)| target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardSchedule {
    pub auditor: Amount,
    pub supervisor: Amount,
    pub saboteur: Amount,
}

impl RewardSchedule {
    /// Caught: auditors take a third of the pool each and the supervisor a
    /// quarter, with the auditor share clipped so the payout never exceeds the
    /// pool. Not caught: the saboteur takes half. Truncated remainders stay
    /// undistributed.
    pub fn for_outcome(result: GameResult, pool: Amount, auditors: usize) -> Self {
        match result {
            GameResult::AuditSuccess => {
                let supervisor = pool / 4;
                let auditors = auditors.max(1) as Amount;
                let auditor = (pool / 3).min((pool - supervisor) / auditors);
                Self {
                    auditor,
                    supervisor,
                    saboteur: 0,
                }
            }
            GameResult::SaboteurVictory => Self {
                auditor: 0,
                supervisor: 0,
                saboteur: pool / 2,
            },
        }
    }

    pub fn reward_for(&self, role: Option<Role>) -> Amount {
        match role {
            Some(Role::Auditor) => self.auditor,
            Some(Role::Supervisor) => self.supervisor,
            Some(Role::Saboteur) => self.saboteur,
            None => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub result: GameResult,
    pub pool: Amount,
    pub tally: Tally,
    pub members: Vec<SessionMember>,
}

impl Resolution {
    pub fn distributed(&self) -> Amount {
        self.members.iter().map(|member| member.reward).sum()
    }
}

pub fn reward_pool(member_count: usize, entry_fee: Amount) -> Result<Amount, GameError> {
    (member_count as Amount)
        .checked_mul(entry_fee)
        .ok_or_else(|| GameError::configuration("reward pool overflows"))
}

/// Pure part of finalization: decides the result and fills in votes, rewards
/// and winner flags for every member.
pub fn resolve_session(session: &Session, entry_fee: Amount) -> Result<Resolution, GameError> {
    let tally = Tally::from_ballots(&session.ballots);
    let saboteur = session
        .member_with_role(Role::Saboteur)
        .map(|member| &member.address);
    let caught = matches!((tally.leader(), saboteur), (Some(leader), Some(saboteur)) if leader == saboteur);
    let result = if caught {
        GameResult::AuditSuccess
    } else {
        GameResult::SaboteurVictory
    };

    let pool = reward_pool(session.members.len(), entry_fee)?;
    let auditors = session
        .members
        .iter()
        .filter(|member| member.role == Some(Role::Auditor))
        .count();
    let schedule = RewardSchedule::for_outcome(result, pool, auditors);

    let members = session
        .members
        .iter()
        .map(|member| {
            let reward = schedule.reward_for(member.role);
            SessionMember {
                votes_received: tally.count(&member.address),
                reward,
                is_winner: winning_role(result, member.role),
                ..member.clone()
            }
        })
        .collect();

    Ok(Resolution {
        result,
        pool,
        tally,
        members,
    })
}

fn winning_role(result: GameResult, role: Option<Role>) -> bool {
    match (result, role) {
        (GameResult::AuditSuccess, Some(Role::Auditor | Role::Supervisor)) => true,
        (GameResult::SaboteurVictory, Some(Role::Saboteur)) => true,
        _ => false,
    }
}

pub fn archive(
    session: &Session,
    scenario: &Scenario,
    resolution: &Resolution,
    timestamp: DateTime<Utc>,
) -> ArchivedGame {
    ArchivedGame {
        session_id: session.session_id,
        scenario_id: session.scenario_id,
        scenario_title: scenario.title.clone(),
        category: scenario.category.clone(),
        vulnerability_type: scenario.vulnerability_type.clone(),
        hidden_anomaly: scenario.hidden_anomaly.clone(),
        result: resolution.result,
        pool: resolution.pool,
        timestamp,
        players: resolution.members.clone(),
    }
}

/// Applies a resolution to the ledger in one transaction: every member is
/// credited and has stats recorded, or nobody is.
pub struct OutcomeResolver<'a> {
    ledger: &'a dyn PlayerLedger,
}

impl<'a> OutcomeResolver<'a> {
    pub fn new(ledger: &'a dyn PlayerLedger) -> Self {
        Self { ledger }
    }

    pub async fn settle(&self, resolution: &Resolution) -> Result<(), GameError> {
        let mut txn = self.ledger.begin().await.map_err(GameError::Settlement)?;
        for member in &resolution.members {
            let staged = async {
                txn.credit(&member.address, member.reward).await?;
                txn.record_game_stat(&member.address, member.reward, member.is_winner)
                    .await
            }
            .await;
            if let Err(err) = staged {
                error!(
                    target: LOG_TARGET,
                    address = %member.address,
                    error = %err,
                    "failed to stage settlement, rolling back"
                );
                txn.rollback().await;
                return Err(GameError::Settlement(err));
            }
        }
        txn.commit().await.map_err(|err| {
            error!(target: LOG_TARGET, error = %err, "settlement commit failed");
            GameError::Settlement(err)
        })?;
        debug!(
            target: LOG_TARGET,
            pool = resolution.pool,
            distributed = resolution.distributed(),
            "settled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::game::types::Phase;

    fn voting_session(roles: &[(&str, Role)], votes: &[(&str, &str)]) -> Session {
        let mut session = Session::new(
            1,
            1,
            SessionMember::joined(roles[0].0.into(), roles[0].0),
            Utc::now(),
        );
        for (address, _) in &roles[1..] {
            session
                .members
                .push(SessionMember::joined((*address).into(), *address));
        }
        for (member, (_, role)) in session.members.iter_mut().zip(roles) {
            member.role = Some(*role);
        }
        session.phase = Phase::Voting;
        for (voter, target) in votes {
            session.ballots.cast((*voter).into(), (*target).into());
        }
        session
    }

    fn reward_of(resolution: &Resolution, address: &str) -> Amount {
        resolution
            .members
            .iter()
            .find(|m| m.address.as_str() == address)
            .map(|m| m.reward)
            .unwrap()
    }

    #[test]
    fn tie_goes_to_first_target_seen() {
        let mut ballots = BallotBox::default();
        ballots.cast("v1".into(), "b".into());
        ballots.cast("v2".into(), "a".into());
        ballots.cast("v3".into(), "a".into());
        ballots.cast("v4".into(), "b".into());
        let tally = Tally::from_ballots(&ballots);
        assert_eq!(tally.leader(), Some(&Address::from("b")));
        assert_eq!(tally.count(&"a".into()), 2);
        assert_eq!(tally.count(&"zed".into()), 0);
    }

    #[test]
    fn empty_tally_has_no_leader() {
        assert_eq!(Tally::default().leader(), None);
    }

    #[test]
    fn caught_saboteur_pays_auditors_and_supervisor() {
        let session = voting_session(
            &[("A", Role::Saboteur), ("B", Role::Supervisor), ("C", Role::Auditor)],
            &[("A", "B"), ("B", "A"), ("C", "A")],
        );
        let resolution = resolve_session(&session, 5).unwrap();
        assert_eq!(resolution.result, GameResult::AuditSuccess);
        assert_eq!(resolution.pool, 15);
        assert_eq!(reward_of(&resolution, "A"), 0);
        assert_eq!(reward_of(&resolution, "B"), 3);
        assert_eq!(reward_of(&resolution, "C"), 5);
        let a = &resolution.members[0];
        assert_eq!((a.votes_received, a.is_winner), (2, false));
        assert!(resolution.members[1].is_winner && resolution.members[2].is_winner);
    }

    #[test]
    fn missed_saboteur_takes_half() {
        let session = voting_session(
            &[("A", Role::Saboteur), ("B", Role::Supervisor), ("C", Role::Auditor)],
            &[("A", "C"), ("B", "C"), ("C", "C")],
        );
        let resolution = resolve_session(&session, 5).unwrap();
        assert_eq!(resolution.result, GameResult::SaboteurVictory);
        assert_eq!(reward_of(&resolution, "A"), 7);
        assert_eq!(reward_of(&resolution, "B"), 0);
        assert_eq!(reward_of(&resolution, "C"), 0);
        assert_eq!(resolution.members[2].votes_received, 3);
    }

    #[test]
    fn no_votes_means_saboteur_victory() {
        let session = voting_session(
            &[("A", Role::Auditor), ("B", Role::Saboteur), ("C", Role::Supervisor)],
            &[],
        );
        assert_eq!(
            resolve_session(&session, 5).unwrap().result,
            GameResult::SaboteurVictory
        );
    }

    #[test]
    fn off_roster_votes_are_tallied_but_never_win() {
        let session = voting_session(
            &[("A", Role::Saboteur), ("B", Role::Supervisor), ("C", Role::Auditor)],
            &[("A", "nobody"), ("B", "nobody"), ("C", "A")],
        );
        let resolution = resolve_session(&session, 5).unwrap();
        assert_eq!(resolution.tally.count(&"nobody".into()), 2);
        assert_eq!(resolution.result, GameResult::SaboteurVictory);
    }

    #[test]
    fn full_table_payout_is_clipped_to_pool() {
        let session = voting_session(
            &[
                ("A", Role::Saboteur),
                ("B", Role::Supervisor),
                ("C", Role::Auditor),
                ("D", Role::Auditor),
                ("E", Role::Auditor),
            ],
            &[("B", "A"), ("C", "A"), ("D", "A")],
        );
        let resolution = resolve_session(&session, 5).unwrap();
        assert_eq!(resolution.pool, 25);
        assert_eq!(reward_of(&resolution, "B"), 6);
        assert_eq!(reward_of(&resolution, "C"), 6);
        assert!(resolution.distributed() <= resolution.pool);
    }

    fn arb_session() -> impl Strategy<Value = (Session, Amount)> {
        (3usize..=8, 1u64..1_000, any::<u64>(), prop::collection::vec((0usize..8, 0usize..9), 0..16))
            .prop_map(|(n, fee, seed, votes)| {
                use rand::SeedableRng;
                let base = crate::game::roles::role_multiset(n).unwrap();
                let roles = crate::game::roles::shuffled_roles(
                    &base,
                    &mut rand::rngs::StdRng::seed_from_u64(seed),
                );
                let names: Vec<String> = (0..n).map(|i| format!("p{i}")).collect();
                let pairs: Vec<(&str, Role)> =
                    names.iter().map(String::as_str).zip(roles).collect();
                let ballots: Vec<(String, String)> = votes
                    .into_iter()
                    .map(|(voter, target)| (format!("p{}", voter % n), format!("p{target}")))
                    .collect();
                let ballot_refs: Vec<(&str, &str)> = ballots
                    .iter()
                    .map(|(v, t)| (v.as_str(), t.as_str()))
                    .collect();
                (voting_session(&pairs, &ballot_refs), fee)
            })
    }

    proptest! {
        /// Property: payouts never exceed the pool and the pool equals every stake taken.
        #[test]
        fn prop_rewards_bounded_by_pool((session, fee) in arb_session()) {
            let resolution = resolve_session(&session, fee).unwrap();
            prop_assert_eq!(resolution.pool, fee * session.members.len() as u64);
            prop_assert!(resolution.distributed() <= resolution.pool);
            let winners = resolution.members.iter().filter(|m| m.is_winner).count();
            let expected = if resolution.result.saboteur_caught() { session.members.len() - 1 } else { 1 };
            prop_assert_eq!(winners, expected);
        }
    }
}
