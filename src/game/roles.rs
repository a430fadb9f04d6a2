use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::agreement::{self, AgreementError, RandomAgreement};
use crate::config::MIN_PLAYERS_FLOOR;

use super::error::GameError;
use super::types::{Role, SessionId};

const LOG_TARGET: &str = "chain_audit::game::roles";

/// One saboteur, one supervisor, auditors for everyone else.
pub fn role_multiset(player_count: usize) -> Result<Vec<Role>, GameError> {
    if player_count < MIN_PLAYERS_FLOOR {
        return Err(GameError::configuration(format!(
            "role assignment needs at least {MIN_PLAYERS_FLOOR} players, got {player_count}"
        )));
    }
    let mut roles = Vec::with_capacity(player_count);
    roles.push(Role::Saboteur);
    roles.push(Role::Supervisor);
    roles.extend(std::iter::repeat(Role::Auditor).take(player_count - 2));
    Ok(roles)
}

pub fn shuffled_roles(base: &[Role], rng: &mut StdRng) -> Vec<Role> {
    let mut roles = base.to_vec();
    roles.shuffle(rng);
    roles
}

/// Checks an agreed permutation against the quota; the agreement primitive is
/// an outside party and its answer is not trusted blindly.
pub fn ensure_quota(roles: &[Role], player_count: usize) -> Result<(), AgreementError> {
    let count = |role: Role| roles.iter().filter(|r| **r == role).count();
    if roles.len() != player_count
        || count(Role::Saboteur) != 1
        || count(Role::Supervisor) != 1
        || count(Role::Auditor) != player_count - 2
    {
        return Err(AgreementError::Rejected(format!(
            "role permutation {roles:?} violates quota for {player_count} players"
        )));
    }
    Ok(())
}

pub struct RoleAssigner<'a> {
    agreement: &'a dyn RandomAgreement,
}

impl<'a> RoleAssigner<'a> {
    pub fn new(agreement: &'a dyn RandomAgreement) -> Self {
        Self { agreement }
    }

    /// Returns roles positionally aligned with join order.
    pub async fn assign(
        &self,
        session_id: SessionId,
        player_count: usize,
    ) -> Result<Vec<Role>, GameError> {
        let base = role_multiset(player_count)?;
        let label = format!("session/{session_id}/roles");
        let roles: Vec<Role> = agreement::resolve(self.agreement, &label, |rng| {
            shuffled_roles(&base, rng)
        })
        .await?;
        ensure_quota(&roles, player_count)?;
        debug!(target: LOG_TARGET, session_id, player_count, "roles agreed");
        Ok(roles)
    }
}
