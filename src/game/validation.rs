use super::error::GameError;
use super::types::{Address, Amount, Phase, Session};

pub fn ensure_phase(session: &Session, expected: Phase) -> Result<(), GameError> {
    if session.phase != expected {
        return Err(GameError::WrongPhase {
            session_id: session.session_id,
            expected,
            actual: session.phase,
        });
    }
    Ok(())
}

pub fn ensure_capacity(session: &Session, max_players: usize) -> Result<(), GameError> {
    if session.members.len() >= max_players {
        return Err(GameError::SessionFull {
            session_id: session.session_id,
            max_players,
        });
    }
    Ok(())
}

pub fn ensure_not_member(session: &Session, address: &Address) -> Result<(), GameError> {
    if session.is_member(address) {
        return Err(GameError::AlreadyMember {
            session_id: session.session_id,
            address: address.clone(),
        });
    }
    Ok(())
}

pub fn ensure_member(session: &Session, address: &Address) -> Result<(), GameError> {
    if !session.is_member(address) {
        return Err(GameError::NotAMember {
            session_id: session.session_id,
            address: address.clone(),
        });
    }
    Ok(())
}

pub fn ensure_min_players(session: &Session, min_players: usize) -> Result<(), GameError> {
    if session.members.len() < min_players {
        return Err(GameError::NotEnoughPlayers {
            session_id: session.session_id,
            required: min_players,
            joined: session.members.len(),
        });
    }
    Ok(())
}

pub fn ensure_balance(available: Amount, required: Amount) -> Result<(), GameError> {
    if available < required {
        return Err(GameError::InsufficientBalance {
            required,
            available,
        });
    }
    Ok(())
}
