use serde::{Deserialize, Serialize};

use crate::game::{Address, Amount, GameResult, SessionId};

#[derive(Debug, Deserialize)]
pub struct RegisterPlayerRequest {
    pub address: Address,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterPlayerResponse {
    pub registered: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddTokensRequest {
    pub amount: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddTokensResponse {
    pub credited: bool,
}

/// Body for create and join: the acting player.
#[derive(Debug, Deserialize)]
pub struct PlayerRequest {
    pub player: Address,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub voter: Address,
    pub target: Address,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub session_id: SessionId,
    pub result: GameResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActiveSessionsResponse {
    pub sessions: Vec<SessionId>,
}
