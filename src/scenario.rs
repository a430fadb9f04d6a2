//! Read-only catalog of audit scenarios a session can be dealt.

use serde::{Deserialize, Serialize};

pub type ScenarioId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub title: String,
    pub category: String,
    pub difficulty: String,
    pub vulnerability_type: String,
    pub hidden_anomaly: String,
    pub correct_answer: String,
}

pub trait ScenarioCatalog: Send + Sync {
    fn get(&self, id: ScenarioId) -> Option<Scenario>;

    /// Every scenario in catalog order. Index positions are what the scenario
    /// draw samples over.
    fn all(&self) -> Vec<Scenario>;
}

#[derive(Debug, Clone)]
pub struct StaticScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl StaticScenarioCatalog {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_SCENARIOS
                .iter()
                .map(
                    |&(id, title, category, difficulty, vulnerability_type, hidden_anomaly, correct_answer)| {
                        Scenario {
                            id,
                            title: title.into(),
                            category: category.into(),
                            difficulty: difficulty.into(),
                            vulnerability_type: vulnerability_type.into(),
                            hidden_anomaly: hidden_anomaly.into(),
                            correct_answer: correct_answer.into(),
                        }
                    },
                )
                .collect(),
        )
    }
}

impl Default for StaticScenarioCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScenarioCatalog for StaticScenarioCatalog {
    fn get(&self, id: ScenarioId) -> Option<Scenario> {
        self.scenarios.iter().find(|s| s.id == id).cloned()
    }

    fn all(&self) -> Vec<Scenario> {
        self.scenarios.clone()
    }
}

type ScenarioRow = (
    ScenarioId,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
);

const BUILTIN_SCENARIOS: [ScenarioRow; 5] = [
    (
        1,
        "Flash Loan Arbitrage Exploit",
        "DeFi",
        "Advanced",
        "Price Manipulation Attack",
        "The swap used a pre-manipulated liquidity pool",
        "price_manipulation",
    ),
    (
        2,
        "NFT Minting Permission Bypass",
        "NFT",
        "Intermediate",
        "Missing Re-mint Protection",
        "Contract doesn't record minted addresses",
        "missing_limit_check",
    ),
    (
        3,
        "Governance Proposal Hijack",
        "DAO",
        "Advanced",
        "Vote Borrowing Attack",
        "Voting power comes from flash loan pool",
        "vote_borrowing",
    ),
    (
        4,
        "Staking Reward Calculation Error",
        "DeFi",
        "Intermediate",
        "Integer Overflow / Reward Over-issuance",
        "Reward calculation uses incorrect multiplier",
        "integer_overflow",
    ),
    (
        5,
        "Multisig Timelock Bypass",
        "Multisig",
        "Advanced",
        "Timelock Configuration Error",
        "Timelock contract not properly connected",
        "timelock_bypass",
    ),
];
