//! Agreement on randomly sampled values.
//!
//! Scenario draws and role shuffles are sampled from randomness, yet every
//! executor of the same logical operation has to end up with the same value.
//! The core hands a pure sampler to a [`RandomAgreement`] and uses whatever it
//! returns; it never samples on its own.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

const LOG_TARGET: &str = "chain_audit::agreement";
const DOMAIN_SEED: &[u8] = b"chain-audit/agreement/seed/v1";

/// Sampler handed to an agreement primitive. Must not have side effects;
/// the output is the canonical encoding executors compare.
pub type Sampler<'a> = &'a (dyn Fn(&mut StdRng) -> Result<Vec<u8>, AgreementError> + Send + Sync);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgreementError {
    #[error("executors disagreed on {label}")]
    Disagreement { label: String },
    #[error("failed to encode sampled value: {0}")]
    Encode(String),
    #[error("failed to decode agreed value: {0}")]
    Decode(String),
    #[error("agreed value rejected: {0}")]
    Rejected(String),
    #[error("agreement unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RandomAgreement: Send + Sync {
    /// Returns the encoded value every executor of `label` converges on.
    async fn resolve_bytes(
        &self,
        label: &str,
        sampler: Sampler<'_>,
    ) -> Result<Vec<u8>, AgreementError>;
}

/// Typed front door over [`RandomAgreement::resolve_bytes`]. Values travel as
/// JSON so executors compare byte-identical encodings.
pub async fn resolve<T, F>(
    agreement: &dyn RandomAgreement,
    label: &str,
    sample: F,
) -> Result<T, AgreementError>
where
    T: Serialize + DeserializeOwned,
    F: Fn(&mut StdRng) -> T + Send + Sync,
{
    let sampler = |rng: &mut StdRng| {
        serde_json::to_vec(&sample(rng)).map_err(|err| AgreementError::Encode(err.to_string()))
    };
    let bytes = agreement.resolve_bytes(label, &sampler).await?;
    serde_json::from_slice(&bytes).map_err(|err| AgreementError::Decode(err.to_string()))
}

/// Single trusted executor: whatever it samples is the agreed value.
pub struct LocalAgreement {
    rng: Mutex<StdRng>,
}

impl LocalAgreement {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl RandomAgreement for LocalAgreement {
    async fn resolve_bytes(
        &self,
        label: &str,
        sampler: Sampler<'_>,
    ) -> Result<Vec<u8>, AgreementError> {
        let mut rng = self.rng.lock();
        let value = sampler(&mut *rng)?;
        debug!(target: LOG_TARGET, label, "resolved locally");
        Ok(value)
    }
}

/// Runs the sampler once per executor and only accepts a value all of them
/// produced. Each executor seeds its RNG from the shared beacon and the
/// operation label, so honest executors agree and a divergent one is caught.
pub struct QuorumAgreement {
    beacon: [u8; 32],
    executors: usize,
}

impl QuorumAgreement {
    pub fn new(beacon: [u8; 32], executors: usize) -> Self {
        Self {
            beacon,
            executors: executors.max(1),
        }
    }

    pub fn derive_seed(&self, label: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN_SEED);
        hasher.update(self.beacon);
        hasher.update((label.len() as u64).to_be_bytes());
        hasher.update(label.as_bytes());
        hasher.finalize().into()
    }
}

#[async_trait]
impl RandomAgreement for QuorumAgreement {
    async fn resolve_bytes(
        &self,
        label: &str,
        sampler: Sampler<'_>,
    ) -> Result<Vec<u8>, AgreementError> {
        let seed = self.derive_seed(label);
        let mut agreed: Option<Vec<u8>> = None;
        for executor in 0..self.executors {
            let mut rng = StdRng::from_seed(seed);
            let value = sampler(&mut rng)?;
            match &agreed {
                None => agreed = Some(value),
                Some(expected) if *expected == value => {}
                Some(_) => {
                    warn!(target: LOG_TARGET, label, executor, "executor diverged");
                    return Err(AgreementError::Disagreement {
                        label: label.to_owned(),
                    });
                }
            }
        }
        debug!(
            target: LOG_TARGET,
            label,
            executors = self.executors,
            seed = %hex::encode(seed),
            "quorum agreed"
        );
        agreed.ok_or_else(|| AgreementError::Unavailable("no executors configured".into()))
    }
}
