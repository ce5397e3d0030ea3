//! Bootstrap peer resolution.
//!
//! Static profiles carry their peer list; chain-resolved profiles ask the
//! validator registry. Either way the result is checked before any
//! handshake is attempted.

use async_trait::async_trait;
use lit_types::{
    threshold_for, ChainResolvedProfile, ContractContext, EpochState, LitError, NetworkProfile,
    StakingState, Timestamp, ValidatorSnapshot,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// On-chain validator registry.
///
/// Contract call encoding lives behind this trait.
#[async_trait]
pub trait ValidatorRegistry: Send + Sync {
    /// Current validator set, minimum node count and epoch.
    async fn connection_info(
        &self,
        profile: &ChainResolvedProfile,
        context: Option<&ContractContext>,
    ) -> Result<ValidatorSnapshot, LitError>;

    /// Live read of the staking contract's `epoch()`.
    async fn current_epoch(
        &self,
        profile: &ChainResolvedProfile,
        context: Option<&ContractContext>,
    ) -> Result<u64, LitError>;

    /// Stream of `StateChanged` events, if the registry can watch them.
    fn state_changes(&self) -> Option<broadcast::Receiver<StakingState>>;
}

/// Peers and quorum size for one connect round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPeers {
    pub min_node_count: usize,
    pub bootstrap_urls: Vec<String>,
    /// Epoch reported by the registry; static profiles have none.
    pub epoch: Option<EpochState>,
}

#[derive(Clone, Default)]
pub struct ConfigResolver {
    registry: Option<Arc<dyn ValidatorRegistry>>,
}

impl ConfigResolver {
    pub fn new(registry: Option<Arc<dyn ValidatorRegistry>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> Option<&Arc<dyn ValidatorRegistry>> {
        self.registry.as_ref()
    }

    /// Resolve the bootstrap set for `profile`.
    ///
    /// `min_node_count` overrides the derived threshold of a static profile.
    pub async fn resolve(
        &self,
        profile: &NetworkProfile,
        context: Option<&ContractContext>,
        min_node_count: Option<usize>,
    ) -> Result<ResolvedPeers, LitError> {
        let resolved = match profile {
            NetworkProfile::Static(p) => ResolvedPeers {
                min_node_count: min_node_count.unwrap_or_else(|| threshold_for(p.bootstrap_urls.len())),
                bootstrap_urls: p.bootstrap_urls.clone(),
                epoch: None,
            },
            NetworkProfile::ChainResolved(p) => {
                if let Some(ctx) = context {
                    ctx.validate()?;
                }
                let registry = self.registry.as_ref().ok_or_else(|| {
                    LitError::InvalidArgument(format!(
                        "network {} needs a validator registry to resolve its peers",
                        p.network
                    ))
                })?;
                let snapshot = registry.connection_info(p, context).await?;
                ResolvedPeers {
                    min_node_count: snapshot.min_node_count,
                    bootstrap_urls: snapshot.bootstrap_urls,
                    epoch: Some(EpochState::new(
                        snapshot.epoch_number,
                        snapshot.epoch_start_time,
                        Timestamp::now(),
                    )),
                }
            }
        };

        validate(&resolved)?;
        tracing::debug!(
            network = %profile.network(),
            peers = resolved.bootstrap_urls.len(),
            min_node_count = resolved.min_node_count,
            "resolved bootstrap peers"
        );
        Ok(resolved)
    }
}

fn validate(resolved: &ResolvedPeers) -> Result<(), LitError> {
    if resolved.bootstrap_urls.is_empty() {
        return Err(LitError::InvalidArgument(
            "failed to get bootstrap urls from the network configuration".into(),
        ));
    }
    if resolved.min_node_count == 0 {
        return Err(LitError::InvalidArgument(
            "min node count must be at least 1".into(),
        ));
    }
    if resolved.min_node_count > resolved.bootstrap_urls.len() {
        return Err(LitError::InvalidArgument(format!(
            "min node count {} exceeds the {} bootstrap urls",
            resolved.min_node_count,
            resolved.bootstrap_urls.len()
        )));
    }
    Ok(())
}
