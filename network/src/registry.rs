//! Validator registry backed by the staking contract over JSON-RPC.
//!
//! The active validator set is read with a single `eth_call` to
//! `getActiveUnkickedValidatorStructsAndCounts()`. `StateChanged` events
//! are turned into a broadcast stream by polling `eth_getLogs` while
//! anyone is listening.

use async_trait::async_trait;
use lit_types::{
    ChainResolvedProfile, ContractContext, LitError, LitNetwork, StakingState, Timestamp,
    ValidatorSnapshot,
};
use serde_json::{json, Value};
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{rpc, ValidatorRegistry};

/// Staking contract of the `datil` network.
pub const DATIL_STAKING_ADDRESS: &str = "0x21d636d95eE71150c0c3Ffa79268c989a329d1CE";

/// Topic of `StateChanged(uint8)`.
pub const STATE_CHANGED_TOPIC: &str =
    "0x551dc40198cc79684bb69e4931dba4ac16e4598792ee1c0a5000aeea366d7bb6";

/// `getActiveUnkickedValidatorStructsAndCounts()`
const GET_ACTIVE_VALIDATORS: &str = "0xc51d020e";
/// `STAKING_CONTRACT()` on the contract resolver.
const STAKING_CONTRACT_KEY: &str = "0xda19ddfb";
/// `getContract(bytes32,uint8)` on the contract resolver.
const GET_CONTRACT: &str = "0x8e8dfd16";

const WORD: usize = 32;
const EPOCH_WORDS: usize = 5;
const VALIDATOR_WORDS: usize = 7;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Reads the validator registry from the chain named by the profile's
/// `rpc_url`.
///
/// The staking contract is taken from the contract context (directly or
/// through its contract resolver), falling back to the known `datil`
/// deployment.
pub struct RpcValidatorRegistry {
    reader: StakingReader,
    profile: ChainResolvedProfile,
    context: Option<ContractContext>,
    events: broadcast::Sender<StakingState>,
    poll_interval: Duration,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl RpcValidatorRegistry {
    pub fn new(profile: ChainResolvedProfile, context: Option<ContractContext>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        let (events, _) = broadcast::channel(16);
        Self {
            reader: StakingReader { http },
            profile,
            context,
            events,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poller: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn ensure_poller(&self) -> bool {
        let mut poller = self.poller.lock().unwrap_or_else(|e| e.into_inner());
        if poller.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return true;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return false;
        };

        let watcher = LogWatcher {
            reader: self.reader.clone(),
            profile: self.profile.clone(),
            context: self.context.clone(),
            events: self.events.clone(),
            interval: self.poll_interval,
        };
        *poller = Some(runtime.spawn(watcher.run()));
        tracing::debug!(rpc_url = %self.profile.rpc_url, "polling staking state changes");
        true
    }
}

impl Drop for RpcValidatorRegistry {
    fn drop(&mut self) {
        let poller = self.poller.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = poller.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl ValidatorRegistry for RpcValidatorRegistry {
    async fn connection_info(
        &self,
        profile: &ChainResolvedProfile,
        context: Option<&ContractContext>,
    ) -> Result<ValidatorSnapshot, LitError> {
        self.reader.active_validators(profile, context).await
    }

    async fn current_epoch(
        &self,
        profile: &ChainResolvedProfile,
        context: Option<&ContractContext>,
    ) -> Result<u64, LitError> {
        Ok(self
            .reader
            .active_validators(profile, context)
            .await?
            .epoch_number)
    }

    fn state_changes(&self) -> Option<broadcast::Receiver<StakingState>> {
        let receiver = self.events.subscribe();
        self.ensure_poller().then_some(receiver)
    }
}

#[derive(Clone)]
struct StakingReader {
    http: reqwest::Client,
}

impl StakingReader {
    async fn eth_call(&self, rpc_url: &str, to: &str, data: String) -> Result<Vec<u8>, LitError> {
        let result = rpc::call(
            &self.http,
            rpc_url,
            "eth_call",
            json!([{ "to": to, "data": data }, "latest"]),
        )
        .await?;
        let encoded = result.as_str().ok_or_else(|| {
            LitError::network(rpc_url, format!("eth_call: unexpected result {result}"))
        })?;
        hex::decode(encoded.trim_start_matches("0x"))
            .map_err(|e| LitError::network(rpc_url, format!("eth_call: {e}")))
    }

    async fn staking_address(
        &self,
        profile: &ChainResolvedProfile,
        context: Option<&ContractContext>,
    ) -> Result<String, LitError> {
        if let Some(address) = context.and_then(|c| c.staking_address.as_ref()) {
            return Ok(address.clone());
        }
        if let Some(ctx) = context {
            if let Some(resolver) = &ctx.resolver_address {
                return self.resolve_staking(&profile.rpc_url, resolver, ctx.environment).await;
            }
        }
        match profile.network {
            LitNetwork::Datil => Ok(DATIL_STAKING_ADDRESS.to_string()),
            network => Err(LitError::InvalidArgument(format!(
                "network {network} has no known staking contract; set contract_context.staking_address or resolver_address"
            ))),
        }
    }

    async fn resolve_staking(
        &self,
        rpc_url: &str,
        resolver: &str,
        environment: u8,
    ) -> Result<String, LitError> {
        let key = self
            .eth_call(rpc_url, resolver, STAKING_CONTRACT_KEY.to_string())
            .await?;
        let key = word(&key, 0).map_err(|e| invalid_return(resolver, e))?;
        let data = format!(
            "{GET_CONTRACT}{}{}",
            hex::encode(key),
            hex::encode(uint_word(u64::from(environment)))
        );
        let output = self.eth_call(rpc_url, resolver, data).await?;
        let address = address_at(&output, 0).map_err(|e| invalid_return(resolver, e))?;
        if address.trim_start_matches("0x").bytes().all(|b| b == b'0') {
            return Err(LitError::InvalidArgument(format!(
                "contract resolver {resolver} has no staking contract for environment {environment}"
            )));
        }
        Ok(address)
    }

    async fn active_validators(
        &self,
        profile: &ChainResolvedProfile,
        context: Option<&ContractContext>,
    ) -> Result<ValidatorSnapshot, LitError> {
        let staking = self.staking_address(profile, context).await?;
        let output = self
            .eth_call(&profile.rpc_url, &staking, GET_ACTIVE_VALIDATORS.to_string())
            .await?;
        let snapshot =
            decode_active_validators(&output).map_err(|e| invalid_return(&staking, e))?;
        tracing::debug!(
            staking = %staking,
            validators = snapshot.bootstrap_urls.len(),
            min_node_count = snapshot.min_node_count,
            epoch = snapshot.epoch_number,
            "read active validator set"
        );
        Ok(snapshot)
    }
}

struct LogWatcher {
    reader: StakingReader,
    profile: ChainResolvedProfile,
    context: Option<ContractContext>,
    events: broadcast::Sender<StakingState>,
    interval: Duration,
}

impl LogWatcher {
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut staking: Option<String> = None;
        let mut cursor: Option<u64> = None;

        loop {
            ticker.tick().await;
            if self.events.receiver_count() == 0 {
                // Nobody listens; resume from the head when someone does.
                cursor = None;
                continue;
            }
            match self.poll(&mut staking, cursor).await {
                Ok(head) => cursor = Some(head),
                Err(e) => tracing::warn!(error = %e, "polling staking state changes failed"),
            }
        }
    }

    /// Forward the events in the blocks after `cursor`. Returns the block
    /// polled up to.
    async fn poll(&self, staking: &mut Option<String>, cursor: Option<u64>) -> Result<u64, LitError> {
        let address = match staking {
            Some(address) => address.clone(),
            None => {
                let address = self
                    .reader
                    .staking_address(&self.profile, self.context.as_ref())
                    .await?;
                *staking = Some(address.clone());
                address
            }
        };

        let rpc_url = &self.profile.rpc_url;
        let head = rpc::block_number(&self.reader.http, rpc_url).await?;
        let Some(last) = cursor else {
            return Ok(head);
        };
        if head <= last {
            return Ok(last);
        }

        let logs = rpc::call(
            &self.reader.http,
            rpc_url,
            "eth_getLogs",
            json!([{
                "address": address,
                "topics": [STATE_CHANGED_TOPIC],
                "fromBlock": format!("0x{:x}", last + 1),
                "toBlock": format!("0x{head:x}"),
            }]),
        )
        .await?;
        for state in decode_state_changes(&logs) {
            tracing::debug!(?state, "staking state changed");
            let _ = self.events.send(state);
        }
        Ok(head)
    }
}

fn invalid_return(contract: &str, reason: String) -> LitError {
    LitError::UnknownError(format!("invalid return data from {contract}: {reason}"))
}

fn decode_state_changes(logs: &Value) -> Vec<StakingState> {
    let Some(logs) = logs.as_array() else {
        tracing::warn!(%logs, "eth_getLogs did not return a list");
        return Vec::new();
    };
    logs.iter()
        .filter_map(|log| {
            let data = log.get("data").and_then(Value::as_str)?;
            let decoded = hex::decode(data.trim_start_matches("0x"))
                .map_err(|e| e.to_string())
                .and_then(|bytes| uint_at(&bytes, 0))
                .and_then(|code| u8::try_from(code).map_err(|e| e.to_string()))
                .and_then(|code| StakingState::try_from(code).map_err(|e| e.to_string()));
            match decoded {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::warn!(error = %e, data, "skipping undecodable StateChanged log");
                    None
                }
            }
        })
        .collect()
}

/// Decode `(Epoch, uint256 minNodeCount, Validator[])`.
fn decode_active_validators(data: &[u8]) -> Result<ValidatorSnapshot, String> {
    let epoch_length = uint_at(data, 0)?;
    let epoch_number = uint_at(data, 1)?;
    let end_time = uint_at(data, 2)?;
    let min_node_count = uint_at(data, EPOCH_WORDS)?;
    let offset = uint_at(data, EPOCH_WORDS + 1)? as usize;
    if offset % WORD != 0 {
        return Err(format!("misaligned validator list offset {offset}"));
    }

    let base = offset / WORD;
    let count = uint_at(data, base)? as usize;
    let needed = count
        .checked_mul(VALIDATOR_WORDS)
        .and_then(|words| words.checked_add(base + 1))
        .and_then(|words| words.checked_mul(WORD))
        .ok_or_else(|| format!("validator count {count} is out of range"))?;
    if data.len() < needed {
        return Err(format!(
            "{count} validators need {needed} bytes, got {}",
            data.len()
        ));
    }

    let mut bootstrap_urls = Vec::with_capacity(count);
    for i in 0..count {
        let at = base + 1 + i * VALIDATOR_WORDS;
        let ip = u32::try_from(uint_at(data, at)?).map_err(|e| e.to_string())?;
        let port = u32::try_from(uint_at(data, at + 2)?).map_err(|e| e.to_string())?;
        bootstrap_urls.push(validator_url(ip, port));
    }

    Ok(ValidatorSnapshot {
        min_node_count: usize::try_from(min_node_count).map_err(|e| e.to_string())?,
        bootstrap_urls,
        epoch_number,
        epoch_start_time: end_time
            .checked_sub(epoch_length)
            .map(Timestamp::from_secs),
    })
}

/// Ports 443 and 8469-8480 serve TLS; anything else is plain HTTP.
fn validator_url(ip: u32, port: u32) -> String {
    let scheme = if port == 443 || (8469..=8480).contains(&port) {
        "https"
    } else {
        "http"
    };
    format!("{scheme}://{}:{port}", Ipv4Addr::from(ip))
}

fn word(data: &[u8], index: usize) -> Result<&[u8], String> {
    let start = index
        .checked_mul(WORD)
        .ok_or_else(|| format!("word {index} is out of range"))?;
    data.get(start..start + WORD)
        .ok_or_else(|| format!("word {index} is past the end of {} bytes", data.len()))
}

fn uint_at(data: &[u8], index: usize) -> Result<u64, String> {
    let word = word(data, index)?;
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|b| *b != 0) {
        return Err(format!("word {index} does not fit in 64 bits"));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(low);
    Ok(u64::from_be_bytes(bytes))
}

fn address_at(data: &[u8], index: usize) -> Result<String, String> {
    let word = word(data, index)?;
    Ok(format!("0x{}", hex::encode(&word[WORD - 20..])))
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}
