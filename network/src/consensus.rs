//! Per-field majority vote over peer handshake results.

use lit_types::{ConsensusConfig, LitError, PeerHandshakeResult, Timestamp};

/// The most frequent value, ties resolved to the value seen first.
pub fn most_common<T, I>(values: I) -> Option<T>
where
    T: PartialEq,
    I: IntoIterator<Item = T>,
{
    let mut tally: Vec<(T, usize)> = Vec::new();
    for value in values {
        match tally.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => tally.push((value, 1)),
        }
    }

    let mut best: Option<(T, usize)> = None;
    for (value, count) in tally {
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

/// Fold successful peer results into one consensus config.
///
/// Each field is voted on independently in the order given. Blank
/// blockhashes do not vote; without any usable blockhash the fold fails.
pub fn fold_consensus(
    results: &[PeerHandshakeResult],
    now: Timestamp,
) -> Result<ConsensusConfig, LitError> {
    let latest_blockhash = most_common(results.iter().filter_map(|r| r.usable_blockhash()))
        .ok_or_else(|| {
            LitError::InvalidEthBlockhash(format!(
                "none of the {} responding nodes returned a blockhash",
                results.len()
            ))
        })?
        .to_string();

    let field = |f: fn(&PeerHandshakeResult) -> &str| {
        most_common(results.iter().map(f))
            .unwrap_or_default()
            .to_string()
    };

    let hd_root_pubkeys = most_common(results.iter().filter_map(|r| r.hd_root_pubkeys.as_ref()))
        .cloned()
        .unwrap_or_default();

    Ok(ConsensusConfig {
        subnet_pub_key: field(|r| r.subnet_pub_key.as_str()),
        network_pub_key: field(|r| r.network_pub_key.as_str()),
        network_pub_key_set: field(|r| r.network_pub_key_set.as_str()),
        hd_root_pubkeys,
        latest_blockhash,
        last_blockhash_retrieved_at: now,
    })
}
