//! Binary layout of ledger transactions, as packed for `push_transaction` and signed by
//! every authorizing key.

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

const NAME_CHARSET: &[u8] = b".12345abcdefghijklmnopqrstuvwxyz";
const MAX_NAME_LEN: usize = 13;

fn char_to_symbol(c: u8) -> Option<u64> {
    NAME_CHARSET
        .iter()
        .position(|&s| s == c)
        .map(|p| p as u64)
}

/// Encode an account, action or permission name into its 64 bit form.
/// Names are up to 12 characters of `.1-5a-z`, with an optional 13th character of `.1-5a-j`.
pub fn name_to_u64(name: &str) -> Result<u64, LedgerError> {
    let bytes = name.as_bytes();
    if bytes.len() > MAX_NAME_LEN {
        return Err(LedgerError::InvalidName(name.to_string()));
    }

    let mut value = 0u64;
    for (i, &c) in bytes.iter().enumerate() {
        let symbol = char_to_symbol(c).ok_or_else(|| LedgerError::InvalidName(name.to_string()))?;
        if i < 12 {
            value |= (symbol & 0x1f) << (64 - 5 * (i + 1));
        } else {
            if symbol > 0x0f {
                return Err(LedgerError::InvalidName(name.to_string()));
            }
            value |= symbol;
        }
    }
    Ok(value)
}

/// Append `value` as an unsigned LEB128 varint
pub fn push_varuint32(buf: &mut Vec<u8>, mut value: u32) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Parse the `timestamp` of a block, `2024-03-01T12:00:00.500`, into seconds since the epoch
pub fn block_time(timestamp: &str) -> Result<u32, LedgerError> {
    let time = NaiveDateTime::parse_from_str(timestamp.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|_| LedgerError::Timestamp(timestamp.to_string()))?;
    u32::try_from(time.and_utc().timestamp())
        .map_err(|_| LedgerError::Timestamp(timestamp.to_string()))
}

/// The reference block prefix, the second 32 bit little endian word of the block id after the block number
pub fn ref_block_prefix(block_id: &str) -> Result<u32, LedgerError> {
    let id = hex::decode(block_id)?;
    let word: [u8; 4] = id
        .get(8..12)
        .and_then(|w| w.try_into().ok())
        .ok_or_else(|| LedgerError::Transport(format!("block id `{block_id}` is too short")))?;
    Ok(u32::from_le_bytes(word))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionHeader {
    pub expiration: u32,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    pub max_net_usage_words: u32,
    pub max_cpu_usage_ms: u8,
    pub delay_sec: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedAction {
    pub account: u64,
    pub name: u64,
    /// `(actor, permission)` pairs
    pub authorization: Vec<(u64, u64)>,
    /// ABI encoded action arguments
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub header: TransactionHeader,
    pub actions: Vec<PackedAction>,
}

impl Transaction {
    /// Serialize in the ledger's binary layout, with no context free actions or extensions
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let h = &self.header;
        buf.extend_from_slice(&h.expiration.to_le_bytes());
        buf.extend_from_slice(&h.ref_block_num.to_le_bytes());
        buf.extend_from_slice(&h.ref_block_prefix.to_le_bytes());
        push_varuint32(&mut buf, h.max_net_usage_words);
        buf.push(h.max_cpu_usage_ms);
        push_varuint32(&mut buf, h.delay_sec);

        // context free actions
        push_varuint32(&mut buf, 0);
        push_varuint32(&mut buf, self.actions.len() as u32);
        for action in &self.actions {
            buf.extend_from_slice(&action.account.to_le_bytes());
            buf.extend_from_slice(&action.name.to_le_bytes());
            push_varuint32(&mut buf, action.authorization.len() as u32);
            for (actor, permission) in &action.authorization {
                buf.extend_from_slice(&actor.to_le_bytes());
                buf.extend_from_slice(&permission.to_le_bytes());
            }
            push_varuint32(&mut buf, action.data.len() as u32);
            buf.extend_from_slice(&action.data);
        }
        // transaction extensions
        push_varuint32(&mut buf, 0);
        buf
    }
}

/// Digest every authorizing key signs, `sha256(chain_id ‖ packed_trx ‖ context_free_data_digest)`.
/// Without context free data the trailing digest is 32 zero bytes.
pub fn signing_digest(chain_id: &[u8; 32], packed_trx: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(chain_id);
    hasher.update(packed_trx);
    hasher.update([0u8; 32]);
    hasher.finalize().into()
}
