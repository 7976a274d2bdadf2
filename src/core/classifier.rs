//! Protocol Classifier
//!
//! Infers what a call will do from its destination, call data and value:
//! 1. Destination lookup in the audited-protocol table
//! 2. Selector registry lookup (action + protocol type)
//! 3. Hop detection: known address of the same type embedded in the call data
//! 4. Operand decode with the action's canonical schema
//! 5. Native fallback when nothing was decoded but value > 0
//!
//! Every step degrades to the unknown sentinel for its own field. Nothing
//! here returns an error or panics.

use alloy_primitives::{Address, U256};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use crate::models::errors::{AppError, AppResult};
use crate::models::types::{Action, ProtocolCallInfo, ProtocolType, TokenRef, TxRequest};
use crate::utils::constants::{ProtocolEntry, KNOWN_PROTOCOLS};
use crate::utils::decoder::{lookup_selector, parse_calldata, references_address, CalldataDecoder};

lazy_static! {
    /// Audited protocol contracts keyed by address
    static ref PROTOCOL_TABLE: HashMap<Address, ProtocolEntry> = KNOWN_PROTOCOLS
        .iter()
        .filter_map(|p| Address::from_str(p.address).ok().map(|a| (a, *p)))
        .collect();
}

/// Stateless classifier over the known-protocol table
#[derive(Debug, Clone, Default)]
pub struct ProtocolClassifier;

impl ProtocolClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a transaction request
    pub fn classify_tx(&self, tx: &TxRequest) -> ProtocolCallInfo {
        self.classify(tx.to.as_deref(), &tx.data, tx.value)
    }

    /// Like [`classify_tx`](Self::classify_tx), but an unresolved call is
    /// reported as `ClassificationAmbiguous`.
    pub fn classify_checked(&self, tx: &TxRequest) -> AppResult<ProtocolCallInfo> {
        let info = self.classify_tx(tx);
        if info.is_resolved() {
            Ok(info)
        } else {
            Err(AppError::classification_ambiguous(format!(
                "Unable to classify call to {}",
                tx.to.as_deref().unwrap_or("<none>")
            )))
        }
    }

    /// Classify raw call parts
    pub fn classify(&self, to: Option<&str>, data: &str, value: U256) -> ProtocolCallInfo {
        let mut info = ProtocolCallInfo::unknown();

        let target = to.and_then(|t| Address::from_str(t.trim()).ok());
        let calldata = parse_calldata(data);
        if calldata.is_none() {
            debug!("🔍 Malformed call data ignored: {} chars", data.len());
        }

        // 1. Destination table
        if let Some(entry) = target.and_then(|a| PROTOCOL_TABLE.get(&a)) {
            info.protocol_name = entry.name.to_string();
            info.protocol_type = entry.protocol_type;
        }

        // 2. Selector registry
        let selector_entry = calldata.as_deref().and_then(lookup_selector);
        if let Some(entry) = selector_entry {
            info.action = entry.action;
            if info.protocol_type == ProtocolType::Unknown {
                info.protocol_type = entry.protocol_type;
            }
        }

        // 3. Hop detection
        if !info.is_protocol_known() && info.protocol_type != ProtocolType::Unknown {
            if let Some(entry) = Self::find_referenced_protocol(data, info.protocol_type) {
                debug!("🔗 Hop detected: call data references {}", entry.name);
                info.protocol_name = entry.name.to_string();
            }
        }

        // 4. Operand decode
        let operand = match (selector_entry, calldata.as_deref()) {
            (Some(entry), Some(bytes)) => CalldataDecoder::decode(entry.schema, bytes, target),
            _ => None,
        };
        let decoded = operand.as_ref().map(|op| op.token.is_some() || op.amount.is_some()).unwrap_or(false);
        if let Some(op) = operand {
            if let Some(token) = op.token {
                info.token = token;
            }
            info.amount = op.amount;
            info.token_out = op.token_out;
            info.recipient = op.recipient;
            info.min_amount_out = op.min_amount_out;
        } else if selector_entry.is_some() {
            debug!("🔍 Arguments for {} did not decode", info.action);
        }

        // 5. Native fallback
        if !decoded && !value.is_zero() {
            info.token = TokenRef::Native;
            info.amount = Some(value);
        }

        debug!(
            "🧭 Classified: protocol={} action={} type={} token={}",
            info.protocol_name,
            info.action,
            info.protocol_type.as_str(),
            info.token
        );
        info
    }

    /// Known protocol of `protocol_type` whose address appears in the call data
    fn find_referenced_protocol(data: &str, protocol_type: ProtocolType) -> Option<&'static ProtocolEntry> {
        KNOWN_PROTOCOLS
            .iter()
            .filter(|p| p.protocol_type == protocol_type)
            .find(|p| {
                Address::from_str(p.address)
                    .map(|a| references_address(data, &a))
                    .unwrap_or(false)
            })
    }

    /// Action for a selector, `Action::Unknown` when not registered
    pub fn action_for(calldata: &str) -> Action {
        parse_calldata(calldata)
            .as_deref()
            .and_then(lookup_selector)
            .map(|e| e.action)
            .unwrap_or(Action::Unknown)
    }
}
