use prov_types::{BatchId, Digest};
use serde::Serialize;

use crate::error::{LedgerError, LedgerResult};

/// Largest accepted text argument, in bytes.
pub const MAX_ARG_BYTES: usize = 2 * 1024 * 1024;

/// A ledger method invocation with text arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerCall {
    method: String,
    args: Vec<String>,
}

impl LedgerCall {
    pub fn new(method: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// `anchor_root(root_hex, batch_id)`
    pub fn anchor_root(root: &Digest, batch_id: &BatchId) -> Self {
        Self::new("anchor_root", vec![root.to_hex(), batch_id.as_str().to_string()])
    }

    /// `set_pubkey(public_pem)`
    pub fn set_pubkey(public_pem: &str) -> Self {
        Self::new("set_pubkey", vec![public_pem.to_string()])
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Encode into the ledger wire format: `{"method": M, "args": [..]}`.
    pub fn encode(&self) -> LedgerResult<EncodedCall> {
        if !is_identifier(&self.method) {
            return Err(LedgerError::Encoding(format!(
                "method name {:?} is not an identifier",
                self.method
            )));
        }
        if let Some((i, arg)) = self
            .args
            .iter()
            .enumerate()
            .find(|(_, a)| a.len() > MAX_ARG_BYTES)
        {
            return Err(LedgerError::Encoding(format!(
                "argument {i} is {} bytes, limit is {MAX_ARG_BYTES}",
                arg.len()
            )));
        }

        #[derive(Serialize)]
        struct Wire<'a> {
            method: &'a str,
            args: &'a [String],
        }

        let body = serde_json::to_vec(&Wire {
            method: &self.method,
            args: &self.args,
        })
        .map_err(|e| LedgerError::Encoding(e.to_string()))?;

        Ok(EncodedCall {
            method: self.method.clone(),
            body,
        })
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A call already in wire form, ready to be sent any number of times.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedCall {
    method: String,
    body: Vec<u8>,
}

impl EncodedCall {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// JSON request body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}
