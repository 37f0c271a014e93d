/// Errors produced on the ledger write path.
///
/// None of these escape [`LedgerClient::submit`](crate::LedgerClient::submit)
/// as `Err`; they are folded into a [`LedgerWriteResult`](crate::LedgerWriteResult).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid ledger configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot encode ledger call: {0}")]
    Encoding(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("ledger rejected call with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed ledger response: {0}")]
    Response(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
