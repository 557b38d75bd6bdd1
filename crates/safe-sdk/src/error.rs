use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no UTXOs supplied")]
    EmptyUtxoSet,

    #[error("UTXO {index} is locked to {found}, expected {expected}")]
    InconsistentSourceAddress {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("insufficient funds: outputs require {required}, inputs hold {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("amount not representable at ledger precision: {0}")]
    AmountPrecisionOverflow(String),

    #[error("ghost key service error: {reason}")]
    GhostKeyService { reason: String, transient: bool },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("UTXO {index} spends a different asset than UTXO 0")]
    MixedAssets { index: usize },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("too many inputs: {0} (limit 256)")]
    TooManyInputs(usize),

    #[error("too many outputs: {0} (limit 256)")]
    TooManyOutputs(usize),

    #[error("extra is {0} bytes (limit 256)")]
    ExtraTooLong(usize),

    #[error("UTXO lookup failed: {reason}")]
    UtxoLookup { reason: String, transient: bool },

    #[error("submission failed: {reason}")]
    Submission { reason: String, transient: bool },

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl Error {
    /// Whether the caller may retry the same request unchanged.
    ///
    /// Structural failures need corrected input; only transport-level
    /// failures of the external services qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::GhostKeyService { transient, .. }
            | Error::UtxoLookup { transient, .. }
            | Error::Submission { transient, .. } => *transient,
            _ => false,
        }
    }

    pub(crate) fn ghost(reason: impl Into<String>, transient: bool) -> Self {
        Error::GhostKeyService {
            reason: reason.into(),
            transient,
        }
    }

    pub(crate) fn lookup(reason: impl Into<String>, transient: bool) -> Self {
        Error::UtxoLookup {
            reason: reason.into(),
            transient,
        }
    }

    pub(crate) fn submission(reason: impl Into<String>, transient: bool) -> Self {
        Error::Submission {
            reason: reason.into(),
            transient,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
