pub mod address;
pub mod amount;
pub mod api;
pub mod builder;
pub mod draft;
mod encoding;
pub mod error;
pub mod ghost;
pub mod hash;
pub mod idempotency;
pub mod network;
pub mod planner;
pub mod submission;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transaction;
pub mod utxo;

// Core types
pub use address::{ADDRESS_PREFIX, Address, OpaqueKey};
pub use amount::{Amount, Integer, PRECISION};
pub use error::{Error, Result};
pub use hash::{Hash, Key};
pub use network::ApiHost;
pub use transaction::{Input, Output, OutputType, Script, Transaction};

// Construction pipeline
pub use builder::{BuiltTransaction, TransactionBuilder};
pub use draft::{DraftOutput, TransactionDraft};
pub use ghost::{GhostKeyService, GhostKeys, GhostRequest, RetryPolicy, resolve_ghost_keys};
pub use idempotency::{DEFAULT_OPERATION_TAG, request_id, unique_id};
pub use planner::{Payment, plan_outputs};
pub use utxo::{SourceSet, Utxo, UtxoQuery, UtxoSource, select_utxos, validate_utxo_set};

// Submission and HTTP backend
pub use api::SafeApiClient;
pub use submission::{PendingRequest, SubmissionRequest, SubmissionService, submit_transaction};
