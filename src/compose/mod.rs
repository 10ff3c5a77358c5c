//! Unit composition subsystem.
//!
//! # Data Flow
//! ```text
//! (app, payload, Auth)
//!     → composer.rs (pipeline)
//!         ← ledger.rs LedgerContext (witnesses, parents, definition state)
//!         ← ledger.rs CoinSelector (inputs)
//!         → hashing (commissions, payload hashes, unit id)
//!         → signing (authentifier)
//!     → signed Unit
//! ```
//!
//! # Design Decisions
//! - Ledger reads go through traits so the pipeline runs against fakes
//! - Composition never submits; broadcasting is a separate call

pub mod composer;
pub mod ledger;
pub mod types;

pub use composer::{UnitComposer, SIGNATURE_PLACEHOLDER_LEN};
pub use ledger::{CoinSelector, LedgerContext};
pub use types::{
    sort_outputs, Auth, Author, CoinRequest, CoinSelection, ComposeError, ComposeResult,
    DefinitionInfo, LightProps, Message, Output, PaymentPayload, Unit,
};
