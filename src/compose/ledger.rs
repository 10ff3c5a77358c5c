//! Collaborators the composer reads ledger state through.
//!
//! The composer never talks to a node directly. `api::NodeRpc` implements
//! both traits over the transport; tests substitute in-memory fakes.

use async_trait::async_trait;

use crate::compose::types::{CoinRequest, CoinSelection, ComposeResult, DefinitionInfo, LightProps};

/// Ledger context needed to anchor a new unit.
#[async_trait]
pub trait LedgerContext: Send + Sync {
    /// Current witness list.
    async fn witnesses(&self) -> ComposeResult<Vec<String>>;

    /// Parents, last stable ball and witness list unit for the given witnesses.
    async fn light_props(&self, witnesses: &[String]) -> ComposeResult<LightProps>;

    /// Definition status of `address`.
    async fn definition_info(&self, address: &str) -> ComposeResult<DefinitionInfo>;
}

/// Spendable input selection.
#[async_trait]
pub trait CoinSelector: Send + Sync {
    /// Inputs covering `request.amount`. Fails with `InsufficientFunds` when
    /// no covering set exists.
    async fn pick_coins(&self, request: &CoinRequest) -> ComposeResult<CoinSelection>;
}
