//! Unit composition pipeline.
//!
//! # Stages
//! ```text
//! resolve signer → fetch context → check definition state
//!     → assemble messages → select coins → compute fees
//!     → adjust change → sign → finalize id
//! ```
//!
//! # Invariants
//! - The byte payment message is always first and always carries a change
//!   output back to the paying address
//! - Commissions are measured on a draft whose placeholder fields have the
//!   same lengths as their final values
//! - `payload_hash` of a mutated message is recomputed after the mutation
//! - `unit` is computed last

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::OnceCell;

use crate::address::{address_of, is_valid_address, Address, Definition};
use crate::compose::ledger::{CoinSelector, LedgerContext};
use crate::compose::types::{
    sort_outputs, Auth, Author, CoinRequest, CoinSelection, ComposeError, ComposeResult,
    DefinitionInfo, Message, Output, PaymentPayload, Unit,
};
use crate::config::ComposerConfig;
use crate::hashing::{
    get_length, headers_size, total_payload_size, unit_id, unit_signable_hash, ProtocolVersion,
};
use crate::observability::metrics;
use crate::signing::Signer;

/// Length of a base64 secp256k1 signature.
pub const SIGNATURE_PLACEHOLDER_LEN: usize = 88;

const PAYMENT_APP: &str = "payment";
const BASE_ASSET: &str = "base";

/// Composes signed units from ledger context and selected coins.
pub struct UnitComposer<L, C> {
    ledger: L,
    coins: C,
    config: ComposerConfig,
    witnesses: OnceCell<Vec<String>>,
}

impl<L: LedgerContext, C: CoinSelector> UnitComposer<L, C> {
    pub fn new(ledger: L, coins: C, config: ComposerConfig) -> Self {
        Self {
            ledger,
            coins,
            config,
            witnesses: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn coins(&self) -> &C {
        &self.coins
    }

    /// Witness list, fetched once. Concurrent first callers share one fetch.
    pub async fn witnesses(&self) -> ComposeResult<&[String]> {
        self.witnesses
            .get_or_try_init(|| self.ledger.witnesses())
            .await
            .map(Vec::as_slice)
    }

    /// Compose and sign a unit carrying `payload` under `app`.
    ///
    /// `app == "payment"` takes `{outputs, asset?}` and produces payment
    /// messages only. Any other app is carried as its own message after the
    /// byte payment that funds the unit.
    pub async fn compose(&self, app: &str, payload: Value, auth: &Auth) -> ComposeResult<Unit> {
        let version = self.config.version;
        let signer = ResolvedSigner::resolve(auth)?;
        let plan = Plan::new(app, payload, version)?;

        let witnesses = self.witnesses().await?;
        let (props, definition_info) = tokio::join!(
            self.ledger.light_props(witnesses),
            self.ledger.definition_info(signer.address.as_str()),
        );
        let (props, definition_info) = (props?, definition_info?);

        let definition = signer.check_definition_state(&definition_info)?;

        let byte_target = plan
            .byte_total()?
            .checked_add(self.config.fee_allowance)
            .and_then(|total| total.checked_add(plan.payload_estimate(version)))
            .ok_or_else(overflow)?;
        let bytes = self.select(&signer.address, byte_target, None).await?;
        let asset_payment = match &plan.asset {
            Some(transfer) => {
                let coins = self
                    .select(&signer.address, transfer.total()?, Some(&transfer.asset))
                    .await?;
                Some(transfer.message(coins, &signer.address, version)?)
            }
            None => None,
        };

        // Change amount is fixed below; its length does not depend on the value.
        let byte_payment = BytePayment::new(&plan.byte_outputs, bytes, &signer.address);
        let mut messages = vec![byte_payment.message(0, version)?];
        messages.extend(plan.app_message);
        messages.extend(asset_payment);

        let mut authentifiers = BTreeMap::new();
        authentifiers.insert(signer.path.clone(), "-".repeat(SIGNATURE_PLACEHOLDER_LEN));
        let mut unit = Unit {
            version: self.config.version_string(),
            alt: self.config.alt.clone(),
            messages,
            authors: vec![Author {
                address: signer.address.to_string(),
                authentifiers,
                definition,
            }],
            parent_units: props.parent_units,
            last_ball: props.last_stable_mc_ball,
            last_ball_unit: props.last_stable_mc_ball_unit,
            witness_list_unit: props.witness_list_unit,
            headers_commission: None,
            payload_commission: None,
            timestamp: version.has_timestamp().then(unix_timestamp),
            unit: None,
        };

        let draft = unit.to_map()?;
        let headers_commission = headers_size(&draft, version)? as u64;
        let payload_commission = total_payload_size(&draft, version)? as u64;

        let commissions = headers_commission
            .checked_add(payload_commission)
            .ok_or_else(overflow)?;
        let change = byte_payment.change(commissions)?;
        unit.messages[0] = byte_payment.message(change, version)?;
        unit.headers_commission = Some(headers_commission);
        unit.payload_commission = Some(payload_commission);

        let signable = unit_signable_hash(&unit.to_map()?, version)?;
        let signature = signer.signer.sign_hash(&signable)?;
        unit.authors[0]
            .authentifiers
            .insert(signer.path.clone(), signature);

        let id = unit_id(&unit.to_map()?, version)?;
        unit.unit = Some(id.clone());

        metrics::record_unit_composed(app);
        tracing::info!(
            unit = %id,
            address = %signer.address,
            app,
            headers_commission,
            payload_commission,
            change,
            "Unit composed"
        );

        Ok(unit)
    }

    async fn select(
        &self,
        address: &Address,
        amount: u64,
        asset: Option<&str>,
    ) -> ComposeResult<CoinSelection> {
        let request = CoinRequest {
            addresses: vec![address.to_string()],
            last_ball_mci: self.config.last_ball_mci,
            amount,
            spend_unconfirmed: self.config.spend_unconfirmed.clone(),
            asset: asset.map(str::to_string),
        };
        tracing::debug!(address = %address, amount, asset, "Selecting coins");

        let selection = self.coins.pick_coins(&request).await?;
        if selection.inputs.is_empty() {
            return Err(ComposeError::InsufficientFunds(format!(
                "no inputs cover {} of {}",
                amount,
                asset.unwrap_or(BASE_ASSET)
            )));
        }
        Ok(selection)
    }
}

/// Signing identity for one compose call.
struct ResolvedSigner {
    signer: Signer,
    address: Address,
    /// Definition to reveal if the ledger has none. `None` for an address
    /// override without a definition.
    definition: Option<Definition>,
    /// Whether the caller supplied `definition`.
    explicit_definition: bool,
    path: String,
}

impl ResolvedSigner {
    fn resolve(auth: &Auth) -> ComposeResult<Self> {
        if auth.path.is_empty() {
            return Err(ComposeError::Validation("signing path is empty".into()));
        }
        let signer = Signer::from_bytes(&auth.private_key)?;
        let (address, definition) = match (&auth.address, &auth.definition) {
            (Some(address), definition) => (address.clone(), definition.clone()),
            (None, Some(definition)) => (address_of(definition)?, Some(definition.clone())),
            (None, None) => (signer.address().clone(), Some(signer.definition().clone())),
        };
        Ok(Self {
            signer,
            address,
            definition,
            explicit_definition: auth.definition.is_some(),
            path: auth.path.clone(),
        })
    }

    /// The definition to reveal in this unit, if any.
    fn check_definition_state(&self, info: &DefinitionInfo) -> ComposeResult<Option<Definition>> {
        if !info.is_stable {
            return Err(ComposeError::DefinitionNotStable {
                address: self.address.to_string(),
            });
        }
        if let (Some(recorded), Some(definition), true) = (
            &info.definition_chash,
            &self.definition,
            self.explicit_definition,
        ) {
            let derived = address_of(definition)?;
            if derived.as_str() != recorded {
                return Err(ComposeError::DefinitionMismatch {
                    expected: recorded.clone(),
                    actual: derived.to_string(),
                });
            }
        }
        if info.definition.is_some() {
            return Ok(None);
        }
        match &self.definition {
            Some(definition) => Ok(Some(definition.clone())),
            None => Err(ComposeError::Validation(format!(
                "definition of {} is not revealed on the ledger and none was supplied",
                self.address
            ))),
        }
    }
}

/// Requested messages, before funding.
struct Plan {
    byte_outputs: Vec<Output>,
    app_message: Option<Message>,
    asset: Option<AssetTransfer>,
}

#[derive(Deserialize)]
struct PaymentRequest {
    #[serde(default)]
    asset: Option<String>,
    outputs: Vec<Output>,
}

impl Plan {
    fn new(app: &str, payload: Value, version: ProtocolVersion) -> ComposeResult<Self> {
        if app.is_empty() {
            return Err(ComposeError::Validation("app is empty".into()));
        }
        if app != PAYMENT_APP {
            return Ok(Self {
                byte_outputs: Vec::new(),
                app_message: Some(Message::inline(app, payload, version)?),
                asset: None,
            });
        }

        let request: PaymentRequest = serde_json::from_value(payload)
            .map_err(|e| ComposeError::Validation(format!("payment request: {}", e)))?;
        if request.outputs.is_empty() {
            return Err(ComposeError::Validation("payment has no outputs".into()));
        }
        for output in &request.outputs {
            if !is_valid_address(&output.address) {
                return Err(ComposeError::Validation(format!(
                    "invalid output address {}",
                    output.address
                )));
            }
            if output.amount == 0 {
                return Err(ComposeError::Validation(format!(
                    "zero amount to {}",
                    output.address
                )));
            }
        }

        checked_total(&request.outputs)?;

        match request.asset {
            Some(asset) if asset != BASE_ASSET => Ok(Self {
                byte_outputs: Vec::new(),
                app_message: None,
                asset: Some(AssetTransfer {
                    asset,
                    outputs: request.outputs,
                }),
            }),
            _ => Ok(Self {
                byte_outputs: request.outputs,
                app_message: None,
                asset: None,
            }),
        }
    }

    fn byte_total(&self) -> ComposeResult<u64> {
        checked_total(&self.byte_outputs)
    }

    /// Rough size of everything but the byte payment, added to the byte target.
    fn payload_estimate(&self, version: ProtocolVersion) -> u64 {
        let with_keys = version.length_rule().with_keys();
        let app = self
            .app_message
            .as_ref()
            .map_or(0, |message| get_length(&message.payload, with_keys));
        let asset = self.asset.as_ref().map_or(0, |transfer| {
            serde_json::to_value(&transfer.outputs)
                .map_or(0, |outputs| get_length(&outputs, with_keys))
        });
        (app + asset) as u64
    }
}

struct AssetTransfer {
    asset: String,
    outputs: Vec<Output>,
}

impl AssetTransfer {
    fn total(&self) -> ComposeResult<u64> {
        checked_total(&self.outputs)
    }

    fn message(
        &self,
        coins: CoinSelection,
        change_address: &Address,
        version: ProtocolVersion,
    ) -> ComposeResult<Message> {
        let requested = self.total()?;
        if coins.total_amount < requested {
            return Err(ComposeError::InsufficientFunds(format!(
                "{} of {} available, {} requested",
                coins.total_amount, self.asset, requested
            )));
        }
        let mut outputs = self.outputs.clone();
        let change = coins.total_amount - requested;
        if change > 0 {
            outputs.push(Output::new(change_address.as_str(), change));
        }
        sort_outputs(&mut outputs);
        Message::payment(
            &PaymentPayload {
                asset: Some(self.asset.clone()),
                inputs: coins.inputs,
                outputs,
            },
            version,
        )
    }
}

/// The leading byte payment and its change output.
struct BytePayment {
    inputs: Vec<Value>,
    total: u64,
    requested: Vec<Output>,
    change_address: String,
}

impl BytePayment {
    fn new(requested: &[Output], coins: CoinSelection, change_address: &Address) -> Self {
        Self {
            inputs: coins.inputs,
            total: coins.total_amount,
            requested: requested.to_vec(),
            change_address: change_address.to_string(),
        }
    }

    fn message(&self, change: u64, version: ProtocolVersion) -> ComposeResult<Message> {
        let mut outputs = self.requested.clone();
        outputs.push(Output::new(self.change_address.clone(), change));
        sort_outputs(&mut outputs);
        Message::payment(
            &PaymentPayload {
                asset: None,
                inputs: self.inputs.clone(),
                outputs,
            },
            version,
        )
    }

    /// Change left after requested outputs and `commissions`.
    fn change(&self, commissions: u64) -> ComposeResult<u64> {
        let spent = checked_total(&self.requested)?
            .checked_add(commissions)
            .ok_or_else(overflow)?;
        match self.total.checked_sub(spent) {
            Some(change) if change > 0 => Ok(change),
            _ => Err(ComposeError::InsufficientFunds(format!(
                "{} bytes available, {} needed",
                self.total, spent
            ))),
        }
    }
}

fn checked_total(outputs: &[Output]) -> ComposeResult<u64> {
    outputs
        .iter()
        .try_fold(0u64, |total, output| total.checked_add(output.amount))
        .ok_or_else(overflow)
}

fn overflow() -> ComposeError {
    ComposeError::Validation("amount overflows".into())
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| ((elapsed.as_millis() + 500) / 1000) as u64)
        .unwrap_or_default()
}
