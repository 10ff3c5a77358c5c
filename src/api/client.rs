//! Node client facade.
//!
//! # Responsibilities
//! - Typed wrappers over the method catalog
//! - Ledger collaborators for the composer, backed by the transport
//! - Compose, broadcast and the per-app shortcuts

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::api::methods::Method;
use crate::compose::{
    Auth, CoinRequest, CoinSelection, CoinSelector, ComposeError, ComposeResult, DefinitionInfo,
    LedgerContext, LightProps, Output, Unit, UnitComposer,
};
use crate::config::{ClientConfig, ComposerConfig};
use crate::observability::metrics;
use crate::transport::{ConnectionState, TransportClient, TransportResult};

/// Error code the node uses when no input set covers the amount.
pub const NOT_ENOUGH_FUNDS: &str = "NOT_ENOUGH_FUNDS";

/// Method-level access to one node connection.
#[derive(Clone)]
pub struct NodeRpc {
    transport: TransportClient,
}

impl NodeRpc {
    pub fn new(transport: TransportClient) -> Self {
        Self { transport }
    }

    /// Raw command call for methods outside the catalog.
    pub async fn call(&self, command: &str, params: Option<Value>) -> TransportResult<Value> {
        self.transport.request(command, params).await
    }

    pub async fn invoke(&self, method: Method, params: Option<Value>) -> TransportResult<Value> {
        let params = if method.takes_params() { params } else { None };
        self.call(method.name(), params).await
    }

    async fn invoke_as<T: DeserializeOwned>(
        &self,
        method: Method,
        params: Option<Value>,
    ) -> ComposeResult<T> {
        let response = self.invoke(method, params).await?;
        serde_json::from_value(response).map_err(|e| ComposeError::UnexpectedResponse {
            command: method.name().to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl LedgerContext for NodeRpc {
    async fn witnesses(&self) -> ComposeResult<Vec<String>> {
        self.invoke_as(Method::GetWitnesses, None).await
    }

    async fn light_props(&self, witnesses: &[String]) -> ComposeResult<LightProps> {
        self.invoke_as(
            Method::GetParentsAndLastBallAndWitnessListUnit,
            Some(json!({ "witnesses": witnesses })),
        )
        .await
    }

    async fn definition_info(&self, address: &str) -> ComposeResult<DefinitionInfo> {
        self.invoke_as(Method::GetDefinitionForAddress, Some(json!({ "address": address })))
            .await
    }
}

#[derive(Deserialize)]
struct PickedCoins {
    #[serde(default)]
    inputs_with_proofs: Vec<InputWithProof>,
    #[serde(default)]
    total_amount: u64,
}

#[derive(Deserialize)]
struct InputWithProof {
    input: Value,
}

#[async_trait]
impl CoinSelector for NodeRpc {
    async fn pick_coins(&self, request: &CoinRequest) -> ComposeResult<CoinSelection> {
        let params = serde_json::to_value(request)
            .map_err(|e| ComposeError::Validation(e.to_string()))?;
        let picked: PickedCoins = match self
            .invoke_as(Method::PickDivisibleCoinsForAmount, Some(params))
            .await
        {
            Err(ComposeError::Transport(e)) if e.code() == Some(NOT_ENOUGH_FUNDS) => {
                return Err(ComposeError::InsufficientFunds(e.to_string()));
            }
            other => other?,
        };
        Ok(CoinSelection {
            inputs: picked
                .inputs_with_proofs
                .into_iter()
                .map(|input| input.input)
                .collect(),
            total_amount: picked.total_amount,
        })
    }
}

/// Light client for one node: catalog calls plus unit composition.
#[derive(Clone)]
pub struct Client {
    rpc: NodeRpc,
    composer: Arc<UnitComposer<NodeRpc, NodeRpc>>,
}

impl Client {
    /// Connect to the configured node. Must be called within a Tokio runtime.
    pub fn connect(config: &ClientConfig) -> Self {
        let transport = TransportClient::connect(config.transport.clone());
        Self::with_transport(transport, config.composer.clone())
    }

    pub fn with_transport(transport: TransportClient, composer: ComposerConfig) -> Self {
        let rpc = NodeRpc::new(transport);
        let composer = UnitComposer::new(rpc.clone(), rpc.clone(), composer);
        Self {
            rpc,
            composer: Arc::new(composer),
        }
    }

    pub fn transport(&self) -> &TransportClient {
        &self.rpc.transport
    }

    pub fn rpc(&self) -> &NodeRpc {
        &self.rpc
    }

    pub fn state(&self) -> ConnectionState {
        self.rpc.transport.state()
    }

    pub fn close(&self) {
        self.rpc.transport.close();
    }

    /// Raw command call for methods outside the catalog.
    pub async fn call(&self, command: &str, params: Option<Value>) -> TransportResult<Value> {
        self.rpc.call(command, params).await
    }

    pub async fn invoke(&self, method: Method, params: Option<Value>) -> TransportResult<Value> {
        self.rpc.invoke(method, params).await
    }

    pub async fn get_witnesses(&self) -> TransportResult<Value> {
        self.invoke(Method::GetWitnesses, None).await
    }

    pub async fn get_peers(&self) -> TransportResult<Value> {
        self.invoke(Method::GetPeers, None).await
    }

    pub async fn get_joint(&self, unit: &str) -> TransportResult<Value> {
        self.invoke(Method::GetJoint, Some(json!(unit))).await
    }

    pub async fn get_last_mci(&self) -> TransportResult<Value> {
        self.invoke(Method::GetLastMci, None).await
    }

    pub async fn catchup(&self, params: Value) -> TransportResult<Value> {
        self.invoke(Method::Catchup, Some(params)).await
    }

    pub async fn get_hash_tree(&self, params: Value) -> TransportResult<Value> {
        self.invoke(Method::GetHashTree, Some(params)).await
    }

    pub async fn post_joint(&self, unit: &Unit) -> TransportResult<Value> {
        self.invoke(Method::PostJoint, Some(json!({ "unit": unit }))).await
    }

    pub async fn subscribe(&self, params: Value) -> TransportResult<Value> {
        self.invoke(Method::Subscribe, Some(params)).await
    }

    pub async fn get_history(&self, params: Value) -> TransportResult<Value> {
        self.invoke(Method::GetHistory, Some(params)).await
    }

    pub async fn get_parents_and_last_ball_and_witness_list_unit(
        &self,
        params: Value,
    ) -> TransportResult<Value> {
        self.invoke(Method::GetParentsAndLastBallAndWitnessListUnit, Some(params))
            .await
    }

    pub async fn get_attestation(&self, params: Value) -> TransportResult<Value> {
        self.invoke(Method::GetAttestation, Some(params)).await
    }

    pub async fn get_attestations(&self, params: Value) -> TransportResult<Value> {
        self.invoke(Method::GetAttestations, Some(params)).await
    }

    pub async fn pick_divisible_coins_for_amount(&self, params: Value) -> TransportResult<Value> {
        self.invoke(Method::PickDivisibleCoinsForAmount, Some(params))
            .await
    }

    pub async fn get_definition_chash(&self, params: Value) -> TransportResult<Value> {
        self.invoke(Method::GetDefinitionChash, Some(params)).await
    }

    pub async fn get_definition_for_address(&self, params: Value) -> TransportResult<Value> {
        self.invoke(Method::GetDefinitionForAddress, Some(params))
            .await
    }

    pub async fn get_aa_state_vars(&self, params: Value) -> TransportResult<Value> {
        self.invoke(Method::GetAaStateVars, Some(params)).await
    }

    pub async fn get_bots(&self) -> TransportResult<Value> {
        self.invoke(Method::GetBots, None).await
    }

    pub async fn get_asset_metadata(&self, asset: &str) -> TransportResult<Value> {
        self.invoke(Method::GetAssetMetadata, Some(json!(asset))).await
    }

    /// Compose and sign a unit without submitting it.
    pub async fn compose(&self, app: &str, payload: Value, auth: &Auth) -> ComposeResult<Unit> {
        self.composer.compose(app, payload, auth).await
    }

    /// Submit a composed unit. Returns its id.
    pub async fn broadcast(&self, unit: &Unit) -> ComposeResult<String> {
        let id = unit
            .unit
            .clone()
            .ok_or_else(|| ComposeError::Validation("unit has no id".into()))?;
        match self.post_joint(unit).await {
            Ok(response) => {
                metrics::record_broadcast("accepted");
                tracing::info!(unit = %id, response = %response, "Unit broadcast");
                Ok(id)
            }
            Err(e) => {
                metrics::record_broadcast("rejected");
                tracing::warn!(unit = %id, error = %e, "Broadcast rejected");
                Err(e.into())
            }
        }
    }

    pub async fn compose_payment(
        &self,
        outputs: &[Output],
        asset: Option<&str>,
        auth: &Auth,
    ) -> ComposeResult<Unit> {
        self.compose("payment", payment_request(outputs, asset), auth)
            .await
    }

    pub async fn compose_data(&self, data: Value, auth: &Auth) -> ComposeResult<Unit> {
        self.compose("data", data, auth).await
    }

    pub async fn compose_text(&self, text: &str, auth: &Auth) -> ComposeResult<Unit> {
        self.compose("text", json!(text), auth).await
    }

    pub async fn compose_data_feed(&self, feed: Value, auth: &Auth) -> ComposeResult<Unit> {
        self.compose("data_feed", feed, auth).await
    }

    pub async fn compose_profile(&self, profile: Value, auth: &Auth) -> ComposeResult<Unit> {
        self.compose("profile", profile, auth).await
    }

    /// `attestation` message for `address` carrying `profile`.
    pub async fn compose_attestation(
        &self,
        address: &str,
        profile: Value,
        auth: &Auth,
    ) -> ComposeResult<Unit> {
        let payload = json!({ "address": address, "profile": profile });
        self.compose("attestation", payload, auth).await
    }

    pub async fn compose_poll(&self, poll: Value, auth: &Auth) -> ComposeResult<Unit> {
        self.compose("poll", poll, auth).await
    }

    pub async fn compose_vote(&self, vote: Value, auth: &Auth) -> ComposeResult<Unit> {
        self.compose("vote", vote, auth).await
    }

    /// Compose, sign and submit. Returns the unit id.
    pub async fn post(&self, app: &str, payload: Value, auth: &Auth) -> ComposeResult<String> {
        let unit = self.compose(app, payload, auth).await?;
        self.broadcast(&unit).await
    }

    pub async fn post_payment(
        &self,
        outputs: &[Output],
        asset: Option<&str>,
        auth: &Auth,
    ) -> ComposeResult<String> {
        self.post("payment", payment_request(outputs, asset), auth)
            .await
    }

    pub async fn post_data(&self, data: Value, auth: &Auth) -> ComposeResult<String> {
        self.post("data", data, auth).await
    }

    pub async fn post_text(&self, text: &str, auth: &Auth) -> ComposeResult<String> {
        self.post("text", json!(text), auth).await
    }

    pub async fn post_data_feed(&self, feed: Value, auth: &Auth) -> ComposeResult<String> {
        self.post("data_feed", feed, auth).await
    }

    pub async fn post_profile(&self, profile: Value, auth: &Auth) -> ComposeResult<String> {
        self.post("profile", profile, auth).await
    }

    pub async fn post_attestation(
        &self,
        address: &str,
        profile: Value,
        auth: &Auth,
    ) -> ComposeResult<String> {
        let unit = self.compose_attestation(address, profile, auth).await?;
        self.broadcast(&unit).await
    }

    pub async fn post_poll(&self, poll: Value, auth: &Auth) -> ComposeResult<String> {
        self.post("poll", poll, auth).await
    }

    pub async fn post_vote(&self, vote: Value, auth: &Auth) -> ComposeResult<String> {
        self.post("vote", vote, auth).await
    }
}

fn payment_request(outputs: &[Output], asset: Option<&str>) -> Value {
    match asset {
        Some(asset) => json!({ "asset": asset, "outputs": outputs }),
        None => json!({ "outputs": outputs }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_request_shape() {
        let outputs = [Output::new("KSCCYOEMOMUMJXROLK4HWLTJBWFXICRB", 5)];
        assert_eq!(
            payment_request(&outputs, None),
            json!({"outputs": [{"address": "KSCCYOEMOMUMJXROLK4HWLTJBWFXICRB", "amount": 5}]})
        );
        assert_eq!(payment_request(&outputs, Some("abc"))["asset"], "abc");
    }

    #[test]
    fn test_picked_coins_parse() {
        let picked: PickedCoins = serde_json::from_value(json!({
            "inputs_with_proofs": [{"input": {"unit": "U", "message_index": 0, "output_index": 0}}],
            "total_amount": 2000,
        }))
        .unwrap();
        assert_eq!(picked.total_amount, 2000);
        assert_eq!(picked.inputs_with_proofs[0].input["unit"], "U");
    }
}
