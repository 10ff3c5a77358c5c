//! Node RPC method catalog.

use std::fmt;
use std::str::FromStr;

/// Node RPC methods this client knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GetWitnesses,
    GetPeers,
    GetJoint,
    GetLastMci,
    Catchup,
    GetHashTree,
    PostJoint,
    Subscribe,
    GetHistory,
    GetParentsAndLastBallAndWitnessListUnit,
    GetAttestation,
    GetAttestations,
    PickDivisibleCoinsForAmount,
    GetDefinitionChash,
    GetDefinitionForAddress,
    GetAaStateVars,
    GetBots,
    GetAssetMetadata,
}

impl Method {
    pub const ALL: [Method; 18] = [
        Method::GetWitnesses,
        Method::GetPeers,
        Method::GetJoint,
        Method::GetLastMci,
        Method::Catchup,
        Method::GetHashTree,
        Method::PostJoint,
        Method::Subscribe,
        Method::GetHistory,
        Method::GetParentsAndLastBallAndWitnessListUnit,
        Method::GetAttestation,
        Method::GetAttestations,
        Method::PickDivisibleCoinsForAmount,
        Method::GetDefinitionChash,
        Method::GetDefinitionForAddress,
        Method::GetAaStateVars,
        Method::GetBots,
        Method::GetAssetMetadata,
    ];

    /// Command name on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Method::GetWitnesses => "get_witnesses",
            Method::GetPeers => "get_peers",
            Method::GetJoint => "get_joint",
            Method::GetLastMci => "get_last_mci",
            Method::Catchup => "catchup",
            Method::GetHashTree => "get_hash_tree",
            Method::PostJoint => "post_joint",
            Method::Subscribe => "subscribe",
            Method::GetHistory => "light/get_history",
            Method::GetParentsAndLastBallAndWitnessListUnit => {
                "light/get_parents_and_last_ball_and_witness_list_unit"
            }
            Method::GetAttestation => "light/get_attestation",
            Method::GetAttestations => "light/get_attestations",
            Method::PickDivisibleCoinsForAmount => "light/pick_divisible_coins_for_amount",
            Method::GetDefinitionChash => "light/get_definition_chash",
            Method::GetDefinitionForAddress => "light/get_definition_for_address",
            Method::GetAaStateVars => "light/get_aa_state_vars",
            Method::GetBots => "hub/get_bots",
            Method::GetAssetMetadata => "hub/get_asset_metadata",
        }
    }

    /// Whether the method sends its params. Params passed to a method that
    /// takes none are dropped.
    pub fn takes_params(self) -> bool {
        !matches!(
            self,
            Method::GetWitnesses | Method::GetPeers | Method::GetLastMci | Method::GetBots
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.name() == s)
            .ok_or_else(|| format!("unknown method {}", s))
    }
}
