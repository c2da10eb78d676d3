//! Network identifier.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::TypesError;

/// Identifies which chain network the pipeline is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    Main,
    /// The public test network.
    Test,
}

impl NetworkId {
    /// Default JSON-RPC port of a bitcoind-compatible node on this network.
    pub fn default_rpc_port(&self) -> u16 {
        match self {
            Self::Main => 8332,
            Self::Test => 18332,
        }
    }

    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
        }
    }
}

impl FromStr for NetworkId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" | "mainnet" => Ok(Self::Main),
            "test" | "testnet" => Ok(Self::Test),
            other => Err(TypesError::UnknownNetwork(other.to_string())),
        }
    }
}
