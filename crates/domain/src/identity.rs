//! Caller identity as provided by the authentication layer.

use std::str::FromStr;

use common::UserId;
use market_store::{ParseEnumError, Scale};
use serde::{Deserialize, Serialize};

/// Account role.
///
/// Producers (`P_*`) post items, consumers (`C_*`) order them. The size
/// suffix ties the account to one item scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ADMIN")]
    Admin,
    #[serde(rename = "P_SMALL")]
    ProducerSmall,
    #[serde(rename = "P_LARGE")]
    ProducerLarge,
    #[serde(rename = "C_SMALL")]
    ConsumerSmall,
    #[serde(rename = "C_LARGE")]
    ConsumerLarge,
}

impl Role {
    /// The item scale this role is restricted to, if any.
    pub fn scale(&self) -> Option<Scale> {
        match self {
            Role::ProducerSmall | Role::ConsumerSmall => Some(Scale::Small),
            Role::ProducerLarge | Role::ConsumerLarge => Some(Scale::Large),
            Role::Admin => None,
        }
    }

    /// The scale of items this role may post and manage.
    pub fn producer_scale(&self) -> Option<Scale> {
        match self {
            Role::ProducerSmall => Some(Scale::Small),
            Role::ProducerLarge => Some(Scale::Large),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::ProducerSmall => "P_SMALL",
            Role::ProducerLarge => "P_LARGE",
            Role::ConsumerSmall => "C_SMALL",
            Role::ConsumerLarge => "C_LARGE",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "P_SMALL" => Ok(Role::ProducerSmall),
            "P_LARGE" => Ok(Role::ProducerLarge),
            "C_SMALL" => Ok(Role::ConsumerSmall),
            "C_LARGE" => Ok(Role::ConsumerLarge),
            other => Err(ParseEnumError {
                kind: "role",
                value: other.to_string(),
            }),
        }
    }
}

/// A verified caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}
