//! Activation objects: networks, statuses, and activation records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::{PolicyId, PolicyVersionNumber};

/// A named delivery network that policy versions are activated onto.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// The staging network.
    Staging,
    /// The production network.
    Production,
}

impl Network {
    /// All networks, in activation-sweep order.
    pub const ALL: [Self; 2] = [Self::Staging, Self::Production];
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Staging => "staging",
            Self::Production => "production",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Network {
    type Err = UnknownNetworkError;

    /// Accepts the canonical names plus the short aliases the upstream
    /// service tolerates.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "staging" | "stag" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(UnknownNetworkError {
                value: s.to_string(),
            }),
        }
    }
}

/// Unrecognized network name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network '{value}': expected 'staging' or 'production'")]
pub struct UnknownNetworkError {
    /// The rejected input.
    pub value: String,
}

/// Status of an activation as reported by the remote collaborator.
///
/// Statuses are never inferred locally; they are refreshed only by polling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStatus {
    /// The version has never been active on the network.
    Inactive,
    /// An activation or deactivation is in flight.
    Pending,
    /// The version is live on the network.
    Active,
    /// The version was live and has been taken down.
    Deactivated,
    /// The remote collaborator reported a terminal failure.
    Failed,
}

impl ActivationStatus {
    /// Whether this status terminates a wait toward `Active`.
    #[must_use]
    pub const fn is_terminal_for_activation(self) -> bool {
        matches!(self, Self::Active | Self::Deactivated | Self::Failed)
    }

    /// Whether this status terminates a wait toward `Inactive`.
    #[must_use]
    pub const fn is_terminal_for_deactivation(self) -> bool {
        matches!(self, Self::Inactive | Self::Deactivated | Self::Failed)
    }
}

impl fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inactive => "inactive",
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Deactivated => "deactivated",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Identity of an activatable resource on the remote collaborator.
///
/// Policies activate under their numeric ID; derived shared resources
/// activate under a caller-supplied key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Create a new resource key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PolicyId> for ResourceKey {
    fn from(id: PolicyId) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ResourceKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// An activation of a policy version on a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    /// The activated resource.
    pub resource: ResourceKey,
    /// Target network.
    pub network: Network,
    /// Activated version.
    pub version: PolicyVersionNumber,
    /// Status as last reported by the remote collaborator.
    pub status: ActivationStatus,
    /// When the activation request was submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// When the activation reached `active`, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    /// Downstream property names bound to this activation; empty for
    /// shared resources.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_properties: Vec<String>,
}
