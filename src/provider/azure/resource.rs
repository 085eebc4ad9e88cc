//! # Resource Identity
//!
//! Parsing of a node's `spec.providerID` into the ARM resource that backs it.
//!
//! ```text
//! azure:///subscriptions/<sub>/resourceGroups/<rg>/providers/Microsoft.Compute/virtualMachines/<vm>
//! azure:///subscriptions/<sub>/resourceGroups/<rg>/providers/Microsoft.Compute/virtualMachineScaleSets/<vmss>/virtualMachines/<instance>
//! ```

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static PROVIDER_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^azure:///subscriptions/([^/]+)/resourceGroups/([^/]+)/providers/([^/]+)/([^/]+)/([^/]+)(?:/.*)?$",
    )
    .expect("Failed to compile provider ID regex")
});

const COMPUTE_NAMESPACE: &str = "Microsoft.Compute";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProviderIdError {
    #[error("provider ID is empty")]
    Empty,
    #[error("provider ID '{0}' is not an Azure resource ID")]
    Malformed(String),
    #[error("resource provider '{0}' is not Microsoft.Compute")]
    UnsupportedProvider(String),
    #[error("resource type '{0}' is neither virtualMachines nor virtualMachineScaleSets")]
    UnsupportedKind(String),
}

/// Kind of compute resource a node runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    VirtualMachine,
    VirtualMachineScaleSet,
}

impl ResourceKind {
    /// ARM resource type segment
    #[must_use]
    pub fn resource_type(self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine => "virtualMachines",
            ResourceKind::VirtualMachineScaleSet => "virtualMachineScaleSets",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_type())
    }
}

impl FromStr for ResourceKind {
    type Err = ProviderIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("virtualMachines") {
            Ok(ResourceKind::VirtualMachine)
        } else if s.eq_ignore_ascii_case("virtualMachineScaleSets") {
            Ok(ResourceKind::VirtualMachineScaleSet)
        } else {
            Err(ProviderIdError::UnsupportedKind(s.to_string()))
        }
    }
}

/// The ARM compute resource behind a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    pub subscription_id: String,
    pub resource_group: String,
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceIdentity {
    /// Parse a node provider ID. Scale set instance IDs resolve to the scale set.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderIdError`] if the ID is not an Azure compute resource.
    pub fn from_provider_id(provider_id: &str) -> Result<Self, ProviderIdError> {
        let provider_id = provider_id.trim();
        if provider_id.is_empty() {
            return Err(ProviderIdError::Empty);
        }
        let caps = PROVIDER_ID_RE
            .captures(provider_id)
            .ok_or_else(|| ProviderIdError::Malformed(provider_id.to_string()))?;

        let namespace = &caps[3];
        if !namespace.eq_ignore_ascii_case(COMPUTE_NAMESPACE) {
            return Err(ProviderIdError::UnsupportedProvider(namespace.to_string()));
        }

        Ok(Self {
            subscription_id: caps[1].to_string(),
            resource_group: caps[2].to_string(),
            kind: caps[4].parse()?,
            name: caps[5].to_string(),
        })
    }

    /// ARM resource ID, without the endpoint
    #[must_use]
    pub fn arm_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription_id,
            self.resource_group,
            COMPUTE_NAMESPACE,
            self.kind.resource_type(),
            self.name
        )
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.arm_id())
    }
}

impl FromStr for ResourceIdentity {
    type Err = ProviderIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_provider_id(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_virtual_machine() {
        let id = ResourceIdentity::from_provider_id(
            "azure:///subscriptions/sub-1/resourceGroups/MC_rg_cluster_westus2/providers/Microsoft.Compute/virtualMachines/aks-nodepool1-0",
        )
        .unwrap();
        assert_eq!(id.subscription_id, "sub-1");
        assert_eq!(id.resource_group, "MC_rg_cluster_westus2");
        assert_eq!(id.kind, ResourceKind::VirtualMachine);
        assert_eq!(id.name, "aks-nodepool1-0");
    }

    #[test]
    fn test_parse_scale_set_instance() {
        let id = ResourceIdentity::from_provider_id(
            "azure:///subscriptions/sub-1/resourceGroups/mc_rg/providers/Microsoft.Compute/virtualMachineScaleSets/aks-nodepool1-vmss/virtualMachines/3",
        )
        .unwrap();
        assert_eq!(id.kind, ResourceKind::VirtualMachineScaleSet);
        assert_eq!(id.name, "aks-nodepool1-vmss");
        assert_eq!(
            id.arm_id(),
            "/subscriptions/sub-1/resourceGroups/mc_rg/providers/Microsoft.Compute/virtualMachineScaleSets/aks-nodepool1-vmss"
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let id: ResourceIdentity =
            "azure:///subscriptions/s/resourcegroups/rg/providers/microsoft.compute/VIRTUALMACHINES/vm"
                .parse()
                .unwrap();
        assert_eq!(id.kind, ResourceKind::VirtualMachine);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            ResourceIdentity::from_provider_id(""),
            Err(ProviderIdError::Empty)
        );
        assert!(matches!(
            ResourceIdentity::from_provider_id("aws:///us-east-1a/i-0123"),
            Err(ProviderIdError::Malformed(_))
        ));
        assert_eq!(
            ResourceIdentity::from_provider_id(
                "azure:///subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/networkInterfaces/nic"
            ),
            Err(ProviderIdError::UnsupportedProvider("Microsoft.Network".to_string()))
        );
        assert_eq!(
            ResourceIdentity::from_provider_id(
                "azure:///subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/disks/d"
            ),
            Err(ProviderIdError::UnsupportedKind("disks".to_string()))
        );
    }
}
