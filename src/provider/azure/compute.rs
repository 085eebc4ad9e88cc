//! # Compute Tag Stores
//!
//! [`ComputeTags`] for virtual machines and VM scale sets. Both go through the shared
//! [`ArmClient`]; each refuses resources of the other kind.

use crate::provider::azure::{ArmClient, ResourceIdentity, ResourceKind};
use crate::provider::ComputeTags;
use crate::sync::TagMap;
use anyhow::{ensure, Result};
use async_trait::async_trait;
use std::sync::Arc;

fn ensure_kind(resource: &ResourceIdentity, expected: ResourceKind) -> Result<()> {
    ensure!(
        resource.kind == expected,
        "{} is not a {} resource",
        resource,
        expected
    );
    Ok(())
}

/// Tags of a standalone virtual machine
#[derive(Debug, Clone)]
pub struct VirtualMachineTags {
    arm: Arc<ArmClient>,
}

impl VirtualMachineTags {
    #[must_use]
    pub fn new(arm: Arc<ArmClient>) -> Self {
        Self { arm }
    }
}

#[async_trait]
impl ComputeTags for VirtualMachineTags {
    async fn get_tags(&self, resource: &ResourceIdentity) -> Result<TagMap> {
        ensure_kind(resource, ResourceKind::VirtualMachine)?;
        self.arm.get_tags(resource).await
    }

    async fn set_tags(&self, resource: &ResourceIdentity, tags: &TagMap) -> Result<()> {
        ensure_kind(resource, ResourceKind::VirtualMachine)?;
        self.arm.update_tags(resource, tags).await
    }
}

/// Tags of a VM scale set. Every instance of the scale set shares them.
#[derive(Debug, Clone)]
pub struct ScaleSetTags {
    arm: Arc<ArmClient>,
}

impl ScaleSetTags {
    #[must_use]
    pub fn new(arm: Arc<ArmClient>) -> Self {
        Self { arm }
    }
}

#[async_trait]
impl ComputeTags for ScaleSetTags {
    async fn get_tags(&self, resource: &ResourceIdentity) -> Result<TagMap> {
        ensure_kind(resource, ResourceKind::VirtualMachineScaleSet)?;
        self.arm.get_tags(resource).await
    }

    async fn set_tags(&self, resource: &ResourceIdentity, tags: &TagMap) -> Result<()> {
        ensure_kind(resource, ResourceKind::VirtualMachineScaleSet)?;
        self.arm.update_tags(resource, tags).await
    }
}

/// The tag store for a resource kind
#[must_use]
pub fn compute_tags_for(kind: ResourceKind, arm: &Arc<ArmClient>) -> Box<dyn ComputeTags> {
    match kind {
        ResourceKind::VirtualMachine => Box::new(VirtualMachineTags::new(Arc::clone(arm))),
        ResourceKind::VirtualMachineScaleSet => Box::new(ScaleSetTags::new(Arc::clone(arm))),
    }
}
