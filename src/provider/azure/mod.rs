//! # Azure
//!
//! - `resource`: node provider ID -> ARM resource identity
//! - `arm`: Azure Resource Manager REST client and token sources
//! - `compute`: tag stores for virtual machines and VM scale sets

pub mod arm;
pub mod compute;
pub mod resource;

pub use arm::{AccessTokenSource, ArmClient, AzureCredential, StaticToken};
pub use compute::{compute_tags_for, ScaleSetTags, VirtualMachineTags};
pub use resource::{ProviderIdError, ResourceIdentity, ResourceKind};
