//! Common test utilities
//!
//! In-memory tag and label stores with call counters and failure injection, a sink
//! that records diagnostics, and rustls setup for the Pact tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use tag_label_sync::provider::azure::{ResourceIdentity, ResourceKind};
use tag_label_sync::provider::{ComputeTags, NodeLabelSnapshot, NodeLabels};
use tag_label_sync::sync::{Diagnostic, DiagnosticSink, LabelMap, TagMap};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

pub fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

pub fn vm() -> ResourceIdentity {
    ResourceIdentity {
        subscription_id: "00000000-0000-0000-0000-000000000000".to_string(),
        resource_group: "MC_rg_cluster_westeurope".to_string(),
        kind: ResourceKind::VirtualMachine,
        name: "vm-0".to_string(),
    }
}

#[derive(Debug, Default)]
pub struct FakeComputeTags {
    pub tags: Mutex<TagMap>,
    pub get_calls: AtomicUsize,
    pub set_calls: AtomicUsize,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
}

impl FakeComputeTags {
    pub fn with(tags: TagMap) -> Self {
        Self {
            tags: Mutex::new(tags),
            ..Self::default()
        }
    }

    pub fn tags(&self) -> TagMap {
        self.tags.lock().unwrap().clone()
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComputeTags for FakeComputeTags {
    async fn get_tags(&self, _resource: &ResourceIdentity) -> Result<TagMap> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(anyhow!("ARM unavailable"));
        }
        Ok(self.tags())
    }

    async fn set_tags(&self, _resource: &ResourceIdentity, tags: &TagMap) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(anyhow!("ARM rejected update"));
        }
        *self.tags.lock().unwrap() = tags.clone();
        Ok(())
    }
}

/// Node label store with a resource version that every write bumps
#[derive(Debug, Default)]
pub struct FakeNodeLabels {
    pub labels: Mutex<LabelMap>,
    pub version: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub set_calls: AtomicUsize,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
    /// Written by another actor right after the next read
    pub concurrent_write: Mutex<Option<(String, String)>>,
}

impl FakeNodeLabels {
    pub fn with(labels: LabelMap) -> Self {
        Self {
            labels: Mutex::new(labels),
            ..Self::default()
        }
    }

    pub fn labels(&self) -> LabelMap {
        self.labels.lock().unwrap().clone()
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn write_after_next_read(&self, key: &str, value: &str) {
        *self.concurrent_write.lock().unwrap() = Some((key.to_string(), value.to_string()));
    }
}

#[async_trait]
impl NodeLabels for FakeNodeLabels {
    async fn get_labels(&self, _node_name: &str) -> Result<NodeLabelSnapshot> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(anyhow!("API server unavailable"));
        }
        let read = NodeLabelSnapshot {
            labels: self.labels(),
            resource_version: Some(self.version.load(Ordering::SeqCst).to_string()),
        };
        if let Some((key, value)) = self.concurrent_write.lock().unwrap().take() {
            self.labels.lock().unwrap().insert(key, value);
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        Ok(read)
    }

    async fn set_labels(
        &self,
        _node_name: &str,
        read: &NodeLabelSnapshot,
        labels: &LabelMap,
    ) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(anyhow!("API server rejected update"));
        }
        let current = self.version.load(Ordering::SeqCst).to_string();
        if read.resource_version.as_deref() != Some(current.as_str()) {
            return Err(anyhow!("the object has been modified"));
        }
        *self.labels.lock().unwrap() = labels.clone();
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub diagnostics: Mutex<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock().unwrap())
    }
}

#[async_trait]
impl DiagnosticSink for RecordingSink {
    async fn report(&self, _node_name: &str, diagnostic: &Diagnostic) {
        self.diagnostics.lock().unwrap().push(diagnostic.clone());
    }
}
