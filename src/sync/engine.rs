//! # Sync Engine
//!
//! One convergence pass between a node's labels and its compute resource's tags.
//!
//! Both maps are read once at the start of the pass. The tags-to-labels half and the
//! labels-to-tags half each decide against those snapshots and stage their side; a tag
//! adopted from a label is also staged as the label it maps back to. Each side is then
//! written at most once, as a full replacement. Running the pass again without any
//! outside change writes nothing.

use crate::config::ConfigOptions;
use crate::observability::metrics;
use crate::provider::azure::ResourceIdentity;
use crate::provider::{ComputeTags, NodeLabelSnapshot, NodeLabels};
use crate::sync::conflict::{decide, Decision, SyncPass};
use crate::sync::naming::{
    is_valid_label_name, is_valid_label_value, is_valid_tag_name, label_name_to_tag_name,
    tag_name_to_label_name, truncate_tag_value_for_label,
};
use crate::sync::{LabelMap, SyncError, TagMap};
use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Something worth telling an operator about that did not stop the pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A key exists on both sides with different values and was left alone
    Conflict {
        pass: SyncPass,
        key: String,
        existing: String,
        incoming: String,
    },
    /// A label contains characters ARM does not allow in tag names
    InvalidTagName { label: String },
    /// A tag does not convert into a valid label
    InvalidLabel {
        tag: String,
        label: String,
        value: String,
    },
    /// The resource has no room for more tags
    TagLimitReached { count: usize, max: usize },
    /// Several tags map onto the same label name
    TagNameCollision {
        label: String,
        kept: String,
        skipped: String,
    },
    /// Several labels with different values map onto the same tag name
    LabelNameCollision {
        tag: String,
        kept: String,
        skipped: String,
    },
}

impl Diagnostic {
    /// Event reason
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Diagnostic::Conflict { .. } => "ConflictingTagLabelValues",
            Diagnostic::InvalidTagName { .. } => "InvalidTagName",
            Diagnostic::InvalidLabel { .. } => "InvalidLabel",
            Diagnostic::TagLimitReached { .. } => "TagLimitReached",
            Diagnostic::TagNameCollision { .. } | Diagnostic::LabelNameCollision { .. } => {
                "TagNameCollision"
            }
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Diagnostic::Conflict {
                pass: SyncPass::TagsToLabels,
                key,
                existing,
                incoming,
            } => format!(
                "ARM tag was not applied to node because a different value for '{key}' already exists ({existing} != {incoming})."
            ),
            Diagnostic::Conflict {
                pass: SyncPass::LabelsToTags,
                key,
                existing,
                incoming,
            } => format!(
                "node label was not applied to ARM resource because a different value for '{key}' already exists ({existing} != {incoming})."
            ),
            Diagnostic::InvalidTagName { label } => format!(
                "node label '{label}' was not applied to ARM resource because its name contains a character tags do not allow."
            ),
            Diagnostic::InvalidLabel { tag, label, value } => format!(
                "ARM tag '{tag}' was not applied to node because '{label}={value}' is not a valid label."
            ),
            Diagnostic::TagLimitReached { count, max } => format!(
                "node labels were not applied to ARM resource because it already has {count} tags (limit {max})."
            ),
            Diagnostic::TagNameCollision {
                label,
                kept,
                skipped,
            } => format!(
                "ARM tag '{skipped}' was not applied to node because tag '{kept}' also maps to label '{label}'."
            ),
            Diagnostic::LabelNameCollision { tag, kept, skipped } => format!(
                "node label '{skipped}' was not applied to ARM resource because label '{kept}' also maps to tag '{tag}'."
            ),
        }
    }

    /// Whether the diagnostic is published as a Kubernetes Event.
    ///
    /// Invalid tag names come from system labels such as `kubernetes.io/arch` on every
    /// node and every pass, so they are only logged and counted.
    #[must_use]
    pub fn publish_as_event(&self) -> bool {
        !matches!(self, Diagnostic::InvalidTagName { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason(), self.message())
    }
}

/// Receives the diagnostics of a pass
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn report(&self, node_name: &str, diagnostic: &Diagnostic);
}

/// What a pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Labels added or overwritten
    pub labels_applied: usize,
    /// Tags added or overwritten
    pub tags_applied: usize,
    /// Diagnostics handed to the sink
    pub diagnostics: usize,
}

impl SyncOutcome {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.labels_applied == 0 && self.tags_applied == 0
    }
}

/// The tag that owns a label name
#[derive(Debug, Clone, Copy)]
struct TagMapping<'a> {
    tag_name: &'a str,
    tag_value: &'a str,
}

/// Label name -> owning tag, built from the tag snapshot.
///
/// Tags are visited in name order, so the smallest tag name owns a contested label.
fn index_tags<'a>(
    tags: &'a TagMap,
    options: &ConfigOptions,
) -> (BTreeMap<String, TagMapping<'a>>, Vec<Diagnostic>) {
    let mut owners: BTreeMap<String, TagMapping<'a>> = BTreeMap::new();
    let mut collisions = Vec::new();
    for (tag_name, tag_value) in tags {
        let label_name = tag_name_to_label_name(tag_name, options);
        if let Some(owner) = owners.get(&label_name) {
            collisions.push(Diagnostic::TagNameCollision {
                label: label_name,
                kept: owner.tag_name.to_string(),
                skipped: tag_name.clone(),
            });
            continue;
        }
        owners.insert(label_name, TagMapping { tag_name, tag_value });
    }
    (owners, collisions)
}

/// The label that owns a tag name
#[derive(Debug, Clone, Copy)]
struct LabelMapping<'a> {
    label_name: &'a str,
    label_value: &'a str,
    /// The label is the one the tag maps back to
    canonical: bool,
}

/// Tag name -> owning label, built from the label snapshot.
///
/// The label a tag maps back to (usually the prefixed one) owns that tag name; among
/// the rest the smallest label name wins. A losing label is only reported when its
/// value differs from the owner's. Labels that cannot become tags are reported too.
fn index_labels<'a>(
    labels: &'a LabelMap,
    tag_owners: &BTreeMap<String, TagMapping<'_>>,
    options: &ConfigOptions,
) -> (BTreeMap<String, LabelMapping<'a>>, Vec<Diagnostic>) {
    let mut owners: BTreeMap<String, LabelMapping<'a>> = BTreeMap::new();
    let mut diagnostics = Vec::new();
    for (label_name, label_value) in labels {
        if !is_valid_tag_name(label_name, options) {
            diagnostics.push(Diagnostic::InvalidTagName {
                label: label_name.clone(),
            });
            continue;
        }

        let tag_name = match tag_owners.get(label_name) {
            Some(mapping) => mapping.tag_name.to_string(),
            None => label_name_to_tag_name(label_name, options),
        };
        let candidate = LabelMapping {
            label_name,
            label_value,
            canonical: tag_name_to_label_name(&tag_name, options) == *label_name,
        };

        match owners.entry(tag_name) {
            Entry::Vacant(entry) => {
                entry.insert(candidate);
            }
            Entry::Occupied(mut entry) => {
                let (kept, skipped) = if candidate.canonical && !entry.get().canonical {
                    (candidate, entry.insert(candidate))
                } else {
                    (*entry.get(), candidate)
                };
                if kept.label_value != skipped.label_value {
                    diagnostics.push(Diagnostic::LabelNameCollision {
                        tag: entry.key().clone(),
                        kept: kept.label_name.to_string(),
                        skipped: skipped.label_name.to_string(),
                    });
                }
            }
        }
    }
    (owners, diagnostics)
}

/// Stage the label each adopted tag maps back to, unless the node already has it.
/// Returns the number of labels staged.
fn mirror_adopted_tags(
    adopted: &[String],
    tags: &TagMap,
    options: &ConfigOptions,
    labels: &mut LabelMap,
) -> usize {
    let (owners, _) = index_tags(tags, options);
    let mut mirrored = 0;
    for tag_name in adopted {
        let label_name = tag_name_to_label_name(tag_name, options);
        let Some(mapping) = owners.get(&label_name) else {
            continue;
        };
        if mapping.tag_name != tag_name || labels.contains_key(&label_name) {
            continue;
        }
        let value = truncate_tag_value_for_label(mapping.tag_value);
        if !is_valid_label_name(&label_name) || !is_valid_label_value(value) {
            continue;
        }
        labels.insert(label_name, value.to_string());
        mirrored += 1;
    }
    mirrored
}

/// Runs convergence passes against a tag store and a label store
pub struct SyncEngine<'a> {
    tags: &'a dyn ComputeTags,
    labels: &'a dyn NodeLabels,
    diagnostics: &'a dyn DiagnosticSink,
}

impl fmt::Debug for SyncEngine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine").finish_non_exhaustive()
    }
}

impl<'a> SyncEngine<'a> {
    #[must_use]
    pub fn new(
        tags: &'a dyn ComputeTags,
        labels: &'a dyn NodeLabels,
        diagnostics: &'a dyn DiagnosticSink,
    ) -> Self {
        Self {
            tags,
            labels,
            diagnostics,
        }
    }

    /// Converge the labels of `node_name` and the tags of `resource`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::FetchLabels`] / [`SyncError::FetchTags`]: nothing was written
    /// - [`SyncError::Config`]: the conflict policy is not recognized, nothing was written
    /// - [`SyncError::PersistLabels`] / [`SyncError::PersistTags`] /
    ///   [`SyncError::PersistBoth`]: returned after both writes were attempted
    pub async fn reconcile(
        &self,
        node_name: &str,
        resource: &ResourceIdentity,
        options: &ConfigOptions,
    ) -> Result<SyncOutcome, SyncError> {
        let read = self
            .labels
            .get_labels(node_name)
            .await
            .map_err(|source| SyncError::FetchLabels {
                node: node_name.to_string(),
                source,
            })?;
        let tags = self
            .tags
            .get_tags(resource)
            .await
            .map_err(|source| SyncError::FetchTags {
                resource: resource.to_string(),
                source,
            })?;
        let labels = &read.labels;

        debug!(
            node.name = node_name,
            resource = %resource,
            labels = labels.len(),
            tags = tags.len(),
            sync.direction = options.sync_direction.as_str(),
            "Starting sync pass"
        );

        let mut outcome = SyncOutcome::default();
        let (owners, collisions) = index_tags(&tags, options);
        let to_labels = SyncPass::TagsToLabels.is_enabled(options.sync_direction);

        let (mut staged_labels, mut labels_applied) = (labels.clone(), 0);
        if to_labels {
            for collision in collisions {
                self.report(node_name, &collision, &mut outcome).await;
            }
            (staged_labels, labels_applied) = self
                .tags_to_labels(node_name, labels, &owners, options, &mut outcome)
                .await?;
        }

        let (mut staged_tags, mut tags_applied) = (tags.clone(), 0);
        if SyncPass::LabelsToTags.is_enabled(options.sync_direction) {
            let (staged, adopted) = self
                .labels_to_tags(node_name, labels, &tags, &owners, options, &mut outcome)
                .await?;
            if to_labels {
                labels_applied +=
                    mirror_adopted_tags(&adopted, &staged, options, &mut staged_labels);
            }
            (staged_tags, tags_applied) = (staged, adopted.len());
        }

        let mut labels_error = None;
        if labels_applied > 0 {
            match self
                .write_labels(node_name, &read, &staged_labels, labels_applied)
                .await
            {
                Ok(()) => outcome.labels_applied = labels_applied,
                Err(e) => labels_error = Some(e),
            }
        }

        let mut tags_error = None;
        if tags_applied > 0 {
            match self
                .write_tags(node_name, resource, &staged_tags, tags_applied)
                .await
            {
                Ok(()) => outcome.tags_applied = tags_applied,
                Err(e) => tags_error = Some(e),
            }
        }

        match (labels_error, tags_error) {
            (Some(labels), Some(tags)) => Err(SyncError::PersistBoth {
                labels: Box::new(labels),
                tags: Box::new(tags),
            }),
            (Some(e), None) | (None, Some(e)) => Err(e),
            (None, None) => Ok(outcome),
        }
    }

    /// Stage every tag onto a copy of the labels.
    /// Returns the staged labels and how many were added or overwritten.
    async fn tags_to_labels(
        &self,
        node_name: &str,
        labels: &LabelMap,
        owners: &BTreeMap<String, TagMapping<'_>>,
        options: &ConfigOptions,
        outcome: &mut SyncOutcome,
    ) -> Result<(LabelMap, usize), SyncError> {
        let pass = SyncPass::TagsToLabels;
        let mut staged = labels.clone();
        let mut applied = 0;

        for (label_name, mapping) in owners {
            let value = truncate_tag_value_for_label(mapping.tag_value);
            if !is_valid_label_name(label_name) || !is_valid_label_value(value) {
                let diagnostic = Diagnostic::InvalidLabel {
                    tag: mapping.tag_name.to_string(),
                    label: label_name.clone(),
                    value: value.to_string(),
                };
                self.report(node_name, &diagnostic, outcome).await;
                continue;
            }

            let existing = labels.get(label_name).map(String::as_str);
            let decision = decide(
                pass,
                options.sync_direction,
                existing,
                value,
                &options.conflict_policy,
            )?;
            match decision {
                Decision::Adopt => {
                    debug!(
                        node.name = node_name,
                        label.name = %label_name,
                        label.value = value,
                        "Staging label"
                    );
                    staged.insert(label_name.clone(), value.to_string());
                    applied += 1;
                }
                Decision::KeepAndReport => {
                    let diagnostic = Diagnostic::Conflict {
                        pass,
                        key: label_name.clone(),
                        existing: existing.unwrap_or_default().to_string(),
                        incoming: value.to_string(),
                    };
                    self.report(node_name, &diagnostic, outcome).await;
                }
                Decision::Skip => {}
            }
        }

        Ok((staged, applied))
    }

    /// Stage every label onto a copy of the tags.
    /// Returns the staged tags and the names of the tags added or overwritten.
    async fn labels_to_tags(
        &self,
        node_name: &str,
        labels: &LabelMap,
        tags: &TagMap,
        owners: &BTreeMap<String, TagMapping<'_>>,
        options: &ConfigOptions,
        outcome: &mut SyncOutcome,
    ) -> Result<(TagMap, Vec<String>), SyncError> {
        let pass = SyncPass::LabelsToTags;
        if tags.len() >= options.max_tags {
            let diagnostic = Diagnostic::TagLimitReached {
                count: tags.len(),
                max: options.max_tags,
            };
            self.report(node_name, &diagnostic, outcome).await;
            return Ok((tags.clone(), Vec::new()));
        }

        let (label_owners, skipped) = index_labels(labels, owners, options);
        for diagnostic in &skipped {
            self.report(node_name, diagnostic, outcome).await;
        }

        let mut staged = tags.clone();
        let mut adopted = Vec::new();
        let mut limit_reported = false;

        for (tag_name, mapping) in &label_owners {
            // A label written from a tag compares against the truncated tag value
            let existing = tags
                .get(tag_name)
                .map(|value| truncate_tag_value_for_label(value));
            let decision = decide(
                pass,
                options.sync_direction,
                existing,
                mapping.label_value,
                &options.conflict_policy,
            )?;
            match decision {
                Decision::Adopt => {
                    if !staged.contains_key(tag_name) && staged.len() >= options.max_tags {
                        if !limit_reported {
                            let diagnostic = Diagnostic::TagLimitReached {
                                count: staged.len(),
                                max: options.max_tags,
                            };
                            self.report(node_name, &diagnostic, outcome).await;
                            limit_reported = true;
                        }
                        continue;
                    }
                    debug!(
                        node.name = node_name,
                        tag.name = %tag_name,
                        tag.value = mapping.label_value,
                        "Staging tag"
                    );
                    staged.insert(tag_name.clone(), mapping.label_value.to_string());
                    adopted.push(tag_name.clone());
                }
                Decision::KeepAndReport => {
                    let diagnostic = Diagnostic::Conflict {
                        pass,
                        key: tag_name.clone(),
                        existing: existing.unwrap_or_default().to_string(),
                        incoming: mapping.label_value.to_string(),
                    };
                    self.report(node_name, &diagnostic, outcome).await;
                }
                Decision::Skip => {}
            }
        }

        Ok((staged, adopted))
    }

    async fn write_labels(
        &self,
        node_name: &str,
        read: &NodeLabelSnapshot,
        staged: &LabelMap,
        applied: usize,
    ) -> Result<(), SyncError> {
        self.labels
            .set_labels(node_name, read, staged)
            .await
            .map_err(|source| SyncError::PersistLabels {
                node: node_name.to_string(),
                source,
            })?;
        metrics::increment_labels_applied(applied);
        info!(node.name = node_name, count = applied, "Applied ARM tags to node labels");
        Ok(())
    }

    async fn write_tags(
        &self,
        node_name: &str,
        resource: &ResourceIdentity,
        staged: &TagMap,
        applied: usize,
    ) -> Result<(), SyncError> {
        self.tags
            .set_tags(resource, staged)
            .await
            .map_err(|source| SyncError::PersistTags {
                resource: resource.to_string(),
                source,
            })?;
        metrics::increment_tags_applied(applied);
        info!(
            node.name = node_name,
            resource = %resource,
            count = applied,
            "Applied node labels to ARM tags"
        );
        Ok(())
    }

    async fn report(&self, node_name: &str, diagnostic: &Diagnostic, outcome: &mut SyncOutcome) {
        outcome.diagnostics += 1;
        match diagnostic {
            Diagnostic::Conflict { pass, .. } => metrics::increment_conflicts(pass.as_str()),
            other => metrics::increment_skipped_keys(other.reason()),
        }
        let reason = diagnostic.reason();
        match diagnostic {
            Diagnostic::InvalidTagName { label } => {
                info!(node.name = node_name, label.name = %label, reason, "{}", diagnostic.message());
            }
            _ => warn!(node.name = node_name, reason, "{}", diagnostic.message()),
        }
        self.diagnostics.report(node_name, diagnostic).await;
    }
}
