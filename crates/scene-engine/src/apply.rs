//! Applying a clean merge plan to the target branch.

use std::collections::HashMap;

use tracing::warn;

use scene_merge::{MergeAction, MergePlan};
use scene_sync::{parents_first, ElementService, NewElement};
use scene_types::{Branch, Element, ElementId, Fingerprint, LineageId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Applied {
    pub applied: usize,
    pub failed: usize,
}

/// Apply every action of `plan` to `target`, best effort.
///
/// Creates run parents first so their parent links can point at rows that
/// already exist in the target. Each update and delete is a compare-and-swap
/// against the target row the plan was computed from; a concurrent edit
/// makes that action fail instead of being overwritten. Successfully merged
/// pairs are re-anchored on both sides to the merged content.
pub(crate) async fn apply_plan(
    service: &dyn ElementService,
    target: &Branch,
    source_rows: &[Element],
    target_rows: &[Element],
    plan: MergePlan,
) -> Applied {
    let source_lineage: HashMap<ElementId, LineageId> =
        source_rows.iter().map(|e| (e.id, e.lineage_id)).collect();
    let mut target_ids: HashMap<LineageId, ElementId> = target_rows
        .iter()
        .filter(|e| e.is_live())
        .map(|e| (e.lineage_id, e.id))
        .collect();

    let mut creates = Vec::new();
    let mut updates = Vec::new();
    let mut deletes = Vec::new();
    for action in plan.actions {
        match action {
            MergeAction::Create { source } => creates.push(source),
            MergeAction::Update { source, target } => updates.push((source, target)),
            MergeAction::Delete { target, .. } => deletes.push(target),
        }
    }

    let mut result = Applied::default();

    for source in parents_first(&creates) {
        let Some(fp) = fingerprint(source) else {
            result.failed += 1;
            continue;
        };
        let mut new = NewElement::copy_of(source, target.scene_id, target.id);
        new.base_fingerprint = Some(fp);
        new.parent_id = source
            .parent_id
            .and_then(|p| source_lineage.get(&p))
            .and_then(|lineage| target_ids.get(lineage))
            .copied();
        match service.create_element(new).await {
            Ok(created) => {
                target_ids.insert(created.lineage_id, created.id);
                result.applied += 1;
                reanchor(service, source, fp).await;
            }
            Err(e) => {
                warn!(lineage_id = %source.lineage_id, error = %e, "failed to create merged element");
                result.failed += 1;
            }
        }
    }

    for (source, mut row) in updates {
        let Some(fp) = fingerprint(&source) else {
            result.failed += 1;
            continue;
        };
        row.take_content_from(&source);
        row.base_fingerprint = Some(fp);
        match service.update_with_base(row).await {
            Ok(_) => {
                result.applied += 1;
                reanchor(service, &source, fp).await;
            }
            Err(e) => {
                warn!(lineage_id = %source.lineage_id, error = %e, "failed to update merged element");
                result.failed += 1;
            }
        }
    }

    for mut row in deletes {
        row.mark_deleted();
        let id = row.id;
        match service.update_element(row).await {
            Ok(_) => result.applied += 1,
            Err(e) => {
                warn!(element_id = %id, error = %e, "failed to delete merged element");
                result.failed += 1;
            }
        }
    }

    result
}

fn fingerprint(element: &Element) -> Option<Fingerprint> {
    match element.content_fingerprint() {
        Ok(fp) => Some(fp),
        Err(e) => {
            warn!(element_id = %element.id, error = %e, "cannot fingerprint element");
            None
        }
    }
}

/// Record `fp` as the source row's ancestor so the next merge compares
/// against the merged state. This is a write, so the source row's version
/// advances. Failures are logged only.
async fn reanchor(service: &dyn ElementService, source: &Element, fp: Fingerprint) {
    if source.base_fingerprint == Some(fp) {
        return;
    }
    let mut row = source.clone();
    row.base_fingerprint = Some(fp);
    if let Err(e) = service.update_with_base(row).await {
        warn!(element_id = %source.id, error = %e, "failed to re-anchor source element");
    }
}
