//! Common-ancestor recovery from base fingerprints.

use serde::{Deserialize, Serialize};

use scene_types::{Element, Fingerprint};

use crate::error::MergeResult;

/// Which side moved away from the common ancestor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Divergence {
    Unchanged,
    SourceChanged,
    TargetChanged,
    BothChanged,
}

/// Recover the content both rows last agreed on.
///
/// - equal bases: that base;
/// - exactly one base: that base;
/// - two different bases: the one matching the other side's current
///   content, otherwise the source's base;
/// - no base at all: unknown.
pub fn resolve_ancestor(source: &Element, target: &Element) -> MergeResult<Option<Fingerprint>> {
    let ancestor = match (source.base_fingerprint, target.base_fingerprint) {
        (Some(s), Some(t)) if s == t => Some(s),
        (Some(s), None) => Some(s),
        (None, Some(t)) => Some(t),
        (Some(s), Some(t)) => {
            if s == target.content_fingerprint()? {
                Some(s)
            } else if t == source.content_fingerprint()? {
                Some(t)
            } else {
                Some(s)
            }
        }
        (None, None) => None,
    };
    Ok(ancestor)
}

/// Classify how `source` and `target` moved relative to their ancestor.
///
/// Without a known ancestor, differing content counts as changed on both
/// sides.
pub fn divergence(source: &Element, target: &Element) -> MergeResult<Divergence> {
    let source_fp = source.content_fingerprint()?;
    let target_fp = target.content_fingerprint()?;
    let (source_changed, target_changed) = match resolve_ancestor(source, target)? {
        Some(ancestor) => (source_fp != ancestor, target_fp != ancestor),
        None => {
            let differs = source_fp != target_fp;
            (differs, differs)
        }
    };
    Ok(match (source_changed, target_changed) {
        (false, false) => Divergence::Unchanged,
        (true, false) => Divergence::SourceChanged,
        (false, true) => Divergence::TargetChanged,
        (true, true) => Divergence::BothChanged,
    })
}
