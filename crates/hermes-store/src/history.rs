//! Historical association handling.
//!
//! Inactive concepts point at their replacements through association
//! refsets (SAME AS, REPLACED BY, …). Which associations participate in a
//! query expansion is a profile choice, resolved against the installed
//! refsets rather than hard-coded.

use hashbrown::HashSet;
use hermes_types::{well_known, FieldId, RefsetBody, SctId};

use crate::error::StoreResult;
use crate::store::ComponentStore;

/// How wide a net a history supplement casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryProfile {
    /// SAME AS only.
    Min,
    /// SAME AS, REPLACED BY, POSSIBLY EQUIVALENT TO, PARTIALLY EQUIVALENT TO.
    Mod,
    /// Every installed historical association refset.
    #[default]
    Max,
}

/// Resolves a history profile to the installed association refsets it
/// covers.
///
/// `Max` is every installed refset subsumed by the historical-association
/// metadata concept; the narrower profiles intersect a fixed list with the
/// installed set.
pub fn historical_refsets(
    store: &ComponentStore,
    profile: HistoryProfile,
) -> StoreResult<Vec<SctId>> {
    let installed = store.installed_refsets()?;
    let chosen: Vec<SctId> = match profile {
        HistoryProfile::Min => installed
            .into_iter()
            .filter(|id| *id == well_known::SAME_AS)
            .collect(),
        HistoryProfile::Mod => {
            const MODERATE: [SctId; 4] = [
                well_known::SAME_AS,
                well_known::REPLACED_BY,
                well_known::POSSIBLY_EQUIVALENT_TO,
                well_known::PARTIALLY_EQUIVALENT_TO,
            ];
            installed
                .into_iter()
                .filter(|id| MODERATE.contains(id))
                .collect()
        }
        HistoryProfile::Max => {
            let mut out = Vec::new();
            for refset in installed {
                if refset == well_known::HISTORICAL_ASSOCIATION
                    || store
                        .all_parent_ids(refset)?
                        .binary_search(&well_known::HISTORICAL_ASSOCIATION)
                        .is_ok()
                {
                    out.push(refset);
                }
            }
            out
        }
    };
    Ok(chosen)
}

/// Closes a set of concept ids under the given historical association
/// refsets, in both directions: an inactive concept pulls in its
/// replacements, and an active concept pulls in the inactive concepts it
/// replaced.
pub fn with_historical(
    store: &ComponentStore,
    ids: &[SctId],
    refsets: &[SctId],
) -> StoreResult<HashSet<SctId>> {
    let mut out: HashSet<SctId> = ids.iter().copied().collect();
    for &id in ids {
        // Forward: associations where this concept is the referenced
        // component point at its replacements.
        for item in store.refset_items_of(id)? {
            if !item.active || !refsets.contains(&item.refset_id) {
                continue;
            }
            if let RefsetBody::Association { target_component_id } = item.body {
                out.insert(target_component_id);
            }
        }
        // Reverse: associations targeting this concept name the inactive
        // concepts it replaced, found through the reverse field index.
        for &refset in refsets {
            for item in store.members_with_field_prefix(
                refset,
                FieldId::TargetComponentId,
                &id.to_be_bytes(),
            )? {
                if item.active {
                    out.insert(item.referenced_component_id);
                }
            }
        }
    }
    Ok(out)
}
