//! The index phase: a full rebuild of the derived buckets.
//!
//! Indexing streams the primary buckets into memory, computes the derived
//! state (relationship indices, transitive IS-A closure, refset membership
//! and reverse-field indices, locale caches), then writes everything in one
//! LMDB transaction. The rebuild is atomic: readers see either the previous
//! derived state or the new one.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use chrono::NaiveDate;
use hermes_types::codec::{encode_id_map, encode_refset_item};
use hermes_types::{sctid, well_known, Partition, RefsetBody, RefsetItem, SctId};

use crate::error::StoreResult;
use crate::keys;
use crate::store::ComponentStore;

/// Counters reported by a completed index rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Active relationship rows indexed.
    pub relationships: usize,
    /// Concepts with at least one ancestor.
    pub concepts_with_ancestors: usize,
    /// Installed refsets.
    pub installed_refsets: usize,
    /// Active refset members indexed.
    pub refset_members: usize,
    /// Raw members reified to a typed variant.
    pub reified: usize,
    /// Preferred-synonym cache entries.
    pub preferred_synonyms: usize,
}

/// Rebuilds every derived bucket from the primary buckets.
pub fn index(store: &ComponentStore) -> StoreResult<IndexStats> {
    store.require_write()?;
    let mut stats = IndexStats::default();

    // Phase one: relationships and the IS-A closure.
    let mut src_keys: Vec<[u8; 32]> = Vec::new();
    let mut dst_keys: Vec<[u8; 32]> = Vec::new();
    let mut direct_parents: HashMap<SctId, BTreeMap<SctId, Vec<SctId>>> = HashMap::new();
    let mut direct_children: HashMap<SctId, BTreeMap<SctId, Vec<SctId>>> = HashMap::new();
    let mut isa_parents: HashMap<SctId, Vec<SctId>> = HashMap::new();

    store.for_each_relationship(|r| {
        if !r.active {
            return Ok(());
        }
        src_keys.push(keys::relationship(r.source_id, r.type_id, r.destination_id, r.id));
        dst_keys.push(keys::relationship(r.destination_id, r.type_id, r.source_id, r.id));
        direct_parents
            .entry(r.source_id)
            .or_default()
            .entry(r.type_id)
            .or_default()
            .push(r.destination_id);
        direct_children
            .entry(r.destination_id)
            .or_default()
            .entry(r.type_id)
            .or_default()
            .push(r.source_id);
        if r.is_a() {
            isa_parents.entry(r.source_id).or_default().push(r.destination_id);
        }
        Ok(())
    })?;
    stats.relationships = src_keys.len();

    let ancestors = transitive_ancestors(&isa_parents);
    stats.concepts_with_ancestors = ancestors.len();
    let mut descendants: HashMap<SctId, Vec<SctId>> = HashMap::new();
    for (&concept, ancs) in &ancestors {
        for &a in ancs {
            descendants.entry(a).or_default().push(concept);
        }
    }
    for set in descendants.values_mut() {
        set.sort_unstable();
        set.dedup();
    }

    // Fold the closure under the IS-A key of the per-type maps.
    let mut parent_values: Vec<(SctId, Vec<u8>)> = Vec::with_capacity(direct_parents.len());
    {
        let mut touched: HashSet<SctId> = direct_parents.keys().copied().collect();
        touched.extend(ancestors.keys().copied());
        for concept in touched {
            let mut map = direct_parents.remove(&concept).unwrap_or_default();
            for ids in map.values_mut() {
                ids.sort_unstable();
                ids.dedup();
            }
            if let Some(ancs) = ancestors.get(&concept) {
                map.insert(well_known::IS_A, ancs.clone());
            }
            parent_values.push((concept, encode_id_map(&map)));
        }
    }
    let mut child_values: Vec<(SctId, Vec<u8>)> = Vec::with_capacity(direct_children.len());
    {
        let mut touched: HashSet<SctId> = direct_children.keys().copied().collect();
        touched.extend(descendants.keys().copied());
        for concept in touched {
            let mut map = direct_children.remove(&concept).unwrap_or_default();
            for ids in map.values_mut() {
                ids.sort_unstable();
                ids.dedup();
            }
            if let Some(descs) = descendants.get(&concept) {
                map.insert(well_known::IS_A, descs.clone());
            }
            child_values.push((concept, encode_id_map(&map)));
        }
    }

    // Phase two: refset members. Descriptor arities are prefetched so the
    // walk holds a single read transaction.
    let arities = store.descriptor_arities()?;
    let mut installed: HashSet<SctId> = HashSet::new();
    let mut member_keys: Vec<([u8; 32], [u8; 24])> = Vec::new();
    let mut field_keys: Vec<Vec<u8>> = Vec::new();
    let mut rewrites: Vec<(Uuid, Vec<u8>)> = Vec::new();
    // (refset, descriptionId, acceptabilityId, effectiveTime) rows feeding
    // the locale caches once descriptions can be resolved.
    let mut language_rows: Vec<(SctId, SctId, SctId, NaiveDate)> = Vec::new();

    store.for_each_refset_item_raw(|mut item| {
        if !item.active {
            return Ok(());
        }
        if let RefsetBody::Raw { .. } = item.body {
            let arity = arities.get(&item.refset_id).copied();
            if let Some(body) = reify_raw(arity, &item, &ancestors) {
                item.body = body;
                rewrites.push((item.id, encode_refset_item(&item)));
                stats.reified += 1;
            }
        }
        installed.insert(item.refset_id);
        member_keys.push((
            keys::component_refset_item(item.referenced_component_id, item.refset_id, &item.id),
            keys::refset_item(item.refset_id, &item.id),
        ));
        for (field, value) in item.body.fields() {
            field_keys.push(keys::field_reverse(
                item.refset_id,
                field,
                &value.to_bytes(),
                &item.id,
            ));
        }
        if let RefsetBody::Language { acceptability_id } = item.body {
            language_rows.push((
                item.refset_id,
                item.referenced_component_id,
                acceptability_id,
                item.effective_time,
            ));
        }
        Ok(())
    })?;

    // (concept, refset) -> (effectiveTime, descriptionId), latest wins.
    let mut preferred: HashMap<(SctId, SctId), (NaiveDate, SctId)> = HashMap::new();
    let mut acceptability_entries: Vec<([u8; 16], SctId)> = Vec::new();
    for (refset_id, description_id, acceptability_id, effective_time) in language_rows {
        let Some(description) = store.description(description_id)? else {
            continue;
        };
        acceptability_entries.push((
            keys::acceptability(description.id, refset_id),
            acceptability_id,
        ));
        if acceptability_id == well_known::PREFERRED
            && description.active
            && description.is_synonym()
        {
            let entry = preferred
                .entry((description.concept_id, refset_id))
                .or_insert((effective_time, description.id));
            if effective_time > entry.0 {
                *entry = (effective_time, description.id);
            }
        }
    }
    stats.installed_refsets = installed.len();
    stats.refset_members = member_keys.len();
    stats.preferred_synonyms = preferred.len();

    for report in module_dependency_report(store)? {
        if !report.valid {
            warn!(
                module = report.module_id,
                referenced = report.referenced_module_id,
                reason = report.reason.as_deref().unwrap_or(""),
                "module dependency unsatisfied"
            );
        }
    }

    // Phase three: one atomic write of the whole derived state.
    let mut wtxn = store.env.write_txn()?;
    let b = &store.buckets;
    b.source_relationships.clear(&mut wtxn)?;
    b.destination_relationships.clear(&mut wtxn)?;
    b.concept_parents.clear(&mut wtxn)?;
    b.concept_children.clear(&mut wtxn)?;
    b.component_refset_items.clear(&mut wtxn)?;
    b.refset_items.clear(&mut wtxn)?;
    b.installed_refsets.clear(&mut wtxn)?;
    b.refset_field_reverse.clear(&mut wtxn)?;
    b.preferred_synonyms.clear(&mut wtxn)?;
    b.acceptability.clear(&mut wtxn)?;

    for key in &src_keys {
        b.source_relationships.put(&mut wtxn, key, &[])?;
    }
    for key in &dst_keys {
        b.destination_relationships.put(&mut wtxn, key, &[])?;
    }
    for (concept, value) in &parent_values {
        b.concept_parents.put(&mut wtxn, &keys::id(*concept), value)?;
    }
    for (concept, value) in &child_values {
        b.concept_children.put(&mut wtxn, &keys::id(*concept), value)?;
    }
    for (component_key, refset_key) in &member_keys {
        b.component_refset_items.put(&mut wtxn, component_key, &[])?;
        b.refset_items.put(&mut wtxn, refset_key, &[])?;
    }
    for refset in &installed {
        b.installed_refsets.put(&mut wtxn, &keys::id(*refset), &[])?;
    }
    for key in &field_keys {
        b.refset_field_reverse.put(&mut wtxn, key, &[])?;
    }
    for (uuid, bytes) in &rewrites {
        b.refset_item.put(&mut wtxn, &keys::uuid(uuid), bytes)?;
    }
    for ((concept, refset), (_, description)) in &preferred {
        b.preferred_synonyms.put(
            &mut wtxn,
            &keys::preferred_synonym(*concept, *refset),
            &keys::id(*description),
        )?;
    }
    for (key, acceptability_id) in &acceptability_entries {
        b.acceptability.put(&mut wtxn, key, &keys::id(*acceptability_id))?;
    }
    store.mark_indexed(&mut wtxn)?;
    wtxn.commit()?;

    info!(
        relationships = stats.relationships,
        refsets = stats.installed_refsets,
        members = stats.refset_members,
        preferred = stats.preferred_synonyms,
        "index rebuild complete"
    );
    Ok(stats)
}

/// Computes the transitive ancestor set of every concept with a parent.
///
/// Sets come back sorted and deduplicated, ready for the packed id-map
/// encoding.
fn transitive_ancestors(
    isa_parents: &HashMap<SctId, Vec<SctId>>,
) -> HashMap<SctId, Vec<SctId>> {
    let concepts: Vec<SctId> = isa_parents.keys().copied().collect();
    let pairs: Vec<(SctId, Vec<SctId>)> = concepts
        .into_par_iter()
        .map(|concept| {
            let mut seen: HashSet<SctId> = HashSet::new();
            let mut queue: Vec<SctId> = isa_parents
                .get(&concept)
                .map(|v| v.clone())
                .unwrap_or_default();
            while let Some(current) = queue.pop() {
                if seen.insert(current) {
                    if let Some(parents) = isa_parents.get(&current) {
                        queue.extend_from_slice(parents);
                    }
                }
            }
            let mut ancestors: Vec<SctId> = seen.into_iter().collect();
            ancestors.sort_unstable();
            (concept, ancestors)
        })
        .collect();
    pairs.into_iter().collect()
}

/// Attempts to reify a raw refset member to a typed variant, using the
/// refset's ancestry, the partition of the referenced component, and the
/// descriptor-declared field count.
fn reify_raw(
    declared_fields: Option<usize>,
    item: &RefsetItem,
    ancestors: &HashMap<SctId, Vec<SctId>>,
) -> Option<RefsetBody> {
    let RefsetBody::Raw { values } = &item.body else {
        return None;
    };
    let refset_ancestry = ancestors.get(&item.refset_id);
    let is_descendant_of = |root: SctId| {
        item.refset_id == root
            || refset_ancestry.is_some_and(|a| a.binary_search(&root).is_ok())
    };
    // The descriptor declares the referenced component as field zero, so a
    // refset with n extra columns carries n + 1 descriptor rows.
    if let Some(declared) = declared_fields {
        if declared != values.len() + 1 {
            debug!(
                refset = item.refset_id,
                declared,
                found = values.len(),
                "raw member disagrees with descriptor arity"
            );
        }
    }

    let body = match values.as_slice() {
        [] => Some(RefsetBody::Simple),
        [single] => {
            if let Ok(id) = single.parse::<SctId>() {
                if is_descendant_of(well_known::HISTORICAL_ASSOCIATION) {
                    Some(RefsetBody::Association { target_component_id: id })
                } else if sctid::partition(item.referenced_component_id)
                    == Some(Partition::Description)
                    && (id == well_known::PREFERRED || id == well_known::ACCEPTABLE)
                {
                    Some(RefsetBody::Language { acceptability_id: id })
                } else {
                    Some(RefsetBody::AttributeValue { value_id: id })
                }
            } else {
                Some(RefsetBody::SimpleMap {
                    map_target: single.clone(),
                })
            }
        }
        [group, priority, rule, advice, target, correlation] => {
            match (group.parse(), priority.parse(), correlation.parse()) {
                (Ok(map_group), Ok(map_priority), Ok(correlation_id)) => {
                    Some(RefsetBody::ComplexMap {
                        map_group,
                        map_priority,
                        map_rule: rule.clone(),
                        map_advice: advice.clone(),
                        map_target: target.clone(),
                        correlation_id,
                    })
                }
                _ => None,
            }
        }
        [group, priority, rule, advice, target, correlation, category] => {
            match (group.parse(), priority.parse(), correlation.parse(), category.parse()) {
                (Ok(map_group), Ok(map_priority), Ok(correlation_id), Ok(map_category_id)) => {
                    Some(RefsetBody::ExtendedMap {
                        map_group,
                        map_priority,
                        map_rule: rule.clone(),
                        map_advice: advice.clone(),
                        map_target: target.clone(),
                        correlation_id,
                        map_category_id,
                    })
                }
                _ => None,
            }
        }
        _ => None,
    };
    body
}

/// One validated module-dependency row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModuleDependencyReport {
    /// The member row.
    pub id: Uuid,
    /// The depending module.
    pub module_id: SctId,
    /// The module depended upon.
    pub referenced_module_id: SctId,
    /// Version of the depending module.
    pub source_effective_time: NaiveDate,
    /// Required version of the depended-on module.
    pub target_effective_time: NaiveDate,
    /// Whether the cited target version is present.
    pub valid: bool,
    /// Why validation failed, when it did.
    pub reason: Option<String>,
}

/// Validates the module-dependency refset.
///
/// The known versions of a module are those cited as source effective times
/// in its own dependency rows; a row is valid when its target module is
/// known at the cited target effective time.
pub fn module_dependency_report(
    store: &ComponentStore,
) -> StoreResult<Vec<ModuleDependencyReport>> {
    let mut rows: Vec<(Uuid, SctId, SctId, NaiveDate, NaiveDate)> = Vec::new();
    let mut known: HashMap<SctId, HashSet<NaiveDate>> = HashMap::new();
    store.for_each_refset_item_raw(|item| {
        if !item.active || item.refset_id != well_known::MODULE_DEPENDENCY_REFSET {
            return Ok(());
        }
        if let RefsetBody::ModuleDependency {
            source_effective_time,
            target_effective_time,
        } = item.body
        {
            known
                .entry(item.module_id)
                .or_default()
                .insert(source_effective_time);
            known
                .entry(item.module_id)
                .or_default()
                .insert(item.effective_time);
            rows.push((
                item.id,
                item.module_id,
                item.referenced_component_id,
                source_effective_time,
                target_effective_time,
            ));
        }
        Ok(())
    })?;

    Ok(rows
        .into_iter()
        .map(|(id, module_id, referenced, source, target)| {
            let valid = known
                .get(&referenced)
                .is_some_and(|versions| versions.contains(&target));
            ModuleDependencyReport {
                id,
                module_id,
                referenced_module_id: referenced,
                source_effective_time: source,
                target_effective_time: target,
                valid,
                reason: (!valid).then(|| {
                    format!(
                        "module {referenced} has no known version at {target}"
                    )
                }),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitive_ancestors_diamond() {
        // 4 -> {2, 3}, 2 -> 1, 3 -> 1.
        let mut parents: HashMap<SctId, Vec<SctId>> = HashMap::new();
        parents.insert(4, vec![2, 3]);
        parents.insert(2, vec![1]);
        parents.insert(3, vec![1]);

        let ancestors = transitive_ancestors(&parents);
        assert_eq!(ancestors[&4], vec![1, 2, 3]);
        assert_eq!(ancestors[&2], vec![1]);
        assert_eq!(ancestors[&3], vec![1]);
        assert!(!ancestors.contains_key(&1));
    }

    #[test]
    fn test_transitive_ancestors_deep_chain() {
        let mut parents: HashMap<SctId, Vec<SctId>> = HashMap::new();
        for i in 1..200i64 {
            parents.insert(i + 1, vec![i]);
        }
        let ancestors = transitive_ancestors(&parents);
        assert_eq!(ancestors[&200].len(), 199);
        assert_eq!(ancestors[&200][0], 1);
    }
}
