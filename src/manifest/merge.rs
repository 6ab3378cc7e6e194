//! Flat version reconciliation of N candidate manifests into the workspace
//! manifest.
//!
//! # Precedence
//!
//! 1. Within one tier, a package seen in several candidates gets the highest
//!    version.
//! 2. A package pinned in the skeleton's `direct` tier keeps the skeleton's
//!    version, whatever the candidates say.
//! 3. Otherwise a package already present in the skeleton's same tier gets
//!    the higher of the two versions; anything else is adopted as combined.
//! 4. Finally every package in `direct` is removed from `indirect`.
//!
//! There is no graph resolution: versions are compared, never solved.

use std::collections::btree_map::Entry;

use tracing::debug;

use super::{Manifest, Pins, Tiers};

/// Combine one tier across candidates, keeping the highest version per
/// package.
pub fn combine_tier<'a>(tiers: impl IntoIterator<Item = &'a Pins>) -> Pins {
    let mut combined = Pins::new();
    for pins in tiers {
        for (package, version) in pins {
            match combined.entry(package.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(*version);
                }
                Entry::Occupied(mut slot) => {
                    if version > slot.get() {
                        slot.insert(*version);
                    }
                }
            }
        }
    }
    combined
}

/// Reconcile candidate dependency tiers with the skeleton's.
#[must_use]
pub fn merge_tiers(skeleton: &Tiers, candidates: &[&Tiers]) -> Tiers {
    let combined_direct = combine_tier(candidates.iter().map(|t| &t.direct));
    let combined_indirect = combine_tier(candidates.iter().map(|t| &t.indirect));

    let mut direct = skeleton.direct.clone();
    for (package, version) in combined_direct {
        match direct.entry(package) {
            Entry::Occupied(pinned) => {
                if *pinned.get() != version {
                    debug!(
                        package = pinned.key().as_str(),
                        skeleton = %pinned.get(),
                        candidate = %version,
                        "skeleton pin wins over candidate version"
                    );
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(version);
            }
        }
    }

    let mut indirect = skeleton.indirect.clone();
    for (package, version) in combined_indirect {
        if skeleton.direct.contains_key(&package) {
            continue;
        }
        indirect
            .entry(package)
            .and_modify(|existing| *existing = (*existing).max(version))
            .or_insert(version);
    }

    indirect.retain(|package, _| {
        let keep = !direct.contains_key(package);
        if !keep {
            debug!(package = package.as_str(), "demoted out of indirect");
        }
        keep
    });

    Tiers { direct, indirect }
}

/// Produce the workspace manifest from the skeleton and every candidate.
///
/// Only the dependency tiers are merged; every other field is the
/// skeleton's, so `source-directories` and `elm-version` stay as the harness
/// expects them.
#[must_use]
pub fn merge_manifests(skeleton: &Manifest, candidates: &[Manifest]) -> Manifest {
    let tiers: Vec<&Tiers> = candidates.iter().map(|m| &m.dependencies).collect();
    let dependencies = merge_tiers(&skeleton.dependencies, &tiers);
    debug!(
        direct = dependencies.direct.len(),
        indirect = dependencies.indirect.len(),
        candidates = candidates.len(),
        "merged manifests"
    );
    Manifest {
        dependencies,
        ..skeleton.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
