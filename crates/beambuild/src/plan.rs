// beamake: An incremental build driver for BEAM modules.
// Copyright (C) 2024 International Digital Economy Academy
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// For inquiries, you can contact us via e-mail at jichuruanjian@idea.edu.cn.

//! Compile ordering. Three groups: the files the user listed first, then
//! files other sources depend on (behaviours, parse transforms) ordered
//! before their users, then everything else in discovery order. The same
//! inputs always produce the same plan.

use indexmap::{IndexMap, IndexSet};
use std::path::PathBuf;

use beamutil::common::ERL_EXT;
use beamutil::path::has_extension;

use crate::graph::DepGraph;

/// Deduplicate `a` preserving first occurrence, then append the elements of
/// `b` not already present.
pub fn uo_merge(a: &[PathBuf], b: &[PathBuf]) -> Vec<PathBuf> {
    let mut merged: IndexSet<PathBuf> = IndexSet::new();
    merged.extend(a.iter().cloned());
    merged.extend(b.iter().cloned());
    merged.into_iter().collect()
}

/// Order `all_sources` for compilation. `first_files` entries not present
/// in `all_sources` are ignored; the user may carry a stale list.
pub fn plan(graph: &DepGraph, all_sources: &[PathBuf], first_files: &[PathBuf]) -> Vec<PathBuf> {
    let source_set: IndexSet<&PathBuf> = all_sources.iter().collect();
    let first_set: IndexSet<&PathBuf> = first_files.iter().collect();

    let explicit: Vec<PathBuf> = {
        let mut seen = IndexSet::new();
        first_files
            .iter()
            .filter(|f| source_set.contains(f) && seen.insert(*f))
            .cloned()
            .collect()
    };
    let rest: Vec<PathBuf> = all_sources
        .iter()
        .filter(|s| !first_set.contains(s))
        .cloned()
        .collect();

    // one reachability pass per source, reused for both partitions
    let mut parents: IndexMap<PathBuf, Vec<PathBuf>> = IndexMap::new();
    let mut dependent_count: IndexMap<PathBuf, usize> = IndexMap::new();
    for s in &rest {
        let reachable: Vec<PathBuf> = graph
            .parents_of(s)
            .into_iter()
            .filter(|p| has_extension(p, ERL_EXT) && p != s)
            .collect();
        for p in &reachable {
            *dependent_count.entry(p.clone()).or_default() += 1;
        }
        parents.insert(s.clone(), reachable);
    }
    for f in &explicit {
        for p in graph.parents_of(f) {
            if has_extension(&p, ERL_EXT) && p != *f {
                *dependent_count.entry(p).or_default() += 1;
            }
        }
    }

    let implicit: Vec<PathBuf> = rest
        .iter()
        .filter(|f| dependent_count.get(*f).copied().unwrap_or(0) > 0)
        .cloned()
        .collect();

    let rest_set: IndexSet<&PathBuf> = rest.iter().collect();
    let implicit_parents: Vec<PathBuf> = implicit
        .iter()
        .flat_map(|f| parents[f].iter())
        .filter(|p| rest_set.contains(p))
        .cloned()
        .collect();
    let ordered_implicit: Vec<PathBuf> = uo_merge(&implicit_parents, &implicit)
        .into_iter()
        // explicit placement wins; never schedule a file twice
        .filter(|f| !first_set.contains(f))
        .collect();

    let implicit_set: IndexSet<&PathBuf> = ordered_implicit.iter().collect();
    let tail: Vec<PathBuf> = rest
        .iter()
        .filter(|f| !implicit_set.contains(f))
        .cloned()
        .collect();

    let mut out = explicit;
    out.extend(ordered_implicit);
    out.extend(tail);
    out
}
