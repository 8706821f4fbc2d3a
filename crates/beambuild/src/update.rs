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

//! Bringing the graph in sync with the filesystem: new files get scanned
//! and linked, touched files get re-scanned, vanished files drop out.

use indexmap::IndexSet;
use std::path::{Path, PathBuf};

use beamutil::common::{INCLUDE_DIR, mtime_of};

use crate::graph::DepGraph;
use crate::resolve::{LibraryLocator, resolve};
use crate::scan::scan_file;

/// Sync `graph` against `sources` under the given include roots. Returns
/// whether anything in the graph changed, so the caller knows to persist it
/// once the build is done.
pub fn update_graph(
    graph: &mut DepGraph,
    project_dir: &Path,
    include_roots: &[PathBuf],
    sources: &[PathBuf],
    locator: &dyn LibraryLocator,
) -> bool {
    let mut search_dirs: IndexSet<PathBuf> = IndexSet::new();
    search_dirs.insert(project_dir.join(INCLUDE_DIR));
    search_dirs.extend(include_roots.iter().cloned());
    for source in sources {
        if let Some(dir) = source.parent() {
            search_dirs.insert(dir.to_path_buf());
        }
    }
    let search_dirs: Vec<PathBuf> = search_dirs.into_iter().collect();

    let mut modified = false;
    for source in sources {
        modified |= update_vertex(graph, &search_dirs, source, locator);
    }
    modified |= sweep_vanished(graph);
    modified
}

/// One vertex against the filesystem. A vertex whose mtime is unchanged is
/// left alone without recursing into its references; that early return is
/// also what keeps include cycles from looping. The recompile decision does
/// not rely on this shortcut, it re-reads live mtimes.
fn update_vertex(
    graph: &mut DepGraph,
    search_dirs: &[PathBuf],
    file: &Path,
    locator: &dyn LibraryLocator,
) -> bool {
    let live = mtime_of(file);
    match graph.mtime(file) {
        None => {
            if live == 0 {
                return false;
            }
            graph.add_vertex(file.to_path_buf(), live);
            link_references(graph, search_dirs, file, locator);
            true
        }
        Some(_) if live == 0 => {
            graph.remove_vertex(file);
            true
        }
        Some(stored) if live > stored => {
            graph.add_vertex(file.to_path_buf(), live);
            graph.clear_out_edges(file);
            link_references(graph, search_dirs, file, locator);
            true
        }
        Some(_) => false,
    }
}

fn link_references(
    graph: &mut DepGraph,
    search_dirs: &[PathBuf],
    file: &Path,
    locator: &dyn LibraryLocator,
) {
    let refs = match scan_file(file) {
        Ok(refs) => refs,
        Err(e) => {
            tracing::debug!("failed to scan `{}`: {}", file.display(), e);
            return;
        }
    };
    let referring_dir = file.parent().unwrap_or(Path::new("/"));
    for r in &refs {
        let Some(resolved) = resolve(r, referring_dir, search_dirs, locator) else {
            continue;
        };
        update_vertex(graph, search_dirs, &resolved, locator);
        graph.add_edge(file, &resolved);
    }
}

/// Drop every vertex whose file no longer exists. Sources are handled by
/// `update_vertex`; this also catches headers nothing references anymore.
fn sweep_vanished(graph: &mut DepGraph) -> bool {
    let gone: Vec<PathBuf> = graph
        .vertices()
        .filter(|(p, _)| mtime_of(p) == 0)
        .map(|(p, _)| p.clone())
        .collect();
    let modified = !gone.is_empty();
    for p in gone {
        graph.remove_vertex(&p);
    }
    modified
}
