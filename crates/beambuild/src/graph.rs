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

//! The dependency graph: vertices are absolute file paths carrying the
//! mtime seen at the last update, edges point from a file to what it
//! references. Both adjacency directions are kept so ancestor and
//! descendant queries are a single traversal each.

use anyhow::Context;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const GRAPH_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default)]
struct Vertex {
    mtime: u64,
    out: IndexSet<PathBuf>,
    ins: IndexSet<PathBuf>,
}

#[derive(Debug, Default)]
pub struct DepGraph {
    vertices: IndexMap<PathBuf, Vertex>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.vertices.contains_key(path)
    }

    /// The stored last-seen mtime, if `path` is a vertex.
    pub fn mtime(&self, path: &Path) -> Option<u64> {
        self.vertices.get(path).map(|v| v.mtime)
    }

    /// Insert a vertex or refresh its timestamp.
    pub fn add_vertex(&mut self, path: PathBuf, mtime: u64) {
        self.vertices.entry(path).or_default().mtime = mtime;
    }

    /// Remove a vertex and every edge touching it.
    pub fn remove_vertex(&mut self, path: &Path) {
        let Some(vertex) = self.vertices.shift_remove(path) else {
            return;
        };
        for to in &vertex.out {
            if let Some(v) = self.vertices.get_mut(to) {
                v.ins.shift_remove(path);
            }
        }
        for from in &vertex.ins {
            if let Some(v) = self.vertices.get_mut(from) {
                v.out.shift_remove(path);
            }
        }
    }

    /// Drop the outgoing edges of `path`, keeping the vertex.
    pub fn clear_out_edges(&mut self, path: &Path) {
        let Some(vertex) = self.vertices.get_mut(path) else {
            return;
        };
        let out = std::mem::take(&mut vertex.out);
        for to in &out {
            if let Some(v) = self.vertices.get_mut(to) {
                v.ins.shift_remove(path);
            }
        }
    }

    /// Add `from -> to`. Both endpoints must already be vertices; the
    /// updater inserts before linking.
    pub fn add_edge(&mut self, from: &Path, to: &Path) {
        if !self.vertices.contains_key(from) || !self.vertices.contains_key(to) {
            return;
        }
        self.vertices[from].out.insert(to.to_path_buf());
        self.vertices[to].ins.insert(from.to_path_buf());
    }

    pub fn vertices(&self) -> impl Iterator<Item = (&PathBuf, u64)> {
        self.vertices.iter().map(|(p, v)| (p, v.mtime))
    }

    pub fn edges(&self) -> impl Iterator<Item = (&PathBuf, &PathBuf)> {
        self.vertices
            .iter()
            .flat_map(|(from, v)| v.out.iter().map(move |to| (from, to)))
    }

    pub fn has_edge(&self, from: &Path, to: &Path) -> bool {
        self.vertices
            .get(from)
            .is_some_and(|v| v.out.contains(to))
    }

    /// Everything `path` transitively depends on (headers, behaviours,
    /// transforms), excluding `path` itself unless a cycle reaches back.
    pub fn parents_of(&self, path: &Path) -> IndexSet<PathBuf> {
        self.traverse(path, |v| &v.out)
    }

    /// Everything that transitively depends on `path`.
    pub fn dependents_of(&self, path: &Path) -> IndexSet<PathBuf> {
        self.traverse(path, |v| &v.ins)
    }

    fn traverse(&self, start: &Path, next: impl Fn(&Vertex) -> &IndexSet<PathBuf>) -> IndexSet<PathBuf> {
        let mut seen = IndexSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start.to_path_buf());
        while let Some(p) = queue.pop_front() {
            let Some(vertex) = self.vertices.get(&p) else {
                continue;
            };
            for n in next(vertex) {
                if seen.insert(n.clone()) {
                    queue.push_back(n.clone());
                }
            }
        }
        seen
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedGraph {
    version: u32,
    include_roots: Vec<PathBuf>,
    vertices: Vec<(PathBuf, u64)>,
    edges: Vec<(PathBuf, PathBuf)>,
}

/// Write the graph, tagged with the schema version and the include roots it
/// was built under.
pub fn store(graph: &DepGraph, path: &Path, include_roots: &[PathBuf]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let persisted = PersistedGraph {
        version: GRAPH_SCHEMA_VERSION,
        include_roots: include_roots.to_vec(),
        vertices: graph.vertices().map(|(p, t)| (p.clone(), t)).collect(),
        edges: graph.edges().map(|(f, t)| (f.clone(), t.clone())).collect(),
    };
    let file = std::fs::File::create(path)
        .context(format!("failed to create `{}`", path.display()))?;
    let writer = flate2::write::ZlibEncoder::new(BufWriter::new(file), flate2::Compression::fast());
    bincode::serialize_into(writer, &persisted)
        .context(format!("failed to store dependency graph to `{}`", path.display()))?;
    Ok(())
}

/// Load a graph persisted under the same schema version and include roots.
/// Any failure (missing file, torn write, old schema, different roots) is
/// recoverable: the stale file is deleted and an empty graph returned.
pub fn load(path: &Path, include_roots: &[PathBuf]) -> DepGraph {
    if !path.exists() {
        return DepGraph::new();
    }
    match try_load(path, include_roots) {
        Ok(graph) => graph,
        Err(e) => {
            tracing::warn!("discarding dependency graph `{}`: {}", path.display(), e);
            let _ = std::fs::remove_file(path);
            DepGraph::new()
        }
    }
}

fn try_load(path: &Path, include_roots: &[PathBuf]) -> anyhow::Result<DepGraph> {
    let file = std::fs::File::open(path)?;
    let reader = flate2::read::ZlibDecoder::new(BufReader::new(file));
    let persisted: PersistedGraph = bincode::deserialize_from(reader)?;
    if persisted.version != GRAPH_SCHEMA_VERSION {
        anyhow::bail!(
            "schema version {} does not match {}",
            persisted.version,
            GRAPH_SCHEMA_VERSION
        );
    }
    if persisted.include_roots != include_roots {
        anyhow::bail!("include roots changed");
    }
    let mut graph = DepGraph::new();
    for (p, mtime) in persisted.vertices {
        graph.add_vertex(p, mtime);
    }
    for (from, to) in persisted.edges {
        graph.add_edge(&from, &to);
    }
    Ok(graph)
}
