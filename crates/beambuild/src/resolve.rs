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

use std::path::{Component, Path, PathBuf};

use beamutil::common::ERL_EXT;
use beamutil::path::absolutize;

use crate::scan::SourceRef;

/// Where installed libraries live. `include_lib` references name a library
/// in their first path component; mapping that name to an install directory
/// is outside the core (the default implementation consults the
/// environment).
pub trait LibraryLocator {
    fn lib_dir(&self, lib: &str) -> Option<PathBuf>;
}

/// Scans `ERL_LIBS`-style roots for `<lib>` or `<lib>-<vsn>` directories,
/// highest version winning.
pub struct EnvLibraryLocator {
    roots: Vec<PathBuf>,
}

impl EnvLibraryLocator {
    pub fn from_env() -> Self {
        let roots = std::env::var("ERL_LIBS")
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();
        Self { roots }
    }

    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl LibraryLocator for EnvLibraryLocator {
    fn lib_dir(&self, lib: &str) -> Option<PathBuf> {
        let versioned = format!("{lib}-");
        for root in &self.roots {
            let Ok(entries) = std::fs::read_dir(root) else {
                continue;
            };
            let mut best: Option<String> = None;
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if name == lib || name.starts_with(&versioned) {
                    if best.as_deref().is_none_or(|b| name > b) {
                        best = Some(name.to_string());
                    }
                }
            }
            if let Some(name) = best {
                return Some(root.join(name));
            }
        }
        None
    }
}

/// An empty lookup, for callers that have no library tree.
pub struct NoLibraries;

impl LibraryLocator for NoLibraries {
    fn lib_dir(&self, _lib: &str) -> Option<PathBuf> {
        None
    }
}

/// Map a raw reference to an absolute path, or nothing. Candidates are
/// probed in order: the reference as given, then the referring file's
/// directory, then each entry of `search_dirs` (the fixed `include`
/// directory followed by the include roots and source directories), then the
/// library expansion. Unresolvable references are dropped by the caller;
/// toolchain headers are found by the compiler itself.
pub fn resolve(
    r: &SourceRef,
    referring_dir: &Path,
    search_dirs: &[PathBuf],
    locator: &dyn LibraryLocator,
) -> Option<PathBuf> {
    let rel = match r {
        SourceRef::Path(p) | SourceRef::LibPath(p) => PathBuf::from(p),
        SourceRef::Module(m) => PathBuf::from(format!("{m}.{ERL_EXT}")),
    };

    if rel.is_file() {
        let base = std::env::current_dir().ok()?;
        return Some(absolutize(&base, &rel));
    }
    for dir in std::iter::once(referring_dir).chain(search_dirs.iter().map(PathBuf::as_path)) {
        let candidate = dir.join(&rel);
        if candidate.is_file() {
            return Some(absolutize(dir, &rel));
        }
    }
    if let SourceRef::LibPath(p) = r {
        return resolve_lib(p, locator);
    }
    None
}

/// `<lib>/<subpath...>/<file>` → `lib_dir(lib)/<subpath...>/<file>`.
fn resolve_lib(reference: &str, locator: &dyn LibraryLocator) -> Option<PathBuf> {
    let path = Path::new(reference);
    let mut components = path.components();
    let lib = match components.next() {
        Some(Component::Normal(c)) => c.to_str()?,
        _ => return None,
    };
    let candidate = locator.lib_dir(lib)?.join(components.as_path());
    candidate.is_file().then(|| absolutize(Path::new("/"), &candidate))
}
