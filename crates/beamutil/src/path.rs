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

/// Join `p` onto `base` (when relative) and normalize `.` and `..` lexically.
/// Files that do not exist yet cannot go through `canonicalize`, so graph
/// keys are produced with this instead; symlinks are left alone.
pub fn absolutize(base: &Path, p: &Path) -> PathBuf {
    let joined = if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    };
    let mut out = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(comp.as_os_str());
                }
            }
            _ => out.push(comp.as_os_str()),
        }
    }
    out
}

/// A module basename may contain `.` separators denoting nested namespaces;
/// each becomes a path separator under the output directory.
pub fn module_rel_path(stem: &str) -> PathBuf {
    stem.split('.').collect()
}

/// The target file for a source: `out_dir` + dotted-namespace path +
/// `target_ext`.
pub fn target_for(source: &Path, out_dir: &Path, target_ext: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    out_dir
        .join(module_rel_path(stem))
        .with_extension(target_ext)
}

pub fn has_extension(p: &Path, ext: &str) -> bool {
    p.extension().is_some_and(|e| e == ext)
}
