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

//! Generator pipelines: lexer/parser/MIB sources that produce inputs for
//! the main build. Each pipeline is the same shape, a source extension
//! mapped to a target extension with a first-files list.

use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use beamutil::common::mtime_of;
use beamutil::path::{has_extension, target_for};

use crate::plan::uo_merge;

pub struct GeneratorPipeline<'a> {
    pub source_dir: PathBuf,
    pub source_ext: &'a str,
    pub out_dir: PathBuf,
    pub out_ext: &'a str,
    pub first_files: Vec<PathBuf>,
    pub opts: &'a [String],
}

pub type GenerateFn<'a> = dyn Fn(&Path, &Path, &[String]) -> anyhow::Result<()> + 'a;

/// Run one pipeline: find the sources, put the declared first files in
/// front, regenerate whatever is older than its source. A declared first
/// file that does not exist aborts the run.
pub fn run_pipeline(pipeline: &GeneratorPipeline, generate: &GenerateFn) -> anyhow::Result<usize> {
    for f in &pipeline.first_files {
        if !f.is_file() {
            bail!("file listed in first files does not exist: `{}`", f.display());
        }
    }
    if !pipeline.source_dir.is_dir() {
        return Ok(0);
    }

    let mut sources = vec![];
    for entry in WalkDir::new(&pipeline.source_dir).sort_by_file_name() {
        let entry = entry.context("failed to read entry")?;
        if entry.file_type().is_file() && has_extension(entry.path(), pipeline.source_ext) {
            sources.push(entry.path().to_path_buf());
        }
    }

    let mut generated = 0;
    for source in uo_merge(&pipeline.first_files, &sources) {
        let target = target_for(&source, &pipeline.out_dir, pipeline.out_ext);
        if mtime_of(&target) < mtime_of(&source) {
            std::fs::create_dir_all(&pipeline.out_dir)
                .context(format!("failed to create `{}`", pipeline.out_dir.display()))?;
            generate(&source, &target, pipeline.opts)
                .context(format!("failed to generate `{}`", target.display()))?;
            generated += 1;
        }
    }
    Ok(generated)
}
