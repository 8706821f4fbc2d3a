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

use anyhow::{Context, bail};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use beamutil::common::{
    BuildOpt, ERL_EXT, FileLock, IGNORE_DIRS, MIB_BIN_EXT, MIB_EXT, MIB_OUTPUT_DIR, XRL_EXT,
    YRL_EXT, dot_dir, graph_file, mtime_of,
};
use beamutil::config::{ProjectConfig, platform_id};
use beamutil::path::{absolutize, has_extension};

use crate::generate::{GeneratorPipeline, run_pipeline};
use crate::graph;
use crate::resolve::LibraryLocator;
use crate::runner::{BuildError, CompileOpts, Compiler, render_result, run_plan};
use crate::update::update_graph;

/// Drive one build: generators, discovery, graph update, planning,
/// compilation, graph persistence. Returns a process exit code.
pub fn run_build(
    config: &ProjectConfig,
    opt: &BuildOpt,
    compiler: &dyn Compiler,
    locator: &dyn LibraryLocator,
) -> anyhow::Result<i32> {
    let project_dir = dunce::canonicalize(&opt.project_dir).context(format!(
        "failed to canonicalize project dir `{}`",
        opt.project_dir.display()
    ))?;
    std::fs::create_dir_all(dot_dir(&project_dir))?;
    let _lock = FileLock::lock(&dot_dir(&project_dir))?;

    run_generators(config, &project_dir, compiler)?;

    let source_dirs: Vec<PathBuf> = config
        .source_dirs()
        .iter()
        .map(|d| absolutize(&project_dir, d))
        .collect();
    let mut sources = discover_sources(&source_dirs)?;

    let mut first_files: Vec<PathBuf> = config
        .first_files_for(opt.command)
        .iter()
        .map(|f| absolutize(&project_dir, f))
        .collect();
    for f in &first_files {
        if !f.is_file() {
            bail!("file listed in first files does not exist: `{}`", f.display());
        }
    }

    let out_dir = match opt.command.to_dir_name() {
        None => absolutize(&project_dir, &config.output_dir()),
        Some(test_dir) => {
            // test variants compile a copy of the tree so conditional code
            // under TEST never pollutes the regular output
            let test_dir = project_dir.join(test_dir);
            sources = copy_sources(&sources, &test_dir)?;
            first_files = first_files
                .iter()
                .filter_map(|f| f.file_name().map(|n| test_dir.join(n)))
                .collect();
            test_dir
        }
    };
    std::fs::create_dir_all(&out_dir)
        .context(format!("failed to create `{}`", out_dir.display()))?;

    let include_roots: Vec<PathBuf> = config
        .include_dirs
        .iter()
        .map(|d| absolutize(&project_dir, d))
        .collect();

    let graph_path = graph_file(&project_dir);
    let mut graph = graph::load(&graph_path, &include_roots);
    let modified = update_graph(&mut graph, &project_dir, &include_roots, &sources, locator);

    let plan = crate::plan::plan(&graph, &sources, &first_files);
    tracing::debug!("compile plan: {:?}", plan);

    let base = CompileOpts {
        out_dir: out_dir.clone(),
        include_dirs: include_roots.clone(),
        defines: config.defines_for(opt.command, &platform_id())?,
        code_paths: vec![out_dir.clone()],
        raw: config.compile_opts_for(opt.command),
    };

    let result = {
        let _load_path = LoadPathGuard::prepend("ERL_LIBS", &out_dir);
        run_plan(&plan, &graph, opt, &base, compiler)
    };

    // scan results stay valid whether or not compilation succeeded; only a
    // crash skips the store, and a torn file is discarded on the next load
    if modified {
        graph::store(&graph, &graph_path, &include_roots)?;
    }

    match result {
        Ok(stats) => {
            render_result(&stats, opt.quiet);
            Ok(0)
        }
        Err(BuildError::CompileFailed(source)) => {
            bail!("failed to compile `{}`", source.display())
        }
        Err(BuildError::Other(e)) => Err(e),
    }
}

/// Remove everything a build may have produced.
pub fn clean(config: &ProjectConfig, project_dir: &Path) -> anyhow::Result<()> {
    let project_dir = dunce::canonicalize(project_dir)?;
    let mut doomed = vec![
        absolutize(&project_dir, &config.output_dir()),
        dot_dir(&project_dir),
        project_dir.join(".eunit"),
        project_dir.join(".ct"),
    ];
    doomed.push(absolutize(&project_dir, Path::new(MIB_OUTPUT_DIR)));
    for dir in doomed {
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .context(format!("failed to remove `{}`", dir.display()))?;
        }
    }
    Ok(())
}

fn run_generators(
    config: &ProjectConfig,
    project_dir: &Path,
    compiler: &dyn Compiler,
) -> anyhow::Result<()> {
    let abs = |files: &[PathBuf]| -> Vec<PathBuf> {
        files.iter().map(|f| absolutize(project_dir, f)).collect()
    };
    let src_dir = absolutize(project_dir, Path::new("src"));
    let mibs_dir = absolutize(project_dir, Path::new("mibs"));
    let pipelines = [
        GeneratorPipeline {
            source_dir: src_dir.clone(),
            source_ext: XRL_EXT,
            out_dir: src_dir.clone(),
            out_ext: ERL_EXT,
            first_files: abs(&config.xrl_first_files),
            opts: &config.xrl_opts,
        },
        GeneratorPipeline {
            source_dir: src_dir.clone(),
            source_ext: YRL_EXT,
            out_dir: src_dir,
            out_ext: ERL_EXT,
            first_files: abs(&config.yrl_first_files),
            opts: &config.yrl_opts,
        },
        GeneratorPipeline {
            source_dir: mibs_dir,
            source_ext: MIB_EXT,
            out_dir: absolutize(project_dir, Path::new(MIB_OUTPUT_DIR)),
            out_ext: MIB_BIN_EXT,
            first_files: abs(&config.mib_first_files),
            opts: &config.mib_opts,
        },
    ];
    for pipeline in &pipelines {
        let generated = run_pipeline(pipeline, &|source, target, opts| {
            compiler.generate(source, target, opts)
        })?;
        if generated > 0 {
            tracing::debug!(
                "generated {} file(s) from `{}` sources",
                generated,
                pipeline.source_ext
            );
        }
    }
    Ok(())
}

/// All compilable sources under the source roots, in a stable order.
fn discover_sources(source_dirs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut sources = vec![];
    for dir in source_dirs {
        if !dir.is_dir() {
            continue;
        }
        let walker = WalkDir::new(dir).sort_by_file_name().into_iter();
        for entry in walker.filter_entry(|e| {
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .is_some_and(|n| IGNORE_DIRS.contains(&n))
        }) {
            let entry = entry.context("failed to read entry")?;
            if entry.file_type().is_file() && has_extension(entry.path(), ERL_EXT) {
                sources.push(entry.path().to_path_buf());
            }
        }
    }
    Ok(sources)
}

/// Flat-copy sources into the test build directory, keeping copies that are
/// already current so test rebuilds stay incremental.
fn copy_sources(sources: &[PathBuf], dest: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dest)?;
    let mut copied = vec![];
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = dest.join(name);
        if mtime_of(&target) < mtime_of(source) {
            std::fs::copy(source, &target)
                .context(format!("failed to copy `{}`", source.display()))?;
        }
        copied.push(target);
    }
    Ok(copied)
}

/// Prepends a directory to a load-path environment variable for the life of
/// the value; every exit path restores what was there before.
struct LoadPathGuard {
    var: &'static str,
    prev: Option<OsString>,
}

impl LoadPathGuard {
    fn prepend(var: &'static str, dir: &Path) -> Self {
        let prev = std::env::var_os(var);
        let mut paths: Vec<PathBuf> = vec![dir.to_path_buf()];
        if let Some(prev) = &prev {
            paths.extend(std::env::split_paths(prev));
        }
        if let Ok(joined) = std::env::join_paths(paths) {
            // single-threaded driver; children spawned later see the new value
            unsafe { std::env::set_var(var, joined) };
        }
        Self { var, prev }
    }
}

impl Drop for LoadPathGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(prev) => unsafe { std::env::set_var(self.var, prev) },
            None => unsafe { std::env::remove_var(self.var) },
        }
    }
}
