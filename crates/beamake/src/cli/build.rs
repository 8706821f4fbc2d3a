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

use std::path::PathBuf;

use beambuild::entry;
use beambuild::resolve::EnvLibraryLocator;
use beambuild::runner::ErlcCompiler;
use beamutil::cli::UniversalFlags;
use beamutil::common::{BuildCommand, BuildOpt};
use beamutil::config::ProjectConfig;

/// Compile the project
#[derive(Debug, Default, clap::Parser)]
pub struct BuildSubcommand {
    /// Compiler binary to invoke (defaults to `erlc`)
    #[clap(long)]
    pub compiler: Option<PathBuf>,
}

/// Build for running eunit tests
#[derive(Debug, clap::Parser)]
pub struct EunitSubcommand {}

/// Build for running common test suites
#[derive(Debug, clap::Parser)]
pub struct CtSubcommand {}

pub fn run_build(
    flags: &UniversalFlags,
    cmd: &BuildSubcommand,
    command: BuildCommand,
) -> anyhow::Result<i32> {
    let project_dir = flags
        .directory
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let config = ProjectConfig::load(&project_dir)?;
    let opt = BuildOpt {
        project_dir,
        command,
        quiet: flags.quiet,
        verbose: flags.verbose,
        dry_run: flags.dry_run,
    };
    let compiler = ErlcCompiler {
        binary: cmd.compiler.clone().unwrap_or_else(|| PathBuf::from("erlc")),
    };
    let locator = EnvLibraryLocator::from_env();
    entry::run_build(&config, &opt, &compiler, &locator)
}
