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
use beamutil::cli::UniversalFlags;
use beamutil::config::ProjectConfig;

/// Remove build outputs and the dependency cache
#[derive(Debug, clap::Parser)]
pub struct CleanSubcommand {}

pub fn run_clean(flags: &UniversalFlags, _cmd: &CleanSubcommand) -> anyhow::Result<i32> {
    let project_dir = flags
        .directory
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let config = ProjectConfig::load(&project_dir)?;
    entry::clean(&config, &project_dir)?;
    Ok(0)
}
