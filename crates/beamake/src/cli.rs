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

pub mod build;
pub mod clean;

pub use build::*;
pub use clean::*;

use beamutil::cli::UniversalFlags;
use beamutil::common::BuildCommand;

#[derive(Debug, clap::Parser)]
#[clap(
    name = "beamake",
    about = "An incremental build driver for BEAM modules.",
    version
)]
pub struct BeamakeCli {
    #[clap(subcommand)]
    pub subcommand: BeamakeSubcommands,

    #[clap(flatten)]
    pub flags: UniversalFlags,
}

#[derive(Debug, clap::Parser)]
pub enum BeamakeSubcommands {
    Build(BuildSubcommand),
    Eunit(EunitSubcommand),
    Ct(CtSubcommand),
    Clean(CleanSubcommand),
}

pub fn run(subcommand: BeamakeSubcommands, flags: UniversalFlags) -> anyhow::Result<i32> {
    match subcommand {
        BeamakeSubcommands::Build(b) => run_build(&flags, &b, BuildCommand::Compile),
        BeamakeSubcommands::Eunit(_) => {
            run_build(&flags, &BuildSubcommand::default(), BuildCommand::Eunit)
        }
        BeamakeSubcommands::Ct(_) => {
            run_build(&flags, &BuildSubcommand::default(), BuildCommand::Ct)
        }
        BeamakeSubcommands::Clean(c) => run_clean(&flags, &c),
    }
}
