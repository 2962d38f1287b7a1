// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};

use crate::app::types::ScriptType;

#[derive(Parser, Debug)]
#[command(
    name = "robotd",
    version,
    about,
    long_about = None,
    after_help = "Configuration precedence: defaults < config file < command-line flags.\n\
Config path precedence: defaults < ROBOTD_CONFIG_PATH < command-line flags.\n\
If --config is omitted, robotd tries ROBOTD_CONFIG_PATH, then the default config file location; missing default config is OK.\n\
Paths in the config file are resolved relative to the config file directory; paths passed as flags are resolved relative to the current working directory.\n\
The job result is printed to stdout as JSON; logs go to stderr."
)]
pub struct Opts {
    #[arg(
        short,
        long,
        global = true,
        value_name = "PATH",
        help = "Path to a TOML config file. When omitted, robotd uses ROBOTD_CONFIG_PATH if set, otherwise the default config file location if available."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Path to the SQLite catalog database. Overrides `database_path` from the config file."
    )]
    pub database_path: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Local directory for generated scripts and fetched results. Overrides `media_root` from the config file."
    )]
    pub media_root: Option<PathBuf>,
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::SetTrue,
        help = "Enable debug logging. Overrides `verbose` from the config file."
    )]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Stage a stored script on the profile's host, run it and collect results.
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(long, value_enum, value_name = "TYPE")]
    pub script_type: ScriptTypeArg,
    #[arg(long, value_name = "ID")]
    pub script_id: i64,
    /// Profile id; repeat to merge several profiles in order.
    #[arg(long = "profile", value_name = "ID", required = true)]
    pub profiles: Vec<i64>,
    /// Prefix for every generated and fetched file. Generated from the
    /// script name when omitted.
    #[arg(long, value_name = "SEED")]
    pub filename_seed: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ScriptTypeArg {
    Keyword,
    TestCase,
}

impl From<ScriptTypeArg> for ScriptType {
    fn from(value: ScriptTypeArg) -> Self {
        match value {
            ScriptTypeArg::Keyword => ScriptType::Keyword,
            ScriptTypeArg::TestCase => ScriptType::TestCase,
        }
    }
}

pub struct ParsedOpts {
    pub opts: Opts,
    pub verbose_override: Option<bool>,
}

pub fn cli_command() -> clap::Command {
    Opts::command()
}

fn parsed_from(matches: &clap::ArgMatches) -> Result<ParsedOpts, clap::Error> {
    let verbose_override = if matches.get_flag("verbose") {
        Some(true)
    } else {
        None
    };
    let opts = Opts::from_arg_matches(matches)?;
    Ok(ParsedOpts {
        opts,
        verbose_override,
    })
}

pub fn parse_opts() -> ParsedOpts {
    let matches = cli_command().get_matches();
    parsed_from(&matches).unwrap_or_else(|err| err.exit())
}
