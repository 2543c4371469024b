pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod paging;
pub mod prefs;
pub mod render;
pub mod reorder;
pub mod stats;
pub mod store;
pub mod task;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting plumbline CLI"
  );
  debug!(overrides = cli.rc_overrides.len(), "rc overrides on command line");

  let mut cfg = config::Config::load(
    cli.rc_file.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );

  let settings =
    config::BackendSettings::from_config(
      &cfg
    )
    .context(
      "backend is not configured"
    )?;
  let backend =
    backend::rest::RestBackend::new(
      &settings
    )?;
  let identity =
    backend::StaticIdentity(
      cfg.user_id()?
    );
  let boundary =
    datetime::DayBoundary::from_config(
      &cfg
    );

  let mut renderer =
    render::Renderer::new(&cfg)?;
  let command =
    cli.command.unwrap_or_else(|| {
      cli::Command::List(
        cli::ListArgs {
          page: 1,
          ..cli::ListArgs::default()
        }
      )
    });

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(commands::dispatch(
    backend,
    identity,
    boundary,
    &mut renderer,
    command
  ))?;

  info!("done");
  Ok(())
}
