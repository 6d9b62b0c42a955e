pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod forms;
pub mod model;
pub mod page;
pub mod query;
pub mod render;
pub mod seed;
pub mod storage;
pub mod store;

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
    "starting educonnect CLI"
  );
  debug!(?cli.overrides, "config overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  datetime::configure_display_timezone(
    cfg.get("time.timezone").as_deref()
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let port =
    storage::FileStore::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open data store at \
           {}",
          data_dir.display()
        )
      })?;
  let mut store =
    store::StateStore::load(port)
      .context(
        "failed to load application \
         state"
      )?;

  let renderer =
    render::Renderer::new(&cfg)?;

  commands::dispatch(
    &mut store,
    &cfg,
    &renderer,
    cli.command
  )?;

  info!("done");
  Ok(())
}
