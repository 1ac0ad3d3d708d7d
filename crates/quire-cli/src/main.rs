use std::io;
use std::time::Duration;

use clap::Parser;
use quire_cache::CacheTtls;
use quire_core::address::{default_article_relays, default_publication_relays};
use quire_util_error::WhateverResult;
use quire_web::{Opts as WebOpts, Server, WebServerError};
use snafu::{FromString, ResultExt, Snafu, Whatever};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Opts;

pub const PROJECT_NAME: &str = "quire";
pub const LOG_TARGET: &str = "quire::cli";

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("server error: {source}"))]
    Server { source: WebServerError },
    #[snafu(display("logging init failed: {source}"))]
    Logging { source: Whatever },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging().context(LoggingSnafu)?;

    let opts = Opts::parse();
    let web_opts = WebOpts {
        listen: format!("0.0.0.0:{}", opts.port),
        renderer_base_url: opts.renderer_base_url,
        ttls: CacheTtls {
            list: Duration::from_secs(opts.list_ttl_secs),
            detail: Duration::from_secs(opts.detail_ttl_secs),
            ..CacheTtls::default()
        },
        publication_relays: opts
            .publication_relays
            .unwrap_or_else(default_publication_relays),
        article_relays: opts.article_relays.unwrap_or_else(default_article_relays),
    };

    let server = Server::init(web_opts).await.context(ServerSnafu)?;
    tracing::info!(target: LOG_TARGET, addr = %server.addr().context(ServerSnafu)?, "quire listening");
    server.run().await.context(ServerSnafu)?;

    Ok(())
}

pub fn init_logging() -> WhateverResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|_| Whatever::without_source("failed to initialize logging".to_string()))?;

    Ok(())
}
