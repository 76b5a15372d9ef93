//! Url subcommand - show the first-page URL of every shard

use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Args;
use worksync_openalex::{Cursor, build_shards};

use super::harvest::QueryArgs;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct UrlArgs {
    #[command(flatten)]
    pub query: QueryArgs,
}

pub fn run(args: UrlArgs, config: &Config) -> Result<ExitCode> {
    let request = args.query.request(config);
    if request.is_empty() {
        bail!("nothing to harvest: set an institution (--institution) or authors (--author)");
    }
    let start = Cursor::start();
    for shard in build_shards(&request) {
        println!("{}\t{}", shard.label(), shard.page_url(&start));
    }
    Ok(ExitCode::SUCCESS)
}
