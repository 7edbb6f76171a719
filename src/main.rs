use anyhow::Result;
use std::path::Path;

mod category;
mod cli;
mod config;
mod dedup;
mod detect;
mod pipeline;
mod report;
mod sampling;

fn main() -> Result<()> {
    env_logger::init();
    let args: cli::Args = argh::from_env();

    if args.inspect {
        return report::print_summary(Path::new(&args.source));
    }

    pipeline::run(&args)
}
