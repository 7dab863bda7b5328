mod options;
mod run;
mod stages;

use anyhow::Result;
use clap::Parser;
use options::Cli;
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli {
        Cli::Run(run) => run.run(),
        Cli::Index(index) => index.run(),
        Cli::Trace(trace) => trace.run(),
        Cli::Classify(classify) => classify.run(),
    }
}
