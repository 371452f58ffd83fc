use std::{path::PathBuf, time::Duration};

use chrono::Datelike;
use clap::ArgAction;
use sisu2gv::{
    Cache, RenderOptions, Resolver, SisuClient, Supplement, compress, render, write_atomic,
};

/// Render a Sisu degree programme as a Graphviz graph.
#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// The Sisu otm id of the degree programme to visualize
    programme: String,

    /// Write the graph to this file (default: <programme-id>.gv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the curriculum year (default: the current year)
    #[arg(short, long)]
    year: Option<i32>,

    /// Cache directory for raw Sisu responses
    #[arg(short, long, default_value = "./cache")]
    cache_dir: PathBuf,

    /// Course code to exclude from the graph (repeatable)
    #[arg(short, long = "blacklist", action = ArgAction::Append)]
    blacklist: Vec<String>,

    /// Also draw recommended prerequisites (dashed)
    #[arg(short, long)]
    also_recommended: bool,

    /// JSON file with course icons and manual prerequisites
    #[arg(short, long)]
    extra_data: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let year = self
            .year
            .unwrap_or_else(|| chrono::Utc::now().date_naive().year());
        let curriculum = format!("uta-lvv-{year}");

        let supplement = match &self.extra_data {
            Some(path) => Supplement::load(path)?,
            None => Supplement::default(),
        };

        let cache = Cache::new(&self.cache_dir);
        let client = SisuClient::new(cache, Duration::from_secs(self.timeout))?;

        let mut resolver = Resolver::new(&client, curriculum);
        let mut hierarchy = resolver.resolve_programme(&self.programme)?;
        resolver.finalize_prerequisites()?;
        compress(&mut hierarchy);

        let options = RenderOptions {
            include_recommended: self.also_recommended,
            blacklist: self
                .blacklist
                .iter()
                .map(|code| code.replace('.', "_"))
                .collect(),
        };
        let dot = render(&hierarchy, resolver.registry(), &supplement, &options);

        let output = self
            .output
            .unwrap_or_else(|| PathBuf::from(format!("{}.gv", self.programme)));
        write_atomic(&output, &dot)?;

        println!("Wrote {}", output.display());
        Ok(())
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn blacklist_flag_is_repeatable() {
        let cli = Cli::parse_from([
            "sisu2gv",
            "otm-prog",
            "-b",
            "COMP.CS.100",
            "-b",
            "MATH.APP.110",
        ]);
        assert_eq!(cli.blacklist, vec!["COMP.CS.100", "MATH.APP.110"]);
    }

    #[test]
    fn defaults_are_applied() {
        let cli = Cli::parse_from(["sisu2gv", "otm-prog"]);
        assert_eq!(cli.cache_dir, PathBuf::from("./cache"));
        assert_eq!(cli.timeout, 30);
        assert!(!cli.also_recommended);
        assert!(cli.output.is_none());
    }
}
