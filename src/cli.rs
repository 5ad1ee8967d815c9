// ABOUTME: Command-line interface of the adloop binary, parsed with clap.
// ABOUTME: `start` runs a scheduler in the foreground or background; the other subcommands control a running one.

use std::ffi::OsString;

use adloop_core::MarketingInput;
use clap::{Args, Parser, Subcommand};

pub const DEFAULT_NAME: &str = "default";
pub const DEFAULT_INTERVAL_HOURS: u64 = 168;

#[derive(Debug, Parser)]
#[command(name = "adloop", version)]
#[command(about = "Autonomous Meta Ads marketing loop: research, plan, execute, and evaluate campaigns")]
pub struct Cli {
    /// Scheduler name; selects the pid, status, and socket files.
    #[arg(long, short = 'n', global = true, default_value = DEFAULT_NAME)]
    pub name: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a marketing scheduler for a product.
    Start(StartArgs),

    /// Run the scheduler in this process as a daemon. Used by `start --daemon`.
    #[command(hide = true)]
    Run(StartArgs),

    /// Show scheduler status.
    Status,

    /// Pause after the current step.
    Pause,

    /// Resume a paused scheduler.
    Resume,

    /// Stop the scheduler after the current step.
    Stop,

    /// Change the interval between steps.
    Interval {
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        seconds: u64,
    },

    /// Send SIGTERM to the scheduler process.
    Kill,
}

#[derive(Debug, Clone, Args)]
pub struct StartArgs {
    #[arg(long)]
    pub product_name: String,

    #[arg(long)]
    pub product_url: String,

    /// Total budget across all plans of one step, in the ad account currency.
    #[arg(long)]
    pub budget: Option<f64>,

    /// How long the campaigns should run, in days.
    #[arg(long)]
    pub days: Option<u32>,

    /// Product picture URL. Repeatable.
    #[arg(long = "picture-url")]
    pub picture_urls: Vec<String>,

    /// Hours between steps.
    #[arg(long, default_value_t = DEFAULT_INTERVAL_HOURS, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Run in the background.
    #[arg(long, short = 'd', alias = "background")]
    pub daemon: bool,
}

impl StartArgs {
    pub fn input(&self) -> MarketingInput {
        let mut input = MarketingInput::new(&self.product_name, &self.product_url);
        input.total_budget = self.budget;
        input.total_days = self.days;
        input.picture_urls = self.picture_urls.clone();
        input
    }

    pub fn interval_seconds(&self) -> u64 {
        self.interval.saturating_mul(3600)
    }

    /// Arguments that make a child process run this scheduler in the foreground.
    pub fn run_args(&self, name: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--name".into(),
            name.into(),
            "run".into(),
            "--product-name".into(),
            self.product_name.clone().into(),
            "--product-url".into(),
            self.product_url.clone().into(),
            "--interval".into(),
            self.interval.to_string().into(),
        ];
        if let Some(budget) = self.budget {
            args.push("--budget".into());
            args.push(budget.to_string().into());
        }
        if let Some(days) = self.days {
            args.push("--days".into());
            args.push(days.to_string().into());
        }
        for url in &self.picture_urls {
            args.push("--picture-url".into());
            args.push(url.into());
        }
        args
    }
}
