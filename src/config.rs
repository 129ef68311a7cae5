use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::chart::ChartOptions;

/// Host wiring for the web server. Every flag can also come from the
/// environment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "chore-tracker",
    version,
    about = "Log chores to a CSV file and chart their duration over time"
)]
pub struct AppConfig {
    /// CSV file holding the records
    #[arg(long, env = "CHORE_TRACKER_DATA", default_value = "data.csv")]
    pub data_file: PathBuf,

    /// Address the HTTP server listens on
    #[arg(long, env = "CHORE_TRACKER_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Chart width in pixels
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..))]
    pub chart_width: u32,

    /// Chart height in pixels
    #[arg(long, default_value_t = 600, value_parser = clap::value_parser!(u32).range(1..))]
    pub chart_height: u32,

    /// Largest accepted request body, uploads included
    #[arg(long, default_value_t = 2 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn chart_options(&self) -> ChartOptions {
        ChartOptions {
            width: self.chart_width,
            height: self.chart_height,
            ..ChartOptions::default()
        }
    }
}
