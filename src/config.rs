use std::path::PathBuf;

use clap::Parser;

/// Booking back end for a sim-racing club kiosk.
#[derive(Debug, Clone, Parser)]
#[command(name = "pitbox", version, about)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "PITBOX_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    #[arg(long, env = "PITBOX_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Keep stations and bookings in a write-ahead log under this
    /// directory. Without it, state lives in memory only.
    #[arg(long, env = "PITBOX_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// JSON file with `catalog` and `stations`; replaces the built-in club.
    #[arg(long, env = "PITBOX_SEED_FILE")]
    pub seed_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "PITBOX_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Compact the log on startup once it holds more records than this.
    #[arg(long, env = "PITBOX_COMPACT_THRESHOLD", default_value_t = 1000)]
    pub compact_threshold: u64,

    /// Requests served at once before new ones get 503.
    #[arg(long, env = "PITBOX_MAX_CONNECTIONS", default_value_t = 256)]
    pub max_connections: usize,
}

impl Config {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("pitbox.wal"))
    }
}
