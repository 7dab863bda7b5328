use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Args, Parser, ValueEnum};
use glof::{AlertMode, GeoPoint};
use std::path::PathBuf;

/// Glacial lake outburst hazard analysis.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub enum Cli {
    /// Run the full pipeline: index, change, volume, flow, risk and
    /// alerts.
    Run(Run),

    /// Compute a water index grid and its lake area.
    Index(Index),

    /// Trace a steepest-descent flow path over a DEM and print it as
    /// GeoJSON.
    Trace(Trace),

    /// Classify a volume change and slope.
    Classify(Classify),
}

#[derive(Debug, Clone, Args)]
pub struct Run {
    /// Artifact directory. Inputs are read from, and outputs written
    /// below, this directory.
    #[arg(short, long)]
    pub root: PathBuf,

    /// JSON config file; unset fields keep their defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON array of `{"id", "lat", "lon"}` entities to alert.
    #[arg(short, long)]
    pub entities: Option<PathBuf>,

    /// Earlier observation, relative to `root`.
    #[arg(long)]
    pub image_1: String,

    /// Later observation, relative to `root`.
    #[arg(long)]
    pub image_2: String,

    /// DEM (GLRS or SRTM .hgt), relative to `root`.
    #[arg(long)]
    pub dem: String,

    /// Earlier observation date, "YYYY-MM-DD" or RFC 3339.
    #[arg(long, value_parser = parse_date)]
    pub date_1: DateTime<Utc>,

    /// Later observation date, "YYYY-MM-DD" or RFC 3339.
    #[arg(long, value_parser = parse_date)]
    pub date_2: DateTime<Utc>,

    /// Flow path start "lat,lon". Defaults to the lake centroid.
    #[arg(long)]
    pub seed: Option<GeoPoint>,

    /// Override the config's water threshold.
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Override the config's alert mode.
    #[arg(short, long)]
    pub mode: Option<Mode>,

    /// Memory map GLRS inputs instead of reading them.
    #[arg(long)]
    pub memmap: bool,
}

#[derive(Debug, Clone, Args)]
pub struct Index {
    /// Positive (green) band, 1-based.
    #[arg(long, default_value_t = 2)]
    pub green: usize,

    /// Negative (near-infrared) band, 1-based.
    #[arg(long, default_value_t = 4)]
    pub nir: usize,

    /// Index value above which a pixel is water.
    #[arg(short, long, default_value_t = 0.2)]
    pub threshold: f64,

    /// Write the index grid here (GLRS).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Input multi-band raster (GLRS).
    pub input: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct Trace {
    /// Start "lat,lon".
    #[arg(long)]
    pub seed: GeoPoint,

    /// Maximum number of moves.
    #[arg(long, default_value_t = 1000)]
    pub max_steps: usize,

    /// DEM (GLRS or SRTM .hgt).
    pub dem: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct Classify {
    /// Volume change in cubic metres.
    #[arg(long)]
    pub volume: f64,

    /// Slope in degrees.
    #[arg(long, default_value_t = 15.0)]
    pub slope: f64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Mode {
    /// Buffer around the flow path.
    Path,
    /// Radius around the seed.
    Radius,
}

impl From<Mode> for AlertMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Path => AlertMode::BufferedPath,
            Mode::Radius => AlertMode::Radius,
        }
    }
}

fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = s.parse::<DateTime<Utc>>() {
        return Ok(date);
    }
    let midnight = NaiveDate::parse_from_str(s, "%Y-%m-%d")?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("not a valid date: {s}"))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

#[cfg(test)]
mod tests {
    use super::parse_date;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-09-01").unwrap(),
            parse_date("2024-09-01T00:00:00Z").unwrap()
        );
        assert!(parse_date("01/09/2024").is_err());
    }
}
