//! Fetch a single quadrant and print the decoded records.
//!
//! Handy for checking archive connectivity and the binary layout without
//! starting the server.

use anyhow::{Context, Result};
use clap::Parser;
use starstream::{transform, NonFinitePolicy, Quadrant, TapClient, TapConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Query one sky quadrant and dump its stars")]
struct Args {
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    ra_min: f64,

    #[arg(long, default_value = "90", allow_hyphen_values = true)]
    ra_max: f64,

    #[arg(long, default_value = "-45", allow_hyphen_values = true)]
    dec_min: f64,

    #[arg(long, default_value = "45", allow_hyphen_values = true)]
    dec_max: f64,

    #[arg(long, default_value = "10")]
    max_rows: u32,

    #[arg(long, default_value = starstream::config::DEFAULT_TAP_ENDPOINT)]
    endpoint: String,

    #[arg(long, default_value = starstream::config::DEFAULT_TABLE)]
    table: String,

    #[arg(long, default_value = "60", help = "Request timeout in seconds")]
    timeout: u64,

    #[arg(long, help = "Print x, y, z instead of ra, dec")]
    cartesian: bool,

    #[arg(long, help = "Keep records with infinite fields (only NaN is dropped)")]
    nan_only: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let quadrant = Quadrant::new(args.ra_min, args.ra_max, args.dec_min, args.dec_max)
        .context("Invalid quadrant bounds")?;

    let policy = if args.nan_only {
        NonFinitePolicy::NanOnly
    } else {
        NonFinitePolicy::RejectNonFinite
    };
    let client = TapClient::with_options(
        TapConfig {
            endpoint: args.endpoint,
            table: args.table,
            timeout_secs: args.timeout,
        },
        args.max_rows,
        policy,
    );

    println!("Querying {quadrant}");
    println!("  {}", client.query_url(&quadrant));

    let records = client
        .fetch_records(&quadrant)
        .with_context(|| format!("Fetch failed for {quadrant}"))?;

    if records.is_empty() {
        println!("No stars returned");
        return Ok(());
    }

    for record in &records {
        if args.cartesian {
            let star = transform(record);
            println!(
                "x={:>14.6} y={:>14.6} z={:>14.6} parallax={:.6}",
                star.x, star.y, star.z, star.parallax
            );
        } else {
            println!(
                "ra={:>10.6} dec={:>10.6} parallax={:.6}",
                record.ra, record.dec, record.parallax
            );
        }
    }
    println!("Total: {} stars", records.len());

    Ok(())
}
