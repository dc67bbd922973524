//! Claims Reserving CLI
//!
//! Prepares claims snapshots, prints development triangles and runs
//! chain-ladder IBNR valuations.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use claims_reserving::claims::{self, prepare, reconcile, roll_forward, write_payments};
use claims_reserving::reserving::{CsvStore, ResultSink, DEFAULT_TAIL_FACTOR};
use claims_reserving::{
    Grain, Period, ReserveEstimate, Triangle, TriangleBuilder, ValuationConfig, ValuationRunner,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "claims-reserving", version, about = "Development triangles and chain-ladder IBNR")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Join raw claims and paid extracts into a claims snapshot
    Prepare {
        /// Raw claims table (Id, Type, AccDate, AccMonth, RepMonth)
        #[arg(long)]
        claims: PathBuf,
        /// Raw paid table (Id, EventId, EventMonth, Paid)
        #[arg(long)]
        paid: PathBuf,
        /// Keep only events up to and including this year
        #[arg(long)]
        max_year: Option<i32>,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Extend last year's snapshot with this year's payments and reconcile history
    RollForward {
        /// Prior claims snapshot
        #[arg(long)]
        prior: PathBuf,
        /// Payment files for the new year (same layout as a snapshot)
        #[arg(long, num_args = 1.., required = true)]
        payments: Vec<PathBuf>,
        /// Valuation year being added
        #[arg(long)]
        year: i32,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Print a development triangle
    Triangle {
        #[command(flatten)]
        valuation: ValuationArgs,
        /// Show cumulative instead of incremental amounts
        #[arg(long)]
        cumulative: bool,
        /// Also print age-to-age link ratios
        #[arg(long)]
        link_ratios: bool,
    },
    /// Estimate IBNR with the chain ladder
    Ibnr {
        #[command(flatten)]
        valuation: ValuationArgs,
        /// Include Mack standard errors
        #[arg(long)]
        std_err: bool,
        /// Upsert the result into this IBNR history CSV
        #[arg(long)]
        store: Option<PathBuf>,
        /// Print the estimate as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run valuations for a range of year-end cutoffs
    History {
        /// Claims snapshot CSV
        #[arg(long, short)]
        input: PathBuf,
        #[arg(long, default_value_t = 1)]
        lob: u32,
        #[arg(long, default_value = "year")]
        grain: Grain,
        #[arg(long)]
        from: i32,
        #[arg(long)]
        to: i32,
        #[arg(long, default_value_t = DEFAULT_TAIL_FACTOR)]
        tail: f64,
        /// Upsert each successful result into this IBNR history CSV
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ValuationArgs {
    /// Claims snapshot CSV
    #[arg(long, short)]
    input: PathBuf,
    /// Line of business
    #[arg(long, default_value_t = 1)]
    lob: u32,
    /// month, quarter or year
    #[arg(long, default_value = "year")]
    grain: Grain,
    /// Valuation cutoff: YYYY (year-end), YYYY-MM or YYYY-MM-DD
    #[arg(long, value_parser = Period::parse_cutoff)]
    cutoff: Period,
    /// Development beyond the last lag
    #[arg(long, default_value_t = DEFAULT_TAIL_FACTOR)]
    tail: f64,
}

impl ValuationArgs {
    fn config(&self) -> ValuationConfig {
        ValuationConfig::new(self.lob, self.grain, self.cutoff).with_tail_factor(self.tail)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Prepare {
            claims: claims_path,
            paid,
            max_year,
            output,
        } => {
            let headers = prepare::load_claim_headers(&claims_path)
                .with_context(|| format!("reading {}", claims_path.display()))?;
            let events = prepare::load_paid_events(&paid)
                .with_context(|| format!("reading {}", paid.display()))?;

            let mut records = claims::join_claims_and_payments(&headers, &events);
            if let Some(year) = max_year {
                records.retain(|r| r.event_period.year() <= year);
            }
            write_payments(&output, &records)?;
            println!("Wrote {} payment records to {}", records.len(), output.display());
        }

        Command::RollForward {
            prior,
            payments,
            year,
            output,
        } => {
            let prior_records = claims::load_payments(&prior)
                .with_context(|| format!("reading {}", prior.display()))?;

            let mut new_records = Vec::new();
            for path in &payments {
                println!("Processing {}", path.display());
                let batch = claims::load_payments(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                new_records.extend(batch);
            }

            let current = roll_forward(&prior_records, &new_records);
            let rec = reconcile(&prior_records, &current, year);

            println!("Reconciling historical claims");
            println!("  Prior: {:>15.0}", rec.prior_total);
            println!("  Now:   {:>15.0}", rec.current_total);
            println!("  Diff:  {:>15.0}", rec.difference());

            write_payments(&output, &current)?;
            println!("Wrote {} payment records to {}", current.len(), output.display());
        }

        Command::Triangle {
            valuation,
            cumulative,
            link_ratios,
        } => {
            let runner = ValuationRunner::from_csv(&valuation.input)
                .with_context(|| format!("reading {}", valuation.input.display()))?;
            let config = valuation.config();
            let triangle = TriangleBuilder::new(config.line_of_business, config.grain, config.cutoff)
                .build(runner.records())?;

            print_triangle(&triangle, cumulative);
            if link_ratios {
                println!();
                print_link_ratios(&triangle);
            }
        }

        Command::Ibnr {
            valuation,
            std_err,
            store,
            json,
        } => {
            let runner = ValuationRunner::from_csv(&valuation.input)
                .with_context(|| format!("reading {}", valuation.input.display()))?;
            let mut config = valuation.config();
            if std_err {
                config = config.with_std_err();
            }

            let result = runner.run(&config)?;

            if let Some(path) = store {
                let mut sink = CsvStore::new(&path);
                sink.upsert(result.estimate.to_record())?;
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&result.estimate)?);
            } else {
                print_estimate(&result.estimate);
            }
        }

        Command::History {
            input,
            lob,
            grain,
            from,
            to,
            tail,
            store,
        } => {
            if from > to {
                bail!("--from {} is after --to {}", from, to);
            }
            let runner = ValuationRunner::from_csv(&input)
                .with_context(|| format!("reading {}", input.display()))?;

            let cutoffs: Vec<Period> = (from..=to).map(Period::year_end).collect();
            let config = ValuationConfig::new(lob, grain, cutoffs[0]).with_tail_factor(tail);
            let results = runner.run_history(&config, &cutoffs);

            let estimates: Vec<&ReserveEstimate> = results
                .iter()
                .filter_map(|(_, r)| r.as_ref().ok().map(|v| &v.estimate))
                .collect();

            println!("{:>10} {:>16}", "Valuation", "IBNR");
            for (cutoff, result) in &results {
                match result {
                    Ok(v) => println!("{:>10} {:>16.0}", cutoff.year(), v.estimate.ibnr_total),
                    Err(e) => println!("{:>10} {:>16}", cutoff.year(), format!("error: {}", e)),
                }
            }

            if let Some(path) = store {
                let records: Vec<_> = estimates.iter().map(|e| e.to_record()).collect();
                CsvStore::new(&path).upsert_all(&records)?;
                println!("\nStored {} rows in {}", records.len(), path.display());
            }
        }
    }

    Ok(())
}

fn print_grid(triangle: &Triangle, columns: usize, cell: impl Fn(usize, usize) -> Option<f64>, precision: usize) {
    print!("{:>10}", "Origin");
    for lag in 0..columns {
        print!(" {:>12}", lag);
    }
    println!();

    for (row, label) in triangle.origin_labels().iter().enumerate() {
        print!("{:>10}", label);
        for lag in 0..columns {
            match cell(row, lag) {
                Some(v) => print!(" {:>12.*}", precision, v),
                None => print!(" {:>12}", ""),
            }
        }
        println!();
    }
}

fn print_triangle(triangle: &Triangle, cumulative: bool) {
    println!(
        "Line {} {} triangle ({}), cutoff {}, evaluated {}",
        triangle.line_of_business(),
        if cumulative { "cumulative" } else { "incremental" },
        triangle.grain(),
        triangle.cutoff(),
        triangle.evaluation_period().label(triangle.grain()),
    );

    let cum = triangle.cumulative();
    print_grid(
        triangle,
        triangle.n_lags(),
        |row, lag| {
            if !triangle.is_observed(row, lag) {
                None
            } else if cumulative {
                Some(cum[row][lag])
            } else {
                Some(triangle.incremental(row, lag))
            }
        },
        0,
    );
}

fn print_link_ratios(triangle: &Triangle) {
    println!("Link ratios");
    let ratios = triangle.link_ratios();
    print_grid(triangle, triangle.max_lag(), |row, lag| ratios[row][lag], 4);
}

fn print_estimate(estimate: &ReserveEstimate) {
    println!(
        "Chain ladder IBNR, line {}, cutoff {}, grain {}",
        estimate.line_of_business, estimate.valuation_period, estimate.grain
    );

    print!("Factors:");
    for f in &estimate.development_factors {
        print!(" {:.4}", f);
    }
    println!("  tail {:.4}", estimate.tail_factor);
    println!();

    println!(
        "{:>10} {:>14} {:>10} {:>14} {:>14} {:>14}",
        "Origin", "Latest", "CDF", "Ultimate", "IBNR", "Mack StdErr"
    );
    for o in &estimate.origins {
        let std_err = o.std_err.map(|s| format!("{:.0}", s)).unwrap_or_default();
        println!(
            "{:>10} {:>14.0} {:>10.4} {:>14.0} {:>14.0} {:>14}",
            o.label, o.latest, o.cdf_to_ultimate, o.ultimate, o.ibnr, std_err
        );
    }
    let total_std_err = estimate
        .total_std_err
        .map(|s| format!("{:.0}", s))
        .unwrap_or_default();
    println!(
        "{:>10} {:>14.0} {:>10} {:>14.0} {:>14.0} {:>14}",
        "Total",
        estimate.latest_total(),
        "",
        estimate.ultimate_total(),
        estimate.ibnr_total,
        total_std_err
    );
}
