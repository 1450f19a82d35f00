//! Entry point for the climtrend application.
//! Handles CLI parsing and logging setup, then runs the trend analysis for every scenario.

use chrono::Local;
use clap::Parser;
use climtrend::parallel::{get_parallel_info, ParallelConfig};
use climtrend::pipeline::run_analysis;
use log::LevelFilter;
use std::io::Write;
use std::process::ExitCode;

mod cli;

use cli::Args;

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(LevelFilter::Info)
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5}] {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    println!(
        r#"
------------------------------------------------------------------
                         climtrend
          Linear trends of gridded climate-model data
------------------------------------------------------------------
"#
    );

    let config = args.to_config()?;
    ParallelConfig::from_analysis(&config).setup_global_pool()?;
    get_parallel_info().log();

    let outcomes = run_analysis(&config);

    let mut failures = 0;
    println!("\n===== Summary =====");
    for (scenario, outcome) in &outcomes {
        match outcome {
            Ok(report) => {
                println!(
                    "✅ {}: {} trend {:.0}-{:.0} ({}/yr)",
                    scenario, report.variable, report.start_year, report.end_year, report.units
                );
                println!(
                    "   slope {:.4e} .. {:.4e}, {} missing cells drawn as zero",
                    report.stats.min_slope, report.stats.max_slope, report.stats.missing_replaced
                );
                if let Some(fraction) = report.stats.significant_fraction {
                    println!(
                        "   {:.1}% of cells significant at p < {}",
                        fraction * 100.0,
                        config.alpha
                    );
                }
                println!("   📁 {}", report.figure_path.display());
            }
            Err(e) => {
                failures += 1;
                println!("❌ {}: {}", scenario, e);
            }
        }
    }

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
