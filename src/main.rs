use std::path::PathBuf;

use bar_optimizer::config::ConfigFile;
use bar_optimizer::export;
use bar_optimizer::logging;
use bar_optimizer::presets::KeywordClassifier;
use bar_optimizer::providers::{
    CsvPieces, CsvSink, ElementProvider, GeometryProvider, MeasurementTable, NoMeasurements, write_back,
};
use bar_optimizer::render;
use bar_optimizer::solver::Optimizer;
use clap::Parser;

#[derive(Parser)]
#[command(name = "bar_optimizer", about = "1D bar cutting stock optimizer")]
struct Cli {
    /// Pieces CSV with id,material,width,height,length columns
    #[arg(long)]
    pieces: PathBuf,

    /// Material configuration and prices (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Alternate measurements CSV with piece_id,method,value columns
    #[arg(long)]
    measurements: Option<PathBuf>,

    /// Write commands.csv, bars.csv, summary.csv and attributes.csv here
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Save the effective configuration (with defaults filled in) to this path
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Show ASCII layout of each bar
    #[arg(long)]
    layout: bool,
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let pieces = CsvPieces::new(&cli.pieces).pieces().unwrap_or_else(|e| exit_with(e));

    let mut config = match &cli.config {
        Some(path) => ConfigFile::load(path).unwrap_or_else(|e| exit_with(e)),
        None => ConfigFile::new(),
    };
    config.fill_defaults(pieces.iter().map(|p| p.material.as_str()), &KeywordClassifier);

    if let Some(path) = &cli.write_config {
        config.save(path).unwrap_or_else(|e| exit_with(e));
    }

    let table;
    let geometry: &dyn GeometryProvider = match &cli.measurements {
        Some(path) => {
            table = MeasurementTable::from_path(path).unwrap_or_else(|e| exit_with(e));
            &table
        }
        None => &NoMeasurements,
    };

    let report = Optimizer::new(&config.materials, &config.prices, geometry).run(&pieces);

    for bar in &report.bars {
        println!(
            "Bar {}: {} {} @ {}mm, waste {:.0}mm ({:.1}%)",
            bar.id,
            bar.material,
            bar.section,
            bar.chosen_length,
            bar.waste,
            bar.waste_percent(),
        );
        for (id, length) in bar.pieces.iter().zip(&bar.piece_lengths) {
            println!("  {} {}mm", id, length);
        }
        if cli.layout {
            print!("{}", render::render_bar(bar));
        }
        println!();
    }

    for summary in &report.summaries {
        println!(
            "{}: {:.4} {} purchased, {:.4} used, {:.2} total{}",
            summary.material,
            summary.purchased,
            summary.unit,
            summary.used,
            summary.total_price,
            if summary.optimized { "" } else { " [not optimized]" },
        );
    }
    for warning in &report.warnings {
        eprintln!("Warning: {}", warning);
    }
    for anomaly in &report.anomalies {
        eprintln!("Anomaly: {:?}", anomaly);
    }

    println!(
        "Summary: {} bar{}, total {:.2}, waste credit {:.2}",
        report.bar_count(),
        if report.bar_count() == 1 { "" } else { "s" },
        report.total_price(),
        report.total_valorization(),
    );

    if let Some(dir) = &cli.export_dir {
        export::export_dir(dir, &report).unwrap_or_else(|e| exit_with(e));
        let file = std::fs::File::create(dir.join("attributes.csv")).unwrap_or_else(|e| exit_with(e));
        let mut sink = CsvSink::new(file);
        let failures = write_back(&report.pieces, &mut sink);
        sink.finish().unwrap_or_else(|e| exit_with(e));
        if failures > 0 {
            eprintln!("Warning: {} piece attribute(s) could not be written", failures);
        }
    }
}
