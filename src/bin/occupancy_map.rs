//! occupancy_map - Detect people in a recorded video and report occupancy.
//!
//! Writes into the output directory:
//! - detections.csv     one row per detected person per frame
//! - stats.json         aggregate occupancy statistics
//! - stats_summary.csv  the scalar statistics as metric,value rows
//! - heatmap.png        spatial density of detections (skipped when empty)

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use occupancy_mapper::{
    process_video_with_settings, render_heatmap, DirectorySink, MapperConfig,
    OccupancyStats, ReportSink,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "occupancy_map",
    about = "Per-frame person detection, occupancy statistics and heatmaps for a video"
)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension)
    #[arg(long, value_name = "PATH", env = "OCCUPANCY_CONFIG")]
    config: Option<PathBuf>,

    /// Input video path
    #[arg(long, value_name = "PATH")]
    video: Option<String>,

    /// Output directory for reports
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Detector backend (tract|cpu)
    #[arg(long, value_name = "NAME")]
    backend: Option<String>,

    /// ONNX model for the tract backend
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load config");
        let mut cfg = MapperConfig::load_from(args.config.as_deref())?;
        apply_args(&mut cfg, &args);
        cfg.validate()?;
        cfg
    };

    println!(
        "occupancy_map: processing {} with the {} detector",
        cfg.video_path, cfg.detector.backend
    );

    let result = {
        let stage = ui.stage("Process video");
        process_video_with_settings(
            &cfg.video_path,
            &cfg.detector,
            &cfg.process_options(),
            &mut |done, expected| stage.frames(done, expected),
        )
    };

    let stats = {
        let _stage = ui.stage("Compute statistics");
        OccupancyStats::from_result(&result)
    };

    let mut sink = DirectorySink::create(&cfg.output_dir)?;
    {
        let _stage = ui.stage("Write reports");
        sink.write_detections(&result.detections_per_frame)?;
        sink.write_stats(&stats)?;
    }

    let heatmap_written = {
        let _stage = ui.stage("Render heatmap");
        match render_heatmap(&result.all_points(), result.frame_shape, &cfg.heatmap) {
            Some(heatmap) => {
                sink.write_heatmap(&heatmap)?;
                true
            }
            None => false,
        }
    };

    print_summary(&stats);
    println!();
    println!("detections: {}", sink.detections_path().display());
    println!("stats:      {}", sink.stats_path().display());
    println!("summary:    {}", sink.summary_path().display());
    if heatmap_written {
        println!("heatmap:    {}", sink.heatmap_path().display());
    } else {
        println!("heatmap:    skipped (no detections)");
    }
    Ok(())
}

fn apply_args(cfg: &mut MapperConfig, args: &Args) {
    if let Some(video) = &args.video {
        cfg.video_path = video.clone();
    }
    if let Some(out) = &args.out {
        cfg.output_dir = out.clone();
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.trim().to_lowercase();
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = model.clone();
    }
}

fn print_summary(stats: &OccupancyStats) {
    println!();
    println!("quick summary");
    println!("  total frames:          {}", stats.total_frames);
    println!("  duration:              {:.2}s", stats.duration_seconds);
    println!("  total detections:      {}", stats.total_detections);
    println!("  occupied frames:       {}", stats.frames_with_detections);
    println!("  avg people per frame:  {:.3}", stats.average_people_per_frame);
    println!(
        "  avg people (occupied): {:.3}",
        stats.average_people_when_occupied
    );
    println!("  peak people:           {}", stats.peak_people_in_single_frame);
}
