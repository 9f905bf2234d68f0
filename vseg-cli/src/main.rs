//! VSEG CLI Tool
//!
//! Command-line interface for segmenting videos into scenes, shots and
//! sub-shots and for assembling boundary files into a hierarchy.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use vseg_core::{Frame, FrameRange};
use vseg_detect::refiner::qualifies;
use vseg_detect::{
    CommandRefiner, FrameSource, RawRgbReader, SceneStrategy, Segmentation, Segmenter, SegmenterConfig,
    StatisticalRefiner,
};
use vseg_hierarchy::{assemble_from_dir, ContainmentReport, Hierarchy, HierarchyBuilder};

#[derive(Parser)]
#[command(name = "vseg")]
#[command(about = "VSEG - Scene, shot and sub-shot segmentation of videos")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Worker threads for scoring and refinement (defaults to the CPU count)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a video and write scene.txt, shot.txt and subshot.txt
    Segment {
        /// Input video: headerless RGB24 (.rgb) or, with the ffmpeg feature, any encoded file
        input: PathBuf,

        /// Output directory for the boundary files
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// JSON configuration file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Frame width in pixels
        #[arg(long)]
        width: Option<u32>,

        /// Frame height in pixels
        #[arg(long)]
        height: Option<u32>,

        /// Frame rate used for timestamps
        #[arg(long)]
        fps: Option<f64>,

        /// How shots are grouped into scenes
        #[arg(long, value_enum)]
        scene_strategy: Option<SceneStrategyArg>,

        /// External sub-shot detector, run as `<cmd> [args] <video> <start> <end>`
        #[arg(long, conflicts_with = "statistical_refiner")]
        refiner_cmd: Option<PathBuf>,

        /// Extra argument passed to the refiner command (repeatable)
        #[arg(long = "refiner-arg", requires = "refiner_cmd")]
        refiner_args: Vec<String>,

        /// Video path handed to the refiner command (defaults to the input)
        #[arg(long, requires = "refiner_cmd")]
        video: Option<PathBuf>,

        /// Refine long shots with a local score threshold instead of a command
        #[arg(long)]
        statistical_refiner: bool,

        /// Save the first frame of every shot as PNG into this directory
        #[arg(long)]
        keyframes: Option<PathBuf>,

        /// Also write hierarchy.json into the output directory
        #[arg(long)]
        json: bool,

        /// Decode the whole video into memory and score it in one parallel pass
        #[arg(long)]
        in_memory: bool,
    },

    /// Assemble scene.txt, shot.txt and subshot.txt from a directory into a hierarchy
    Hierarchy {
        /// Directory containing the boundary files, or a hierarchy.json written by `segment --json`
        dir: PathBuf,

        /// Frame rate used for timestamps when assembling boundary files
        #[arg(long, default_value = "30")]
        fps: f64,

        /// Write the hierarchy as JSON to this file instead of printing it
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Show frame count, size and duration of a video
    Info {
        /// Input video
        input: PathBuf,

        #[arg(long, default_value = "480")]
        width: u32,

        #[arg(long, default_value = "270")]
        height: u32,

        /// Frame rate for the duration; defaults to the rate the container declares, then 30
        #[arg(long)]
        fps: Option<f64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SceneStrategyArg {
    Energy,
    AdaptiveRatio,
}

impl From<SceneStrategyArg> for SceneStrategy {
    fn from(arg: SceneStrategyArg) -> Self {
        match arg {
            SceneStrategyArg::Energy => SceneStrategy::Energy,
            SceneStrategyArg::AdaptiveRatio => SceneStrategy::AdaptiveRatio,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    init_thread_pool(cli.threads)?;

    match cli.command {
        Commands::Segment {
            input,
            output_dir,
            config,
            width,
            height,
            fps,
            scene_strategy,
            refiner_cmd,
            refiner_args,
            video,
            statistical_refiner,
            keyframes,
            json,
            in_memory,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(width) = width {
                config.width = width;
            }
            if let Some(height) = height {
                config.height = height;
            }
            if let Some(fps) = fps {
                config.fps = fps;
            }
            if let Some(strategy) = scene_strategy {
                config.scene_strategy = strategy.into();
            }

            let mut segmenter = Segmenter::new(config).context("Invalid segmentation configuration")?;
            if let Some(program) = refiner_cmd {
                let video = video.unwrap_or_else(|| input.clone());
                segmenter = segmenter.with_refiner(Box::new(CommandRefiner::new(program, video).with_args(refiner_args)));
            } else if statistical_refiner {
                let multiplier = segmenter.config().subshot.local_threshold_multiplier;
                segmenter = segmenter.with_refiner(Box::new(StatisticalRefiner::new(multiplier)));
            }

            segment_video(&segmenter, &input, &output_dir, keyframes.as_deref(), json, in_memory)?
        }

        Commands::Hierarchy { dir, fps, json } => show_hierarchy(&dir, fps, json.as_deref())?,

        Commands::Info {
            input,
            width,
            height,
            fps,
        } => print_info(&input, width, height, fps)?,
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn init_thread_pool(threads: Option<usize>) -> Result<()> {
    let threads = threads.unwrap_or_else(num_cpus::get);
    if threads == 0 {
        bail!("--threads must be at least 1");
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("Failed to initialize worker threads")?;
    info!(threads, "Initialized worker pool");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SegmenterConfig> {
    let Some(path) = path else {
        return Ok(SegmenterConfig::default());
    };
    let file = File::open(path).with_context(|| format!("Failed to open config {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("Failed to parse config {}", path.display()))
}

/// Opens `input` as raw RGB24 when it has an `.rgb` extension, otherwise through FFmpeg
fn open_source(input: &Path, width: u32, height: u32) -> Result<Box<dyn FrameSource>> {
    let is_raw = input
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("rgb"));

    if is_raw {
        let reader = RawRgbReader::open(input, width, height)
            .with_context(|| format!("Failed to open raw video {}", input.display()))?;
        return Ok(Box::new(reader));
    }

    #[cfg(feature = "ffmpeg")]
    {
        let reader = vseg_detect::VideoFileSource::open_scaled(input, width, height)
            .with_context(|| format!("Failed to open video file {}", input.display()))?;
        Ok(Box::new(reader))
    }

    #[cfg(not(feature = "ffmpeg"))]
    {
        bail!(
            "{} is not a raw .rgb file; rebuild with the `ffmpeg` feature to read encoded video",
            input.display()
        )
    }
}

fn segment_video(
    segmenter: &Segmenter,
    input: &Path,
    output_dir: &Path,
    keyframes: Option<&Path>,
    json: bool,
    in_memory: bool,
) -> Result<()> {
    let config = segmenter.config();
    info!(
        input = %input.display(),
        width = config.width,
        height = config.height,
        fps = config.fps,
        "Segmenting video"
    );

    let mut source = open_source(input, config.width, config.height)?;
    let segmentation = if in_memory {
        let frames = read_all_frames(source.as_mut())?;
        segmenter.run_frames(&frames).context("Segmentation failed")?
    } else {
        segmenter.run(source.as_mut()).context("Segmentation failed")?
    };

    let builder = HierarchyBuilder::new(config.fps)?;
    let (hierarchy, report) = builder.build(&segmentation.scenes, &segmentation.shots, &segmentation.subshots);

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    hierarchy
        .write_boundary_files(output_dir)
        .context("Failed to write boundary files")?;
    if json {
        let path = output_dir.join("hierarchy.json");
        hierarchy
            .write_json(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if let Some(dir) = keyframes {
        let saved = export_keyframes(source.as_mut(), &segmentation.shots, dir)?;
        println!("Saved {} keyframes to {}", saved, dir.display());
    }

    print_summary(&segmentation, &report, config.subshot.min_shot_len);
    println!("Wrote boundary files to {}", output_dir.display());
    Ok(())
}

/// Decodes every remaining frame of `source`
fn read_all_frames(source: &mut dyn FrameSource) -> Result<Vec<Frame>> {
    let mut frames = Vec::with_capacity(source.frame_count_hint().unwrap_or_default());
    while let Some(frame) = source.next_frame().context("Failed to decode frame")? {
        frames.push(frame);
    }
    info!(frames = frames.len(), "Decoded video into memory");
    Ok(frames)
}

/// Writes the first frame of every shot as `shot_NNNN.png`
fn export_keyframes(source: &mut dyn FrameSource, shots: &[FrameRange], dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create keyframe directory {}", dir.display()))?;
    source.rewind().context("Failed to rewind video")?;

    let mut starts = shots.iter().map(|shot| shot.start).enumerate().peekable();
    let mut saved = 0;
    while let Some(frame) = source.next_frame()? {
        let Some(&(shot, start)) = starts.peek() else {
            break;
        };
        if frame.index != start {
            continue;
        }

        let path = dir.join(format!("shot_{:04}.png", shot));
        frame
            .image
            .save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("Failed to save keyframe {}", path.display()))?;
        saved += 1;
        starts.next();
    }
    Ok(saved)
}

fn print_summary(segmentation: &Segmentation, report: &ContainmentReport, min_shot_len: usize) {
    println!("\nSegmentation Summary:");
    println!("  Frames: {}", segmentation.frame_count);
    println!(
        "  Cut threshold: {:.3} (mean {:.3}, std dev {:.3})",
        segmentation.threshold.value, segmentation.threshold.mean, segmentation.threshold.std_dev
    );
    println!("  Detected cuts: {}", segmentation.cuts.len());
    println!("  Shots: {}", segmentation.shots.len());
    println!("  Scenes: {}", segmentation.scenes.len());
    println!(
        "  Long shots (refinable): {}",
        segmentation.shots.iter().filter(|shot| qualifies(shot, min_shot_len)).count()
    );
    println!("  Sub-shots: {}", segmentation.subshots.len());
    print_report(report);
}

fn print_report(report: &ContainmentReport) {
    if !report.orphan_shots.is_empty() || !report.orphan_subshots.is_empty() {
        println!(
            "  Dropped: {} shots, {} sub-shots outside their parent",
            report.orphan_shots.len(),
            report.orphan_subshots.len()
        );
    }
    if !report.ambiguous_shots.is_empty() || !report.ambiguous_subshots.is_empty() {
        println!(
            "  Ambiguous: {} shots, {} sub-shots inside overlapping parents, kept in the first",
            report.ambiguous_shots.len(),
            report.ambiguous_subshots.len()
        );
    }
}

fn show_hierarchy(dir: &Path, fps: f64, json: Option<&Path>) -> Result<()> {
    let (hierarchy, report) = if dir.is_file() {
        let hierarchy =
            Hierarchy::read_json(dir).with_context(|| format!("Failed to read hierarchy {}", dir.display()))?;
        (hierarchy, ContainmentReport::default())
    } else {
        assemble_from_dir(dir, fps).with_context(|| format!("Failed to assemble hierarchy from {}", dir.display()))?
    };

    if let Some(path) = json {
        hierarchy
            .write_json(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote hierarchy to {}", path.display());
    } else {
        print_hierarchy(&hierarchy);
    }

    if !report.is_clean() {
        println!();
        print_report(&report);
    }
    Ok(())
}

fn print_hierarchy(hierarchy: &Hierarchy) {
    println!("Hierarchy @ {} fps:", hierarchy.fps);
    for (i, scene) in hierarchy.scenes.iter().enumerate() {
        println!("  Scene {} [{}] at {} ms", i, scene.range, scene.start_ms);
        for shot in &scene.shots {
            println!("    Shot [{}] at {} ms", shot.range, shot.start_ms);
            if !shot.subshot_starts_ms.is_empty() {
                let starts: Vec<String> = shot.subshot_starts_ms.iter().map(|ms| ms.to_string()).collect();
                println!("      Sub-shots at {} ms", starts.join(", "));
            }
        }
    }
}

fn print_info(input: &Path, width: u32, height: u32, fps: Option<f64>) -> Result<()> {
    let mut source = open_source(input, width, height)?;
    let (width, height) = source.dimensions();
    let declared = source.frame_rate();
    let fps = fps.or(declared).unwrap_or(30.0);
    if !fps.is_finite() || fps <= 0.0 {
        bail!("Frame rate must be positive, got {}", fps);
    }

    let frames = match source.frame_count_hint() {
        Some(frames) => frames,
        None => {
            let mut count = 0;
            while source.next_frame()?.is_some() {
                count += 1;
            }
            count
        }
    };

    println!("Video: {}", input.display());
    println!("  Dimensions: {}x{}", width, height);
    println!("  Frames: {}", frames);
    match declared {
        Some(rate) => println!("  Frame rate: {} fps (declared {:.3})", fps, rate),
        None => println!("  Frame rate: {} fps", fps),
    }
    println!("  Duration: {} ms", vseg_core::frame_to_ms(frames, fps));
    Ok(())
}
