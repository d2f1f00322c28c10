use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "playout", version)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a render device on the headless backend.
    Run(RunArgs),
    /// List the video format presets.
    Formats,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Session config JSON.
    #[arg(long)]
    config: PathBuf,

    /// Stop after this many composites.
    #[arg(long, default_value_t = 50)]
    ticks: u64,

    /// Override render fan-out threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Write the last composite, flattened, as a PNG.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Formats => cmd_formats(),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

fn cmd_formats() -> anyhow::Result<()> {
    for name in playout::VideoFormat::preset_names() {
        let f = playout::VideoFormat::from_name(name)?;
        println!(
            "{:<10} {}x{} @ {:.3} fps",
            f.name,
            f.width,
            f.height,
            f.fps.as_f64()
        );
    }
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let mut cfg = playout::DeviceConfig::from_path(&args.config)
        .with_context(|| format!("load config '{}'", args.config.display()))?;
    if args.threads.is_some() {
        cfg.threads = args.threads;
    }
    cfg.validate()?;

    let headless = cfg.headless_opts()?;
    let period = headless.format.fps.frame_duration()?;
    let processor = Arc::new(playout::HeadlessProcessor::new(headless));
    let device = playout::RenderDevice::new(processor.clone(), cfg.device_opts())?;
    let registry = playout::ProducerRegistry::with_defaults(cfg.factory_context());
    cfg.apply(&device, &registry)?;

    let budget = period
        .saturating_mul(u32::try_from(args.ticks).unwrap_or(u32::MAX))
        .saturating_mul(2)
        .saturating_add(Duration::from_secs(5));
    let start = processor.sent_count();
    if !processor.wait_for_sent(start.saturating_add(args.ticks), budget) {
        anyhow::bail!(
            "render device produced {} of {} composites within {budget:?}",
            processor.sent_count() - start,
            args.ticks
        );
    }
    device.shutdown();

    if let Some(out) = &args.snapshot {
        let frame = processor
            .snapshot()?
            .context("no composite was rendered")?;
        if let Some(parent) = out.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        image::save_buffer_with_format(
            out,
            frame.image(),
            frame.width(),
            frame.height(),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", out.display()))?;
        eprintln!("wrote {}", out.display());
    }

    let stats = device.stats();
    println!(
        "ticks={} tick_faults={} layer_faults={} layers={}",
        stats.ticks,
        stats.tick_faults,
        stats.layer_faults,
        device.layer_ids().len()
    );
    Ok(())
}
