//! flatgi CLI - batch geometry-image encoding of mesh collections.
//!
//! Usage:
//!   flatgi 0 <LIST.txt> [--ext .off] [--fld-pre DIR/] [--fl-str SUBSTR]
//!   flatgi 1 <LIST.txt> [--slice] [--spi N] [--m2g SIZE] [--use-normal] [--g2o]
//!
//! Mode 0 writes the list file, mode 1 processes it. Run `flatgi --help` for
//! every option.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use log::{error, info};

use flatgi::algo::Progress;
use flatgi::codec::{EncodeOptions, InpaintOptions, PackOptions};
use flatgi::pipeline::listing::{self, ListFilter};
use flatgi::pipeline::report::{self, RunLog};
use flatgi::pipeline::services::{ExternalParameterizer, LeaveOpen, MeshlabServer};
use flatgi::pipeline::{FileReport, Pipeline, PipelineConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Enumerate input files into the list file
    #[value(name = "0")]
    List,
    /// Process every file named in the list file
    #[value(name = "1")]
    Process,
}

#[derive(Parser)]
#[command(name = "flatgi")]
#[command(author, version, about = "Geometry-image codec for mesh collections", long_about = None)]
struct Cli {
    /// 0 = write the list file, 1 = process it
    #[arg(value_enum)]
    mode: Mode,

    /// List file (`.txt`); its directory is the database root
    list: PathBuf,

    /// Extension of input files when listing
    #[arg(long, default_value = ".off")]
    ext: String,

    /// Output folder, relative to the list file's directory
    #[arg(long = "fld-pre", alias = "fldPre")]
    fld_pre: Option<String>,

    /// Only list files whose stem contains this string
    #[arg(long = "fl-str", alias = "flStr")]
    fl_str: Option<String>,

    /// Slice meshes at their mid-plane
    #[arg(long)]
    slice: bool,

    /// Parameterize with this many iterations
    #[arg(long = "spi", alias = "sPI", value_name = "ITERATIONS")]
    spi: Option<usize>,

    /// Encode geometry images of this size
    #[arg(long = "m2g", alias = "m2G", value_name = "SIZE")]
    m2g: Option<usize>,

    /// Encode and decode normal images too
    #[arg(long = "use-normal", alias = "useNormal")]
    use_normal: bool,

    /// Decode geometry images into meshes
    #[arg(long = "g2o", alias = "G2o")]
    g2o: bool,

    /// Downscale factor applied when decoding
    #[arg(long, default_value = "1")]
    downscale: u32,

    /// Number of inpainting iterations
    #[arg(long, default_value = "20")]
    inpaint_iterations: usize,

    /// Do not double the slice axis range when normalizing
    #[arg(long)]
    no_double_slice_axis: bool,

    /// meshlabserver executable used to repair sliced meshes
    #[arg(long, default_value = "meshlabserver")]
    meshlab: PathBuf,

    /// MeshLab filter script (`.mlx`) used for repair
    #[arg(long, default_value = "clean.mlx")]
    clean_script: PathBuf,

    /// External parameterizer: `<program> <input> <output> <iterations>`
    #[arg(long, default_value = "flatgi-param")]
    param_cmd: PathBuf,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_root = cli
        .list
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let list_stem = cli
        .list
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    match cli.mode {
        Mode::List => {
            let folder = cli.fld_pre.clone().unwrap_or_else(|| format!("{list_stem}/"));
            let filter = ListFilter {
                extension: cli.ext.clone(),
                stem_contains: cli.fl_str.clone(),
            };
            let files = listing::find_files(db_root.join(folder), &filter)?;
            if files.is_empty() {
                return Err("no matching files found".into());
            }
            listing::write_list(&cli.list, &files)?;
            info!("Listed {} files into {}", files.len(), cli.list.display());
            Ok(())
        }
        Mode::Process => cmd_process(&cli, &db_root),
    }
}

fn cmd_process(cli: &Cli, db_root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let files = listing::read_list(&cli.list)?;

    let suffix = cli
        .fld_pre
        .clone()
        .unwrap_or_else(|| report::timestamp().to_string());
    let mut run_log = RunLog::open(report::log_path(&cli.list, &suffix))?;

    let output_dir = match &cli.fld_pre {
        Some(folder) => db_root.join(folder),
        None => db_root.to_path_buf(),
    };
    std::fs::create_dir_all(&output_dir)?;

    run_log.line(&format!("Run started at {} (unix seconds)", report::timestamp()));
    run_log.line(&format!(
        "Processing files from list file {} & writing files to {}",
        cli.list.display(),
        output_dir.display()
    ));
    run_log.flush()?;

    let config = PipelineConfig {
        output_dir,
        slice: cli.slice,
        param_iterations: cli.spi,
        encode: cli.m2g.map(|size| EncodeOptions::default().with_im_size(size)),
        decode: cli.g2o,
        use_normals: cli.use_normal,
        downscale: cli.downscale,
        inpaint: InpaintOptions::default().with_iterations(cli.inpaint_iterations),
        pack: PackOptions {
            double_slice_axis: !cli.no_double_slice_axis,
        },
        ..Default::default()
    };
    let pipeline = Pipeline::new(
        config,
        Box::new(MeshlabServer::new(&cli.meshlab, &cli.clean_script)),
        Box::new(LeaveOpen),
        Box::new(ExternalParameterizer::new(&cli.param_cmd)),
    )?
    .with_progress(Progress::new(|current, total, message| {
        log::debug!("{message}: {current}/{total}");
    }));

    let progress = create_progress();
    let total = files.len();
    let mut counter = 0;

    for (i, file) in files.iter().enumerate() {
        let file_started = Instant::now();
        run_log.flush()?;
        run_log.append(&format!("{} : ", file.display()));

        let mut file_report = FileReport::default();
        let result = pipeline.process(file, &mut file_report);
        run_log.append(file_report.notes());

        match result {
            Ok(()) => {
                counter += 1;
                run_log.line("");
                run_log.file_footer(counter, i + 1, total, file_started.elapsed());
            }
            Err(e) => {
                error!("{}: {e}", file.display());
                run_log.line(&format!(" failed ({:?}): {e}", e.kind()));
            }
        }
        progress.report(i + 1, total, &file.display().to_string());
    }

    run_log.finished(started.elapsed());
    run_log.flush()?;

    println!(
        "Processed {counter}/{total} files in {:.2?}",
        started.elapsed()
    );
    println!("Log written to {}", run_log.path().display());
    Ok(())
}

fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }

        let raw_percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };

        // Only ever grow.
        let percent = max_percent.fetch_max(raw_percent, Ordering::Relaxed).max(raw_percent);

        let bar_width = 30;
        let filled = (percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);

        eprint!("\r[{bar}{space}] {percent:3}% {message}");
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}
