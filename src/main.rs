//! disc2iso CLI
//!
//! Converts a CD/DVD image (CUE/BIN, MDS/MDF, ISZ) into a plain ISO by
//! extracting the first usable data track of the selected session.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use disc2iso::disc::iso9660::VolumeDescriptor;
use disc2iso::{
    extract_track, open_disc, CachedPassphrase, Disc, DiscError, ExtractProgress, WriterSink,
};

/// sysexits(3)-style codes so scripts can tell fault classes apart
const EX_DATAERR: u8 = 65;
const EX_NOINPUT: u8 = 66;
const EX_CANTCREAT: u8 = 73;
const EX_IOERR: u8 = 74;
const EX_NOPERM: u8 = 77;

#[derive(Parser)]
#[command(name = "disc2iso", version = disc2iso::version())]
#[command(about = "Convert CD/DVD disc images (CUE/BIN, MDS/MDF, ISZ) to ISO", long_about = None)]
struct Cli {
    /// Input disc image (.cue, .mds, .isz)
    infile: PathBuf,

    /// Output file (defaults to the input name with .iso)
    outfile: Option<PathBuf>,

    /// Session to use, 0-based (-1 or omitted: last session)
    #[arg(short, long, allow_negative_numbers = true)]
    session: Option<i32>,

    /// Write the image to standard output
    #[arg(short = 'c', long = "stdout", conflicts_with = "outfile")]
    stdout: bool,

    /// Overwrite the output file if it exists
    #[arg(short, long)]
    force: bool,

    /// Passphrase for encrypted images (prompted for otherwise)
    #[arg(short, long)]
    password: Option<String>,

    /// Suppress the progress display
    #[arg(short, long)]
    quiet: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("disc2iso: {}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn exit_code_for(err: &DiscError) -> u8 {
    match err {
        DiscError::FileNotFound(_) => EX_NOINPUT,
        DiscError::AuthRequired | DiscError::AuthFailed => EX_NOPERM,
        DiscError::Io(_) => EX_IOERR,
        _ => EX_DATAERR,
    }
}

fn run(cli: &Cli) -> Result<(), DiscError> {
    let mut creds = match &cli.password {
        Some(p) => CachedPassphrase::preseeded(p.clone()),
        None => CachedPassphrase::with_prompt(prompt_passphrase),
    };

    let mut disc = open_disc(&cli.infile, cli.session, &mut creds)?;
    let track = first_usable_track(&disc)?;
    let payload_size = disc.track_payload_size(track)?;

    if cli.stdout {
        let stdout = std::io::stdout();
        let mut sink = WriterSink::new(BufWriter::new(stdout.lock()));
        extract(&mut disc, track, &mut sink, payload_size, true)?;
        sink.finish()?;
        return Ok(());
    }

    let outfile = match &cli.outfile {
        Some(path) => path.clone(),
        None => cli.infile.with_extension("iso"),
    };
    if outfile == cli.infile {
        return Err(DiscError::Invariant(format!(
            "output would overwrite the input ({})",
            outfile.display()
        )));
    }
    if outfile.exists() && !cli.force {
        eprintln!(
            "disc2iso: {} exists, pass --force to overwrite",
            outfile.display()
        );
        return Err(DiscError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "output exists",
        )));
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&outfile)?;
    // known final size, so allocate it up front
    file.set_len(payload_size)?;

    let mut sink = WriterSink::new(BufWriter::new(file));
    let result = extract(&mut disc, track, &mut sink, payload_size, cli.quiet);
    if let Err(e) = result {
        // leave no truncated image behind
        drop(sink);
        let _ = std::fs::remove_file(&outfile);
        return Err(e);
    }
    sink.finish()?.into_inner().map_err(|e| e.into_error())?;

    report_volume(&outfile);
    if !cli.quiet {
        eprintln!("{}", outfile.display());
    }
    Ok(())
}

/// The first track of the session the codec can extract. Non-data tracks are
/// skipped with a note; unknown descriptor modes abort instead, since they
/// usually mean the image was misparsed.
fn first_usable_track(disc: &Disc) -> Result<u32, DiscError> {
    for i in 0..disc.track_count() {
        match disc.track_payload_size(i) {
            Ok(_) => return Ok(i),
            Err(e) if e.is_unsupported() => {
                log::info!("skipping track {}: {}", i, e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(DiscError::NoSupportedTrack)
}

fn extract(
    disc: &mut Disc,
    track: u32,
    sink: &mut dyn disc2iso::PayloadSink,
    payload_size: u64,
    quiet: bool,
) -> Result<(), DiscError> {
    if quiet {
        return extract_track(disc, track, sink, None);
    }

    let start = disc
        .session()
        .track(track)
        .map(|t| t.start)
        .unwrap_or_default();
    let sectors = payload_size / 2048;
    let pb = ProgressBar::new(sectors);
    pb.set_style(
        ProgressStyle::with_template("  {bar:40.cyan/blue} {pos}/{len} sectors ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut cb = |p: ExtractProgress| match p {
        ExtractProgress::Sector { sector, .. } => {
            pb.set_position(u64::from(sector - start));
        }
        ExtractProgress::Finished => pb.finish_and_clear(),
    };
    extract_track(disc, track, sink, Some(&mut cb))
}

/// Interactive fallback when no --password was given: prompt on stderr, read
/// one line from stdin. Refuses to prompt when stdin is not a terminal.
fn prompt_passphrase() -> Option<String> {
    if !std::io::stdin().is_terminal() {
        return None;
    }
    eprint!("Passphrase: ");
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).ok()?;
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

/// Best-effort volume label report; not every data track carries ISO 9660.
fn report_volume(path: &Path) {
    match File::open(path).map_err(DiscError::Io).and_then(|mut f| {
        VolumeDescriptor::read_from(&mut f)
    }) {
        Ok(pvd) if !pvd.volume_id.is_empty() => {
            log::info!("volume: {}", pvd.volume_id);
        }
        Ok(_) => {}
        Err(e) => log::debug!("no volume label: {}", e),
    }
}
