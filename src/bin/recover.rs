//! CLI front-end: parses flags, opens the image and output files,
//! installs the tracing subscriber, and maps the engine's `Result` to a
//! process exit code. Owns no carving logic of its own.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vss_recover::{probe, Error};

#[derive(Parser, Debug)]
#[command(name = "vss-recover", about = "Recovers deleted VSS snapshots from a raw NTFS disk image")]
struct Args {
    /// Path to the raw disk image.
    #[arg(short = 'i', long = "image")]
    image: Option<String>,

    /// Byte offset in the image to the start of the NTFS volume.
    #[arg(short = 'o', long = "volume-offset", default_value_t = 0)]
    volume_offset: u64,

    /// Output catalog file path.
    #[arg(short = 'c', long = "catalog")]
    catalog: Option<String>,

    /// Output store file path.
    #[arg(short = 's', long = "store")]
    store: Option<String>,

    /// Enable diagnostic tracing to stdout.
    #[arg(long = "debug")]
    debug: bool,
}

/// The three required paths, resolved from `Args` once all are known to
/// be present. Keeps `run` from re-checking `Option`s after this point.
struct RequiredArgs<'a> {
    image: &'a str,
    volume_offset: u64,
    catalog: &'a str,
    store: &'a str,
}

impl Args {
    fn required(&self) -> Result<RequiredArgs<'_>, Error> {
        match (&self.image, &self.catalog, &self.store) {
            (Some(image), Some(catalog), Some(store)) => Ok(RequiredArgs {
                image,
                volume_offset: self.volume_offset,
                catalog,
                store,
            }),
            _ => Err(Error::InvalidArgument),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let required = args.required()?;

    let mut image = File::options().read(true).open(required.image)?;

    // Validate the volume before creating either output file: an S1
    // failure (no VSS signature) must leave no files on disk, and must
    // not leave stray empties behind that would trip `create_new` on a
    // retry against the same `-c`/`-s` paths.
    probe::probe_volume(&mut image, required.volume_offset)?;

    let catalog_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(required.catalog)?;
    let store_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(required.store)?;
    let mut catalog_out = BufWriter::new(catalog_file);
    let mut store_out = BufWriter::new(store_file);

    vss_recover::recover(&mut image, required.volume_offset, &mut catalog_out, &mut store_out)?;

    catalog_out.flush()?;
    store_out.flush()?;
    Ok(())
}
