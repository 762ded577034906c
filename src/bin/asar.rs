//! asar command line tool
//!
//! Pack, list and extract asar archives

use anyhow::{Context, Result};
use asar_rs::{HeaderCache, PackOptions};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "asar")]
#[command(about = "Create and inspect asar archives")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack a directory into an archive
    Pack {
        /// Directory to pack
        #[arg(short, long)]
        src: PathBuf,

        /// Archive to write
        #[arg(short, long)]
        dest: PathBuf,

        /// Include files and directories starting with a dot
        #[arg(long)]
        dot: bool,

        /// Ordering manifest for the packed byte layout
        #[arg(long)]
        ordering: Option<PathBuf>,

        /// Keep files whose name matches this glob out of the archive
        #[arg(long)]
        unpack: Option<String>,

        /// Keep directories matching this glob or prefix out of the archive
        #[arg(long)]
        unpack_dir: Option<String>,

        /// TOML file with pack options; flags given here override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List every path in an archive
    List {
        #[arg(short, long)]
        archive: PathBuf,

        /// Prefix each path with its packed / unpacked state
        #[arg(long)]
        annotate: bool,
    },

    /// Extract a whole archive into a directory
    Extract {
        #[arg(short, long)]
        archive: PathBuf,

        #[arg(short, long)]
        dest: PathBuf,
    },

    /// Extract a single file
    ExtractFile {
        #[arg(short, long)]
        archive: PathBuf,

        /// Path of the file inside the archive
        #[arg(short, long)]
        path: String,

        /// Do not follow links inside the archive
        #[arg(long)]
        no_follow: bool,

        /// Write here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the header size and raw header JSON
    Header {
        #[arg(short, long)]
        archive: PathBuf,
    },
}

fn pack_options(
    config: Option<PathBuf>,
    dot: bool,
    ordering: Option<PathBuf>,
    unpack: Option<String>,
    unpack_dir: Option<String>,
) -> Result<PackOptions> {
    let mut options = match config {
        Some(path) => PackOptions::from_toml_file(&path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => PackOptions::new(),
    };
    if dot {
        options = options.with_dot(true);
    }
    if let Some(ordering) = ordering {
        options = options.with_ordering(ordering);
    }
    if let Some(pattern) = unpack {
        options = options.with_unpack(pattern);
    }
    if let Some(pattern) = unpack_dir {
        options = options.with_unpack_dir(pattern);
    }
    Ok(options)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut cache = HeaderCache::new();

    match args.command {
        Command::Pack {
            src,
            dest,
            dot,
            ordering,
            unpack,
            unpack_dir,
            config,
        } => {
            let options = pack_options(config, dot, ordering, unpack, unpack_dir)?;
            let namespace = asar_rs::pack(&src, &dest, &options)
                .with_context(|| format!("packing {} into {}", src.display(), dest.display()))?;
            info!("Wrote {} ({} packed bytes)", dest.display(), namespace.packed_size());
        }
        Command::List { archive, annotate } => {
            let paths = asar_rs::list_package(&mut cache, &archive, annotate)
                .with_context(|| format!("reading {}", archive.display()))?;
            let mut stdout = std::io::stdout().lock();
            for path in paths {
                writeln!(stdout, "{}", path)?;
            }
        }
        Command::Extract { archive, dest } => {
            asar_rs::extract_all(&mut cache, &archive, &dest).with_context(|| {
                format!("extracting {} into {}", archive.display(), dest.display())
            })?;
        }
        Command::ExtractFile {
            archive,
            path,
            no_follow,
            out,
        } => {
            let content = asar_rs::extract_file(&mut cache, &archive, &path, !no_follow)
                .with_context(|| format!("extracting {} from {}", path, archive.display()))?;
            match out {
                Some(out) => std::fs::write(&out, &content)
                    .with_context(|| format!("writing {}", out.display()))?,
                None => std::io::stdout().lock().write_all(&content)?,
            }
        }
        Command::Header { archive } => {
            let header = asar_rs::get_raw_header(&archive)
                .with_context(|| format!("reading {}", archive.display()))?;
            println!("header size: {}", header.header_size);
            println!("{}", header.header_string);
        }
    }

    Ok(())
}
