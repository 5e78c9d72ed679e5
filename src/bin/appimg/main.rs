mod config;
mod error;
mod logger;

use self::config::*;
use self::error::*;
use self::logger::*;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use appimg::Bundle;
use appimg::EntryType;
use appimg::Format;
use appimg::ResourcesExtractor;
use clap::Parser;
use clap::Subcommand;
use log::LevelFilter;

#[derive(Parser)]
#[command(about = "Inspect AppImage bundles")]
struct Args {
    #[arg(short = 'c', long = "config", default_value = "/etc/appimg", env = "APPIMG_CONFIG")]
    config_dir: PathBuf,
    /// Increase verbosity.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the bundle type.
    Format(FileArgs),
    /// List payload entries.
    Ls(FileArgs),
    /// Print the contents of the entry following symbolic links.
    Cat(EntryArgs),
    /// Extract the entry following symbolic links.
    Extract(ExtractArgs),
    /// Print the path of the main desktop entry.
    Desktop(FileArgs),
    /// Print the paths of the icons with the given name.
    Icons(IconsArgs),
    /// Print the paths of MIME type packages.
    Mime(FileArgs),
    /// Print MD5 of the file.
    Digest(DigestArgs),
    /// Print the offset of the payload.
    Offset(FileArgs),
}

#[derive(clap::Args)]
struct FileArgs {
    /// Bundle file.
    #[clap(value_name = "FILE")]
    file: PathBuf,
}

#[derive(clap::Args)]
struct EntryArgs {
    #[clap(value_name = "FILE")]
    file: PathBuf,
    /// Entry path inside the payload.
    #[clap(value_name = "PATH")]
    path: String,
}

#[derive(clap::Args)]
struct ExtractArgs {
    #[clap(value_name = "FILE")]
    file: PathBuf,
    #[clap(value_name = "PATH")]
    path: String,
    /// Destination file.
    #[clap(value_name = "DEST")]
    destination: PathBuf,
}

#[derive(clap::Args)]
struct IconsArgs {
    #[clap(value_name = "FILE")]
    file: PathBuf,
    /// Icon name without extension.
    #[clap(value_name = "NAME")]
    name: String,
}

#[derive(clap::Args)]
struct DigestArgs {
    #[clap(value_name = "FILE")]
    file: PathBuf,
    /// Print MD5 of the `file://` URI instead.
    #[arg(long = "uri")]
    uri: bool,
}

fn main() -> ExitCode {
    match do_main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn do_main() -> Result<ExitCode, Error> {
    let args = Args::parse();
    let config = Config::open(&args.config_dir)?;
    let max_level = match args.verbose {
        0 => config.log_level()?,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Logger::init(max_level)?;
    let mut stdout = std::io::stdout().lock();
    match args.command {
        Command::Format(args) => {
            let detection = Format::probe(&args.file)?;
            writeln!(stdout, "{}", detection.format)?;
            if detection.format == Format::Invalid {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Ls(args) => {
            let bundle = Bundle::open(args.file)?;
            let mut files = bundle.files()?;
            while !files.is_end() {
                match files.entry_type()? {
                    EntryType::Link => writeln!(
                        stdout,
                        "{}\t{} -> {}",
                        EntryType::Link,
                        files.path()?,
                        files.link_target()?
                    )?,
                    other => writeln!(stdout, "{}\t{}", other, files.path()?)?,
                }
                files.advance()?;
            }
        }
        Command::Cat(args) => {
            let extractor = extractor(args.file, &config)?;
            stdout.write_all(&extractor.extract(&args.path)?)?;
        }
        Command::Extract(args) => {
            let extractor = extractor(args.file, &config)?;
            extractor.extract_to([(args.path.as_str(), args.destination.as_path())])?;
        }
        Command::Desktop(args) => {
            let extractor = extractor(args.file, &config)?;
            let path = extractor
                .desktop_entry_path()
                .ok_or_else(|| Error::ResourceNotFound("*.desktop".into()))?;
            writeln!(stdout, "{}", path)?;
        }
        Command::Icons(args) => {
            let extractor = extractor(args.file, &config)?;
            for path in extractor.icon_file_paths(&args.name) {
                writeln!(stdout, "{}", path)?;
            }
        }
        Command::Mime(args) => {
            let extractor = extractor(args.file, &config)?;
            for path in extractor.mime_type_packages_paths() {
                writeln!(stdout, "{}", path)?;
            }
        }
        Command::Digest(args) => {
            let bundle = Bundle::open(args.file)?;
            let digest = if args.uri {
                bundle.uri_digest()?
            } else {
                bundle.digest()?
            };
            writeln!(stdout, "{}", digest)?;
        }
        Command::Offset(args) => {
            let bundle = Bundle::open(args.file)?;
            writeln!(stdout, "{}", bundle.payload_offset()?)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn extractor(file: PathBuf, config: &Config) -> Result<ResourcesExtractor, Error> {
    let bundle = Bundle::open(file)?;
    Ok(ResourcesExtractor::with_layout(&bundle, config.layout.clone())?)
}
