use clap::{Parser, ValueEnum};

use crate::zip::CompressionMethod;

#[derive(Parser, Debug)]
#[command(name = "pkzip")]
#[command(version)]
#[command(about = "Create, list and extract ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  pkzip data1.zip -x joe                extract all files except joe from data1.zip\n  \
  pkzip -p foo.zip | more               send contents of foo.zip via pipe into more\n  \
  pkzip -c out.zip a.txt b.txt -m store  create out.zip holding a.txt and b.txt")]
pub struct Cli {
    /// ZIP archive path
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all), or files to add with -c
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Create the archive from FILES instead of extracting
    #[arg(short = 'c')]
    pub create: bool,

    /// Compression method used with -c
    #[arg(short = 'm', value_enum, default_value_t = Method::Deflate)]
    pub method: Method,

    /// Archive comment used with -c
    #[arg(short = 'z', value_name = "TEXT")]
    pub comment: Option<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely; repeat to raise the log level
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

/// Compression method names accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Store,
    Deflate,
}

impl From<Method> for CompressionMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Store => CompressionMethod::Stored,
            Method::Deflate => CompressionMethod::Deflated,
        }
    }
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn is_listing(&self) -> bool {
        self.list || self.verbose > 0
    }

    /// Default log filter when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        match (self.is_very_quiet(), self.verbose) {
            (true, _) => "error",
            (false, 0 | 1) => "warn",
            (false, 2) => "info",
            (false, 3) => "debug",
            (false, _) => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_mode() {
        let cli = Cli::parse_from(["pkzip", "-c", "out.zip", "a.txt", "b.txt", "-m", "store"]);
        assert!(cli.create);
        assert_eq!(cli.file, "out.zip");
        assert_eq!(cli.files, ["a.txt", "b.txt"]);
        assert_eq!(CompressionMethod::from(cli.method), CompressionMethod::Stored);
    }

    #[test]
    fn verbosity_drives_listing_and_logging() {
        let cli = Cli::parse_from(["pkzip", "-vvv", "in.zip"]);
        assert!(cli.is_listing());
        assert_eq!(cli.log_filter(), "debug");

        let cli = Cli::parse_from(["pkzip", "-qq", "in.zip"]);
        assert!(cli.is_very_quiet());
        assert_eq!(cli.log_filter(), "error");
        assert_eq!(cli.method, Method::Deflate);
    }
}
