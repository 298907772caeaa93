//! Main entry point for the pkzip CLI application.
//!
//! A thin front-end over the library: it creates archives from files named
//! on the command line, lists archives, and extracts entries to disk or
//! stdout. It does not walk directories.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use pkzip::{
    Cli, CompressionMethod, DosDateTime, EntryOptions, ReadAt, WriterOptions, ZipFileEntry,
    ZipReader, ZipWriter,
};

/// Application entry point.
///
/// Parses command-line arguments, installs the logger and dispatches to
/// archive creation or to listing/extraction.
fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .format_timestamp(None)
        .init();

    if cli.create {
        return create_zip(&cli);
    }

    let reader = ZipReader::open(&cli.file)
        .with_context(|| format!("cannot open archive {}", cli.file))?;
    process_zip(&reader, &cli)
}

/// Build a new archive from the files given on the command line.
///
/// Every file becomes one entry named after its path as given, with `\`
/// turned into `/` and leading `/` or `./` removed. The modification time of
/// each file is carried over.
fn create_zip(cli: &Cli) -> Result<()> {
    if cli.files.is_empty() {
        bail!("nothing to add: pass the files to store after the archive name");
    }

    let mut options = WriterOptions::new();
    if let Some(comment) = &cli.comment {
        options = options.with_comment(comment.as_bytes())?;
    }

    let file = File::create(&cli.file).with_context(|| format!("cannot create {}", cli.file))?;
    let mut writer = ZipWriter::with_options(std::io::BufWriter::new(file), options);
    let method = CompressionMethod::from(cli.method);

    for path in &cli.files {
        let name = entry_name(path);
        let source = File::open(path).with_context(|| format!("cannot open {}", path))?;
        let modified = source
            .metadata()
            .and_then(|m| m.modified())
            .map(DosDateTime::from_system_time)
            .unwrap_or_default();

        if !cli.is_quiet() {
            println!("  adding: {}", name);
        }

        // sizes are unknown up front, so stream with data descriptors
        writer
            .add_entry_streamed(&name, EntryOptions::new(method).modified(modified), source)
            .with_context(|| format!("cannot add {}", path))?;
    }

    writer.finish()?;
    Ok(())
}

/// Archive-internal name for a path given on the command line.
fn entry_name(path: &str) -> String {
    let name = path.replace('\\', "/");
    let mut name = name.as_str();
    loop {
        if let Some(rest) = name.strip_prefix("./") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('/') {
            name = rest;
        } else {
            break;
        }
    }
    name.to_string()
}

/// List the archive, or extract the entries selected on the command line.
fn process_zip<R: ReadAt>(reader: &ZipReader<R>, cli: &Cli) -> Result<()> {
    if cli.is_listing() {
        return list_files(reader, cli.verbose > 0);
    }

    let selected = select_entries(reader.list_entries(), &cli.files, &cli.exclude);
    log::debug!("{} of {} entries selected", selected.len(), reader.len());

    let label_each = cli.pipe && selected.len() > 1;
    for entry in selected {
        extract_file(reader, entry, cli, label_each)?;
    }
    Ok(())
}

/// Entries to extract. Directories are skipped since extraction creates
/// parents on demand. An empty `wanted` list selects every file.
fn select_entries<'a>(
    entries: &'a [ZipFileEntry],
    wanted: &[String],
    excluded: &[String],
) -> Vec<&'a ZipFileEntry> {
    entries
        .iter()
        .filter(|entry| !entry.is_directory())
        .filter(|entry| {
            let name = entry.name();
            wanted.is_empty() || wanted.iter().any(|pattern| name_matches(pattern, &name))
        })
        .filter(|entry| {
            let name = entry.name();
            !excluded
                .iter()
                .any(|pattern| name.contains(pattern.as_str()) || glob_match(pattern, &name))
        })
        .collect()
}

/// A pattern without wildcards matches the full name or its last component.
fn name_matches(pattern: &str, name: &str) -> bool {
    if has_glob_chars(pattern) {
        return glob_match(pattern, name);
    }
    name == pattern || name.rsplit('/').next() == Some(pattern)
}

/// List files in the ZIP archive.
///
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
fn list_files<R: ReadAt>(reader: &ZipReader<R>, verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in reader.list_entries() {
        if !verbose {
            println!("{}", entry.name());
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();
        let uncompressed = entry.uncompressed_size as u64;
        let compressed = entry.compressed_size as u64;

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            uncompressed,
            compressed,
            ratio(compressed, uncompressed),
            year,
            month,
            day,
            hour,
            minute,
            entry.name()
        );

        if !entry.is_directory() {
            total_uncompressed += uncompressed;
            total_compressed += compressed;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
        if !reader.comment().is_empty() {
            println!("{}", String::from_utf8_lossy(reader.comment()));
        }
    }

    Ok(())
}

/// Space saved as a right-aligned percentage. Stored entries that grew
/// report 0%.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Extract a single file from the archive.
///
/// - Pipe mode (`-p`): Write to stdout instead of file
/// - Custom output directory (`-d`): Extract to specified directory
/// - Junk paths (`-j`): Ignore directory structure in archive
/// - Overwrite control (`-n`, `-o`): Handle existing files
fn extract_file<R: ReadAt>(
    reader: &ZipReader<R>,
    entry: &ZipFileEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    let name = entry.name();

    if cli.pipe {
        let stdout = std::io::stdout();
        let mut stdout = stdout.lock();
        if show_filename {
            use std::io::Write;
            writeln!(stdout, "--- {} ---", name)?;
        }
        reader.extract_to_writer(entry, &mut stdout)?;
        return Ok(());
    }

    let relative = if cli.junk_paths {
        match Path::new(name.as_ref()).file_name() {
            Some(base) => PathBuf::from(base),
            None => PathBuf::from(name.as_ref()),
        }
    } else {
        PathBuf::from(name.as_ref())
    };

    if !is_safe_relative(&relative) {
        if !cli.is_very_quiet() {
            eprintln!("Skipping: {} (unsafe path)", name);
        }
        return Ok(());
    }

    let output_path = match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(&relative),
        None => relative,
    };

    if output_path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", name);
            }
            return Ok(());
        }

        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", name);
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", name);
    }

    reader
        .extract_to_file(entry, &output_path)
        .with_context(|| format!("cannot extract {}", name))?;

    Ok(())
}

/// Only plain relative paths may be written to disk.
fn is_safe_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Match `text` against a pattern where `*` stands for any run of
/// characters and `?` for exactly one.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // position of the last `*` seen and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, from)) => {
                    p = star + 1;
                    t = from + 1;
                    backtrack = Some((star, from + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
