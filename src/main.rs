//! CLI entry point for `retswire`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};

use retswire::config::Config;
use retswire::export;
use retswire::model::record::Record;
use retswire::parser::compact::{self, MetadataElement, MetadataKind};
use retswire::parser::header::boundary_from_content_type;
use retswire::parser::multipart::MultipartDecoder;
use retswire::DecodeError;

#[derive(Parser)]
#[command(
    name = "retswire",
    version,
    about = "Decode RETS multipart object bodies and COMPACT payloads"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a multipart GetObject body into its objects
    Parts {
        /// File holding the raw response body
        path: PathBuf,
        /// Boundary token (without the leading "--")
        #[arg(short, long, conflicts_with = "content_type")]
        boundary: Option<String>,
        /// Full Content-Type response header to take the boundary from
        #[arg(short = 't', long)]
        content_type: Option<String>,
        /// Directory to write the decoded objects to
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the part list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode a COMPACT metadata payload (tab-delimited)
    Compact {
        /// Block file: first line COLUMNS, following lines DATA
        path: PathBuf,
        /// Metadata type (e.g. METADATA-CLASS); selects the list name
        #[arg(short, long)]
        kind: Option<MetadataKind>,
        /// Explicit list name, overriding --kind
        #[arg(short, long)]
        list_name: Option<String>,
        /// Element attribute as KEY=VALUE (repeatable)
        #[arg(short, long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,
        /// Write records as CSV to this path
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
        /// Write JSON to this path instead of stdout
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,
    },
    /// Decode a COMPACT-DECODED search payload
    Search {
        /// Block file: first line COLUMNS, following lines DATA
        path: PathBuf,
        /// Delimiter as hex, two digits per character
        #[arg(short, long, default_value = "09")]
        delimiter: String,
        /// Write records as CSV to this path
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
        /// Write JSON to this path instead of stdout
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = retswire::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Parts {
            path,
            boundary,
            content_type,
            output,
            json,
        } => cmd_parts(
            &path,
            boundary.as_deref(),
            content_type.as_deref(),
            output.or_else(|| config.export.default_output_dir.clone()),
            json,
            cli.verbose > 0,
            &config,
        ),
        Commands::Compact {
            path,
            kind,
            list_name,
            attrs,
            csv,
            json,
        } => cmd_compact(&path, kind, list_name, &attrs, csv, json, &config),
        Commands::Search {
            path,
            delimiter,
            csv,
            json,
        } => cmd_search(&path, &delimiter, csv, json, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = retswire::config::log_file_path(config);
    let log_dir = retswire::config::cache_dir(config);
    if let (Some(file_name), Ok(())) = (log_path.file_name(), std::fs::create_dir_all(&log_dir)) {
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "retswire", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Decode a multipart body and list (or extract) its parts.
fn cmd_parts(
    path: &Path,
    boundary: Option<&str>,
    content_type: Option<&str>,
    output: Option<PathBuf>,
    json: bool,
    show_progress: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let boundary = match (boundary, content_type) {
        (Some(b), _) => b.to_string(),
        (None, Some(ct)) => boundary_from_content_type(ct)
            .ok_or_else(|| anyhow::anyhow!("No boundary parameter in Content-Type '{ct}'"))?,
        (None, None) => anyhow::bail!("Either --boundary or --content-type is required"),
    };

    let body = std::fs::read(path).map_err(|e| DecodeError::io(path, e))?;
    let decoder = MultipartDecoder::new(&boundary)?.with_options(config.multipart_options());
    let decoded = decoder.decode(&body)?;

    if json {
        let items: Vec<serde_json::Value> = decoded
            .parts
            .iter()
            .enumerate()
            .map(|(i, p)| {
                serde_json::json!({
                    "index": i + 1,
                    "size": p.len(),
                    "mime": p.mime,
                    "content_description": p.content_description,
                    "content_id": p.content_id,
                    "object_id": p.object_id,
                    "filename": p.filename,
                    "transfer_encoding": p.transfer_encoding,
                    "headers": p.extra_headers,
                })
            })
            .collect();
        let out = serde_json::json!({
            "part_count": decoded.parts.len(),
            "parts": items,
            "fields": decoded.fields,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_parts_table(&decoded.parts);
    }

    if let Some(dir) = output {
        let progress = |done: usize, total: usize| {
            if show_progress && total > 0 {
                eprint!("\r  Exporting {done}/{total}");
                if done == total {
                    eprintln!();
                }
            }
        };
        let paths = export::parts::export_parts(&decoded.parts, &dir, &progress)?;
        eprintln!("  Wrote {} object(s) to {}", paths.len(), dir.display());
    }

    Ok(())
}

/// Decode a COMPACT metadata block file.
fn cmd_compact(
    path: &Path,
    kind: Option<MetadataKind>,
    list_name: Option<String>,
    attrs: &[String],
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
    config: &Config,
) -> anyhow::Result<()> {
    let (columns, data) = read_blocks(path)?;

    let mut attributes = Vec::with_capacity(attrs.len());
    for attr in attrs {
        let (k, v) = attr
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Attribute '{attr}' is not KEY=VALUE"))?;
        attributes.push((k.to_string(), v.to_string()));
    }

    let list_name = list_name
        .or_else(|| kind.map(|k| k.list_name().to_string()))
        .unwrap_or_else(|| config.compact.default_list_name.clone());

    let element = MetadataElement {
        attributes,
        columns,
        data,
    };
    let table = compact::decode_compact_metadata(&[element], Some(&list_name))?;

    if let Some(csv_path) = csv {
        export::csv::export_csv(&table.records, &csv_path, config.export.csv_separator)?;
        eprintln!("  Exported CSV to {}", csv_path.display());
    }
    match json {
        Some(json_path) => export::json::export_json(&table, &json_path)?,
        None => println!("{}", serde_json::to_string_pretty(&table)?),
    }
    Ok(())
}

/// Decode a COMPACT-DECODED block file.
fn cmd_search(
    path: &Path,
    delimiter_hex: &str,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
    config: &Config,
) -> anyhow::Result<()> {
    let (columns, data) = read_blocks(path)?;
    let records: Vec<Record> =
        compact::decode_compact_decoded(columns.as_deref(), &data, Some(delimiter_hex))?;

    if let Some(csv_path) = csv {
        export::csv::export_csv(&records, &csv_path, config.export.csv_separator)?;
        eprintln!("  Exported CSV to {}", csv_path.display());
    }
    match json {
        Some(json_path) => export::json::export_json(&records[..], &json_path)?,
        None => println!("{}", serde_json::to_string_pretty(&records)?),
    }
    Ok(())
}

/// Read a block file: the first non-blank line is COLUMNS, the rest DATA.
///
/// Only line terminators are stripped; leading and trailing delimiters
/// must survive.
fn read_blocks(path: &Path) -> anyhow::Result<(Option<String>, Vec<String>)> {
    let text = std::fs::read_to_string(path).map_err(|e| DecodeError::io(path, e))?;
    let mut lines = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .filter(|l| !l.is_empty());

    let columns = lines.next().map(String::from);
    let data = lines.map(String::from).collect();
    Ok((columns, data))
}

/// Print decoded parts as a human-readable table.
fn print_parts_table(parts: &[retswire::Part]) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {} part(s)", parts.len());
    println!();

    if parts.is_empty() {
        return;
    }

    println!(
        "  {:<4} {:<24} {:<16} {:<10} {:<8} {:>10}",
        "#", "Content-Type", "Content-ID", "Object-ID", "Encoding", "Size"
    );
    println!("  {}", "-".repeat(77));

    for (i, part) in parts.iter().enumerate() {
        let mime: String = part.mime.as_deref().unwrap_or("-").chars().take(23).collect();
        let cid: String = part
            .content_id
            .as_deref()
            .unwrap_or("-")
            .chars()
            .take(15)
            .collect();
        let oid: String = part
            .object_id
            .as_deref()
            .unwrap_or("-")
            .chars()
            .take(9)
            .collect();

        println!(
            "  {:<4} {:<24} {:<16} {:<10} {:<8} {:>10}",
            i + 1,
            mime,
            cid,
            oid,
            part.transfer_encoding,
            format_size(part.len() as u64, BINARY)
        );
    }
    println!();
}
