use clap::{Parser, Subcommand, ValueEnum};
use rowtree::{Document, DocumentOptions, Record};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

/// rowtree CLI - work with a rowtree document from the command line
#[derive(Parser)]
#[command(name = "rowtree", version, about)]
struct Cli {
    /// YAML options file (delimiter, order, unique, ...)
    #[arg(long, env = "ROWTREE_CONFIG")]
    config: Option<PathBuf>,

    /// Format for structured output
    #[arg(long, default_value = "yaml")]
    format: Format,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

#[derive(Clone, ValueEnum)]
enum ShowAs {
    Xml,
    Delimited,
    Block,
    Section,
    Yaml,
    Table,
    Json,
    Xslt,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty document file from a schema
    New {
        /// Document file to write
        file: PathBuf,
        /// Schema, e.g. contacts[title]/contact(name,age,dob)
        schema: String,
    },

    /// Add a record
    Create {
        file: PathBuf,
        /// Field values (e.g. --field name=Bob)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// One line shaped like the format mask, instead of --field
        #[arg(long, conflicts_with = "fields")]
        line: Option<String>,
    },

    /// Change fields of a record
    Update {
        file: PathBuf,
        /// Record id
        id: String,
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Delete a record
    Delete {
        file: PathBuf,
        /// Record id
        id: String,
        /// Show what would be deleted without deleting it
        #[arg(long)]
        dry_run: bool,
    },

    /// Reconcile the document against text from a file, URL or stdin (-)
    Import {
        file: PathBuf,
        source: String,
    },

    /// Print the document
    Show {
        file: PathBuf,
        #[arg(long = "as", default_value = "xml")]
        mode: ShowAs,
        /// Indent markup output
        #[arg(long)]
        pretty: bool,
    },

    /// Find records by field value
    Query {
        file: PathBuf,
        field: String,
        value: String,
        /// Treat the value as a regular expression
        #[arg(long)]
        regex: bool,
    },

    /// Show the summary, or set entries with --set
    Summary {
        file: PathBuf,
        #[arg(long = "set", value_parser = parse_key_value)]
        entries: Vec<(String, String)>,
    },

    /// Print an RSS feed of the newest records
    Rss {
        file: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn run(cli: Cli) -> CliResult<()> {
    let options = match &cli.config {
        Some(path) => DocumentOptions::from_yaml_file(path)?,
        None => DocumentOptions::default(),
    };

    match cli.command {
        Command::New { file, schema } => {
            if file.exists() {
                return Err(format!("'{}' already exists", file.display()).into());
            }
            let mut doc = Document::with_options(&schema, options)?;
            doc.save_as(&file)?;
            print_output(
                &serde_json::json!({ "ok": true, "file": file.display().to_string(), "schema": doc.schema().raw }),
                &cli.format,
            )?;
        }

        Command::Create { file, fields, line } => {
            let mut doc = open(&file, options)?;
            let record = match line {
                Some(line) => doc.create_from_line(&line)?,
                None => doc.create(fields)?,
            };
            let value = serde_json::json!({ "id": record.id, "key": record.key });
            doc.save()?;
            print_output(&value, &cli.format)?;
        }

        Command::Update { file, id, fields } => {
            let mut doc = open(&file, options)?;
            let value = record_value(doc.update(&id, fields)?)?;
            doc.save()?;
            print_output(&value, &cli.format)?;
        }

        Command::Delete { file, id, dry_run } => {
            let mut doc = open(&file, options)?;
            if dry_run {
                let record = record_value(doc.record(&id)?)?;
                print_output(
                    &serde_json::json!({ "dry_run": true, "would_delete": record }),
                    &cli.format,
                )?;
            } else {
                doc.delete(&id)?;
                doc.save()?;
                print_output(&serde_json::json!({ "ok": true, "deleted": id }), &cli.format)?;
            }
        }

        Command::Import { file, source } => {
            let mut doc = open(&file, options)?;
            let report = if source == "-" {
                let mut text = String::new();
                std::io::stdin().read_to_string(&mut text)?;
                doc.import(&text)?
            } else {
                doc.import_from(&source)?
            };
            doc.save()?;
            print_output(&serde_json::to_value(report)?, &cli.format)?;
        }

        Command::Show { file, mode, pretty } => {
            let mut doc = open(&file, options)?;
            doc.set_pretty(pretty);
            let text = match mode {
                ShowAs::Xml => doc.to_xml(),
                ShowAs::Delimited => doc.to_delimited()?,
                ShowAs::Block => doc.to_block(),
                ShowAs::Section => doc.to_section(),
                ShowAs::Yaml => doc.to_yaml()?,
                ShowAs::Table => doc.to_table(),
                ShowAs::Json => doc.to_json()?,
                ShowAs::Xslt => doc.to_xslt(),
            };
            println!("{text}");
        }

        Command::Query {
            file,
            field,
            value,
            regex,
        } => {
            let doc = open(&file, options)?;
            let records = if regex {
                doc.query_matching(&field, &value)?
            } else {
                doc.query_all(&field, &value)?
            };
            let values = records
                .into_iter()
                .map(record_value)
                .collect::<CliResult<Vec<_>>>()?;
            print_output(&serde_json::Value::Array(values), &cli.format)?;
        }

        Command::Summary { file, entries } => {
            let mut doc = open(&file, options)?;
            if !entries.is_empty() {
                for (key, value) in &entries {
                    doc.set_summary_value(key, value)?;
                }
                doc.save()?;
            }
            print_output(&serde_json::to_value(doc.summary())?, &cli.format)?;
        }

        Command::Rss { file, limit } => {
            let doc = open(&file, options)?;
            println!("{}", doc.to_rss(limit));
        }
    }

    Ok(())
}

fn open(file: &Path, options: DocumentOptions) -> CliResult<Document> {
    let location = file
        .to_str()
        .ok_or_else(|| format!("'{}' is not a valid UTF-8 path", file.display()))?;
    Ok(Document::open_with(location, options)?)
}

fn record_value(record: &Record) -> CliResult<serde_json::Value> {
    Ok(serde_json::to_value(record)?)
}

fn print_output(value: &serde_json::Value, format: &Format) -> CliResult<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
