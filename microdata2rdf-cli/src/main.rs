use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use microdata2rdf::{MicrodataParser, SequentialBlankNodes, VocabRegistry};
use oxrdf::{NamedNode, Quad};
use oxttl::{NQuadsSerializer, TriGSerializer};
use tracing_subscriber::EnvFilter;

/// Extracts the Microdata items of an HTML document as RDF.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// A file, `-` for standard input, or an http(s) URL.
    #[arg(value_name = "INPUT")]
    input: String,

    /// Base IRI for relative references; defaults to the input's location.
    #[arg(long, value_name = "IRI")]
    base: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::NQuads)]
    format: Format,

    /// Put every quad into this named graph.
    #[arg(long, value_name = "IRI")]
    graph: Option<String>,

    /// Only close elements that are explicitly closed.
    #[arg(long)]
    strict: bool,

    /// Vocabulary registry in the JSON layout of https://www.w3.org/ns/md
    #[arg(long, value_name = "FILE")]
    vocab_registry: Option<PathBuf>,

    /// Label blank nodes _:b0, _:b1, ... instead of randomly.
    #[arg(long)]
    sequential_bnodes: bool,

    /// Build the whole document tree first instead of streaming.
    #[arg(long)]
    dom: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    #[value(name = "nquads")]
    NQuads,
    #[value(name = "trig")]
    TriG,
}

enum Input {
    Stdin,
    File(PathBuf),
    Url(url::Url),
}

impl Input {
    fn new(input: &str) -> Self {
        if input == "-" {
            return Input::Stdin;
        }

        match url::Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Input::Url(url),
            _ => Input::File(PathBuf::from(input)),
        }
    }

    fn default_base(&self) -> Result<Option<String>, Box<dyn std::error::Error>> {
        Ok(match self {
            Input::Stdin => None,
            Input::File(path) => {
                let path = std::fs::canonicalize(path)?;
                url::Url::from_file_path(&path).ok().map(String::from)
            }
            Input::Url(url) => Some(url.to_string()),
        })
    }

    fn open(self) -> Result<Option<Box<dyn Read>>, Box<dyn std::error::Error>> {
        let reader: Box<dyn Read> = match self {
            Input::Stdin => Box::new(std::io::stdin().lock()),
            Input::File(path) => Box::new(BufReader::new(File::open(path)?)),
            Input::Url(url) => {
                let client = reqwest::blocking::Client::new();
                let response = client.get(url).send()?.error_for_status()?;
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok());

                if content_type.is_some_and(|ct| !ct.starts_with("text/html")) {
                    eprintln!("Error: content type is not text/html.");
                    return Ok(None);
                }

                Box::new(response)
            }
        };

        Ok(Some(reader))
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let input = Input::new(&args.input);

    let mut parser = MicrodataParser::new();
    let base = match &args.base {
        Some(base) => Some(base.clone()),
        None => input.default_base()?,
    };
    if let Some(base) = base {
        parser = parser.with_base_iri(base)?;
    }

    if let Some(graph) = &args.graph {
        parser = parser.with_default_graph(NamedNode::new(graph.as_str())?);
    }

    if let Some(path) = &args.vocab_registry {
        let json = std::fs::read_to_string(path)?;
        parser = parser.with_vocab_registry(VocabRegistry::from_json(&json)?);
    }

    if args.strict {
        parser = parser.strict_markup();
    }

    if args.sequential_bnodes {
        parser = parser.with_blank_node_issuer(SequentialBlankNodes::default());
    }

    let Some(mut reader) = input.open()? else {
        return Ok(ExitCode::FAILURE);
    };

    let quads: Box<dyn Iterator<Item = Result<Quad, microdata2rdf::Error>>> = if args.dom {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let html = scraper::Html::parse_document(&content);
        for err in html.errors.iter() {
            tracing::debug!("HTML parse error: {err}");
        }
        Box::new(parser.for_document(&html))
    } else {
        Box::new(parser.for_reader(reader))
    };

    let mut locked_out = std::io::stdout().lock();
    match args.format {
        Format::NQuads => {
            let mut writer = NQuadsSerializer::new().for_writer(&mut locked_out);
            for quad in quads {
                writer.serialize_quad(&quad?)?;
            }
        }
        Format::TriG => {
            let mut writer = TriGSerializer::new()
                .with_prefix("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#")?
                .with_prefix("xsd", "http://www.w3.org/2001/XMLSchema#")?
                .with_prefix("schema", "http://schema.org/")?
                .for_writer(&mut locked_out);
            for quad in quads {
                writer.serialize_quad(&quad?)?;
            }
            writer.finish()?;
        }
    }
    locked_out.flush()?;

    Ok(ExitCode::SUCCESS)
}
