//! Crawlkit CLI - serve the crawler over HTTP or talk to a running server

mod server;

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

/// Crawlkit - readable web content for agents and RAG pipelines
#[derive(Parser, Debug)]
#[command(name = "crawlkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, short, default_value_t = 8000)]
        port: u16,
    },
    /// Query a running server for search results
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(long, short = 'm', default_value_t = server::DEFAULT_MAX_RESULTS)]
        max_results: usize,

        /// Crawl each result and print extracted content
        #[arg(long, short = 'f')]
        fulltext: bool,

        /// Base URL of the running server
        #[arg(long, default_value = "http://localhost:8000")]
        server_url: String,
    },
    /// Ask a running server to read one or more URLs
    Read {
        /// URLs to read
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output format: markdown, html or text
        #[arg(long, default_value = "markdown")]
        format: String,

        /// Directory for persisted output files
        #[arg(long)]
        output_dir: Option<String>,

        /// Persist extracted markdown on the server
        #[arg(long)]
        save_md: bool,

        /// Persist extracted HTML on the server
        #[arg(long)]
        save_html: bool,

        /// Inline images as data URIs
        #[arg(long)]
        embed: bool,

        /// Use the Readability extraction strategy
        #[arg(long)]
        readability: bool,

        /// Skip the server-side cache lookup
        #[arg(long)]
        no_cache: bool,

        /// Base URL of the running server
        #[arg(long, default_value = "http://localhost:8000")]
        server_url: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            if let Err(e) = server::run(port).await {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Search {
            query,
            max_results,
            fulltext,
            server_url,
        } => {
            let params = vec![
                ("query".to_string(), query),
                ("max_results".to_string(), max_results.to_string()),
                ("fulltext".to_string(), fulltext.to_string()),
            ];
            request(&server_url, "/search", &params).await;
        }
        Commands::Read {
            urls,
            format,
            output_dir,
            save_md,
            save_html,
            embed,
            readability,
            no_cache,
            server_url,
        } => {
            let mut params = vec![
                ("urls".to_string(), urls.join(",")),
                ("format".to_string(), format),
            ];
            if let Some(dir) = output_dir {
                params.push(("output_dir".to_string(), dir));
            }
            if save_md {
                params.push(("save_markdown".to_string(), "true".to_string()));
            }
            if save_html {
                params.push(("save_html".to_string(), "true".to_string()));
            }
            if embed {
                params.push(("embed_images".to_string(), "true".to_string()));
            }
            if readability {
                params.push(("use_readability".to_string(), "true".to_string()));
            }
            if no_cache {
                params.push(("no_cache".to_string(), "true".to_string()));
            }
            request(&server_url, "/read", &params).await;
        }
    }
}

/// GET an endpoint of a running server and print the response body
async fn request(server_url: &str, path: &str, params: &[(String, String)]) {
    let url = format!("{}{}", server_url.trim_end_matches('/'), path);
    let response = match reqwest::Client::new().get(&url).query(params).send().await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("Error: cannot reach {url}: {e}");
            eprintln!("Is the server running? Start it with: crawlkit serve");
            std::process::exit(1);
        }
    };

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        eprintln!("Error: server answered {status}: {body}");
        std::process::exit(1);
    }

    writeln_safe(&render_body(&body));
}

/// Bare content strings print as-is, everything else as pretty JSON
fn render_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(content)) => content,
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string()),
        Err(_) => body.to_string(),
    }
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{s}") {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {e}");
        std::process::exit(1);
    }
}
