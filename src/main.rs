use anyhow::{Context, Result};
use clap::Parser;
use reqh::settings::parse_header;
use reqh::{RequestHandler, Response, Settings};
use serde_json::{Map, Value};

/// reqh - authenticated REST requests
///
/// Sends a single request to a resource below the base URL, with the token in
/// the X-Auth-Token header, and prints the JSON response body.
///
/// Examples:
///   reqh --url https://api.example.com --token T get /casefiles -p page=2
///   reqh post /casefiles -d '{"title": "New"}'     # URL and token from env
#[derive(Parser, Debug)]
#[command(author, version = env!("REQH_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the API [env: REQH_URL]
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Token sent as X-Auth-Token [env: REQH_TOKEN]
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Extra header, repeatable; overrides X-Auth-Token when named so.
    /// Added after the newline-separated headers in REQH_HEADERS.
    #[arg(
        short = 'H',
        long = "header",
        value_name = "NAME:VALUE",
        value_parser = parse_header_arg
    )]
    headers: Vec<(String, String)>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// GET a resource
    Get(GetArgs),
    /// POST a JSON body to a resource
    Post(BodyArgs),
    /// PUT a JSON body to a resource
    Put(BodyArgs),
    /// PATCH a resource with a JSON body
    Patch(BodyArgs),
    /// DELETE a resource
    Delete(ResourceArgs),
}

#[derive(clap::Args, Debug)]
struct GetArgs {
    /// Resource path, e.g. /casefiles/1
    #[arg(value_name = "RESOURCE")]
    resource: String,

    /// Query parameter, repeatable
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

#[derive(clap::Args, Debug)]
struct BodyArgs {
    /// Resource path, e.g. /casefiles
    #[arg(value_name = "RESOURCE")]
    resource: String,

    /// JSON request body
    #[arg(short = 'd', long = "data", value_name = "JSON", value_parser = parse_json)]
    data: Option<Value>,
}

#[derive(clap::Args, Debug)]
struct ResourceArgs {
    /// Resource path, e.g. /casefiles/1
    #[arg(value_name = "RESOURCE")]
    resource: String,
}

fn parse_header_arg(s: &str) -> Result<(String, String), String> {
    parse_header(s).map_err(|e| e.to_string())
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("Invalid param '{}'. Expected 'key=value'.", s))
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("Invalid JSON body: {}", e))
}

fn params_value(params: Vec<(String, String)>) -> Option<Value> {
    if params.is_empty() {
        return None;
    }
    let map: Map<String, Value> = params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    Some(Value::Object(map))
}

fn render_body(data: &Value) -> Result<Option<String>> {
    match data {
        Value::Null => Ok(None),
        // Non-JSON bodies are printed as received
        Value::String(text) => Ok(Some(text.clone())),
        other => serde_json::to_string_pretty(other)
            .map(Some)
            .context("Failed to format response"),
    }
}

fn print_response(response: &Response) -> Result<()> {
    if let Some(body) = render_body(&response.data)? {
        println!("{}", body);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let settings = Settings::from_env_with(cli.url, cli.token, cli.headers)?;
    let handler = RequestHandler::new(settings)?;

    let response = match cli.command {
        Commands::Get(args) => {
            handler
                .get(&args.resource, params_value(args.params))
                .await?
        }
        Commands::Post(args) => handler.post(&args.resource, args.data).await?,
        Commands::Put(args) => handler.put(&args.resource, args.data).await?,
        Commands::Patch(args) => handler.patch(&args.resource, args.data).await?,
        Commands::Delete(args) => handler.delete(&args.resource).await?,
    };

    print_response(&response)
}
