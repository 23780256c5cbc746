use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for the ML gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8088")]
    url: String,

    /// Access token sent as the session cookie
    #[arg(short, long)]
    token: Option<String>,

    /// Name of the session cookie
    #[arg(long, default_value = "cb_access_token")]
    cookie_name: String,

    /// Where binary results are written
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Send an image with a prompt to the image model
    Image {
        file: PathBuf,
        #[arg(short, long, default_value = "")]
        message: String,
    },
    /// Send an audio clip with a prompt to the melody model
    Melody {
        file: PathBuf,
        #[arg(short, long, default_value = "")]
        message: String,
    },
    /// Generate an image from a text prompt
    Message { text: String },
    /// Generate a track from a text prompt
    Track { text: String },
    /// Forecast a CSV time series
    Ts {
        file: PathBuf,
        #[arg(long)]
        predictor: String,
        #[arg(long)]
        target: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", cli.cookie_name, token))?,
        );
    }

    let res = match cli.command {
        Commands::Health => {
            client.get(format!("{}/health", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Image { file, message } => {
            let form = Form::new()
                .text("message", message)
                .part("image", file_part(&file).await?);
            client.post(format!("{}/ml/image", cli.url))
                .headers(headers)
                .multipart(form)
                .send()
                .await?
        }
        Commands::Melody { file, message } => {
            let form = Form::new()
                .text("message", message)
                .part("audio", file_part(&file).await?);
            client.post(format!("{}/ml/melody", cli.url))
                .headers(headers)
                .multipart(form)
                .send()
                .await?
        }
        Commands::Message { text } => {
            client.post(format!("{}/ml/message", cli.url))
                .headers(headers)
                .json(&serde_json::json!({ "message": text }))
                .send()
                .await?
        }
        Commands::Track { text } => {
            client.post(format!("{}/ml/track", cli.url))
                .headers(headers)
                .json(&serde_json::json!({ "message": text }))
                .send()
                .await?
        }
        Commands::Ts { file, predictor, target } => {
            let form = Form::new()
                .text("predictor", predictor)
                .text("target", target)
                .part("ts", file_part(&file).await?);
            client.post(format!("{}/ml/ts", cli.url))
                .headers(headers)
                .multipart(form)
                .send()
                .await?
        }
    };

    print_response(res, cli.out.as_deref()).await
}

async fn file_part(path: &Path) -> Result<Part, Box<dyn std::error::Error>> {
    let data = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(data).file_name(name))
}

async fn print_response(res: reqwest::Response, out: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let is_json = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if is_json {
        let json: Value = res.json().await?;
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let bytes = res.bytes().await?;
    match out {
        Some(path) => {
            tokio::fs::write(path, &bytes).await?;
            println!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => eprintln!("Received {} bytes; pass --out to save them", bytes.len()),
    }
    Ok(())
}
