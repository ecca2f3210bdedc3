//! Bulk PDF uploader for the chat server
//!
//! Run with: cargo run -p pmay-rag --bin pmay-upload -- --path docs

use anyhow::Context;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use pmay_rag::{ingestion::is_pdf, types::UploadResponse};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "pmay-upload")]
#[command(author, version, about = "Upload PDF documents to the PMAY chat server")]
struct Args {
    /// PDF file, or directory searched recursively for PDFs
    #[arg(short, long, default_value = "docs")]
    path: PathBuf,

    /// Upload endpoint
    #[arg(long, default_value = "http://localhost:8000/upload")]
    api_url: String,
}

/// Outcome of the whole run
#[derive(Default)]
struct UploadSummary {
    succeeded: Vec<(PathBuf, usize)>,
    failed: Vec<(PathBuf, String)>,
}

impl UploadSummary {
    fn print(&self) {
        println!("\n{}", style("Upload Summary").bold());
        println!("  Total successful uploads: {}", style(self.succeeded.len()).green());
        println!("  Total failed uploads: {}", style(self.failed.len()).red());

        if !self.succeeded.is_empty() {
            println!("\nSuccessful uploads:");
            for (path, chunks) in &self.succeeded {
                println!("  - {} ({} chunks)", path.display(), chunks);
            }
        }

        if !self.failed.is_empty() {
            println!("\nFailed uploads:");
            for (path, error) in &self.failed {
                println!("  - {}: {}", path.display(), style(error).red());
            }
        }
    }
}

struct Uploader {
    client: reqwest::Client,
    api_url: String,
}

impl Uploader {
    async fn upload(&self, path: &Path) -> anyhow::Result<UploadResponse> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("path has no file name")?;

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let part = Part::bytes(data)
            .file_name(filename)
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let response = self.client.post(&self.api_url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Status code: {}, Response: {}", status, body);
        }

        Ok(response.json().await?)
    }
}

/// PDFs under `root`, or `root` itself if it is a file
fn collect_pdfs(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_pdf(&p.to_string_lossy()))
        .collect();
    files.sort();
    files
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pmay_upload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if !args.path.exists() {
        anyhow::bail!("Invalid path: {}", args.path.display());
    }

    let files = collect_pdfs(&args.path);
    if files.is_empty() {
        tracing::warn!("No PDF files found in {}", args.path.display());
        return Ok(());
    }
    tracing::info!("Found {} PDF files to upload", files.len());

    let uploader = Uploader {
        client: reqwest::Client::new(),
        api_url: args.api_url,
    };
    let mut summary = UploadSummary::default();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    for path in files {
        pb.set_message(path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());

        if !is_pdf(&path.to_string_lossy()) {
            pb.println(format!("Only PDF files are supported: {}", path.display()));
            summary.failed.push((path, "Only PDF files are supported".to_string()));
            pb.inc(1);
            continue;
        }

        match uploader.upload(&path).await {
            Ok(result) => {
                pb.println(format!(
                    "{} {} ({} chunks)",
                    style("✓").green(),
                    result.message,
                    result.chunks_added
                ));
                summary.succeeded.push((path, result.chunks_added));
            }
            Err(e) => {
                pb.println(format!("{} {}: {}", style("✗").red(), path.display(), e));
                summary.failed.push((path, e.to_string()));
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("Upload complete");
    summary.print();

    Ok(())
}
