use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use serde::Deserialize;

use previewkit::{assemble_with_diagnostics, DiagnosticLevel, VirtualFile, VirtualFileStore};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CliInput {
    files: Vec<VirtualFile>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("[previewkit] {err:#}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let out_path = parse_args()?;

    let mut stdin_payload = String::new();
    io::stdin()
        .read_to_string(&mut stdin_payload)
        .context("failed to read stdin")?;

    if stdin_payload.trim().is_empty() {
        anyhow::bail!("stdin payload is empty");
    }

    let input: CliInput =
        serde_json::from_str(&stdin_payload).context("invalid input JSON")?;

    let store = VirtualFileStore::from_files(input.files);
    let (html, diagnostics) = assemble_with_diagnostics(&store);

    for diagnostic in &diagnostics {
        let tag = match diagnostic.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Info => "info",
        };
        eprintln!("[previewkit] {tag}: {}", diagnostic.message);
    }

    match out_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create output dir '{}'", parent.display())
                    })?;
                }
            }
            fs::write(&path, html)
                .with_context(|| format!("failed to write output '{}'", path.display()))?;
        }
        None => {
            io::stdout()
                .write_all(html.as_bytes())
                .context("failed to write stdout")?;
        }
    }

    Ok(())
}

fn parse_args() -> anyhow::Result<Option<PathBuf>> {
    let mut out_path: Option<PathBuf> = None;
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--out" => {
                let value = args
                    .next()
                    .context("missing value for --out")?;
                out_path = Some(PathBuf::from(value));
            }
            _ => {
                anyhow::bail!("unknown argument '{arg}'. usage: previewkit [--out <path>] < files.json");
            }
        }
    }

    Ok(out_path)
}
