use anyhow::{bail, Context, Result};
use canvas_artifact::{ArtifactKind, Authorship, DeltaEvent, DocumentId, NewVersion};
use canvas_core::telemetry::{init_json_tracing, init_tracing};
use canvas_core::{ArtifactSession, CanvasConfig, OpenArtifact};
use canvas_gateway::{InMemoryGateway, PersistenceGateway};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Command::new("canvas")
        .version(canvas_core::VERSION)
        .about("Canvas artifact engine tools")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("replay")
                .about("Replay a recorded delta stream and print the resulting artifact")
                .arg(
                    Arg::new("events")
                        .required(true)
                        .help("JSON-lines file with one delta event per line"),
                )
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .default_value("plain-text")
                        .help("Artifact kind before any set-kind event"),
                )
                .arg(
                    Arg::new("title")
                        .long("title")
                        .default_value("")
                        .help("Artifact title before any set-title event"),
                )
                .arg(
                    Arg::new("user")
                        .long("user")
                        .help("Session user; without one the result is not versioned"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("TOML configuration file"),
                ),
        );

    let matches = cli.get_matches();
    if matches.get_flag("log-json") {
        init_json_tracing("info");
    } else {
        init_tracing("info");
    }

    match matches.subcommand() {
        Some(("replay", args)) => replay(args).await,
        _ => bail!("unknown command"),
    }
}

async fn replay(args: &ArgMatches) -> Result<()> {
    let mut config = match args.get_one::<String>("config") {
        Some(path) => CanvasConfig::load(path)?,
        None => CanvasConfig::new(),
    };
    if let Some(user) = args.get_one::<String>("user") {
        config = config.with_user(user.as_str());
    }
    let kind: ArtifactKind = args
        .get_one::<String>("kind")
        .map_or("plain-text", String::as_str)
        .parse()?;
    let title = args.get_one::<String>("title").cloned().unwrap_or_default();
    let path = args
        .get_one::<String>("events")
        .context("missing events file")?;
    let events = read_events(Path::new(path))?;

    let gateway = Arc::new(InMemoryGateway::new());
    let mut session = ArtifactSession::open(
        OpenArtifact::new(DocumentId::uninitialized(), kind, title),
        Arc::clone(&gateway),
        &config,
    )
    .await?;

    let outcome = session.ingest(&events).await?;
    tracing::info!(
        applied = outcome.applied,
        dropped = outcome.dropped,
        "replayed {} events",
        events.len()
    );

    let state = session.state().clone();
    match config.user_id.as_deref() {
        Some(user) if state.document_id.is_initialized() => {
            let request = NewVersion::from_content(
                state.title.clone(),
                state.kind(),
                state.content().clone(),
                Authorship::machine(user),
            )?;
            gateway.create_version(&state.document_id, request).await?;
            session.refresh().await?;
        }
        Some(_) => tracing::info!("stream never bound a document id; result not versioned"),
        None => tracing::info!("no session user; result not versioned"),
    }

    let state = session.close().await?;
    let history = session.history_snapshot();
    let versions: Vec<_> = history.entries().iter().map(|entry| &entry.version).collect();
    let report = json!({
        "state": state,
        "history": {
            "index": history.index(),
            "mode": history.mode(),
            "versions": versions,
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn read_events(path: &Path) -> Result<Vec<DeltaEvent>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: malformed delta event", path.display(), n + 1))
        })
        .collect()
}
