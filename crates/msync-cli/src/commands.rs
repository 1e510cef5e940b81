use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use msync_core::{build_class_envelope, Applied, BindingMode, DispatchReport, HandlerBinding, Registry};
use msync_sdk::{register_config_subscriptions, SyncConfig, SyncContext};
use msync_store::Record;
use msync_transport::{InMemoryTransport, JsonCodec, WireMessage};
use msync_types::{Action, Envelope, Payload, Value};
use serde::Serialize;
use tracing::info;

use crate::cli::*;

pub fn run_command(cli: Cli, config: Option<SyncConfig>) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Check(_) => cmd_check(&require(config)?, format),
        Command::Replay(args) => {
            let events = std::fs::read_to_string(&args.events)
                .with_context(|| format!("failed to read events file: {}", args.events.display()))?;
            cmd_replay(&require(config)?, &events, format)
        }
        Command::Encode(args) => cmd_encode(args, format),
    }
}

fn require(config: Option<SyncConfig>) -> anyhow::Result<SyncConfig> {
    config.context("this command needs --config")
}

// ---- check ----

#[derive(Debug, Serialize)]
struct BindingView {
    target_class: String,
    target_action: String,
    impl_class: String,
    impl_action: String,
    mode: BindingMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_attrs: Option<BTreeSet<String>>,
}

impl From<&HandlerBinding> for BindingView {
    fn from(binding: &HandlerBinding) -> Self {
        Self {
            target_class: binding.target_class.clone(),
            target_action: binding.target_action.clone(),
            impl_class: binding.impl_class.clone(),
            impl_action: binding.impl_action.clone(),
            mode: binding.mode(),
            identity_key: binding.identity_key.clone(),
            allowed_attrs: binding.allowed_attrs.clone(),
        }
    }
}

fn build_registry(config: &SyncConfig) -> anyhow::Result<Registry> {
    let mut builder = Registry::builder();
    register_config_subscriptions(&mut builder, config)?;
    Ok(builder.build())
}

fn cmd_check(config: &SyncConfig, format: OutputFormat) -> anyhow::Result<()> {
    let registry = build_registry(config)?;
    let views: Vec<BindingView> = registry.bindings().iter().map(BindingView::from).collect();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    println!("{} Config valid", "✓".green().bold());
    println!("  Topic: {}", config.topic.cyan());
    println!("  Missing identity: {:?}", config.missing_identity);
    println!("  Bindings: {}", views.len().to_string().bold());
    for view in &views {
        let mut line = format!(
            "    {}.{} {} {}.{}",
            view.target_class.yellow(),
            view.target_action,
            "→".dimmed(),
            view.impl_class,
            view.impl_action
        );
        if let Some(attrs) = &view.allowed_attrs {
            let attrs: Vec<&str> = attrs.iter().map(String::as_str).collect();
            line.push_str(&format!(" [{}]", attrs.join(", ")));
        }
        if let Some(key) = &view.identity_key {
            line.push_str(&format!(" by {}", key.cyan()));
        }
        println!("{line}");
    }
    Ok(())
}

// ---- replay ----

#[derive(Debug, Serialize)]
pub struct ReplayLine {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DispatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub lines: Vec<ReplayLine>,
    pub state: BTreeMap<String, Vec<Record>>,
}

/// Dispatch every envelope in `events` against the configured subscriptions.
///
/// Each envelope goes through the wire codec and the listener, exactly as a
/// message received from the transport would. Blank lines and lines starting
/// with `#` are skipped.
pub fn replay(config: &SyncConfig, events: &str) -> anyhow::Result<ReplaySummary> {
    let mut builder = Registry::builder();
    let repositories = register_config_subscriptions(&mut builder, config)?;
    let transport = Arc::new(InMemoryTransport::with_capacity(config.channel_capacity));
    let context = SyncContext::new(config.clone(), builder.build(), transport)?;
    let listener = context.listener();

    let mut lines = Vec::new();
    for (index, raw) in events.lines().enumerate() {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }
        let line = index + 1;
        let parsed = serde_json::from_str::<Envelope>(raw)
            .map_err(|e| e.to_string())
            .and_then(|envelope| envelope.validate().map(|_| envelope).map_err(|e| e.to_string()))
            .and_then(|envelope| {
                JsonCodec::encode(&envelope)
                    .map(|message| (envelope, message))
                    .map_err(|e| e.to_string())
            });
        let entry = match parsed {
            Ok((envelope, message)) => ReplayLine {
                line,
                envelope: Some(envelope.to_string()),
                error: None,
                report: listener.handle(&message),
            },
            Err(error) => ReplayLine {
                line,
                envelope: None,
                report: None,
                error: Some(error),
            },
        };
        lines.push(entry);
    }

    let state = repositories
        .into_iter()
        .map(|(class, repo)| (class, repo.all()))
        .collect();
    info!(lines = lines.len(), "replay finished");
    Ok(ReplaySummary { lines, state })
}

fn cmd_replay(config: &SyncConfig, events: &str, format: OutputFormat) -> anyhow::Result<()> {
    let summary = replay(config, events)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for entry in &summary.lines {
        match (&entry.envelope, &entry.report, &entry.error) {
            (_, _, Some(error)) => {
                println!("{} line {}: {}", "✗".red().bold(), entry.line, error.red());
            }
            (Some(envelope), Some(report), None) => {
                let status = if report.is_noop() {
                    "no match".dimmed()
                } else if report.is_clean() {
                    format!("{} binding(s)", report.matched()).green()
                } else {
                    format!("{} of {} failed", report.failure_count(), report.matched()).red()
                };
                println!("line {}: {} {}", entry.line, envelope.bold(), status);
                for outcome in &report.outcomes {
                    match &outcome.result {
                        Ok(applied) => {
                            println!("  {} {} ({})", "✓".green(), outcome.binding, applied_label(*applied))
                        }
                        Err(error) => println!("  {} {}: {}", "✗".red(), outcome.binding, error.red()),
                    }
                }
            }
            _ => println!("line {}: {}", entry.line, "dropped".yellow()),
        }
    }

    println!();
    for (class, records) in &summary.state {
        println!("{} ({} record(s))", class.cyan().bold(), records.len());
        for record in records {
            println!("  {}", serde_json::to_string(record)?);
        }
    }
    Ok(())
}

fn applied_label(applied: Applied) -> &'static str {
    match applied {
        Applied::Invoked => "invoked",
        Applied::Created => "created",
        Applied::Updated => "updated",
        Applied::Deleted => "deleted",
        Applied::Skipped => "skipped",
    }
}

// ---- encode ----

/// Build the wire message a publisher would send.
pub fn encode(args: &EncodeArgs) -> anyhow::Result<WireMessage> {
    let action = Action::parse(&args.action)?;
    let data: Payload = match args.data.as_deref() {
        None => Payload::new(),
        Some(text) => match serde_json::from_str::<Value>(text)
            .with_context(|| format!("--data is not valid JSON: {text}"))?
        {
            Value::Object(map) => map,
            _ => bail!("--data must be a JSON object"),
        },
    };

    let envelope = match args.id.as_deref() {
        // Bare words are taken as string identifiers.
        Some(id) => {
            let id = serde_json::from_str::<Value>(id).unwrap_or_else(|_| Value::from(id));
            let envelope = Envelope::new(args.class.as_str(), action)
                .with_payload(data)
                .with_id(id);
            envelope.validate()?;
            envelope
        }
        None => build_class_envelope(&args.class, action, data)?,
    };
    Ok(JsonCodec::encode(&envelope)?)
}

fn cmd_encode(args: EncodeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let message = encode(&args)?;
    let body = String::from_utf8_lossy(&message.data);

    if format == OutputFormat::Json {
        let body: Value = serde_json::from_slice(&message.data)?;
        let out = serde_json::json!({ "headers": message.headers, "body": body });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "headers".bold());
    println!("  {}", serde_json::to_string(&message.headers)?);
    println!("{} ({} bytes)", "body".bold(), message.len());
    println!("  {body}");
    Ok(())
}
