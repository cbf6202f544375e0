//! Stdin tap command
//!
//! Each stdin line becomes a call through a bridge over the ambient facility:
//! - `warn: disk almost full` calls `warn` with one argument
//! - `:set level debug` / `:get level` access facility properties
//! - anything else is passed to `log` verbatim
//!
//! Bridged events are echoed to stdout; the facility itself writes to the log file.

use chrono::Local;
use colored::*;
use eyre::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use lazy_regex::regex_captures;
use serde_json::Value;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};

use logtap::config::{Config, EchoConfig};
use logtap::{Bridge, ERROR_EVENT, Facility, Listener, render_args};

/// One parsed stdin line
#[derive(Debug, Clone, PartialEq)]
enum Directive {
    Skip,
    Call { method: String, args: Vec<Value> },
    Get(String),
    Set(String, Value),
}

fn parse_line(line: &str, is_method: impl Fn(&str) -> bool) -> Directive {
    let line = line.trim_end();
    if line.trim().is_empty() {
        return Directive::Skip;
    }

    if let Some((_, name)) = regex_captures!(r"^:get\s+(\S+)\s*$", line) {
        return Directive::Get(name.to_string());
    }
    if let Some((_, name, raw)) = regex_captures!(r"^:set\s+(\S+)\s+(.+)$", line) {
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        return Directive::Set(name.to_string(), value);
    }
    if let Some((_, method, text)) = regex_captures!(r"^([A-Za-z_][A-Za-z0-9_]*):\s?(.*)$", line)
        && is_method(method)
    {
        let args = if text.is_empty() { Vec::new() } else { vec![Value::String(text.to_string())] };
        return Directive::Call {
            method: method.to_string(),
            args,
        };
    }

    Directive::Call {
        method: "log".to_string(),
        args: vec![Value::String(line.to_string())],
    }
}

fn format_event(event: &str, args: &[Value], timestamps: bool) -> String {
    let name = match event {
        "error" => event.red().bold(),
        "warn" => event.yellow(),
        "info" | "log" => event.green(),
        "debug" => event.blue(),
        "trace" => event.dimmed(),
        _ => event.normal(),
    };

    let mut parts = Vec::new();
    if timestamps {
        parts.push(Local::now().format("%Y-%m-%d %H:%M:%S").to_string().dimmed().to_string());
    }
    parts.push(name.to_string());
    let rendered = render_args(args);
    if !rendered.is_empty() {
        parts.push(rendered);
    }
    parts.join(" ")
}

fn echo_listener<F, W>(event: String, echo: &EchoConfig, counts: Arc<Mutex<IndexMap<String, usize>>>, out: F) -> Listener
where
    F: Fn() -> W + Send + Sync + 'static,
    W: Write,
{
    let timestamps = echo.timestamps;
    Arc::new(move |args: &[Value]| {
        *counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.clone())
            .or_insert(0) += 1;
        // Error events can arrive from the panic hook, where a failed write must not panic again
        let _ = writeln!(out(), "{}", format_event(&event, args, timestamps));
    })
}

/// Event names to echo, each once: the command line wins over config; empty means everything
fn selected_events(bridge: &Bridge, cli_events: Vec<String>, echo: &EchoConfig) -> IndexSet<String> {
    if !cli_events.is_empty() {
        return cli_events.into_iter().collect();
    }
    if !echo.events.is_empty() {
        return echo.events.iter().cloned().collect();
    }

    let mut all: IndexSet<String> = bridge.method_names().map(String::from).collect();
    all.insert(ERROR_EVENT.to_string());
    all
}

fn apply(bridge: &Bridge, directive: Directive) -> Result<()> {
    match directive {
        Directive::Skip => Ok(()),
        Directive::Call { method, args } => bridge.call(&method, &args),
        Directive::Get(name) => {
            match bridge.get(&name) {
                Some(value) => println!("{} = {}", name.bold(), value),
                None => println!("{} {}", name.bold(), "is not a property".dimmed()),
            }
            Ok(())
        }
        Directive::Set(name, value) => bridge.set(&name, value),
    }
}

pub fn run(cli_events: Vec<String>, no_color: bool, config: &Config) -> Result<()> {
    if no_color || !config.echo.color {
        colored::control::set_override(false);
    }

    let bridge = Bridge::create(Some(Facility::ambient_with_target(&config.target)));
    let counts = Arc::new(Mutex::new(IndexMap::new()));

    for event in selected_events(&bridge, cli_events, &config.echo) {
        log::debug!("tap: echoing `{}`", event);
        bridge.on(&event, echo_listener(event.clone(), &config.echo, counts.clone(), io::stdout));
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let directive = parse_line(&line, |name| bridge.has_method(name));
        if let Err(e) = apply(&bridge, directive) {
            eprintln!("{} {}", "✗".red(), e);
        }
    }

    bridge.cleanup();

    let counts = counts.lock().unwrap_or_else(PoisonError::into_inner);
    let total: usize = counts.values().sum();
    let breakdown: Vec<String> = counts.iter().map(|(name, n)| format!("{}={}", name, n)).collect();
    log::info!("tap: {} event(s) echoed", total);
    if breakdown.is_empty() {
        println!("{} {} event(s)", "✓".green(), total);
    } else {
        println!("{} {} event(s) ({})", "✓".green(), total, breakdown.join(", "));
    }

    Ok(())
}
