//! Facility member listing
//!
//! Shows what a bridge over the ambient facility would expose.

use colored::*;
use eyre::Result;
use serde::Serialize;
use serde_json::Value;

use logtap::config::Config;
use logtap::{ERROR_EVENT, Facility, MemberKind, RESERVED_NAMES};

use crate::cli::OutputFormat;

#[derive(Debug, Serialize)]
struct MemberStatus {
    name: String,
    kind: MemberKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    reserved: bool,
}

#[derive(Debug, Serialize)]
struct Members {
    members: Vec<MemberStatus>,
    events: Vec<String>,
}

fn gather(facility: &Facility) -> Members {
    let members: Vec<MemberStatus> = facility
        .members()
        .map(|(name, member)| MemberStatus {
            name: name.to_string(),
            kind: member.kind(),
            value: facility.get(name),
            reserved: RESERVED_NAMES.contains(&name),
        })
        .collect();

    let mut events: Vec<String> = members
        .iter()
        .filter(|m| m.kind == MemberKind::Method && !m.reserved)
        .map(|m| m.name.clone())
        .collect();
    if !events.iter().any(|e| e == ERROR_EVENT) {
        events.push(ERROR_EVENT.to_string());
    }

    Members { members, events }
}

pub fn run(format: OutputFormat, config: &Config) -> Result<()> {
    let facility = Facility::ambient_with_target(&config.target);
    let members = gather(&facility);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&members)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&members)?),
        OutputFormat::Text => print_text(&members),
    }

    Ok(())
}

fn print_text(members: &Members) {
    println!("{}", "Members".bold());
    for member in &members.members {
        let name = match member.kind {
            MemberKind::Method => member.name.cyan(),
            MemberKind::Property => member.name.yellow(),
        };
        match &member.value {
            Some(value) => println!("  {:<10} {} = {}", name, member.kind.to_string().dimmed(), value),
            None => println!("  {:<10} {}", name, member.kind.to_string().dimmed()),
        }
    }
    println!();
    println!("{} {}", "Events:".bold(), members.events.join(", "));
}
