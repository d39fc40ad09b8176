use crate::edge::Edge;
use crate::ui::{theme, Icons};
use crate::vertex::{Vertex, AGENT, ARTIFACT, PROCESS};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn phase(name: &str) {
    println!();
    println!(
        "{} {}",
        Icons::GEAR.style(theme().info.clone()),
        name.style(theme().header.clone())
    );
}

pub fn timing(elapsed: &str) {
    println!("{} {}", Icons::CLOCK.style(theme().dim.clone()), elapsed);
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

fn vertex_icon(vertex: &Vertex) -> &'static str {
    match vertex.kind.as_str() {
        PROCESS => Icons::PROCESS,
        ARTIFACT => Icons::ARTIFACT,
        AGENT => Icons::AGENT,
        _ => Icons::FILE,
    }
}

fn vertex_style(vertex: &Vertex) -> owo_colors::Style {
    if vertex.is_process() {
        theme().process
    } else {
        theme().artifact
    }
}

/// Short human label: `pid` for processes, `path` for artifacts
fn vertex_label(vertex: &Vertex) -> String {
    let id = vertex.annotation("vertexId").unwrap_or("?");
    let name = vertex
        .annotation("name")
        .or_else(|| vertex.annotation("path"))
        .or_else(|| vertex.annotation("destination host"))
        .or_else(|| vertex.annotation("memory address"))
        .unwrap_or("");
    match vertex.annotation("pid") {
        Some(pid) if vertex.is_process() => format!("#{} {} [pid {}]", id, name, pid),
        _ => format!("#{} {}", id, name),
    }
}

pub fn vertex_line(vertex: &Vertex) {
    println!(
        "{} {} {}",
        vertex_icon(vertex),
        vertex.kind.style(vertex_style(vertex)),
        vertex_label(vertex)
    );
}

pub fn edge_line(edge: &Edge) {
    println!(
        "{} {} {} {} {}",
        Icons::LINK.style(theme().dim.clone()),
        vertex_label(&edge.source),
        format!("-[{}:{}]->", edge.kind, edge.operation().unwrap_or("-")).style(theme().edge),
        vertex_label(&edge.destination),
        muted(edge.annotation("time").unwrap_or(""))
    );
}
