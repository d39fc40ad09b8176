use crate::{emit_success, OutputMode};
use provgraph::config::{write_config, ProvgraphConfig};
use provgraph::stream::{self, IngestSummary};
use provgraph::translate::{CausalityTranslator, JsonLinesSink, TranslatorStats};
use provgraph::ui::{
    self, edge_line, header, info, phase, section, stats_table, status, success, summary_row,
    timing, vertex_line, Icons, IngestProgress, Spinner,
};
use provgraph::{transform, LineageStore, ProvenanceGraph, ProvenanceStorage};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

pub fn run_init(path: &Path, force: bool, output_mode: OutputMode) -> anyhow::Result<()> {
    write_config(path, &ProvgraphConfig::default(), force)?;
    if output_mode.is_human() {
        success(&format!("Wrote {}", path.display()));
    } else {
        emit_success("init", serde_json::json!({ "path": path.display().to_string() }))?;
    }
    Ok(())
}

pub fn run_ingest(
    config: &ProvgraphConfig,
    input: &Path,
    store_enabled: bool,
    translate: bool,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    if !store_enabled && !translate {
        anyhow::bail!("nothing to ingest into: drop --no-store or add --translate");
    }

    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(std::fs::File::open(input)?))
    };

    let store = store_enabled
        .then(|| LineageStore::initialize(&config.lineage))
        .transpose()?;
    let translator = if translate {
        let sink = JsonLinesSink::open(&config.translator)?;
        Some(CausalityTranslator::new(sink, &config.translator))
    } else {
        None
    };

    let mut backends: Vec<&dyn ProvenanceStorage> = Vec::new();
    if let Some(store) = &store {
        backends.push(store);
    }
    if let Some(translator) = &translator {
        backends.push(translator);
    }

    if output_mode.is_human() {
        header("Ingesting provenance records");
        status(Icons::FILE, "Input", &input.display().to_string());
        if store.is_some() {
            status(Icons::DATABASE, "Lineage store", &config.lineage.arguments);
        }
        if translator.is_some() {
            status(Icons::LINK, "CDM endpoint", &config.translator.endpoint);
        }
    }

    let progress = output_mode.is_human().then(IngestProgress::new);
    let started = Instant::now();
    let summary = stream::ingest(reader, &backends, |s| {
        if let Some(progress) = &progress {
            progress.update(s);
        }
    })?;

    let store_stats = store.as_ref().map(|s| s.stats()).transpose()?;
    let translator_stats = translator.as_ref().map(|t| t.stats());
    for backend in &backends {
        if !backend.shutdown() {
            ui::warn(&format!("{} backend did not shut down cleanly", backend.name()));
        }
    }

    if output_mode.is_human() {
        if let Some(progress) = &progress {
            progress.finish_with_summary(started.elapsed(), &summary);
        }
        print_ingest_summary(&summary);
        if let Some(stats) = store_stats {
            section("Lineage store");
            println!("{}", stats);
        }
        if let Some(stats) = translator_stats {
            print_translator_stats(&stats);
        }
    } else {
        emit_success(
            "ingest",
            serde_json::json!({
                "vertices": summary.vertices,
                "edges": summary.edges,
                "skipped_lines": summary.skipped_lines,
                "rejected": summary.rejected,
                "store": store_stats.map(|s| serde_json::json!({
                    "vertices": s.vertices,
                    "edges": s.edges,
                })),
                "translator": translator_stats.map(|t| serde_json::json!({
                    "records": t.records,
                    "records_per_sec": t.records_per_sec(),
                })),
            }),
        )?;
    }
    Ok(())
}

fn print_ingest_summary(summary: &IngestSummary) {
    section("Ingest");
    summary_row("Vertices:", &summary.vertices.to_string());
    summary_row("Edges:", &summary.edges.to_string());
    if summary.skipped_lines > 0 {
        ui::warn(&format!("{} malformed lines skipped", summary.skipped_lines));
    }
    if summary.rejected > 0 {
        ui::warn(&format!("{} records rejected by a backend", summary.rejected));
    }
}

fn print_translator_stats(stats: &TranslatorStats) {
    section("CDM translation");
    println!(
        "{}",
        stats_table(&[
            ("Records", stats.records.to_string()),
            ("Records/sec", format!("{:.1}", stats.records_per_sec())),
            ("Runtime", format!("{:.3}s", stats.runtime.as_secs_f64())),
        ])
    );
}

fn print_graph(graph: &ProvenanceGraph) {
    section(&format!("Vertices ({})", graph.vertex_count()));
    for vertex in graph.vertices() {
        vertex_line(vertex);
    }
    if graph.edge_count() > 0 {
        section(&format!("Edges ({})", graph.edge_count()));
        for edge in graph.edges() {
            edge_line(edge);
        }
    }
}

pub fn run_vertices(config: &ProvgraphConfig, predicate: &str, output_mode: OutputMode) -> anyhow::Result<()> {
    let store = LineageStore::initialize(&config.lineage)?;
    let graph = store.get_vertices(predicate)?;
    store.close()?;

    if output_mode.is_human() {
        header(&format!("{} Vertices matching {}", Icons::SEARCH, predicate));
        if graph.is_empty() {
            ui::warn("No vertices found.");
        } else {
            print_graph(&graph);
        }
    } else {
        emit_success("vertices", serde_json::to_value(&graph)?)?;
    }
    Ok(())
}

pub struct LineageQuery {
    pub id: i64,
    pub depth: u32,
    pub direction: String,
    pub stop: Option<String>,
    pub filters: Vec<String>,
}

pub fn run_lineage(config: &ProvgraphConfig, query: &LineageQuery, output_mode: OutputMode) -> anyhow::Result<()> {
    let filters = query
        .filters
        .iter()
        .map(|name| transform::by_name(name).ok_or_else(|| anyhow::anyhow!("unknown filter: {}", name)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let started = Instant::now();
    let spinner = output_mode.is_human().then(|| Spinner::new("Walking lineage"));
    let store = LineageStore::initialize(&config.lineage)?;
    let mut graph = store.get_lineage(query.id, query.depth, &query.direction, query.stop.as_deref())?;
    store.close()?;

    for filter in &filters {
        if let Some(spinner) = &spinner {
            spinner.set_message(&format!("Applying {}", filter.name()));
        }
        graph = filter.apply(&graph);
    }
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }

    if output_mode.is_human() {
        let icon = if query.direction.to_lowercase().starts_with('a') {
            Icons::UP
        } else {
            Icons::DOWN
        };
        header(&format!("{} Lineage of vertex {}", icon, query.id));
        info("Depth", &query.depth.to_string());
        if let Some(stop) = &query.stop {
            info("Stop at", stop);
        }
        if !filters.is_empty() {
            phase(&format!(
                "Filters: {}",
                filters.iter().map(|f| f.name()).collect::<Vec<_>>().join(", ")
            ));
        }
        print_graph(&graph);
        timing(&format!("{:.2?}", started.elapsed()));
    } else {
        emit_success("lineage", serde_json::to_value(&graph)?)?;
    }
    Ok(())
}

pub fn run_stats(config: &ProvgraphConfig, output_mode: OutputMode) -> anyhow::Result<()> {
    let store = LineageStore::initialize(&config.lineage)?;
    let stats = store.stats()?;
    store.close()?;

    if output_mode.is_human() {
        header(&format!("{} Lineage store ({})", Icons::STATS, config.lineage.arguments));
        println!(
            "{}",
            stats_table(&[
                ("Vertices", stats.vertices.to_string()),
                ("Edges", stats.edges.to_string()),
                ("Vertex columns", stats.vertex_columns.to_string()),
                ("Edge columns", stats.edge_columns.to_string()),
            ])
        );
    } else {
        emit_success(
            "stats",
            serde_json::json!({
                "vertices": stats.vertices,
                "edges": stats.edges,
                "vertex_columns": stats.vertex_columns,
                "edge_columns": stats.edge_columns,
            }),
        )?;
    }
    Ok(())
}
