//! Causality Translator - OPM records to the Common Data Model
//!
//! Each incoming vertex or edge becomes a small batch of CDM records that is
//! handed to a `PublicationSink`:
//! - Process vertex: Subject, plus Principal and HASLOCALPRINCIPAL when the
//!   credentials parse
//! - Artifact vertex: one object record chosen by `subtype`
//! - Edge: Event, its affects edge(s) and ISGENERATEDBY_SUBJECT
//!
//! Edges refer to processes seen earlier through the process-identity cache.

pub mod cache;
pub mod cdm;
pub mod rules;
pub mod sink;

pub use cache::ProcessCache;
pub use cdm::CdmRecord;
pub use rules::{rule, Affects, Rule};
pub use sink::{JsonLinesSink, MemorySink, PublicationSink};

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use crate::config::TranslatorConfig;
use crate::edge::{Edge, EdgeKind};
use crate::storage::ProvenanceStorage;
use crate::vertex::{ArtifactSubtype, Vertex, ARTIFACT, PROCESS};
use cdm::{
    AbstractObject, EdgeType, Event, EventType, FileObject, InstrumentationSource, MemoryObject,
    NetFlowObject, Principal, PrincipalType, Properties, SimpleEdge, SrcSinkObject, SrcSinkType,
    Subject, SubjectType,
};

/// Why a vertex or edge produced no records.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("Unexpected vertex type: {0}")]
    UnknownVertexType(String),

    #[error("Unexpected edge type: {0}")]
    UnknownEdgeType(String),

    #[error("{kind} edge has no operation")]
    MissingOperation { kind: EdgeKind },

    #[error("Unexpected {kind} operation: {operation}")]
    UnsupportedOperation { kind: EdgeKind, operation: String },

    #[error("Operation {operation} is emitted with its derivation edge")]
    Suppressed { operation: String },

    #[error("Missing annotation: {0}")]
    MissingAnnotation(&'static str),

    #[error("Invalid {key}: {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("Unexpected instrumentation source: {0:?}")]
    UnknownSource(Option<String>),

    #[error("{operation} on a {subtype:?} artifact has no affects edge")]
    UnsupportedEndpoint { operation: String, subtype: Option<String> },

    #[error("No execute event cached for pid {pid}")]
    MissingExecEvent { pid: i32 },

    #[error("Expected /<pid>/fd/<fd>, got {0:?}")]
    MalformedPath(String),

    #[error("Process cache lock poisoned")]
    CachePoisoned,
}

type MappingResult<T> = std::result::Result<T, MappingError>;

fn required<'a>(annotations: &'a BTreeMap<String, String>, key: &'static str) -> MappingResult<&'a str> {
    annotations
        .get(key)
        .map(String::as_str)
        .ok_or(MappingError::MissingAnnotation(key))
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> MappingResult<T> {
    value.trim().parse().map_err(|_| MappingError::InvalidNumber {
        key,
        value: value.to_string(),
    })
}

fn required_number<T: FromStr>(annotations: &BTreeMap<String, String>, key: &'static str) -> MappingResult<T> {
    parse_number(key, required(annotations, key)?)
}

fn optional_number<T: FromStr>(annotations: &BTreeMap<String, String>, key: &'static str) -> MappingResult<Option<T>> {
    annotations.get(key).map(|v| parse_number(key, v)).transpose()
}

/// Integer annotation that falls back to 0 with a warning
fn lenient_number(key: &str, value: &str) -> i64 {
    value.trim().parse().unwrap_or_else(|_| {
        tracing::warn!("Unparsable {} {:?}, using 0", key, value);
        0
    })
}

/// Decimal seconds scaled by 1000 and truncated; `None` if not a number.
pub fn parse_time(value: &str) -> Option<i64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .map(|t| (t * 1000.0) as i64)
}

/// Hexadecimal address with or without `0x`; the bit pattern is kept for
/// addresses above `i64::MAX`.
fn parse_address(value: &str) -> MappingResult<i64> {
    let digits = value.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    u64::from_str_radix(digits, 16)
        .map(|a| a as i64)
        .map_err(|_| MappingError::InvalidNumber {
            key: "memory address",
            value: value.to_string(),
        })
}

fn copy_property(properties: &mut Properties, vertex: &Vertex, key: &str, property: &str) {
    if let Some(value) = vertex.annotation(key) {
        properties.insert(property.to_string(), value.to_string());
    }
}

/// Translates OPM vertices and edges and publishes the results.
pub struct CausalityTranslator<S: PublicationSink> {
    sink: S,
    cache: Mutex<ProcessCache>,
    records: AtomicU64,
    started: Instant,
}

impl<S: PublicationSink> CausalityTranslator<S> {
    pub fn new(sink: S, config: &TranslatorConfig) -> Self {
        Self {
            sink,
            cache: Mutex::new(ProcessCache::new(config.cache_capacity)),
            records: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Records accepted by the sink so far
    pub fn record_count(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    fn cache(&self) -> MappingResult<MutexGuard<'_, ProcessCache>> {
        self.cache.lock().map_err(|_| MappingError::CachePoisoned)
    }

    fn publish(&self, records: &[CdmRecord]) -> usize {
        if records.is_empty() {
            return 0;
        }
        let accepted = self.sink.publish(records);
        if accepted < records.len() {
            tracing::warn!("Sink accepted {} of {} records", accepted, records.len());
        }
        self.records.fetch_add(accepted as u64, Ordering::Relaxed);
        accepted
    }

    // ========== Vertex Mapping ==========

    pub fn translate_vertex(&self, vertex: &Vertex) -> MappingResult<Vec<CdmRecord>> {
        match vertex.kind.as_str() {
            PROCESS => self.translate_process(vertex),
            ARTIFACT => self.translate_artifact(vertex),
            other => Err(MappingError::UnknownVertexType(other.to_string())),
        }
    }

    /// Subject for a Process vertex; caches `pid -> subject uuid`.
    pub fn translate_process(&self, vertex: &Vertex) -> MappingResult<Vec<CdmRecord>> {
        let annotations = &vertex.annotations;
        let source = vertex
            .annotation("source")
            .and_then(InstrumentationSource::from_annotation)
            .ok_or_else(|| MappingError::UnknownSource(vertex.annotation("source").map(String::from)))?;
        let pid: i32 = required_number(annotations, "pid")?;
        let ppid: i32 = required_number(annotations, "ppid")?;
        let unit_id: Option<i32> = optional_number(annotations, "unit")?;

        let start_time = vertex.annotation("start time").and_then(|t| {
            let parsed = parse_time(t);
            if parsed.is_none() {
                tracing::warn!("Process {} has unparsable start time {:?}", pid, t);
            }
            parsed
        });

        let mut properties = Properties::new();
        copy_property(&mut properties, vertex, "name", "programName");
        copy_property(&mut properties, vertex, "uid", "uid");
        copy_property(&mut properties, vertex, "gid", "group");
        copy_property(&mut properties, vertex, "cwd", "currentDirectory");

        let uuid = vertex.content_hash().uuid();
        let subject = Subject {
            uuid,
            subject_type: SubjectType::Process,
            source,
            start_timestamp_micros: start_time,
            pid,
            ppid,
            unit_id,
            cmd_line: vertex.annotation("commandline").map(String::from),
            properties,
        };
        self.cache()?.put_subject(pid, uuid);

        let mut records = vec![CdmRecord::Subject(subject)];
        match principal_of(vertex) {
            Ok(principal) => {
                records.push(CdmRecord::SimpleEdge(SimpleEdge::new(
                    uuid,
                    principal.uuid,
                    EdgeType::SubjectHasLocalPrincipal,
                    start_time.unwrap_or(0),
                )));
                records.insert(1, CdmRecord::Principal(principal));
            }
            Err(e) => tracing::warn!("No principal for process {}: {}", pid, e),
        }
        Ok(records)
    }

    /// One object record for an Artifact vertex, chosen by `subtype`.
    pub fn translate_artifact(&self, vertex: &Vertex) -> MappingResult<Vec<CdmRecord>> {
        let annotations = &vertex.annotations;
        let source = vertex.annotation("source").and_then(InstrumentationSource::from_annotation);
        if source.is_none() {
            tracing::warn!("Unexpected artifact source: {:?}", vertex.annotation("source"));
        }
        let mut base_object = AbstractObject {
            source,
            properties: Properties::new(),
        };
        let uuid = vertex.content_hash().uuid();
        let subtype = required(annotations, "subtype")?;

        let record = match subtype.parse::<ArtifactSubtype>() {
            Ok(kind @ (ArtifactSubtype::File | ArtifactSubtype::Pipe)) => CdmRecord::FileObject(FileObject {
                uuid,
                base_object,
                url: format!("file://{}", required(annotations, "path")?),
                version: required_number(annotations, "version")?,
                is_pipe: kind == ArtifactSubtype::Pipe,
            }),
            Ok(ArtifactSubtype::Network) => {
                let (src_address, src_port) = match vertex.annotation("source host") {
                    Some(host) => (host.to_string(), required_number(annotations, "source port")?),
                    None => (String::new(), 0),
                };
                let (dest_address, dest_port) = match vertex.annotation("destination host") {
                    Some(host) => (host.to_string(), required_number(annotations, "destination port")?),
                    None => (String::new(), 0),
                };
                CdmRecord::NetFlowObject(NetFlowObject {
                    uuid,
                    base_object,
                    src_address,
                    src_port,
                    dest_address,
                    dest_port,
                })
            }
            Ok(ArtifactSubtype::Memory) => {
                let memory_address = parse_address(required(annotations, "memory address")?)?;
                copy_property(&mut base_object.properties, vertex, "size", "size");
                copy_property(&mut base_object.properties, vertex, "protection", "protection");
                CdmRecord::MemoryObject(MemoryObject {
                    uuid,
                    base_object,
                    memory_address,
                })
            }
            Ok(ArtifactSubtype::Unknown) => {
                let path = required(annotations, "path")?;
                let tokens: Vec<&str> = path.split('/').collect();
                let (pid, fd) = match (tokens.get(1), tokens.get(3)) {
                    (Some(pid), Some(fd)) if !pid.is_empty() && !fd.is_empty() => (*pid, *fd),
                    _ => return Err(MappingError::MalformedPath(path.to_string())),
                };
                let version = required(annotations, "version")?;
                base_object.properties.insert("pid".to_string(), pid.to_string());
                base_object.properties.insert("fd".to_string(), fd.to_string());
                base_object.properties.insert("version".to_string(), version.to_string());
                CdmRecord::SrcSinkObject(SrcSinkObject {
                    uuid,
                    base_object,
                    src_sink_type: SrcSinkType::Unknown,
                })
            }
            Err(_) => {
                tracing::warn!("Unexpected artifact subtype: {}", subtype);
                return Ok(Vec::new());
            }
        };
        Ok(vec![record])
    }

    // ========== Edge Mapping ==========

    pub fn translate_edge(&self, edge: &Edge) -> MappingResult<Vec<CdmRecord>> {
        let kind = edge
            .edge_kind()
            .ok_or_else(|| MappingError::UnknownEdgeType(edge.kind.clone()))?;
        let operation = edge.operation().ok_or(MappingError::MissingOperation { kind })?;
        let rule = rules::rule(kind, operation).ok_or_else(|| MappingError::UnsupportedOperation {
            kind,
            operation: operation.to_string(),
        })?;

        let timestamp = match edge.annotation("time") {
            Some(time) => parse_time(time).unwrap_or_else(|| {
                tracing::warn!("Time is not a decimal number: {:?}", time);
                0
            }),
            None => 0,
        };

        let (event_type, affects, sized) = match rule {
            Rule::Suppressed => {
                return Err(MappingError::Suppressed {
                    operation: operation.to_string(),
                });
            }
            Rule::Load => {
                let pid: i32 = required_number(&edge.source.annotations, "pid")?;
                let exec_event = self
                    .cache()?
                    .exec_event(pid)
                    .ok_or(MappingError::MissingExecEvent { pid })?;
                return Ok(vec![CdmRecord::SimpleEdge(SimpleEdge::new(
                    exec_event,
                    edge.destination.content_hash().uuid(),
                    EdgeType::FileAffectsEvent,
                    timestamp,
                ))]);
            }
            Rule::Emit { event, affects, sized } => (event, affects, sized),
        };

        // The acting process supplies the thread id; the other endpoint is
        // the one the event affects.
        let (acting, affected) = match kind {
            EdgeKind::WasTriggeredBy | EdgeKind::WasGeneratedBy => (Some(&edge.destination), &edge.source),
            EdgeKind::Used => (Some(&edge.source), &edge.destination),
            EdgeKind::WasDerivedFrom => (None, &edge.source),
        };
        let thread_id: i32 = match acting {
            Some(process) => required_number(&process.annotations, "pid")?,
            None => required_number(&edge.annotations, "pid")?,
        };
        let affects_type = affects
            .resolve(affected.artifact_subtype())
            .ok_or_else(|| MappingError::UnsupportedEndpoint {
                operation: operation.to_string(),
                subtype: affected.subtype().map(String::from),
            })?;

        let sequence = edge
            .annotation("event id")
            .map(|id| lenient_number("event id", id))
            .unwrap_or(0);
        let source = edge.annotation("source").and_then(InstrumentationSource::from_annotation);
        if source.is_none() {
            tracing::warn!("Unexpected edge source: {:?}", edge.annotation("source"));
        }

        let mut properties = Properties::new();
        properties.insert("eventId".to_string(), sequence.to_string());
        if event_type == EventType::ModifyFileAttributes {
            if let Some(mode) = edge.annotation("mode") {
                properties.insert("permissions".to_string(), mode.to_string());
            }
        }
        let size = if sized {
            edge.annotation("size").map(|s| lenient_number("size", s))
        } else {
            None
        };

        let event_uuid = edge.content_hash().uuid();
        let mut records = vec![
            CdmRecord::Event(Event {
                uuid: event_uuid,
                event_type,
                timestamp_micros: timestamp,
                sequence,
                source,
                thread_id,
                size,
                properties,
            }),
            CdmRecord::SimpleEdge(SimpleEdge::new(
                event_uuid,
                affected.content_hash().uuid(),
                affects_type,
                timestamp,
            )),
        ];

        let mut cache = self.cache()?;
        let generator = match acting {
            Some(process) => Some(process.content_hash().uuid()),
            None => {
                records.push(CdmRecord::SimpleEdge(SimpleEdge::new(
                    edge.destination.content_hash().uuid(),
                    event_uuid,
                    EdgeType::FileAffectsEvent,
                    timestamp,
                )));
                cache.subject(thread_id)
            }
        };
        match generator {
            Some(subject) => records.push(CdmRecord::SimpleEdge(SimpleEdge::new(
                event_uuid,
                subject,
                EdgeType::EventIsGeneratedBySubject,
                timestamp,
            ))),
            None => tracing::warn!("No process subject cached for pid {}", thread_id),
        }

        if event_type == EventType::Execute {
            match edge.source.annotation("pid").map(|p| parse_number::<i32>("pid", p)) {
                Some(Ok(pid)) => cache.put_exec_event(pid, event_uuid),
                _ => tracing::warn!("Execute event {} has no usable source pid", event_uuid),
            }
        }

        Ok(records)
    }

    // ========== Lifecycle ==========

    pub fn stats(&self) -> TranslatorStats {
        TranslatorStats {
            records: self.record_count(),
            runtime: self.started.elapsed(),
            cached_pids: self.cache.lock().map(|c| c.len()).unwrap_or(0),
        }
    }

    /// Log the volume summary, drop cached identities and shut the sink down.
    pub fn close(&self) -> bool {
        let stats = self.stats();
        tracing::info!("{} records", stats.records);
        let secs = stats.runtime.as_secs_f64();
        if secs > 0.0 {
            tracing::info!("Translator runtime: {:.3} secs", secs);
            tracing::info!("Record volume: {:.1} records/sec", stats.records_per_sec());
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
        self.sink.shutdown()
    }
}

/// Principal record built from the credential subset of a process vertex.
fn principal_of(process: &Vertex) -> MappingResult<Principal> {
    let mut credentials = Vertex::new("Principal");
    for key in ["uid", "euid", "gid", "egid", "source"] {
        if let Some(value) = process.annotation(key) {
            credentials.set(key, value);
        }
    }

    let annotations = &credentials.annotations;
    let user_id: i32 = required_number(annotations, "uid")?;
    let group_id: i32 = required_number(annotations, "gid")?;
    let source = credentials
        .annotation("source")
        .and_then(InstrumentationSource::from_annotation)
        .ok_or_else(|| MappingError::UnknownSource(credentials.annotation("source").map(String::from)))?;

    let mut properties = Properties::new();
    copy_property(&mut properties, &credentials, "euid", "euid");
    copy_property(&mut properties, &credentials, "egid", "egid");

    Ok(Principal {
        uuid: credentials.content_hash().uuid(),
        principal_type: PrincipalType::Local,
        user_id,
        group_ids: vec![group_id],
        source,
        properties,
    })
}

impl<S: PublicationSink> ProvenanceStorage for CausalityTranslator<S> {
    fn name(&self) -> &'static str {
        "cdm"
    }

    fn put_vertex(&self, vertex: &Vertex) -> bool {
        match self.translate_vertex(vertex) {
            Ok(records) => {
                self.publish(&records);
                true
            }
            Err(e) => {
                tracing::warn!("Vertex not translated: {}", e);
                false
            }
        }
    }

    fn put_edge(&self, edge: &Edge) -> bool {
        match self.translate_edge(edge) {
            Ok(records) => {
                self.publish(&records);
                true
            }
            Err(MappingError::Suppressed { operation }) => {
                tracing::debug!("Skipping {} edge for {}", edge.kind, operation);
                false
            }
            Err(e) => {
                tracing::warn!("Edge not translated: {}", e);
                false
            }
        }
    }

    fn shutdown(&self) -> bool {
        self.close()
    }
}

/// Volume statistics
#[derive(Debug, Clone)]
pub struct TranslatorStats {
    pub records: u64,
    pub runtime: Duration,
    pub cached_pids: usize,
}

impl TranslatorStats {
    pub fn records_per_sec(&self) -> f64 {
        let secs = self.runtime.as_secs_f64();
        if secs > 0.0 {
            self.records as f64 / secs
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for TranslatorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Translator Statistics:")?;
        writeln!(f, "  Records: {}", self.records)?;
        writeln!(f, "  Runtime: {:.3}s", self.runtime.as_secs_f64())?;
        writeln!(f, "  Volume: {:.1} records/sec", self.records_per_sec())?;
        writeln!(f, "  Cached pids: {}", self.cached_pids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> CausalityTranslator<MemorySink> {
        CausalityTranslator::new(MemorySink::new(), &TranslatorConfig::default())
    }

    fn process(pid: &str) -> Vertex {
        Vertex::new(PROCESS)
            .with("pid", pid)
            .with("ppid", "1")
            .with("name", "init")
            .with("uid", "0")
            .with("gid", "0")
            .with("source", "/dev/audit")
    }

    fn file(path: &str) -> Vertex {
        Vertex::new(ARTIFACT)
            .with("subtype", "file")
            .with("path", path)
            .with("version", "0")
            .with("source", "/dev/audit")
    }

    fn edges_of(records: &[CdmRecord]) -> Vec<&SimpleEdge> {
        records.iter().filter_map(CdmRecord::as_edge).collect()
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("1000.0"), Some(1_000_000));
        assert_eq!(parse_time("1.0009"), Some(1000));
        assert_eq!(parse_time("abc"), None);
        assert_eq!(parse_time("NaN"), None);
    }

    #[test]
    fn test_process_emits_subject_and_principal() {
        let t = translator();
        let vertex = process("100").with("start time", "12.5").with("cwd", "/root");
        let records = t.translate_process(&vertex).unwrap();
        assert_eq!(records.len(), 3);

        let CdmRecord::Subject(subject) = &records[0] else {
            panic!("expected subject first");
        };
        assert_eq!(subject.pid, 100);
        assert_eq!(subject.ppid, 1);
        assert_eq!(subject.start_timestamp_micros, Some(12_500));
        assert_eq!(subject.properties.get("programName").map(String::as_str), Some("init"));
        assert_eq!(subject.properties.get("currentDirectory").map(String::as_str), Some("/root"));

        let CdmRecord::Principal(principal) = &records[1] else {
            panic!("expected principal second");
        };
        assert_eq!(principal.user_id, 0);
        assert_eq!(principal.group_ids, vec![0]);

        let link = records[2].as_edge().unwrap();
        assert_eq!(link.edge_type, EdgeType::SubjectHasLocalPrincipal);
        assert_eq!((link.from_uuid, link.to_uuid), (subject.uuid, principal.uuid));
        assert_eq!(link.timestamp, 12_500);

        assert_eq!(t.cache().unwrap().subject(100), Some(vertex.content_hash().uuid()));
    }

    #[test]
    fn test_process_failures() {
        let t = translator();
        assert!(matches!(
            t.translate_process(&process("1").with("source", "/dev/kmsg")),
            Err(MappingError::UnknownSource(_))
        ));
        let mut no_pid = process("x");
        assert!(t.translate_process(&no_pid).is_err());
        no_pid.remove("pid");
        assert!(matches!(
            t.translate_process(&no_pid),
            Err(MappingError::MissingAnnotation("pid"))
        ));
        assert!(t.cache().unwrap().is_empty());
    }

    #[test]
    fn test_same_credentials_share_principal() {
        let t = translator();
        let a = t.translate_process(&process("10")).unwrap();
        let b = t.translate_process(&process("11")).unwrap();
        assert_eq!(a[1], b[1]);
    }

    #[test]
    fn test_bad_credentials_still_emit_subject() {
        let t = translator();
        let records = t.translate_process(&process("5").with("uid", "root")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), "Subject");
    }

    #[test]
    fn test_artifacts() {
        let t = translator();

        let pipe = file("pipe:[1234]").with("subtype", "pipe");
        let CdmRecord::FileObject(object) = &t.translate_artifact(&pipe).unwrap()[0] else {
            panic!("expected file object");
        };
        assert!(object.is_pipe);
        assert_eq!(object.url, "file://pipe:[1234]");

        let net = Vertex::new(ARTIFACT)
            .with("subtype", "network")
            .with("destination host", "10.0.0.1")
            .with("destination port", "443");
        let CdmRecord::NetFlowObject(flow) = &t.translate_artifact(&net).unwrap()[0] else {
            panic!("expected netflow");
        };
        assert_eq!((flow.src_address.as_str(), flow.src_port), ("", 0));
        assert_eq!((flow.dest_address.as_str(), flow.dest_port), ("10.0.0.1", 443));
        assert!(flow.base_object.source.is_none());

        let memory = Vertex::new(ARTIFACT)
            .with("subtype", "memory")
            .with("memory address", "7fff0000")
            .with("size", "4096");
        let CdmRecord::MemoryObject(mem) = &t.translate_artifact(&memory).unwrap()[0] else {
            panic!("expected memory object");
        };
        assert_eq!(mem.memory_address, 0x7fff0000);
        assert_eq!(mem.base_object.properties.get("size").map(String::as_str), Some("4096"));

        let unknown = Vertex::new(ARTIFACT)
            .with("subtype", "unknown")
            .with("path", "/42/fd/3")
            .with("version", "1");
        let CdmRecord::SrcSinkObject(sink) = &t.translate_artifact(&unknown).unwrap()[0] else {
            panic!("expected srcsink");
        };
        assert_eq!(sink.base_object.properties.get("pid").map(String::as_str), Some("42"));
        assert_eq!(sink.base_object.properties.get("fd").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_artifact_failures() {
        let t = translator();
        assert!(t.translate_artifact(&file("/a").with("version", "v1")).is_err());
        assert!(matches!(
            t.translate_artifact(&Vertex::new(ARTIFACT).with("subtype", "unknown").with("path", "/42").with("version", "0")),
            Err(MappingError::MalformedPath(_))
        ));
        assert!(t.translate_artifact(&Vertex::new(ARTIFACT).with("subtype", "socketpair")).unwrap().is_empty());
        assert!(matches!(
            t.translate_vertex(&Vertex::new("Agent")),
            Err(MappingError::UnknownVertexType(_))
        ));
    }

    #[test]
    fn test_used_open_end_to_end() {
        let t = translator();
        let proc_vertex = process("100");
        let passwd = file("/etc/passwd");
        assert!(t.put_vertex(&proc_vertex));
        assert!(t.put_vertex(&passwd));

        let edge = Edge::new("Used", proc_vertex.clone(), passwd.clone())
            .with("operation", "open")
            .with("time", "1000.0");
        assert!(t.put_edge(&edge));

        let records = t.sink().records();
        let events: Vec<&Event> = records.iter().filter_map(CdmRecord::as_event).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Open);
        assert_eq!(events[0].thread_id, 100);
        assert_eq!(events[0].timestamp_micros, 1_000_000);

        let edges = edges_of(&records);
        let affects: Vec<_> = edges.iter().filter(|e| e.edge_type == EdgeType::FileAffectsEvent).collect();
        assert_eq!(affects.len(), 1);
        assert_eq!(affects[0].to_uuid, passwd.content_hash().uuid());

        let generated: Vec<_> = edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::EventIsGeneratedBySubject)
            .collect();
        assert_eq!(generated.len(), 1);
        assert_eq!(generated[0].to_uuid, proc_vertex.content_hash().uuid());
        assert_eq!(t.record_count(), records.len() as u64);
    }

    #[test]
    fn test_unparsable_time_is_zero() {
        let t = translator();
        let edge = Edge::new("Used", process("100"), file("/tmp/x"))
            .with("operation", "read")
            .with("time", "abc")
            .with("size", "12");
        let records = t.translate_edge(&edge).unwrap();
        let event = records[0].as_event().unwrap();
        assert_eq!(event.timestamp_micros, 0);
        assert_eq!(event.size, Some(12));
        assert_eq!(event.properties.get("eventId").map(String::as_str), Some("0"));
    }

    #[test]
    fn test_unparsable_event_id_and_size_are_zero() {
        let t = translator();
        let edge = Edge::new("Used", process("100"), file("/tmp/x"))
            .with("operation", "read")
            .with("time", "1.0")
            .with("event id", "seven")
            .with("size", "big");
        let records = t.translate_edge(&edge).unwrap();
        let event = records[0].as_event().unwrap();
        assert_eq!(event.sequence, 0);
        assert_eq!(event.size, Some(0));
        assert_eq!(event.timestamp_micros, 1000);
    }

    #[test]
    fn test_suppressed_operations_emit_nothing() {
        let t = translator();
        for operation in ["rename_write", "link_write", "mmap_write"] {
            let edge = Edge::new("WasGeneratedBy", file("/a"), process("1")).with("operation", operation);
            assert!(!t.put_edge(&edge));
        }
        for operation in ["rename_read", "link_read", "mmap_read"] {
            let edge = Edge::new("Used", process("1"), file("/a")).with("operation", operation);
            assert!(matches!(t.translate_edge(&edge), Err(MappingError::Suppressed { .. })));
        }
        assert!(t.sink().records().is_empty());
    }

    #[test]
    fn test_load_requires_exec_event() {
        let t = translator();
        let child = process("200");
        let parent = process("1");
        let library = file("/lib/libc.so.6");
        let load = Edge::new("Used", child.clone(), library.clone()).with("operation", "load");

        assert!(!t.put_edge(&load));
        assert!(t.sink().records().is_empty());

        let execve = Edge::new("WasTriggeredBy", child.clone(), parent.clone()).with("operation", "execve");
        assert!(t.put_edge(&execve));
        let exec_uuid = execve.content_hash().uuid();
        t.sink().take();

        assert!(t.put_edge(&load));
        let records = t.sink().records();
        assert_eq!(records.len(), 1);
        let edge = records[0].as_edge().unwrap();
        assert_eq!(edge.edge_type, EdgeType::FileAffectsEvent);
        assert_eq!(edge.from_uuid, exec_uuid);
        assert_eq!(edge.to_uuid, library.content_hash().uuid());
    }

    #[test]
    fn test_triggered_by_affects_child_subject() {
        let t = translator();
        let child = process("200");
        let parent = process("1");
        let fork = Edge::new("WasTriggeredBy", child.clone(), parent.clone()).with("operation", "fork");
        let records = t.translate_edge(&fork).unwrap();

        assert_eq!(records[0].as_event().unwrap().thread_id, 1);
        let affects = records[1].as_edge().unwrap();
        assert_eq!(affects.edge_type, EdgeType::EventAffectsSubject);
        assert_eq!(affects.to_uuid, child.content_hash().uuid());
        assert_eq!(records[2].as_edge().unwrap().to_uuid, parent.content_hash().uuid());
    }

    #[test]
    fn test_write_affects_by_subtype() {
        let t = translator();
        let memory = Vertex::new(ARTIFACT).with("subtype", "memory").with("memory address", "1000");
        let write = Edge::new("WasGeneratedBy", memory, process("9")).with("operation", "write");
        let records = t.translate_edge(&write).unwrap();
        assert_eq!(records[1].as_edge().unwrap().edge_type, EdgeType::EventAffectsMemory);

        let socket = Vertex::new(ARTIFACT).with("subtype", "network");
        let write = Edge::new("WasGeneratedBy", socket, process("9")).with("operation", "write");
        assert!(matches!(
            t.translate_edge(&write),
            Err(MappingError::UnsupportedEndpoint { .. })
        ));
    }

    #[test]
    fn test_chmod_carries_permissions() {
        let t = translator();
        let chmod = Edge::new("WasGeneratedBy", file("/a"), process("9"))
            .with("operation", "chmod")
            .with("mode", "0644");
        let records = t.translate_edge(&chmod).unwrap();
        let event = records[0].as_event().unwrap();
        assert_eq!(event.event_type, EventType::ModifyFileAttributes);
        assert_eq!(event.properties.get("permissions").map(String::as_str), Some("0644"));
        assert_eq!(event.size, None);
    }

    #[test]
    fn test_derived_from_resolves_subject_from_cache() {
        let t = translator();
        let renamed = file("/new");
        let original = file("/old");
        let rename = Edge::new("WasDerivedFrom", renamed.clone(), original.clone())
            .with("operation", "rename")
            .with("pid", "300")
            .with("event id", "77");

        // Subject not cached yet: event and both affects edges, no generator
        let records = t.translate_edge(&rename).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].as_event().unwrap().sequence, 77);
        let reverse = records[2].as_edge().unwrap();
        assert_eq!(reverse.edge_type, EdgeType::FileAffectsEvent);
        assert_eq!(reverse.from_uuid, original.content_hash().uuid());

        let proc_vertex = process("300");
        t.translate_process(&proc_vertex).unwrap();
        let records = t.translate_edge(&rename).unwrap();
        assert_eq!(records.len(), 4);
        let generated = records[3].as_edge().unwrap();
        assert_eq!(generated.edge_type, EdgeType::EventIsGeneratedBySubject);
        assert_eq!(generated.to_uuid, proc_vertex.content_hash().uuid());
    }

    #[test]
    fn test_edge_failures() {
        let t = translator();
        let unknown = Edge::new("WasControlledBy", process("1"), process("2")).with("operation", "fork");
        assert!(matches!(t.translate_edge(&unknown), Err(MappingError::UnknownEdgeType(_))));

        let no_op = Edge::new("Used", process("1"), file("/a"));
        assert!(matches!(t.translate_edge(&no_op), Err(MappingError::MissingOperation { .. })));

        let bad_op = Edge::new("Used", process("1"), file("/a")).with("operation", "write");
        assert!(matches!(
            t.translate_edge(&bad_op),
            Err(MappingError::UnsupportedOperation { .. })
        ));

        let no_pid = Edge::new("WasDerivedFrom", file("/b"), file("/a")).with("operation", "link");
        assert!(matches!(
            t.translate_edge(&no_pid),
            Err(MappingError::MissingAnnotation("pid"))
        ));
    }

    #[test]
    fn test_shutdown_clears_cache() {
        let t = translator();
        assert!(t.put_vertex(&process("1")));
        assert_eq!(t.stats().cached_pids, 1);
        assert!(ProvenanceStorage::shutdown(&t));
        assert_eq!(t.stats().cached_pids, 0);
        assert_eq!(t.stats().records, 3);
    }
}
