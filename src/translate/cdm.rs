//! Common Data Model records emitted by the translator
//!
//! Records serialize as one JSON object tagged by `datum`. Enum values use
//! the CDM spellings (`SUBJECT_PROCESS`, `EVENT_OPEN`, `EDGE_FILE_AFFECTS_EVENT`, ...).

use std::collections::BTreeMap;
use serde::Serialize;
use uuid::Uuid;

/// Free-form key/value pairs for annotations the model has no field for
pub type Properties = BTreeMap<String, String>;

/// The collector that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InstrumentationSource {
    #[serde(rename = "SOURCE_LINUX_AUDIT_TRACE")]
    LinuxAuditTrace,
    #[serde(rename = "SOURCE_LINUX_PROC_TRACE")]
    LinuxProcTrace,
    #[serde(rename = "SOURCE_LINUX_BEEP_TRACE")]
    LinuxBeepTrace,
}

impl InstrumentationSource {
    /// Resolve a `source` annotation value
    pub fn from_annotation(source: &str) -> Option<Self> {
        match source {
            "/dev/audit" => Some(Self::LinuxAuditTrace),
            "/proc" => Some(Self::LinuxProcTrace),
            "beep" => Some(Self::LinuxBeepTrace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinuxAuditTrace => "SOURCE_LINUX_AUDIT_TRACE",
            Self::LinuxProcTrace => "SOURCE_LINUX_PROC_TRACE",
            Self::LinuxBeepTrace => "SOURCE_LINUX_BEEP_TRACE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubjectType {
    #[serde(rename = "SUBJECT_PROCESS")]
    Process,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrincipalType {
    #[serde(rename = "PRINCIPAL_LOCAL")]
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SrcSinkType {
    #[serde(rename = "SOURCE_UNKNOWN")]
    Unknown,
}

/// Action kinds an edge can be translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    #[serde(rename = "EVENT_FORK")]
    Fork,
    #[serde(rename = "EVENT_CLONE")]
    Clone,
    #[serde(rename = "EVENT_EXECUTE")]
    Execute,
    #[serde(rename = "EVENT_CHANGE_PRINCIPAL")]
    ChangePrincipal,
    #[serde(rename = "EVENT_UNIT")]
    Unit,
    #[serde(rename = "EVENT_OPEN")]
    Open,
    #[serde(rename = "EVENT_WRITE")]
    Write,
    #[serde(rename = "EVENT_READ")]
    Read,
    #[serde(rename = "EVENT_MPROTECT")]
    Mprotect,
    #[serde(rename = "EVENT_CONNECT")]
    Connect,
    #[serde(rename = "EVENT_ACCEPT")]
    Accept,
    #[serde(rename = "EVENT_TRUNCATE")]
    Truncate,
    #[serde(rename = "EVENT_MODIFY_FILE_ATTRIBUTES")]
    ModifyFileAttributes,
    #[serde(rename = "EVENT_MMAP")]
    Mmap,
    #[serde(rename = "EVENT_UPDATE")]
    Update,
    #[serde(rename = "EVENT_RENAME")]
    Rename,
    #[serde(rename = "EVENT_LINK")]
    Link,
}

/// Typed relations between CDM records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeType {
    #[serde(rename = "EDGE_EVENT_AFFECTS_SUBJECT")]
    EventAffectsSubject,
    #[serde(rename = "EDGE_EVENT_AFFECTS_FILE")]
    EventAffectsFile,
    #[serde(rename = "EDGE_EVENT_AFFECTS_MEMORY")]
    EventAffectsMemory,
    #[serde(rename = "EDGE_EVENT_AFFECTS_SRCSINK")]
    EventAffectsSrcSink,
    #[serde(rename = "EDGE_EVENT_AFFECTS_NETFLOW")]
    EventAffectsNetFlow,
    #[serde(rename = "EDGE_FILE_AFFECTS_EVENT")]
    FileAffectsEvent,
    #[serde(rename = "EDGE_MEMORY_AFFECTS_EVENT")]
    MemoryAffectsEvent,
    #[serde(rename = "EDGE_SRCSINK_AFFECTS_EVENT")]
    SrcSinkAffectsEvent,
    #[serde(rename = "EDGE_NETFLOW_AFFECTS_EVENT")]
    NetFlowAffectsEvent,
    #[serde(rename = "EDGE_EVENT_ISGENERATEDBY_SUBJECT")]
    EventIsGeneratedBySubject,
    #[serde(rename = "EDGE_SUBJECT_HASLOCALPRINCIPAL")]
    SubjectHasLocalPrincipal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub uuid: Uuid,
    #[serde(rename = "type")]
    pub subject_type: SubjectType,
    pub source: InstrumentationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_timestamp_micros: Option<i64>,
    pub pid: i32,
    pub ppid: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd_line: Option<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub uuid: Uuid,
    #[serde(rename = "type")]
    pub principal_type: PrincipalType,
    pub user_id: i32,
    pub group_ids: Vec<i32>,
    pub source: InstrumentationSource,
    pub properties: Properties,
}

/// Fields shared by every object record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AbstractObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<InstrumentationSource>,
    #[serde(skip_serializing_if = "Properties::is_empty")]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileObject {
    pub uuid: Uuid,
    pub base_object: AbstractObject,
    pub url: String,
    pub version: i32,
    pub is_pipe: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetFlowObject {
    pub uuid: Uuid,
    pub base_object: AbstractObject,
    pub src_address: String,
    pub src_port: i32,
    pub dest_address: String,
    pub dest_port: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryObject {
    pub uuid: Uuid,
    pub base_object: AbstractObject,
    pub memory_address: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SrcSinkObject {
    pub uuid: Uuid,
    pub base_object: AbstractObject,
    #[serde(rename = "type")]
    pub src_sink_type: SrcSinkType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub uuid: Uuid,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp_micros: i64,
    pub sequence: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<InstrumentationSource>,
    pub thread_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleEdge {
    pub from_uuid: Uuid,
    pub to_uuid: Uuid,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub timestamp: i64,
}

impl SimpleEdge {
    pub fn new(from_uuid: Uuid, to_uuid: Uuid, edge_type: EdgeType, timestamp: i64) -> Self {
        Self {
            from_uuid,
            to_uuid,
            edge_type,
            timestamp,
        }
    }
}

/// One published datum.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "datum")]
pub enum CdmRecord {
    Subject(Subject),
    Principal(Principal),
    FileObject(FileObject),
    NetFlowObject(NetFlowObject),
    MemoryObject(MemoryObject),
    SrcSinkObject(SrcSinkObject),
    Event(Event),
    SimpleEdge(SimpleEdge),
}

impl CdmRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            CdmRecord::Subject(_) => "Subject",
            CdmRecord::Principal(_) => "Principal",
            CdmRecord::FileObject(_) => "FileObject",
            CdmRecord::NetFlowObject(_) => "NetFlowObject",
            CdmRecord::MemoryObject(_) => "MemoryObject",
            CdmRecord::SrcSinkObject(_) => "SrcSinkObject",
            CdmRecord::Event(_) => "Event",
            CdmRecord::SimpleEdge(_) => "SimpleEdge",
        }
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            CdmRecord::Event(event) => Some(event),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&SimpleEdge> {
        match self {
            CdmRecord::SimpleEdge(edge) => Some(edge),
            _ => None,
        }
    }
}
