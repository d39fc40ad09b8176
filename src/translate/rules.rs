//! Edge translation table
//!
//! `rule` maps an (edge type, operation) pair to what the translator emits
//! for it. Pairs missing from the table are unsupported.

use crate::edge::EdgeKind;
use crate::vertex::ArtifactSubtype;
use super::cdm::{EdgeType, EventType};

/// How the primary affects-edge type is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affects {
    Fixed(EdgeType),
    /// `EVENT_AFFECTS_*` chosen from the affected artifact's subtype
    WrittenObject,
    /// `*_AFFECTS_EVENT` chosen from the affected artifact's subtype
    ReadObject,
}

impl Affects {
    /// Resolve against the subtype of the affected endpoint. Only file,
    /// memory and unclassified descriptors can be read or written.
    pub fn resolve(&self, subtype: Option<ArtifactSubtype>) -> Option<EdgeType> {
        match (self, subtype) {
            (Affects::Fixed(edge_type), _) => Some(*edge_type),
            (Affects::WrittenObject, Some(ArtifactSubtype::File)) => Some(EdgeType::EventAffectsFile),
            (Affects::WrittenObject, Some(ArtifactSubtype::Memory)) => Some(EdgeType::EventAffectsMemory),
            (Affects::WrittenObject, Some(ArtifactSubtype::Unknown)) => Some(EdgeType::EventAffectsSrcSink),
            (Affects::ReadObject, Some(ArtifactSubtype::File)) => Some(EdgeType::FileAffectsEvent),
            (Affects::ReadObject, Some(ArtifactSubtype::Memory)) => Some(EdgeType::MemoryAffectsEvent),
            (Affects::ReadObject, Some(ArtifactSubtype::Unknown)) => Some(EdgeType::SrcSinkAffectsEvent),
            _ => None,
        }
    }
}

/// What one supported (edge type, operation) pair translates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// A new event plus its affects edge. `sized` events carry the edge's
    /// `size` annotation.
    Emit {
        event: EventType,
        affects: Affects,
        sized: bool,
    },
    /// Link the process's cached execute event to the loaded object; no new
    /// event.
    Load,
    /// Covered by the matching WasDerivedFrom edge; emits nothing.
    Suppressed,
}

fn emit(event: EventType, affects: Affects) -> Option<Rule> {
    Some(Rule::Emit {
        event,
        affects,
        sized: false,
    })
}

fn sized(event: EventType, affects: Affects) -> Option<Rule> {
    Some(Rule::Emit {
        event,
        affects,
        sized: true,
    })
}

pub fn rule(kind: EdgeKind, operation: &str) -> Option<Rule> {
    use Affects::{Fixed, ReadObject, WrittenObject};
    use EdgeType::*;

    match kind {
        EdgeKind::WasTriggeredBy => match operation {
            "fork" => emit(EventType::Fork, Fixed(EventAffectsSubject)),
            "clone" => emit(EventType::Clone, Fixed(EventAffectsSubject)),
            "execve" => emit(EventType::Execute, Fixed(EventAffectsSubject)),
            "setuid" => emit(EventType::ChangePrincipal, Fixed(EventAffectsSubject)),
            "unit" => emit(EventType::Unit, Fixed(EventAffectsSubject)),
            _ => None,
        },
        EdgeKind::WasGeneratedBy => match operation {
            "open" => emit(EventType::Open, Fixed(EventAffectsFile)),
            "write" => sized(EventType::Write, WrittenObject),
            "send" | "sendto" => sized(EventType::Write, Fixed(EventAffectsNetFlow)),
            "mprotect" => emit(EventType::Mprotect, Fixed(EventAffectsMemory)),
            "connect" => emit(EventType::Connect, Fixed(EventAffectsNetFlow)),
            "truncate" | "ftruncate" => emit(EventType::Truncate, Fixed(EventAffectsFile)),
            "chmod" => emit(EventType::ModifyFileAttributes, Fixed(EventAffectsFile)),
            "rename_write" | "link_write" | "mmap_write" => Some(Rule::Suppressed),
            _ => None,
        },
        EdgeKind::Used => match operation {
            "load" => Some(Rule::Load),
            "open" => emit(EventType::Open, Fixed(FileAffectsEvent)),
            "read" => sized(EventType::Read, ReadObject),
            "recv" | "recvfrom" => sized(EventType::Read, Fixed(NetFlowAffectsEvent)),
            "accept" => emit(EventType::Accept, Fixed(NetFlowAffectsEvent)),
            "rename_read" | "link_read" | "mmap_read" => Some(Rule::Suppressed),
            _ => None,
        },
        EdgeKind::WasDerivedFrom => match operation {
            "mmap" | "mmap2" => emit(EventType::Mmap, Fixed(EventAffectsMemory)),
            "update" => emit(EventType::Update, Fixed(EventAffectsFile)),
            "rename" => emit(EventType::Rename, Fixed(EventAffectsFile)),
            "link" => emit(EventType::Link, Fixed(EventAffectsFile)),
            _ => None,
        },
    }
}
