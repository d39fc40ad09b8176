//! Publication sinks for translated records

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use serde::Serialize;
use crate::config::{ensure_db_dir, Serializer, TranslatorConfig};
use crate::{Error, Result};
use super::cdm::CdmRecord;

/// Where translated records are delivered.
///
/// A sink must not retry or buffer beyond the batch it is handed; the
/// translator counts whatever `publish` reports as accepted.
pub trait PublicationSink: Send + Sync {
    /// Deliver a batch; returns how many records were accepted
    fn publish(&self, records: &[CdmRecord]) -> usize;

    /// Flush and release the endpoint
    fn shutdown(&self) -> bool;
}

/// Keeps every published record; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<CdmRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far
    pub fn records(&self) -> Vec<CdmRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Remove and return everything published so far
    pub fn take(&self) -> Vec<CdmRecord> {
        self.records
            .lock()
            .map(|mut r| std::mem::take(&mut *r))
            .unwrap_or_default()
    }
}

impl PublicationSink for MemorySink {
    fn publish(&self, records: &[CdmRecord]) -> usize {
        match self.records.lock() {
            Ok(mut stored) => {
                stored.extend_from_slice(records);
                records.len()
            }
            Err(_) => 0,
        }
    }

    fn shutdown(&self) -> bool {
        true
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    producer: &'a str,
    schema: &'a str,
    record: &'a CdmRecord,
}

/// Writes one JSON document per record to a file or stdout.
pub struct JsonLinesSink {
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    serializer: Serializer,
    topic: String,
    producer_id: String,
    schema: String,
}

impl JsonLinesSink {
    /// Open the configured endpoint; `-` is stdout, anything else is a file
    /// path opened for append.
    pub fn open(config: &TranslatorConfig) -> Result<Self> {
        let writer: Box<dyn Write + Send> = if config.endpoint == "-" {
            Box::new(std::io::stdout())
        } else {
            let path = Path::new(&config.endpoint);
            ensure_db_dir(path)?;
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Box::new(BufWriter::new(file))
        };
        tracing::info!(
            "Publishing to {} (topic {}, producer {})",
            config.endpoint,
            config.topic,
            config.producer_id
        );
        Ok(Self::from_writer(writer, config))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>, config: &TranslatorConfig) -> Self {
        Self {
            writer: Mutex::new(Some(writer)),
            serializer: config.serializer,
            topic: config.topic.clone(),
            producer_id: config.producer_id.clone(),
            schema: config.schema.clone(),
        }
    }

    fn write_record(&self, writer: &mut dyn Write, record: &CdmRecord) -> Result<()> {
        let envelope = Envelope {
            topic: &self.topic,
            producer: &self.producer_id,
            schema: &self.schema,
            record,
        };
        match self.serializer {
            Serializer::Json => serde_json::to_writer(&mut *writer, &envelope)?,
            Serializer::Pretty => serde_json::to_writer_pretty(&mut *writer, &envelope)?,
        }
        writeln!(writer)?;
        Ok(())
    }
}

impl PublicationSink for JsonLinesSink {
    fn publish(&self, records: &[CdmRecord]) -> usize {
        let Ok(mut guard) = self.writer.lock() else {
            tracing::error!("Sink lock poisoned; dropping {} records", records.len());
            return 0;
        };
        let Some(writer) = guard.as_mut() else {
            tracing::error!("Sink already shut down; dropping {} records", records.len());
            return 0;
        };

        let mut accepted = 0;
        for record in records {
            if let Err(e) = self.write_record(writer.as_mut(), record) {
                tracing::error!("Failed to publish {}: {}", record.kind(), e);
                break;
            }
            accepted += 1;
        }
        accepted
    }

    fn shutdown(&self) -> bool {
        let Ok(mut guard) = self.writer.lock() else {
            return false;
        };
        match guard.take() {
            Some(mut writer) => match writer.flush() {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!("Failed to flush sink: {}", Error::Io(e));
                    false
                }
            },
            None => true,
        }
    }
}
