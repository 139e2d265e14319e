//! In-memory `Recording` fixture used by the integration tests in this
//! directory, standing in for the physical JFR decoder named as an external
//! collaborator in scope.
//!
//! Covers the event/struct/constant-pool shapes the seed scenarios need:
//! `jdk.FileRead`, `jdk.ExecutionSample` (with a stack trace reachable
//! through a constant-pool-resolved thread and a list of frames), and
//! `jdk.ActiveSetting`.

#![allow(dead_code)]

use jfrpath::recording::{Annotation, Catalog, ChunkInfo, Field, Recording, TypeKind};
use jfrpath::{RecordingError, Row, Value};
use std::collections::HashMap;
use std::sync::Mutex;

pub struct InMemoryRecording {
    catalog: Catalog,
    events: Mutex<HashMap<String, Vec<Row>>>,
    constant_pools: HashMap<String, HashMap<i64, Row>>,
    chunks: Vec<ChunkInfo>,
}

impl Recording for InMemoryRecording {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn event_types(&self) -> Vec<String> {
        self.catalog.event_type_names()
    }

    fn constant_pool_types(&self) -> Vec<String> {
        self.catalog.constant_pool_type_names()
    }

    fn iterate_events(&self, type_name: &str) -> Result<Box<dyn Iterator<Item = Row> + '_>, RecordingError> {
        let rows = self
            .events
            .lock()
            .unwrap()
            .get(type_name)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(rows.into_iter()))
    }

    fn iterate_constant_pool(&self, type_name: &str) -> Result<Box<dyn Iterator<Item = Row> + '_>, RecordingError> {
        let mut entries: Vec<(i64, Row)> = self
            .constant_pools
            .get(type_name)
            .map(|m| m.iter().map(|(k, v)| (*k, v.clone())).collect())
            .unwrap_or_default();
        entries.sort_by_key(|(idx, _)| *idx);
        Ok(Box::new(entries.into_iter().map(|(_, row)| row)))
    }

    fn resolve_constant(&self, type_name: &str, index: i64) -> Result<Option<Row>, RecordingError> {
        Ok(self.constant_pools.get(type_name).and_then(|m| m.get(&index).cloned()))
    }

    fn chunks(&self) -> &[ChunkInfo] {
        &self.chunks
    }
}

/// Builds an [`InMemoryRecording`] with the catalog shape the seed scenarios
/// in spec §8 need, pre-populated with helpers to add events and
/// constant-pool entries.
pub struct RecordingBuilder {
    catalog: Catalog,
    events: HashMap<String, Vec<Row>>,
    constant_pools: HashMap<String, HashMap<i64, Row>>,
    chunks: Vec<ChunkInfo>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        RecordingBuilder {
            catalog: Catalog::new(),
            events: HashMap::new(),
            constant_pools: HashMap::new(),
            chunks: Vec::new(),
        }
    }

    /// Registers the standard fixture schema: `jdk.FileRead`,
    /// `jdk.ExecutionSample` (with `eventThread` resolved through a
    /// constant-pool `java.lang.Thread`, and a `stackTrace/frames` chain
    /// down to `method/name/string`), and `jdk.ActiveSetting`.
    pub fn with_standard_schema(mut self) -> Self {
        let file_read = self.catalog.insert("jdk.FileRead", TypeKind::Event);
        self.catalog.add_field(file_read, Field::scalar("bytes", "long"));

        let thread = self.catalog.insert("java.lang.Thread", TypeKind::ConstantPoolEntry);
        self.catalog.add_field(thread, Field::scalar("osName", "string"));
        self.catalog.add_field(thread, Field::scalar("javaName", "string"));

        let symbol = self.catalog.insert("jdk.types.Symbol", TypeKind::Struct);
        self.catalog.add_field(symbol, Field::scalar("string", "string"));

        let method = self.catalog.insert("jdk.types.Method", TypeKind::Struct);
        self.catalog.add_field(method, Field::scalar("name", "jdk.types.Symbol"));

        let frame = self.catalog.insert("jdk.types.StackFrame", TypeKind::Struct);
        self.catalog.add_field(frame, Field::scalar("method", "jdk.types.Method"));

        let stack_trace = self.catalog.insert("jdk.types.StackTrace", TypeKind::Struct);
        self.catalog
            .add_field(stack_trace, Field::list("frames", "jdk.types.StackFrame"));

        let exec_sample = self.catalog.insert("jdk.ExecutionSample", TypeKind::Event);
        self.catalog
            .add_field(exec_sample, Field::scalar("eventThread", "java.lang.Thread"));
        self.catalog
            .add_field(exec_sample, Field::scalar("stackTrace", "jdk.types.StackTrace"));

        let active_setting = self.catalog.insert("jdk.ActiveSetting", TypeKind::Event);
        self.catalog.add_field(active_setting, Field::scalar("name", "string"));
        self.catalog.add_field(active_setting, Field::scalar("value", "string"));

        self
    }

    /// Adds a setting annotation + settings list to `jdk.FileRead`, useful
    /// for metadata-root tests.
    pub fn with_file_read_annotation(mut self) -> Self {
        if let Some(id) = self.catalog.by_name("jdk.FileRead").map(|d| d.id) {
            self.catalog
                .add_annotation(id, Annotation::new("Category").with_value("value", "File I/O"));
            self.catalog.add_setting(id, "enabled");
        }
        self
    }

    pub fn file_read(mut self, bytes: i64) -> Self {
        let mut row = Row::new();
        row.insert("bytes", Value::Int(bytes));
        self.events.entry("jdk.FileRead".to_string()).or_default().push(row);
        self
    }

    pub fn thread_constant(mut self, index: i64, os_name: &str, java_name: &str) -> Self {
        let mut row = Row::new();
        row.insert("osName", Value::Str(os_name.to_string()));
        row.insert("javaName", Value::Str(java_name.to_string()));
        self.constant_pools
            .entry("java.lang.Thread".to_string())
            .or_default()
            .insert(index, row);
        self
    }

    /// Adds one `jdk.ExecutionSample` event. `thread_index` is a raw
    /// constant-pool index the evaluator resolves through
    /// `java.lang.Thread`; `frame_methods` is the ordered list of method
    /// names making up the sample's stack trace.
    pub fn execution_sample(mut self, thread_index: i64, frame_methods: &[&str]) -> Self {
        let frames: Vec<Value> = frame_methods
            .iter()
            .map(|name| {
                let mut symbol = Row::new();
                symbol.insert("string", Value::Str((*name).to_string()));
                let mut method = Row::new();
                method.insert("name", Value::Row(symbol));
                let mut frame = Row::new();
                frame.insert("method", Value::Row(method));
                Value::Row(frame)
            })
            .collect();

        let mut stack_trace = Row::new();
        stack_trace.insert("frames", Value::List(frames));

        let mut row = Row::new();
        row.insert("eventThread", Value::Int(thread_index));
        row.insert("stackTrace", Value::Row(stack_trace));
        self.events
            .entry("jdk.ExecutionSample".to_string())
            .or_default()
            .push(row);
        self
    }

    pub fn active_setting(mut self, name: &str, value: &str) -> Self {
        let mut row = Row::new();
        row.insert("name", Value::Str(name.to_string()));
        row.insert("value", Value::Str(value.to_string()));
        self.events
            .entry("jdk.ActiveSetting".to_string())
            .or_default()
            .push(row);
        self
    }

    pub fn chunk(mut self, info: ChunkInfo) -> Self {
        self.chunks.push(info);
        self
    }

    pub fn build(self) -> InMemoryRecording {
        InMemoryRecording {
            catalog: self.catalog,
            events: Mutex::new(self.events),
            constant_pools: self.constant_pools,
            chunks: self.chunks,
        }
    }
}

impl Default for RecordingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Scenario 1/2 from spec §8: three `FileRead` events with `bytes` of
/// `{500, 1500, 2500}`.
pub fn file_read_fixture() -> InMemoryRecording {
    RecordingBuilder::new()
        .with_standard_schema()
        .file_read(500)
        .file_read(1500)
        .file_read(2500)
        .build()
}

/// Scenario 3 from spec §8: five execution samples belonging to threads
/// `{A,A,B,B,B}`, each with a trivial one-frame stack so the `matches()`
/// scenario in scenario 6 can reuse the same builder with distinct frames.
pub fn execution_sample_fixture() -> InMemoryRecording {
    RecordingBuilder::new()
        .with_standard_schema()
        .thread_constant(1, "A", "thread-A")
        .thread_constant(2, "B", "thread-B")
        .execution_sample(1, &["main"])
        .execution_sample(1, &["main"])
        .execution_sample(2, &["poll", "run"])
        .execution_sample(2, &["main"])
        .execution_sample(2, &["main"])
        .build()
}

/// Scenario 6 from spec §8: one sample whose frames contain `["poll",
/// "run"]` and one whose frames are `["main"]`.
pub fn poll_frame_fixture() -> InMemoryRecording {
    RecordingBuilder::new()
        .with_standard_schema()
        .thread_constant(1, "A", "thread-A")
        .execution_sample(1, &["poll", "run"])
        .execution_sample(1, &["main"])
        .build()
}

/// Scenario 4 from spec §8: a `cpuEngine`/`asgct` active setting plus a
/// couple more so `toMap`/`.size` have something to distinguish.
pub fn active_setting_fixture() -> InMemoryRecording {
    RecordingBuilder::new()
        .with_standard_schema()
        .active_setting("cpuEngine", "asgct")
        .active_setting("gcEngine", "g1")
        .build()
}
