//! Workflow storage with file persistence
//!
//! The persisted graph lives in `workflow.json`; two opaque JSON blobs
//! (`workflow_data.json`, `workflow_state.json`) are free-form node-local
//! storage the engine reads and writes verbatim. Without a directory the
//! store keeps everything in memory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::error::Result;
use crate::types::WorkflowContext;

/// One of the opaque auxiliary blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blob {
    Data,
    State,
}

impl Blob {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Data => defaults::WORKFLOW_DATA_FILE,
            Self::State => defaults::WORKFLOW_STATE_FILE,
        }
    }
}

/// Graph and blob storage, optionally backed by a directory
#[derive(Debug, Default)]
pub struct WorkflowStore {
    /// Optional directory for file persistence
    persist_path: Option<PathBuf>,
    /// File contents when running without persistence
    memory: HashMap<&'static str, String>,
}

impl WorkflowStore {
    /// Create a store that keeps everything in memory
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a store in `dir`, creating the directory and missing files
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        for name in [
            defaults::WORKFLOW_FILE,
            defaults::WORKFLOW_DATA_FILE,
            defaults::WORKFLOW_STATE_FILE,
        ] {
            let path = dir.join(name);
            if !path.exists() {
                fs::write(&path, "")?;
                log::debug!("Created {:?}", path);
            }
        }

        log::info!("Workflow store opened at {:?}", dir);
        Ok(Self {
            persist_path: Some(dir),
            memory: HashMap::new(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    fn read_file(&self, name: &'static str) -> Result<String> {
        match &self.persist_path {
            Some(dir) => Ok(fs::read_to_string(dir.join(name))?),
            None => Ok(self.memory.get(name).cloned().unwrap_or_default()),
        }
    }

    fn write_file(&mut self, name: &'static str, content: String) -> Result<()> {
        match &self.persist_path {
            Some(dir) => {
                let path = dir.join(name);
                fs::write(&path, content)?;
                log::debug!("Saved {:?}", path);
            }
            None => {
                self.memory.insert(name, content);
            }
        }
        Ok(())
    }

    /// Read the persisted graph; an empty file is an empty graph
    pub fn read_context(&self) -> Result<WorkflowContext> {
        let content = self.read_file(defaults::WORKFLOW_FILE)?;
        Ok(WorkflowContext::from_json(&content)?)
    }

    pub fn write_context(&mut self, context: &WorkflowContext) -> Result<()> {
        let content = context.to_json_pretty()?;
        self.write_file(defaults::WORKFLOW_FILE, content)
    }

    /// Read a blob verbatim; an empty file reads as `{}`
    pub fn read_blob(&self, blob: Blob) -> Result<serde_json::Value> {
        let content = self.read_file(blob.file_name())?;
        if content.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write_blob(&mut self, blob: Blob, value: &serde_json::Value) -> Result<()> {
        let content = serde_json::to_string_pretty(value)?;
        self.write_file(blob.file_name(), content)
    }
}
