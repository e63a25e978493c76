use anyhow::{anyhow, Result};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tuner_structs::core::{LossHistory, RunDiagnostics};
use tuner_utils::{decompress_obj, dejsonify, write_json_file};

/// External store for exported run diagnostics.
pub trait DiagnosticsSink {
    fn write_group(&mut self, diagnostics: &RunDiagnostics) -> Result<()>;
    fn write_loss(&mut self, loss: &LossHistory) -> Result<()>;
}

/// Writes `group_<id>.json` per group and `loss.json` into a directory.
/// With compression enabled the files are zlib-compressed and end in `.json.zz`.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
    compress: bool,
}

impl JsonDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| anyhow!("Failed to create diagnostics dir '{}': {}", dir.display(), e))?;
        Ok(Self {
            dir,
            compress: false,
        })
    }

    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    fn extension(&self) -> &'static str {
        if self.compress {
            "json.zz"
        } else {
            "json"
        }
    }

    pub fn group_path(&self, group_id: usize) -> PathBuf {
        self.dir
            .join(format!("group_{}.{}", group_id, self.extension()))
    }

    pub fn loss_path(&self) -> PathBuf {
        self.dir.join(format!("loss.{}", self.extension()))
    }
}

impl DiagnosticsSink for JsonDirSink {
    fn write_group(&mut self, diagnostics: &RunDiagnostics) -> Result<()> {
        let path = self.group_path(diagnostics.group_id);
        write_json_file(&path, diagnostics, self.compress)
            .map_err(|e| anyhow!("Failed to write '{}': {}", path.display(), e))
    }

    fn write_loss(&mut self, loss: &LossHistory) -> Result<()> {
        let path = self.loss_path();
        write_json_file(&path, loss, self.compress)
            .map_err(|e| anyhow!("Failed to write '{}': {}", path.display(), e))
    }
}

/// Reads back a file written by [`JsonDirSink`], compressed or not.
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    if path.extension().map_or(false, |ext| ext == "zz") {
        decompress_obj(&bytes)
    } else {
        Ok(dejsonify(std::str::from_utf8(&bytes)?)?)
    }
}

/// Keeps exported diagnostics in memory. Later exports replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySink {
    pub groups: BTreeMap<usize, RunDiagnostics>,
    pub loss: Option<LossHistory>,
}

impl DiagnosticsSink for MemorySink {
    fn write_group(&mut self, diagnostics: &RunDiagnostics) -> Result<()> {
        self.groups.insert(diagnostics.group_id, diagnostics.clone());
        Ok(())
    }

    fn write_loss(&mut self, loss: &LossHistory) -> Result<()> {
        self.loss = Some(loss.clone());
        Ok(())
    }
}
