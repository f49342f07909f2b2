#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

pub const SAMPLE_CSV: &str = "Table名稱,市場,面向,類別,樣本,描述\n\
台股分析,台灣,基本面,001,RSI,台股財務指標\n\
美股技術,美國,技術面,\"002, 003\",\"RSI, MACD\",美股技術指標\n\
台股技術分析,台灣,技術面,001,MACD,\n";

pub const SAMPLE_FIELDS: &str = "ID,資料表,欄位名稱\n\
M001,[台股分析],[日期]\n\
M001,[台股分析],[收盤價]\n\
M002,台股技術分析表,[成交量]\n\
M002,台股技術分析表,[股票代號]\n\
M003,完全不同,[備註]\n";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.join(name);
        std::fs::write(&path, contents).expect("write temp file bytes");
        path
    }
}
