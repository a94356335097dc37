//! Layout - bundle ディレクトリ内のファイル配置
//!
//! ```text
//! <bundle dir>/
//!   uploads/<ULID>.lsif.gz   raw upload
//!   dbs/<ULID>.lsif.db       bundle
//! ```

use ulid::Ulid;

use super::ids::UploadId;

/// StorageArea は bundle ディレクトリ直下のサブディレクトリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageArea {
    Uploads,
    Bundles,
}

impl StorageArea {
    pub fn dir_name(&self) -> &'static str {
        match self {
            StorageArea::Uploads => "uploads",
            StorageArea::Bundles => "dbs",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            StorageArea::Uploads => ".lsif.gz",
            StorageArea::Bundles => ".lsif.db",
        }
    }

    pub fn file_name(&self, id: UploadId) -> String {
        format!("{}{}", id.key(), self.extension())
    }

    /// bundle ディレクトリからの相対パス（`bundle_path` に記録される形）
    pub fn relative_path(&self, id: UploadId) -> String {
        format!("{}/{}", self.dir_name(), self.file_name(id))
    }

    /// ファイル名から UploadId を取り出す。命名規則に合わなければ None
    ///
    /// 受け付けるのは `file_name(id)` が返す正規形だけ。プレフィックス付きや
    /// 小文字の ULID は別物として扱う（誰のファイルでもない）。
    pub fn parse_file_name(&self, name: &str) -> Option<UploadId> {
        let stem = name.strip_suffix(self.extension())?;
        let ulid = Ulid::from_string(stem).ok()?;
        let id = UploadId::from_ulid(ulid);
        (self.file_name(id) == name).then_some(id)
    }
}
