//! スタンドアロン起動時のレコード復元
//!
//! 外部のレコードストアを持たないので、起動時に bundle ディレクトリを走査して
//! 既存の bundle を completed レコードとしてインメモリストアに登録する。
//! 登録しないと、最初のサイクルで全 bundle が orphan として消されてしまう。
//!
//! 走査は起動時だけ。起動後に書かれた bundle は取り込まれない（main.rs 参照）。

use anyhow::Result;
use bundlekeeper_core::domain::{StorageArea, UploadRecord};
use bundlekeeper_core::impls::InMemoryUploadStore;
use bundlekeeper_core::ports::BundleFileStore;

/// 登録したレコード数を返す
pub async fn adopt_existing_bundles(
    files: &dyn BundleFileStore,
    store: &InMemoryUploadStore,
) -> Result<usize> {
    let mut adopted = 0;
    for entry in files.list(StorageArea::Bundles).await? {
        let Some(id) = StorageArea::Bundles.parse_file_name(&entry.name) else {
            continue;
        };
        if store.get(id).await.is_some() {
            continue;
        }

        // 時刻の手がかりは mtime しかない
        let mut record = UploadRecord::new(id, entry.modified_at);
        record.claim(entry.modified_at);
        record.complete(entry.path);
        store.insert(record).await;
        adopted += 1;
    }
    Ok(adopted)
}
