/// 업로드 파일 저장소 캐퍼빌리티
/// 슬립 이미지를 저장하고 참조 경로를 돌려준다.
/// 운영에서는 오브젝트 스토리지로 대체 가능하도록 트레이트 뒤에 둔다.
// region:    --- Imports
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tracing::info;

// endregion: --- Imports

// region:    --- Blob Store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 바이트를 저장하고 참조 경로를 반환
    async fn save(&self, bytes: &[u8], extension: &str) -> Result<String, String>;
}

/// 로컬 디스크 구현체 (uploads/slips/<millis>.<ext>)
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for LocalDiskStore {
    async fn save(&self, bytes: &[u8], extension: &str) -> Result<String, String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| e.to_string())?;

        let file_name = format!("{}.{}", Utc::now().timestamp_millis(), extension);
        let path = self.root.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| e.to_string())?;

        info!(
            "{:<12} --> 파일 저장: {}",
            "BlobStore",
            path.display()
        );
        Ok(format!("/{}", path.display()).replace("//", "/"))
    }
}
// endregion: --- Blob Store

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_writes_file_and_returns_path() {
        let dir = std::env::temp_dir().join(format!(
            "slip-store-test-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let store = LocalDiskStore::new(&dir);

        let path = store.save(b"slip-bytes", "jpg").await.unwrap();
        assert!(path.ends_with(".jpg"));

        let on_disk = dir.join(path.rsplit('/').next().unwrap());
        let bytes = tokio::fs::read(on_disk).await.unwrap();
        assert_eq!(bytes, b"slip-bytes");

        tokio::fs::remove_dir_all(dir).await.ok();
    }
}
// endregion: --- Tests
