use std::{collections::BTreeMap, io::ErrorKind, path::PathBuf, sync::Arc};

use anyhow::Context;
use tokio::sync::Mutex;

use greenhouse_common::{HistoryRange, RuntimeConfig, PREF_HISTORY_RANGE_DAYS};

type Preferences = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub struct AppStore {
    runtime_path: Arc<PathBuf>,
    preferences_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl AppStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("GREENHOUSE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.greenhouse"));
        Self::in_dir(data_dir)
    }

    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            runtime_path: Arc::new(data_dir.join("dashboard.json")),
            preferences_path: Arc::new(data_dir.join("preferences.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
                .with_context(|| format!("invalid config in {}", self.runtime_path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn load_history_range(&self) -> anyhow::Result<HistoryRange> {
        let _guard = self.lock.lock().await;
        let preferences = self.read_preferences().await?;
        Ok(preferences
            .get(PREF_HISTORY_RANGE_DAYS)
            .map(|days| HistoryRange::parse(days))
            .unwrap_or_default())
    }

    pub async fn save_history_range(&self, range: HistoryRange) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut preferences = self.read_preferences().await?;
        preferences.insert(PREF_HISTORY_RANGE_DAYS.to_string(), range.days().to_string());

        let path = self.preferences_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(&preferences)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }

    async fn read_preferences(&self) -> anyhow::Result<Preferences> {
        match tokio::fs::read(self.preferences_path.as_ref()).await {
            Ok(raw) => serde_json::from_slice::<Preferences>(&raw).with_context(|| {
                format!("invalid preferences in {}", self.preferences_path.display())
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Preferences::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Default for AppStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn temp_store() -> (AppStore, PathBuf) {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "greenhouse-dashboard-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::SeqCst)
    ));
    (AppStore::in_dir(&dir), dir)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn missing_files_mean_defaults() {
        let (store, _dir) = temp_store();
        assert_eq!(store.load_runtime_config().await.unwrap(), RuntimeConfig::default());
        assert_eq!(store.load_history_range().await.unwrap(), HistoryRange::default());
    }

    #[tokio::test]
    async fn history_range_survives_a_new_store() {
        let (store, dir) = temp_store();
        store.save_history_range(HistoryRange::new(4)).await.unwrap();

        let reopened = AppStore::in_dir(&dir);
        assert_eq!(reopened.load_history_range().await.unwrap().days(), 4);

        let raw = tokio::fs::read_to_string(dir.join("preferences.json")).await.unwrap();
        assert!(raw.contains(r#""historyRangeDays": "4""#));
        tokio::fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn out_of_range_preference_is_clamped() {
        let (store, dir) = temp_store();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("preferences.json"), r#"{"historyRangeDays":"30","theme":"dark"}"#)
            .await
            .unwrap();
        assert_eq!(store.load_history_range().await.unwrap().days(), 7);

        store.save_history_range(HistoryRange::new(2)).await.unwrap();
        let raw = tokio::fs::read_to_string(dir.join("preferences.json")).await.unwrap();
        assert!(raw.contains("theme"));
        tokio::fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_config_is_an_error() {
        let (store, dir) = temp_store();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("dashboard.json"), "{not json").await.unwrap();

        let err = store.load_runtime_config().await.unwrap_err();
        assert!(format!("{err:#}").contains("invalid config"));
        tokio::fs::remove_dir_all(dir).await.unwrap();
    }
}
