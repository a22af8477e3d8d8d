use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::{sorted, ActivityStore, StoreError, StoreResult};
use crate::activity::{Activity, ActivityId, OwnerId};
use crate::migration::RecurrenceFields;

const TMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ActivityFile {
    #[serde(default)]
    activities: Vec<StoredActivity>,
}

/// On-disk record. Accepts the legacy `frequency` word and the older field
/// names; always written back with the value/unit pair.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredActivity {
    #[serde(alias = "_id")]
    id: String,
    #[serde(alias = "userId")]
    owner: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(flatten)]
    recurrence: RecurrenceFields,
    #[serde(default, alias = "lastDone")]
    last_completed_at: Option<DateTime<Utc>>,
}

impl StoredActivity {
    fn from_activity(activity: &Activity) -> Self {
        Self {
            id: activity.id.to_string(),
            owner: activity.owner.to_string(),
            name: activity.name.clone(),
            description: Some(activity.description.clone()),
            recurrence: RecurrenceFields::from_spec(&activity.recurrence),
            last_completed_at: activity.last_completed_at,
        }
    }

    fn into_activity(self) -> StoreResult<Activity> {
        let id = ActivityId::from(self.id);
        let recurrence = self
            .recurrence
            .resolve()
            .map_err(|source| StoreError::Recurrence {
                id: id.clone(),
                source,
            })?;
        Ok(Activity {
            id,
            owner: OwnerId::from(self.owner),
            name: self.name,
            description: self.description.unwrap_or_default(),
            recurrence,
            last_completed_at: self.last_completed_at,
        })
    }
}

type ActivityMap = HashMap<ActivityId, Activity>;

/// Activities kept in one JSON document, rewritten atomically on each change.
pub struct JsonActivityStore {
    path: PathBuf,
    activities: Arc<RwLock<ActivityMap>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl JsonActivityStore {
    /// Loads the file if present. Legacy records are migrated and the file is
    /// rewritten in the canonical shape straight away.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let (activities, migrated) = load_file(&path)?;
        let store = Self {
            path,
            activities: Arc::new(RwLock::new(activities)),
            watcher: Mutex::new(None),
        };
        if migrated > 0 {
            tracing::info!(
                path = %store.path.display(),
                migrated,
                "migrated legacy frequency records"
            );
            let snapshot = store.activities.read().clone();
            write_file(&store.path, &snapshot)?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reload(&self) -> StoreResult<()> {
        let (activities, _) = load_file(&self.path)?;
        *self.activities.write() = activities;
        Ok(())
    }

    /// Reloads whenever the file changes on disk. Idempotent.
    pub fn watch(&self) -> StoreResult<()> {
        let mut guard = self.watcher.lock();
        if guard.is_some() {
            return Ok(());
        }
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name: Option<OsString> = self.path.file_name().map(|name| name.to_os_string());
        let path = self.path.clone();
        let activities = Arc::clone(&self.activities);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(%err, "activity file watcher error");
                    return;
                }
            };
            if !(event.kind.is_modify() || event.kind.is_create()) {
                return;
            }
            let touches_file = event
                .paths
                .iter()
                .any(|changed| changed.file_name() == file_name.as_deref());
            if !touches_file {
                return;
            }
            tracing::debug!(?event, "activity file change detected");
            // Read under the lock so a reload never publishes a file older
            // than a write that has already been applied in process.
            let mut current = activities.write();
            match load_file(&path) {
                Ok((reloaded, _)) => *current = reloaded,
                Err(err) => tracing::warn!(%err, "ignoring unreadable activity file change"),
            }
        })
        .map_err(|source| StoreError::Watch {
            path: self.path.clone(),
            source,
        })?;
        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|source| StoreError::Watch {
                path: directory.clone(),
                source,
            })?;
        *guard = Some(watcher);
        Ok(())
    }

    /// Applies `change` to a copy, persists it, then publishes it.
    fn mutate<T>(&self, change: impl FnOnce(&mut ActivityMap) -> StoreResult<T>) -> StoreResult<T> {
        let mut activities = self.activities.write();
        let mut next = activities.clone();
        let outcome = change(&mut next)?;
        write_file(&self.path, &next)?;
        *activities = next;
        Ok(outcome)
    }
}

fn load_file(path: &Path) -> StoreResult<(ActivityMap, usize)> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok((HashMap::new(), 0)),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let file: ActivityFile = serde_json::from_slice(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let mut migrated = 0;
    let mut activities = HashMap::with_capacity(file.activities.len());
    for record in file.activities {
        if record.recurrence.is_legacy() {
            migrated += 1;
        }
        let activity = record.into_activity()?;
        activities.insert(activity.id.clone(), activity);
    }
    Ok((activities, migrated))
}

fn write_file(path: &Path, activities: &ActivityMap) -> StoreResult<()> {
    let mut records: Vec<StoredActivity> =
        activities.values().map(StoredActivity::from_activity).collect();
    records.sort_by(|a, b| a.id.cmp(&b.id));
    let json = serde_json::to_vec_pretty(&ActivityFile {
        activities: records,
    })
    .map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let tmp_path = path.with_extension(TMP_EXTENSION);
    fs::write(&tmp_path, &json).map_err(io_err)?;
    fs::rename(&tmp_path, path).map_err(io_err)?;
    Ok(())
}

impl ActivityStore for JsonActivityStore {
    fn insert(&self, activity: Activity) -> StoreResult<()> {
        self.mutate(|activities| {
            if activities.contains_key(&activity.id) {
                return Err(StoreError::Duplicate(activity.id));
            }
            activities.insert(activity.id.clone(), activity);
            Ok(())
        })
    }

    fn get(&self, id: &ActivityId) -> StoreResult<Activity> {
        self.activities
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn update(&self, activity: Activity) -> StoreResult<()> {
        self.mutate(|activities| {
            let slot = activities
                .get_mut(&activity.id)
                .ok_or_else(|| StoreError::NotFound(activity.id.clone()))?;
            *slot = activity;
            Ok(())
        })
    }

    fn remove(&self, id: &ActivityId) -> StoreResult<Activity> {
        self.mutate(|activities| {
            activities
                .remove(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))
        })
    }

    fn list_for_owner(&self, owner: &OwnerId) -> StoreResult<Vec<Activity>> {
        let activities = self
            .activities
            .read()
            .values()
            .filter(|activity| &activity.owner == owner)
            .cloned()
            .collect();
        Ok(sorted(activities))
    }

    fn list_all(&self) -> StoreResult<Vec<Activity>> {
        Ok(sorted(self.activities.read().values().cloned().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::{RecurrenceSpec, RecurrenceUnit};
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn migrates_legacy_records_on_open() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("activities.json");
        fs::write(
            &path,
            r#"{"activities":[
                {"_id":"a1","userId":"u1","name":"Water plants","frequency":"weekly",
                 "lastDone":"2025-01-01T08:00:00Z"},
                {"id":"a2","owner":"u1","name":"Stretch","description":null,
                 "frequencyValue":3,"frequencyUnit":"hours"}
            ]}"#,
        )
        .expect("write fixture");

        let store = JsonActivityStore::open(&path).expect("open store");
        let plants = store.get(&"a1".into()).expect("a1 present");
        assert_eq!(plants.recurrence.unit(), RecurrenceUnit::Week);
        assert_eq!(
            plants.last_completed_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap())
        );
        let stretch = store.get(&"a2".into()).expect("a2 present");
        assert_eq!(stretch.recurrence.value(), 3);
        assert_eq!(stretch.description, "");

        let rewritten = fs::read_to_string(&path).expect("read back");
        assert!(!rewritten.contains("\"frequency\""));
        assert!(rewritten.contains("\"frequencyUnit\": \"weeks\""));
    }

    #[test]
    fn invalid_stored_recurrence_is_reported() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("activities.json");
        fs::write(
            &path,
            r#"{"activities":[{"id":"bad","owner":"u","name":"x",
                "frequencyValue":400,"frequencyUnit":"days"}]}"#,
        )
        .expect("write fixture");
        assert!(matches!(
            JsonActivityStore::open(&path),
            Err(StoreError::Recurrence { .. })
        ));
    }

    #[test]
    fn mutations_persist_across_reopen() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("activities.json");
        let store = JsonActivityStore::open(&path).expect("open empty store");
        assert!(store.list_all().unwrap().is_empty());

        let spec = RecurrenceSpec::new(2, RecurrenceUnit::Day).unwrap();
        let mut activity = Activity::new("u1".into(), "Laundry", spec);
        let id = activity.id.clone();
        store.insert(activity.clone()).expect("insert");
        activity.mark_done(Utc.with_ymd_and_hms(2025, 5, 5, 5, 5, 5).unwrap());
        store.update(activity.clone()).expect("update");

        let reopened = JsonActivityStore::open(&path).expect("reopen");
        assert_eq!(reopened.get(&id).expect("persisted"), activity);

        reopened.remove(&id).expect("remove");
        assert!(JsonActivityStore::open(&path)
            .expect("reopen again")
            .list_all()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn failed_mutation_leaves_state_untouched() {
        let temp = tempdir().expect("tempdir");
        let store = JsonActivityStore::open(temp.path().join("a.json")).expect("open");
        let missing = Activity::new(
            "u1".into(),
            "Ghost",
            RecurrenceSpec::new(1, RecurrenceUnit::Day).unwrap(),
        );
        assert!(matches!(store.update(missing), Err(StoreError::NotFound(_))));
        assert!(store.list_all().unwrap().is_empty());
        assert!(!temp.path().join("a.json").exists());
    }

    /// Polls for up to five seconds; watcher delivery is asynchronous.
    fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..50 {
            if check() {
                return true;
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
        check()
    }

    #[test]
    fn watch_picks_up_external_edits() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("activities.json");
        fs::write(
            &path,
            r#"{"activities":[{"id":"a1","owner":"u1","name":"Laundry",
                "frequencyValue":1,"frequencyUnit":"weeks"}]}"#,
        )
        .expect("write fixture");
        let store = JsonActivityStore::open(&path).expect("open store");
        store.watch().expect("watch");
        store.watch().expect("second watch is a no-op");

        fs::write(
            &path,
            r#"{"activities":[
                {"id":"a1","owner":"u1","name":"Laundry",
                 "frequencyValue":1,"frequencyUnit":"weeks"},
                {"id":"a2","owner":"u1","name":"Dust shelves",
                 "frequencyValue":2,"frequencyUnit":"weeks"}
            ]}"#,
        )
        .expect("external rewrite");

        assert!(eventually(|| store.list_all().map(|all| all.len() == 2).unwrap_or(false)));
        let dusting = store.get(&"a2".into()).expect("a2 reloaded");
        assert_eq!(dusting.recurrence.value(), 2);
    }

    #[test]
    fn own_writes_survive_the_watcher() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("activities.json");
        let store = JsonActivityStore::open(&path).expect("open store");
        store.watch().expect("watch");

        let spec = RecurrenceSpec::new(1, RecurrenceUnit::Day).unwrap();
        let mut ids = Vec::new();
        for name in ["Floss", "Stretch", "Water plants"] {
            let mut activity = Activity::new("u1".into(), name, spec);
            activity.mark_done(Utc.with_ymd_and_hms(2025, 5, 5, 5, 5, 5).unwrap());
            ids.push(activity.id.clone());
            store.insert(activity).expect("insert");
        }
        store.remove(&ids[0]).expect("remove");
        std::thread::sleep(std::time::Duration::from_millis(300));

        let names = || -> Vec<String> {
            store
                .list_all()
                .unwrap()
                .into_iter()
                .map(|activity| activity.name)
                .collect()
        };
        assert_eq!(names(), vec!["Stretch".to_string(), "Water plants".to_string()]);
        assert!(!path.with_extension(TMP_EXTENSION).exists());

        let reopened = JsonActivityStore::open(&path).expect("reopen");
        assert_eq!(reopened.list_all().unwrap(), store.list_all().unwrap());
    }
}
