//! Notification centre: a bounded, newest-first list of user-facing messages
//! persisted write-through to a [`Storage`] backend.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::modules::storage::{Storage, StorageError};
use crate::modules::toast::{ToastDispatcher, ToastSubscription};

pub const NOTIFICATIONS_KEY: &str = "absentra_notifications";
pub const INITIALIZED_KEY: &str = "absentra_notifications_initialized";
pub const DEFAULT_RETENTION: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    /// Maps a toast severity onto a kind. Only `error` and `warning` keep
    /// their meaning; everything else is treated as a success.
    pub fn from_toast_severity(severity: &str) -> Self {
        match severity {
            "error" => Self::Error,
            "warning" => Self::Warning,
            _ => Self::Success,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(rename = "timestamp", with = "timestamp_format")]
    pub created_at: DateTime<Utc>,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

/// ISO-8601 with millisecond precision and a `Z` suffix. Values without an
/// offset are read as UTC.
mod timestamp_format {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(ts) => Ok(ts.with_timezone(&Utc)),
            Err(e) => NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|_| de::Error::custom(e)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Maximum number of notifications kept; the oldest fall off first.
    pub retention: usize,
    /// Whether a first-ever run populates the sample notifications.
    pub seed_samples: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            retention: DEFAULT_RETENTION,
            seed_samples: true,
        }
    }
}

pub type ListenerId = u64;
type Listener = Box<dyn FnMut(&[Notification]) + Send>;

pub struct NotificationStore {
    notifications: Vec<Notification>,
    storage: Box<dyn Storage>,
    retention: usize,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
    toasts: Option<ToastSubscription>,
}

impl NotificationStore {
    /// Loads the persisted list and seeds the samples on a first-ever run.
    ///
    /// Seeding requires both a missing initialized flag and no persisted
    /// notifications, so existing data is never replaced by samples. Storage
    /// failures are logged and the store starts empty.
    pub fn open(storage: Box<dyn Storage>, options: StoreOptions) -> Self {
        let mut store = Self {
            notifications: Vec::new(),
            storage,
            retention: options.retention.max(1),
            listeners: Vec::new(),
            next_listener: 0,
            toasts: None,
        };
        let mut dirty = false;

        let loaded = match read_persisted(store.storage.as_ref()) {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "failed to load notifications, starting empty");
                None
            }
        };
        let has_data = loaded.as_ref().is_some_and(|list| !list.is_empty());
        if let Some(mut list) = loaded {
            if list.len() > store.retention {
                debug!(loaded = list.len(), retention = store.retention, "trimming persisted notifications");
                list.truncate(store.retention);
                dirty = true;
            }
            store.notifications = list;
        }

        let initialized = match store.storage.get_item(INITIALIZED_KEY) {
            Ok(flag) => flag.is_some(),
            Err(e) => {
                warn!(error = %e, "failed to read initialized flag");
                false
            }
        };
        if !initialized {
            if options.seed_samples && !has_data {
                store.notifications = sample_notifications(now_millis());
                store.notifications.truncate(store.retention);
                info!("seeded sample notifications");
                dirty = true;
            }
            if let Err(e) = store.storage.set_item(INITIALIZED_KEY, "true") {
                warn!(error = %e, "failed to write initialized flag");
            }
        }

        if dirty {
            store.persist();
        }
        store
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }

    /// Prepends a new unread notification and returns its id.
    pub fn create(
        &mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
        action_url: Option<String>,
    ) -> String {
        let id = self.generate_id();
        self.notifications.insert(
            0,
            Notification {
                id: id.clone(),
                title: title.into(),
                message: message.into(),
                kind,
                created_at: now_millis(),
                read: false,
                action_url,
            },
        );
        self.notifications.truncate(self.retention);
        debug!(%id, kind = kind.as_str(), "notification created");
        self.commit();
        id
    }

    /// Returns `false` when the id is unknown or already read. Nothing is
    /// written in that case: the stored list already matches memory, barring
    /// an earlier failed write, which `mark_all_read` and `clear_all` repair.
    pub fn mark_read(&mut self, id: &str) -> bool {
        let Some(notification) = self.notifications.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        if notification.read {
            return false;
        }
        notification.read = true;
        self.commit();
        true
    }

    /// Returns how many notifications changed state.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for notification in self.notifications.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        self.commit();
        changed
    }

    pub fn clear_all(&mut self) {
        self.notifications.clear();
        self.commit();
    }

    /// Registers a callback run after every committed mutation.
    pub fn on_change<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&[Notification]) + Send + 'static,
    {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Subscribes to `dispatcher`. Returns `false` if a subscription is
    /// already active, in which case nothing changes.
    pub fn attach_toasts(&mut self, dispatcher: &ToastDispatcher) -> bool {
        if self.toasts.is_some() {
            return false;
        }
        self.toasts = Some(dispatcher.subscribe());
        debug!("toast subscription attached");
        true
    }

    pub fn detach_toasts(&mut self) {
        if self.toasts.take().is_some() {
            debug!("toast subscription detached");
        }
    }

    /// Turns every queued toast into a notification, oldest first.
    pub fn drain_toasts(&mut self) -> usize {
        let mut pending = Vec::new();
        if let Some(subscription) = self.toasts.as_mut() {
            while let Some(signal) = subscription.try_next() {
                pending.push(signal);
            }
        }
        let count = pending.len();
        for signal in pending {
            let kind = NotificationKind::from_toast_severity(&signal.severity);
            self.create(signal.title, signal.message, kind, None);
        }
        count
    }

    fn generate_id(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let suffix: String = (0..9)
                .map(|_| char::from_digit(rng.gen_range(0..36), 36).unwrap_or('0'))
                .collect();
            let id = format!("{}{}", Utc::now().timestamp_millis(), suffix);
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    fn commit(&mut self) {
        self.persist();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.notifications);
        }
    }

    fn persist(&mut self) {
        let result = serde_json::to_string(&self.notifications)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.set_item(NOTIFICATIONS_KEY, &json));
        if let Err(e) = result {
            warn!(error = %e, "failed to persist notifications");
        }
    }
}

fn read_persisted(storage: &dyn Storage) -> Result<Option<Vec<Notification>>, StorageError> {
    match storage.get_item(NOTIFICATIONS_KEY)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// The first-run welcome set, timestamped relative to `now`.
pub fn sample_notifications(now: DateTime<Utc>) -> Vec<Notification> {
    vec![
        Notification {
            id: "1".to_string(),
            title: "Welcome to Absentra".to_string(),
            message: "Your account has been set up successfully. You can now submit leave requests and manage your profile.".to_string(),
            kind: NotificationKind::Success,
            created_at: now - Duration::hours(2),
            read: false,
            action_url: None,
        },
        Notification {
            id: "2".to_string(),
            title: "System Maintenance Scheduled".to_string(),
            message: "The system will undergo maintenance on Sunday from 2:00 AM to 4:00 AM. Please plan accordingly.".to_string(),
            kind: NotificationKind::Info,
            created_at: now - Duration::days(1),
            read: false,
            action_url: None,
        },
        Notification {
            id: "3".to_string(),
            title: "Holiday Reminder".to_string(),
            message: "Christmas Day is coming up on December 25th. The office will be closed.".to_string(),
            kind: NotificationKind::Info,
            created_at: now - Duration::days(3),
            read: true,
            action_url: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::modules::storage::MemoryStorage;
    use crate::modules::toast::ToastSignal;

    fn unseeded() -> (NotificationStore, MemoryStorage) {
        let mut storage = MemoryStorage::new();
        storage.set_item(INITIALIZED_KEY, "true").unwrap();
        let store = NotificationStore::open(Box::new(storage.clone()), StoreOptions::default());
        (store, storage)
    }

    struct FailingStorage;

    impl Storage for FailingStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(io::Error::new(io::ErrorKind::Other, "storage unavailable").into())
        }
        fn set_item(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(io::Error::new(io::ErrorKind::Other, "quota exceeded").into())
        }
    }

    #[test]
    fn newest_notification_comes_first() {
        let (mut store, _) = unseeded();
        store.create("Welcome", "Setup done", NotificationKind::Success, None);
        store.create("Alert", "Disk full", NotificationKind::Error, None);

        let titles: Vec<_> = store.notifications().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["Alert", "Welcome"]);
        assert_eq!(store.notifications()[0].kind, NotificationKind::Error);
        assert!(store.notifications().iter().all(|n| !n.read));
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn retention_keeps_the_fifty_newest() {
        let (mut store, _) = unseeded();
        for i in 0..57 {
            store.create(format!("n{}", i), "", NotificationKind::Info, None);
        }
        assert_eq!(store.len(), DEFAULT_RETENTION);
        assert_eq!(store.notifications()[0].title, "n56");
        assert_eq!(store.notifications()[49].title, "n7");
    }

    #[test]
    fn ids_are_unique() {
        let (mut store, _) = unseeded();
        for _ in 0..50 {
            store.create("t", "m", NotificationKind::Info, None);
        }
        let mut ids: Vec<_> = store.notifications().iter().map(|n| n.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let (mut store, _) = unseeded();
        let keep = store.create("a", "", NotificationKind::Info, None);
        let id = store.create("b", "", NotificationKind::Info, None);

        assert!(store.mark_read(&id));
        let once = store.notifications().to_vec();
        assert!(!store.mark_read(&id));
        assert_eq!(store.notifications(), once.as_slice());
        assert!(!store.get(&keep).unwrap().read);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn mark_read_on_unknown_id_changes_nothing() {
        let (mut store, storage) = unseeded();
        store.create("a", "", NotificationKind::Warning, None);
        let before = store.notifications().to_vec();
        let persisted = storage.get_item(NOTIFICATIONS_KEY).unwrap();

        assert!(!store.mark_read("missing"));
        assert_eq!(store.notifications(), before.as_slice());
        assert_eq!(storage.get_item(NOTIFICATIONS_KEY).unwrap(), persisted);
    }

    #[test]
    fn unread_count_tracks_every_operation() {
        let (mut store, _) = unseeded();
        let expected = |s: &NotificationStore| s.notifications().iter().filter(|n| !n.read).count();

        let a = store.create("a", "", NotificationKind::Info, None);
        store.create("b", "", NotificationKind::Info, None);
        assert_eq!(store.unread_count(), expected(&store));
        store.mark_read(&a);
        assert_eq!(store.unread_count(), 1);
        store.create("c", "", NotificationKind::Info, None);
        assert_eq!(store.unread_count(), expected(&store));
        assert_eq!(store.mark_all_read(), 2);
        assert_eq!(store.unread_count(), 0);
        store.clear_all();
        assert_eq!(store.unread_count(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn persisted_list_round_trips() {
        let (mut store, storage) = unseeded();
        store.create("Leave approved", "Dec 24-26", NotificationKind::Success, Some("/leave/42".into()));
        let id = store.create("Balance low", "2 days left", NotificationKind::Warning, None);
        store.mark_read(&id);
        let original = store.notifications().to_vec();

        let reopened = NotificationStore::open(Box::new(storage), StoreOptions::default());
        assert_eq!(reopened.notifications(), original.as_slice());
    }

    #[test]
    fn wire_format_field_names() {
        let (mut store, storage) = unseeded();
        store.create("t", "m", NotificationKind::Error, Some("/requests".into()));
        let raw = storage.get_item(NOTIFICATIONS_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &value[0];
        assert_eq!(entry["type"], "error");
        assert_eq!(entry["actionUrl"], "/requests");
        assert_eq!(entry["read"], false);
        assert!(entry["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn loads_browser_style_timestamps() {
        let mut storage = MemoryStorage::new();
        storage.set_item(INITIALIZED_KEY, "true").unwrap();
        storage
            .set_item(
                NOTIFICATIONS_KEY,
                r#"[{"id":"17","title":"Hi","message":"There","type":"info","timestamp":"2024-05-01T10:00:00.000Z","read":true}]"#,
            )
            .unwrap();

        let store = NotificationStore::open(Box::new(storage), StoreOptions::default());
        let n = &store.notifications()[0];
        assert_eq!(n.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(n.read);
        assert_eq!(n.action_url, None);
    }

    #[test]
    fn loads_timestamps_without_offset_as_utc() {
        let mut storage = MemoryStorage::new();
        storage.set_item(INITIALIZED_KEY, "true").unwrap();
        storage
            .set_item(
                NOTIFICATIONS_KEY,
                r#"[{"id":"2","title":"New","message":"","type":"info","timestamp":"2024-05-01T10:00:00.000Z","read":false},{"id":"1","title":"Old","message":"","type":"success","timestamp":"2024-05-01T09:30:00","read":true}]"#,
            )
            .unwrap();

        let store = NotificationStore::open(Box::new(storage), StoreOptions::default());
        assert_eq!(store.len(), 2);
        assert_eq!(store.notifications()[0].created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(store.notifications()[1].created_at.to_rfc3339(), "2024-05-01T09:30:00+00:00");
    }

    #[test]
    fn mark_all_read_is_persisted() {
        let (mut store, storage) = unseeded();
        store.create("a", "", NotificationKind::Info, None);
        store.create("b", "", NotificationKind::Error, None);
        store.mark_all_read();

        let reopened = NotificationStore::open(Box::new(storage), StoreOptions::default());
        assert_eq!(reopened.len(), 2);
        assert!(reopened.notifications().iter().all(|n| n.read));
    }

    #[test]
    fn malformed_storage_falls_back_to_empty() {
        let mut storage = MemoryStorage::new();
        storage.set_item(INITIALIZED_KEY, "true").unwrap();
        storage.set_item(NOTIFICATIONS_KEY, "{not json").unwrap();

        let mut store = NotificationStore::open(Box::new(storage.clone()), StoreOptions::default());
        assert!(store.is_empty());

        store.create("fresh", "", NotificationKind::Info, None);
        let raw = storage.get_item(NOTIFICATIONS_KEY).unwrap().unwrap();
        assert!(raw.contains("fresh"));
    }

    #[test]
    fn storage_failures_leave_memory_state_intact() {
        let mut store = NotificationStore::open(Box::new(FailingStorage), StoreOptions::default());
        let seeded = store.len();
        let id = store.create("kept", "", NotificationKind::Info, None);
        assert_eq!(store.len(), seeded + 1);
        assert!(store.mark_read(&id));
        store.clear_all();
        assert!(store.is_empty());
    }

    #[test]
    fn first_run_seeds_samples_once() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        let mut store = NotificationStore::open(Box::new(storage.clone()), StoreOptions::default());

        let seeded = store.notifications();
        assert_eq!(seeded.len(), 3);
        assert_eq!(storage.get_item(INITIALIZED_KEY).unwrap().as_deref(), Some("true"));
        let ages: Vec<i64> = seeded.iter().map(|n| (now - n.created_at).num_minutes()).collect();
        assert!((119..=121).contains(&ages[0]));
        assert!((1439..=1441).contains(&ages[1]));
        assert!((4319..=4321).contains(&ages[2]));
        let flags: Vec<_> = seeded.iter().map(|n| (n.kind, n.read)).collect();
        assert_eq!(
            flags,
            [
                (NotificationKind::Success, false),
                (NotificationKind::Info, false),
                (NotificationKind::Info, true),
            ]
        );
        assert_eq!(store.unread_count(), 2);

        store.clear_all();
        let second = NotificationStore::open(Box::new(storage), StoreOptions::default());
        assert!(second.is_empty());
    }

    #[test]
    fn existing_data_is_never_replaced_by_samples() {
        let (mut first, _) = unseeded();
        first.create("real", "data", NotificationKind::Info, None);
        let mut storage = MemoryStorage::new();
        let persisted = serde_json::to_string(first.notifications()).unwrap();
        storage.set_item(NOTIFICATIONS_KEY, &persisted).unwrap();

        let store = NotificationStore::open(Box::new(storage.clone()), StoreOptions::default());
        assert_eq!(store.len(), 1);
        assert_eq!(store.notifications()[0].title, "real");
        assert_eq!(storage.get_item(INITIALIZED_KEY).unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn oversized_persisted_list_is_trimmed_on_load() {
        let (mut store, storage) = unseeded();
        for i in 0..20 {
            store.create(format!("n{}", i), "", NotificationKind::Info, None);
        }
        let small = NotificationStore::open(
            Box::new(storage.clone()),
            StoreOptions { retention: 5, seed_samples: true },
        );
        assert_eq!(small.len(), 5);
        assert_eq!(small.notifications()[0].title, "n19");

        let raw = storage.get_item(NOTIFICATIONS_KEY).unwrap().unwrap();
        let persisted: Vec<Notification> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 5);
    }

    #[test]
    fn listeners_run_after_each_mutation() {
        let (mut store, _) = unseeded();
        let calls = Arc::new(AtomicUsize::new(0));
        let last_len = Arc::new(AtomicUsize::new(0));
        let listener = {
            let calls = Arc::clone(&calls);
            let last_len = Arc::clone(&last_len);
            store.on_change(move |list| {
                calls.fetch_add(1, Ordering::SeqCst);
                last_len.store(list.len(), Ordering::SeqCst);
            })
        };

        let id = store.create("a", "", NotificationKind::Info, None);
        store.mark_read(&id);
        store.mark_read("missing");
        store.mark_all_read();
        store.clear_all();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(last_len.load(Ordering::SeqCst), 0);

        assert!(store.remove_listener(listener));
        store.create("b", "", NotificationKind::Info, None);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(!store.remove_listener(listener));
    }

    #[test]
    fn toast_severity_mapping() {
        assert_eq!(NotificationKind::from_toast_severity("error"), NotificationKind::Error);
        assert_eq!(NotificationKind::from_toast_severity("warning"), NotificationKind::Warning);
        assert_eq!(NotificationKind::from_toast_severity("info"), NotificationKind::Success);
        assert_eq!(NotificationKind::from_toast_severity("bogus"), NotificationKind::Success);
    }

    #[test]
    fn toasts_become_notifications_while_attached() {
        let (mut store, _) = unseeded();
        let dispatcher = ToastDispatcher::new();

        dispatcher.publish(ToastSignal::new("error", "ignored", "before attach"));
        assert!(store.attach_toasts(&dispatcher));
        assert!(!store.attach_toasts(&dispatcher));
        assert_eq!(dispatcher.subscriber_count(), 1);

        dispatcher.publish(ToastSignal::new("success", "Leave request submitted", "Dec 24-26"));
        dispatcher.publish(ToastSignal::new("warning", "Balance low", "2 days left"));
        assert_eq!(store.drain_toasts(), 2);

        let kinds: Vec<_> = store.notifications().iter().map(|n| (n.title.as_str(), n.kind)).collect();
        assert_eq!(
            kinds,
            [
                ("Balance low", NotificationKind::Warning),
                ("Leave request submitted", NotificationKind::Success),
            ]
        );

        store.detach_toasts();
        assert_eq!(dispatcher.subscriber_count(), 0);
        dispatcher.publish(ToastSignal::new("error", "dropped", ""));
        assert!(store.attach_toasts(&dispatcher));
        assert_eq!(store.drain_toasts(), 0);
        assert_eq!(store.len(), 2);
    }
}
