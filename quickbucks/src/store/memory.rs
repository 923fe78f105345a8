//! In-process backend for tests and offline browsing.
//!
//! [`InMemoryBackend`] implements the task, message, user and object
//! contracts over shared maps; clones share state, so several clients can
//! act on one backend. Every write is applied under a single lock, which
//! makes [`TaskPatch`] preconditions atomic here.
//!
//! [`InMemoryAuth`] keeps accounts in memory. Sessions created with
//! [`InMemoryAuth::session`] share the account table but sign in
//! independently, modelling separate devices.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use quickbucks_proto::codec::{
    TASKS_COLLECTION, USERS_COLLECTION, decode_document, messages_collection,
};
use quickbucks_proto::message::{Message, MessageId, ThreadId};
use quickbucks_proto::task::{Task, TaskId, TaskStatus};
use quickbucks_proto::user::{Identity, UserId, UserProfile};

use super::{
    AuthError, AuthProvider, MessageRepository, NewMessage, NewTask, ObjectStore, StoreError,
    Subscription, TaskFilter, TaskPatch, TaskRepository, UserRepository,
};

/// A live message query registered by a subscriber.
struct MessageWatcher {
    thread: ThreadId,
    limit: usize,
    tx: watch::Sender<Vec<Message>>,
}

#[derive(Default)]
struct BackendState {
    tasks: Mutex<BTreeMap<TaskId, Task>>,
    threads: Mutex<HashMap<ThreadId, Vec<Message>>>,
    users: Mutex<HashMap<UserId, UserProfile>>,
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
    watchers: parking_lot::Mutex<Vec<MessageWatcher>>,
    offline: AtomicBool,
}

/// Exported collections loaded into an [`InMemoryBackend`].
///
/// Keys are document ids, values are stored document bodies.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DataExport {
    /// Bodies of the `tasks` collection.
    pub tasks: BTreeMap<String, serde_json::Value>,
    /// Bodies of the `users` collection.
    pub users: BTreeMap<String, serde_json::Value>,
}

impl DataExport {
    /// Parses an export from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the text is not a valid export.
    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        serde_json::from_str(text).map_err(|e| StoreError::Backend(format!("invalid export: {e}")))
    }
}

/// Shared in-memory document and object store.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<BackendState>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend holding the documents of an export.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if any document does not decode.
    pub async fn import(export: DataExport) -> Result<Self, StoreError> {
        let backend = Self::new();
        {
            let mut tasks = backend.state.tasks.lock().await;
            for (id, body) in export.tasks {
                let task: Task = decode_document(TaskId::new(id), body)?;
                if let Err(violation) = task.check_invariants() {
                    tracing::warn!(task_id = %task.id, %violation, "imported task breaks an invariant");
                }
                tasks.insert(task.id.clone(), task);
            }
        }
        {
            let mut users = backend.state.users.lock().await;
            for (id, body) in export.users {
                let profile: UserProfile = decode_document(UserId::new(id), body)?;
                users.insert(profile.id.clone(), profile);
            }
        }
        Ok(backend)
    }

    /// Simulates losing the connection: every call fails with
    /// [`StoreError::Network`] until set back to `false`.
    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }

    /// Returns the stored bytes and content type of an uploaded object.
    pub async fn object(&self, path: &str) -> Option<(String, Vec<u8>)> {
        self.state.objects.lock().await.get(path).cloned()
    }

    /// Inserts a task document as-is, bypassing creation defaults.
    pub async fn insert_task(&self, task: Task) {
        self.state.tasks.lock().await.insert(task.id.clone(), task);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.state.offline.load(Ordering::SeqCst) {
            Err(StoreError::Network("backend unreachable".to_string()))
        } else {
            Ok(())
        }
    }

    /// Most recent `limit` messages of a thread, newest first.
    fn newest_first(messages: &[Message], limit: usize) -> Vec<Message> {
        let mut sorted: Vec<Message> = messages.to_vec();
        sorted.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
        sorted.truncate(limit);
        sorted
    }

    /// Publishes a fresh snapshot to every live watcher of `thread`,
    /// replacing any snapshot the watcher has not read yet.
    fn notify_watchers(&self, thread: &ThreadId, messages: &[Message]) {
        let mut watchers = self.state.watchers.lock();
        watchers.retain(|w| !w.tx.is_closed());
        for watcher in watchers.iter().filter(|w| w.thread == *thread) {
            watcher
                .tx
                .send_replace(Self::newest_first(messages, watcher.limit));
        }
    }
}

impl TaskRepository for InMemoryBackend {
    async fn create_task(&self, task: NewTask) -> Result<TaskId, StoreError> {
        self.ensure_online()?;
        let id = TaskId::new(Uuid::now_v7().simple().to_string());
        let stored = Task {
            id: id.clone(),
            title: task.title,
            description: task.description,
            budget: task.budget,
            location: task.location,
            category: task.category,
            urgent: task.urgent,
            status: TaskStatus::Open,
            posted_by: task.posted_by,
            assigned_to: None,
            posted_at: Utc::now(),
            applications: Vec::new(),
            views: 0,
            verification_video: None,
        };
        self.state.tasks.lock().await.insert(id.clone(), stored);
        tracing::debug!(task_id = %id, "task document created");
        Ok(id)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, StoreError> {
        self.ensure_online()?;
        self.state
            .tasks
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{TASKS_COLLECTION}/{id}")))
    }

    async fn query_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        self.ensure_online()?;
        Ok(self
            .state
            .tasks
            .lock()
            .await
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn update_task(&self, id: &TaskId, patch: TaskPatch) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut tasks = self.state.tasks.lock().await;
        let stored = tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("{TASKS_COLLECTION}/{id}")))?;

        let mut updated = stored.clone();
        patch.apply_to(&mut updated)?;
        updated
            .check_invariants()
            .map_err(|violation| StoreError::Conflict(violation.to_string()))?;
        *stored = updated;
        drop(tasks);
        tracing::debug!(task_id = %id, "task document updated");
        Ok(())
    }
}

impl MessageRepository for InMemoryBackend {
    async fn append_message(
        &self,
        thread: &ThreadId,
        message: NewMessage,
    ) -> Result<Message, StoreError> {
        self.ensure_online()?;
        let stored = Message {
            id: MessageId::new(Uuid::now_v7().simple().to_string()),
            text: message.text,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            sender_avatar: message.sender_avatar,
            timestamp: Utc::now(),
            task_id: message.task_id,
        };
        let mut threads = self.state.threads.lock().await;
        let messages = threads.entry(thread.clone()).or_default();
        messages.push(stored.clone());
        self.notify_watchers(thread, messages);
        drop(threads);
        tracing::debug!(
            collection = %messages_collection(thread),
            message_id = %stored.id,
            "message appended"
        );
        Ok(stored)
    }

    async fn recent_messages(
        &self,
        thread: &ThreadId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        self.ensure_online()?;
        let threads = self.state.threads.lock().await;
        Ok(threads
            .get(thread)
            .map(|messages| Self::newest_first(messages, limit))
            .unwrap_or_default())
    }

    async fn subscribe_messages(
        &self,
        thread: &ThreadId,
        limit: usize,
    ) -> Result<Subscription<Vec<Message>>, StoreError> {
        self.ensure_online()?;
        let threads = self.state.threads.lock().await;
        let initial = threads
            .get(thread)
            .map(|messages| Self::newest_first(messages, limit))
            .unwrap_or_default();
        // Registered while the thread lock is held so no append slips between
        // the initial snapshot and the first live one.
        let (tx, subscription) = Subscription::channel(initial);
        self.state.watchers.lock().push(MessageWatcher {
            thread: thread.clone(),
            limit,
            tx,
        });
        drop(threads);
        Ok(subscription)
    }
}

impl UserRepository for InMemoryBackend {
    async fn get_user(&self, id: &UserId) -> Result<UserProfile, StoreError> {
        self.ensure_online()?;
        self.state
            .users
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{USERS_COLLECTION}/{id}")))
    }

    async fn put_user(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.state
            .users
            .lock()
            .await
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }
}

impl ObjectStore for InMemoryBackend {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        self.ensure_online()?;
        let size = bytes.len();
        self.state
            .objects
            .lock()
            .await
            .insert(path.to_string(), (content_type.to_string(), bytes));
        tracing::debug!(path, size, "object uploaded");
        Ok(format!("memory://{path}"))
    }
}

struct Account {
    password: String,
    identity: Identity,
}

#[derive(Default)]
struct SessionState {
    current: Option<Identity>,
    watchers: Vec<watch::Sender<Option<Identity>>>,
}

/// In-memory auth provider.
#[derive(Clone, Default)]
pub struct InMemoryAuth {
    accounts: Arc<parking_lot::Mutex<HashMap<String, Account>>>,
    session: Arc<parking_lot::Mutex<SessionState>>,
}

impl InMemoryAuth {
    /// Creates a provider with no accounts and nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider already signed in as `identity`.
    #[must_use]
    pub fn signed_in(identity: Identity) -> Self {
        let auth = Self::new();
        auth.session.lock().current = Some(identity);
        auth
    }

    /// A new signed-out session sharing this provider's accounts.
    #[must_use]
    pub fn session(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            session: Arc::default(),
        }
    }

    fn set_current(&self, identity: Option<Identity>) {
        let mut session = self.session.lock();
        session.current.clone_from(&identity);
        session.watchers.retain(|tx| !tx.is_closed());
        for tx in &session.watchers {
            tx.send_replace(identity.clone());
        }
    }
}

impl AuthProvider for InMemoryAuth {
    fn current_user(&self) -> Option<Identity> {
        self.session.lock().current.clone()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = {
            let accounts = self.accounts.lock();
            match accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => return Err(AuthError::InvalidCredentials),
            }
        };
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        let identity = {
            let mut accounts = self.accounts.lock();
            let key = email.to_lowercase();
            if accounts.contains_key(&key) {
                return Err(AuthError::EmailInUse);
            }
            let identity = Identity {
                id: UserId::new(Uuid::now_v7().simple().to_string()),
                display_name: Some(display_name.to_string()),
                photo_url: None,
            };
            accounts.insert(
                key,
                Account {
                    password: password.to_string(),
                    identity: identity.clone(),
                },
            );
            identity
        };
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.set_current(None);
        Ok(())
    }

    fn subscribe(&self) -> Subscription<Option<Identity>> {
        let mut session = self.session.lock();
        let (tx, subscription) = Subscription::channel(session.current.clone());
        session.watchers.push(tx);
        subscription
    }
}
