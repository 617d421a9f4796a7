use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use murmur_types::models::{Attachment, AttachmentId, PreviewHandle, RawFile};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreviewError {
    #[error("unsupported preview type: {0}")]
    Unsupported(String),

    #[error("file too large for preview: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("unknown preview handle: {0}")]
    UnknownHandle(String),

    #[error("preview backend failure: {0}")]
    Backend(String),
}

/// Platform hook that turns file bytes into a displayable preview resource
/// and releases it again (object URLs on the web).
///
/// `create` may read large files. Dropping its future cancels the request
/// and must not leave a live resource behind.
#[async_trait]
pub trait PreviewProvider: Send + Sync {
    async fn create(&self, attachment: &Attachment) -> Result<PreviewHandle, PreviewError>;
    fn revoke(&self, handle: &PreviewHandle) -> Result<(), PreviewError>;
}

/// In-process preview registry minting `blob:<uuid>` handles.
///
/// Revoking a handle twice is an error, which makes double releases visible.
pub struct ObjectUrlRegistry {
    max_bytes: u64,
    live: Mutex<HashMap<String, Bytes>>,
}

impl ObjectUrlRegistry {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Number of handles created and not yet revoked.
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live
            .lock()
            .map(|live| live.contains_key(handle.as_str()))
            .unwrap_or(false)
    }
}

impl Default for ObjectUrlRegistry {
    fn default() -> Self {
        Self::new(25 * 1024 * 1024)
    }
}

#[async_trait]
impl PreviewProvider for ObjectUrlRegistry {
    async fn create(&self, attachment: &Attachment) -> Result<PreviewHandle, PreviewError> {
        if !attachment.is_image() {
            return Err(PreviewError::Unsupported(attachment.mime_type.clone()));
        }
        if attachment.size_bytes > self.max_bytes {
            return Err(PreviewError::TooLarge {
                size: attachment.size_bytes,
                limit: self.max_bytes,
            });
        }

        let url = format!("blob:{}", Uuid::new_v4());
        let mut live = self.live.lock().map_err(|e| PreviewError::Backend(e.to_string()))?;
        live.insert(url.clone(), attachment.raw_data.clone());
        Ok(PreviewHandle::new(url))
    }

    fn revoke(&self, handle: &PreviewHandle) -> Result<(), PreviewError> {
        let mut live = self.live.lock().map_err(|e| PreviewError::Backend(e.to_string()))?;
        live.remove(handle.as_str())
            .map(|_| ())
            .ok_or_else(|| PreviewError::UnknownHandle(handle.as_str().to_string()))
    }
}

type PreviewResult = (AttachmentId, Result<PreviewHandle, PreviewError>);

/// Pending attachments for the message being composed.
///
/// Image previews load in background tasks and are attached by
/// `poll_previews`. The staging area is the sole owner of every preview
/// handle: each one is released exactly once, on `remove`, `clear`, or drop,
/// and a preview that finishes after its attachment is gone is revoked as
/// soon as it is collected.
pub struct AttachmentStaging {
    previews: Arc<dyn PreviewProvider>,
    pending: Vec<Attachment>,
    loading: HashMap<AttachmentId, JoinHandle<()>>,
    ready_tx: mpsc::UnboundedSender<PreviewResult>,
    ready_rx: mpsc::UnboundedReceiver<PreviewResult>,
}

impl AttachmentStaging {
    pub fn new(previews: Arc<dyn PreviewProvider>) -> Self {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        Self {
            previews,
            pending: Vec::new(),
            loading: HashMap::new(),
            ready_tx,
            ready_rx,
        }
    }

    /// Stage picked files. Images start loading a preview in the background;
    /// a failed preview leaves the attachment staged without one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add(&mut self, files: impl IntoIterator<Item = RawFile>) -> Vec<AttachmentId> {
        let mut ids = Vec::new();
        for file in files {
            let attachment = Attachment::from_file(file);
            if attachment.is_image() {
                let task = self.spawn_preview(attachment.detached());
                self.loading.insert(attachment.id, task);
            }
            debug!("Staged {} ({} bytes)", attachment.name, attachment.size_bytes);
            ids.push(attachment.id);
            self.pending.push(attachment);
        }
        ids
    }

    /// Stage an already-built attachment, such as a finished voice recording.
    pub fn stage(&mut self, attachment: Attachment) -> AttachmentId {
        let id = attachment.id;
        self.pending.push(attachment);
        id
    }

    /// Drop one attachment, cancelling or releasing its preview. Returns
    /// false if no attachment has that id.
    pub fn remove(&mut self, id: AttachmentId) -> bool {
        if let Some(task) = self.loading.remove(&id) {
            task.abort();
        }
        self.poll_previews();

        let Some(pos) = self.pending.iter().position(|a| a.id == id) else {
            return false;
        };
        let mut attachment = self.pending.remove(pos);
        self.release(&mut attachment);
        true
    }

    /// Cancel every preview load, release every preview and empty the list.
    pub fn clear(&mut self) {
        for (_, task) in self.loading.drain() {
            task.abort();
        }
        let mut drained: Vec<Attachment> = self.pending.drain(..).collect();
        for attachment in &mut drained {
            self.release(attachment);
        }
        // Anything still queued belongs to an attachment that is gone now.
        self.poll_previews();
    }

    /// Attach previews that finished loading. Returns how many were attached.
    pub fn poll_previews(&mut self) -> usize {
        let mut attached = 0;
        while let Ok((id, result)) = self.ready_rx.try_recv() {
            self.loading.remove(&id);
            let Some(attachment) = self.pending.iter_mut().find(|a| a.id == id) else {
                if let Ok(handle) = result {
                    debug!("Revoking late preview for removed attachment {}", id);
                    revoke(self.previews.as_ref(), &handle, "removed attachment");
                }
                continue;
            };
            match result {
                Ok(handle) => {
                    attachment.preview_handle = Some(handle);
                    attached += 1;
                }
                Err(e) => warn!("No preview for {}: {}", attachment.name, e),
            }
        }
        attached
    }

    /// Wait for every outstanding preview load, then attach the results.
    pub async fn settle(&mut self) {
        let tasks: Vec<JoinHandle<()>> = self.loading.drain().map(|(_, task)| task).collect();
        for task in tasks {
            if let Err(e) = task.await {
                debug!("Preview task ended early: {}", e);
            }
        }
        self.poll_previews();
    }

    pub fn is_preview_loading(&self, id: AttachmentId) -> bool {
        self.loading.contains_key(&id)
    }

    /// Detached copies of the pending list, for a message payload.
    pub fn snapshot(&self) -> Vec<Attachment> {
        self.pending.iter().map(Attachment::detached).collect()
    }

    pub fn pending(&self) -> &[Attachment] {
        &self.pending
    }

    pub fn get(&self, id: AttachmentId) -> Option<&Attachment> {
        self.pending.iter().find(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn spawn_preview(&self, source: Attachment) -> JoinHandle<()> {
        let provider = self.previews.clone();
        let ready = self.ready_tx.clone();
        tokio::spawn(async move {
            let result = provider.create(&source).await;
            // The staging area is gone; nobody else will release this handle.
            if let Err(mpsc::error::SendError((_, Ok(handle)))) = ready.send((source.id, result)) {
                revoke(provider.as_ref(), &handle, &source.name);
            }
        })
    }

    fn release(&self, attachment: &mut Attachment) {
        // take() first so a failed revoke can never be retried into a double release
        if let Some(handle) = attachment.preview_handle.take() {
            revoke(self.previews.as_ref(), &handle, &attachment.name);
        }
    }
}

fn revoke(previews: &dyn PreviewProvider, handle: &PreviewHandle, name: &str) {
    if let Err(e) = previews.revoke(handle) {
        warn!("Failed to release preview for {}: {}", name, e);
    }
}

impl Drop for AttachmentStaging {
    fn drop(&mut self) {
        self.clear();
    }
}
