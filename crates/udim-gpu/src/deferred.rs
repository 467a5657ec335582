//! Deferred texture freeing.
//!
//! GPU textures may only be freed on the thread owning the GPU context. Other
//! threads hand their textures to this queue; the owning thread drains it at
//! its next opportunity.

use crate::backend::GpuBackend;
use crate::texture::TextureId;
use parking_lot::Mutex;
use std::thread::{self, ThreadId};

/// Queue of textures waiting to be freed on the owning thread.
///
/// Shared behind an `Arc`; pushing is allowed from any thread.
pub struct DeferredFreeQueue {
    /// Textures pending deletion, most recent last.
    pending: Mutex<Vec<TextureId>>,
    /// Thread owning the GPU context.
    owner: ThreadId,
}

impl DeferredFreeQueue {
    /// Create a queue owned by the calling thread.
    pub fn new() -> Self {
        Self::with_owner(thread::current().id())
    }

    /// Create a queue owned by a specific thread.
    pub fn with_owner(owner: ThreadId) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            owner,
        }
    }

    /// Thread owning the GPU context.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Check if the calling thread owns the GPU context.
    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Queue a texture for deletion.
    pub fn queue(&self, texture: TextureId) {
        self.pending.lock().push(texture);
    }

    /// Queue several textures for deletion.
    pub fn queue_all(&self, textures: impl IntoIterator<Item = TextureId>) {
        self.pending.lock().extend(textures);
    }

    /// Free every queued texture.
    ///
    /// Does nothing when called off the owning thread. Returns the number of
    /// textures freed.
    pub fn flush<B: GpuBackend + ?Sized>(&self, backend: &mut B) -> usize {
        if !self.is_owner_thread() {
            return 0;
        }

        let drained = std::mem::take(&mut *self.pending.lock());
        let count = drained.len();
        for texture in drained {
            if let Err(err) = backend.free_texture(texture) {
                tracing::warn!(texture = texture.0, %err, "deferred texture free failed");
            }
        }
        if count > 0 {
            tracing::debug!(count, "flushed deferred texture frees");
        }
        count
    }

    /// Get the number of pending deletions.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Default for DeferredFreeQueue {
    fn default() -> Self {
        Self::new()
    }
}
