use crate::session::ViewerSession;
use crate::session_manager::SessionManager;
use crate::translator::{ChunkTranslator, TranslateOutcome};
use blockpatch_common::{BlockPos, ChunkPos, ItemStack, ViewerId};
use blockpatch_protocol::chunk_data::{BulkChunkEntry, RawChunkFields};
use bytes::{Bytes, BytesMut};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

/// Outbound packets the pipeline knows how to patch, already split into
/// their fields.
#[derive(Debug, Clone)]
pub enum OutboundPacket {
    ChunkData(RawChunkFields),
    ChunkBulk {
        has_skylight: bool,
        entries: Vec<BulkChunkEntry>,
        payload: BytesMut,
    },
    BlockChange {
        pos: BlockPos,
        block_id: u32,
        data: u32,
    },
    MultiBlockChange {
        chunk: ChunkPos,
        records: BytesMut,
    },
    SpawnObject {
        object_type: i32,
        pos: BlockPos,
        data: i32,
    },
    /// Spawn of a dropped item entity.
    SpawnItem {
        entity_id: i32,
        item: ItemStack,
    },
    /// Metadata update carrying the stack of a dropped item entity.
    ItemMetadata {
        entity_id: i32,
        item: ItemStack,
    },
    /// Anything else passes through untouched.
    Other(Bytes),
}

/// Async front end: patches packets per viewer and runs the policy hook off
/// the packet path.
pub struct PatchPipeline {
    translator: Arc<ChunkTranslator>,
    sessions: SessionManager,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl PatchPipeline {
    pub fn new(translator: ChunkTranslator) -> Self {
        Self {
            translator: Arc::new(translator),
            sessions: SessionManager::new(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn translator(&self) -> &Arc<ChunkTranslator> {
        &self.translator
    }

    pub async fn connect(&self, viewer: ViewerId, name: String) {
        info!("Viewer {} ({}) connected", name, viewer);
        if let Some(stale) = self.sessions.add_session(ViewerSession::new(viewer, name)) {
            // The old session's conversions may no longer apply.
            stale.drain().await;
            self.translator.invalidate_viewer(viewer);
        }
    }

    /// Removes the viewer's session and cached conversions. Returns how many
    /// cache entries were evicted.
    ///
    /// Hook evaluations still running for the viewer are waited for first,
    /// so none of them can cache a table after the eviction.
    pub async fn disconnect(&self, viewer: ViewerId) -> usize {
        let session = self.sessions.remove_session(viewer);
        if let Some(session) = &session {
            session.drain().await;
        }
        let evicted = self.translator.invalidate_viewer(viewer);
        match session {
            Some(session) => info!(
                "Viewer {} disconnected after {} packets in {:?}, evicted {} conversions",
                session.name,
                session.packets_handled(),
                session.connected_at.elapsed(),
                evicted
            ),
            None => debug!("Disconnect for unknown viewer {}", viewer),
        }
        evicted
    }

    pub fn is_connected(&self, viewer: ViewerId) -> bool {
        self.sessions.is_connected(viewer)
    }

    pub fn connected_viewers(&self) -> usize {
        self.sessions.len()
    }

    /// Patches one packet for `viewer`.
    ///
    /// Chunks the viewer stands in get their conversion computed before
    /// translation; for every other chunk the hook runs on the blocking pool
    /// afterwards and applies to later packets. Packets for viewers without a
    /// session are translated with the default table and never cached.
    pub async fn handle(&self, viewer: ViewerId, mut packet: OutboundPacket) -> OutboundPacket {
        let mut translated = 0;

        match &mut packet {
            OutboundPacket::ChunkData(fields) => {
                let pos = fields.pos;
                let important = self.translator.is_viewer_chunk(viewer, pos);
                if important {
                    self.observe_now(viewer, pos).await;
                }
                match self.translator.translate_full_chunk_cached(viewer, fields) {
                    TranslateOutcome::Translated => {
                        translated += 1;
                        if !important {
                            self.defer_observe(viewer, pos);
                        }
                    }
                    TranslateOutcome::Unchanged(reason) => {
                        debug!("Chunk {} for {} left unchanged: {:?}", pos, viewer, reason)
                    }
                }
            }
            OutboundPacket::ChunkBulk {
                has_skylight,
                entries,
                payload,
            } => {
                for entry in entries.iter() {
                    if self.translator.is_viewer_chunk(viewer, entry.pos) {
                        self.observe_now(viewer, entry.pos).await;
                    }
                }
                let outcomes = self
                    .translator
                    .translate_chunk_bulk_cached(viewer, *has_skylight, entries, payload);
                for (entry, outcome) in entries.iter().zip(&outcomes) {
                    if outcome.is_translated() {
                        translated += 1;
                        if !self.translator.is_viewer_chunk(viewer, entry.pos) {
                            self.defer_observe(viewer, entry.pos);
                        }
                    }
                }
            }
            OutboundPacket::BlockChange { pos, block_id, data } => {
                let (new_id, new_data) = self.translator.translate_single_block(viewer, *pos, *block_id, *data);
                *block_id = new_id;
                *data = new_data;
            }
            OutboundPacket::MultiBlockChange { chunk, records } => {
                if let Err(e) = self.translator.translate_multi_block_records(viewer, *chunk, records) {
                    warn!("Passing multi block change {} to {} unchanged: {}", chunk, viewer, e);
                }
            }
            OutboundPacket::SpawnObject {
                object_type,
                pos,
                data,
            } => {
                *data = self.translator.translate_falling_block(viewer, *object_type, *pos, *data);
            }
            OutboundPacket::SpawnItem { item, .. } | OutboundPacket::ItemMetadata { item, .. } => {
                self.translator.translate_dropped_item(viewer, item);
            }
            OutboundPacket::Other(_) => {}
        }

        if let Some(session) = self.sessions.get_session(viewer) {
            session.record_packet(translated);
        }
        packet
    }

    /// Starts the hook for a chunk on the blocking pool. Nothing is started
    /// for a viewer without a session or one being drained.
    fn spawn_observe(&self, viewer: ViewerId, pos: ChunkPos) -> Option<JoinHandle<()>> {
        let Some(in_flight) = self.sessions.get_session(viewer).and_then(|session| session.track()) else {
            debug!("Not caching {} for {}: no session", pos, viewer);
            return None;
        };
        let translator = Arc::clone(&self.translator);
        Some(tokio::task::spawn_blocking(move || {
            translator.observe_chunk(viewer, pos);
            drop(in_flight);
        }))
    }

    async fn observe_now(&self, viewer: ViewerId, pos: ChunkPos) {
        if let Some(handle) = self.spawn_observe(viewer, pos) {
            if let Err(e) = handle.await {
                warn!("Conversion hook for {} at {} failed: {}", viewer, pos, e);
            }
        }
    }

    fn defer_observe(&self, viewer: ViewerId, pos: ChunkPos) {
        if let Some(handle) = self.spawn_observe(viewer, pos) {
            let mut pending = self.pending.lock();
            pending.retain(|handle| !handle.is_finished());
            pending.push(handle);
        }
    }

    /// Waits for every deferred hook evaluation started so far.
    pub async fn flush(&self) {
        let pending = std::mem::take(&mut *self.pending.lock());
        for handle in pending {
            if let Err(e) = handle.await {
                warn!("Deferred conversion hook failed: {}", e);
            }
        }
    }

    /// Periodically drops cached conversions for unloaded chunks. The task
    /// ends once the pipeline is dropped.
    pub fn spawn_eviction_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let pipeline = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = interval(period);
            loop {
                interval.tick().await;
                let Some(pipeline) = pipeline.upgrade() else {
                    break;
                };
                let translator = &pipeline.translator;
                let removed = translator.cache().retain_loaded(translator.world().as_ref());
                if removed > 0 {
                    info!("Evicted {} conversions for unloaded chunks", removed);
                }
            }
        })
    }
}
