#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Full and delta synchronisation of game state.
//!
//! A frame starts with the `FSSY` magic, the protocol version and the full
//! flag, then carries the global record followed by the players,
//! inventories, buildings, flags and serfs collections in that order. Each
//! collection is written as
//!
//! ```text
//! [free count][free index ...][object count][index ...][object data ...]
//! ```
//!
//! where every object's data is a field mask followed by the masked fields.
//! Integers use the variable-length encoding of [`freeserf_world::codec`].
//!
//! Reading a frame is atomic: the whole payload is decoded against copies of
//! the local records before anything in the game changes.

mod saved;

use std::collections::BTreeSet;

use freeserf_world::{
    codec::{CodecError, Decoder, Encoder},
    BuildingState, Collection, CollectionError, FlagState, Game, GameObject, GameState, InventoryState, Object,
    PlayerState, PostDeserialize, Record, Restored, SerfState,
};

pub use saved::{SavedGameState, SYNC_DELAY};

/// Leading bytes of every frame.
pub const MAGIC: &[u8; 4] = b"FSSY";

/// Protocol version written by this crate.
pub const VERSION: u32 = 1;

/// Errors raised while writing or applying frames.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The payload could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The payload does not start with [`MAGIC`].
    #[error("payload is not a sync frame")]
    BadMagic,
    /// The payload was written by an unknown protocol version.
    #[error("unsupported sync version {version}")]
    UnsupportedVersion {
        /// Version found in the header.
        version: u32,
    },
    /// The frame omits a player the local game still has.
    #[error("sync frame would remove player {index}")]
    PlayerRemoval {
        /// Local player missing from the frame.
        index: u32,
    },
    /// Bytes were left after the last collection.
    #[error("{remaining} unexpected bytes after the last collection")]
    TrailingBytes {
        /// Bytes left over.
        remaining: usize,
    },
    /// A saved frame no longer matches its checksum.
    #[error("sync frame checksum mismatch")]
    ChecksumMismatch,
    /// The frame names an index no collection may hold.
    #[error("sync frame names {kind} index {index}, above the limit")]
    IndexOutOfRange {
        /// Collection name.
        kind: &'static str,
        /// Rejected index.
        index: u32,
    },
    /// A collection refused a change while the frame was applied.
    #[error(transparent)]
    Collection(#[from] CollectionError),
}

/// Header of a decoded frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version.
    pub version: u32,
    /// Whether every field of every record is present.
    pub full: bool,
}

/// What applying a frame changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Local entities removed because the frame no longer lists them.
    pub deleted: usize,
    /// Entities created because the frame listed unknown indices.
    pub inserted: usize,
    /// References cleared because they pointed at missing entities.
    pub dangling: usize,
}

impl SyncReport {
    fn absorb(&mut self, other: SyncReport) {
        self.deleted += other.deleted;
        self.inserted += other.inserted;
        self.dangling += other.dangling;
    }
}

/// Writes and applies sync frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct GameStateSerializer;

impl GameStateSerializer {
    /// Creates a serializer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encodes the game, writing every field when `full` is set and only the
    /// dirty fields otherwise.
    ///
    /// Dirty marks are left untouched; callers reset them once the frame is
    /// acknowledged.
    pub fn serialize(&self, game: &Game, full: bool) -> Result<Vec<u8>, SyncError> {
        let mut out = Encoder::new();
        out.write_raw(MAGIC);
        out.write(&VERSION)?;
        out.write(&full)?;
        game.state().encode(&mut out, full)?;
        write_collection(&mut out, game.players(), full)?;
        write_collection(&mut out, game.inventories(), full)?;
        write_collection(&mut out, game.buildings(), full)?;
        write_collection(&mut out, game.flags(), full)?;
        write_collection(&mut out, game.serfs(), full)?;
        Ok(out.into_bytes())
    }

    /// Applies a frame written by [`GameStateSerializer::serialize`].
    ///
    /// Applied values are not marked dirty. On error the game is unchanged.
    pub fn deserialize(&self, game: &mut Game, bytes: &[u8]) -> Result<SyncReport, SyncError> {
        let frame = parse_frame(game, bytes)?;
        tracing::debug!(full = frame.header.full, bytes = bytes.len(), "applying sync frame");

        *game.state_mut() = frame.state;
        let game = &*game;
        let restored = Restored {
            players: game.players(),
            inventories: game.inventories(),
            buildings: game.buildings(),
            flags: game.flags(),
        };

        let mut report = SyncReport::default();
        report.absorb(apply_collection(game.players(), frame.players, restored)?);
        report.absorb(apply_collection(game.inventories(), frame.inventories, restored)?);
        report.absorb(apply_collection(game.buildings(), frame.buildings, restored)?);
        report.absorb(apply_collection(game.flags(), frame.flags, restored)?);
        report.absorb(apply_collection(game.serfs(), frame.serfs, restored)?);
        Ok(report)
    }

    /// Reads only the header of a frame.
    pub fn peek_header(&self, bytes: &[u8]) -> Result<FrameHeader, SyncError> {
        read_header(&mut Decoder::new(bytes))
    }
}

fn write_collection<S: Record>(
    out: &mut Encoder,
    collection: &Collection<Object<S>>,
    full: bool,
) -> Result<(), SyncError> {
    let free = collection.free_indices();
    out.write_count(free.len())?;
    for index in &free {
        out.write(index)?;
    }

    let handles = collection.to_list();
    out.write_count(handles.len())?;
    for handle in &handles {
        out.write(&handle.read().index())?;
    }
    for handle in &handles {
        handle.read().state().encode(out, full)?;
    }
    Ok(())
}

struct Frame {
    header: FrameHeader,
    state: GameState,
    players: CollectionFrame<PlayerState>,
    inventories: CollectionFrame<InventoryState>,
    buildings: CollectionFrame<BuildingState>,
    flags: CollectionFrame<FlagState>,
    serfs: CollectionFrame<SerfState>,
}

struct CollectionFrame<S> {
    kind: &'static str,
    free: Vec<u32>,
    removed: Vec<u32>,
    objects: Vec<(u32, S)>,
}

fn read_header(input: &mut Decoder<'_>) -> Result<FrameHeader, SyncError> {
    let magic = input.read_raw(MAGIC.len()).map_err(|_| SyncError::BadMagic)?;
    if magic != MAGIC {
        return Err(SyncError::BadMagic);
    }
    let version: u32 = input.read()?;
    if version != VERSION {
        return Err(SyncError::UnsupportedVersion { version });
    }
    let full = input.read()?;
    Ok(FrameHeader { version, full })
}

fn parse_frame(game: &Game, bytes: &[u8]) -> Result<Frame, SyncError> {
    let mut input = Decoder::new(bytes);
    let header = read_header(&mut input)?;

    let mut state = game.state().clone();
    state.decode(&mut input)?;

    let players = parse_collection(&mut input, game.players())?;
    if let Some(&index) = players.removed.first() {
        return Err(SyncError::PlayerRemoval { index });
    }
    let inventories = parse_collection(&mut input, game.inventories())?;
    let buildings = parse_collection(&mut input, game.buildings())?;
    let flags = parse_collection(&mut input, game.flags())?;
    let serfs = parse_collection(&mut input, game.serfs())?;

    if !input.is_empty() {
        return Err(SyncError::TrailingBytes {
            remaining: input.remaining(),
        });
    }
    Ok(Frame {
        header,
        state,
        players,
        inventories,
        buildings,
        flags,
        serfs,
    })
}

fn read_indices<T>(
    input: &mut Decoder<'_>,
    collection: &Collection<T>,
) -> Result<Vec<u32>, SyncError>
where
    T: GameObject,
{
    let count = input.read_count()?;
    let mut indices = Vec::with_capacity(count);
    for _ in 0..count {
        let index = input.read()?;
        if collection.check_index(index).is_err() {
            return Err(SyncError::IndexOutOfRange {
                kind: collection.kind(),
                index,
            });
        }
        indices.push(index);
    }
    Ok(indices)
}

fn parse_collection<S: Record>(
    input: &mut Decoder<'_>,
    collection: &Collection<Object<S>>,
) -> Result<CollectionFrame<S>, SyncError> {
    let free = read_indices(input, collection)?;
    let indices = read_indices(input, collection)?;

    let incoming: BTreeSet<u32> = indices.iter().copied().collect();
    let removed = collection
        .indices()
        .into_iter()
        .filter(|index| !incoming.contains(index))
        .collect();

    let mut objects = Vec::with_capacity(indices.len());
    for index in indices {
        let mut state = collection
            .get(index)
            .map(|handle| handle.read().state().clone())
            .unwrap_or_default();
        state.decode(input)?;
        objects.push((index, state));
    }

    Ok(CollectionFrame {
        kind: collection.kind(),
        free,
        removed,
        objects,
    })
}

fn apply_collection<S: Record>(
    collection: &Collection<Object<S>>,
    frame: CollectionFrame<S>,
    restored: Restored<'_>,
) -> Result<SyncReport, SyncError>
where
    Object<S>: PostDeserialize,
{
    let mut report = SyncReport::default();

    for index in &frame.removed {
        if collection.erase(*index) {
            report.deleted += 1;
        }
    }

    collection.set_free_indices(frame.free.iter().copied())?;

    let mut applied = Vec::with_capacity(frame.objects.len());
    for (index, state) in frame.objects {
        if !collection.contains(index) {
            report.inserted += 1;
        }
        let handle = collection.get_or_insert(index)?;
        *handle.write().state_mut() = state;
        applied.push((index, handle));
    }

    for (index, handle) in applied {
        for dangling in handle.write().post_deserialize(restored) {
            report.dangling += 1;
            tracing::warn!(
                kind = frame.kind,
                index,
                field = dangling.field,
                target = dangling.target,
                "cleared reference to a missing entity"
            );
        }
    }

    collection.set_free_indices(frame.free)?;
    tracing::debug!(
        kind = frame.kind,
        deleted = report.deleted,
        inserted = report.inserted,
        "collection reconciled"
    );
    Ok(report)
}
