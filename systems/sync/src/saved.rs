//! Captured frames awaiting transport or acknowledgement.

use freeserf_core::DEFAULT_GAME_SPEED;
use freeserf_world::Game;
use sha2::{Digest, Sha256};

use crate::{GameStateSerializer, SyncError, SyncReport};

/// Game time between two consistency snapshots (ten seconds at normal speed).
pub const SYNC_DELAY: u32 = 10 * DEFAULT_GAME_SPEED;

/// A serialized frame together with the checksum it was captured with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedGameState {
    full: bool,
    game_time: u32,
    payload: Vec<u8>,
    checksum: [u8; 32],
}

impl SavedGameState {
    /// Serializes `game`, leaving its dirty marks in place.
    pub fn capture(game: &Game, full: bool) -> Result<Self, SyncError> {
        let payload = GameStateSerializer::new().serialize(game, full)?;
        Ok(Self {
            full,
            game_time: game.state().game_time(),
            checksum: checksum(&payload),
            payload,
        })
    }

    /// Rebuilds a frame received from elsewhere, verifying its checksum.
    pub fn from_parts(payload: Vec<u8>, checksum_bytes: [u8; 32]) -> Result<Self, SyncError> {
        if checksum(&payload) != checksum_bytes {
            return Err(SyncError::ChecksumMismatch);
        }
        let header = GameStateSerializer::new().peek_header(&payload)?;
        Ok(Self {
            full: header.full,
            game_time: 0,
            payload,
            checksum: checksum_bytes,
        })
    }

    /// Applies the frame to `game` after re-checking its checksum.
    pub fn apply(&self, game: &mut Game) -> Result<SyncReport, SyncError> {
        if checksum(&self.payload) != self.checksum {
            return Err(SyncError::ChecksumMismatch);
        }
        GameStateSerializer::new().deserialize(game, &self.payload)
    }

    /// Clears the dirty marks of `game` once a captured frame was delivered.
    pub fn acknowledge(game: &mut Game) {
        game.reset_dirty();
    }

    /// Reports whether the caller should take a consistency snapshot now.
    ///
    /// True while the game still advances towards a scheduled time that is a
    /// multiple of [`SYNC_DELAY`].
    #[must_use]
    pub fn time_to_sync(game: &Game) -> bool {
        let next = game.next_game_time();
        game.state().game_time() < next && next % SYNC_DELAY == 0
    }

    /// Whether the frame carries every field.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Game time at capture, or zero for frames rebuilt with
    /// [`SavedGameState::from_parts`].
    #[must_use]
    pub fn game_time(&self) -> u32 {
        self.game_time
    }

    /// Serialized frame.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// SHA-256 of the payload at capture.
    #[must_use]
    pub fn checksum(&self) -> [u8; 32] {
        self.checksum
    }
}

fn checksum(payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_at(game_time: u32, next_game_time_ticks: u32) -> Game {
        let mut game = Game::new(3).expect("valid size");
        game.state_mut().set_game_time(game_time);
        game.state_mut().set_game_speed(1);
        game.schedule(next_game_time_ticks.saturating_sub(game_time));
        game.state_mut().set_game_speed(DEFAULT_GAME_SPEED);
        game
    }

    #[test]
    fn sync_delay_is_twenty_at_default_speed() {
        assert_eq!(SYNC_DELAY, 20);
    }

    #[test]
    fn sync_gate_opens_just_before_a_multiple() {
        assert!(SavedGameState::time_to_sync(&game_at(19, 20)));
        assert!(!SavedGameState::time_to_sync(&game_at(20, 20)));
        assert!(!SavedGameState::time_to_sync(&game_at(19, 21)));
    }

    #[test]
    fn tampered_payloads_are_refused() {
        let mut game = Game::new(3).expect("valid size");
        let _ = game.add_player(0, [1, 2, 3]);
        let saved = SavedGameState::capture(&game, true).expect("encode");

        let mut payload = saved.payload().to_vec();
        let last = payload.len() - 1;
        payload[last] ^= 0xff;
        assert!(matches!(
            SavedGameState::from_parts(payload, saved.checksum()),
            Err(SyncError::ChecksumMismatch)
        ));

        let rebuilt = SavedGameState::from_parts(saved.payload().to_vec(), saved.checksum())
            .expect("intact payload");
        assert!(rebuilt.is_full());
    }
}
