use freeserf_core::{MapObject, MapPos, TerrainView, MAX_HEIGHT};
use freeserf_world::{Map, MapError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Height every generated map starts from.
const BASE_HEIGHT: u32 = 8;

/// Height lost per tile of distance from a hill summit.
const HILL_FALLOFF: u32 = 2;

/// One tile in this many carries a tree.
const TREE_RARITY: u32 = 12;

/// Builds a rolling terrain with scattered trees from `seed`.
///
/// Neighbouring heights never differ by more than [`HILL_FALLOFF`], so every
/// step stays walkable. The tiles in `keep_clear` receive no tree.
pub(crate) fn generate(size: u32, seed: u64, keep_clear: &[MapPos]) -> Result<Map, MapError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut map = Map::new(size)?;
    let geometry = map.geometry().clone();

    let hill_count = geometry.tile_count() / 256 + 1;
    let hills: Vec<(MapPos, u32)> = (0..hill_count)
        .map(|_| {
            let pos = geometry.pos(
                rng.gen_range(0..geometry.columns()),
                rng.gen_range(0..geometry.rows()),
            );
            (pos, rng.gen_range(BASE_HEIGHT..=MAX_HEIGHT))
        })
        .collect();

    for pos in geometry.positions() {
        let height = hills
            .iter()
            .map(|&(summit, peak)| {
                peak.saturating_sub(HILL_FALLOFF * geometry.distance(summit, pos))
            })
            .fold(BASE_HEIGHT, u32::max);
        map.set_height(pos, height)?;

        if !keep_clear.contains(&pos) && rng.gen_ratio(1, TREE_RARITY) {
            map.set_object(pos, MapObject::Tree);
        }
    }
    tracing::debug!(size, seed, hills = hills.len(), "terrain generated");
    Ok(map)
}
