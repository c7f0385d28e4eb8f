//! Chunk data and storage provider tests

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use tickworld::chunk::{BlockState, Chunk, ChunkStatus, LoadedChunk, Section, SECTION_VOLUME};
    use tickworld::entity::{EntityIdAllocator, PlayerProfile};
    use tickworld::error::StorageError;
    use tickworld::limiter::RateLimiter;
    use tickworld::provider::{
        ChunkProvider, DirChunkProvider, DirPlayerProvider, MemoryChunkProvider,
        MemoryPlayerProvider, PlayerData, PlayerProvider,
    };
    use tickworld::types::{ChunkPos, Position, Rotation};
    use tickworld::viewer::ViewerId;
    use uuid::Uuid;

    // -----------------------------------------------------------------------
    // Chunk data
    // -----------------------------------------------------------------------

    #[test]
    fn placeholder_is_full_and_uniform() {
        let chunk = Chunk::placeholder(24, BlockState::STONE);
        assert_eq!(chunk.status, ChunkStatus::Full);
        assert_eq!(chunk.sections.len(), 24);
        assert!(chunk.sections.iter().all(Section::is_uniform));
        assert_eq!(chunk.sections[23].block(SECTION_VOLUME - 1), BlockState::STONE);
    }

    #[test]
    fn section_expands_on_first_distinct_write() {
        let mut section = Section::filled(BlockState::AIR);
        section.set_block(7, BlockState::AIR);
        assert!(section.is_uniform());

        section.set_block(7, BlockState::STONE);
        assert!(!section.is_uniform());
        assert_eq!(section.block(7), BlockState::STONE);
        assert_eq!(section.block(8), BlockState::AIR);

        section.set_block(9, BlockState(42));
        assert_eq!(section.block(9), BlockState(42));
        assert_eq!(section.block(7), BlockState::STONE);
    }

    #[test]
    fn loaded_chunk_tracks_viewers() {
        let loaded = LoadedChunk::new(Chunk::empty(1));
        loaded.add_viewer(ViewerId(1));
        loaded.add_viewer(ViewerId(2));
        assert_eq!(loaded.viewer_count(), 2);
        assert!(loaded.remove_viewer(ViewerId(1)));
        assert!(!loaded.remove_viewer(ViewerId(1)));
        assert!(loaded.has_viewer(ViewerId(2)));
        assert_eq!(loaded.viewers(), vec![ViewerId(2)]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn loaded_chunk_rejects_duplicate_viewer() {
        let loaded = LoadedChunk::new(Chunk::empty(1));
        loaded.add_viewer(ViewerId(1));
        loaded.add_viewer(ViewerId(1));
    }

    // -----------------------------------------------------------------------
    // Chunk providers
    // -----------------------------------------------------------------------

    #[test]
    fn memory_provider_distinguishes_missing_and_limited() {
        let provider = MemoryChunkProvider::with_limiter(RateLimiter::new(
            Duration::from_secs(3600),
            1,
        ));
        let err = provider.get_chunk(ChunkPos::new(0, 0)).unwrap_err();
        assert!(err.is_not_exist());
        let err = provider.get_chunk(ChunkPos::new(0, 0)).unwrap_err();
        assert!(matches!(err, StorageError::RateLimited));
    }

    #[test]
    fn dir_provider_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirChunkProvider::new(dir.path().join("region"), None);
        let pos = ChunkPos::new(-3, 7);

        assert!(provider.get_chunk(pos).unwrap_err().is_not_exist());

        let mut chunk = Chunk::placeholder(2, BlockState::STONE);
        chunk.sections[1].set_block(0, BlockState::AIR);
        provider.put_chunk(pos, &chunk).unwrap();

        assert!(provider.path_for(pos).ends_with("c.-3.7.json"));
        assert_eq!(provider.get_chunk(pos).unwrap(), chunk);
    }

    #[test]
    fn dir_provider_reports_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirChunkProvider::new(dir.path(), None);
        let pos = ChunkPos::new(0, 0);
        std::fs::write(provider.path_for(pos), b"{not json").unwrap();
        assert!(matches!(
            provider.get_chunk(pos),
            Err(StorageError::Codec(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Player providers
    // -----------------------------------------------------------------------

    #[test]
    fn get_player_hydrates_stored_data() {
        let provider = MemoryPlayerProvider::new();
        let uuid = Uuid::new_v4();
        let data = PlayerData {
            position: Position::new(1.0, 2.0, 3.0),
            rotation: Rotation::new(90.0, 0.0),
            game_mode: 0,
        };
        provider.save_player(uuid, &data).unwrap();

        let ids = EntityIdAllocator::new();
        let player = provider
            .get_player(PlayerProfile::new("steve", uuid), &ids, 6)
            .unwrap();
        assert_eq!(player.id(), 1);
        assert_eq!(player.position(), data.position);
        assert_eq!(player.game_mode, 0);
        assert_eq!(player.view_distance, 6);
        assert_eq!(player.chunk_pos, ChunkPos::new(0, 0));
    }

    #[test]
    fn get_player_missing_does_not_consume_an_id() {
        let provider = MemoryPlayerProvider::new();
        let ids = EntityIdAllocator::new();
        let err = provider
            .get_player(PlayerProfile::new("alex", Uuid::new_v4()), &ids, 6)
            .unwrap_err();
        assert!(err.is_not_exist());
        assert_eq!(ids.allocate(), 1);
    }

    #[test]
    fn dir_player_provider_persists_json() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirPlayerProvider::new(dir.path().join("playerdata"));
        let uuid = Uuid::new_v4();
        assert!(provider.load_player(uuid).unwrap_err().is_not_exist());

        let data = PlayerData {
            position: Position::new(-5.5, 70.0, 12.25),
            rotation: Rotation::new(180.0, -30.0),
            game_mode: 1,
        };
        provider.save_player(uuid, &data).unwrap();
        assert!(dir
            .path()
            .join("playerdata")
            .join(format!("{uuid}.json"))
            .exists());
        assert_eq!(provider.load_player(uuid).unwrap(), data);
    }
}
