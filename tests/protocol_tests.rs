//! Movement encoding and wire message tests

#[cfg(test)]
mod tests {
    use tickworld::entity::{Entity, PlayerProfile};
    use tickworld::protocol::{
        encode_angle, encode_delta, encode_move, ClientEvent, DisconnectReason, JoinRequest,
        MoveUpdate, ServerboundEvent,
    };
    use tickworld::types::{Position, Rotation};
    use uuid::Uuid;

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    #[test]
    fn delta_is_fixed_point() {
        let from = Position::new(0.0, 64.0, 0.0);
        let to = Position::new(1.0, 63.5, 0.25);
        assert_eq!(encode_delta(from, to), Some([4096, -2048, 1024]));
    }

    #[test]
    fn delta_overflow_is_rejected() {
        let from = Position::new(0.0, 0.0, 0.0);
        assert!(encode_delta(from, Position::new(7.99, 0.0, 0.0)).is_some());
        assert!(encode_delta(from, Position::new(8.0, 0.0, 0.0)).is_none());
        assert!(encode_delta(from, Position::new(0.0, 0.0, -8.1)).is_none());
    }

    #[test]
    fn angles_wrap_to_a_byte() {
        assert_eq!(encode_angle(0.0), 0);
        assert_eq!(encode_angle(90.0), 64);
        assert_eq!(encode_angle(180.0), -128);
        assert_eq!(encode_angle(270.0), -64);
        assert_eq!(encode_angle(360.0), 0);
        assert_eq!(encode_angle(-90.0), -64);
    }

    #[test]
    fn move_kind_follows_what_changed() {
        let p0 = Position::new(0.0, 64.0, 0.0);
        let p1 = Position::new(0.5, 64.0, 0.0);
        let r0 = Rotation::new(0.0, 0.0);
        let r1 = Rotation::new(90.0, 0.0);

        assert_eq!(encode_move(p0, p0, r0, r0), None);
        assert_eq!(
            encode_move(p0, p1, r0, r0),
            Some(MoveUpdate::Pos {
                delta: [2048, 0, 0]
            })
        );
        assert_eq!(
            encode_move(p0, p0, r0, r1),
            Some(MoveUpdate::Rot { rot: [64, 0] })
        );
        assert_eq!(
            encode_move(p0, p1, r0, r1),
            Some(MoveUpdate::PosAndRot {
                delta: [2048, 0, 0],
                rot: [64, 0]
            })
        );
        let far = Position::new(100.0, 64.0, 0.0);
        assert_eq!(
            encode_move(p0, far, r0, r0),
            Some(MoveUpdate::Teleport {
                position: far,
                rot: [0, 0],
                rotated: false
            })
        );
    }

    #[test]
    fn take_movement_rolls_the_snapshot() {
        let mut entity = Entity::new(7, Position::new(0.0, 0.0, 0.0), Rotation::default());
        assert_eq!(entity.take_movement(), None);

        entity.position = Position::new(1.0, 0.0, 0.0);
        assert!(entity.has_moved());
        assert!(entity.take_movement().is_some());
        assert!(!entity.has_moved());
        assert_eq!(entity.previous_position(), Position::new(1.0, 0.0, 0.0));
        assert_eq!(entity.take_movement(), None);
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    #[test]
    fn disconnect_reason_messages() {
        assert_eq!(
            DisconnectReason::InvalidPlayerMovement.to_string(),
            "multiplayer.disconnect.invalid_player_movement"
        );
        assert_eq!(DisconnectReason::Kicked("bye".into()).message(), "bye");
    }

    #[test]
    fn events_are_tagged_by_type() {
        let json = serde_json::to_value(ClientEvent::ChunkUnload { x: 1, z: -2 }).unwrap();
        assert_eq!(json["type"], "chunk_unload");
        assert_eq!(json["z"], -2);

        let event: ServerboundEvent = serde_json::from_str(
            r#"{"type":"move_player_pos","x":1.0,"y":2.0,"z":3.0,"on_ground":true}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ServerboundEvent::MovePlayerPos {
                x: 1.0,
                y: 2.0,
                z: 3.0,
                on_ground: true
            }
        );
    }

    #[test]
    fn join_request_uuid_is_optional() {
        let req: JoinRequest = serde_json::from_str(r#"{"name":"steve"}"#).unwrap();
        assert_eq!(req.uuid, None);
    }

    #[test]
    fn offline_profiles_are_stable_name_based_uuids() {
        let a = PlayerProfile::offline("Notch");
        let b = PlayerProfile::offline("Notch");
        let c = PlayerProfile::offline("jeb_");
        assert_eq!(a.uuid, b.uuid);
        assert_ne!(a.uuid, c.uuid);
        assert_eq!(a.uuid.get_version_num(), 3);
        assert_ne!(a.uuid, Uuid::nil());
    }
}
