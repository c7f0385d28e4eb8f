//! Movement validator and teleport handshake

mod common;

#[cfg(test)]
mod tests {
    use super::common::{player, RecordingClient};
    use tickworld::entity::Player;
    use tickworld::movement::{reconcile, Reconciliation};
    use tickworld::protocol::ClientEvent;
    use tickworld::types::{Position, Rotation};

    const THRESHOLD: f64 = 100.0;

    fn origin_player() -> Player {
        player(1, "mover", Position::new(0.0, 64.0, 0.0), 4)
    }

    fn step(p: &mut Player, client: &RecordingClient) -> Reconciliation {
        let inputs = p.inputs().clone();
        let mut state = inputs.lock();
        reconcile(p, &mut state, client, THRESHOLD)
    }

    #[test]
    fn plausible_move_is_accepted() {
        let client = RecordingClient::new();
        let mut p = origin_player();
        {
            let mut state = p.inputs().lock();
            state.position = Position::new(3.0, 65.0, -2.0);
            state.rotation = Rotation::new(45.0, 10.0);
            state.on_ground = true;
        }
        assert_eq!(step(&mut p, &client), Reconciliation::Accepted);
        assert_eq!(p.position(), Position::new(3.0, 65.0, -2.0));
        assert_eq!(p.rotation(), Rotation::new(45.0, 10.0));
        assert!(p.entity.on_ground);
        assert!(client.events().is_empty());
    }

    #[test]
    fn exactly_threshold_is_accepted() {
        let client = RecordingClient::new();
        let mut p = origin_player();
        p.inputs().lock().position = Position::new(100.0, 64.0, 0.0);
        assert_eq!(step(&mut p, &client), Reconciliation::Accepted);
    }

    #[test]
    fn beyond_threshold_is_corrected() {
        let client = RecordingClient::new();
        let mut p = origin_player();
        p.inputs().lock().position = Position::new(100.5, 64.0, 0.0);

        assert_eq!(
            step(&mut p, &client),
            Reconciliation::Corrected { teleport_id: 1 }
        );
        assert_eq!(p.position(), Position::new(0.0, 64.0, 0.0));
        let pending = p.pending_teleport().unwrap();
        assert_eq!(pending.id, 1);
        assert_eq!(pending.position, Position::new(0.0, 64.0, 0.0));
        assert!(matches!(
            client.events()[0],
            ClientEvent::PlayerPosition { teleport_id: 1, dismount: false, .. }
        ));
    }

    #[test]
    fn only_the_exact_ack_releases() {
        let client = RecordingClient::new();
        let mut p = origin_player();
        p.inputs().lock().position = Position::new(500.0, 64.0, 0.0);
        let Reconciliation::Corrected { teleport_id } = step(&mut p, &client) else {
            panic!("expected a correction");
        };

        for wrong in [teleport_id - 1, teleport_id + 1] {
            p.inputs().lock().teleport_id = wrong;
            assert_eq!(step(&mut p, &client), Reconciliation::Frozen);
            assert!(p.pending_teleport().is_some());
        }

        p.inputs().lock().teleport_id = teleport_id;
        assert_eq!(step(&mut p, &client), Reconciliation::Released);
        assert!(p.pending_teleport().is_none());
        assert_eq!(p.position(), Position::new(0.0, 64.0, 0.0));
        // The stale proposal was replaced by the teleport target.
        assert_eq!(p.inputs().lock().position, Position::new(0.0, 64.0, 0.0));
        assert_eq!(step(&mut p, &client), Reconciliation::Accepted);
        // One correction only.
        assert_eq!(client.teleports(), vec![teleport_id]);
    }

    #[test]
    fn nan_proposals_are_invalid() {
        let client = RecordingClient::new();
        for bad in [
            Position::new(f64::NAN, 64.0, 0.0),
            Position::new(0.0, f64::NAN, 0.0),
            Position::new(1e9, f64::NAN, 0.0),
        ] {
            let mut p = origin_player();
            p.inputs().lock().position = bad;
            assert_eq!(step(&mut p, &client), Reconciliation::Invalid);
            assert_eq!(p.position(), Position::new(0.0, 64.0, 0.0));
        }

        let mut p = origin_player();
        p.inputs().lock().rotation = Rotation::new(f32::NAN, 0.0);
        assert_eq!(step(&mut p, &client), Reconciliation::Invalid);
        // Invalid input never triggers a correction.
        assert!(client.teleports().is_empty());
    }

    #[test]
    fn infinite_proposals_are_corrected_not_invalid() {
        for far in [
            Position::new(f64::INFINITY, 64.0, 0.0),
            Position::new(0.0, f64::INFINITY, 0.0),
            Position::new(0.0, 64.0, f64::NEG_INFINITY),
        ] {
            let client = RecordingClient::new();
            let mut p = origin_player();
            p.inputs().lock().position = far;
            assert_eq!(
                step(&mut p, &client),
                Reconciliation::Corrected { teleport_id: 1 }
            );
            assert_eq!(p.position(), Position::new(0.0, 64.0, 0.0));
            assert_eq!(client.teleports(), vec![1]);
        }
    }

    #[test]
    fn distance_is_checked_before_rotation_validity() {
        let client = RecordingClient::new();
        let mut p = origin_player();
        {
            let mut state = p.inputs().lock();
            state.position = Position::new(500.0, 64.0, 0.0);
            state.rotation = Rotation::new(f32::INFINITY, 0.0);
        }
        assert!(matches!(
            step(&mut p, &client),
            Reconciliation::Corrected { .. }
        ));
    }
}
