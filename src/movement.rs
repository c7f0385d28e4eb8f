//! Reconciles a client's proposed pose with the authoritative one.
//!
//! ```text
//!            proposal finite, within threshold
//!   Free ─────────────────────────────────────► Free (pose accepted)
//!    │ proposal farther than threshold
//!    ▼
//!   Frozen(id) ── ack with a different id ──► Frozen(id)
//!    │ ack with exactly `id`
//!    ▼
//!   Free (pose snapped to the teleport target)
//! ```
//!
//! A proposal that is within range but not finite (NaN anywhere, or a
//! non-finite rotation) is a protocol violation and ends the connection.

use log::info;

use crate::entity::{InputState, Player, TeleportRequest};
use crate::viewer::Client;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// A teleport is outstanding and has not been confirmed; input ignored.
    Frozen,
    /// The outstanding teleport was confirmed and applied.
    Released,
    /// The proposal jumped too far; a teleport back was issued.
    Corrected { teleport_id: i32 },
    /// The proposal became the authoritative pose.
    Accepted,
    /// The proposal was NaN or infinite.
    Invalid,
}

/// Apply one tick's worth of client input to `player`.
///
/// `threshold` is inclusive: a move of exactly that distance is accepted.
pub fn reconcile(
    player: &mut Player,
    inputs: &mut InputState,
    client: &dyn Client,
    threshold: f64,
) -> Reconciliation {
    if let Some(request) = player.teleport {
        if inputs.teleport_id != request.id {
            return Reconciliation::Frozen;
        }
        player.entity.position = request.position;
        player.entity.rotation = request.rotation;
        player.teleport = None;
        // Whatever was proposed before the confirmation is stale.
        inputs.position = request.position;
        inputs.rotation = request.rotation;
        return Reconciliation::Released;
    }

    // An infinite component is simply very far away; NaN compares false
    // and falls through to the validity check.
    let current = player.entity.position;
    if current.distance(&inputs.position) > threshold {
        let rotation = player.entity.rotation;
        let id = client.send_player_position(current, rotation, false);
        player.teleport = Some(TeleportRequest {
            id,
            position: current,
            rotation,
        });
        return Reconciliation::Corrected { teleport_id: id };
    }

    if !inputs.position.is_valid() || !inputs.rotation.is_valid() {
        info!(
            "Player {} move invalid: {} yaw={} pitch={}",
            player.name(),
            inputs.position,
            inputs.rotation.yaw,
            inputs.rotation.pitch,
        );
        return Reconciliation::Invalid;
    }

    player.entity.position = inputs.position;
    player.entity.rotation = inputs.rotation;
    player.entity.on_ground = inputs.on_ground;
    Reconciliation::Accepted
}
