//! Moving-platform attachment.
//!
//! Lets a character ride smoothly on a moving or rotating body by amortizing
//! the platform's per-tick motion into the character's own movement. The
//! state is fed by backend contact events (one per contact manifold, possibly
//! several per tick) and consumed once per tick by the owning character.

use rapier3d::prelude::RigidBodyHandle;

use crate::types::{Iso, Vec3};

/// Attachment amortization chain.
///
/// Advances at most one stage per tick of continued contact with the same
/// body; deltas start flowing from [`AttachmentStage::FirstDelta`] onward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttachmentStage {
    NoAttachment,
    /// Initial attachment position is recorded.
    InitialAttachment,
    /// First delta position is available; apply it to movement.
    FirstDelta,
    /// Delta positions flow every tick from here on.
    Recurring,
}

/// One contact event forwarded from the backend to a character.
#[derive(Clone, Copy, Debug)]
pub struct PlatformContact {
    /// The body the character touched.
    pub other_body: RigidBodyHandle,
    /// Static bodies can never carry riders.
    pub other_is_static: bool,
    /// The touched body's world pose at contact time.
    pub other_pose: Iso,
    /// The touched body's angular velocity about the world up axis.
    pub other_angvel_y: f32,
    /// Manifold normal pointing from the touched body toward the character
    /// (i.e. the inverted contact normal).
    pub normal_toward_character: Vec3,
    /// World-space contact point on the touched body.
    pub contact_point: Vec3,
}

/// Per-character attachment tracking.
#[derive(Clone, Debug)]
pub struct MovingPlatformAttachment {
    pub stage: AttachmentStage,
    attached_body: Option<RigidBodyHandle>,
    /// Last recorded attachment point in world space.
    attachment_position_world: Vec3,
    /// The same point in the attached body's local space.
    attachment_position_local: Vec3,
    /// The attached body's angular velocity about the up axis.
    pub y_axis_angular_velocity: f32,
    /// Delta position computed for the current tick.
    next_delta_position: Vec3,
    /// Delta position applied on the previous tick.
    pub prev_delta_position: Vec3,
    /// Set each tick after consumption; cleared by an arriving contact. If no
    /// contact clears it, the attachment resets on the next consumption.
    stale: bool,
}

impl Default for MovingPlatformAttachment {
    fn default() -> Self {
        Self::new()
    }
}

impl MovingPlatformAttachment {
    pub fn new() -> Self {
        Self {
            stage: AttachmentStage::NoAttachment,
            attached_body: None,
            attachment_position_world: Vec3::zeros(),
            attachment_position_local: Vec3::zeros(),
            y_axis_angular_velocity: 0.0,
            next_delta_position: Vec3::zeros(),
            prev_delta_position: Vec3::zeros(),
            stale: true,
        }
    }

    /// Feed one backend contact event.
    ///
    /// `capsule_radius` anchors the attachment at the capsule's base-sphere
    /// origin; `cos_max_ground_slope` rejects contacts too steep to stand on.
    pub fn observe_contact(
        &mut self,
        contact: &PlatformContact,
        capsule_radius: f32,
        cos_max_ground_slope: f32,
    ) {
        if contact.other_is_static {
            self.reset();
            return;
        }

        let n = contact.normal_toward_character;
        if n.y < cos_max_ground_slope {
            // Too steep to stand on.
            self.reset();
            return;
        }

        let first_event_this_tick = self.stale;

        if self.stage == AttachmentStage::NoAttachment
            || self.attached_body != Some(contact.other_body)
        {
            // Initial attachment (or a different platform stole the contact).
            self.stage = AttachmentStage::InitialAttachment;
            self.attached_body = Some(contact.other_body);
        } else if first_event_this_tick {
            // One step further along the amortization chain, at most one
            // advance per tick even with several manifolds reported.
            self.stage = match self.stage {
                AttachmentStage::InitialAttachment => AttachmentStage::FirstDelta,
                _ => AttachmentStage::Recurring,
            };

            // Past the initial attachment: measure how much the platform
            // carried the anchor since last tick.
            let carried = contact.other_pose * nalgebra::Point3::from(self.attachment_position_local);
            self.next_delta_position = carried.coords - self.attachment_position_world;
        }

        // Re-anchor at the capsule's base sphere origin.
        self.attachment_position_world = contact.contact_point + n * capsule_radius;
        let local = contact.other_pose.inverse()
            * nalgebra::Point3::from(self.attachment_position_world);
        self.attachment_position_local = local.coords;
        self.y_axis_angular_velocity = contact.other_angvel_y;

        self.stale = false;
    }

    /// Consume the attachment state for this tick.
    ///
    /// Returns the platform delta to fold into the character's movement, or
    /// `None` when no delta applies. A tick without any contact event resets
    /// the attachment here.
    pub fn consume_tick_delta(&mut self) -> Option<Vec3> {
        if self.stale {
            self.reset();
            return None;
        }
        self.stale = true;

        if self.stage >= AttachmentStage::FirstDelta {
            let delta = self.next_delta_position;
            self.prev_delta_position = delta;
            Some(delta)
        } else {
            None
        }
    }

    /// True once deltas flow (facing spin applies from here on).
    #[inline]
    pub fn carries_rider(&self) -> bool {
        self.stage >= AttachmentStage::FirstDelta
    }

    fn reset(&mut self) {
        self.stage = AttachmentStage::NoAttachment;
        self.attached_body = None;
        self.next_delta_position = Vec3::zeros();
        self.prev_delta_position = Vec3::zeros();
        self.y_axis_angular_velocity = 0.0;
        self.stale = true;
    }
}
