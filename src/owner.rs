/// Globally-unique identifier for any entity that owns a backend physics body
/// (characters, voxel fields, moving platforms).
///
/// # Why this exists
/// The backend hands us opaque body handles in raycast hits and contact
/// callbacks; gameplay code needs to resolve those back to entities. To keep a
/// single scalar key, the per-kind entity id and the kind tag are packed into
/// one `u128`.
///
/// # Bit layout
/// This `u128` is a packed value with the following layout (least-significant
/// bit = bit 0):
///
/// - bits 0..=63   : `owner_id` (u64)
/// - bits 64..=71  : `OwnerKind` tag (u8)
/// - bits 72..=127 : reserved (must be zero for now)
///
/// # Invariants
/// - Two different `(owner_id, kind)` pairs must never produce the same
///   `Owner`.
/// - Reserved bits must remain zero.
pub type Owner = u128;

/// The per-kind unique id of a specific owner.
pub type OwnerId = u64;

/// Discriminator for the kind of entity referenced by an [`Owner`].
///
/// The numeric values of this enum are part of the packed-id format. Do not
/// reorder or reuse values.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OwnerKind {
    Character = 1,
    VoxelField = 2,
    Platform = 3,
}

/// Packs an [`OwnerKind`] and a per-kind `owner_id` into a globally-unique
/// [`Owner`].
#[inline]
pub fn pack_owner(id: OwnerId, kind: OwnerKind) -> Owner {
    (id as u128) | ((kind as u128) << OwnerId::BITS)
}

/// Extracts the [`OwnerKind`] encoded in an [`Owner`].
///
/// # Panics
/// Panics if the kind tag is unknown. Prefer [`try_unpack_owner_kind`] at
/// boundaries where corrupted ids are possible.
pub fn unpack_owner_kind(owner: Owner) -> OwnerKind {
    try_unpack_owner_kind(owner).expect("Unsupported OwnerKind.")
}

/// Safely extracts the [`OwnerKind`] from an [`Owner`].
///
/// Returns `None` if the tag is unknown (e.g. data corruption or mismatched
/// packing rules across versions).
pub fn try_unpack_owner_kind(owner: Owner) -> Option<OwnerKind> {
    const KIND_MASK: u128 = u8::MAX as u128;
    let tag = ((owner >> OwnerId::BITS) & KIND_MASK) as u8;

    match tag {
        1u8 => Some(OwnerKind::Character),
        2u8 => Some(OwnerKind::VoxelField),
        3u8 => Some(OwnerKind::Platform),
        _ => None,
    }
}

/// Extracts the [`OwnerId`] from an [`Owner`].
///
/// Note: this does not validate the kind tag.
pub fn unpack_owner_id(owner: Owner) -> OwnerId {
    const ID_MASK: u128 = u64::MAX as u128;
    (owner & ID_MASK) as OwnerId
}

/// Validates that an [`Owner`] conforms to the current packing contract.
///
/// Checks:
/// - kind tag is recognized
/// - reserved bits (72..=127) are zero
pub fn validate_owner(owner: Owner) -> Result<(), &'static str> {
    const RESERVED_MASK: u128 = !0u128 << 72;
    if (owner & RESERVED_MASK) != 0 {
        return Err("Owner reserved bits are non-zero");
    }
    if try_unpack_owner_kind(owner).is_none() {
        return Err("Owner has unknown kind tag");
    }
    Ok(())
}
