use crate::models::DieselUlid;

/// Maps a user id to the 64-bit key `pg_advisory_xact_lock` takes. Folds the
/// ULID's 16 bytes with FNV-1a; a collision just serializes two unrelated
/// users' Send Pipeline runs against each other, which is safe, only more
/// conservative than strictly required.
pub fn advisory_lock_key(user_id: DieselUlid) -> i64 {
    let bytes = user_id.inner().to_bytes();
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash as i64
}
