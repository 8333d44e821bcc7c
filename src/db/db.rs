use sqlx::{Pool, Postgres};

use super::{memberdb::MemberExt, referraldb::ReferralExt, syncdb::SyncExt};

#[derive(Debug, Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

/// The full storage surface the referral pipeline consumes, as one
/// object-safe trait so services can run against an in-memory double.
pub trait ReferralStore: ReferralExt + MemberExt + SyncExt + Send + Sync {}

impl<T> ReferralStore for T where T: ReferralExt + MemberExt + SyncExt + Send + Sync {}
