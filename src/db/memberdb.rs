// db/memberdb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::db::DBClient;

use crate::models::membermodel::Member;

const MEMBER_COLUMNS: &str = "id, first_name, phone, email, external_client_id, created_at";

#[async_trait]
pub trait MemberExt {
    async fn get_member(&self, member_id: Uuid) -> Result<Option<Member>, sqlx::Error>;

    async fn get_member_by_phone(&self, phone_last10: &str)
        -> Result<Option<Member>, sqlx::Error>;

    /// Persist the scheduling provider's client id once discovered.
    async fn link_member_external_client(
        &self,
        member_id: Uuid,
        external_client_id: &str,
    ) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl MemberExt for DBClient {
    async fn get_member(&self, member_id: Uuid) -> Result<Option<Member>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE id = $1"
        ))
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_member_by_phone(
        &self,
        phone_last10: &str,
    ) -> Result<Option<Member>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            r#"
            SELECT {MEMBER_COLUMNS} FROM members
            WHERE RIGHT(regexp_replace(COALESCE(phone, ''), '\D', '', 'g'), 10) = $1
            LIMIT 1
            "#
        ))
        .bind(phone_last10)
        .fetch_optional(&self.pool)
        .await
    }

    async fn link_member_external_client(
        &self,
        member_id: Uuid,
        external_client_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE members SET external_client_id = $2 WHERE id = $1")
            .bind(member_id)
            .bind(external_client_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
