use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};

use crate::entities::migration_checkpoint::{self, Column, Entity};
use crate::store::RecordStore;

/// 库间迁移断点：记录每张表最后成功迁移的主键，便于中断后续跑。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationCheckpointRow {
    pub table_name: String,
    pub last_migrated_id: String,
    pub migrated_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// 断点写入：与批量行写同一连接（事务）时保证批与断点原子落盘。
pub(crate) async fn upsert_checkpoint_on<C: ConnectionTrait>(
    conn: &C,
    table_name: &str,
    last_migrated_id: &str,
    migrated_count: i64,
) -> Result<()> {
    let am = migration_checkpoint::ActiveModel {
        table_name: Set(table_name.to_string()),
        last_migrated_id: Set(last_migrated_id.to_string()),
        migrated_count: Set(migrated_count),
        updated_at: Set(Utc::now().fixed_offset()),
    };
    Entity::insert(am)
        .on_conflict(
            OnConflict::column(Column::TableName)
                .update_columns([
                    Column::LastMigratedId,
                    Column::MigratedCount,
                    Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(conn)
        .await?;
    Ok(())
}

impl RecordStore {
    pub async fn get_migration_checkpoint(
        &self,
        table_name: &str,
    ) -> Result<Option<MigrationCheckpointRow>> {
        let model = Entity::find_by_id(table_name).one(self.db()).await?;
        Ok(model.map(|m| MigrationCheckpointRow {
            table_name: m.table_name,
            last_migrated_id: m.last_migrated_id,
            migrated_count: m.migrated_count,
            updated_at: m.updated_at.with_timezone(&Utc),
        }))
    }

    pub async fn upsert_migration_checkpoint(
        &self,
        table_name: &str,
        last_migrated_id: &str,
        migrated_count: i64,
    ) -> Result<()> {
        upsert_checkpoint_on(self.db(), table_name, last_migrated_id, migrated_count).await
    }
}
