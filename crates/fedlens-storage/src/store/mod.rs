use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Order};
use serde::{Deserialize, Serialize};

pub mod agency;
pub mod checkpoint;
pub mod entity;
pub mod incident;
pub mod matches;
pub mod org;
pub mod product;
pub mod use_case;

// ---- 公开 Row/Filter 类型（从各子模块重新导出）----
pub use agency::{
    AgencyProfileFilter, AgencyProfileRow, AgencySummary, AgencyToolInput, AgencyToolRow,
};
pub use entity::{EntityFilter, EntityRow, IncidentEntityLink};
pub use incident::{IncidentFilter, IncidentRow, IncidentSecurityRow, IncidentSort, IncidentSummary};
pub use checkpoint::MigrationCheckpointRow;
pub use matches::{MatchRow, MatchSummary};
pub use org::OrganizationRow;
pub use product::{
    AuthorizationRow, ProductFilter, ProductRow, ProductSort, ProductSummary, ServiceAnalysisRow,
};
pub use use_case::{
    UseCaseDetailRow, UseCaseFilter, UseCaseRow, UseCaseSort, UseCaseSummary, UseCaseUpdate,
};

/// 列表排序方向
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Order {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// 报表数据库的统一访问层。
///
/// 所有方法均为 `async fn`，底层使用 SeaORM。连接在进程启动时创建一次，
/// 显式注入到各 handler 与批量导入任务，不使用全局单例。
pub struct RecordStore {
    pub(crate) db: DatabaseConnection,
}

impl RecordStore {
    /// 连接并初始化数据库。
    ///
    /// - `db_url`：完整的数据库连接 URL，由调用方（服务器配置）提供。
    ///   SQLite 示例：`sqlite:///data/fedlens.db?mode=rwc`
    ///
    /// 自动运行 `sea-orm-migration` 迁移，确保 Schema 最新。
    pub async fn new(db_url: &str) -> Result<Self> {
        let db = Database::connect(db_url).await?;

        // WAL 模式仅对 SQLite 有效
        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
            db.execute_unprepared("PRAGMA foreign_keys=ON;").await?;
        }

        Migrator::up(&db, None).await?;
        tracing::debug!("Record store connected, migrations applied");
        Ok(Self { db })
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
