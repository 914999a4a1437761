use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m003_organization_paths"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Ok(())
    }
}

// Materialized path for ancestor/descendant queries. Backfill covers the
// three levels the tree actually has (department / sub-agency / office).
const UP_SQL: &str = "
ALTER TABLE federal_organizations ADD COLUMN path TEXT NOT NULL DEFAULT '';
ALTER TABLE federal_organizations ADD COLUMN depth INTEGER NOT NULL DEFAULT 0;

UPDATE federal_organizations SET path = '/' || id, depth = 0
WHERE parent_id IS NULL;

UPDATE federal_organizations SET
    path = (SELECT p.path FROM federal_organizations p WHERE p.id = federal_organizations.parent_id) || '/' || id,
    depth = 1
WHERE parent_id IN (SELECT id FROM federal_organizations WHERE parent_id IS NULL);

UPDATE federal_organizations SET
    path = (SELECT p.path FROM federal_organizations p WHERE p.id = federal_organizations.parent_id) || '/' || id,
    depth = (SELECT p.depth FROM federal_organizations p WHERE p.id = federal_organizations.parent_id) + 1
WHERE path = '';

CREATE INDEX IF NOT EXISTS idx_fed_orgs_path ON federal_organizations(path);
";
