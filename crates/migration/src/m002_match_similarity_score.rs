use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m002_match_similarity_score"
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

// 文本匹配先上线，向量相似度分数后补；历史行保持 NULL。
const UP_SQL: &str = "
ALTER TABLE incident_product_matches ADD COLUMN similarity_score REAL;
ALTER TABLE incident_use_case_matches ADD COLUMN similarity_score REAL;
ALTER TABLE entity_product_matches ADD COLUMN similarity_score REAL;
ALTER TABLE use_case_product_matches ADD COLUMN similarity_score REAL;
";
