use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 按依赖顺序建表
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
PRAGMA journal_mode=WAL;

CREATE TABLE IF NOT EXISTS federal_organizations (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    short_name TEXT,
    abbreviation TEXT,
    level INTEGER NOT NULL DEFAULT 0,
    parent_id TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_fed_orgs_name ON federal_organizations(name);
CREATE INDEX IF NOT EXISTS idx_fed_orgs_parent ON federal_organizations(parent_id);
CREATE INDEX IF NOT EXISTS idx_fed_orgs_abbrev ON federal_organizations(abbreviation);

CREATE TABLE IF NOT EXISTS ai_use_cases (
    id TEXT PRIMARY KEY NOT NULL,
    use_case_name TEXT NOT NULL,
    agency TEXT NOT NULL,
    agency_abbreviation TEXT,
    bureau TEXT,
    topic_area TEXT,
    intended_purpose TEXT,
    outputs TEXT,
    stage_of_development TEXT,
    rights_safety_impacting TEXT,
    domain_category TEXT,
    date_initiated TEXT,
    date_implemented TEXT,
    date_retired TEXT,
    has_llm INTEGER NOT NULL DEFAULT 0,
    has_genai INTEGER NOT NULL DEFAULT 0,
    has_chatbot INTEGER NOT NULL DEFAULT 0,
    has_coding_assistant INTEGER NOT NULL DEFAULT 0,
    has_coding_agent INTEGER NOT NULL DEFAULT 0,
    has_classic_ml INTEGER NOT NULL DEFAULT 0,
    has_rpa INTEGER NOT NULL DEFAULT 0,
    has_rules INTEGER NOT NULL DEFAULT 0,
    providers_detected TEXT NOT NULL DEFAULT '[]',
    commercial_product TEXT,
    slug TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_use_cases_agency ON ai_use_cases(agency);
CREATE INDEX IF NOT EXISTS idx_use_cases_domain ON ai_use_cases(domain_category);
CREATE INDEX IF NOT EXISTS idx_use_cases_stage ON ai_use_cases(stage_of_development);
CREATE INDEX IF NOT EXISTS idx_use_cases_genai ON ai_use_cases(has_genai);
CREATE INDEX IF NOT EXISTS idx_use_cases_llm ON ai_use_cases(has_llm);
CREATE INDEX IF NOT EXISTS idx_use_cases_slug ON ai_use_cases(slug);

CREATE TABLE IF NOT EXISTS use_case_details (
    use_case_id TEXT PRIMARY KEY NOT NULL,
    development_approach TEXT,
    procurement_instrument TEXT,
    supports_hisp TEXT,
    disseminates_to_public TEXT,
    involves_pii TEXT,
    privacy_assessed TEXT,
    has_custom_code TEXT,
    code_link TEXT,
    has_ato TEXT,
    system_name TEXT,
    impact_assessment TEXT,
    operational_testing TEXT,
    key_risks TEXT,
    performance_monitoring TEXT,
    autonomous_decision TEXT,
    fallback_process TEXT,
    opt_out_mechanism TEXT,
    search_text TEXT,
    FOREIGN KEY (use_case_id) REFERENCES ai_use_cases(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY NOT NULL,
    fedramp_id TEXT NOT NULL UNIQUE,
    provider_name TEXT NOT NULL,
    offering_name TEXT NOT NULL,
    service_model TEXT,
    status TEXT NOT NULL DEFAULT 'authorized',
    authorization_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_products_provider ON products(provider_name);
CREATE INDEX IF NOT EXISTS idx_products_status ON products(status);

CREATE TABLE IF NOT EXISTS service_analyses (
    id TEXT PRIMARY KEY NOT NULL,
    fedramp_id TEXT NOT NULL UNIQUE,
    has_ai_features INTEGER NOT NULL DEFAULT 0,
    has_llm INTEGER NOT NULL DEFAULT 0,
    has_chatbot INTEGER NOT NULL DEFAULT 0,
    has_classic_ml INTEGER NOT NULL DEFAULT 0,
    ai_summary TEXT,
    analyzed_at TEXT NOT NULL,
    FOREIGN KEY (fedramp_id) REFERENCES products(fedramp_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS product_authorizations (
    id TEXT PRIMARY KEY NOT NULL,
    fedramp_id TEXT NOT NULL,
    organization_id TEXT,
    parent_agency_name TEXT NOT NULL,
    sub_agency_name TEXT NOT NULL DEFAULT '',
    ato_issuance_date TEXT,
    ato_expiration_date TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(fedramp_id, parent_agency_name, sub_agency_name)
);
CREATE INDEX IF NOT EXISTS idx_authorizations_fedramp ON product_authorizations(fedramp_id);
CREATE INDEX IF NOT EXISTS idx_authorizations_org ON product_authorizations(organization_id);

CREATE TABLE IF NOT EXISTS agency_ai_profiles (
    id TEXT PRIMARY KEY NOT NULL,
    agency_name TEXT NOT NULL,
    abbreviation TEXT,
    slug TEXT NOT NULL UNIQUE,
    department_level_name TEXT,
    parent_abbreviation TEXT,
    organization_id TEXT,
    deployment_status TEXT NOT NULL DEFAULT 'no_public_internal_assistant',
    has_staff_chatbot INTEGER NOT NULL DEFAULT 0,
    has_coding_assistant INTEGER NOT NULL DEFAULT 0,
    has_document_automation INTEGER NOT NULL DEFAULT 0,
    tool_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agency_profiles_status ON agency_ai_profiles(deployment_status);
CREATE INDEX IF NOT EXISTS idx_agency_profiles_org ON agency_ai_profiles(organization_id);

CREATE TABLE IF NOT EXISTS agency_ai_tools (
    id TEXT PRIMARY KEY NOT NULL,
    agency_profile_id TEXT NOT NULL,
    product_name TEXT NOT NULL,
    product_type TEXT NOT NULL DEFAULT 'none_identified',
    slug TEXT NOT NULL,
    available_to_all_staff TEXT,
    is_pilot_or_limited INTEGER NOT NULL DEFAULT 0,
    internal_or_sensitive_data TEXT,
    citation_chicago TEXT,
    citation_accessed_date TEXT,
    citation_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (agency_profile_id) REFERENCES agency_ai_profiles(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_agency_tools_profile ON agency_ai_tools(agency_profile_id);
CREATE INDEX IF NOT EXISTS idx_agency_tools_type ON agency_ai_tools(product_type);

CREATE TABLE IF NOT EXISTS incidents (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    occurred_on TEXT,
    deployers TEXT NOT NULL DEFAULT '[]',
    developers TEXT NOT NULL DEFAULT '[]',
    harmed_parties TEXT NOT NULL DEFAULT '[]',
    source_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_incidents_occurred ON incidents(occurred_on);

CREATE TABLE IF NOT EXISTS incident_security (
    incident_id TEXT PRIMARY KEY NOT NULL,
    is_data_leak INTEGER NOT NULL DEFAULT 0,
    is_attack INTEGER NOT NULL DEFAULT 0,
    attack_type TEXT,
    leak_type TEXT,
    taxonomy TEXT,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (incident_id) REFERENCES incidents(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    normalized_name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entities_normalized ON entities(normalized_name);

CREATE TABLE IF NOT EXISTS incident_entities (
    id TEXT PRIMARY KEY NOT NULL,
    incident_id TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (incident_id) REFERENCES incidents(id) ON DELETE CASCADE,
    FOREIGN KEY (entity_id) REFERENCES entities(id) ON DELETE CASCADE
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_incident_entities_uniq ON incident_entities(incident_id, entity_id, role);
CREATE INDEX IF NOT EXISTS idx_incident_entities_entity ON incident_entities(entity_id);

CREATE TABLE IF NOT EXISTS incident_product_matches (
    id TEXT PRIMARY KEY NOT NULL,
    incident_id TEXT NOT NULL,
    fedramp_id TEXT NOT NULL,
    match_type TEXT NOT NULL,
    confidence TEXT NOT NULL CHECK(confidence IN ('high', 'medium', 'low')),
    match_reason TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(incident_id, fedramp_id)
);
CREATE INDEX IF NOT EXISTS idx_inc_prod_matches_product ON incident_product_matches(fedramp_id);

CREATE TABLE IF NOT EXISTS incident_use_case_matches (
    id TEXT PRIMARY KEY NOT NULL,
    incident_id TEXT NOT NULL,
    use_case_id TEXT NOT NULL,
    match_type TEXT NOT NULL,
    confidence TEXT NOT NULL CHECK(confidence IN ('high', 'medium', 'low')),
    match_reason TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(incident_id, use_case_id)
);
CREATE INDEX IF NOT EXISTS idx_inc_uc_matches_use_case ON incident_use_case_matches(use_case_id);

CREATE TABLE IF NOT EXISTS entity_product_matches (
    id TEXT PRIMARY KEY NOT NULL,
    entity_id TEXT NOT NULL,
    fedramp_id TEXT NOT NULL,
    match_type TEXT NOT NULL,
    confidence TEXT NOT NULL CHECK(confidence IN ('high', 'medium', 'low')),
    match_reason TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(entity_id, fedramp_id)
);
CREATE INDEX IF NOT EXISTS idx_ent_prod_matches_product ON entity_product_matches(fedramp_id);

CREATE TABLE IF NOT EXISTS use_case_product_matches (
    id TEXT PRIMARY KEY NOT NULL,
    use_case_id TEXT NOT NULL,
    fedramp_id TEXT NOT NULL,
    match_type TEXT NOT NULL,
    confidence TEXT NOT NULL CHECK(confidence IN ('high', 'medium', 'low')),
    match_reason TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(use_case_id, fedramp_id)
);
CREATE INDEX IF NOT EXISTS idx_uc_prod_matches_product ON use_case_product_matches(fedramp_id);

CREATE TABLE IF NOT EXISTS migration_checkpoints (
    table_name TEXT PRIMARY KEY NOT NULL,
    last_migrated_id TEXT NOT NULL,
    migrated_count INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS migration_checkpoints;
DROP TABLE IF EXISTS use_case_product_matches;
DROP TABLE IF EXISTS entity_product_matches;
DROP TABLE IF EXISTS incident_use_case_matches;
DROP TABLE IF EXISTS incident_product_matches;
DROP TABLE IF EXISTS incident_entities;
DROP TABLE IF EXISTS entities;
DROP TABLE IF EXISTS incident_security;
DROP TABLE IF EXISTS incidents;
DROP TABLE IF EXISTS agency_ai_tools;
DROP TABLE IF EXISTS agency_ai_profiles;
DROP TABLE IF EXISTS product_authorizations;
DROP TABLE IF EXISTS service_analyses;
DROP TABLE IF EXISTS products;
DROP TABLE IF EXISTS use_case_details;
DROP TABLE IF EXISTS ai_use_cases;
DROP TABLE IF EXISTS federal_organizations;
";
