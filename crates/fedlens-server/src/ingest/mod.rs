//! 批量导入/迁移任务：全部以 `fedlens-server <subcommand>` 形式手工运行，
//! 逐行处理、失败行记日志后继续，结束时打印计数核对结果。

pub mod agency_tools;
pub mod authorizations;
pub mod db_migrate;
pub mod match_link;
pub mod org_link;
pub mod use_cases;
