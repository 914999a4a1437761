use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// 初始化 Snowflake ID 生成器。
///
/// `machine_id` / `node_id`: 0-31。服务启动和批量导入入口各调用一次即可。
pub fn init(machine_id: i32, node_id: i32) {
    let mut generator = ID_GENERATOR.lock().unwrap();
    *generator = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// 生成一个记录主键（Snowflake ID 的字符串形式）。
///
/// 未调用 [`init`] 时退化为 (1, 1) 默认生成器，便于测试。
pub fn next_id() -> String {
    let mut generator = ID_GENERATOR.lock().unwrap();
    let bucket = generator.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    bucket.get_id().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        init(1, 1);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = next_id();
            assert!(!id.is_empty());
            assert!(seen.insert(id), "duplicate id generated");
        }
    }

    #[test]
    fn ids_are_numeric_strings() {
        init(1, 1);
        let id = next_id();
        assert!(id.parse::<i64>().is_ok(), "id should parse as i64: {}", id);
    }
}
