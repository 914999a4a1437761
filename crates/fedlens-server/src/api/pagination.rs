use crate::config::PaginationConfig;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::IntoParams;

/// 列表通用分页参数（1 起的页码 + 每页条数）。
///
/// `page_size` 达到哨兵值（默认 9999）时表示"一页返回全部"。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 页码（1 起，默认 1）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// 每页条数（默认 25；达到哨兵值表示返回全部）
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum U64Input {
    Number(u64),
    Text(String),
}

/// 查询串里的数字既可能是数字也可能是带引号的文本，宽松解析。
pub fn deserialize_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<U64Input>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(U64Input::Number(number)) => Ok(Some(number)),
        Some(U64Input::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed.parse::<u64>().map(Some).map_err(DeError::custom)
            }
        }
    }
}

const MAX_PAGE_SIZE: u64 = 500;

impl PageParams {
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn page_size(&self, config: &PaginationConfig) -> u64 {
        self.page_size.unwrap_or(config.default_page_size)
    }

    /// 解析为存储层的 (limit, offset)。哨兵值返回 (usize::MAX, 0)，
    /// 存储层据此跳过 LIMIT/OFFSET。
    pub fn resolve(&self, config: &PaginationConfig) -> (usize, usize) {
        let page_size = self.page_size(config);
        if page_size >= config.all_rows_sentinel {
            return (usize::MAX, 0);
        }
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = (self.page() - 1) * page_size;
        (page_size as usize, offset as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaginationConfig {
        PaginationConfig::default()
    }

    #[test]
    fn defaults_are_page_one_of_twenty_five() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.resolve(&config()), (25, 0));
    }

    #[test]
    fn one_based_pages_map_to_offsets() {
        let params = PageParams {
            page: Some(3),
            page_size: Some(10),
        };
        assert_eq!(params.resolve(&config()), (10, 20));
    }

    #[test]
    fn sentinel_page_size_means_all_rows() {
        let params = PageParams {
            page: Some(7),
            page_size: Some(9999),
        };
        assert_eq!(params.resolve(&config()), (usize::MAX, 0));
    }

    #[test]
    fn zero_page_is_clamped_to_first() {
        let params = PageParams {
            page: Some(0),
            page_size: Some(10),
        };
        assert_eq!(params.resolve(&config()), (10, 0));
    }

    #[test]
    fn quoted_numbers_parse_from_query_string() {
        let params: PageParams = serde_urlencoded::from_str("page=2&page_size=50").unwrap();
        assert_eq!(params.page, Some(2));
        assert_eq!(params.page_size, Some(50));
    }

    #[test]
    fn query_string_round_trip_is_identity() {
        let params = PageParams {
            page: Some(4),
            page_size: Some(100),
        };
        let encoded = serde_urlencoded::to_string(&params).unwrap();
        let reparsed: PageParams = serde_urlencoded::from_str(&encoded).unwrap();
        assert_eq!(reparsed, params);
    }
}
