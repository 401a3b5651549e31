use serde::{Deserialize, Serialize};

use crate::services::ListQuery;

/// Query string of the record listing endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

impl From<ListParams> for ListQuery {
    fn from(params: ListParams) -> Self {
        ListQuery::new(params.page, params.limit, params.search)
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub records: Vec<T>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_normalize_into_query() {
        let params = ListParams {
            page: Some(2),
            limit: Some(500),
            search: Some(" paid ".into()),
        };

        let query = ListQuery::from(params);
        assert_eq!(query.page, 2);
        assert_eq!(query.limit, 100);
        assert_eq!(query.search.as_deref(), Some("paid"));
    }

    #[test]
    fn test_response_shape() {
        let response = ListResponse {
            records: vec!["a"],
            total: 7,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["total"], 7);
        assert_eq!(json["records"][0], "a");
    }
}
