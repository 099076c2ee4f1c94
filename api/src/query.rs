//! Query-string parsing for list endpoints.
//!
//! This is the parse stage of the list pipeline: raw key/value pairs from
//! the request become a typed [`ListQuery`]. Field names are not checked
//! here; the storage layer resolves them against the entity definition and
//! rejects unknown ones, so no request text ever reaches SQL.

use std::collections::HashSet;

use database::{Filter, FilterOp, ListQuery, SortKey, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

use crate::error::{ApiError, ApiResult};

/// Accept the camelCase spellings of the timestamp columns
fn normalize_field(field: &str) -> String {
    match field {
        "createdAt" => "created_at".to_string(),
        "updatedAt" => "updated_at".to_string(),
        other => other.to_string(),
    }
}

/// Parse list parameters from decoded query pairs, in request order.
///
/// `select`, `sort`, `page` and `limit` are reserved keys; every other key
/// is a filter, optionally carrying a bracket operator such as
/// `price[gte]=100`. When any key repeats, the last occurrence wins.
pub fn parse_list_query(pairs: &[(String, String)]) -> ApiResult<ListQuery> {
    let mut select: Option<String> = None;
    let mut sort: Option<String> = None;
    let mut page: Option<String> = None;
    let mut limit: Option<String> = None;
    let mut filters: Vec<Filter> = Vec::new();

    for (key, value) in pairs {
        match key.as_str() {
            "select" => select = Some(value.clone()),
            "sort" => sort = Some(value.clone()),
            "page" => page = Some(value.clone()),
            "limit" => limit = Some(value.clone()),
            _ => filters.push(parse_filter(key, value)?),
        }
    }

    let mut query = ListQuery::new();
    query.filters = dedup_last_wins(filters);
    query.select = select.map(|value| {
        value
            .split(',')
            .map(|field| normalize_field(field.trim()))
            .filter(|field| !field.is_empty())
            .collect()
    });
    if let Some(value) = sort {
        query.sort = parse_sort(&value);
    }
    query.page = parse_page(page.as_deref())?;
    query.limit = parse_limit(limit.as_deref())?;

    Ok(query)
}

fn parse_filter(key: &str, value: &str) -> ApiResult<Filter> {
    let (field, op) = match key.find('[') {
        Some(open) if key.ends_with(']') => {
            let token = &key[open + 1..key.len() - 1];
            let op = FilterOp::parse(token).ok_or_else(|| {
                ApiError::Validation(format!("Unsupported filter operator '{}'", token))
            })?;
            (&key[..open], op)
        }
        Some(_) => {
            return Err(ApiError::Validation(format!(
                "Malformed filter key '{}'",
                key
            )))
        }
        None => (key, FilterOp::Eq),
    };

    let field = normalize_field(field);
    if op == FilterOp::In {
        let values = value.split(',').map(|v| v.trim().to_string()).collect();
        Ok(Filter::many(field, op, values))
    } else {
        Ok(Filter::new(field, op, value))
    }
}

/// Keep the last filter for each `(field, operator)` pair, preserving the
/// order the survivors first appeared in
fn dedup_last_wins(filters: Vec<Filter>) -> Vec<Filter> {
    let mut seen: HashSet<(String, FilterOp)> = HashSet::new();
    let mut kept: Vec<Filter> = Vec::new();
    for filter in filters.into_iter().rev() {
        if seen.insert((filter.field.clone(), filter.op)) {
            kept.push(filter);
        }
    }
    kept.reverse();
    kept
}

fn parse_sort(raw: &str) -> Vec<SortKey> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty() && *token != "-")
        .map(|token| match token.strip_prefix('-') {
            Some(field) => SortKey::descending(normalize_field(field)),
            None => SortKey::ascending(normalize_field(token)),
        })
        .collect()
}

fn parse_page(raw: Option<&str>) -> ApiResult<i64> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_PAGE);
    };
    let page: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid page value '{}'", raw)))?;
    Ok(page.max(DEFAULT_PAGE))
}

fn parse_limit(raw: Option<&str>) -> ApiResult<i64> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_PAGE_SIZE);
    };
    let limit: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid limit value '{}'", raw)))?;
    if limit < 1 {
        // A nonsensical limit falls back to the default page size
        return Ok(DEFAULT_PAGE_SIZE);
    }
    Ok(limit.min(MAX_PAGE_SIZE))
}
