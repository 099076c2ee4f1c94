//! Typed query specification for list endpoints.
//!
//! The HTTP layer parses raw query strings into a [`ListQuery`]; the storage
//! layer resolves field names against an entity definition and binds every
//! value as a parameter. Raw request strings never reach generated SQL.

use entities::EntityDefinition;

/// Default page number when the client does not send one
pub const DEFAULT_PAGE: i64 = 1;
/// Default page size when the client does not send one
pub const DEFAULT_PAGE_SIZE: i64 = 25;
/// Hard ceiling on the page size, whatever the client asks for
pub const MAX_PAGE_SIZE: i64 = 100;

/// Comparison operators accepted in filter parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOp {
    /// Parse a bracket-notation operator token, e.g. the `gte` in `price[gte]`
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "eq" => Some(FilterOp::Eq),
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            "in" => Some(FilterOp::In),
            _ => None,
        }
    }

    pub fn sql_operator(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
            FilterOp::In => "IN",
        }
    }
}

/// A single filter condition against one field.
///
/// Values are kept as the raw strings from the request; the storage layer
/// coerces them against the column type when the query executes. Scalar
/// operators expect exactly one value, `In` takes one or more.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op,
            values: vec![value.into()],
        }
    }

    pub fn many(field: impl Into<String>, op: FilterOp, values: Vec<String>) -> Self {
        Self {
            field: field.into(),
            op,
            values,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// One key of a sort specification
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Normalized representation of a list request
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    /// Projection, `None` meaning all queryable columns. The id column is
    /// always included even when not listed.
    pub select: Option<Vec<String>>,
    /// Sort keys in priority order. Empty means newest first.
    pub sort: Vec<SortKey>,
    pub page: i64,
    pub limit: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            select: None,
            sort: Vec::new(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter condition, keeping the existing ones
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn with_page(mut self, page: i64, limit: i64) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    /// Number of rows skipped before the requested page
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// One page of results together with the total match count, which is
/// computed against the filter alone, never the page window
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page * self.limit < self.total
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Server-configured relation loading. Routes decide what gets joined and
/// which columns come along; clients cannot influence either.
#[derive(Debug, Clone)]
pub enum Populate {
    /// Replace a reference column's id value with the referenced entity,
    /// projected down to the listed columns
    Parent {
        field: String,
        definition: EntityDefinition,
        columns: Vec<String>,
    },
    /// Attach all rows of another entity whose `foreign_key` column points
    /// at this entity, as an array under `name`
    Children {
        name: String,
        definition: EntityDefinition,
        foreign_key: String,
    },
}

impl Populate {
    pub fn parent(
        field: impl Into<String>,
        definition: EntityDefinition,
        columns: &[&str],
    ) -> Self {
        Populate::Parent {
            field: field.into(),
            definition,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn children(
        name: impl Into<String>,
        definition: EntityDefinition,
        foreign_key: impl Into<String>,
    ) -> Self {
        Populate::Children {
            name: name.into(),
            definition,
            foreign_key: foreign_key.into(),
        }
    }
}
