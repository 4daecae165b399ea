//! Filtering, ordering and pagination composed onto derived relations.

use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::repository::{Status, login_key};
use crate::topology::NodeType;
use crate::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    CreatedAt,
    Email,
    Username,
    GivenName,
    Surname,
    Name,
}

impl SortField {
    /// Column backing this field on `destination`, if it has one.
    pub fn column(self, destination: NodeType) -> Result<&'static str, StoreError> {
        use NodeType::{Account, Application, Directory, Group, Organization};

        let column = match (self, destination) {
            (Self::Id, _) => Some("id"),
            (Self::CreatedAt, _) => Some("created_at"),
            (Self::Email, Account) => Some("email"),
            (Self::Username, Account) => Some("username"),
            (Self::GivenName, Account) => Some("given_name"),
            (Self::Surname, Account) => Some("surname"),
            (Self::Name, Group | Directory | Organization | Application) => Some("name"),
            _ => None,
        };

        column.ok_or_else(|| {
            StoreError::validation(format!("cannot sort {destination} by {self:?}"))
        })
    }
}

fn login_columns(destination: NodeType) -> &'static [&'static str] {
    match destination {
        NodeType::Account => &["email_key", "username_key"],
        _ => &[],
    }
}

fn search_columns(destination: NodeType) -> &'static [&'static str] {
    match destination {
        NodeType::Account => &["email_key", "username_key", "given_name", "surname"],
        NodeType::Group | NodeType::Directory => &["name", "description"],
        NodeType::Organization => &["name", "name_key"],
        NodeType::Application => &["name"],
        _ => &[],
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Exact email or username, ignoring case.
    pub login: Option<String>,
    /// Substring of any searchable column, ignoring case.
    pub search: Option<String>,
    pub status: Option<Status>,
}

/// A page request over a derived relation.
///
/// # Example
///
/// ```rust
/// use storegraph::query::{CollectionQuery, SortDirection, SortField};
///
/// let query = CollectionQuery::new()
///     .search("smith")
///     .order_by(SortField::Surname, SortDirection::Asc)
///     .limit(50);
/// assert_eq!(query.limit, Some(50));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionQuery {
    pub offset: u64,
    /// Page size. The configured default applies when `None`.
    pub limit: Option<u32>,
    pub order: Vec<(SortField, SortDirection)>,
    pub filter: Filter,
}

impl CollectionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: SortField, direction: SortDirection) -> Self {
        self.order.push((field, direction));
        self
    }

    #[must_use]
    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.filter.login = Some(login.into());
        self
    }

    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.filter.search = Some(term.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: Status) -> Self {
        self.filter.status = Some(status);
        self
    }

    /// Applies the configured default page size and clamps to the maximum.
    #[must_use]
    pub fn normalized(mut self, config: &PaginationConfig) -> Self {
        let limit = self.limit.unwrap_or(config.default_limit);
        self.limit = Some(limit.min(config.max_limit).max(1));
        self
    }

    /// Validates the query against `destination` and resolves field names to
    /// columns. `id` ascending is appended as the final sort key so that
    /// pages are stable.
    pub fn plan(&self, destination: NodeType) -> Result<QueryPlan, StoreError> {
        let mut order = Vec::with_capacity(self.order.len() + 1);
        for (field, direction) in &self.order {
            order.push((field.column(destination)?, *direction));
        }
        if !order.iter().any(|(column, _)| *column == "id") {
            order.push(("id", SortDirection::Asc));
        }

        let login = match &self.filter.login {
            Some(value) => {
                let columns = login_columns(destination);
                if columns.is_empty() {
                    return Err(StoreError::validation(format!(
                        "{destination} has no login columns"
                    )));
                }
                Some(TextMatch {
                    columns,
                    value: login_key(value),
                })
            }
            None => None,
        };

        let search = match &self.filter.search {
            Some(value) if !value.is_empty() => {
                let columns = search_columns(destination);
                if columns.is_empty() {
                    return Err(StoreError::validation(format!(
                        "{destination} is not searchable"
                    )));
                }
                Some(TextMatch {
                    columns,
                    value: value.to_lowercase(),
                })
            }
            _ => None,
        };

        if i64::try_from(self.offset).is_err() {
            return Err(StoreError::validation(format!("offset {} is too large", self.offset)));
        }

        if self.filter.status.is_some() && !destination.has_status() {
            return Err(StoreError::validation(format!("{destination} has no status")));
        }

        Ok(QueryPlan {
            offset: self.offset,
            limit: self
                .limit
                .unwrap_or_else(|| PaginationConfig::default().default_limit),
            order,
            login,
            search,
            status: self.filter.status,
        })
    }
}

/// A lowercase match value and the columns it is compared against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMatch {
    pub columns: &'static [&'static str],
    pub value: String,
}

impl TextMatch {
    /// `LIKE` pattern for a substring match, with wildcards escaped by `\`.
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.value.len() + 2);
        pattern.push('%');
        for c in self.value.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    }
}

/// A validated [`CollectionQuery`] resolved against one destination type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub offset: u64,
    pub limit: u32,
    pub order: Vec<(&'static str, SortDirection)>,
    pub login: Option<TextMatch>,
    pub search: Option<TextMatch>,
    pub status: Option<Status>,
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub offset: u64,
    pub limit: u32,
    /// Matching rows before pagination.
    pub size: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            offset: self.offset,
            limit: self.limit,
            size: self.size,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_appends_id_tiebreaker() {
        let plan = CollectionQuery::new()
            .order_by(SortField::Surname, SortDirection::Desc)
            .plan(NodeType::Account)
            .unwrap();
        assert_eq!(
            plan.order,
            vec![("surname", SortDirection::Desc), ("id", SortDirection::Asc)]
        );

        let plan = CollectionQuery::new()
            .order_by(SortField::Id, SortDirection::Desc)
            .plan(NodeType::Group)
            .unwrap();
        assert_eq!(plan.order, vec![("id", SortDirection::Desc)]);
    }

    #[test]
    fn test_unsupported_sort_field_is_rejected() {
        let err = CollectionQuery::new()
            .order_by(SortField::Email, SortDirection::Asc)
            .plan(NodeType::Group)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_login_only_applies_to_accounts() {
        let plan = CollectionQuery::new()
            .login("Bob")
            .plan(NodeType::Account)
            .unwrap();
        assert_eq!(plan.login.unwrap().value, "bob");

        assert!(CollectionQuery::new().login("bob").plan(NodeType::Group).is_err());
    }

    #[test]
    fn test_offset_beyond_i64_is_rejected() {
        let err = CollectionQuery::new()
            .offset(u64::MAX)
            .plan(NodeType::Account)
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let max = i64::MAX as u64;
        assert_eq!(CollectionQuery::new().offset(max).plan(NodeType::Account).unwrap().offset, max);
    }

    #[test]
    fn test_normalized_clamps_limit() {
        let config = PaginationConfig::default();
        assert_eq!(CollectionQuery::new().normalized(&config).limit, Some(25));
        assert_eq!(
            CollectionQuery::new().limit(1000).normalized(&config).limit,
            Some(100)
        );
        assert_eq!(CollectionQuery::new().limit(0).normalized(&config).limit, Some(1));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        let m = TextMatch {
            columns: &["name"],
            value: "50%_off".to_owned(),
        };
        assert_eq!(m.like_pattern(), "%50\\%\\_off%");
    }
}
