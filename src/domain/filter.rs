// Filter selection domain model
use super::error::DashboardError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DateRange {
    #[serde(rename = "24h")]
    Last24Hours,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[serde(rename = "1y")]
    LastYear,
}

impl DateRange {
    pub const ALL: [DateRange; 5] = [
        DateRange::Last24Hours,
        DateRange::Last7Days,
        DateRange::Last30Days,
        DateRange::Last90Days,
        DateRange::LastYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateRange::Last24Hours => "24h",
            DateRange::Last7Days => "7d",
            DateRange::Last30Days => "30d",
            DateRange::Last90Days => "90d",
            DateRange::LastYear => "1y",
        }
    }

    /// Width of the window ending at the snapshot time.
    pub fn window(&self) -> chrono::Duration {
        match self {
            DateRange::Last24Hours => chrono::Duration::hours(24),
            DateRange::Last7Days => chrono::Duration::days(7),
            DateRange::Last30Days => chrono::Duration::days(30),
            DateRange::Last90Days => chrono::Duration::days(90),
            DateRange::LastYear => chrono::Duration::days(365),
        }
    }
}

impl FromStr for DateRange {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DateRange::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DashboardError::InvalidFilterValue {
                field: "dateRange",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    All,
    Sales,
    Marketing,
    Support,
    Product,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::All,
        Category::Sales,
        Category::Marketing,
        Category::Support,
        Category::Product,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::All => "all",
            Category::Sales => "sales",
            Category::Marketing => "marketing",
            Category::Support => "support",
            Category::Product => "product",
        }
    }

    /// `All` matches every tag; anything else matches only itself.
    pub fn matches(&self, tag: Category) -> bool {
        *self == Category::All || *self == tag
    }
}

impl FromStr for Category {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DashboardError::InvalidFilterValue {
                field: "category",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Region {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "north-america")]
    NorthAmerica,
    #[serde(rename = "europe")]
    Europe,
    #[serde(rename = "asia")]
    Asia,
    #[serde(rename = "latam")]
    Latam,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::All,
        Region::NorthAmerica,
        Region::Europe,
        Region::Asia,
        Region::Latam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::All => "all",
            Region::NorthAmerica => "north-america",
            Region::Europe => "europe",
            Region::Asia => "asia",
            Region::Latam => "latam",
        }
    }
}

impl FromStr for Region {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DashboardError::InvalidFilterValue {
                field: "region",
                value: s.to_string(),
            })
    }
}

/// Active filter combination. Every field is always one of its
/// enumerated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSelection {
    pub date_range: DateRange,
    pub category: Category,
    pub region: Region,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            date_range: DateRange::Last7Days,
            category: Category::All,
            region: Region::All,
        }
    }
}

/// Unvalidated selection as sent by a filter UI.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    pub date_range: String,
    pub category: String,
    pub region: String,
}

impl FilterRequest {
    pub fn new(date_range: &str, category: &str, region: &str) -> Self {
        Self {
            date_range: date_range.to_string(),
            category: category.to_string(),
            region: region.to_string(),
        }
    }
}

impl TryFrom<&FilterRequest> for FilterSelection {
    type Error = DashboardError;

    fn try_from(request: &FilterRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            date_range: request.date_range.parse()?,
            category: request.category.parse()?,
            region: request.region.parse()?,
        })
    }
}

/// Enumerated values per filter field, for populating selectors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDomains {
    pub date_range: Vec<&'static str>,
    pub category: Vec<&'static str>,
    pub region: Vec<&'static str>,
}

impl FilterDomains {
    pub fn new() -> Self {
        Self {
            date_range: DateRange::ALL.iter().map(DateRange::as_str).collect(),
            category: Category::ALL.iter().map(Category::as_str).collect(),
            region: Region::ALL.iter().map(Region::as_str).collect(),
        }
    }
}
