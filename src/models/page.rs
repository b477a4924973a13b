//! Pagination and sorting for course listings.

use std::str::FromStr;

use crate::errors::AppError;

/// Columns a course listing may be sorted by, after views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Title,
    Duration,
    TravelerCount,
    CreatedAt,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Id => "c.id",
            SortField::Title => "c.title",
            SortField::Duration => "c.duration",
            SortField::TravelerCount => "c.traveler_count",
            SortField::CreatedAt => "c.created_at",
        }
    }
}

impl FromStr for SortField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(SortField::Id),
            "title" => Ok(SortField::Title),
            "duration" => Ok(SortField::Duration),
            "travelerCount" => Ok(SortField::TravelerCount),
            "createdAt" => Ok(SortField::CreatedAt),
            other => Err(AppError::invalid_argument(
                "Unsupported sort field.",
                format!("sort: {}", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn keyword(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A secondary ordering, written `field` or `field,dir` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: Direction,
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.split_once(',') {
            Some((field, dir)) => (field, Some(dir)),
            None => (s, None),
        };

        let direction = match direction.map(|d| d.trim().to_ascii_lowercase()) {
            None => Direction::default(),
            Some(d) if d == "asc" => Direction::Asc,
            Some(d) if d == "desc" => Direction::Desc,
            Some(d) => {
                return Err(AppError::invalid_argument(
                    "Unsupported sort direction.",
                    format!("direction: {}", d),
                ))
            }
        };

        Ok(SortOrder {
            field: field.trim().parse()?,
            direction,
        })
    }
}

/// A page of a listing. `page` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: Option<SortOrder>,
}

impl PageRequest {
    pub fn of(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: None,
        }
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }
}
