//! Browsing rules for the event catalog: visibility, search, dietary and
//! timeframe filters, ordering, pagination and headline stats.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::dietary::matches_restrictions;
use crate::domain::{DietaryRestriction, Event, ValidationError};

pub const MAX_PER_PAGE: u32 = 100;
const DEFAULT_PER_PAGE: u32 = 20;
const WEEK_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    All,
    Week,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub include_sold_out: bool,
    #[serde(default = "default_true")]
    pub respect_restrictions: bool,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            search: None,
            tag: None,
            timeframe: Timeframe::All,
            include_sold_out: false,
            respect_restrictions: true,
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl EventQuery {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.page == 0 {
            return Err(ValidationError::new("page must be at least 1"));
        }
        if !(1..=MAX_PER_PAGE).contains(&self.per_page) {
            return Err(ValidationError::new(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        Ok(())
    }

    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    fn tag_filter(&self) -> Option<String> {
        self.tag
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_lowercase)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total_events: u64,
    pub total_servings_left: u64,
}

/// Case-insensitive substring match over name, location, food type and description.
pub fn matches_search(event: &Event, term: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(term);

    contains(&event.event_name)
        || contains(&event.event_location)
        || contains(&event.food_type)
        || event.event_description.as_deref().is_some_and(contains)
}

/// Filters and orders `events` for a viewer with `restrictions` on `today`.
pub fn select(
    events: Vec<Event>,
    query: &EventQuery,
    restrictions: &[DietaryRestriction],
    today: NaiveDate,
) -> Vec<Event> {
    let term = query.search_term();
    let tag = query.tag_filter();
    let week_end = today.checked_add_days(Days::new(WEEK_DAYS));

    let mut selected: Vec<Event> = events
        .into_iter()
        .filter(|event| event.is_active)
        .filter(|event| query.include_sold_out || !event.is_sold_out())
        .filter(|event| term.as_deref().is_none_or(|term| matches_search(event, term)))
        .filter(|event| {
            tag.as_deref()
                .is_none_or(|tag| event.event_tags.iter().any(|t| t == tag))
        })
        .filter(|event| {
            !query.respect_restrictions || matches_restrictions(&event.event_tags, restrictions)
        })
        .filter(|event| match query.timeframe {
            Timeframe::All => true,
            Timeframe::Week => {
                event.event_date >= today && week_end.is_none_or(|end| event.event_date <= end)
            }
        })
        .collect();

    selected.sort_by(|a, b| {
        a.event_date
            .cmp(&b.event_date)
            .then_with(|| a.start_time.cmp(&b.start_time))
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    selected
}

pub fn paginate<T>(items: Vec<T>, page: u32, per_page: u32) -> Page<T> {
    let total = items.len() as u64;
    let total_pages = if total == 0 {
        0
    } else {
        total.div_ceil(u64::from(per_page)) as u32
    };
    let offset = (page.saturating_sub(1) as usize).saturating_mul(per_page as usize);

    Page {
        items: items
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .collect(),
        page,
        per_page,
        total,
        total_pages,
    }
}

pub fn stats(events: &[Event]) -> CatalogStats {
    CatalogStats {
        total_events: events.len() as u64,
        total_servings_left: events
            .iter()
            .map(|event| u64::from(event.quantity_remaining))
            .sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CreateEventRequest, NewEvent};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn event(name: &str, date: &str, start: &str, tags: &[&str], remaining: u32) -> Event {
        let request: CreateEventRequest = serde_json::from_value(json!({
            "event_name": name,
            "event_location": "Questrom",
            "event_date": date,
            "start_time": start,
            "end_time": "23:00:00",
            "food_type": "pizza",
            "quantity": 10,
            "event_tags": tags,
            "event_description": "Leftovers from the career fair"
        }))
        .unwrap();
        let mut event = Event::from_new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NewEvent::try_from(request).unwrap(),
            Utc::now(),
        );
        event.quantity_remaining = remaining;
        event
    }

    fn names(events: &[Event]) -> Vec<&str> {
        events.iter().map(|event| event.event_name.as_str()).collect()
    }

    #[test]
    fn orders_by_date_then_start_time_and_hides_sold_out() {
        let events = vec![
            event("late", "2026-10-18", "18:00:00", &[], 3),
            event("early", "2026-10-18", "09:00:00", &[], 3),
            event("first", "2026-10-17", "20:00:00", &[], 3),
            event("gone", "2026-10-17", "08:00:00", &[], 0),
        ];

        let selected = select(events.clone(), &EventQuery::default(), &[], today());
        assert_eq!(names(&selected), vec!["first", "early", "late"]);

        let query = EventQuery {
            include_sold_out: true,
            ..EventQuery::default()
        };
        assert_eq!(select(events, &query, &[], today()).len(), 4);
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let events = vec![
            event("Bagel Breakfast", "2026-10-18", "08:00:00", &[], 3),
            event("Taco Tuesday", "2026-10-18", "12:00:00", &[], 3),
        ];

        let query = EventQuery {
            search: Some("  BAGEL ".to_string()),
            ..EventQuery::default()
        };
        assert_eq!(names(&select(events.clone(), &query, &[], today())), vec!["Bagel Breakfast"]);

        let query = EventQuery {
            search: Some("career".to_string()),
            ..EventQuery::default()
        };
        assert_eq!(select(events, &query, &[], today()).len(), 2);
    }

    #[test]
    fn dietary_filter_keeps_untagged_and_overlapping() {
        let events = vec![
            event("plain", "2026-10-18", "08:00:00", &[], 3),
            event("vegan", "2026-10-18", "09:00:00", &["vegan", "warm"], 3),
            event("kosher", "2026-10-18", "10:00:00", &["kosher"], 3),
        ];
        let restrictions = [DietaryRestriction::Vegan];

        let selected = select(events.clone(), &EventQuery::default(), &restrictions, today());
        assert_eq!(names(&selected), vec!["plain", "vegan"]);

        let query = EventQuery {
            respect_restrictions: false,
            ..EventQuery::default()
        };
        assert_eq!(select(events, &query, &restrictions, today()).len(), 3);
    }

    #[test]
    fn week_timeframe_is_inclusive_of_both_ends() {
        let events = vec![
            event("yesterday", "2026-10-15", "08:00:00", &[], 3),
            event("today", "2026-10-16", "08:00:00", &[], 3),
            event("in a week", "2026-10-23", "08:00:00", &[], 3),
            event("too far", "2026-10-24", "08:00:00", &[], 3),
        ];
        let query = EventQuery {
            timeframe: Timeframe::Week,
            ..EventQuery::default()
        };

        assert_eq!(names(&select(events, &query, &[], today())), vec!["today", "in a week"]);
    }

    #[test]
    fn tag_filter_matches_normalized_tags() {
        let events = vec![
            event("sweet", "2026-10-18", "08:00:00", &["Sweet"], 3),
            event("spicy", "2026-10-18", "09:00:00", &["spicy"], 3),
        ];
        let query = EventQuery {
            tag: Some("SWEET".to_string()),
            ..EventQuery::default()
        };

        assert_eq!(names(&select(events, &query, &[], today())), vec!["sweet"]);
    }

    #[test]
    fn paginate_reports_totals() {
        let page = paginate((1..=45).collect::<Vec<_>>(), 3, 20);
        assert_eq!(page.items, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total, 45);
        assert_eq!(page.total_pages, 3);

        let empty = paginate(Vec::<u8>::new(), 1, 20);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn stats_sum_remaining_servings() {
        let events = vec![
            event("a", "2026-10-18", "08:00:00", &[], 3),
            event("b", "2026-10-18", "09:00:00", &[], 4),
        ];
        assert_eq!(
            stats(&events),
            CatalogStats {
                total_events: 2,
                total_servings_left: 7
            }
        );
    }

    #[test]
    fn per_page_is_bounded() {
        let query = EventQuery {
            per_page: 1000,
            ..EventQuery::default()
        };
        assert_eq!(
            query.validate().unwrap_err().message(),
            "per_page must be between 1 and 100"
        );
    }
}
