use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Dietary restriction a student can declare and an event can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DietaryRestriction {
    Vegetarian,
    Vegan,
    Halal,
    Kosher,
    GlutenFree,
    DairyFree,
    NutFree,
}

impl DietaryRestriction {
    pub const ALL: [DietaryRestriction; 7] = [
        Self::Vegetarian,
        Self::Vegan,
        Self::Halal,
        Self::Kosher,
        Self::GlutenFree,
        Self::DairyFree,
        Self::NutFree,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vegetarian => "vegetarian",
            Self::Vegan => "vegan",
            Self::Halal => "halal",
            Self::Kosher => "kosher",
            Self::GlutenFree => "gluten-free",
            Self::DairyFree => "dairy-free",
            Self::NutFree => "nut-free",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Vegetarian => "Vegetarian",
            Self::Vegan => "Vegan",
            Self::Halal => "Halal",
            Self::Kosher => "Kosher",
            Self::GlutenFree => "Gluten-Free",
            Self::DairyFree => "Dairy-Free",
            Self::NutFree => "Nut-Free",
        }
    }
}

impl fmt::Display for DietaryRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DietaryRestriction {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|restriction| restriction.as_str() == normalized)
            .ok_or_else(|| format!("unknown dietary restriction: {raw}"))
    }
}

/// Category an organizer files the food under; `OTHER` covers everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FoodCategory {
    #[serde(rename = "vegetarian")]
    Vegetarian,
    #[serde(rename = "vegan")]
    Vegan,
    #[serde(rename = "halal")]
    Halal,
    #[serde(rename = "kosher")]
    Kosher,
    #[serde(rename = "gluten-free")]
    GlutenFree,
    #[serde(rename = "dairy-free")]
    DairyFree,
    #[serde(rename = "nut-free")]
    NutFree,
    #[serde(rename = "OTHER")]
    Other,
}

impl FoodCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vegetarian => "vegetarian",
            Self::Vegan => "vegan",
            Self::Halal => "halal",
            Self::Kosher => "kosher",
            Self::GlutenFree => "gluten-free",
            Self::DairyFree => "dairy-free",
            Self::NutFree => "nut-free",
            Self::Other => "OTHER",
        }
    }
}

/// Descriptive tags suggested next to the dietary ones when posting an event.
pub const DESCRIPTIVE_EVENT_TAGS: [&str; 9] = [
    "warm",
    "cold",
    "sweet",
    "spicy",
    "breakfast",
    "lunch",
    "dinner",
    "snack",
    "beverage",
];

/// Dietary values followed by the descriptive tags.
pub fn common_event_tags() -> Vec<&'static str> {
    DietaryRestriction::ALL
        .iter()
        .map(|restriction| restriction.as_str())
        .chain(DESCRIPTIVE_EVENT_TAGS)
        .collect()
}

/// True when an event with `tags` should be shown to someone with `restrictions`.
///
/// Untagged events are shown to everyone, as is everything when the viewer
/// declared no restrictions. Otherwise one overlapping tag is enough.
pub fn matches_restrictions(tags: &[String], restrictions: &[DietaryRestriction]) -> bool {
    if tags.is_empty() || restrictions.is_empty() {
        return true;
    }

    tags.iter()
        .any(|tag| restrictions.iter().any(|restriction| restriction.as_str() == tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            " Gluten-Free ".parse::<DietaryRestriction>(),
            Ok(DietaryRestriction::GlutenFree)
        );
        assert!("paleo".parse::<DietaryRestriction>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&DietaryRestriction::DairyFree).unwrap();
        assert_eq!(json, "\"dairy-free\"");

        let other: FoodCategory = serde_json::from_str("\"OTHER\"").unwrap();
        assert_eq!(other, FoodCategory::Other);
    }

    #[test]
    fn untagged_events_are_visible_to_everyone() {
        assert!(matches_restrictions(&[], &[DietaryRestriction::Vegan]));
    }

    #[test]
    fn viewer_without_restrictions_sees_everything() {
        assert!(matches_restrictions(&tags(&["spicy"]), &[]));
    }

    #[test]
    fn one_overlapping_tag_is_enough() {
        let restrictions = [DietaryRestriction::Halal, DietaryRestriction::Vegan];
        assert!(matches_restrictions(&tags(&["warm", "vegan"]), &restrictions));
        assert!(!matches_restrictions(&tags(&["warm", "kosher"]), &restrictions));
    }

    #[test]
    fn common_tags_start_with_dietary_values() {
        let all = common_event_tags();
        assert_eq!(all.len(), 16);
        assert_eq!(all[0], "vegetarian");
        assert_eq!(all[7], "warm");
    }
}
