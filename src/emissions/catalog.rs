//! Built-in emission factors, used when the database has no usable row.

use crate::types::Category;

/// One built-in factor: kg CO2e per `unit` of `activity_type`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogEntry {
    pub activity_type: &'static str,
    pub unit: &'static str,
    pub factor: f64,
}

const fn entry(activity_type: &'static str, unit: &'static str, factor: f64) -> CatalogEntry {
    CatalogEntry {
        activity_type,
        unit,
        factor,
    }
}

const TRANSPORT: &[CatalogEntry] = &[
    entry("car_gasoline", "miles", 0.404),
    entry("car_diesel", "miles", 0.358),
    entry("bus", "miles", 0.089),
    entry("train", "miles", 0.045),
    // Small non-zero values cover indirect emissions such as food energy.
    entry("bicycle", "miles", 0.026),
    entry("walking", "miles", 0.080),
    entry("motorcycle", "miles", 0.279),
    entry("flight_domestic", "miles", 0.255),
    entry("flight_international", "miles", 0.298),
];

const DIET: &[CatalogEntry] = &[
    entry("beef", "kg", 27.0),
    entry("pork", "kg", 12.1),
    entry("chicken", "kg", 6.9),
    entry("fish", "kg", 6.1),
    entry("lamb", "kg", 39.2),
    entry("cheese", "kg", 13.5),
    entry("eggs", "kg", 4.2),
    entry("milk", "liters", 3.2),
    entry("rice", "kg", 2.7),
    entry("vegetables", "kg", 2.0),
    entry("fruits", "kg", 1.1),
];

const ENERGY: &[CatalogEntry] = &[
    entry("electricity", "kwh", 0.385),
    entry("natural_gas", "therms", 5.3),
    entry("heating_oil", "gallons", 10.4),
    entry("propane", "gallons", 5.7),
    entry("coal", "kg", 2.42),
];

const WASTE: &[CatalogEntry] = &[
    entry("landfill", "kg", 0.57),
    entry("recycling", "kg", 0.02),
    entry("composting", "kg", 0.01),
];

/// All built-in entries for a category, in display order.
#[must_use]
pub fn entries(category: Category) -> &'static [CatalogEntry] {
    match category {
        Category::Transport => TRANSPORT,
        Category::Diet => DIET,
        Category::Energy => ENERGY,
        Category::Waste => WASTE,
    }
}

#[must_use]
pub fn lookup(category: Category, activity_type: &str) -> Option<&'static CatalogEntry> {
    entries(category)
        .iter()
        .find(|e| e.activity_type == activity_type)
}

/// Comma separated activity types of a category, for error messages.
#[must_use]
pub fn activity_type_names(category: Category) -> String {
    entries(category)
        .iter()
        .map(|e| e.activity_type)
        .collect::<Vec<_>>()
        .join(", ")
}

/// "car_gasoline" -> "Car Gasoline"
#[must_use]
pub fn display_name(activity_type: &str) -> String {
    activity_type
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
