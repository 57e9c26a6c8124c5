use std::sync::LazyLock;

use regex::Regex;

static TOPIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(carbon|carbon dioxide|co2e|co₂e|co2|co₂|emission|footprints?|greenhouse|ghg|climate( change)?|energy|electric(ity| vehicle| car)?|ev|hybrid|natural gas|propane|heating( oil)?|diesel|gasoline|petrol|coal|diet|meat|beef|pork|chicken|lamb|fish|vegan|vegetarian|plant[- ]?based|rice|milk|cheese|eggs|transport|commute|car|bus|train|bicycle|bike|walking|motorcycle|flight|flights|plane|airplane|aviation|waste|garbage|trash|landfill|recycl(e|ing)|compost|kwh|mile(s)?|km|kilometer(s)?|gallon(s)?|liter(s)?|kg|kilogram(s)?)",
    )
    .expect("topic pattern is valid")
});

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d+(\.\d+)?\s*(kwh|mile(s)?|km|kilometer(s)?|kg|kilogram(s)?|gallon(s)?|liter(s)?|minutes?|hours?)\b",
    )
    .expect("quantity pattern is valid")
});

/// Whether a chat message is about emissions, footprints, or related activities.
#[must_use]
pub fn is_on_topic(text: &str) -> bool {
    TOPIC.is_match(text) || QUANTITY.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_topic() {
        assert!(is_on_topic("How much CO2 does a flight to Paris emit?"));
        assert!(is_on_topic("is a plant-based diet better"));
        assert!(is_on_topic("I used 300 kWh last month"));
        assert!(is_on_topic("Recycling tips please"));
    }

    #[test]
    fn test_off_topic() {
        assert!(!is_on_topic("Who won the football match yesterday?"));
        assert!(!is_on_topic("Write me a poem about love"));
    }
}
