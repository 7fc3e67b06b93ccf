use chrono::{NaiveDate, NaiveDateTime};
use vantage::intent::TimeRange;
use vantage::model::{CalendarConfig, WeekStart};
use vantage::time::{RelativePeriod, TimeRangeError, TimeResolver};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn window(resolver: &TimeResolver, token: &str) -> (String, String) {
    let (start, end) = resolver.resolve(&TimeRange::relative(token)).unwrap();
    (start.to_string(), end.to_string())
}

fn fiscal(month: u32) -> TimeResolver {
    let calendar = CalendarConfig {
        fiscal_year_start_month: month,
        ..CalendarConfig::default()
    };
    TimeResolver::new(calendar, date(2024, 5, 15))
}

#[test]
fn test_last_quarter_spans_previous_three_months() {
    let resolver = TimeResolver::new(CalendarConfig::default(), date(2024, 5, 15));
    assert_eq!(
        window(&resolver, "last_quarter"),
        (
            "2024-01-01 00:00:00".to_string(),
            "2024-03-31 23:59:59.999999".to_string()
        )
    );

    // Crosses the year boundary.
    let resolver = TimeResolver::new(CalendarConfig::default(), date(2024, 2, 10));
    assert_eq!(
        window(&resolver, "last_quarter"),
        (
            "2023-10-01 00:00:00".to_string(),
            "2023-12-31 23:59:59.999999".to_string()
        )
    );
}

#[test]
fn test_fiscal_year_starting_in_july() {
    let resolver = fiscal(7);
    assert_eq!(window(&resolver, "this_quarter").0, "2024-04-01 00:00:00");
    assert_eq!(window(&resolver, "last_quarter").0, "2024-01-01 00:00:00");
    assert_eq!(
        window(&resolver, "this_year"),
        (
            "2023-07-01 00:00:00".to_string(),
            "2024-06-30 23:59:59.999999".to_string()
        )
    );
    assert_eq!(window(&resolver, "last_year").0, "2022-07-01 00:00:00");
    assert_eq!(
        window(&resolver, "ytd"),
        (
            "2023-07-01 00:00:00".to_string(),
            "2024-05-15 23:59:59.999999".to_string()
        )
    );
}

#[test]
fn test_fiscal_year_starting_in_february() {
    let resolver = fiscal(2);
    assert_eq!(
        window(&resolver, "this_quarter"),
        (
            "2024-05-01 00:00:00".to_string(),
            "2024-07-31 23:59:59.999999".to_string()
        )
    );
    assert_eq!(window(&resolver, "this_year").0, "2024-02-01 00:00:00");
}

#[test]
fn test_week_start() {
    let monday = TimeResolver::new(CalendarConfig::default(), date(2024, 5, 15));
    assert_eq!(window(&monday, "this_week").0, "2024-05-13 00:00:00");

    let calendar = CalendarConfig {
        week_start: WeekStart::Sunday,
        ..CalendarConfig::default()
    };
    let sunday = TimeResolver::new(calendar, date(2024, 5, 15));
    assert_eq!(
        window(&sunday, "last_week"),
        (
            "2024-05-05 00:00:00".to_string(),
            "2024-05-11 23:59:59.999999".to_string()
        )
    );
}

#[test]
fn test_previous_period_of_year_to_date_keeps_length() {
    let resolver = fiscal(7);
    let (start, end) = resolver
        .previous_period(&TimeRange::relative("year_to_date"))
        .unwrap();
    assert_eq!(start.to_string(), "2022-07-01 00:00:00");
    assert_eq!(end.to_string(), "2023-05-15 23:59:59.999999");
}

#[test]
fn test_previous_period_of_explicit_range() {
    let resolver = TimeResolver::new(CalendarConfig::default(), date(2024, 5, 15));
    let (start, end) = resolver
        .previous_period(&TimeRange::between("2024-03-11", "2024-03-20"))
        .unwrap();
    assert_eq!(start.to_string(), "2024-03-01 00:00:00");
    assert_eq!(end.to_string(), "2024-03-10 23:59:59.999999");
}

#[test]
fn test_tokens_are_normalized() {
    for token in ["Last Quarter", "last-quarter", " LAST_QUARTER "] {
        assert_eq!(
            token.parse::<RelativePeriod>().unwrap(),
            RelativePeriod::LastQuarter
        );
    }
    assert_eq!(
        "Last 30 Days".parse::<RelativePeriod>().unwrap().to_string(),
        "last_30_days"
    );
}

#[test]
fn test_unsupported_tokens() {
    let resolver = TimeResolver::new(CalendarConfig::default(), date(2024, 5, 15));
    for token in ["next_quarter", "last_45_days", "the other day"] {
        let err = resolver.resolve(&TimeRange::relative(token)).unwrap_err();
        assert_eq!(
            err,
            TimeRangeError::UnsupportedRelativeExpression(token.to_string())
        );
    }
}

#[test]
fn test_explicit_range() {
    let resolver = TimeResolver::new(CalendarConfig::default(), date(2024, 5, 15));
    let (start, end) = resolver
        .resolve(&TimeRange::between("2024-01-01T08:30:00", "2024-01-31"))
        .unwrap();
    assert_eq!(
        start,
        NaiveDateTime::parse_from_str("2024-01-01 08:30:00", "%Y-%m-%d %H:%M:%S").unwrap()
    );
    assert_eq!(end.to_string(), "2024-01-31 23:59:59.999999");

    assert!(matches!(
        resolver.resolve(&TimeRange::between("2024-02-01", "2024-01-01")),
        Err(TimeRangeError::MalformedRange(_))
    ));
    assert!(matches!(
        resolver.resolve(&TimeRange::between("yesterday-ish", "2024-01-01")),
        Err(TimeRangeError::MalformedRange(_))
    ));
}
