use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rand::RngCore;

use tablefill_core::GeneratorKind;

use crate::errors::GenerationError;
use crate::generators::{GeneratedValue, Generator, GeneratorContext, GeneratorRegistry};
use crate::rng::Draw;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

pub fn register(registry: &mut GeneratorRegistry) {
    registry.register_generator(Box::new(DateGenerator));
    registry.register_generator(Box::new(DateTimeGenerator));
    registry.register_generator(Box::new(TimeGenerator));
}

/// Parse a date or datetime literal.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
        .or_else(|| parse_datetime(text).map(|value| value.time()))
}

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

/// Resolve a bound that is either an earlier column of the row or a literal.
/// A NULL earlier value leaves the bound open.
fn resolve_bound<T>(
    ctx: &GeneratorContext<'_>,
    spec: Option<&str>,
    from_value: impl Fn(&GeneratedValue) -> Option<T>,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, GenerationError> {
    let Some(spec) = spec else {
        return Ok(None);
    };
    if let Some(value) = ctx.earlier(spec) {
        if value.is_null() {
            return Ok(None);
        }
        return from_value(value)
            .map(Some)
            .ok_or_else(|| ctx.invalid(format!("column {spec} does not hold a date")));
    }
    parse(spec)
        .map(Some)
        .ok_or_else(|| ctx.invalid(format!("cannot read date bound {spec}")))
}

fn datetime_bounds(
    ctx: &GeneratorContext<'_>,
) -> Result<(NaiveDateTime, NaiveDateTime), GenerationError> {
    let options = ctx.options();
    let min = resolve_bound(
        ctx,
        options.min_date.as_deref(),
        GeneratedValue::as_datetime,
        parse_datetime,
    )?;
    let max = resolve_bound(
        ctx,
        options.max_date.as_deref(),
        GeneratedValue::as_datetime,
        parse_datetime,
    )?;

    let (min, max) = match (min, max) {
        (Some(min), Some(max)) => (min, max),
        (Some(min), None) => (min, midnight(ctx.base_date).max(min)),
        (None, Some(max)) => (epoch().min(max), max),
        (None, None) => (epoch(), midnight(ctx.base_date)),
    };
    if min > max {
        return Err(ctx.invalid(format!("minDate {min} is after maxDate {max}")));
    }
    Ok((min, max))
}

struct DateGenerator;

impl Generator for DateGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Date
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        let (min, max) = datetime_bounds(ctx)?;
        let days = (max.date() - min.date()).num_days();
        let offset = rng.integer(0, days);
        Ok(GeneratedValue::Date(min.date() + Duration::days(offset)))
    }
}

struct DateTimeGenerator;

impl Generator for DateTimeGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::DateTime
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        let (min, max) = datetime_bounds(ctx)?;
        let seconds = (max - min).num_seconds();
        let offset = rng.integer(0, seconds);
        Ok(GeneratedValue::Timestamp(min + Duration::seconds(offset)))
    }
}

struct TimeGenerator;

impl Generator for TimeGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Time
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        let options = ctx.options();
        let min = resolve_bound(ctx, options.min_date.as_deref(), GeneratedValue::as_time, parse_time)?
            .map(|time| time.num_seconds_from_midnight())
            .unwrap_or(0);
        let max = resolve_bound(ctx, options.max_date.as_deref(), GeneratedValue::as_time, parse_time)?
            .map(|time| time.num_seconds_from_midnight())
            .unwrap_or(86_399);
        if min > max {
            return Err(ctx.invalid("minDate is after maxDate"));
        }

        let seconds = rng.integer(i64::from(min), i64::from(max)) as u32;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
            .ok_or_else(|| ctx.invalid(format!("invalid time offset {seconds}")))?;
        Ok(GeneratedValue::Time(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::Row;
    use crate::rng::Mt19937;
    use tablefill_core::{Column, ColumnOptions, Table};

    fn base_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("date")
    }

    fn generate_with(column: &Column, row: &Row, seed: u32) -> Result<GeneratedValue, GenerationError> {
        let table = Table::new("t", 1).with_column(column.clone());
        let ctx = GeneratorContext {
            table: &table,
            column,
            row,
            row_index: 0,
            id_offset: 0,
            base_date: base_date(),
            pool: None,
        };
        let mut rng = Mt19937::new(seed);
        GeneratorRegistry::new().generate(column.generator, &ctx, &mut rng)
    }

    fn bounded(kind: GeneratorKind, min: Option<&str>, max: Option<&str>) -> Column {
        Column::new("at", kind).with_options(ColumnOptions {
            min_date: min.map(str::to_string),
            max_date: max.map(str::to_string),
            ..ColumnOptions::default()
        })
    }

    #[test]
    fn parses_supported_literals() {
        assert!(parse_datetime("2024-02-03").is_some());
        assert!(parse_datetime("2024-02-03 04:05:06").is_some());
        assert!(parse_datetime("2024-02-03T04:05:06").is_some());
        assert!(parse_datetime("yesterday").is_none());
        assert_eq!(parse_time("12:30"), NaiveTime::from_hms_opt(12, 30, 0));
    }

    #[test]
    fn default_dates_fall_between_epoch_and_base_date() {
        let column = bounded(GeneratorKind::Date, None, None);
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("date");
        for seed in 0..200 {
            let date = generate_with(&column, &Row::new(), seed)
                .expect("date")
                .as_date()
                .expect("date value");
            assert!(date >= epoch && date <= base_date());
        }
    }

    #[test]
    fn datetimes_respect_literal_bounds() {
        let column = bounded(
            GeneratorKind::DateTime,
            Some("2023-06-01 08:00:00"),
            Some("2023-06-01 09:00:00"),
        );
        let min = parse_datetime("2023-06-01 08:00:00").expect("min");
        let max = parse_datetime("2023-06-01 09:00:00").expect("max");
        for seed in 0..200 {
            let value = generate_with(&column, &Row::new(), seed)
                .expect("datetime")
                .as_datetime()
                .expect("datetime value");
            assert!(value >= min && value <= max);
        }
    }

    #[test]
    fn bound_may_name_an_earlier_column() {
        let created = parse_datetime("2023-12-30 00:00:00").expect("created");
        let mut row = Row::new();
        row.insert("created_at".to_string(), GeneratedValue::Timestamp(created));
        let column = bounded(GeneratorKind::DateTime, Some("CREATED_AT"), None);
        for seed in 0..100 {
            let value = generate_with(&column, &row, seed)
                .expect("datetime")
                .as_datetime()
                .expect("datetime value");
            assert!(value >= created && value <= midnight(base_date()));
        }
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let column = bounded(GeneratorKind::Date, Some("2020-01-02"), Some("2020-01-01"));
        assert!(generate_with(&column, &Row::new(), 1).is_err());
        let column = bounded(GeneratorKind::Date, Some("not a date"), None);
        assert!(generate_with(&column, &Row::new(), 1).is_err());
    }

    #[test]
    fn times_stay_within_bounds() {
        let column = bounded(GeneratorKind::Time, Some("09:00:00"), Some("17:00:00"));
        let open = NaiveTime::from_hms_opt(9, 0, 0).expect("time");
        let close = NaiveTime::from_hms_opt(17, 0, 0).expect("time");
        for seed in 0..100 {
            let value = generate_with(&column, &Row::new(), seed)
                .expect("time")
                .as_time()
                .expect("time value");
            assert!(value >= open && value <= close);
        }
    }
}
