use rand::RngCore;

use tablefill_core::{ColumnOptions, GeneratorKind};

use crate::errors::GenerationError;
use crate::generators::{GeneratedValue, Generator, GeneratorContext, GeneratorRegistry};
use crate::rng::Draw;

const DEFAULT_INT_MIN: i64 = 0;
const DEFAULT_INT_MAX: i64 = 10000;
const DEFAULT_FLOAT_MIN: f64 = 0.0;
const DEFAULT_FLOAT_MAX: f64 = 10000.0;
const DEFAULT_TEXT_MAX: i64 = 255;
const DEFAULT_YEAR_MIN: i64 = 1901;
const DEFAULT_YEAR_MAX: i64 = 2155;
/// Widest range drawn through the word-combining integer draw.
const SAFE_BITS: u32 = 53;
const SAFE_INTEGER: i64 = (1 << SAFE_BITS) - 1;
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-";

pub fn register(registry: &mut GeneratorRegistry) {
    registry.register_generator(Box::new(BitGenerator));
    registry.register_generator(Box::new(BooleanGenerator));
    registry.register_generator(Box::new(StringGenerator));
    registry.register_generator(Box::new(NumericGenerator));
    registry.register_generator(Box::new(RealGenerator));
    registry.register_generator(Box::new(YearGenerator));
    registry.register_generator(Box::new(EnumGenerator));
    registry.register_generator(Box::new(SetGenerator));
}

/// Inclusive integer range a numeric or year column draws from; empty when
/// `min > max`.
pub fn integer_range(kind: GeneratorKind, options: &ColumnOptions) -> (i64, i64) {
    let (default_min, default_max) = if kind == GeneratorKind::Year {
        (DEFAULT_YEAR_MIN, DEFAULT_YEAR_MAX)
    } else {
        (DEFAULT_INT_MIN, DEFAULT_INT_MAX)
    };
    let max = options
        .max
        .map(|max| max.floor().clamp(-SAFE_INTEGER as f64, SAFE_INTEGER as f64) as i64);
    let mut min = options
        .min
        .map(|min| min.ceil().clamp(-SAFE_INTEGER as f64, SAFE_INTEGER as f64) as i64)
        .unwrap_or_else(|| default_min.min(max.unwrap_or(default_min)));
    let max = max.unwrap_or_else(|| default_max.max(min));
    if options.unsigned {
        min = min.max(0);
    }
    (min, max)
}

fn integer_bounds(
    ctx: &GeneratorContext<'_>,
    kind: GeneratorKind,
) -> Result<(i64, i64), GenerationError> {
    let (min, max) = integer_range(kind, ctx.options());
    if min > max {
        return Err(ctx.invalid(format!("min {min} exceeds max {max}")));
    }
    Ok((min, max))
}

/// Bits drawn by a bit column.
pub fn bit_width(options: &ColumnOptions) -> u32 {
    options.max.unwrap_or(1.0).clamp(1.0, 64.0) as u32
}

fn width(ctx: &GeneratorContext<'_>, default: f64) -> u32 {
    ctx.options().max.unwrap_or(default).clamp(1.0, 64.0) as u32
}

/// Uniform mask of `bits` low bits.
fn draw_mask(rng: &mut dyn RngCore, bits: u32) -> u64 {
    if bits <= SAFE_BITS {
        rng.integer(0, (1i64 << bits) - 1) as u64
    } else {
        rng.next_u64() >> (64 - bits)
    }
}

struct BitGenerator;

impl Generator for BitGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Bit
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        Ok(GeneratedValue::UInt(draw_mask(rng, bit_width(ctx.options()))))
    }
}

struct BooleanGenerator;

impl Generator for BooleanGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Boolean
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        Ok(GeneratedValue::Bool(rng.integer(0, 1) == 1))
    }
}

struct StringGenerator;

impl Generator for StringGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::String
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        let options = ctx.options();
        let max = options.max.map(|max| max.floor() as i64).unwrap_or(DEFAULT_TEXT_MAX);
        let min = options.min.map(|min| min.ceil() as i64).unwrap_or(0).max(0);
        if min > max {
            return Err(ctx.invalid(format!("min length {min} exceeds max length {max}")));
        }

        let mut len = rng.integer(min, max);
        if len == 0 && max > 0 && !options.nullable {
            len = 1;
        }
        let text = (0..len)
            .map(|_| CHARSET[rng.index(CHARSET.len())] as char)
            .collect();
        Ok(GeneratedValue::Text(text))
    }
}

struct NumericGenerator;

impl Generator for NumericGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Numeric
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        if ctx.options().auto_increment {
            let next = ctx.id_offset + ctx.row_index + 1;
            return Ok(GeneratedValue::Int(next as i64));
        }
        let (min, max) = integer_bounds(ctx, GeneratorKind::Numeric)?;
        Ok(GeneratedValue::Int(rng.integer(min, max)))
    }
}

struct RealGenerator;

impl Generator for RealGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Real
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        let options = ctx.options();
        let mut min = options
            .min
            .unwrap_or_else(|| DEFAULT_FLOAT_MIN.min(options.max.unwrap_or(DEFAULT_FLOAT_MIN)));
        let max = options.max.unwrap_or_else(|| DEFAULT_FLOAT_MAX.max(min));
        if options.unsigned {
            min = min.max(0.0);
        }
        if min > max {
            return Err(ctx.invalid(format!("min {min} exceeds max {max}")));
        }

        let mut value = rng.real(min, max);
        if let Some(scale) = options.scale {
            let factor = 10f64.powi(scale.min(15) as i32);
            value = ((value * factor).round() / factor).clamp(min, max);
        }
        Ok(GeneratedValue::Float(value))
    }
}

struct YearGenerator;

impl Generator for YearGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Year
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        let (min, max) = integer_bounds(ctx, GeneratorKind::Year)?;
        Ok(GeneratedValue::Int(rng.integer(min, max)))
    }
}

/// Draws one candidate from the column's value pool; also serves explicit
/// `values` on columns of any other kind.
struct EnumGenerator;

impl Generator for EnumGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Enum
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        let pool = ctx
            .pool
            .ok_or_else(|| ctx.invalid("enum column without candidate values"))?;
        Ok(pool.draw(rng))
    }
}

struct SetGenerator;

impl Generator for SetGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Set
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedValue, GenerationError> {
        let pool = ctx
            .pool
            .ok_or_else(|| ctx.invalid("set column without candidate values"))?;
        let labels = pool.labels();
        let members = width(ctx, labels.len() as f64).min(labels.len() as u32);
        let mask = draw_mask(rng, members);

        let chosen: Vec<&str> = labels
            .iter()
            .take(members as usize)
            .enumerate()
            .filter(|(bit, _)| mask & (1u64 << bit) != 0)
            .map(|(_, label)| label.as_str())
            .collect();
        Ok(GeneratedValue::Text(chosen.join(",")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{Row, ValuePool};
    use crate::rng::Mt19937;
    use chrono::NaiveDate;
    use serde_json::json;
    use tablefill_core::{Column, ColumnOptions, Table};

    fn generate(column: Column, pool: Option<&ValuePool>, seed: u32) -> GeneratedValue {
        let table = Table::new("t", 1).with_column(column.clone());
        let row = Row::new();
        let ctx = GeneratorContext {
            table: &table,
            column: &column,
            row: &row,
            row_index: 0,
            id_offset: 0,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
            pool,
        };
        let mut rng = Mt19937::new(seed);
        GeneratorRegistry::new()
            .generate(column.generator, &ctx, &mut rng)
            .expect("generate")
    }

    fn with_max(name: &str, kind: GeneratorKind, max: f64) -> Column {
        Column::new(name, kind).with_options(ColumnOptions {
            max: Some(max),
            ..ColumnOptions::default()
        })
    }

    #[test]
    fn bit_width_three_seed_42() {
        assert_eq!(
            generate(with_max("flags", GeneratorKind::Bit, 3.0), None, 42),
            GeneratedValue::UInt(6)
        );
    }

    #[test]
    fn string_max_ten_seed_42() {
        assert_eq!(
            generate(with_max("code", GeneratorKind::String, 10.0), None, 42),
            GeneratedValue::Text("ZCoQh8".to_string())
        );
    }

    #[test]
    fn strings_respect_length_bounds() {
        let column = Column::new("code", GeneratorKind::String).with_options(ColumnOptions {
            min: Some(2.0),
            max: Some(4.0),
            ..ColumnOptions::default()
        });
        for seed in 0..200 {
            let value = generate(column.clone(), None, seed);
            let len = value.as_str().expect("text").len();
            assert!((2..=4).contains(&len), "len = {len}");
        }
    }

    #[test]
    fn non_nullable_strings_are_never_empty() {
        let column = with_max("code", GeneratorKind::String, 1.0);
        for seed in 0..200 {
            assert_eq!(generate(column.clone(), None, seed).as_str().map(str::len), Some(1));
        }
    }

    #[test]
    fn unsigned_numbers_are_never_negative() {
        let column = Column::new("qty", GeneratorKind::Numeric).with_options(ColumnOptions {
            min: Some(-50.0),
            max: Some(5.0),
            unsigned: true,
            ..ColumnOptions::default()
        });
        for seed in 0..200 {
            let value = generate(column.clone(), None, seed).as_i64().expect("int");
            assert!((0..=5).contains(&value));
        }
    }

    #[test]
    fn auto_increment_follows_offset() {
        let column = Column::new("id", GeneratorKind::Numeric).with_options(ColumnOptions {
            auto_increment: true,
            ..ColumnOptions::default()
        });
        let table = Table::new("t", 1).with_column(column.clone());
        let row = Row::new();
        let ctx = GeneratorContext {
            table: &table,
            column: &column,
            row: &row,
            row_index: 4,
            id_offset: 10,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
            pool: None,
        };
        let mut rng = Mt19937::new(1);
        let value = GeneratorRegistry::new()
            .generate(GeneratorKind::Numeric, &ctx, &mut rng)
            .expect("generate");
        assert_eq!(value, GeneratedValue::Int(15));
    }

    #[test]
    fn reals_round_to_scale() {
        let column = Column::new("price", GeneratorKind::Real).with_options(ColumnOptions {
            min: Some(1.0),
            max: Some(2.0),
            scale: Some(2),
            ..ColumnOptions::default()
        });
        for seed in 0..100 {
            let value = generate(column.clone(), None, seed).as_f64().expect("float");
            assert!((1.0..=2.0).contains(&value));
            assert!(((value * 100.0).round() - value * 100.0).abs() < 1e-6);
        }
    }

    #[test]
    fn years_default_to_mysql_range() {
        for seed in 0..100 {
            let year = generate(Column::new("y", GeneratorKind::Year), None, seed)
                .as_i64()
                .expect("year");
            assert!((1901..=2155).contains(&year));
        }
    }

    #[test]
    fn set_joins_a_subset_of_candidates() {
        let pool = ValuePool::List(vec![
            GeneratedValue::from_json(&json!("r")),
            GeneratedValue::from_json(&json!("w")),
            GeneratedValue::from_json(&json!("x")),
        ]);
        let column = with_max("perms", GeneratorKind::Set, 3.0);
        for seed in 0..50 {
            let value = generate(column.clone(), Some(&pool), seed);
            let text = value.as_str().expect("text").to_string();
            assert!(text.split(',').filter(|part| !part.is_empty()).all(|part| ["r", "w", "x"].contains(&part)));
        }
    }

    #[test]
    fn enum_without_pool_is_an_error() {
        let column = with_max("status", GeneratorKind::Enum, 2.0);
        let table = Table::new("t", 1).with_column(column.clone());
        let row = Row::new();
        let ctx = GeneratorContext {
            table: &table,
            column: &column,
            row: &row,
            row_index: 0,
            id_offset: 0,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
            pool: None,
        };
        let mut rng = Mt19937::new(1);
        assert!(GeneratorRegistry::new()
            .generate(GeneratorKind::Enum, &ctx, &mut rng)
            .is_err());
    }
}
