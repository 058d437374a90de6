use crate::error::DbError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use model::pagination::offset::EMPTY_TABLE_OFFSET;
use rust_decimal::Decimal;
use std::str::FromStr;
use tokio_postgres::types::{ToSql, Type};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A watermark converted to the parameter type a prepared statement declares.
/// Postgres does not coerce a text parameter against an integer column.
pub(crate) struct PgParam(Box<dyn ToSql + Sync + Send>);

impl PgParam {
    pub fn coerce(raw: &str, ty: &Type) -> Result<Self, DbError> {
        let sentinel = raw == EMPTY_TABLE_OFFSET;
        let param: Box<dyn ToSql + Sync + Send> = match ty.name() {
            "int2" => Box::new(parse::<i16>(raw, ty)?),
            "int4" => Box::new(parse::<i32>(raw, ty)?),
            "int8" => Box::new(parse::<i64>(raw, ty)?),
            "oid" => Box::new(parse::<u32>(raw, ty)?),
            "float4" => Box::new(parse::<f32>(raw, ty)?),
            "float8" => Box::new(parse::<f64>(raw, ty)?),
            "numeric" => Box::new(parse::<Decimal>(raw, ty)?),
            "date" if sentinel => Box::new(earliest_date()),
            "date" => Box::new(parse::<NaiveDate>(raw, ty)?),
            "timestamp" if sentinel => Box::new(earliest_date().and_hms_opt(0, 0, 0)),
            "timestamp" => Box::new(parse_naive(raw, ty)?),
            "timestamptz" if sentinel => {
                Box::new(earliest_date().and_hms_opt(0, 0, 0).map(|ts| ts.and_utc()))
            }
            "timestamptz" => Box::new(parse_utc(raw, ty)?),
            _ => Box::new(raw.to_string()),
        };
        Ok(PgParam(param))
    }
}

impl AsRef<dyn ToSql + Sync> for PgParam {
    fn as_ref(&self) -> &(dyn ToSql + Sync + 'static) {
        &*self.0
    }
}

pub(crate) struct PgParamStore {
    params: Vec<PgParam>,
}

impl PgParamStore {
    /// Pairs each raw value with the statement's declared parameter type.
    pub fn for_statement(types: &[Type], raw: &[&str]) -> Result<Self, DbError> {
        if types.len() != raw.len() {
            return Err(DbError::Unknown(format!(
                "statement expects {} parameters, got {}",
                types.len(),
                raw.len()
            )));
        }

        let params = raw
            .iter()
            .zip(types)
            .map(|(value, ty)| PgParam::coerce(value, ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { params })
    }

    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|param| param.as_ref()).collect()
    }
}

fn parse<T: FromStr>(raw: &str, ty: &Type) -> Result<T, DbError> {
    raw.trim().parse::<T>().map_err(|_| coercion_error(raw, ty))
}

fn parse_naive(raw: &str, ty: &Type) -> Result<NaiveDateTime, DbError> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
        .ok_or_else(|| coercion_error(raw, ty))
}

fn parse_utc(raw: &str, ty: &Type) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|_| parse_naive(raw, ty).map(|ts| ts.and_utc()))
}

// Earliest date the sentinel maps to; still inside Postgres' supported range.
fn earliest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn coercion_error(raw: &str, ty: &Type) -> DbError {
    DbError::Coercion {
        value: raw.to_string(),
        expected: ty.name().to_string(),
    }
}
