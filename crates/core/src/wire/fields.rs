use std::collections::HashMap;

use crate::model::Iteration;

use super::DecodeError;

/// `key=value` pairs of one protocol line.
///
/// Segments without `=` (and empty segments from `;;`) are ignored; a
/// repeated key keeps its last value.
pub(super) struct Fields<'a> {
    tag: &'static str,
    values: HashMap<&'a str, &'a str>,
}

impl<'a> Fields<'a> {
    pub(super) fn parse(tag: &'static str, rest: &'a str) -> Self {
        let values = rest
            .split(';')
            .filter_map(|segment| segment.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();
        Self { tag, values }
    }

    fn raw(&self, key: &'static str) -> Option<&'a str> {
        self.values.get(key).copied()
    }

    fn required(&self, key: &'static str) -> Result<&'a str, DecodeError> {
        self.raw(key).ok_or(DecodeError::MissingField { tag: self.tag, key })
    }

    fn invalid_integer(&self, key: &'static str, value: &str) -> DecodeError {
        DecodeError::InvalidInteger {
            tag: self.tag,
            key,
            value: value.to_string(),
        }
    }

    /// `iter`, which defaults to step 0 and also accepts `FINAL`.
    pub(super) fn iteration(&self) -> Result<Iteration, DecodeError> {
        match self.raw("iter") {
            None => Ok(Iteration::default()),
            Some(Iteration::FINAL_LITERAL) => Ok(Iteration::Final),
            Some(v) => v
                .parse::<u64>()
                .map(Iteration::Step)
                .map_err(|_| self.invalid_integer("iter", v)),
        }
    }

    pub(super) fn id(&self, key: &'static str) -> Result<u32, DecodeError> {
        let v = self.required(key)?;
        v.parse().map_err(|_| self.invalid_integer(key, v))
    }

    pub(super) fn id_or(&self, key: &'static str, default: u32) -> Result<u32, DecodeError> {
        match self.raw(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| self.invalid_integer(key, v)),
        }
    }

    /// A job reference where `-1` (or absence) means "none".
    pub(super) fn optional_job(&self, key: &'static str) -> Result<Option<u32>, DecodeError> {
        match self.raw(key) {
            None | Some("-1") => Ok(None),
            Some(v) => v.parse().map(Some).map_err(|_| self.invalid_integer(key, v)),
        }
    }

    pub(super) fn real(&self, key: &'static str) -> Result<f64, DecodeError> {
        let v = self.required(key)?;
        self.parse_real(key, v)
    }

    pub(super) fn real_or(&self, key: &'static str, default: f64) -> Result<f64, DecodeError> {
        match self.raw(key) {
            None => Ok(default),
            Some(v) => self.parse_real(key, v),
        }
    }

    /// A real value in the solver's discrete time unit, truncated.
    pub(super) fn time(&self, key: &'static str) -> Result<i64, DecodeError> {
        self.real(key).map(truncate)
    }

    pub(super) fn time_or(&self, key: &'static str, default: i64) -> Result<i64, DecodeError> {
        match self.raw(key) {
            None => Ok(default),
            Some(v) => self.parse_real(key, v).map(truncate),
        }
    }

    /// Comma-separated job ids. Missing or empty yields an empty list.
    pub(super) fn list(&self, key: &'static str) -> Result<Vec<u32>, DecodeError> {
        let Some(v) = self.raw(key) else {
            return Ok(Vec::new());
        };
        v.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                item.parse().map_err(|_| DecodeError::InvalidList {
                    tag: self.tag,
                    key,
                    value: v.to_string(),
                })
            })
            .collect()
    }

    fn parse_real(&self, key: &'static str, v: &str) -> Result<f64, DecodeError> {
        match v.parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(x),
            _ => Err(DecodeError::InvalidReal {
                tag: self.tag,
                key,
                value: v.to_string(),
            }),
        }
    }
}

fn truncate(x: f64) -> i64 {
    x.trunc() as i64
}
