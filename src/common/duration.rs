// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! ISO-8601 duration parsing for cache TTLs
//!
//! Accepted form: `P[nW][nD][T[nH][nM][n[.f]S]]`, case-insensitive.
//! Year and month designators are rejected since they have no fixed
//! length. Only seconds may carry a fraction.

use std::time::Duration;

use crate::core::{Error, Result};

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;
const SECS_PER_WEEK: u64 = 7 * SECS_PER_DAY;

/// Parse an ISO-8601 duration such as `PT10M` or `P1DT2H30.5S`.
pub fn parse_iso8601_duration(input: &str) -> Result<Duration> {
    let text = input.trim().to_ascii_uppercase();
    let invalid = |reason: &str| {
        Error::configuration(format!("invalid ISO-8601 duration '{}': {}", input, reason))
    };

    let body = text
        .strip_prefix('P')
        .ok_or_else(|| invalid("must start with 'P'"))?;
    if body.is_empty() {
        return Err(invalid("no components"));
    }

    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return Err(invalid("empty time section"));
            }
            (date, Some(time))
        }
        None => (body, None),
    };

    let mut total = Duration::ZERO;

    for (number, unit) in components(date_part).map_err(|e| invalid(&e))? {
        let secs = match unit {
            'W' => SECS_PER_WEEK,
            'D' => SECS_PER_DAY,
            'Y' | 'M' => return Err(invalid("calendar units are not supported")),
            other => return Err(invalid(&format!("unknown date designator '{}'", other))),
        };
        let part = scale(&number, secs).map_err(|e| invalid(&e))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| invalid("duration overflow"))?;
    }

    if let Some(time) = time_part {
        for (number, unit) in components(time).map_err(|e| invalid(&e))? {
            let secs = match unit {
                'H' => SECS_PER_HOUR,
                'M' => SECS_PER_MINUTE,
                'S' => 1,
                other => return Err(invalid(&format!("unknown time designator '{}'", other))),
            };
            let part = scale(&number, secs).map_err(|e| invalid(&e))?;
            total = total
                .checked_add(part)
                .ok_or_else(|| invalid("duration overflow"))?;
        }
    }

    Ok(total)
}

/// Split `12H30M` into `[("12", 'H'), ("30", 'M')]`.
fn components(section: &str) -> std::result::Result<Vec<(String, char)>, String> {
    let mut result = Vec::new();
    let mut number = String::new();

    for ch in section.chars() {
        if ch.is_ascii_digit() || ch == '.' || ch == ',' {
            number.push(if ch == ',' { '.' } else { ch });
        } else if ch.is_ascii_alphabetic() {
            if number.is_empty() {
                return Err(format!("designator '{}' without a number", ch));
            }
            result.push((std::mem::take(&mut number), ch));
        } else {
            return Err(format!("unexpected character '{}'", ch));
        }
    }

    if !number.is_empty() {
        return Err(format!("trailing number '{}' without designator", number));
    }
    Ok(result)
}

fn scale(number: &str, unit_secs: u64) -> std::result::Result<Duration, String> {
    if number.contains('.') {
        if unit_secs != 1 {
            return Err("only seconds may be fractional".to_string());
        }
        let secs: f64 = number
            .parse()
            .map_err(|_| format!("bad number '{}'", number))?;
        return Duration::try_from_secs_f64(secs).map_err(|_| "duration overflow".to_string());
    }

    let count: u64 = number
        .parse()
        .map_err(|_| format!("bad number '{}'", number))?;
    count
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| "duration overflow".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        assert_eq!(
            parse_iso8601_duration("PT10M").unwrap(),
            Duration::from_secs(600)
        );
        assert_eq!(
            parse_iso8601_duration("P1D").unwrap(),
            Duration::from_secs(86_400)
        );
        assert_eq!(
            parse_iso8601_duration("pt1h").unwrap(),
            Duration::from_secs(3_600)
        );
    }

    #[test]
    fn test_parse_combined() {
        assert_eq!(
            parse_iso8601_duration("P1W2DT3H4M5S").unwrap(),
            Duration::from_secs(9 * 86_400 + 3 * 3_600 + 4 * 60 + 5)
        );
        assert_eq!(
            parse_iso8601_duration("PT0.5S").unwrap(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_parse_invalid() {
        for text in ["", "10M", "P", "PT", "P1Y", "PT1.5H", "PT5", "PTH", "P1X"] {
            let err = parse_iso8601_duration(text).unwrap_err();
            assert!(err.is_configuration_error(), "{} -> {}", text, err);
        }
    }

    #[test]
    fn test_out_of_range_is_an_error() {
        for text in [
            "PT99999999999999999999999.5S",
            "P1DT18446744073709551615S",
            "P99999999999999999999W",
        ] {
            let err = parse_iso8601_duration(text).unwrap_err();
            assert!(err.is_configuration_error(), "{} -> {}", text, err);
        }
    }
}
