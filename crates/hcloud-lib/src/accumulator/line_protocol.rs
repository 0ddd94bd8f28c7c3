//! InfluxDB line protocol encoding
//!
//! `measurement,tag=value field=value timestamp` with nanosecond timestamps.
//! Tags and fields are written in key order. Tags with an empty key or value
//! are dropped since parsers reject `key=`.

use super::{FieldValue, Metric};
use std::fmt::Write as _;
use std::io::{self, Write};

/// Encode one record as a single line, without the trailing newline
pub fn encode(metric: &Metric) -> String {
    let mut line = String::with_capacity(128);
    escape_into(&mut line, &metric.measurement, &[',', ' ']);

    for (key, value) in metric
        .tags
        .iter()
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
    {
        line.push(',');
        escape_into(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        escape_into(&mut line, value, &[',', '=', ' ']);
    }

    for (i, (key, value)) in metric.fields.iter().enumerate() {
        line.push(if i == 0 { ' ' } else { ',' });
        escape_into(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        match value {
            FieldValue::Float(v) => {
                let _ = write!(line, "{v}");
            }
            FieldValue::Integer(v) => {
                let _ = write!(line, "{v}i");
            }
            FieldValue::Boolean(v) => {
                let _ = write!(line, "{v}");
            }
            FieldValue::String(v) => {
                line.push('"');
                for c in v.chars() {
                    if matches!(c, '"' | '\\') {
                        line.push('\\');
                    }
                    line.push(c);
                }
                line.push('"');
            }
        }
    }

    let _ = write!(
        line,
        " {}",
        metric.timestamp.timestamp_nanos_opt().unwrap_or_default()
    );
    line
}

/// Write records one per line. Records without fields are skipped since
/// the protocol cannot represent them.
pub fn write_metrics<'a, W, I>(writer: &mut W, metrics: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Metric>,
{
    let mut written = 0;
    for metric in metrics {
        if metric.fields.is_empty() {
            continue;
        }
        writeln!(writer, "{}", encode(metric))?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Backslash-escape `special`; newlines become a literal `\n`
fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::{Fields, Tags};
    use chrono::{TimeZone, Utc};

    fn metric(fields: Fields, tags: Tags) -> Metric {
        Metric {
            measurement: "hcloud_load_balancer_info".to_string(),
            fields,
            tags,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_encode_sorted_tags_and_typed_fields() {
        let m = metric(
            Fields::from([
                ("info".to_string(), FieldValue::Integer(1)),
                ("bandwidth_in".to_string(), FieldValue::Float(12.5)),
                ("open_connections".to_string(), FieldValue::Float(0.0)),
            ]),
            Tags::from([
                ("name".to_string(), "lb1".to_string()),
                ("id".to_string(), "1".to_string()),
                ("protected".to_string(), "false".to_string()),
            ]),
        );

        assert_eq!(
            encode(&m),
            "hcloud_load_balancer_info,id=1,name=lb1,protected=false \
             bandwidth_in=12.5,info=1i,open_connections=0 1700000000000000000"
        );
    }

    #[test]
    fn test_encode_escapes_special_characters() {
        let m = metric(
            Fields::from([
                ("note".to_string(), FieldValue::from(r#"say "hi" \o/"#)),
                ("up".to_string(), FieldValue::Boolean(true)),
            ]),
            Tags::from([("name".to_string(), "my lb,eu=1".to_string())]),
        );

        assert_eq!(
            encode(&m),
            r#"hcloud_load_balancer_info,name=my\ lb\,eu\=1 note="say \"hi\" \\o/",up=true 1700000000000000000"#
        );
    }

    #[test]
    fn test_encode_drops_empty_tags_and_escapes_newlines() {
        let m = metric(
            Fields::from([("info".to_string(), FieldValue::Integer(1))]),
            Tags::from([
                ("id".to_string(), "ff".to_string()),
                ("location".to_string(), String::new()),
                ("name".to_string(), "edge\nlb".to_string()),
            ]),
        );

        assert_eq!(
            encode(&m),
            r"hcloud_load_balancer_info,id=ff,name=edge\nlb info=1i 1700000000000000000"
        );
    }

    #[test]
    fn test_write_metrics_skips_fieldless_records() {
        let with_fields = metric(
            Fields::from([("info".to_string(), FieldValue::Integer(1))]),
            Tags::from([("id".to_string(), "a".to_string())]),
        );
        let without_fields = metric(Fields::new(), Tags::new());

        let mut out = Vec::new();
        let written = write_metrics(&mut out, [&with_fields, &without_fields]).unwrap();

        assert_eq!(written, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "hcloud_load_balancer_info,id=a info=1i 1700000000000000000\n"
        );
    }
}
