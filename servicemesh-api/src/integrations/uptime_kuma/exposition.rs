//! Minimal parser for the Prometheus text exposition format served by
//! Uptime Kuma's `/metrics` endpoint.

use std::collections::BTreeMap;

/// One sample line: `name{label="value",...} value [timestamp]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl Sample {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Parse every sample in `body`, skipping comments and malformed lines.
pub fn parse(body: &str) -> Vec<Sample> {
    body.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Sample> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let name_end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .unwrap_or(line.len());
    let name = &line[..name_end];
    if name.is_empty() {
        return None;
    }

    let mut rest = &line[name_end..];
    let mut labels = BTreeMap::new();
    if rest.starts_with('{') {
        let (parsed, consumed) = parse_labels(&rest[1..])?;
        labels = parsed;
        rest = &rest[1 + consumed..];
    }

    let value = rest.split_whitespace().next()?;
    let value = match value {
        "NaN" => f64::NAN,
        "+Inf" => f64::INFINITY,
        "-Inf" => f64::NEG_INFINITY,
        v => v.parse().ok()?,
    };

    Some(Sample {
        name: name.to_string(),
        labels,
        value,
    })
}

/// Parse `key="value",...}` and return the labels plus the number of bytes
/// consumed, including the closing brace.
fn parse_labels(input: &str) -> Option<(BTreeMap<String, String>, usize)> {
    let mut labels = BTreeMap::new();
    let mut chars = input.char_indices().peekable();

    loop {
        while matches!(chars.peek(), Some((_, c)) if c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let (start, c) = *chars.peek()?;
        if c == '}' {
            return Some((labels, start + 1));
        }

        let mut key = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        chars.next(); // '='
        if chars.next()?.1 != '"' {
            return None;
        }

        let mut value = String::new();
        loop {
            let (_, c) = chars.next()?;
            match c {
                '"' => break,
                '\\' => match chars.next()?.1 {
                    'n' => value.push('\n'),
                    other => value.push(other),
                },
                other => value.push(other),
            }
        }
        labels.insert(key.trim().to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_with_labels() {
        let body = r#"
# HELP monitor_status Monitor Status (1 = UP, 0= DOWN, 2= PENDING, 3= MAINTENANCE)
# TYPE monitor_status gauge
monitor_status{monitor_name="My \"API\"",monitor_type="http",monitor_url="https://api.example.com",monitor_hostname="null",monitor_port="null"} 1
process_cpu_seconds_total 12.5 1700000000000
"#;
        let samples = parse(body);
        assert_eq!(samples.len(), 2);

        let status = &samples[0];
        assert_eq!(status.name, "monitor_status");
        assert_eq!(status.label("monitor_name"), Some("My \"API\""));
        assert_eq!(status.label("monitor_url"), Some("https://api.example.com"));
        assert_eq!(status.value, 1.0);

        assert_eq!(samples[1].name, "process_cpu_seconds_total");
        assert!(samples[1].labels.is_empty());
        assert_eq!(samples[1].value, 12.5);
    }

    #[test]
    fn test_label_value_with_comma_and_brace() {
        let samples = parse(r#"m{a="x,y}",b="z"} 3"#);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label("a"), Some("x,y}"));
        assert_eq!(samples[0].label("b"), Some("z"));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let samples = parse("broken{a=\"1\" 2\nok 1\nnovalue\n");
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "ok");
    }
}
