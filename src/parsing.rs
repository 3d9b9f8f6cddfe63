use std::collections::HashMap;

/// CPU, memory and pod totals of a resource list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTotals {
    pub cpu_millicores: i64,
    pub memory_bytes: i64,
    pub pods: i64,
}

impl ResourceTotals {
    /// Unparseable quantities count as zero.
    pub fn from_quantities<'a, I>(quantities: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut totals = ResourceTotals::default();
        for (name, value) in quantities {
            match name {
                "cpu" => totals.cpu_millicores += parse_cpu_to_millicores(value).unwrap_or(0),
                "memory" => totals.memory_bytes += parse_memory_to_bytes(value).unwrap_or(0),
                "pods" => totals.pods += parse_count(value).unwrap_or(0),
                _ => {}
            }
        }
        totals
    }

    /// Reads a JSON resource list such as the node pod-limits annotation.
    /// A missing or malformed annotation yields zero totals.
    pub fn from_annotation(raw: Option<&str>) -> Self {
        let parsed: HashMap<String, String> = raw
            .filter(|s| !s.is_empty())
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        Self::from_quantities(parsed.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

pub fn parse_cpu_to_millicores(q: &str) -> Option<i64> {
    let q = q.trim();
    if q.is_empty() {
        return None;
    }
    if let Some(nanos) = q.strip_suffix('n') {
        return nanos.parse::<i128>().ok().map(|n| (n / 1_000_000) as i64);
    }
    if let Some(micros) = q.strip_suffix('u') {
        return micros.parse::<i128>().ok().map(|u| (u / 1_000) as i64);
    }
    if let Some(milli) = q.strip_suffix('m') {
        return milli.parse::<i64>().ok();
    }
    q.parse::<f64>().ok().map(|cores| (cores * 1000.0).round() as i64)
}

const MEMORY_UNITS: &[(&str, i64)] = &[
    ("Ki", 1_i64 << 10),
    ("Mi", 1_i64 << 20),
    ("Gi", 1_i64 << 30),
    ("Ti", 1_i64 << 40),
    ("Pi", 1_i64 << 50),
    ("Ei", 1_i64 << 60),
    ("k", 1_000),
    ("K", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
    ("T", 1_000_000_000_000),
    ("P", 1_000_000_000_000_000),
    ("E", 1_000_000_000_000_000_000),
];

pub fn parse_memory_to_bytes(q: &str) -> Option<i64> {
    let q = q.trim();
    if q.is_empty() {
        return None;
    }
    for (suffix, mul) in MEMORY_UNITS {
        if let Some(value) = q.strip_suffix(suffix) {
            return value
                .parse::<f64>()
                .ok()
                .map(|v| (v * (*mul as f64)).round() as i64);
        }
    }
    q.parse::<i64>().ok()
}

pub fn parse_count(q: &str) -> Option<i64> {
    q.trim().parse::<i64>().ok()
}

/// `used / capacity` as a percentage; `None` without capacity.
pub fn utilization_percent(used: i64, capacity: i64) -> Option<f64> {
    if capacity <= 0 {
        return None;
    }
    Some(used as f64 / capacity as f64 * 100.0)
}

pub fn exceeds(pct: Option<f64>, threshold: f64) -> bool {
    pct.map(|v| v > threshold).unwrap_or(false)
}
