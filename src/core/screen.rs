//! Threshold filtering and multi-key ordering of the scan table.

use crate::core::metrics::{Metric, MetricsRow};
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    AtLeast,
    Above,
    AtMost,
    Below,
    Equal,
}

impl Comparison {
    // Longest operators first so `>=` is not read as `>`.
    const SYMBOLS: [(&'static str, Comparison); 6] = [
        (">=", Comparison::AtLeast),
        ("<=", Comparison::AtMost),
        ("==", Comparison::Equal),
        (">", Comparison::Above),
        ("<", Comparison::Below),
        ("=", Comparison::Equal),
    ];

    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::AtLeast => value >= threshold,
            Comparison::Above => value > threshold,
            Comparison::AtMost => value <= threshold,
            Comparison::Below => value < threshold,
            Comparison::Equal => value == threshold,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparison::AtLeast => ">=",
            Comparison::Above => ">",
            Comparison::AtMost => "<=",
            Comparison::Below => "<",
            Comparison::Equal => "=",
        }
    }
}

/// A single `metric op threshold` condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub metric: Metric,
    pub op: Comparison,
    pub threshold: f64,
}

impl Predicate {
    pub fn new(metric: Metric, op: Comparison, threshold: f64) -> Self {
        Self {
            metric,
            op,
            threshold,
        }
    }

    pub fn at_least(metric: Metric, threshold: f64) -> Self {
        Self::new(metric, Comparison::AtLeast, threshold)
    }

    pub fn at_most(metric: Metric, threshold: f64) -> Self {
        Self::new(metric, Comparison::AtMost, threshold)
    }

    pub fn matches(&self, row: &MetricsRow) -> bool {
        self.op.holds(self.metric.value(row), self.threshold)
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.metric, self.op.symbol(), self.threshold)
    }
}

impl FromStr for Predicate {
    type Err = anyhow::Error;

    /// Parses `fcf_yield>=5`, `pe < 20` and the like.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (position, symbol, op) = Comparison::SYMBOLS
            .iter()
            .filter_map(|(symbol, op)| s.find(symbol).map(|pos| (pos, *symbol, *op)))
            .min_by_key(|(pos, symbol, _)| (*pos, std::cmp::Reverse(symbol.len())))
            .ok_or_else(|| anyhow!("Invalid filter (expected metric>=value): {}", s))?;

        let metric = s[..position].parse::<Metric>()?;
        let threshold_str = s[position + symbol.len()..].trim();
        let threshold = threshold_str
            .parse::<f64>()
            .map_err(|_| anyhow!("Invalid threshold in filter {}: {}", s, threshold_str))?;
        if !threshold.is_finite() {
            return Err(anyhow!("Invalid threshold in filter {}: {}", s, threshold_str));
        }
        Ok(Predicate::new(metric, op, threshold))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub metric: Metric,
    pub descending: bool,
}

impl SortKey {
    pub fn descending(metric: Metric) -> Self {
        Self {
            metric,
            descending: true,
        }
    }

    pub fn ascending(metric: Metric) -> Self {
        Self {
            metric,
            descending: false,
        }
    }

    fn compare(&self, a: &MetricsRow, b: &MetricsRow) -> Ordering {
        let ordering = self.metric.value(a).total_cmp(&self.metric.value(b));
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    /// Parses `metric`, `metric:desc` or `metric:asc`. Descending by default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (metric, direction) = s.split_once(':').unwrap_or((s, "desc"));
        let metric = metric.parse::<Metric>()?;
        match direction.trim().to_lowercase().as_str() {
            "desc" => Ok(SortKey::descending(metric)),
            "asc" => Ok(SortKey::ascending(metric)),
            other => Err(anyhow!("Invalid sort direction: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub primary: SortKey,
    pub secondary: Option<SortKey>,
}

impl SortSpec {
    pub fn by(primary: SortKey) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn then(mut self, secondary: SortKey) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Builds a sort order from one or two `metric[:dir]` strings.
    pub fn parse<S: AsRef<str>>(keys: &[S]) -> Result<Self> {
        match keys {
            [primary] => Ok(SortSpec::by(primary.as_ref().parse()?)),
            [primary, secondary] => {
                Ok(SortSpec::by(primary.as_ref().parse()?).then(secondary.as_ref().parse()?))
            }
            _ => Err(anyhow!(
                "Expected one or two sort keys, got {}",
                keys.len()
            )),
        }
    }

    fn compare(&self, a: &MetricsRow, b: &MetricsRow) -> Ordering {
        let ordering = self.primary.compare(a, b);
        match self.secondary {
            Some(secondary) => ordering.then_with(|| secondary.compare(a, b)),
            None => ordering,
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec::by(SortKey::descending(Metric::Score)).then(SortKey::descending(Metric::Yield))
    }
}

/// The active predicates and the ordering of the shortlist.
#[derive(Debug, Clone, Default)]
pub struct ScreenCriteria {
    pub predicates: Vec<Predicate>,
    pub sort: SortSpec,
}

impl ScreenCriteria {
    pub fn passes(&self, row: &MetricsRow) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    /// Keeps the rows that satisfy every predicate and orders them. Rows that
    /// tie on every sort key keep their input order.
    pub fn apply(&self, rows: Vec<MetricsRow>) -> Vec<MetricsRow> {
        let mut shortlist: Vec<MetricsRow> =
            rows.into_iter().filter(|row| self.passes(row)).collect();
        shortlist.sort_by(|a, b| self.sort.compare(a, b));
        shortlist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn row(symbol: &str, yield_pct: f64, score: u32) -> MetricsRow {
        MetricsRow {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            price: 10.0,
            yield_pct: Some(yield_pct),
            roic_pct: Some(20.0),
            op_margin_pct: Some(15.0),
            fcf_yield_pct: None,
            debt_to_ebitda: Some(1.5),
            insider_pct: None,
            pe: None,
            score: Some(score),
        }
    }

    fn symbols(rows: &[MetricsRow]) -> Vec<&str> {
        rows.iter().map(|r| r.symbol.as_str()).collect()
    }

    #[test]
    fn test_predicate_parsing() {
        let p: Predicate = "fcf_yield>=5".parse().unwrap();
        assert_eq!(p, Predicate::at_least(Metric::FcfYield, 5.0));

        let p: Predicate = "pe < 20".parse().unwrap();
        assert_eq!(p, Predicate::new(Metric::Pe, Comparison::Below, 20.0));

        let p: Predicate = "debt_ebitda<=3.5".parse().unwrap();
        assert_eq!(p, Predicate::at_most(Metric::DebtEbitda, 3.5));
        assert_eq!(p.to_string(), "debt_ebitda<=3.5");

        assert!("yield".parse::<Predicate>().is_err());
        assert!("beta>1".parse::<Predicate>().is_err());
        assert!("yield>=abc".parse::<Predicate>().is_err());
        assert!("yield>=NaN".parse::<Predicate>().is_err());
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!(
            "score".parse::<SortKey>().unwrap(),
            SortKey::descending(Metric::Score)
        );
        assert_eq!(
            "pe:asc".parse::<SortKey>().unwrap(),
            SortKey::ascending(Metric::Pe)
        );
        assert!("pe:sideways".parse::<SortKey>().is_err());

        let sort = SortSpec::parse(&["score", "yield"]).unwrap();
        assert_eq!(sort, SortSpec::default());
        assert!(SortSpec::parse::<&str>(&[]).is_err());
        assert!(SortSpec::parse(&["a", "b", "c"]).is_err());
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let criteria = ScreenCriteria {
            predicates: vec![
                Predicate::at_least(Metric::Yield, 3.0),
                Predicate::at_least(Metric::Score, 40.0),
            ],
            sort: SortSpec::default(),
        };
        let rows = vec![
            row("LOWYIELD", 2.0, 90),
            row("LOWSCORE", 5.0, 30),
            row("PASS", 4.0, 70),
        ];
        assert_eq!(symbols(&criteria.apply(rows)), vec!["PASS"]);
    }

    #[test]
    fn test_unknown_values_use_fallback_when_filtering() {
        let criteria = ScreenCriteria {
            predicates: vec![Predicate::at_most(Metric::Pe, 20.0)],
            sort: SortSpec::default(),
        };
        let mut known = row("KNOWN", 4.0, 50);
        known.pe = Some(12.0);
        let unknown = row("UNKNOWN", 4.0, 50);

        assert_eq!(symbols(&criteria.apply(vec![known, unknown])), vec!["KNOWN"]);
    }

    #[test]
    fn test_sort_by_score_then_yield() {
        let criteria = ScreenCriteria::default();
        let rows = vec![
            row("A", 3.0, 70),
            row("B", 5.0, 70),
            row("C", 9.0, 40),
            row("D", 4.0, 100),
        ];
        assert_eq!(symbols(&criteria.apply(rows)), vec!["D", "B", "A", "C"]);
    }

    #[test]
    fn test_ascending_sort() {
        let criteria = ScreenCriteria {
            predicates: vec![],
            sort: SortSpec::by(SortKey::ascending(Metric::DebtEbitda)),
        };
        let mut a = row("A", 3.0, 0);
        a.debt_to_ebitda = Some(3.0);
        let mut b = row("B", 3.0, 0);
        b.debt_to_ebitda = None;
        let mut c = row("C", 3.0, 0);
        c.debt_to_ebitda = Some(0.5);
        assert_eq!(symbols(&criteria.apply(vec![a, b, c])), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let criteria = ScreenCriteria {
            predicates: vec![],
            sort: SortSpec::by(SortKey::descending(Metric::Score)),
        };
        let rows = vec![row("Z", 1.0, 50), row("A", 2.0, 50), row("M", 3.0, 50)];
        assert_eq!(symbols(&criteria.apply(rows)), vec!["Z", "A", "M"]);
    }

    #[quickcheck]
    fn prop_shortlist_is_filtered_sorted_and_stable(values: Vec<(u8, u8)>, min_yield: u8) -> bool {
        let rows: Vec<MetricsRow> = values
            .iter()
            .enumerate()
            .map(|(i, (y, s))| row(&i.to_string(), f64::from(*y % 10), u32::from(*s % 5)))
            .collect();
        let criteria = ScreenCriteria {
            predicates: vec![Predicate::at_least(Metric::Yield, f64::from(min_yield % 10))],
            sort: SortSpec::by(SortKey::descending(Metric::Score)),
        };

        let shortlist = criteria.apply(rows.clone());

        let subset = shortlist.iter().all(|r| rows.contains(r));
        let all_pass = shortlist.iter().all(|r| criteria.passes(r));
        let nothing_lost = shortlist.len() == rows.iter().filter(|r| criteria.passes(r)).count();
        let sorted_and_stable = shortlist.windows(2).all(|w| {
            let (a, b) = (w[0].score.unwrap(), w[1].score.unwrap());
            let index = |r: &MetricsRow| r.symbol.parse::<usize>().unwrap();
            a > b || (a == b && index(&w[0]) < index(&w[1]))
        });
        subset && all_pass && nothing_lost && sorted_and_stable
    }
}
