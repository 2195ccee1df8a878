//! Type-bracketed intervals over index key values
//!
//! Values of different types never compare inside one interval: a range
//! predicate such as `$gt: 5` is bracketed to the numeric type, so the
//! interval runs from 5 (exclusive) up to the end of the numeric bracket.
//!
//! Cross-type order: MinKey < Null < Number < String < Bool < MaxKey.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};

/// Canonical type brackets, in cross-type sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeBracket {
    MinKey,
    Null,
    Number,
    String,
    Bool,
    MaxKey,
}

/// A single key value, or a bracket sentinel
#[derive(Debug, Clone)]
pub enum KeyValue {
    MinKey,
    Null,
    Number(f64),
    String(String),
    Bool(bool),
    MaxKey,
    /// Sorts below every value of the bracket
    BracketMin(TypeBracket),
    /// Sorts above every value of the bracket
    BracketMax(TypeBracket),
}

impl KeyValue {
    /// Converts a scalar JSON value. Objects and arrays have no key value.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(KeyValue::Null),
            Value::Bool(b) => Some(KeyValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(|f| KeyValue::Number(if f == 0.0 { 0.0 } else { f })),
            Value::String(s) => Some(KeyValue::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Returns the type bracket of this value
    pub fn bracket(&self) -> TypeBracket {
        match self {
            KeyValue::MinKey => TypeBracket::MinKey,
            KeyValue::Null => TypeBracket::Null,
            KeyValue::Number(_) => TypeBracket::Number,
            KeyValue::String(_) => TypeBracket::String,
            KeyValue::Bool(_) => TypeBracket::Bool,
            KeyValue::MaxKey => TypeBracket::MaxKey,
            KeyValue::BracketMin(b) | KeyValue::BracketMax(b) => *b,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            KeyValue::MinKey => json!({"$minKey": 1}),
            KeyValue::MaxKey => json!({"$maxKey": 1}),
            KeyValue::Null => Value::Null,
            KeyValue::Number(n) => json!(n),
            KeyValue::String(s) => json!(s),
            KeyValue::Bool(b) => json!(b),
            KeyValue::BracketMin(b) => json!({"$bracketMin": format!("{:?}", b)}),
            KeyValue::BracketMax(b) => json!({"$bracketMax": format!("{:?}", b)}),
        }
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_bracket = self.bracket().cmp(&other.bracket());
        if by_bracket != Ordering::Equal {
            return by_bracket;
        }
        match (self, other) {
            (KeyValue::BracketMin(_), KeyValue::BracketMin(_))
            | (KeyValue::BracketMax(_), KeyValue::BracketMax(_)) => Ordering::Equal,
            (KeyValue::BracketMin(_), _) | (_, KeyValue::BracketMax(_)) => Ordering::Less,
            (_, KeyValue::BracketMin(_)) | (KeyValue::BracketMax(_), _) => Ordering::Greater,
            (KeyValue::Number(l), KeyValue::Number(r)) => l.total_cmp(r),
            (KeyValue::String(l), KeyValue::String(r)) => l.cmp(r),
            (KeyValue::Bool(l), KeyValue::Bool(r)) => l.cmp(r),
            // MinKey, Null, MaxKey are single-valued brackets
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl Serialize for KeyValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::MinKey => write!(f, "MinKey"),
            KeyValue::MaxKey => write!(f, "MaxKey"),
            KeyValue::Null => write!(f, "null"),
            KeyValue::Number(n) => write!(f, "{}", n),
            KeyValue::String(s) => write!(f, "\"{}\"", s),
            KeyValue::Bool(b) => write!(f, "{}", b),
            KeyValue::BracketMin(b) => write!(f, "min{:?}", b),
            KeyValue::BracketMax(b) => write!(f, "max{:?}", b),
        }
    }
}

/// One end of an interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bound {
    pub value: KeyValue,
    pub inclusive: bool,
}

impl Bound {
    pub fn inclusive(value: KeyValue) -> Self {
        Self {
            value,
            inclusive: true,
        }
    }

    pub fn exclusive(value: KeyValue) -> Self {
        Self {
            value,
            inclusive: false,
        }
    }
}

/// Closed, open or half-open interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub low: Bound,
    pub high: Bound,
}

impl Interval {
    pub fn new(low: Bound, high: Bound) -> Self {
        Self { low, high }
    }

    /// `[MinKey, MaxKey]`
    pub fn full() -> Self {
        Self::new(
            Bound::inclusive(KeyValue::MinKey),
            Bound::inclusive(KeyValue::MaxKey),
        )
    }

    /// `[v, v]`
    pub fn point(value: KeyValue) -> Self {
        Self::new(Bound::inclusive(value.clone()), Bound::inclusive(value))
    }

    /// Values above `value` within its type bracket
    pub fn above(value: KeyValue, inclusive: bool) -> Self {
        let high = Bound::inclusive(KeyValue::BracketMax(value.bracket()));
        Self::new(Bound { value, inclusive }, high)
    }

    /// Values below `value` within its type bracket
    pub fn below(value: KeyValue, inclusive: bool) -> Self {
        let low = Bound::inclusive(KeyValue::BracketMin(value.bracket()));
        Self::new(low, Bound { value, inclusive })
    }

    pub fn is_full(&self) -> bool {
        *self == Self::full()
    }

    pub fn is_point(&self) -> bool {
        self.low.inclusive && self.high.inclusive && self.low.value == self.high.value
    }

    /// True when both ends are bracket sentinels or key extremes
    pub fn is_unbounded_range(&self) -> bool {
        let open = |v: &KeyValue| {
            matches!(
                v,
                KeyValue::MinKey | KeyValue::MaxKey | KeyValue::BracketMin(_) | KeyValue::BracketMax(_)
            )
        };
        open(&self.low.value) || open(&self.high.value)
    }

    /// Returns true if no value lies in the interval
    pub fn is_empty(&self) -> bool {
        match self.low.value.cmp(&self.high.value) {
            Ordering::Greater => true,
            Ordering::Equal => !(self.low.inclusive && self.high.inclusive),
            Ordering::Less => false,
        }
    }

    /// Intersection, or `None` if the intervals are disjoint
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let low = max_low(&self.low, &other.low);
        let high = min_high(&self.high, &other.high);
        let result = Interval::new(low, high);
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    /// Whether two non-empty intervals overlap or touch
    fn joins(&self, other: &Interval) -> bool {
        match self.high.value.cmp(&other.low.value) {
            Ordering::Greater => true,
            Ordering::Equal => self.high.inclusive || other.low.inclusive,
            Ordering::Less => false,
        }
    }
}

fn max_low(left: &Bound, right: &Bound) -> Bound {
    match left.value.cmp(&right.value) {
        Ordering::Greater => left.clone(),
        Ordering::Less => right.clone(),
        Ordering::Equal => Bound {
            value: left.value.clone(),
            inclusive: left.inclusive && right.inclusive,
        },
    }
}

fn min_high(left: &Bound, right: &Bound) -> Bound {
    match left.value.cmp(&right.value) {
        Ordering::Less => left.clone(),
        Ordering::Greater => right.clone(),
        Ordering::Equal => Bound {
            value: left.value.clone(),
            inclusive: left.inclusive && right.inclusive,
        },
    }
}

fn cmp_low(left: &Bound, right: &Bound) -> Ordering {
    left.value
        .cmp(&right.value)
        .then_with(|| right.inclusive.cmp(&left.inclusive))
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.low.inclusive { '[' } else { '(' };
        let close = if self.high.inclusive { ']' } else { ')' };
        write!(f, "{}{}, {}{}", open, self.low.value, self.high.value, close)
    }
}

/// Disjunction of intervals, kept sorted and non-overlapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    /// Builds a normalized set; empty intervals are dropped
    pub fn new(intervals: Vec<Interval>) -> Self {
        let mut intervals: Vec<Interval> = intervals.into_iter().filter(|i| !i.is_empty()).collect();
        intervals.sort_by(|l, r| cmp_low(&l.low, &r.low));

        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if last.joins(&interval) => {
                    last.high = match last.high.value.cmp(&interval.high.value) {
                        Ordering::Less => interval.high,
                        Ordering::Greater => last.high.clone(),
                        Ordering::Equal => Bound {
                            value: interval.high.value,
                            inclusive: last.high.inclusive || interval.high.inclusive,
                        },
                    };
                }
                _ => merged.push(interval),
            }
        }
        Self { intervals: merged }
    }

    pub fn single(interval: Interval) -> Self {
        Self::new(vec![interval])
    }

    /// The unconstrained set
    pub fn full() -> Self {
        Self::single(Interval::full())
    }

    /// The unsatisfiable set
    pub fn empty() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.intervals.len() == 1 && self.intervals[0].is_full()
    }

    pub fn union(&self, other: &IntervalSet) -> IntervalSet {
        let mut all = self.intervals.clone();
        all.extend(other.intervals.iter().cloned());
        IntervalSet::new(all)
    }

    pub fn intersect(&self, other: &IntervalSet) -> IntervalSet {
        let mut out = Vec::new();
        for left in &self.intervals {
            for right in &other.intervals {
                if let Some(i) = left.intersect(right) {
                    out.push(i);
                }
            }
        }
        IntervalSet::new(out)
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return write!(f, "{{}}");
        }
        let parts: Vec<String> = self.intervals.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join(" U "))
    }
}
