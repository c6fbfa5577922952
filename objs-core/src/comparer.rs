/*!
Structural equivalence of value graphs.

Two values are equivalent when they have the same shape and the same leaf
values. Containers are compared member-wise; a cache of visited container
pairs, scoped to a single call, makes the comparison terminate on cyclic
graphs. A pair is recorded as provisionally equivalent before its members are
visited and corrected once a difference is found.
*/

use crate::types::Types;
use crate::value::{ArrayRef, ObjectRef, Properties, Value};
use rustc_hash::FxHashMap;
use std::fmt;

type PropertyFilter<'a> = dyn Fn(&str, &Value) -> bool + 'a;

/// Options tuning how objects are compared.
///
/// # Example
/// ```rust
/// use objs_core::{Comparer, ComparisonOptions, Value};
///
/// let options = ComparisonOptions::new().exclude_properties(|name, _| name.starts_with('_'));
/// let a = Value::object([("prop", "same"), ("_cache", "a")]);
/// let b = Value::object([("prop", "same"), ("_cache", "b")]);
/// assert!(Comparer::are_equivalent_with(&a, &b, &options));
/// ```
#[derive(Default)]
pub struct ComparisonOptions<'a> {
    is_property_excluded: Option<Box<PropertyFilter<'a>>>,
    ignore_missing_property_when_undefined: bool,
}

impl<'a> ComparisonOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip every property for which the predicate returns true.
    ///
    /// The predicate receives the property name and value, once per property
    /// on each side of every compared object pair.
    pub fn exclude_properties<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str, &Value) -> bool + 'a,
    {
        self.is_property_excluded = Some(Box::new(predicate));
        self
    }

    /// Treat a property holding `undefined` on one side as equivalent to the
    /// property being absent on the other side.
    pub fn ignore_missing_property_when_undefined(mut self, ignore: bool) -> Self {
        self.ignore_missing_property_when_undefined = ignore;
        self
    }

    pub fn is_property_excluded(&self, name: &str, value: &Value) -> bool {
        self.is_property_excluded
            .as_ref()
            .is_some_and(|predicate| predicate(name, value))
    }

    pub fn ignores_missing_property_when_undefined(&self) -> bool {
        self.ignore_missing_property_when_undefined
    }
}

impl fmt::Debug for ComparisonOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparisonOptions")
            .field("is_property_excluded", &self.is_property_excluded.is_some())
            .field(
                "ignore_missing_property_when_undefined",
                &self.ignore_missing_property_when_undefined,
            )
            .finish()
    }
}

/// Name of a compared member: an object property or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Member {
    Property(String),
    Index(usize),
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Property(name) => f.write_str(name),
            Member::Index(index) => write!(f, "[{}]", index),
        }
    }
}

impl From<&str> for Member {
    fn from(name: &str) -> Self {
        Member::Property(name.to_string())
    }
}

impl From<usize> for Member {
    fn from(index: usize) -> Self {
        Member::Index(index)
    }
}

/// Comparison of one member present on both sides.
#[derive(Debug, Clone)]
pub struct MemberReport {
    pub member: Member,
    pub report: ComparisonReport,
}

/// Detailed, recursive comparison result.
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub left: Value,
    pub right: Value,
    pub are_equivalent: bool,
    /// Members owned by the right side only
    pub missing_on_left: Vec<Member>,
    /// Members owned by the left side only
    pub missing_on_right: Vec<Member>,
    pub equivalences: Vec<MemberReport>,
    pub differences: Vec<MemberReport>,
}

impl ComparisonReport {
    fn leaf(left: &Value, right: &Value, are_equivalent: bool) -> Self {
        Self {
            left: left.clone(),
            right: right.clone(),
            are_equivalent,
            missing_on_left: Vec::new(),
            missing_on_right: Vec::new(),
            equivalences: Vec::new(),
            differences: Vec::new(),
        }
    }

    /// Report of a member present on both sides, if any.
    pub fn member(&self, member: impl Into<Member>) -> Option<&ComparisonReport> {
        let member = member.into();
        self.equivalences
            .iter()
            .chain(&self.differences)
            .find(|entry| entry.member == member)
            .map(|entry| &entry.report)
    }

    fn push_member(&mut self, member: Member, report: ComparisonReport) {
        let entry = MemberReport { member, report };
        if entry.report.are_equivalent {
            self.equivalences.push(entry);
        } else {
            self.differences.push(entry);
        }
    }

    fn settle(&mut self) {
        self.are_equivalent = self.missing_on_left.is_empty()
            && self.missing_on_right.is_empty()
            && self.differences.is_empty();
    }
}

/// Entry points for comparing values.
pub struct Comparer;

impl Comparer {
    /// Whether two values are equivalent, using default comparison options.
    pub fn are_equivalent(value_a: &Value, value_b: &Value) -> bool {
        Self::are_equivalent_with(value_a, value_b, &ComparisonOptions::default())
    }

    pub fn are_equivalent_with(
        value_a: &Value,
        value_b: &Value,
        options: &ComparisonOptions<'_>,
    ) -> bool {
        EquivalenceCheck::new(options).check(value_a, value_b)
    }

    /// Compare two values, returning a detailed report of their differences.
    ///
    /// # Example
    /// ```rust
    /// use objs_core::{Comparer, Member, Value};
    ///
    /// let report = Comparer::compare(&Value::empty_object(), &Value::object([("prop", 1)]));
    /// assert!(!report.are_equivalent);
    /// assert_eq!(report.missing_on_left, vec![Member::from("prop")]);
    /// ```
    pub fn compare(value_a: &Value, value_b: &Value) -> ComparisonReport {
        Self::compare_with(value_a, value_b, &ComparisonOptions::default())
    }

    pub fn compare_with(
        value_a: &Value,
        value_b: &Value,
        options: &ComparisonOptions<'_>,
    ) -> ComparisonReport {
        EquivalenceCheck::new(options).report(value_a, value_b)
    }
}

/// Verdict for pairs that need no member-wise recursion; `None` for two
/// distinct containers of the same type.
fn shallow_verdict(value_a: &Value, value_b: &Value) -> Option<bool> {
    match (value_a, value_b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => Some(true),
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => Some(false),
        _ if value_a.same_instance(value_b) => Some(true),
        _ if !Types::are_same_types(value_a, value_b) => Some(false),
        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        (Value::Number(a), Value::Number(b)) => Some(a == b),
        (Value::Text(a), Value::Text(b)) => Some(a == b),
        (Value::Date(a), Value::Date(b)) => Some(a == b),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => None,
        // Distinct functions
        _ => Some(false),
    }
}

/// One comparison run: the options plus the visited container pairs.
struct EquivalenceCheck<'o, 'a> {
    options: &'o ComparisonOptions<'a>,
    visited: FxHashMap<(usize, usize), bool>,
}

impl<'o, 'a> EquivalenceCheck<'o, 'a> {
    fn new(options: &'o ComparisonOptions<'a>) -> Self {
        Self {
            options,
            visited: FxHashMap::default(),
        }
    }

    fn cached(&self, value_a: &Value, value_b: &Value) -> Option<bool> {
        let pair = (value_a.container_identity()?, value_b.container_identity()?);
        self.visited.get(&pair).copied()
    }

    fn record(&mut self, pair: (usize, usize), verdict: bool) {
        self.visited.insert(pair, verdict);
    }

    fn check(&mut self, value_a: &Value, value_b: &Value) -> bool {
        if let Some(verdict) = self.cached(value_a, value_b) {
            return verdict;
        }
        if let Some(verdict) = shallow_verdict(value_a, value_b) {
            return verdict;
        }
        match (value_a, value_b) {
            (Value::Array(a), Value::Array(b)) => self.check_arrays(a, b),
            (Value::Object(a), Value::Object(b)) => self.check_objects(a, b),
            _ => false,
        }
    }

    fn check_arrays(&mut self, array_a: &ArrayRef, array_b: &ArrayRef) -> bool {
        let (items_a, items_b) = (array_a.items(), array_b.items());
        if items_a.len() != items_b.len() {
            return false;
        }

        let pair = (array_a.identity(), array_b.identity());
        self.record(pair, true);
        for (item_a, item_b) in items_a.iter().zip(&items_b) {
            if !self.check(item_a, item_b) {
                self.record(pair, false);
                return false;
            }
        }
        true
    }

    fn check_objects(&mut self, object_a: &ObjectRef, object_b: &ObjectRef) -> bool {
        let (members_a, members_b) = self.comparable_members(object_a, object_b);
        if members_a.len() != members_b.len() {
            return false;
        }

        let pair = (object_a.identity(), object_b.identity());
        self.record(pair, true);
        for (name, value_a) in &members_a {
            let equivalent = match members_b.get(name) {
                Some(value_b) => self.check(value_a, value_b),
                None => false,
            };
            if !equivalent {
                self.record(pair, false);
                return false;
            }
        }
        true
    }

    fn report(&mut self, value_a: &Value, value_b: &Value) -> ComparisonReport {
        if let Some(verdict) = self.cached(value_a, value_b) {
            return ComparisonReport::leaf(value_a, value_b, verdict);
        }
        if let Some(verdict) = shallow_verdict(value_a, value_b) {
            return ComparisonReport::leaf(value_a, value_b, verdict);
        }

        let mut report = ComparisonReport::leaf(value_a, value_b, false);
        match (value_a, value_b) {
            (Value::Array(a), Value::Array(b)) => self.report_arrays(a, b, &mut report),
            (Value::Object(a), Value::Object(b)) => self.report_objects(a, b, &mut report),
            _ => {}
        }
        report
    }

    fn report_arrays(&mut self, array_a: &ArrayRef, array_b: &ArrayRef, report: &mut ComparisonReport) {
        let pair = (array_a.identity(), array_b.identity());
        self.record(pair, true);

        let (items_a, items_b) = (array_a.items(), array_b.items());
        for (index, (item_a, item_b)) in items_a.iter().zip(&items_b).enumerate() {
            let member_report = self.report(item_a, item_b);
            report.push_member(Member::Index(index), member_report);
        }
        report
            .missing_on_right
            .extend((items_b.len()..items_a.len()).map(Member::Index));
        report
            .missing_on_left
            .extend((items_a.len()..items_b.len()).map(Member::Index));

        report.settle();
        self.record(pair, report.are_equivalent);
    }

    fn report_objects(
        &mut self,
        object_a: &ObjectRef,
        object_b: &ObjectRef,
        report: &mut ComparisonReport,
    ) {
        let pair = (object_a.identity(), object_b.identity());
        self.record(pair, true);

        let (members_a, members_b) = self.comparable_members(object_a, object_b);
        for (name, value_a) in &members_a {
            match members_b.get(name) {
                Some(value_b) => {
                    let member_report = self.report(value_a, value_b);
                    report.push_member(Member::Property(name.clone()), member_report);
                }
                None => report.missing_on_right.push(Member::Property(name.clone())),
            }
        }
        report.missing_on_left.extend(
            members_b
                .keys()
                .filter(|name| !members_a.contains_key(*name))
                .map(|name| Member::Property(name.clone())),
        );

        report.settle();
        self.record(pair, report.are_equivalent);
    }

    /// Own properties of both objects that take part in the comparison.
    ///
    /// When the counts differ and undefined properties may stand for missing
    /// ones, a property holding `undefined` that the other object does not own
    /// is left out.
    fn comparable_members(&self, object_a: &ObjectRef, object_b: &ObjectRef) -> (Properties, Properties) {
        let mut members_a = self.included_members(object_a);
        let mut members_b = self.included_members(object_b);

        if members_a.len() != members_b.len()
            && self.options.ignores_missing_property_when_undefined()
        {
            members_a.retain(|name, value| !value.is_undefined() || object_b.has_own(name));
            members_b.retain(|name, value| !value.is_undefined() || object_a.has_own(name));
        }
        (members_a, members_b)
    }

    fn included_members(&self, object: &ObjectRef) -> Properties {
        object
            .entries()
            .into_iter()
            .filter(|(name, value)| !self.options.is_property_excluded(name, value))
            .collect()
    }
}
