/*!
Per-value snapshot history.

The Snapshotter keeps, for every tracked value, a bounded newest-first list of
clones. Saving an unchanged value is a no-op; reverting pops the newest clone
and writes it back into the caller's live value in place.

Values are tracked either by reference identity or by the value of their
identifier property. In both cases the key is computed fresh on every call.
*/

use crate::cloner::Cloner;
use crate::comparer::{ComparisonOptions, Comparer};
use crate::config::{IdentificationKind, SnapshotKind, SnapshotterConfig};
use crate::error::{InvalidArgument, ObjsError, Result};
use crate::history::{History, HistoryEntry};
use crate::types::{Types, ValueKind};
use crate::value::Value;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::{debug, info};

#[cfg(feature = "metrics")]
use crate::observability::{MetricsTimer, ObjsMetrics};

/// Key under which a value's history is stored.
///
/// Scalar identifiers compare by value (`NaN` equals `NaN`, `-0` equals `+0`);
/// containers and functions compare by identity and keep their instance alive
/// while tracked.
#[derive(Clone)]
pub enum TrackingKey {
    Undefined,
    Null,
    Bool(bool),
    /// Bit pattern of the number, with zeros and NaNs canonicalized
    Number(u64),
    Text(String),
    Date(DateTime<Utc>),
    Reference { identity: usize, handle: Value },
}

impl TrackingKey {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Undefined => TrackingKey::Undefined,
            Value::Null => TrackingKey::Null,
            Value::Bool(flag) => TrackingKey::Bool(*flag),
            Value::Number(number) => TrackingKey::Number(Self::number_bits(*number)),
            Value::Text(text) => TrackingKey::Text(text.clone()),
            Value::Date(date) => TrackingKey::Date(*date),
            Value::Array(array) => Self::reference(array.identity(), value),
            Value::Function(function) => Self::reference(function.identity(), value),
            Value::Object(object) => Self::reference(object.identity(), value),
        }
    }

    fn reference(identity: usize, value: &Value) -> Self {
        TrackingKey::Reference {
            identity,
            handle: value.clone(),
        }
    }

    fn number_bits(number: f64) -> u64 {
        if number.is_nan() {
            f64::NAN.to_bits()
        } else if number == 0.0 {
            0
        } else {
            number.to_bits()
        }
    }
}

impl PartialEq for TrackingKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TrackingKey::Undefined, TrackingKey::Undefined) => true,
            (TrackingKey::Null, TrackingKey::Null) => true,
            (TrackingKey::Bool(a), TrackingKey::Bool(b)) => a == b,
            (TrackingKey::Number(a), TrackingKey::Number(b)) => a == b,
            (TrackingKey::Text(a), TrackingKey::Text(b)) => a == b,
            (TrackingKey::Date(a), TrackingKey::Date(b)) => a == b,
            (
                TrackingKey::Reference { identity: a, .. },
                TrackingKey::Reference { identity: b, .. },
            ) => a == b,
            _ => false,
        }
    }
}

impl Eq for TrackingKey {}

impl Hash for TrackingKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TrackingKey::Undefined | TrackingKey::Null => {}
            TrackingKey::Bool(flag) => flag.hash(state),
            TrackingKey::Number(bits) => bits.hash(state),
            TrackingKey::Text(text) => text.hash(state),
            TrackingKey::Date(date) => date.hash(state),
            TrackingKey::Reference { identity, .. } => identity.hash(state),
        }
    }
}

impl fmt::Debug for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingKey::Undefined => f.write_str("Undefined"),
            TrackingKey::Null => f.write_str("Null"),
            TrackingKey::Bool(flag) => write!(f, "Bool({})", flag),
            TrackingKey::Number(bits) => write!(f, "Number({})", f64::from_bits(*bits)),
            TrackingKey::Text(text) => write!(f, "Text({:?})", text),
            TrackingKey::Date(date) => write!(f, "Date({})", date.to_rfc3339()),
            TrackingKey::Reference { identity, handle } => {
                write!(f, "Reference({}@{:#x})", Types::kind_of(handle), identity)
            }
        }
    }
}

/// Takes snapshots of values, building a history of their states.
///
/// # Example
/// ```rust
/// use objs_core::{Snapshotter, Value};
///
/// let mut snapshotter = Snapshotter::default();
/// let tracked = Value::object([("prop", "old")]);
///
/// snapshotter.save(&tracked)?;
/// tracked.set("prop", "new");
/// assert!(snapshotter.is_changed(&tracked)?);
///
/// snapshotter.revert(&tracked)?;
/// assert_eq!(tracked.get("prop").as_str(), Some("old"));
/// # Ok::<(), objs_core::ObjsError>(())
/// ```
#[derive(Debug)]
pub struct Snapshotter {
    snapshots: FxHashMap<TrackingKey, History>,
    configuration: SnapshotterConfig,
}

impl Snapshotter {
    /// Create a new Snapshotter
    ///
    /// # Errors
    /// * `ObjsError::Configuration` - If the history depth is less than 1
    pub fn new(configuration: SnapshotterConfig) -> Result<Self> {
        configuration.validate()?;
        log_created(&configuration);

        Ok(Self {
            snapshots: FxHashMap::default(),
            configuration,
        })
    }

    pub fn configuration(&self) -> &SnapshotterConfig {
        &self.configuration
    }

    /// Number of tracked values
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Key the given value is tracked under.
    ///
    /// # Errors
    /// * `InvalidArgument::NotDefined` - If the value is null or undefined
    /// * `InvalidArgument::Primitive` - If the value is a boolean, number or string
    /// * `InvalidArgument::Immutable` - If the value is a date or a function
    /// * `InvalidArgument::MissingIdentifier` - If id tracking is configured and
    ///   the value does not own the identifier property
    pub fn tracking_key(&self, value: &Value) -> Result<TrackingKey> {
        if !Types::is_defined(value) {
            return Err(InvalidArgument::NotDefined("value").into());
        }
        if Types::is_primitive(value) {
            return Err(InvalidArgument::Primitive.into());
        }
        let kind = Types::kind_of(value);
        if matches!(kind, ValueKind::Date | ValueKind::Function) {
            return Err(InvalidArgument::Immutable(kind).into());
        }

        match self.configuration.identification_kind {
            IdentificationKind::Reference => Ok(TrackingKey::of(value)),
            IdentificationKind::Id => {
                let name = self.configuration.id_property_name();
                match value.as_object().and_then(|object| object.get(name)) {
                    Some(identifier) => Ok(TrackingKey::of(&identifier)),
                    None => Err(InvalidArgument::MissingIdentifier(name.to_string()).into()),
                }
            }
        }
    }

    /// History of the given value, if it is tracked
    pub fn history(&self, value: &Value) -> Option<&History> {
        let key = self.tracking_key(value).ok()?;
        self.snapshots.get(&key)
    }

    /// Whether or not the given value has any snapshots.
    ///
    /// Never fails: values that can not be tracked have no snapshots.
    pub fn has(&self, value: &Value) -> bool {
        self.count(value) > 0
    }

    /// Number of snapshots of the given value, 0 when it is not tracked.
    pub fn count(&self, value: &Value) -> usize {
        self.history(value).map_or(0, History::len)
    }

    /// Whether or not the given value has changed compared to its last snapshot
    ///
    /// # Errors
    /// * `ObjsError::InvalidArgument` - If the value can not be tracked
    /// * `ObjsError::NotTracked` - If the value has never been saved
    pub fn is_changed(&self, value: &Value) -> Result<bool> {
        self.is_changed_with(value, &ComparisonOptions::default())
    }

    /// Same as [`Snapshotter::is_changed`], comparing with the given options
    pub fn is_changed_with(&self, value: &Value, options: &ComparisonOptions<'_>) -> Result<bool> {
        let key = self.tracking_key(value)?;
        let history = self.snapshots.get(&key).ok_or(ObjsError::NotTracked)?;

        // Every snapshot was reverted: nothing left to match against
        Ok(match history.latest() {
            Some(latest) => !Comparer::are_equivalent_with(value, &latest.snapshot, options),
            None => true,
        })
    }

    /// Save the given value to a new snapshot
    ///
    /// The first save starts tracking the value. Later saves store a new
    /// snapshot only when the value differs from the newest one, dropping the
    /// oldest snapshot once the history depth is exceeded.
    ///
    /// # Errors
    /// * `ObjsError::InvalidArgument` - If the value can not be tracked
    pub fn save(&mut self, value: &Value) -> Result<&mut Self> {
        let key = self.tracking_key(value)?;
        let snapshot_kind = self.configuration.snapshot_kind;
        let history_depth = self.configuration.history_depth;

        match self.snapshots.get_mut(&key) {
            None => {
                let snapshot = take_snapshot(snapshot_kind, value);
                debug!(key = ?key, "Started tracking value");
                self.snapshots
                    .insert(key, History::seeded(history_depth, snapshot));
                #[cfg(feature = "metrics")]
                ObjsMetrics::global().record_saved();
            }
            Some(history) => {
                let unchanged = history
                    .latest()
                    .is_some_and(|latest| Comparer::are_equivalent(value, &latest.snapshot));
                if unchanged {
                    debug!(key = ?key, "Value unchanged, snapshot skipped");
                    #[cfg(feature = "metrics")]
                    ObjsMetrics::global().record_skipped();
                } else {
                    let snapshot = take_snapshot(snapshot_kind, value);
                    if let Some(evicted) = history.push(snapshot) {
                        debug!(key = ?key, version = evicted.version, "Evicted oldest snapshot");
                        #[cfg(feature = "metrics")]
                        ObjsMetrics::global().record_evicted();
                    }
                    debug!(key = ?key, snapshots = history.len(), "Snapshot saved");
                    #[cfg(feature = "metrics")]
                    ObjsMetrics::global().record_saved();
                }
            }
        }
        Ok(self)
    }

    /// Collapse the history of the given value to one fresh snapshot
    ///
    /// # Errors
    /// * `ObjsError::InvalidArgument` - If the value can not be tracked
    /// * `ObjsError::NotTracked` - If the value has never been saved
    pub fn clear(&mut self, value: &Value) -> Result<&mut Self> {
        let key = self.tracking_key(value)?;
        let snapshot_kind = self.configuration.snapshot_kind;

        let history = self.snapshots.get_mut(&key).ok_or(ObjsError::NotTracked)?;
        history.reset_to(take_snapshot(snapshot_kind, value));
        debug!(key = ?key, "Snapshot history cleared");

        Ok(self)
    }

    /// Clear all snapshots, forgetting every tracked value
    pub fn clear_all(&mut self) -> &mut Self {
        info!(tracked = self.snapshots.len(), "Clearing all snapshots");
        self.snapshots.clear();
        self
    }

    /// Alias of [`Snapshotter::clear_all`]
    pub fn reset(&mut self) -> &mut Self {
        self.clear_all()
    }

    /// Newest snapshot of the given value, without reverting.
    ///
    /// The stored snapshot itself is returned, not a copy.
    ///
    /// # Errors
    /// * `ObjsError::InvalidArgument` - If the value can not be tracked
    /// * `ObjsError::NotTracked` - If the value has never been saved
    /// * `ObjsError::Exhausted` - If every snapshot has been reverted
    pub fn peek(&self, value: &Value) -> Result<Value> {
        Ok(self.latest(value, "peek")?.snapshot.clone())
    }

    /// Revert the given value to its newest snapshot
    ///
    /// The snapshot is removed from the history and written back into the
    /// given value in place, using the configured kind of clone. The removed
    /// snapshot is returned.
    ///
    /// # Errors
    /// * `ObjsError::InvalidArgument` - If the value can not be tracked or can
    ///   not be synchronized with its snapshot; the history is left untouched
    /// * `ObjsError::NotTracked` - If the value has never been saved
    /// * `ObjsError::Exhausted` - If every snapshot has already been reverted
    pub fn revert(&mut self, value: &Value) -> Result<Value> {
        let key = self.tracking_key(value)?;
        let snapshot_kind = self.configuration.snapshot_kind;

        let history = self.snapshots.get_mut(&key).ok_or(ObjsError::NotTracked)?;
        let latest = history.latest().ok_or(ObjsError::Exhausted("revert"))?;
        Cloner::check_sync_operands(&latest.snapshot, value)?;

        let entry = history.pop_latest().ok_or(ObjsError::Exhausted("revert"))?;
        match snapshot_kind {
            SnapshotKind::DeepClone => Cloner::deep_clone_to(&entry.snapshot, value)?,
            SnapshotKind::ShallowClone => Cloner::shallow_clone_to(&entry.snapshot, value)?,
        };

        debug!(
            key = ?key,
            version = entry.version,
            remaining = history.len(),
            "Value reverted"
        );
        #[cfg(feature = "metrics")]
        ObjsMetrics::global().record_revert();

        Ok(entry.snapshot)
    }

    fn latest(&self, value: &Value, operation: &'static str) -> Result<&HistoryEntry> {
        let key = self.tracking_key(value)?;
        let history = self.snapshots.get(&key).ok_or(ObjsError::NotTracked)?;
        history.latest().ok_or(ObjsError::Exhausted(operation))
    }
}

impl Default for Snapshotter {
    fn default() -> Self {
        let configuration = SnapshotterConfig::default();
        log_created(&configuration);
        Self {
            snapshots: FxHashMap::default(),
            configuration,
        }
    }
}

fn log_created(configuration: &SnapshotterConfig) {
    info!(
        history_depth = configuration.history_depth,
        identification_kind = ?configuration.identification_kind,
        snapshot_kind = ?configuration.snapshot_kind,
        "Snapshotter created"
    );
}

fn take_snapshot(kind: SnapshotKind, value: &Value) -> Value {
    #[cfg(feature = "metrics")]
    let timer = MetricsTimer::start();

    let snapshot = match kind {
        SnapshotKind::DeepClone => Cloner::deep_clone(value),
        SnapshotKind::ShallowClone => Cloner::shallow_clone(value),
    };

    #[cfg(feature = "metrics")]
    timer.finish();
    snapshot
}
