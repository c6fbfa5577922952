/*!
# Objs Core

In-memory object utilities for dynamically-typed value graphs.

This crate provides:

- Shallow and deep cloning of arbitrary, possibly cyclic, value graphs, plus
  in-place synchronization of an existing target from a source
- Structural equivalence with property exclusion and a detailed comparison report
- A Snapshotter keeping a bounded history of clones per tracked value, with
  change detection and in-place revert

## Usage

```rust
use objs_core::{Cloner, Comparer, Snapshotter, Value};

let tracked = Value::object([("prop", "old")]);
tracked.set("self", tracked.clone());

let clone = Cloner::deep_clone(&tracked);
assert!(Comparer::are_equivalent(&tracked, &clone));

let mut snapshotter = Snapshotter::default();
snapshotter.save(&tracked)?;
tracked.set("prop", "new");
snapshotter.revert(&tracked)?;
assert_eq!(tracked.get("prop").as_str(), Some("old"));
# Ok::<(), objs_core::ObjsError>(())
```
*/

pub mod cloner;
pub mod comparer;
pub mod config;
pub mod error;
pub mod history;
pub mod observability;
pub mod snapshotter;
pub mod types;
pub mod value;

#[cfg(test)]
mod snapshotter_tests;

pub use cloner::Cloner;
pub use comparer::{Comparer, ComparisonOptions, ComparisonReport, Member, MemberReport};
pub use config::{IdentificationKind, PropertyNameCasingKind, SnapshotKind, SnapshotterConfig};
pub use error::{InvalidArgument, ObjsError, Result};
pub use history::{History, HistoryEntry};
pub use observability::{init_default_observability, init_observability};
pub use snapshotter::{Snapshotter, TrackingKey};
pub use types::{Types, ValueKind};
pub use value::{ArrayRef, FunctionRef, Object, ObjectRef, Properties, Value};
