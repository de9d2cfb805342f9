//! Structured telemetry for protocol anomalies.
//!
//! The update protocol favors availability: a malformed frame, an unknown
//! discriminant or a stale identifier never fails the caller. Each of those
//! events is instead recorded as a [`Violation`] so it can be:
//!
//! - logged via tracing (default behavior),
//! - collected programmatically in tests,
//! - forwarded to custom observers (metrics, alerting, etc.).
//!
//! # Example
//!
//! ```
//! use livegump::telemetry::{CollectingObserver, ViolationKind};
//! use livegump::SessionBuilder;
//! use std::sync::Arc;
//!
//! let observer = Arc::new(CollectingObserver::new());
//! let mut client = SessionBuilder::new()
//!     .with_violation_observer(observer.clone())
//!     .start_client_session()
//!     .unwrap();
//!
//! # struct NoHost;
//! # impl livegump::UiHost for NoHost {
//! #     type Handle = u32;
//! #     fn container(&self, _: u32) -> Option<&dyn livegump::GumpContainer> { None }
//! #     fn container_mut(&mut self, _: u32) -> Option<&mut dyn livegump::GumpContainer> { None }
//! #     fn open_containers(&self) -> Vec<u32> { Vec::new() }
//! #     fn create_widget(&mut self, _: &livegump::WidgetSpec) -> Option<Box<dyn livegump::Widget>> { None }
//! #     fn close_container(&mut self, _: u32) {}
//! # }
//! // A packet that is too short to carry an envelope.
//! client.handle_packet(&mut NoHost, &[0xBF, 0x00]);
//! assert!(observer.has_violation(ViolationKind::MalformedFrame));
//! ```

use crate::ContainerId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Severity of a protocol violation.
///
/// Severities are ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Unexpected but harmless; the update was skipped.
    Warning,
    /// Serious issue; client-visible state may now lag the server.
    Error,
    /// Internal invariant broken; registry state may be corrupted.
    Critical,
}

impl ViolationSeverity {
    /// Returns a string representation suitable for logging/metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories of protocol violations.
///
/// # Forward Compatibility
///
/// This enum is marked `#[non_exhaustive]`. Always include a wildcard arm when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ViolationKind {
    /// Not enough bytes for a declared field, or a bad envelope.
    MalformedFrame,
    /// Unrecognized sub-command, property, widget type or animation type.
    UnknownDiscriminant,
    /// A container or element identifier did not resolve.
    UnresolvedReference,
    /// Pending updates were dropped because no transport was available.
    TransportUnavailable,
    /// The application's refresh callback failed and auto-refresh was cancelled.
    RefreshFault,
    /// Configuration constraint violated.
    Configuration,
    /// Runtime invariant check failed.
    Invariant,
}

impl ViolationKind {
    /// Returns a string representation suitable for logging/metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedFrame => "malformed_frame",
            Self::UnknownDiscriminant => "unknown_discriminant",
            Self::UnresolvedReference => "unresolved_reference",
            Self::TransportUnavailable => "transport_unavailable",
            Self::RefreshFault => "refresh_fault",
            Self::Configuration => "configuration",
            Self::Invariant => "invariant",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded protocol violation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Violation {
    /// The severity level of this violation.
    pub severity: ViolationSeverity,
    /// The category where the violation occurred.
    pub kind: ViolationKind,
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Source location where the violation was detected (file:line).
    pub location: &'static str,
    /// The container the violation concerns, if known.
    pub container: Option<ContainerId>,
    /// Additional structured context as key-value pairs.
    pub context: BTreeMap<String, String>,
}

impl Violation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(
        severity: ViolationSeverity,
        kind: ViolationKind,
        message: impl Into<String>,
        location: &'static str,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            location,
            container: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the container this violation concerns.
    #[must_use]
    pub fn with_container(mut self, container: ContainerId) -> Self {
        self.container = Some(container);
        self
    }

    /// Adds a context key-value pair.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Serializes this violation to a JSON string.
    ///
    /// ```
    /// use livegump::telemetry::{Violation, ViolationKind, ViolationSeverity};
    /// use livegump::ContainerId;
    ///
    /// let violation = Violation::new(
    ///     ViolationSeverity::Warning,
    ///     ViolationKind::UnresolvedReference,
    ///     "container not tracked",
    ///     "client.rs:1",
    /// )
    /// .with_container(ContainerId::new(7));
    ///
    /// let json = violation.to_json().unwrap();
    /// assert!(json.contains(r#""kind":"unresolved_reference""#));
    /// assert!(json.contains(r#""container":7"#));
    /// ```
    #[cfg(feature = "json")]
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Like [`to_json`](Self::to_json), but with indentation for readability.
    #[cfg(feature = "json")]
    #[must_use]
    pub fn to_json_pretty(&self) -> Option<String> {
        serde_json::to_string_pretty(self).ok()
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}] {} (at {}",
            self.severity, self.kind, self.message, self.location
        )?;
        if let Some(container) = self.container {
            write!(f, ", container={container}")?;
        }
        if !self.context.is_empty() {
            write!(f, ", context={:?}", self.context)?;
        }
        write!(f, ")")
    }
}

/// Trait for observing protocol violations.
///
/// Observers are shared between sessions and the threads that drive them, so
/// they must be `Send + Sync`.
pub trait ViolationObserver: Send + Sync {
    /// Called when a violation is detected.
    ///
    /// This runs inside frame handling and flushes, so keep it quick.
    fn on_violation(&self, violation: &Violation);
}

/// Built-in observer that logs violations via the `tracing` crate.
///
/// - `Warning` severity → `tracing::warn!`
/// - `Error` and `Critical` severity → `tracing::error!`
#[derive(Debug, Default, Clone)]
pub struct TracingObserver;

impl TracingObserver {
    /// Creates a new tracing observer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn format_container(container: Option<ContainerId>) -> String {
        container.map_or_else(|| "null".to_owned(), |c| c.to_string())
    }
}

impl ViolationObserver for TracingObserver {
    fn on_violation(&self, violation: &Violation) {
        let severity = violation.severity.as_str();
        let kind = violation.kind.as_str();
        let location = violation.location;
        let container = Self::format_container(violation.container);
        let context = format!("{:?}", violation.context);

        match violation.severity {
            ViolationSeverity::Warning => {
                tracing::warn!(
                    severity,
                    kind,
                    location,
                    container = %container,
                    context = %context,
                    "{}",
                    violation.message
                );
            },
            ViolationSeverity::Error | ViolationSeverity::Critical => {
                tracing::error!(
                    severity,
                    kind,
                    location,
                    container = %container,
                    context = %context,
                    "{}",
                    violation.message
                );
            },
        }
    }
}

/// Built-in observer that collects violations for testing.
///
/// ```
/// use livegump::telemetry::{
///     CollectingObserver, Violation, ViolationKind, ViolationObserver, ViolationSeverity,
/// };
///
/// let observer = CollectingObserver::new();
/// observer.on_violation(&Violation::new(
///     ViolationSeverity::Warning,
///     ViolationKind::TransportUnavailable,
///     "dropped 3 pending updates",
///     "test.rs:1",
/// ));
///
/// assert_eq!(observer.len(), 1);
/// assert!(observer.has_violation(ViolationKind::TransportUnavailable));
/// ```
#[derive(Debug, Default)]
pub struct CollectingObserver {
    violations: Mutex<Vec<Violation>>,
}

impl CollectingObserver {
    /// Creates a new collecting observer with an empty violation list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            violations: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of all collected violations.
    #[must_use]
    pub fn violations(&self) -> Vec<Violation> {
        self.violations.lock().clone()
    }

    /// Returns the number of collected violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.lock().len()
    }

    /// Returns true if no violations have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.lock().is_empty()
    }

    /// Checks if any violation of the specified kind has been collected.
    #[must_use]
    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations.lock().iter().any(|v| v.kind == kind)
    }

    /// Returns all violations matching the specified kind.
    #[must_use]
    pub fn violations_of_kind(&self, kind: ViolationKind) -> Vec<Violation> {
        self.violations
            .lock()
            .iter()
            .filter(|v| v.kind == kind)
            .cloned()
            .collect()
    }

    /// Returns all violations at or above the specified severity.
    #[must_use]
    pub fn violations_at_severity(&self, min_severity: ViolationSeverity) -> Vec<Violation> {
        self.violations
            .lock()
            .iter()
            .filter(|v| v.severity >= min_severity)
            .cloned()
            .collect()
    }

    /// Clears all collected violations.
    pub fn clear(&self) {
        self.violations.lock().clear();
    }
}

impl ViolationObserver for CollectingObserver {
    fn on_violation(&self, violation: &Violation) {
        self.violations.lock().push(violation.clone());
    }
}

/// A composite observer that forwards violations to multiple observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ViolationObserver>>,
}

impl CompositeObserver {
    /// Creates a new composite observer with no child observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Adds an observer to the composite.
    pub fn add(&mut self, observer: Arc<dyn ViolationObserver>) {
        self.observers.push(observer);
    }

    /// Creates a composite observer from a list of observers.
    #[must_use]
    pub fn from_observers(observers: Vec<Arc<dyn ViolationObserver>>) -> Self {
        Self { observers }
    }
}

impl ViolationObserver for CompositeObserver {
    fn on_violation(&self, violation: &Violation) {
        for observer in &self.observers {
            observer.on_violation(violation);
        }
    }
}

impl std::fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("num_observers", &self.observers.len())
            .finish()
    }
}

/// Reports a [`Violation`] with the current source location.
///
/// Every violation is logged through [`TracingObserver`]. When an `observer:`
/// is given (an `Option<&Arc<dyn ViolationObserver>>`), it is forwarded there
/// too, optionally tagged with a `container:`.
///
/// ```text
/// report_violation!(severity, kind, "message {}", arg);
/// report_violation!(observer: obs, severity, kind, "message {}", arg);
/// report_violation!(observer: obs, container: id, severity, kind, "message {}", arg);
/// ```
///
/// ```
/// use livegump::{report_violation, telemetry::{ViolationKind, ViolationSeverity}};
///
/// let declared = 9000;
/// report_violation!(
///     ViolationSeverity::Warning,
///     ViolationKind::MalformedFrame,
///     "text length {} clamped",
///     declared
/// );
/// ```
#[macro_export]
macro_rules! report_violation {
    (observer: $observer:expr, container: $container:expr, $severity:expr, $kind:expr, $($fmt:tt)+) => {{
        use $crate::telemetry::ViolationObserver as _;
        let violation = $crate::telemetry::Violation::new(
            $severity,
            $kind,
            format!($($fmt)+),
            concat!(file!(), ":", line!()),
        )
        .with_container($container);
        $crate::telemetry::TracingObserver.on_violation(&violation);
        if let Some(observer) = $observer {
            observer.on_violation(&violation);
        }
    }};

    (observer: $observer:expr, $severity:expr, $kind:expr, $($fmt:tt)+) => {{
        use $crate::telemetry::ViolationObserver as _;
        let violation = $crate::telemetry::Violation::new(
            $severity,
            $kind,
            format!($($fmt)+),
            concat!(file!(), ":", line!()),
        );
        $crate::telemetry::TracingObserver.on_violation(&violation);
        if let Some(observer) = $observer {
            observer.on_violation(&violation);
        }
    }};

    ($severity:expr, $kind:expr, $($fmt:tt)+) => {{
        use $crate::telemetry::ViolationObserver as _;
        let violation = $crate::telemetry::Violation::new(
            $severity,
            $kind,
            format!($($fmt)+),
            concat!(file!(), ":", line!()),
        );
        $crate::telemetry::TracingObserver.on_violation(&violation);
    }};
}

/// Details of a broken type invariant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InvariantViolation {
    /// Name of the type whose invariant was violated.
    pub type_name: &'static str,
    /// Description of the violated invariant.
    pub invariant: String,
    /// Additional diagnostic context.
    pub details: Option<String>,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    #[must_use]
    pub fn new(type_name: &'static str, invariant: impl Into<String>) -> Self {
        Self {
            type_name,
            invariant: invariant.into(),
            details: None,
        }
    }

    /// Adds additional details to the violation.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.invariant)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Trait for types that maintain internal invariants.
///
/// Checked by [`debug_check_invariants!`](crate::debug_check_invariants) in
/// debug builds or when the `paranoid` feature is enabled.
pub trait InvariantChecker {
    /// Returns the first broken invariant, if any.
    fn check_invariants(&self) -> Result<(), InvariantViolation>;
}

/// Checks invariants in debug builds (or with `paranoid`), reporting a
/// critical [`ViolationKind::Invariant`] on failure.
#[macro_export]
#[cfg(any(debug_assertions, feature = "paranoid"))]
macro_rules! debug_check_invariants {
    ($expr:expr) => {{
        use $crate::telemetry::InvariantChecker as _;
        if let Err(violation) = $expr.check_invariants() {
            $crate::report_violation!(
                $crate::telemetry::ViolationSeverity::Critical,
                $crate::telemetry::ViolationKind::Invariant,
                "{}",
                violation
            );
        }
    }};

    ($expr:expr, $context:expr) => {{
        use $crate::telemetry::InvariantChecker as _;
        if let Err(violation) = $expr.check_invariants() {
            $crate::report_violation!(
                $crate::telemetry::ViolationSeverity::Critical,
                $crate::telemetry::ViolationKind::Invariant,
                "{} [context: {}]",
                violation,
                $context
            );
        }
    }};
}

/// No-op version for release builds without `paranoid` feature.
#[macro_export]
#[cfg(not(any(debug_assertions, feature = "paranoid")))]
macro_rules! debug_check_invariants {
    ($expr:expr) => {{}};
    ($expr:expr, $context:expr) => {{}};
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn sample(kind: ViolationKind, severity: ViolationSeverity) -> Violation {
        Violation::new(severity, kind, "sample", "telemetry.rs:1")
    }

    #[test]
    fn severity_ordering() {
        assert!(ViolationSeverity::Warning < ViolationSeverity::Error);
        assert!(ViolationSeverity::Error < ViolationSeverity::Critical);
    }

    #[test]
    fn display_includes_container_and_context() {
        let v = sample(ViolationKind::UnresolvedReference, ViolationSeverity::Warning)
            .with_container(ContainerId::new(0x20))
            .with_context("element", "7");
        let text = v.to_string();
        assert!(text.starts_with("[warning/unresolved_reference] sample"));
        assert!(text.contains("container=0x00000020"));
        assert!(text.contains("element"));
    }

    #[test]
    fn collecting_observer_filters() {
        let observer = CollectingObserver::new();
        observer.on_violation(&sample(
            ViolationKind::MalformedFrame,
            ViolationSeverity::Warning,
        ));
        observer.on_violation(&sample(ViolationKind::RefreshFault, ViolationSeverity::Error));

        assert_eq!(observer.len(), 2);
        assert_eq!(observer.violations_of_kind(ViolationKind::RefreshFault).len(), 1);
        assert_eq!(
            observer
                .violations_at_severity(ViolationSeverity::Error)
                .len(),
            1
        );
        observer.clear();
        assert!(observer.is_empty());
    }

    #[test]
    fn composite_forwards_to_all() {
        let a = Arc::new(CollectingObserver::new());
        let b = Arc::new(CollectingObserver::new());
        let mut composite = CompositeObserver::new();
        composite.add(a.clone());
        composite.add(b.clone());
        composite.on_violation(&sample(
            ViolationKind::Configuration,
            ViolationSeverity::Error,
        ));
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn report_violation_forwards_to_observer() {
        let collector = Arc::new(CollectingObserver::new());
        let observer: Option<Arc<dyn ViolationObserver>> = Some(collector.clone());
        report_violation!(
            observer: observer.as_ref(),
            container: ContainerId::new(3),
            ViolationSeverity::Warning,
            ViolationKind::UnknownDiscriminant,
            "unknown property 0x{:02X}",
            0x7Fu8
        );
        let violations = collector.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].container, Some(ContainerId::new(3)));
        assert_eq!(violations[0].message, "unknown property 0x7F");
    }

    #[test]
    fn report_violation_without_observer_only_logs() {
        let observer: Option<Arc<dyn ViolationObserver>> = None;
        report_violation!(
            observer: observer.as_ref(),
            ViolationSeverity::Warning,
            ViolationKind::TransportUnavailable,
            "nothing to forward to"
        );
    }

    #[test]
    fn invariant_violation_display() {
        let v = InvariantViolation::new("LiveContainer", "id beyond counter").with_details("id=9");
        assert_eq!(v.to_string(), "LiveContainer: id beyond counter (id=9)");
    }
}
